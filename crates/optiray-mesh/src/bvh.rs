//! Bounding volume hierarchy over a triangulated surface.
//!
//! Uses Surface Area Heuristic (SAH) construction and ordered traversal
//! with closest-hit pruning. The hierarchy snapshots the mesh triangles
//! at build time and records the mesh revision; callers compare that
//! revision before querying (see [`Bvh::is_current`]).

use optiray_math::{Point3, Vec3};

use crate::aabb::Aabb3;
use crate::error::{MeshError, Result};
use crate::trimesh::TriMesh;

/// A segment query, precomputed for fast slab tests.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    /// Start point.
    pub p1: Point3,
    /// Unit direction from `p1` towards `p2`.
    pub direction: Vec3,
    /// Distance from `p1` to `p2`.
    pub length: f64,
    inv_direction: Vec3,
    sign: [usize; 3],
}

impl Segment {
    /// Build a segment query from its two endpoints.
    ///
    /// Returns `None` for a zero-length segment.
    pub fn new(p1: Point3, p2: Point3) -> Option<Self> {
        let delta = p2 - p1;
        let length = delta.norm();
        if length < 1e-14 {
            return None;
        }
        let direction = delta / length;
        let inv = Vec3::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z);
        let sign = [
            if inv.x < 0.0 { 1 } else { 0 },
            if inv.y < 0.0 { 1 } else { 0 },
            if inv.z < 0.0 { 1 } else { 0 },
        ];
        Some(Self {
            p1,
            direction,
            length,
            inv_direction: inv,
            sign,
        })
    }

    /// Evaluate the segment at distance `t` from `p1`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.p1 + t * self.direction
    }

    /// Slab test against an AABB. Returns the entry distance if the
    /// segment's supporting ray intersects the box at `t >= 0`.
    #[inline]
    fn intersect_aabb(&self, aabb: &Aabb3) -> Option<f64> {
        let bounds = [aabb.min, aabb.max];

        let tx1 = (bounds[self.sign[0]].x - self.p1.x) * self.inv_direction.x;
        let tx2 = (bounds[1 - self.sign[0]].x - self.p1.x) * self.inv_direction.x;

        let mut t_min = tx1;
        let mut t_max = tx2;

        let ty1 = (bounds[self.sign[1]].y - self.p1.y) * self.inv_direction.y;
        let ty2 = (bounds[1 - self.sign[1]].y - self.p1.y) * self.inv_direction.y;

        t_min = t_min.max(ty1);
        t_max = t_max.min(ty2);

        let tz1 = (bounds[self.sign[2]].z - self.p1.z) * self.inv_direction.z;
        let tz2 = (bounds[1 - self.sign[2]].z - self.p1.z) * self.inv_direction.z;

        t_min = t_min.max(tz1);
        t_max = t_max.min(tz2);

        if t_max >= t_min && t_max >= 0.0 && t_min <= self.length {
            Some(t_min.max(0.0))
        } else {
            None
        }
    }
}

/// A triangle hit found by a segment query.
#[derive(Debug, Clone, Copy)]
pub struct TriangleHit {
    /// Distance from the segment start to the intersection.
    pub t: f64,
    /// Triangle (cell) id within the mesh.
    pub cell: u32,
    /// Intersection point.
    pub point: Point3,
}

/// Triangle data snapshotted from the mesh at build time.
#[derive(Debug, Clone, Copy)]
struct Triangle {
    v0: Point3,
    e1: Vec3,
    e2: Vec3,
    cell: u32,
}

/// Barycentric slack so a ray grazing a shared edge or vertex still
/// registers on at least one adjacent triangle. The nearest-hit query
/// collapses any resulting double count.
const BARY_EPS: f64 = 1e-9;

impl Triangle {
    /// Möller–Trumbore intersection restricted to the segment's extent.
    ///
    /// Zero distance is rejected: a ray restarting exactly on a surface
    /// must not re-find its own origin.
    #[inline]
    fn intersect(&self, seg: &Segment) -> Option<f64> {
        let pvec = seg.direction.cross(&self.e2);
        let det = self.e1.dot(&pvec);
        if det.abs() < 1e-14 {
            return None;
        }
        let inv_det = 1.0 / det;
        let tvec = seg.p1 - self.v0;
        let u = tvec.dot(&pvec) * inv_det;
        if !(-BARY_EPS..=1.0 + BARY_EPS).contains(&u) {
            return None;
        }
        let qvec = tvec.cross(&self.e1);
        let v = seg.direction.dot(&qvec) * inv_det;
        if v < -BARY_EPS || u + v > 1.0 + BARY_EPS {
            return None;
        }
        let t = self.e2.dot(&qvec) * inv_det;
        if t > 0.0 && t <= seg.length {
            Some(t)
        } else {
            None
        }
    }
}

/// A BVH node - either a leaf holding triangle indices or an internal
/// node with two children.
#[derive(Debug, Clone)]
enum BvhNode {
    Leaf {
        aabb: Aabb3,
        tris: Vec<u32>,
    },
    Internal {
        aabb: Aabb3,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn aabb(&self) -> &Aabb3 {
        match self {
            BvhNode::Leaf { aabb, .. } => aabb,
            BvhNode::Internal { aabb, .. } => aabb,
        }
    }
}

/// Bounding volume hierarchy for nearest segment-triangle queries.
#[derive(Debug, Clone)]
pub struct Bvh {
    root: BvhNode,
    triangles: Vec<Triangle>,
    built_revision: u64,
}

impl Bvh {
    /// Build a hierarchy from the mesh's current triangle set.
    ///
    /// Zero-area triangles are rejected: they can never produce a hit
    /// and break the SAH cost model.
    pub fn build(mesh: &TriMesh) -> Result<Self> {
        let mut triangles = Vec::with_capacity(mesh.num_triangles());
        for i in 0..mesh.num_triangles() {
            let [a, b, c] = mesh.triangle_points(i);
            let e1 = b - a;
            let e2 = c - a;
            if e1.cross(&e2).norm() < 1e-14 {
                return Err(MeshError::Geometry(format!("triangle {i} has zero area")));
            }
            triangles.push(Triangle {
                v0: a,
                e1,
                e2,
                cell: i as u32,
            });
        }

        let mut build_data: Vec<(u32, Aabb3, Point3)> = triangles
            .iter()
            .enumerate()
            .map(|(i, tri)| {
                let mut aabb = Aabb3::empty();
                aabb.include_point(&tri.v0);
                aabb.include_point(&Point3::from(tri.v0.coords + tri.e1));
                aabb.include_point(&Point3::from(tri.v0.coords + tri.e2));
                aabb.expand(1e-12);
                let centroid = aabb.centroid();
                (i as u32, aabb, centroid)
            })
            .collect();

        Ok(Self {
            root: build_node(&mut build_data),
            triangles,
            built_revision: mesh.revision(),
        })
    }

    /// Mesh revision this hierarchy was built from.
    pub fn built_revision(&self) -> u64 {
        self.built_revision
    }

    /// True if the hierarchy still matches the mesh content.
    pub fn is_current(&self, mesh: &TriMesh) -> bool {
        self.built_revision == mesh.revision()
    }

    /// Number of triangles in the snapshot.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Nearest triangle intersection of the segment `[p1, p2]`.
    ///
    /// Hits on `exclude_cell` are discarded; that id comes from the
    /// querying ray's previous bounce and suppresses floating-point
    /// re-intersection at the ray's own origin. Zero intersections is a
    /// normal outcome, reported as `None`.
    pub fn query(&self, p1: &Point3, p2: &Point3, exclude_cell: Option<u32>) -> Option<TriangleHit> {
        let seg = Segment::new(*p1, *p2)?;
        let mut closest: Option<TriangleHit> = None;
        let mut closest_t = f64::INFINITY;
        self.query_node(&self.root, &seg, exclude_cell, &mut closest, &mut closest_t);
        closest
    }

    fn query_node(
        &self,
        node: &BvhNode,
        seg: &Segment,
        exclude_cell: Option<u32>,
        closest: &mut Option<TriangleHit>,
        closest_t: &mut f64,
    ) {
        match node {
            BvhNode::Leaf { aabb, tris } => {
                let Some(t_entry) = seg.intersect_aabb(aabb) else {
                    return;
                };
                if t_entry >= *closest_t {
                    return;
                }
                for &idx in tris {
                    let tri = &self.triangles[idx as usize];
                    if Some(tri.cell) == exclude_cell {
                        continue;
                    }
                    if let Some(t) = tri.intersect(seg) {
                        if t < *closest_t {
                            *closest_t = t;
                            *closest = Some(TriangleHit {
                                t,
                                cell: tri.cell,
                                point: seg.at(t),
                            });
                        }
                    }
                }
            }
            BvhNode::Internal { aabb, left, right } => {
                let Some(t_entry) = seg.intersect_aabb(aabb) else {
                    return;
                };
                if t_entry >= *closest_t {
                    return;
                }

                // Visit the nearer child first so its hits prune the other.
                let left_t = seg.intersect_aabb(left.aabb());
                let right_t = seg.intersect_aabb(right.aabb());
                match (left_t, right_t) {
                    (Some(lt), Some(rt)) => {
                        let (first, second) = if lt <= rt { (left, right) } else { (right, left) };
                        self.query_node(first, seg, exclude_cell, closest, closest_t);
                        self.query_node(second, seg, exclude_cell, closest, closest_t);
                    }
                    (Some(_), None) => {
                        self.query_node(left, seg, exclude_cell, closest, closest_t)
                    }
                    (None, Some(_)) => {
                        self.query_node(right, seg, exclude_cell, closest, closest_t)
                    }
                    (None, None) => {}
                }
            }
        }
    }
}

/// Build a BVH node recursively using SAH.
fn build_node(data: &mut [(u32, Aabb3, Point3)]) -> BvhNode {
    let mut bounds = Aabb3::empty();
    for (_, aabb, _) in data.iter() {
        bounds.include_aabb(aabb);
    }

    if data.len() <= 4 {
        return BvhNode::Leaf {
            aabb: bounds,
            tris: data.iter().map(|(id, _, _)| *id).collect(),
        };
    }

    let (best_axis, best_pos) = find_best_split(data, &bounds);
    let mid = partition(data, best_axis, best_pos);

    // Degenerate partition: fall back to a median split.
    let mid = if mid == 0 || mid == data.len() {
        data.len() / 2
    } else {
        mid
    };

    let (left_data, right_data) = data.split_at_mut(mid);
    BvhNode::Internal {
        aabb: bounds,
        left: Box::new(build_node(left_data)),
        right: Box::new(build_node(right_data)),
    }
}

/// Find the best split axis and position using bucketed SAH.
fn find_best_split(data: &[(u32, Aabb3, Point3)], bounds: &Aabb3) -> (usize, f64) {
    const NUM_BUCKETS: usize = 12;

    let extent = bounds.max - bounds.min;
    let total_area = bounds.surface_area();

    let mut best_cost = f64::INFINITY;
    let mut best_axis = 0;
    let mut best_pos = 0.0;

    for axis in 0..3 {
        let axis_extent = extent[axis];
        if axis_extent < 1e-10 {
            continue;
        }
        let axis_min = bounds.min[axis];

        let mut bucket_counts = [0usize; NUM_BUCKETS];
        let mut bucket_bounds = [Aabb3::empty(); NUM_BUCKETS];

        for (_, aabb, centroid) in data {
            let b = ((centroid[axis] - axis_min) / axis_extent * NUM_BUCKETS as f64) as usize;
            let b = b.min(NUM_BUCKETS - 1);
            bucket_counts[b] += 1;
            bucket_bounds[b].include_aabb(aabb);
        }

        for split in 1..NUM_BUCKETS {
            let mut left_count = 0;
            let mut left_bounds = Aabb3::empty();
            for i in 0..split {
                left_count += bucket_counts[i];
                if bucket_counts[i] > 0 {
                    left_bounds.include_aabb(&bucket_bounds[i]);
                }
            }

            let mut right_count = 0;
            let mut right_bounds = Aabb3::empty();
            for i in split..NUM_BUCKETS {
                right_count += bucket_counts[i];
                if bucket_counts[i] > 0 {
                    right_bounds.include_aabb(&bucket_bounds[i]);
                }
            }

            if left_count == 0 || right_count == 0 {
                continue;
            }

            let cost = 0.125
                + left_bounds.surface_area() / total_area * left_count as f64
                + right_bounds.surface_area() / total_area * right_count as f64;

            if cost < best_cost {
                best_cost = cost;
                best_axis = axis;
                best_pos = axis_min + (split as f64 / NUM_BUCKETS as f64) * axis_extent;
            }
        }
    }

    (best_axis, best_pos)
}

/// Partition triangles by centroid along an axis.
fn partition(data: &mut [(u32, Aabb3, Point3)], axis: usize, pos: f64) -> usize {
    let mut left = 0;
    let mut right = data.len();
    while left < right {
        if data[left].2[axis] < pos {
            left += 1;
        } else {
            right -= 1;
            data.swap(left, right);
        }
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A regular sphere tessellation for stress tests.
    fn sphere_mesh(radius: f64, rings: usize, sectors: usize) -> TriMesh {
        use std::f64::consts::PI;
        let mut vertices = Vec::new();
        for r in 0..=rings {
            let phi = PI * r as f64 / rings as f64;
            for s in 0..sectors {
                let theta = 2.0 * PI * s as f64 / sectors as f64;
                vertices.push(Point3::new(
                    radius * phi.sin() * theta.cos(),
                    radius * phi.sin() * theta.sin(),
                    radius * phi.cos(),
                ));
            }
        }
        let mut triangles = Vec::new();
        let idx = |r: usize, s: usize| (r * sectors + s % sectors) as u32;
        for r in 0..rings {
            for s in 0..sectors {
                if r > 0 {
                    triangles.push([idx(r, s), idx(r + 1, s), idx(r, s + 1)]);
                }
                if r < rings - 1 {
                    triangles.push([idx(r, s + 1), idx(r + 1, s), idx(r + 1, s + 1)]);
                }
            }
        }
        TriMesh::new(vertices, triangles).unwrap()
    }

    #[test]
    fn test_build_and_counts() {
        let mesh = sphere_mesh(5.0, 12, 16);
        let bvh = Bvh::build(&mesh).unwrap();
        assert_eq!(bvh.num_triangles(), mesh.num_triangles());
        assert!(bvh.is_current(&mesh));
    }

    #[test]
    fn test_query_sphere_entry() {
        let mesh = sphere_mesh(5.0, 24, 32);
        let bvh = Bvh::build(&mesh).unwrap();
        let hit = bvh
            .query(
                &Point3::new(0.0, 0.0, -20.0),
                &Point3::new(0.0, 0.0, 20.0),
                None,
            )
            .unwrap();
        // Entry point near z = -5; tessellation error stays well under 2%.
        assert!((hit.t - 15.0).abs() < 0.1, "t = {}", hit.t);
        assert!(hit.point.z < 0.0);
    }

    #[test]
    fn test_query_through_shared_vertex() {
        // Straight through the corner vertex shared by both diagonal
        // triangles; roundoff must not push the hit outside every one.
        let mesh = TriMesh::rectangle(10.0, 10.0).unwrap();
        let bvh = Bvh::build(&mesh).unwrap();
        let hit = bvh
            .query(
                &Point3::new(5.0, 5.0, 5.0),
                &Point3::new(5.0, 5.0, -5.0),
                None,
            )
            .unwrap();
        assert!((hit.t - 5.0).abs() < 1e-9, "t = {}", hit.t);
    }

    #[test]
    fn test_query_miss() {
        let mesh = sphere_mesh(5.0, 12, 16);
        let bvh = Bvh::build(&mesh).unwrap();
        let hit = bvh.query(
            &Point3::new(50.0, 50.0, -20.0),
            &Point3::new(50.0, 50.0, 20.0),
            None,
        );
        assert!(hit.is_none());
    }

    #[test]
    fn test_query_matches_brute_force() {
        let mesh = sphere_mesh(5.0, 16, 20);
        let bvh = Bvh::build(&mesh).unwrap();
        let p1 = Point3::new(1.3, -0.7, -20.0);
        let p2 = Point3::new(-0.5, 2.0, 20.0);
        let hit = bvh.query(&p1, &p2, None).unwrap();

        let seg = Segment::new(p1, p2).unwrap();
        let mut best = f64::INFINITY;
        for tri in &bvh.triangles {
            if let Some(t) = tri.intersect(&seg) {
                best = best.min(t);
            }
        }
        assert!((hit.t - best).abs() < 1e-12);
    }

    #[test]
    fn test_exclude_cell_skips_origin_triangle() {
        let mesh = TriMesh::rectangle(10.0, 10.0).unwrap();
        let bvh = Bvh::build(&mesh).unwrap();
        // Segment starting exactly on triangle 0 and passing through it.
        let on_surface = Point3::new(1.0, -1.0, 0.0);
        let hit = bvh.query(&on_surface, &Point3::new(1.0, -1.0, -10.0), Some(0));
        assert!(hit.is_none());
        // Without the exclusion a tangential restart may re-find cell 0
        // at t=0; the strict positive-t filter already rejects that, but
        // a nudged origin would not be rejected without the cell filter.
        let nudged = Point3::new(1.0, -1.0, 1e-13);
        let hit = bvh.query(&nudged, &Point3::new(1.0, -1.0, -10.0), Some(0));
        assert!(hit.is_none());
    }

    #[test]
    fn test_stale_after_edit() {
        let mut mesh = TriMesh::rectangle(2.0, 2.0).unwrap();
        let bvh = Bvh::build(&mesh).unwrap();
        mesh.set_vertex(0, Point3::new(-5.0, -5.0, 0.0)).unwrap();
        assert!(!bvh.is_current(&mesh));
    }

    #[test]
    fn test_zero_area_triangle_rejected() {
        let mesh = TriMesh::new(
            vec![
                Point3::origin(),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        assert!(matches!(Bvh::build(&mesh), Err(MeshError::Geometry(_))));
    }

    #[test]
    fn test_zero_length_segment() {
        let mesh = TriMesh::rectangle(2.0, 2.0).unwrap();
        let bvh = Bvh::build(&mesh).unwrap();
        let p = Point3::new(0.0, 0.0, -1.0);
        assert!(bvh.query(&p, &p, None).is_none());
    }
}
