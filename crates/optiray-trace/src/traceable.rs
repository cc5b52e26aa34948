//! World-frame traceable objects: rigid placement plus owned faces.

use optiray_faces::{Face, Intersection};
use optiray_math::{Dir3, Point3, RigidTransform};
use optiray_rays::RayCollection;

use crate::error::{Result, TraceError};

/// A rigid-placed set of faces that rays can intersect.
///
/// The transform maps the object's local frame to the world frame and
/// carries no scale, so intersection lengths computed in local
/// coordinates are valid world distances unchanged. Faces are owned
/// exclusively; each gets a contiguous range of cell ids
/// (`offset .. offset + cell_count`), making a cell id unique within
/// the traceable.
#[derive(Debug, Clone)]
pub struct Traceable {
    transform: RigidTransform,
    faces: Vec<Box<dyn Face>>,
    cell_offsets: Vec<u32>,
}

impl Traceable {
    /// Build a traceable owning the given faces, placed at identity.
    pub fn new(faces: Vec<Box<dyn Face>>) -> Result<Self> {
        if faces.is_empty() {
            return Err(TraceError::Construction(
                "traceable needs at least one face".into(),
            ));
        }
        let mut t = Self {
            transform: RigidTransform::identity(),
            faces,
            cell_offsets: Vec::new(),
        };
        t.refresh_cells();
        Ok(t)
    }

    /// Set the placement at construction.
    pub fn with_transform(mut self, transform: RigidTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Current world placement.
    pub fn transform(&self) -> &RigidTransform {
        &self.transform
    }

    /// Move or reorient the object. Rigid motion only; face-local
    /// derived caches (the BVH) stay valid because they live in the
    /// local frame.
    pub fn set_transform(&mut self, transform: RigidTransform) {
        self.transform = transform;
    }

    /// The owned faces, in cell-offset order.
    pub fn faces(&self) -> &[Box<dyn Face>] {
        &self.faces
    }

    /// Mutable access to one face, for shape edits (e.g. mesh editing
    /// through a downcast to [`optiray_faces::MeshFace`]). If the edit
    /// changes the face's cell count, call
    /// [`Traceable::refresh_cells`] before the next intersection.
    pub fn face_mut(&mut self, index: usize) -> Option<&mut (dyn Face + 'static)> {
        self.faces.get_mut(index).map(|b| b.as_mut() as _)
    }

    /// Recompute the per-face cell-id offsets after an edit that changed
    /// a face's cell count.
    pub fn refresh_cells(&mut self) {
        self.cell_offsets.clear();
        let mut offset = 0;
        for face in &self.faces {
            self.cell_offsets.push(offset);
            offset += face.cell_count();
        }
    }

    /// Total cell count across owned faces.
    pub fn cell_count(&self) -> u32 {
        self.cell_offsets
            .last()
            .map_or(0, |&o| o + self.faces.last().unwrap().cell_count())
    }

    /// Map a traceable-level cell id to `(face index, face-local cell)`.
    pub fn face_for_cell(&self, cell: u32) -> Result<(usize, u32)> {
        for (i, &offset) in self.cell_offsets.iter().enumerate().rev() {
            if cell >= offset {
                let local = cell - offset;
                if local < self.faces[i].cell_count() {
                    return Ok((i, local));
                }
                break;
            }
        }
        Err(TraceError::UnknownCell {
            cell,
            total: self.cell_count(),
        })
    }

    /// Batch nearest-intersection query, world frame in and out.
    ///
    /// Each ray's winning record is the minimum-length hit across all
    /// owned faces; exact ties go to the lowest face index. Lengths are
    /// rigid-invariant and pass through untransformed.
    pub fn intersect(
        &self,
        p1: &[Point3],
        p2: &[Point3],
        max_length: &[f64],
    ) -> Result<Vec<Intersection>> {
        self.intersect_inner(p1, p2, max_length, None)
    }

    /// As [`Traceable::intersect`], with per-ray cell exclusion
    /// (traceable-level cell ids, typically each ray's `face_id` when
    /// this object emitted it).
    pub fn intersect_excluding(
        &self,
        p1: &[Point3],
        p2: &[Point3],
        max_length: &[f64],
        exclude: &[Option<u32>],
    ) -> Result<Vec<Intersection>> {
        if exclude.len() != p1.len() {
            return Err(TraceError::ShapeMismatch {
                field: "exclude",
                expected: p1.len(),
                got: exclude.len(),
            });
        }
        self.intersect_inner(p1, p2, max_length, Some(exclude))
    }

    fn intersect_inner(
        &self,
        p1: &[Point3],
        p2: &[Point3],
        max_length: &[f64],
        exclude: Option<&[Option<u32>]>,
    ) -> Result<Vec<Intersection>> {
        let n = p1.len();
        if p2.len() != n {
            return Err(TraceError::ShapeMismatch {
                field: "p2",
                expected: n,
                got: p2.len(),
            });
        }
        if max_length.len() != n {
            return Err(TraceError::ShapeMismatch {
                field: "max_length",
                expected: n,
                got: max_length.len(),
            });
        }

        let inv = self.transform.inverse();
        let lp1: Vec<Point3> = p1.iter().map(|p| inv.apply_point(p)).collect();
        let lp2: Vec<Point3> = p2.iter().map(|p| inv.apply_point(p)).collect();

        let mut best = vec![Intersection::miss(); n];
        for (face, &offset) in self.faces.iter().zip(&self.cell_offsets) {
            let records = match exclude {
                Some(exclude) => {
                    // Translate traceable-level exclusions to this
                    // face's local cell range.
                    let count = face.cell_count();
                    let local: Vec<Option<u32>> = exclude
                        .iter()
                        .map(|e| {
                            e.and_then(|cell| {
                                cell.checked_sub(offset).filter(|&l| l < count)
                            })
                        })
                        .collect();
                    face.intersect_excluding(&lp1, &lp2, max_length, &local)?
                }
                None => face.intersect(&lp1, &lp2, max_length)?,
            };
            for (slot, record) in best.iter_mut().zip(records) {
                *slot = slot.nearer(record.offset_cell(offset));
            }
        }

        // Winning points back to world coordinates.
        for record in &mut best {
            if !record.is_miss() {
                record.point = self.transform.apply_point(&record.point);
            }
        }
        Ok(best)
    }

    /// Project a ray batch to segment endpoints and intersect.
    pub fn trace_rays(&self, rays: &RayCollection) -> Result<Vec<Intersection>> {
        rays.validate()?;
        let (p1, p2) = rays.project_endpoints();
        self.intersect(&p1, &p2, &rays.max_length)
    }

    /// Nearest intersection of a single segment, a convenience for
    /// picking-style queries. The cutoff is the segment's own length.
    pub fn intersect_line(&self, p1: Point3, p2: Point3) -> Result<Intersection> {
        let max_length = (p2 - p1).norm();
        let records = self.intersect(&[p1], &[p2], &[max_length])?;
        Ok(records[0])
    }

    /// Outward surface normals in the world frame at the given world
    /// hit points on the given traceable-level cells.
    pub fn compute_normal_world(&self, points: &[Point3], cells: &[u32]) -> Result<Vec<Dir3>> {
        if cells.len() != points.len() {
            return Err(TraceError::ShapeMismatch {
                field: "cells",
                expected: points.len(),
                got: cells.len(),
            });
        }
        let inv = self.transform.inverse();
        let mut normals = Vec::with_capacity(points.len());
        for (point, &cell) in points.iter().zip(cells) {
            let (face_idx, local_cell) = self.face_for_cell(cell)?;
            let local_point = inv.apply_point(point);
            let local = self.faces[face_idx].compute_normal(&[local_point], &[local_cell])?;
            normals.push(self.transform.apply_dir(&local[0]));
        }
        Ok(normals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use optiray_faces::CircularFace;
    use optiray_math::Vec3;

    fn disc(radius: f64) -> Box<dyn Face> {
        Box::new(CircularFace::new(radius).unwrap())
    }

    fn disc_at(radius: f64, z: f64) -> Box<dyn Face> {
        Box::new(CircularFace::new(radius).unwrap().at_z(z))
    }

    fn two_plane_optic() -> Traceable {
        // Parallel discs at local z=0 and z=10.
        Traceable::new(vec![disc(20.0), disc_at(20.0, 10.0)]).unwrap()
    }

    #[test]
    fn test_single_face_world_frame() {
        // Disc moved to z=5 and tilted 45° about X.
        let t = Traceable::new(vec![disc(10.0)])
            .unwrap()
            .with_transform(
                RigidTransform::rotation_x(std::f64::consts::FRAC_PI_4)
                    .then(&RigidTransform::translation(0.0, 0.0, 5.0)),
            );
        let hit = t
            .intersect_line(Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 20.0))
            .unwrap();
        assert_relative_eq!(hit.length, 5.0, epsilon = 1e-10);
        assert_relative_eq!(hit.point, Point3::new(0.0, 0.0, 5.0), epsilon = 1e-10);
    }

    #[test]
    fn test_nearest_across_faces_batch() {
        // Parallel faces at z=0 and z=10; rays entering along +z from
        // z=-5 must all report the near face at length 5.
        let t = two_plane_optic();
        let n = 1000;
        let mut p1 = Vec::with_capacity(n);
        let mut p2 = Vec::with_capacity(n);
        // Deterministic pseudo-random offsets inside the aperture.
        let mut state = 0x2545f491_4f6cdd1du64;
        for _ in 0..n {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let x = ((state >> 11) as f64 / (1u64 << 53) as f64 - 0.5) * 20.0;
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let y = ((state >> 11) as f64 / (1u64 << 53) as f64 - 0.5) * 20.0;
            p1.push(Point3::new(x, y, -5.0));
            p2.push(Point3::new(x, y, 45.0));
        }
        let max_length = vec![50.0; n];
        let records = t.intersect(&p1, &p2, &max_length).unwrap();
        for record in &records {
            assert_relative_eq!(record.length, 5.0, epsilon = 1e-12);
            assert_eq!(record.cell, 0, "near face must win");
        }
    }

    #[test]
    fn test_tie_goes_to_lowest_face_index() {
        // Two coincident discs: deterministic winner is face 0.
        let t = Traceable::new(vec![disc(20.0), disc(20.0)]).unwrap();
        let records = t
            .intersect(
                &[Point3::new(0.0, 0.0, -5.0)],
                &[Point3::new(0.0, 0.0, 5.0)],
                &[10.0],
            )
            .unwrap();
        assert_relative_eq!(records[0].length, 5.0, epsilon = 1e-12);
        assert_eq!(records[0].cell, 0);
    }

    #[test]
    fn test_lengths_rigid_invariant() {
        // Same geometry, wildly different placement: lengths agree.
        let base = Traceable::new(vec![disc(10.0)]).unwrap();
        let placed = Traceable::new(vec![disc(10.0)])
            .unwrap()
            .with_transform(RigidTransform::from_orbit(
                Point3::new(7.0, -3.0, 2.0),
                25.0,
                40.0,
                60.0,
            ));

        let hit_base = base
            .intersect_line(Point3::new(0.0, 0.0, -4.0), Point3::new(0.0, 0.0, 4.0))
            .unwrap();

        // Shoot the equivalent segment in the placed frame.
        let tf = placed.transform();
        let p1 = tf.apply_point(&Point3::new(0.0, 0.0, -4.0));
        let p2 = tf.apply_point(&Point3::new(0.0, 0.0, 4.0));
        let hit_placed = placed.intersect_line(p1, p2).unwrap();

        assert_relative_eq!(hit_base.length, hit_placed.length, epsilon = 1e-10);
    }

    #[test]
    fn test_cell_mapping() {
        let t = two_plane_optic();
        assert_eq!(t.cell_count(), 2);
        assert_eq!(t.face_for_cell(0).unwrap(), (0, 0));
        assert_eq!(t.face_for_cell(1).unwrap(), (1, 0));
        assert!(matches!(
            t.face_for_cell(2),
            Err(TraceError::UnknownCell { cell: 2, total: 2 })
        ));
    }

    #[test]
    fn test_normal_rotates_with_transform() {
        let t = Traceable::new(vec![disc(10.0)])
            .unwrap()
            .with_transform(RigidTransform::rotation_x(std::f64::consts::FRAC_PI_2));
        // Local +Z normal becomes world -Y after +90° about X.
        let normals = t
            .compute_normal_world(&[Point3::origin()], &[0])
            .unwrap();
        assert_relative_eq!(normals[0].into_inner(), -Vec3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_shape_mismatch() {
        let t = Traceable::new(vec![disc(1.0)]).unwrap();
        let err = t
            .intersect(&[Point3::origin()], &[], &[1.0])
            .unwrap_err();
        assert!(matches!(err, TraceError::ShapeMismatch { field: "p2", .. }));
    }

    #[test]
    fn test_empty_faces_rejected() {
        assert!(matches!(
            Traceable::new(Vec::new()),
            Err(TraceError::Construction(_))
        ));
    }
}
