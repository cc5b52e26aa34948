//! Polygonal face backed by the bounding-volume accelerator.

use std::any::Any;

use optiray_math::{Dir3, Point3, Vec3};
use optiray_mesh::{Bvh, MeshError, TriMesh};

use crate::error::{FaceError, Result};
use crate::face::{check_batch, check_normal_batch, Face};
use crate::intersection::Intersection;

/// A face made of triangles, intersected through a BVH.
///
/// The hierarchy is built explicitly with [`MeshFace::rebuild`]; any
/// mesh edit (via [`MeshFace::mesh_mut`]) makes it stale, and querying a
/// stale face is a programming error surfaced as
/// [`MeshError::NotBuilt`]. Queries never rebuild implicitly.
#[derive(Debug, Clone)]
pub struct MeshFace {
    mesh: TriMesh,
    bvh: Option<Bvh>,
}

impl MeshFace {
    /// Wrap a triangulated surface. The accelerator starts unbuilt.
    pub fn new(mesh: TriMesh) -> Self {
        Self { mesh, bvh: None }
    }

    /// Build (or rebuild) the hierarchy for the mesh's current content.
    pub fn rebuild(&mut self) -> Result<()> {
        self.bvh = Some(Bvh::build(&self.mesh)?);
        Ok(())
    }

    /// The underlying surface.
    pub fn mesh(&self) -> &TriMesh {
        &self.mesh
    }

    /// Mutable access for shape edits. Any edit bumps the mesh revision,
    /// so the next query fails until [`MeshFace::rebuild`] is called.
    pub fn mesh_mut(&mut self) -> &mut TriMesh {
        &mut self.mesh
    }

    /// The current hierarchy, or the staleness error.
    fn current_bvh(&self) -> Result<&Bvh> {
        match &self.bvh {
            Some(bvh) if bvh.is_current(&self.mesh) => Ok(bvh),
            other => Err(FaceError::Mesh(MeshError::NotBuilt {
                mesh_revision: self.mesh.revision(),
                built_revision: other.as_ref().map(|b| b.built_revision()),
            })),
        }
    }

    fn query_batch(
        &self,
        p1: &[Point3],
        p2: &[Point3],
        max_length: &[f64],
        exclude: Option<&[Option<u32>]>,
    ) -> Result<Vec<Intersection>> {
        let n = check_batch(p1, p2, max_length)?;
        let bvh = self.current_bvh()?;
        let mut records = Vec::with_capacity(n);
        for i in 0..n {
            let excl = exclude.and_then(|e| e[i]);
            let record = match bvh.query(&p1[i], &p2[i], excl) {
                Some(hit) if hit.t <= max_length[i] => Intersection {
                    length: hit.t,
                    cell: hit.cell,
                    point: hit.point,
                },
                _ => Intersection::miss(),
            };
            records.push(record);
        }
        Ok(records)
    }
}

impl Face for MeshFace {
    fn intersect(
        &self,
        p1: &[Point3],
        p2: &[Point3],
        max_length: &[f64],
    ) -> Result<Vec<Intersection>> {
        self.query_batch(p1, p2, max_length, None)
    }

    fn intersect_excluding(
        &self,
        p1: &[Point3],
        p2: &[Point3],
        max_length: &[f64],
        exclude: &[Option<u32>],
    ) -> Result<Vec<Intersection>> {
        if exclude.len() != p1.len() {
            return Err(FaceError::ShapeMismatch {
                field: "exclude",
                expected: p1.len(),
                got: exclude.len(),
            });
        }
        self.query_batch(p1, p2, max_length, Some(exclude))
    }

    fn compute_normal(&self, points: &[Point3], cells: &[u32]) -> Result<Vec<Dir3>> {
        let n = check_normal_batch(points, cells)?;
        let count = self.cell_count();
        let mut normals = Vec::with_capacity(n);
        for &cell in cells {
            if cell >= count {
                return Err(FaceError::CellOutOfRange { cell, count });
            }
            let normal: Vec3 = self.mesh.triangle_normal(cell as usize).ok_or_else(|| {
                FaceError::Geometry(format!("triangle {cell} is degenerate"))
            })?;
            normals.push(Dir3::new_unchecked(normal));
        }
        Ok(normals)
    }

    fn cell_count(&self) -> u32 {
        self.mesh.num_triangles() as u32
    }

    fn clone_box(&self) -> Box<dyn Face> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
