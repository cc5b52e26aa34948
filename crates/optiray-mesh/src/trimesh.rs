//! Indexed triangle surfaces with edit tracking.

use optiray_math::{Point3, Vec3};

use crate::error::{MeshError, Result};

/// An indexed triangle surface.
///
/// Every mutation bumps `revision`, which derived structures (the BVH)
/// record at build time. A mismatch between the mesh revision and the
/// structure's recorded revision marks the structure stale; stale
/// structures refuse queries rather than answering from old geometry.
#[derive(Debug, Clone)]
pub struct TriMesh {
    vertices: Vec<Point3>,
    triangles: Vec<[u32; 3]>,
    revision: u64,
}

impl TriMesh {
    /// Build a mesh from vertex and index buffers.
    pub fn new(vertices: Vec<Point3>, triangles: Vec<[u32; 3]>) -> Result<Self> {
        if triangles.is_empty() {
            return Err(MeshError::Geometry("mesh has no triangles".into()));
        }
        let len = vertices.len();
        for (i, tri) in triangles.iter().enumerate() {
            for &v in tri {
                if v as usize >= len {
                    return Err(MeshError::IndexOutOfRange {
                        triangle: i,
                        vertex: v,
                        len,
                    });
                }
            }
        }
        Ok(Self {
            vertices,
            triangles,
            revision: 0,
        })
    }

    /// An axis-aligned rectangle in the local z=0 plane, centred on the
    /// origin, split into two triangles. Convenient as a planar optic
    /// aperture for the accelerated path.
    pub fn rectangle(width: f64, height: f64) -> Result<Self> {
        if width <= 0.0 || height <= 0.0 {
            return Err(MeshError::Geometry(format!(
                "rectangle must have positive extent, got {width} x {height}"
            )));
        }
        let (w, h) = (width / 2.0, height / 2.0);
        Self::new(
            vec![
                Point3::new(-w, -h, 0.0),
                Point3::new(w, -h, 0.0),
                Point3::new(w, h, 0.0),
                Point3::new(-w, h, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    /// Current edit revision.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Vertex positions.
    pub fn vertices(&self) -> &[Point3] {
        &self.vertices
    }

    /// Triangle index triples.
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// The three corner points of triangle `i`.
    pub fn triangle_points(&self, i: usize) -> [Point3; 3] {
        let [a, b, c] = self.triangles[i];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// Geometric normal of triangle `i` (right-handed winding), or
    /// `None` for a degenerate triangle.
    pub fn triangle_normal(&self, i: usize) -> Option<Vec3> {
        let [a, b, c] = self.triangle_points(i);
        let n = (b - a).cross(&(c - a));
        let len = n.norm();
        if len < 1e-14 {
            None
        } else {
            Some(n / len)
        }
    }

    /// Move one vertex. Marks the mesh edited.
    pub fn set_vertex(&mut self, index: usize, p: Point3) -> Result<()> {
        if index >= self.vertices.len() {
            return Err(MeshError::Geometry(format!(
                "vertex index {index} out of range ({} vertices)",
                self.vertices.len()
            )));
        }
        self.vertices[index] = p;
        self.revision += 1;
        Ok(())
    }

    /// Replace the whole vertex buffer. The triangle topology must still
    /// fit. Marks the mesh edited.
    pub fn set_vertices(&mut self, vertices: Vec<Point3>) -> Result<()> {
        let len = vertices.len();
        for (i, tri) in self.triangles.iter().enumerate() {
            for &v in tri {
                if v as usize >= len {
                    return Err(MeshError::IndexOutOfRange {
                        triangle: i,
                        vertex: v,
                        len,
                    });
                }
            }
        }
        self.vertices = vertices;
        self.revision += 1;
        Ok(())
    }

    /// Append a triangle. Marks the mesh edited.
    pub fn push_triangle(&mut self, tri: [u32; 3]) -> Result<()> {
        let len = self.vertices.len();
        for &v in &tri {
            if v as usize >= len {
                return Err(MeshError::IndexOutOfRange {
                    triangle: self.triangles.len(),
                    vertex: v,
                    len,
                });
            }
        }
        self.triangles.push(tri);
        self.revision += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_index() {
        let err = TriMesh::new(vec![Point3::origin()], vec![[0, 0, 5]]).unwrap_err();
        assert!(matches!(err, MeshError::IndexOutOfRange { vertex: 5, .. }));
    }

    #[test]
    fn test_new_rejects_empty() {
        assert!(TriMesh::new(vec![], vec![]).is_err());
    }

    #[test]
    fn test_rectangle() {
        let mesh = TriMesh::rectangle(4.0, 2.0).unwrap();
        assert_eq!(mesh.num_triangles(), 2);
        let n = mesh.triangle_normal(0).unwrap();
        assert!((n.z - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_edits_bump_revision() {
        let mut mesh = TriMesh::rectangle(1.0, 1.0).unwrap();
        assert_eq!(mesh.revision(), 0);
        mesh.set_vertex(0, Point3::new(-1.0, -1.0, 0.0)).unwrap();
        assert_eq!(mesh.revision(), 1);
        mesh.push_triangle([1, 2, 3]).unwrap();
        assert_eq!(mesh.revision(), 2);
    }

    #[test]
    fn test_set_vertices_validates_topology() {
        let mut mesh = TriMesh::rectangle(1.0, 1.0).unwrap();
        assert!(mesh.set_vertices(vec![Point3::origin()]).is_err());
        // Failed edit must not mark the mesh changed.
        assert_eq!(mesh.revision(), 0);
    }
}
