#![warn(missing_docs)]

//! Triangulated surfaces and the bounding-volume accelerator for optiray.
//!
//! [`TriMesh`] is an indexed triangle surface with an edit revision
//! counter; [`Bvh`] is a SAH-built hierarchy over its triangles
//! answering nearest segment-intersection queries. The hierarchy is a
//! derived cache: it records the mesh revision it was built from, and
//! owners must rebuild after any shape edit before querying again.
//! Rigid motion of the owning optic never invalidates it, since the
//! hierarchy lives in the optic's local frame.

mod aabb;
mod bvh;
mod error;
mod trimesh;

pub use aabb::Aabb3;
pub use bvh::{Bvh, Segment, TriangleHit};
pub use error::{MeshError, Result};
pub use trimesh::TriMesh;
