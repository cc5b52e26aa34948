//! Error types for meshes and the accelerator.

use thiserror::Error;

/// Errors that can occur when building or querying mesh structures.
#[derive(Error, Debug)]
pub enum MeshError {
    /// Mesh data is degenerate or inconsistent.
    #[error("invalid mesh geometry: {0}")]
    Geometry(String),

    /// A triangle index points outside the vertex array.
    #[error("triangle {triangle} references vertex {vertex}, but mesh has {len} vertices")]
    IndexOutOfRange {
        /// Index of the offending triangle.
        triangle: usize,
        /// The out-of-range vertex index.
        vertex: u32,
        /// Number of vertices in the mesh.
        len: usize,
    },

    /// A query was issued against a hierarchy that is missing or was
    /// built from an older revision of the mesh. The caller must rebuild
    /// explicitly; queries never rebuild behind the scenes.
    #[error("accelerator not built for mesh revision {mesh_revision} (built: {built_revision:?})")]
    NotBuilt {
        /// Current revision of the mesh.
        mesh_revision: u64,
        /// Revision the hierarchy was built from, if it exists at all.
        built_revision: Option<u64>,
    },
}

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;
