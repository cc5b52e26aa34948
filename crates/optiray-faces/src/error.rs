//! Error types for face primitives.

use thiserror::Error;

/// Errors that can occur constructing or querying faces.
#[derive(Error, Debug)]
pub enum FaceError {
    /// Per-ray arrays passed to an intersection call disagree in length.
    #[error("per-ray array `{field}` has length {got}, expected {expected}")]
    ShapeMismatch {
        /// Name of the offending array.
        field: &'static str,
        /// Length implied by the batch.
        expected: usize,
        /// Length actually supplied.
        got: usize,
    },

    /// Degenerate or invalid primitive parameters. Raised at
    /// construction time, never during a query.
    #[error("invalid face geometry: {0}")]
    Geometry(String),

    /// A cell id that does not belong to this face.
    #[error("cell {cell} out of range for face with {count} cells")]
    CellOutOfRange {
        /// The offending cell id.
        cell: u32,
        /// Number of cells the face exposes.
        count: u32,
    },

    /// Error from the underlying triangulated surface or accelerator.
    #[error(transparent)]
    Mesh(#[from] optiray_mesh::MeshError),
}

/// Result type for face operations.
pub type Result<T> = std::result::Result<T, FaceError>;
