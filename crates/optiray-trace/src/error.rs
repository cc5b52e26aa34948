//! Error types for tracing.

use thiserror::Error;

/// Errors that can occur during a trace or splitting call.
#[derive(Error, Debug)]
pub enum TraceError {
    /// Per-ray arrays passed to a call disagree in length.
    #[error("per-ray array `{field}` has length {got}, expected {expected}")]
    ShapeMismatch {
        /// Name of the offending array.
        field: &'static str,
        /// Length implied by the batch.
        expected: usize,
        /// Length actually supplied.
        got: usize,
    },

    /// Invalid traceable construction.
    #[error("invalid traceable: {0}")]
    Construction(String),

    /// A cell id that belongs to none of the owned faces.
    #[error("cell {cell} does not belong to any face (total cells: {total})")]
    UnknownCell {
        /// The offending cell id.
        cell: u32,
        /// Total cell count across owned faces.
        total: u32,
    },

    /// Error from a face primitive or the accelerator.
    #[error(transparent)]
    Face(#[from] optiray_faces::FaceError),

    /// Error from ray-batch bookkeeping.
    #[error(transparent)]
    Ray(#[from] optiray_rays::RayError),
}

/// Result type for tracing operations.
pub type Result<T> = std::result::Result<T, TraceError>;
