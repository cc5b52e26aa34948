//! Error types for ray batches.

use thiserror::Error;

/// Errors that can occur when assembling or linking ray batches.
#[derive(Error, Debug)]
pub enum RayError {
    /// Per-ray arrays passed to a batch operation disagree in length.
    #[error("per-ray array `{field}` has length {got}, expected {expected}")]
    ShapeMismatch {
        /// Name of the offending array.
        field: &'static str,
        /// Length implied by the batch.
        expected: usize,
        /// Length actually supplied.
        got: usize,
    },

    /// A parent id points outside the previous generation.
    #[error("parent id {parent} out of range for previous generation of {len} rays")]
    ParentOutOfRange {
        /// The offending parent index.
        parent: u32,
        /// Size of the previous generation.
        len: usize,
    },

    /// A collection was pushed with the wrong generation index.
    #[error("expected generation {expected}, got {got}")]
    GenerationMismatch {
        /// Generation the tree expected next.
        expected: u32,
        /// Generation carried by the pushed collection.
        got: u32,
    },

    /// Concatenation of collections from different generations.
    #[error("cannot merge collections from generations {a} and {b}")]
    MixedGenerations {
        /// Generation of the left operand.
        a: u32,
        /// Generation of the right operand.
        b: u32,
    },
}

/// Result type for ray-batch operations.
pub type Result<T> = std::result::Result<T, RayError>;
