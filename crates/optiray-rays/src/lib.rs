#![warn(missing_docs)]

//! Batch ray collections and ray-tree bookkeeping for optiray.
//!
//! The tracing engine processes an entire generation of rays at a time
//! with whole-array operations. [`RayCollection`] is that batch: one
//! vector per ray attribute, all the same length. [`RayTree`] links
//! generations together through parent ids so any traced ray can be
//! walked back to its source.

mod collection;
mod error;
mod tree;

pub use collection::{collect_rays, RayCollection};
pub use error::{RayError, Result};
pub use tree::RayTree;

slotmap::new_key_type! {
    /// Weak handle to an optic owned by a scene.
    ///
    /// Rays carry this as a back-reference to the optic that emitted
    /// them. It never keeps the optic alive; a scene lookup after the
    /// optic is removed simply returns `None`.
    pub struct OpticKey;
}
