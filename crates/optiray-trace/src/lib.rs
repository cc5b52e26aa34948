//! World-frame optical elements and interface physics.
//!
//! [`Traceable`] wraps a set of body-frame faces behind a rigid
//! transform and answers nearest-hit queries in world coordinates.
//! [`Optic`] adds the media and evaluates what happens to rays on
//! arrival: Fresnel splitting, mirror reflection, or absorption.

#![warn(missing_docs)]

mod error;
mod fresnel;
mod optic;
mod traceable;

pub use error::{Result, TraceError};
pub use fresnel::{convert_to_sp, fresnel_split, FresnelSplit, SpDecomposition};
pub use optic::{Behavior, ChildRays, Optic, RefractiveIndex};
pub use traceable::Traceable;
