#![warn(missing_docs)]

//! Intersection primitives (faces) for the optiray kernel.
//!
//! A [`Face`] answers batch segment-intersection queries in its own
//! local frame and evaluates outward surface normals at hit points.
//! Analytic primitives ([`CircularFace`], [`RectangularFace`],
//! [`SphericalCapFace`]) use closed-form crossings with deterministic
//! root selection; [`MeshFace`] runs triangulated surfaces through the
//! bounding-volume accelerator in `optiray-mesh`.

mod error;
mod face;
mod intersection;
mod meshface;
mod planar;
mod spherical;

pub use error::{FaceError, Result};
pub use face::Face;
pub use intersection::Intersection;
pub use meshface::MeshFace;
pub use planar::{CircularFace, RectangularFace};
pub use spherical::SphericalCapFace;
