#![warn(missing_docs)]

//! Batch polarization ray tracer.
//!
//! Rays are processed a whole generation at a time: a [`Scene`] holds
//! the optics, a source seeds generation 0, and each tracing step finds
//! every ray's nearest surface, applies the interface physics there, and
//! emits the child generation. The result is a [`RayTree`] linking every
//! traced ray back to its source.
//!
//! # Example
//!
//! ```
//! use optiray::{CollimatedSource, Optic, Scene, TraceLimits, Traceable};
//! use optiray::faces::{CircularFace, Face};
//! use optiray::math::{Dir3, Point3, Vec3};
//!
//! let face: Box<dyn Face> = Box::new(CircularFace::new(20.0).unwrap().flip());
//! let mirror = Optic::mirror(Traceable::new(vec![face]).unwrap());
//! let mut scene = Scene::new();
//! scene.add(mirror);
//!
//! let source = CollimatedSource::new(
//!     Point3::new(0.0, 0.0, -50.0),
//!     Dir3::new_normalize(Vec3::z()),
//!     5.0,
//! )
//! .build();
//! let tree = scene.trace(source, TraceLimits::default()).unwrap();
//! assert_eq!(tree.depth(), 2);
//! ```

pub use optiray_faces as faces;
pub use optiray_math as math;
pub use optiray_mesh as mesh;
pub use optiray_rays as rays;
pub use optiray_trace as trace;

mod scene;
mod source;

pub use optiray_rays::{OpticKey, RayCollection, RayTree};
pub use optiray_trace::{Behavior, Optic, RefractiveIndex, Result, TraceError, Traceable};
pub use scene::{Scene, TraceLimits};
pub use source::{single_ray, CollimatedSource};
