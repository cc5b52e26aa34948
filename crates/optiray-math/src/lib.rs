#![warn(missing_docs)]

//! Math types for the optiray tracing kernel.
//!
//! Thin wrappers around nalgebra providing domain-specific types for
//! batch ray optics: points, vectors, unit directions, complex field
//! amplitudes, rigid (isometric) transforms, and tolerance constants.
//!
//! The transform type is deliberately restricted to rotation plus
//! translation. Ray lengths are invariant under a rigid map, so the
//! tracing code can pass intersection distances between frames without
//! rescaling; a general affine transform would silently break that.

use nalgebra::{Rotation3, Unit, Vector3};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A complex scalar, used for field amplitudes and refractive indices.
pub type Complex64 = nalgebra::Complex<f64>;

/// A rigid transform: rotation followed by translation, no scale.
///
/// Maps local coordinates to world coordinates as `R * p + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    /// The rotation part.
    pub rotation: Rotation3<f64>,
    /// The translation part, applied after rotation.
    pub translation: Vec3,
}

impl RigidTransform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            rotation: Rotation3::identity(),
            translation: Vec3::zeros(),
        }
    }

    /// Build from rotation and translation parts.
    pub fn from_parts(rotation: Rotation3<f64>, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Pure translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            rotation: Rotation3::identity(),
            translation: Vec3::new(dx, dy, dz),
        }
    }

    /// Pure rotation about the X axis by `angle` radians.
    pub fn rotation_x(angle: f64) -> Self {
        Self::from_parts(
            Rotation3::from_axis_angle(&Vec3::x_axis(), angle),
            Vec3::zeros(),
        )
    }

    /// Pure rotation about the Y axis by `angle` radians.
    pub fn rotation_y(angle: f64) -> Self {
        Self::from_parts(
            Rotation3::from_axis_angle(&Vec3::y_axis(), angle),
            Vec3::zeros(),
        )
    }

    /// Pure rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        Self::from_parts(
            Rotation3::from_axis_angle(&Vec3::z_axis(), angle),
            Vec3::zeros(),
        )
    }

    /// Build an optical-bench placement from a centre position and
    /// orientation angles in degrees.
    ///
    /// The local +Z axis ends up pointing along the component's optical
    /// direction. Angles are applied as: rotate about Z by `orientation`,
    /// about X by `elevation`, about Z again by `rotation` (spin around
    /// the optical axis), then translate to `centre`.
    pub fn from_orbit(centre: Point3, orientation: f64, elevation: f64, rotation: f64) -> Self {
        let rot = Rotation3::from_axis_angle(&Vec3::z_axis(), orientation.to_radians())
            * Rotation3::from_axis_angle(&Vec3::x_axis(), elevation.to_radians())
            * Rotation3::from_axis_angle(&Vec3::z_axis(), rotation.to_radians());
        Self::from_parts(rot, centre.coords)
    }

    /// The optical direction of this placement: the image of local +Z.
    pub fn optical_axis(&self) -> Dir3 {
        Dir3::new_unchecked(self.rotation * Vec3::z())
    }

    /// Transform a point from local to world coordinates.
    #[inline]
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        Point3::from(self.rotation * p.coords + self.translation)
    }

    /// Transform a vector (rotation only, translation ignored).
    #[inline]
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        self.rotation * v
    }

    /// Transform a unit direction. Rotation preserves length, so the
    /// result stays unit without renormalization.
    #[inline]
    pub fn apply_dir(&self, d: &Dir3) -> Dir3 {
        Dir3::new_unchecked(self.rotation * d.as_ref())
    }

    /// Exact inverse. Rigid transforms are always invertible:
    /// `R⁻¹ = Rᵀ`, `t⁻¹ = -Rᵀ t`.
    pub fn inverse(&self) -> Self {
        let inv_rot = self.rotation.inverse();
        Self {
            rotation: inv_rot,
            translation: -(inv_rot * self.translation),
        }
    }

    /// Compose: apply `self` first, then `outer`.
    pub fn then(&self, outer: &RigidTransform) -> Self {
        Self {
            rotation: outer.rotation * self.rotation,
            translation: outer.rotation * self.translation + outer.translation,
        }
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Any two unit vectors orthogonal to `d` and to each other.
///
/// Used to span the plane perpendicular to a ray direction, e.g. for
/// laying out source bundles or picking a polarization reference axis.
pub fn orthonormal_basis(d: &Dir3) -> (Vec3, Vec3) {
    // Pick the world axis least aligned with d to avoid degeneracy.
    let helper = if d.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
    let u = d.cross(&helper).normalize();
    let v = d.cross(&u);
    (u, v)
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance.
    pub linear: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
}

impl Tolerance {
    /// Default tracing tolerances (1e-9 linear, 1e-9 rad angular).
    pub const DEFAULT: Self = Self {
        linear: 1e-9,
        angular: 1e-9,
    };

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_identity() {
        let t = RigidTransform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(t.apply_point(&p), p, epsilon = 1e-12);
    }

    #[test]
    fn test_translation() {
        let t = RigidTransform::translation(10.0, 20.0, 30.0);
        let p = Point3::new(1.0, 2.0, 3.0);
        let q = t.apply_point(&p);
        assert_relative_eq!(q, Point3::new(11.0, 22.0, 33.0), epsilon = 1e-12);
        // Vectors ignore translation
        let v = t.apply_vec(&Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(v, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_z_90() {
        let t = RigidTransform::rotation_z(PI / 2.0);
        let q = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert!(q.x.abs() < 1e-12);
        assert_relative_eq!(q.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_round_trip() {
        // Arbitrary rotation+translation compositions must round-trip.
        let t = RigidTransform::rotation_z(0.3)
            .then(&RigidTransform::translation(1.0, -2.0, 5.0))
            .then(&RigidTransform::rotation_x(-1.1))
            .then(&RigidTransform::rotation_y(2.7))
            .then(&RigidTransform::translation(-4.0, 0.5, 0.1));
        let inv = t.inverse();
        let p = Point3::new(3.0, -7.0, 2.5);
        let back = inv.apply_point(&t.apply_point(&p));
        assert_relative_eq!(back, p, epsilon = 1e-10);
    }

    #[test]
    fn test_then_order() {
        // Rotate 90° about Z, then translate: (1,0,0) -> (0,1,0) -> (1,1,0)
        let t = RigidTransform::rotation_z(PI / 2.0)
            .then(&RigidTransform::translation(1.0, 0.0, 0.0));
        let q = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(q, Point3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_orbit_axis() {
        // Zero angles: optical axis is world +Z.
        let t = RigidTransform::from_orbit(Point3::origin(), 0.0, 0.0, 0.0);
        assert_relative_eq!(t.optical_axis().into_inner(), Vec3::z(), epsilon = 1e-12);

        // Elevation -90° tips the axis onto +Y.
        let t = RigidTransform::from_orbit(Point3::origin(), 0.0, -90.0, 0.0);
        assert_relative_eq!(t.optical_axis().into_inner(), Vec3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_dir_stays_unit() {
        let t = RigidTransform::from_orbit(Point3::new(1.0, 2.0, 3.0), 34.0, -56.0, 12.0);
        let d = Dir3::new_normalize(Vec3::new(1.0, 2.0, -0.5));
        let mapped = t.apply_dir(&d);
        assert_relative_eq!(mapped.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_orthonormal_basis() {
        for v in [
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 2.0, 3.0),
        ] {
            let d = Dir3::new_normalize(v);
            let (u, w) = orthonormal_basis(&d);
            assert!(u.dot(d.as_ref()).abs() < 1e-12);
            assert!(w.dot(d.as_ref()).abs() < 1e-12);
            assert!(u.dot(&w).abs() < 1e-12);
            assert_relative_eq!(u.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(w.norm(), 1.0, epsilon = 1e-12);
        }
    }
}
