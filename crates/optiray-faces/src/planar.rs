//! Planar face primitives (closed-form z=0 crossing).

use std::any::Any;

use optiray_math::{Dir3, Point3, Vec3};

use crate::error::{FaceError, Result};
use crate::face::{check_batch, check_normal_batch, Face};
use crate::intersection::Intersection;

/// Where a segment crosses the local `z = z_plane` plane, as
/// `(length, point)`.
///
/// `None` if the segment is parallel to the plane, crosses at or before
/// its start, beyond its end, or beyond `max_length`.
fn cross_plane(p1: &Point3, p2: &Point3, max_length: f64, z_plane: f64) -> Option<(f64, Point3)> {
    let delta = p2 - p1;
    if delta.z.abs() < 1e-14 {
        return None;
    }
    let s = (z_plane - p1.z) / delta.z;
    // Strictly positive: a segment starting exactly on the plane does
    // not hit it again at its own origin.
    if s <= 0.0 || s > 1.0 {
        return None;
    }
    let length = s * delta.norm();
    if length > max_length {
        return None;
    }
    Some((length, p1 + s * delta))
}

/// A flat circular aperture in the plane `z = z_plane` (default 0),
/// centred on the local Z axis, with outward normal +Z.
#[derive(Debug, Clone)]
pub struct CircularFace {
    radius: f64,
    z_plane: f64,
    flipped: bool,
}

impl CircularFace {
    /// Create a disc of the given radius in the z=0 plane.
    pub fn new(radius: f64) -> Result<Self> {
        if radius <= 0.0 || !radius.is_finite() {
            return Err(FaceError::Geometry(format!(
                "circular face radius must be positive, got {radius}"
            )));
        }
        Ok(Self {
            radius,
            z_plane: 0.0,
            flipped: false,
        })
    }

    /// Shift the face to the plane `z = z_plane`, for stacking several
    /// parallel faces inside one traceable (e.g. a slab or a lens
    /// barrel).
    pub fn at_z(mut self, z_plane: f64) -> Self {
        self.z_plane = z_plane;
        self
    }

    /// Reverse the normal to -Z. The entry face of a slab points
    /// outward, against the stacking direction.
    pub fn flip(mut self) -> Self {
        self.flipped = !self.flipped;
        self
    }

    /// Aperture radius.
    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl Face for CircularFace {
    fn intersect(
        &self,
        p1: &[Point3],
        p2: &[Point3],
        max_length: &[f64],
    ) -> Result<Vec<Intersection>> {
        let n = check_batch(p1, p2, max_length)?;
        let r2 = self.radius * self.radius;
        let mut records = Vec::with_capacity(n);
        for i in 0..n {
            let record = match cross_plane(&p1[i], &p2[i], max_length[i], self.z_plane) {
                Some((length, point)) if point.x * point.x + point.y * point.y <= r2 => {
                    Intersection {
                        length,
                        cell: 0,
                        point,
                    }
                }
                _ => Intersection::miss(),
            };
            records.push(record);
        }
        Ok(records)
    }

    fn compute_normal(&self, points: &[Point3], cells: &[u32]) -> Result<Vec<Dir3>> {
        let n = check_normal_batch(points, cells)?;
        let axis = if self.flipped { -Vec3::z() } else { Vec3::z() };
        Ok(vec![Dir3::new_unchecked(axis); n])
    }

    fn clone_box(&self) -> Box<dyn Face> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A flat rectangular aperture in the plane `z = z_plane` (default 0),
/// centred on the local Z axis, with outward normal +Z.
#[derive(Debug, Clone)]
pub struct RectangularFace {
    half_width: f64,
    half_height: f64,
    z_plane: f64,
    flipped: bool,
}

impl RectangularFace {
    /// Create a `width` x `height` rectangle in the z=0 plane.
    pub fn new(width: f64, height: f64) -> Result<Self> {
        if width <= 0.0 || height <= 0.0 || !width.is_finite() || !height.is_finite() {
            return Err(FaceError::Geometry(format!(
                "rectangular face must have positive extent, got {width} x {height}"
            )));
        }
        Ok(Self {
            half_width: width / 2.0,
            half_height: height / 2.0,
            z_plane: 0.0,
            flipped: false,
        })
    }

    /// Shift the face to the plane `z = z_plane`.
    pub fn at_z(mut self, z_plane: f64) -> Self {
        self.z_plane = z_plane;
        self
    }

    /// Reverse the normal to -Z.
    pub fn flip(mut self) -> Self {
        self.flipped = !self.flipped;
        self
    }
}

impl Face for RectangularFace {
    fn intersect(
        &self,
        p1: &[Point3],
        p2: &[Point3],
        max_length: &[f64],
    ) -> Result<Vec<Intersection>> {
        let n = check_batch(p1, p2, max_length)?;
        let mut records = Vec::with_capacity(n);
        for i in 0..n {
            let record = match cross_plane(&p1[i], &p2[i], max_length[i], self.z_plane) {
                Some((length, point))
                    if point.x.abs() <= self.half_width && point.y.abs() <= self.half_height =>
                {
                    Intersection {
                        length,
                        cell: 0,
                        point,
                    }
                }
                _ => Intersection::miss(),
            };
            records.push(record);
        }
        Ok(records)
    }

    fn compute_normal(&self, points: &[Point3], cells: &[u32]) -> Result<Vec<Dir3>> {
        let n = check_normal_batch(points, cells)?;
        let axis = if self.flipped { -Vec3::z() } else { Vec3::z() };
        Ok(vec![Dir3::new_unchecked(axis); n])
    }

    fn clone_box(&self) -> Box<dyn Face> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
