//! Spherical cap face (quadric with deterministic root selection).

use std::any::Any;

use optiray_math::{Dir3, Point3};

use crate::error::{FaceError, Result};
use crate::face::{check_batch, check_normal_batch, Face};
use crate::intersection::Intersection;

/// A spherical cap: the segment of a sphere cut by a circular aperture.
///
/// Local frame convention: the cap's vertex sits at the origin, the
/// sphere centre at `(0, 0, R)` where `R` is the curvature radius, and
/// the aperture opens towards +Z. The outward normal (away from the
/// centre of curvature) at the vertex is −Z.
#[derive(Debug, Clone)]
pub struct SphericalCapFace {
    curvature_radius: f64,
    aperture_radius: f64,
    /// Height of the cap rim above the vertex plane (cached).
    rim_height: f64,
}

impl SphericalCapFace {
    /// Create a cap with the given curvature radius and aperture
    /// diameter.
    pub fn new(curvature_radius: f64, diameter: f64) -> Result<Self> {
        if curvature_radius <= 0.0 || !curvature_radius.is_finite() {
            return Err(FaceError::Geometry(format!(
                "curvature radius must be positive, got {curvature_radius}"
            )));
        }
        if diameter <= 0.0 || !diameter.is_finite() {
            return Err(FaceError::Geometry(format!(
                "aperture diameter must be positive, got {diameter}"
            )));
        }
        let aperture_radius = diameter / 2.0;
        if aperture_radius > curvature_radius {
            return Err(FaceError::Geometry(format!(
                "aperture radius {aperture_radius} exceeds curvature radius {curvature_radius}"
            )));
        }
        let rim_height = curvature_radius
            - (curvature_radius * curvature_radius - aperture_radius * aperture_radius).sqrt();
        Ok(Self {
            curvature_radius,
            aperture_radius,
            rim_height,
        })
    }

    /// Curvature radius.
    pub fn curvature_radius(&self) -> f64 {
        self.curvature_radius
    }

    /// True if the local point lies on the cap (not the far side of the
    /// sphere, not outside the aperture).
    fn on_cap(&self, p: &Point3) -> bool {
        p.x * p.x + p.y * p.y <= self.aperture_radius * self.aperture_radius + 1e-12
            && p.z <= self.rim_height + 1e-9
    }
}

impl Face for SphericalCapFace {
    fn intersect(
        &self,
        p1: &[Point3],
        p2: &[Point3],
        max_length: &[f64],
    ) -> Result<Vec<Intersection>> {
        let n = check_batch(p1, p2, max_length)?;
        let centre = Point3::new(0.0, 0.0, self.curvature_radius);
        let r2 = self.curvature_radius * self.curvature_radius;
        let mut records = Vec::with_capacity(n);

        for i in 0..n {
            let delta = p2[i] - p1[i];
            let seg_len = delta.norm();
            if seg_len < 1e-14 {
                records.push(Intersection::miss());
                continue;
            }
            let d = delta / seg_len;
            let oc = p1[i] - centre;

            // Quadric |oc + t*d|² = R², unit d so a = 1.
            let b = 2.0 * oc.dot(&d);
            let c = oc.dot(&oc) - r2;
            let discriminant = b * b - 4.0 * c;
            if discriminant < 0.0 {
                records.push(Intersection::miss());
                continue;
            }
            let sqrt_disc = discriminant.sqrt();

            // Smallest positive root wins; the far root is only taken
            // when the near one is behind the origin or off the cap.
            let cutoff = seg_len.min(max_length[i]);
            let mut best = Intersection::miss();
            for t in [(-b - sqrt_disc) / 2.0, (-b + sqrt_disc) / 2.0] {
                if t <= 0.0 || t > cutoff {
                    continue;
                }
                let point = p1[i] + t * d;
                if self.on_cap(&point) {
                    best = Intersection {
                        length: t,
                        cell: 0,
                        point,
                    };
                    break;
                }
            }
            records.push(best);
        }
        Ok(records)
    }

    fn compute_normal(&self, points: &[Point3], cells: &[u32]) -> Result<Vec<Dir3>> {
        let n = check_normal_batch(points, cells)?;
        let centre = Point3::new(0.0, 0.0, self.curvature_radius);
        let mut normals = Vec::with_capacity(n);
        for p in points {
            // Outward means away from the centre of curvature.
            normals.push(Dir3::new_normalize(p - centre));
        }
        Ok(normals)
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
