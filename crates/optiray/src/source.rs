//! Ray sources that seed a trace.

use optiray_math::{orthonormal_basis, Complex64, Dir3, Point3};
use optiray_rays::RayCollection;

/// A collimated circular beam.
///
/// Rays start on a square grid clipped to a disc perpendicular to the
/// propagation direction, all travelling parallel. The field is linearly
/// polarized along the first transverse basis axis unless overridden.
#[derive(Debug, Clone)]
pub struct CollimatedSource {
    centre: Point3,
    direction: Dir3,
    radius: f64,
    spacing: f64,
    wavelength: f64,
    max_length: f64,
    amplitude: Complex64,
}

impl CollimatedSource {
    /// Beam of the given radius centred at `centre`, travelling along
    /// `direction`. Defaults: grid pitch of a quarter radius, 0.8 µm
    /// wavelength, 1e3 flight cutoff, unit amplitude.
    pub fn new(centre: Point3, direction: Dir3, radius: f64) -> Self {
        CollimatedSource {
            centre,
            direction,
            radius,
            spacing: radius / 4.0,
            wavelength: 0.8,
            max_length: 1.0e3,
            amplitude: Complex64::new(1.0, 0.0),
        }
    }

    /// Grid pitch between neighbouring rays.
    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    /// Vacuum wavelength in micrometres.
    pub fn with_wavelength(mut self, wavelength: f64) -> Self {
        self.wavelength = wavelength;
        self
    }

    /// Distance a ray may fly without hitting anything.
    pub fn with_max_length(mut self, max_length: f64) -> Self {
        self.max_length = max_length;
        self
    }

    /// Field amplitude along the polarization axis.
    pub fn with_amplitude(mut self, amplitude: Complex64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Generate the generation-0 batch.
    pub fn build(&self) -> RayCollection {
        let (u, v) = orthonormal_basis(&self.direction);
        let mut rays = RayCollection::empty(0);
        let steps = (self.radius / self.spacing).floor() as i64;
        for a in -steps..=steps {
            for b in -steps..=steps {
                let du = a as f64 * self.spacing;
                let dv = b as f64 * self.spacing;
                if du * du + dv * dv > self.radius * self.radius {
                    continue;
                }
                rays.origin.push(self.centre + u * du + v * dv);
                rays.direction.push(self.direction);
                rays.max_length.push(self.max_length);
                rays.e_vector.push(u);
                rays.e1_amp.push(self.amplitude);
                rays.e2_amp.push(Complex64::new(0.0, 0.0));
                rays.refractive_index.push(Complex64::new(1.0, 0.0));
                rays.wavelength.push(self.wavelength);
                rays.parent_ids.push(None);
                rays.optic.push(None);
                rays.face_id.push(None);
            }
        }
        rays
    }
}

/// A single ray, mainly for tests and focused probes.
pub fn single_ray(origin: Point3, direction: Dir3, wavelength: f64) -> RayCollection {
    let (u, _) = orthonormal_basis(&direction);
    let mut rays = RayCollection::empty(0);
    rays.origin.push(origin);
    rays.direction.push(direction);
    rays.max_length.push(1.0e3);
    rays.e_vector.push(u);
    rays.e1_amp.push(Complex64::new(1.0, 0.0));
    rays.e2_amp.push(Complex64::new(0.0, 0.0));
    rays.refractive_index.push(Complex64::new(1.0, 0.0));
    rays.wavelength.push(wavelength);
    rays.parent_ids.push(None);
    rays.optic.push(None);
    rays.face_id.push(None);
    rays
}
