//! The structure-of-arrays ray batch.

use optiray_math::{Complex64, Dir3, Point3, Vec3};

use crate::error::{RayError, Result};
use crate::OpticKey;

/// A batch of N rays sharing one generation index.
///
/// Stored structure-of-arrays: every per-ray attribute is its own vector
/// and all vectors have identical length. Tracing and splitting operate
/// on whole batches, never on individual ray objects.
///
/// Polarization bookkeeping: `e_vector` is a reference axis orthogonal
/// to the ray direction; `e1_amp` is the complex field amplitude along
/// it and `e2_amp` the amplitude along `direction × e_vector`.
#[derive(Debug, Clone)]
pub struct RayCollection {
    generation: u32,
    /// Ray start points (world frame).
    pub origin: Vec<Point3>,
    /// Unit propagation directions.
    pub direction: Vec<Dir3>,
    /// Per-ray cutoff distance; no intersection is sought beyond it.
    pub max_length: Vec<f64>,
    /// Polarization reference axis, orthogonal to `direction`.
    pub e_vector: Vec<Vec3>,
    /// Complex field amplitude along `e_vector`.
    pub e1_amp: Vec<Complex64>,
    /// Complex field amplitude along `direction × e_vector`.
    pub e2_amp: Vec<Complex64>,
    /// Complex refractive index of the medium the ray travels through.
    pub refractive_index: Vec<Complex64>,
    /// Vacuum wavelength, micrometres.
    pub wavelength: Vec<f64>,
    /// Index into the previous generation, `None` for source rays.
    pub parent_ids: Vec<Option<u32>>,
    /// Weak handle to the optic that emitted the ray, for reporting and
    /// self-intersection suppression. Never owns the optic.
    pub optic: Vec<Option<OpticKey>>,
    /// Cell id (within `optic`) of the face that emitted the ray.
    pub face_id: Vec<Option<u32>>,
}

impl RayCollection {
    /// An empty collection for the given generation.
    pub fn empty(generation: u32) -> Self {
        Self {
            generation,
            origin: Vec::new(),
            direction: Vec::new(),
            max_length: Vec::new(),
            e_vector: Vec::new(),
            e1_amp: Vec::new(),
            e2_amp: Vec::new(),
            refractive_index: Vec::new(),
            wavelength: Vec::new(),
            parent_ids: Vec::new(),
            optic: Vec::new(),
            face_id: Vec::new(),
        }
    }

    /// Generation index of this batch.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Number of rays in the batch.
    pub fn len(&self) -> usize {
        self.origin.len()
    }

    /// True if the batch holds no rays.
    pub fn is_empty(&self) -> bool {
        self.origin.is_empty()
    }

    /// Check the batch invariants: all arrays share one length and every
    /// direction is unit within 1e-9.
    pub fn validate(&self) -> Result<()> {
        let n = self.origin.len();
        let checks: [(&'static str, usize); 10] = [
            ("direction", self.direction.len()),
            ("max_length", self.max_length.len()),
            ("e_vector", self.e_vector.len()),
            ("e1_amp", self.e1_amp.len()),
            ("e2_amp", self.e2_amp.len()),
            ("refractive_index", self.refractive_index.len()),
            ("wavelength", self.wavelength.len()),
            ("parent_ids", self.parent_ids.len()),
            ("optic", self.optic.len()),
            ("face_id", self.face_id.len()),
        ];
        for (field, got) in checks {
            if got != n {
                return Err(RayError::ShapeMismatch {
                    field,
                    expected: n,
                    got,
                });
            }
        }
        for d in &self.direction {
            debug_assert!((d.norm() - 1.0).abs() <= 1e-9);
        }
        Ok(())
    }

    /// Segment endpoints for an intersection sweep:
    /// `p2 = origin + max_length * direction`.
    pub fn project_endpoints(&self) -> (Vec<Point3>, Vec<Point3>) {
        let p1 = self.origin.clone();
        let p2 = self
            .origin
            .iter()
            .zip(&self.direction)
            .zip(&self.max_length)
            .map(|((o, d), &l)| o + l * d.as_ref())
            .collect();
        (p1, p2)
    }

    /// Field amplitude of ray `i`: `√(|E1|² + |E2|²)`.
    pub fn amplitude(&self, i: usize) -> f64 {
        (self.e1_amp[i].norm_sqr() + self.e2_amp[i].norm_sqr()).sqrt()
    }

    /// Sum of squared amplitudes over the batch.
    pub fn total_power(&self) -> f64 {
        (0..self.len())
            .map(|i| self.e1_amp[i].norm_sqr() + self.e2_amp[i].norm_sqr())
            .sum()
    }

    /// Append all rays of `other` to `self`.
    ///
    /// Both operands must belong to the same generation; sibling
    /// collections produced by one splitting step keep their parent ids
    /// unchanged, so after merging a parent may be referenced twice
    /// (reflected and transmitted child).
    pub fn concat(&mut self, other: RayCollection) -> Result<()> {
        if self.generation != other.generation {
            return Err(RayError::MixedGenerations {
                a: self.generation,
                b: other.generation,
            });
        }
        self.origin.extend(other.origin);
        self.direction.extend(other.direction);
        self.max_length.extend(other.max_length);
        self.e_vector.extend(other.e_vector);
        self.e1_amp.extend(other.e1_amp);
        self.e2_amp.extend(other.e2_amp);
        self.refractive_index.extend(other.refractive_index);
        self.wavelength.extend(other.wavelength);
        self.parent_ids.extend(other.parent_ids);
        self.optic.extend(other.optic);
        self.face_id.extend(other.face_id);
        Ok(())
    }

    /// Keep only the rays where `keep` is true.
    ///
    /// Parent ids are values, not positions, so dropping rows leaves the
    /// survivors' links into the previous generation intact.
    pub fn filter(&self, keep: &[bool]) -> Result<RayCollection> {
        if keep.len() != self.len() {
            return Err(RayError::ShapeMismatch {
                field: "keep",
                expected: self.len(),
                got: keep.len(),
            });
        }
        fn pick<T: Clone>(src: &[T], keep: &[bool]) -> Vec<T> {
            src.iter()
                .zip(keep)
                .filter(|(_, &k)| k)
                .map(|(v, _)| v.clone())
                .collect()
        }
        Ok(RayCollection {
            generation: self.generation,
            origin: pick(&self.origin, keep),
            direction: pick(&self.direction, keep),
            max_length: pick(&self.max_length, keep),
            e_vector: pick(&self.e_vector, keep),
            e1_amp: pick(&self.e1_amp, keep),
            e2_amp: pick(&self.e2_amp, keep),
            refractive_index: pick(&self.refractive_index, keep),
            wavelength: pick(&self.wavelength, keep),
            parent_ids: pick(&self.parent_ids, keep),
            optic: pick(&self.optic, keep),
            face_id: pick(&self.face_id, keep),
        })
    }
}

/// Merge sibling collections from one splitting step into a single
/// generation batch. All operands must share a generation index.
pub fn collect_rays<I>(parts: I) -> Result<RayCollection>
where
    I: IntoIterator<Item = RayCollection>,
{
    let mut iter = parts.into_iter();
    let mut merged = match iter.next() {
        Some(first) => first,
        None => return Ok(RayCollection::empty(0)),
    };
    for part in iter {
        merged.concat(part)?;
    }
    Ok(merged)
}
