//! Optical elements: a [`Traceable`] body plus the interface physics
//! applied whenever rays strike it.

use optiray_math::{Complex64, Dir3, Point3, Vec3};
use optiray_rays::{OpticKey, RayCollection};

use crate::error::{Result, TraceError};
use crate::fresnel::{convert_to_sp, fresnel_split};
use crate::traceable::Traceable;

/// Dispersion model mapping wavelength (micrometres) to a complex
/// refractive index.
#[derive(Debug, Clone)]
pub enum RefractiveIndex {
    /// Wavelength-independent index.
    Constant(Complex64),
    /// Sellmeier dispersion, n² = 1 + Σ bᵢλ²/(λ² − cᵢ) with λ in µm.
    Sellmeier {
        /// Oscillator strengths.
        b: Vec<f64>,
        /// Resonance wavelengths squared, in µm².
        c: Vec<f64>,
    },
}

impl RefractiveIndex {
    /// Non-dispersive real index.
    pub fn constant(n: f64) -> Self {
        RefractiveIndex::Constant(Complex64::new(n, 0.0))
    }

    /// Schott N-BK7 borosilicate crown glass.
    pub fn bk7() -> Self {
        RefractiveIndex::Sellmeier {
            b: vec![1.039_612_12, 0.231_792_344, 1.010_469_45],
            c: vec![0.006_000_698_67, 0.020_017_914_4, 103.560_653],
        }
    }

    /// Evaluate the index at each wavelength.
    pub fn eval(&self, wavelength: &[f64]) -> Vec<Complex64> {
        match self {
            RefractiveIndex::Constant(n) => vec![*n; wavelength.len()],
            RefractiveIndex::Sellmeier { b, c } => wavelength
                .iter()
                .map(|&lambda| {
                    let l2 = lambda * lambda;
                    let n_sq: f64 = 1.0
                        + b.iter()
                            .zip(c.iter())
                            .map(|(&bi, &ci)| bi * l2 / (l2 - ci))
                            .sum::<f64>();
                    Complex64::new(n_sq.sqrt(), 0.0)
                })
                .collect(),
        }
    }
}

/// What an optic does to rays that hit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Split each ray into reflected and refracted children.
    Refract,
    /// Perfect mirror: reflected child only, amplitudes negated.
    Mirror,
    /// Rays terminate on the surface.
    Absorb,
}

/// Child batches produced by one interaction.
#[derive(Debug, Clone)]
pub enum ChildRays {
    /// One batch (mirror, absorber, or per-ray strongest branch).
    Single(RayCollection),
    /// Both branches kept for every ray.
    Split {
        /// Mirror-reflected children.
        reflected: RayCollection,
        /// Refracted children.
        transmitted: RayCollection,
    },
}

impl ChildRays {
    /// Total rays across all branches.
    pub fn len(&self) -> usize {
        match self {
            ChildRays::Single(c) => c.len(),
            ChildRays::Split { reflected, transmitted } => reflected.len() + transmitted.len(),
        }
    }

    /// True when no branch carries any rays.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A geometric body with media assigned to its two sides.
#[derive(Debug, Clone)]
pub struct Optic {
    body: Traceable,
    n_inside: RefractiveIndex,
    n_outside: RefractiveIndex,
    behavior: Behavior,
    /// Keep both Fresnel branches instead of the TIR-selected one.
    all_rays: bool,
}

impl Optic {
    /// Refracting element with the given media on each side.
    pub fn refractive(body: Traceable, n_inside: RefractiveIndex, n_outside: RefractiveIndex) -> Self {
        Optic {
            body,
            n_inside,
            n_outside,
            behavior: Behavior::Refract,
            all_rays: false,
        }
    }

    /// Perfect mirror.
    pub fn mirror(body: Traceable) -> Self {
        Optic {
            body,
            n_inside: RefractiveIndex::constant(1.0),
            n_outside: RefractiveIndex::constant(1.0),
            behavior: Behavior::Mirror,
            all_rays: false,
        }
    }

    /// Beam dump: rays stop here.
    pub fn absorber(body: Traceable) -> Self {
        Optic {
            body,
            n_inside: RefractiveIndex::constant(1.0),
            n_outside: RefractiveIndex::constant(1.0),
            behavior: Behavior::Absorb,
            all_rays: false,
        }
    }

    /// Keep both reflected and refracted branches for every hit.
    pub fn with_all_rays(mut self, all_rays: bool) -> Self {
        self.all_rays = all_rays;
        self
    }

    /// The underlying geometry.
    pub fn body(&self) -> &Traceable {
        &self.body
    }

    /// Mutable access to the geometry.
    pub fn body_mut(&mut self) -> &mut Traceable {
        &mut self.body
    }

    /// The configured interaction mode.
    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    /// Evaluate both media at each wavelength, `(inside, outside)`.
    pub fn calc_refractive_index(&self, wavelength: &[f64]) -> (Vec<Complex64>, Vec<Complex64>) {
        (self.n_inside.eval(wavelength), self.n_outside.eval(wavelength))
    }

    /// Build child ray batches for the subset of `rays` (selected by
    /// `mask`) that terminated on this optic at `points` with hit cells
    /// `cells`.
    ///
    /// `points`, `cells` and `mask` are parallel to `rays`; only masked
    /// entries are consumed. Children start at the hit points, carry
    /// `generation + 1`, record their parent index, and record this
    /// optic and hit cell for self-intersection exclusion on the next
    /// step.
    pub fn eval_children(
        &self,
        rays: &RayCollection,
        points: &[Point3],
        cells: &[Option<u32>],
        mask: &[bool],
        self_key: Option<OpticKey>,
    ) -> Result<ChildRays> {
        if points.len() != rays.len() || cells.len() != rays.len() || mask.len() != rays.len() {
            return Err(TraceError::ShapeMismatch {
                field: "hit arrays",
                expected: rays.len(),
                got: points.len().min(cells.len()).min(mask.len()),
            });
        }

        let selected: Vec<usize> = (0..rays.len()).filter(|&i| mask[i]).collect();
        let child_gen = rays.generation() + 1;
        if selected.is_empty() || self.behavior == Behavior::Absorb {
            return Ok(ChildRays::Single(RayCollection::empty(child_gen)));
        }

        let mut hit_points = Vec::with_capacity(selected.len());
        let mut hit_cells = Vec::with_capacity(selected.len());
        let mut directions = Vec::with_capacity(selected.len());
        let mut e_vectors = Vec::with_capacity(selected.len());
        let mut e1 = Vec::with_capacity(selected.len());
        let mut e2 = Vec::with_capacity(selected.len());
        let mut wavelengths = Vec::with_capacity(selected.len());
        for &i in &selected {
            let cell = cells[i].ok_or(TraceError::UnknownCell {
                cell: u32::MAX,
                total: self.body.cell_count(),
            })?;
            hit_points.push(points[i]);
            hit_cells.push(cell);
            directions.push(rays.direction[i].into_inner());
            e_vectors.push(rays.e_vector[i]);
            e1.push(rays.e1_amp[i]);
            e2.push(rays.e2_amp[i]);
            wavelengths.push(rays.wavelength[i]);
        }

        let normals = self.body.compute_normal_world(&hit_points, &hit_cells)?;
        let normal_vecs: Vec<Vec3> = normals.iter().map(|n| n.into_inner()).collect();

        let sp = convert_to_sp(&directions, &normal_vecs, &e_vectors, &e1, &e2);

        if self.behavior == Behavior::Mirror {
            let mut child = stub_children(
                rays, &selected, &hit_points, &hit_cells, self_key, child_gen,
            );
            for (k, &i) in selected.iter().enumerate() {
                let d = directions[k];
                let cos_theta = normal_vecs[k].dot(&d);
                let reflected = d - 2.0 * cos_theta * normal_vecs[k];
                child.direction.push(Dir3::new_normalize(reflected));
                child.e_vector.push(sp.s_vec[k]);
                child.e1_amp.push(-sp.s_amp[k]);
                child.e2_amp.push(-sp.p_amp[k]);
                child.refractive_index.push(rays.refractive_index[i]);
            }
            child.validate()?;
            return Ok(ChildRays::Single(child));
        }

        // Refraction: evaluate the interface media at each ray's
        // wavelength and run the Fresnel math.
        let (inside, outside) = self.calc_refractive_index(&wavelengths);
        let split = fresnel_split(&directions, &normal_vecs, &inside, &outside);

        let mut reflected = stub_children(
            rays, &selected, &hit_points, &hit_cells, self_key, child_gen,
        );
        let mut transmitted = stub_children(
            rays, &selected, &hit_points, &hit_cells, self_key, child_gen,
        );
        for k in 0..selected.len() {
            reflected.direction.push(split.reflected[k]);
            reflected.e_vector.push(sp.s_vec[k]);
            reflected.e1_amp.push(sp.s_amp[k] * split.r_s[k]);
            reflected.e2_amp.push(sp.p_amp[k] * split.r_p[k]);
            reflected.refractive_index.push(split.n1[k]);

            transmitted.direction.push(split.transmitted[k]);
            transmitted.e_vector.push(sp.s_vec[k]);
            transmitted.e1_amp.push(sp.s_amp[k] * split.t_s[k]);
            transmitted.e2_amp.push(sp.p_amp[k] * split.t_p[k]);
            transmitted.refractive_index.push(split.n2[k]);
        }
        reflected.validate()?;
        transmitted.validate()?;

        if self.all_rays {
            return Ok(ChildRays::Split { reflected, transmitted });
        }

        // Keep one branch per ray: reflected only under total internal
        // reflection, transmitted otherwise.
        let keep_reflected: Vec<bool> = split.tir.clone();
        let keep_transmitted: Vec<bool> = keep_reflected.iter().map(|&b| !b).collect();
        let mut winner = reflected.filter(&keep_reflected)?;
        winner.concat(transmitted.filter(&keep_transmitted)?)?;
        Ok(ChildRays::Single(winner))
    }
}

/// Start a child batch with everything except the per-branch direction
/// and field columns filled in.
fn stub_children(
    rays: &RayCollection,
    selected: &[usize],
    hit_points: &[Point3],
    hit_cells: &[u32],
    self_key: Option<OpticKey>,
    generation: u32,
) -> RayCollection {
    let mut child = RayCollection::empty(generation);
    for (k, &i) in selected.iter().enumerate() {
        child.origin.push(hit_points[k]);
        child.max_length.push(rays.max_length[i]);
        child.wavelength.push(rays.wavelength[i]);
        child.parent_ids.push(Some(i as u32));
        child.optic.push(self_key);
        child.face_id.push(Some(hit_cells[k]));
    }
    child
}
