//! S/P decomposition and Fresnel interface coefficients.
//!
//! Whole-array math over the rays selected for one optic: given incident
//! directions, surface normals and the media on either side, compute the
//! reflected/refracted directions and the complex amplitude coefficients
//! for both polarizations, including total internal reflection.

use optiray_math::{Complex64, Dir3, Vec3};

/// Incident field re-expressed on the S/P axes of each ray's plane of
/// incidence.
#[derive(Debug, Clone)]
pub struct SpDecomposition {
    /// Complex amplitude along the S axis (perpendicular to the plane
    /// of incidence).
    pub s_amp: Vec<Complex64>,
    /// Complex amplitude along the P axis (in the plane of incidence).
    pub p_amp: Vec<Complex64>,
    /// Unit S axis per ray; becomes the child rays' polarization
    /// reference.
    pub s_vec: Vec<Vec3>,
    /// Unit P axis per ray.
    pub p_vec: Vec<Vec3>,
}

/// Project the incident fields onto per-ray S/P axes.
///
/// The S axis is `direction × normal` normalized; at normal incidence
/// the plane of incidence is undefined and the ray's existing reference
/// axis is kept. The full field is `E1·ê + E2·(d̂ × ê)`; its projections
/// onto the new axes give the S and P amplitudes.
pub fn convert_to_sp(
    direction: &[Vec3],
    normal: &[Vec3],
    e_vector: &[Vec3],
    e1_amp: &[Complex64],
    e2_amp: &[Complex64],
) -> SpDecomposition {
    let n = direction.len();
    let mut out = SpDecomposition {
        s_amp: Vec::with_capacity(n),
        p_amp: Vec::with_capacity(n),
        s_vec: Vec::with_capacity(n),
        p_vec: Vec::with_capacity(n),
    };

    for i in 0..n {
        let d = direction[i];
        let e_axis = e_vector[i].normalize();
        let e2_axis = d.cross(&e_axis);

        let mut s = d.cross(&normal[i]);
        if s.norm() < 1e-12 {
            // Normal incidence: any axis through the surface works.
            s = e_axis;
        }
        let s = s.normalize();
        let p = d.cross(&s);

        let s_amp = e1_amp[i] * e_axis.dot(&s) + e2_amp[i] * e2_axis.dot(&s);
        let p_amp = e1_amp[i] * e_axis.dot(&p) + e2_amp[i] * e2_axis.dot(&p);

        out.s_amp.push(s_amp);
        out.p_amp.push(p_amp);
        out.s_vec.push(s);
        out.p_vec.push(p);
    }
    out
}

/// Per-ray result of the interface physics.
#[derive(Debug, Clone)]
pub struct FresnelSplit {
    /// Mirror-reflected unit directions.
    pub reflected: Vec<Dir3>,
    /// Refracted unit directions (under TIR: grazing along the surface
    /// tangent, carrying zero amplitude).
    pub transmitted: Vec<Dir3>,
    /// S reflection amplitude coefficients.
    pub r_s: Vec<Complex64>,
    /// P reflection amplitude coefficients.
    pub r_p: Vec<Complex64>,
    /// S transmission amplitude coefficients (include the
    /// `√(cosθ_t/cosθ_i)` scaling).
    pub t_s: Vec<Complex64>,
    /// P transmission amplitude coefficients.
    pub t_p: Vec<Complex64>,
    /// Per-ray total-internal-reflection flag.
    pub tir: Vec<bool>,
    /// Complex index of the medium on the incident side.
    pub n1: Vec<Complex64>,
    /// Complex index of the medium on the far side.
    pub n2: Vec<Complex64>,
}

/// Run the Fresnel interface physics for one batch.
///
/// `n_inside`/`n_outside` are the media of the optic; which one is the
/// incident medium is decided per ray by the sign of `normal · d`
/// (negative means the ray arrives from outside). Refraction geometry
/// uses the real parts of the indices, as the amplitude bookkeeping
/// model prescribes.
pub fn fresnel_split(
    direction: &[Vec3],
    normal: &[Vec3],
    n_inside: &[Complex64],
    n_outside: &[Complex64],
) -> FresnelSplit {
    let count = direction.len();
    let mut out = FresnelSplit {
        reflected: Vec::with_capacity(count),
        transmitted: Vec::with_capacity(count),
        r_s: Vec::with_capacity(count),
        r_p: Vec::with_capacity(count),
        t_s: Vec::with_capacity(count),
        t_p: Vec::with_capacity(count),
        tir: Vec::with_capacity(count),
        n1: Vec::with_capacity(count),
        n2: Vec::with_capacity(count),
    };

    for i in 0..count {
        let d = direction[i];
        let nrm = normal[i];
        let cos_theta = nrm.dot(&d);
        let from_outside = cos_theta < 0.0;
        let (n1c, n2c) = if from_outside {
            (n_outside[i], n_inside[i])
        } else {
            (n_inside[i], n_outside[i])
        };
        let (n1, n2) = (n1c.re, n2c.re);
        let flip = if from_outside { 1.0 } else { -1.0 };

        let abs_cos = cos_theta.abs();
        let big_n2 = (n2 / n1) * (n2 / n1);
        // Negative means no real transmitted angle exists.
        let n2_sin2 = abs_cos * abs_cos + (big_n2 - 1.0);
        let tir = n2_sin2 < 0.0;

        let sqrt_term = if tir {
            Complex64::new(0.0, (-n2_sin2).sqrt())
        } else {
            Complex64::new(n2_sin2.sqrt(), 0.0)
        };

        let n2_cos = Complex64::new(big_n2 * abs_cos, 0.0);
        let cos_c = Complex64::new(abs_cos, 0.0);
        let r_p = (n2_cos - sqrt_term) / (n2_cos + sqrt_term);
        let r_s = (cos_c - sqrt_term) / (cos_c + sqrt_term);

        let cos_theta_normal = cos_theta * nrm;
        let reflected = d - 2.0 * cos_theta_normal;

        let tangent = d - cos_theta_normal;
        let tan_scaled = tangent * (n1 / n2);
        let tan_mag_sq = tan_scaled.norm_squared();

        let (transmitted, t_s, t_p) = if tir {
            // Zero-amplitude placeholder direction along the surface:
            // the evanescent branch carries no energy but child batches
            // still need a unit vector.
            let grazing = if tangent.norm() > 1e-12 {
                tangent.normalize()
            } else {
                reflected.normalize()
            };
            (grazing, Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0))
        } else {
            let c2 = (1.0 - tan_mag_sq).sqrt();
            let transmitted = tan_scaled - c2 * nrm * flip;

            let cos1 = abs_cos;
            let cos2 = transmitted.dot(&nrm).abs();
            // √(cosθ_t/cosθ_i)·2·n1·cosθ_i, written to stay finite at
            // grazing incidence.
            let aspect = 2.0 * n1 * (cos1 * cos2).sqrt();
            let t_p = Complex64::new(aspect / (n2 * cos1 + n1 * cos2), 0.0);
            let t_s = Complex64::new(aspect / (n2 * cos2 + n1 * cos1), 0.0);
            (transmitted, t_s, t_p)
        };

        out.reflected.push(Dir3::new_normalize(reflected));
        out.transmitted.push(Dir3::new_normalize(transmitted));
        out.r_s.push(r_s);
        out.r_p.push(r_p);
        out.t_s.push(t_s);
        out.t_p.push(t_p);
        out.tir.push(tir);
        out.n1.push(n1c);
        out.n2.push(n2c);
    }
    out
}
