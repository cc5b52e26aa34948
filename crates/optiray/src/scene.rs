//! Scene assembly and the generation-by-generation tracing loop.

use rayon::prelude::*;
use slotmap::SlotMap;

use optiray_faces::Intersection;
use optiray_math::Point3;
use optiray_rays::{collect_rays, OpticKey, RayCollection, RayTree};
use optiray_trace::{ChildRays, Optic, Result, TraceError};

/// Stopping criteria for [`Scene::trace`].
#[derive(Debug, Clone, Copy)]
pub struct TraceLimits {
    /// Maximum number of generations after the source batch.
    pub max_generations: usize,
    /// Children below this field amplitude are dropped before the next
    /// step.
    pub min_amplitude: f64,
}

impl Default for TraceLimits {
    fn default() -> Self {
        TraceLimits {
            max_generations: 10,
            min_amplitude: 1e-6,
        }
    }
}

/// A collection of optics rays can interact with.
///
/// Optics are owned by the scene and addressed through [`OpticKey`]
/// handles; removing one leaves dangling keys in previously traced rays,
/// which simply stop resolving.
#[derive(Debug, Default)]
pub struct Scene {
    optics: SlotMap<OpticKey, Optic>,
}

impl Scene {
    /// An empty scene.
    pub fn new() -> Self {
        Scene {
            optics: SlotMap::with_key(),
        }
    }

    /// Add an optic and return its handle.
    pub fn add(&mut self, optic: Optic) -> OpticKey {
        self.optics.insert(optic)
    }

    /// Look up an optic.
    pub fn get(&self, key: OpticKey) -> Option<&Optic> {
        self.optics.get(key)
    }

    /// Mutable lookup, for moving an optic or editing its faces.
    pub fn get_mut(&mut self, key: OpticKey) -> Option<&mut Optic> {
        self.optics.get_mut(key)
    }

    /// Remove an optic. Keys held by traced rays go stale but stay
    /// harmless.
    pub fn remove(&mut self, key: OpticKey) -> Option<Optic> {
        self.optics.remove(key)
    }

    /// Number of optics.
    pub fn len(&self) -> usize {
        self.optics.len()
    }

    /// True when the scene holds no optics.
    pub fn is_empty(&self) -> bool {
        self.optics.is_empty()
    }

    /// Trace one generation against every optic and gather the children.
    ///
    /// Each ray terminates on the nearest surface across all optics (or
    /// runs to its own `max_length` and dies). A ray's recorded optic
    /// and cell from the previous step are excluded on that optic only,
    /// so restarting exactly on a surface never re-hits it.
    pub fn trace_generation(&self, rays: &RayCollection) -> Result<RayCollection> {
        rays.validate()?;
        let child_gen = rays.generation() + 1;
        if rays.is_empty() || self.optics.is_empty() {
            return Ok(RayCollection::empty(child_gen));
        }

        let (p1, p2) = rays.project_endpoints();
        let entries: Vec<(OpticKey, &Optic)> = self.optics.iter().collect();

        // Intersection queries are independent per optic.
        let per_optic: Vec<Vec<Intersection>> = entries
            .par_iter()
            .map(|(key, optic)| {
                let exclude: Vec<Option<u32>> = (0..rays.len())
                    .map(|i| {
                        if rays.optic[i] == Some(*key) {
                            rays.face_id[i]
                        } else {
                            None
                        }
                    })
                    .collect();
                optic
                    .body()
                    .intersect_excluding(&p1, &p2, &rays.max_length, &exclude)
            })
            .collect::<Result<Vec<_>>>()?;

        // Nearest surviving hit wins each ray; earlier optics win ties
        // so repeated traces of the same scene agree.
        let mut winner: Vec<Option<usize>> = vec![None; rays.len()];
        let mut best = vec![f64::INFINITY; rays.len()];
        for (o, records) in per_optic.iter().enumerate() {
            for (i, rec) in records.iter().enumerate() {
                if !rec.is_miss() && rec.length < best[i] {
                    winner[i] = Some(o);
                    best[i] = rec.length;
                }
            }
        }

        let mut parts = Vec::with_capacity(entries.len());
        for (o, (key, optic)) in entries.iter().enumerate() {
            let mut mask = vec![false; rays.len()];
            let mut points = vec![Point3::origin(); rays.len()];
            let mut cells: Vec<Option<u32>> = vec![None; rays.len()];
            let mut any = false;
            for i in 0..rays.len() {
                if winner[i] == Some(o) {
                    mask[i] = true;
                    points[i] = per_optic[o][i].point;
                    cells[i] = Some(per_optic[o][i].cell);
                    any = true;
                }
            }
            if !any {
                continue;
            }
            match optic.eval_children(rays, &points, &cells, &mask, Some(*key))? {
                ChildRays::Single(batch) => parts.push(batch),
                ChildRays::Split {
                    reflected,
                    transmitted,
                } => {
                    parts.push(reflected);
                    parts.push(transmitted);
                }
            }
        }

        if parts.is_empty() {
            return Ok(RayCollection::empty(child_gen));
        }
        collect_rays(parts).map_err(TraceError::from)
    }

    /// Trace a source batch to completion.
    ///
    /// The source must be generation 0. Children weaker than
    /// `limits.min_amplitude` are dropped each step; tracing stops when
    /// a generation comes back empty or the generation cap is reached.
    pub fn trace(&self, source: RayCollection, limits: TraceLimits) -> Result<RayTree> {
        if source.generation() != 0 {
            return Err(TraceError::Construction(format!(
                "source batch must be generation 0, got {}",
                source.generation()
            )));
        }
        let mut tree = RayTree::new();
        tree.push(source)?;

        for _ in 0..limits.max_generations {
            let children = match tree.last() {
                Some(current) => self.trace_generation(current)?,
                None => break,
            };
            let keep: Vec<bool> = (0..children.len())
                .map(|i| children.amplitude(i) >= limits.min_amplitude)
                .collect();
            let survivors = children.filter(&keep)?;
            if survivors.is_empty() {
                break;
            }
            tree.push(survivors)?;
        }
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use optiray_faces::{CircularFace, Face};
    use optiray_math::{Dir3, RigidTransform, Vec3};
    use optiray_trace::{Optic, RefractiveIndex, Traceable};

    use crate::source::{single_ray, CollimatedSource};

    fn disc(radius: f64) -> Box<dyn Face> {
        Box::new(CircularFace::new(radius).unwrap())
    }

    /// Glass slab between z=0 and z=10, entry normal -Z, exit normal +Z.
    fn glass_slab(n: f64) -> Optic {
        let entry: Box<dyn Face> = Box::new(CircularFace::new(50.0).unwrap().flip());
        let exit: Box<dyn Face> = Box::new(CircularFace::new(50.0).unwrap().at_z(10.0));
        let body = Traceable::new(vec![entry, exit]).unwrap();
        Optic::refractive(
            body,
            RefractiveIndex::constant(n),
            RefractiveIndex::constant(1.0),
        )
    }

    #[test]
    fn test_slab_first_interface_split() {
        let mut scene = Scene::new();
        scene.add(glass_slab(1.5).with_all_rays(true));

        let theta = 30.0f64.to_radians();
        let d = Dir3::new_normalize(Vec3::new(theta.sin(), 0.0, theta.cos()));
        let source = single_ray(Point3::new(0.0, 0.0, -5.0), d, 0.8);

        let limits = TraceLimits {
            max_generations: 1,
            min_amplitude: 1e-9,
        };
        let tree = scene.trace(source, limits).unwrap();
        assert_eq!(tree.depth(), 2);
        let children = &tree.generations()[1];
        assert_eq!(children.len(), 2);

        // Both children start on the entry plane, parented to ray 0.
        for i in 0..2 {
            assert_relative_eq!(children.origin[i].z, 0.0, epsilon = 1e-9);
            assert_eq!(children.parent_ids[i], Some(0));
            assert_eq!(children.face_id[i], Some(0));
        }

        // One child refracts by Snell's law, the other mirrors.
        let sin_t = theta.sin() / 1.5;
        let transmitted = (0..2)
            .find(|&i| children.direction[i].z > 0.0)
            .expect("one child continues into the glass");
        let reflected = 1 - transmitted;
        assert_relative_eq!(children.direction[transmitted].x, sin_t, epsilon = 1e-9);
        assert_relative_eq!(
            children.direction[reflected].z,
            -theta.cos(),
            epsilon = 1e-9
        );

        // The source is pure S here, so the amplitudes are the
        // s-polarized Fresnel coefficients.
        let (c1, c2) = (theta.cos(), (1.0 - sin_t * sin_t).sqrt());
        let r_s = (c1 - 1.5 * c2) / (c1 + 1.5 * c2);
        let t_s = 2.0 * (c1 * c2).sqrt() / (c1 + 1.5 * c2);
        assert_relative_eq!(children.amplitude(reflected), r_s.abs(), epsilon = 1e-9);
        assert_relative_eq!(children.amplitude(transmitted), t_s.abs(), epsilon = 1e-9);
        assert_eq!(
            children.refractive_index[transmitted],
            optiray_math::Complex64::new(1.5, 0.0)
        );
    }

    #[test]
    fn test_slab_exit_face_reached_despite_restart_on_surface() {
        // The transmitted child restarts exactly on the entry plane; the
        // recorded cell keeps it from re-hitting its own surface, so the
        // next step reaches the exit face at z=10.
        let mut scene = Scene::new();
        scene.add(glass_slab(1.5));

        let source = single_ray(
            Point3::new(0.0, 0.0, -5.0),
            Dir3::new_normalize(Vec3::z()),
            0.8,
        );
        let limits = TraceLimits {
            max_generations: 4,
            min_amplitude: 1e-3,
        };
        let tree = scene.trace(source, limits).unwrap();
        assert!(tree.depth() >= 3);

        // No TIR at normal incidence, so generation 1 is the
        // transmitted ray; generation 2 starts where it met the exit
        // plane.
        let second = &tree.generations()[2];
        assert_eq!(second.len(), 1);
        assert_relative_eq!(second.origin[0].z, 10.0, epsilon = 1e-9);
        assert_eq!(second.face_id[0], Some(1));
        // Beyond the slab it is back in air.
        assert_eq!(
            second.refractive_index[0],
            optiray_math::Complex64::new(1.0, 0.0)
        );
    }

    #[test]
    fn test_absorber_terminates_beam() {
        let mut scene = Scene::new();
        let body = Traceable::new(vec![disc(30.0)])
            .unwrap()
            .with_transform(RigidTransform::translation(0.0, 0.0, 20.0));
        scene.add(Optic::absorber(body));

        let source = CollimatedSource::new(
            Point3::new(0.0, 0.0, -10.0),
            Dir3::new_normalize(Vec3::z()),
            5.0,
        )
        .build();
        let count = source.len();
        assert!(count > 0);

        let tree = scene.trace(source, TraceLimits::default()).unwrap();
        // Everything lands on the dump; no children at all.
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.total_rays(), count);
    }

    fn mirror_at(z: f64) -> Optic {
        let body = Traceable::new(vec![disc(30.0)])
            .unwrap()
            .with_transform(RigidTransform::translation(0.0, 0.0, z));
        Optic::mirror(body)
    }

    #[test]
    fn test_nearest_optic_wins() {
        let mut scene = Scene::new();
        let near_key = scene.add(mirror_at(5.0));
        scene.add(mirror_at(15.0));

        let rays = single_ray(Point3::origin(), Dir3::new_normalize(Vec3::z()), 0.8);
        let children = scene.trace_generation(&rays).unwrap();
        assert_eq!(children.len(), 1);
        assert_relative_eq!(children.origin[0].z, 5.0, epsilon = 1e-12);
        assert_eq!(children.optic[0], Some(near_key));
    }

    #[test]
    fn test_mesh_mirror_folds_beam() {
        use optiray_faces::MeshFace;
        use optiray_mesh::TriMesh;

        // Triangulated square at 45 degrees folds +Z rays into -Y.
        let mut face = MeshFace::new(TriMesh::rectangle(40.0, 40.0).unwrap());
        face.rebuild().unwrap();
        let face: Box<dyn Face> = Box::new(face);
        let body = Traceable::new(vec![face]).unwrap().with_transform(
            RigidTransform::rotation_x(std::f64::consts::FRAC_PI_4)
                .then(&RigidTransform::translation(0.0, 0.0, 20.0)),
        );
        let mut scene = Scene::new();
        scene.add(Optic::mirror(body));

        let source = CollimatedSource::new(
            Point3::new(0.0, 0.0, -5.0),
            Dir3::new_normalize(Vec3::z()),
            4.0,
        )
        .with_spacing(2.0)
        .build();
        let count = source.len();

        let tree = scene
            .trace(
                source,
                TraceLimits {
                    max_generations: 3,
                    min_amplitude: 1e-6,
                },
            )
            .unwrap();
        assert_eq!(tree.depth(), 2);
        let children = &tree.generations()[1];
        assert_eq!(children.len(), count);
        for i in 0..children.len() {
            // Reflection across the tilted plane swaps z for -y (up to
            // sign of the mesh winding, the fold angle is what matters).
            assert_relative_eq!(children.direction[i].z, 0.0, epsilon = 1e-9);
            assert_relative_eq!(children.direction[i].y.abs(), 1.0, epsilon = 1e-9);
            assert_relative_eq!(children.amplitude(i), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_empty_scene_gives_empty_generation() {
        let scene = Scene::new();
        let rays = single_ray(Point3::origin(), Dir3::new_normalize(Vec3::z()), 0.8);
        let children = scene.trace_generation(&rays).unwrap();
        assert!(children.is_empty());
        assert_eq!(children.generation(), 1);
    }

    #[test]
    fn test_trace_rejects_non_source_generation() {
        let scene = Scene::new();
        let bad = RayCollection::empty(3);
        let err = scene.trace(bad, TraceLimits::default()).unwrap_err();
        assert!(matches!(err, TraceError::Construction(_)));
    }

    #[test]
    fn test_remove_optic() {
        let mut scene = Scene::new();
        let key = scene.add(glass_slab(1.5));
        assert_eq!(scene.len(), 1);
        assert!(scene.get(key).is_some());
        assert!(scene.remove(key).is_some());
        assert!(scene.get(key).is_none());
        assert!(scene.is_empty());
    }
}
