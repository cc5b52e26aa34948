//! Generation-by-generation ray tree bookkeeping.

use crate::collection::RayCollection;
use crate::error::{RayError, Result};

/// An append-only ledger of traced generations.
///
/// Generation 0 holds source rays (`parent_ids` all `None`); every later
/// generation's parent ids index into the generation immediately before
/// it. Pushing validates both the generation numbering and the parent
/// ranges, so a stored tree is always traversable.
#[derive(Debug, Clone, Default)]
pub struct RayTree {
    generations: Vec<RayCollection>,
}

impl RayTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
        }
    }

    /// Append the next generation.
    pub fn push(&mut self, rays: RayCollection) -> Result<()> {
        rays.validate()?;
        let expected = self.generations.len() as u32;
        if rays.generation() != expected {
            return Err(RayError::GenerationMismatch {
                expected,
                got: rays.generation(),
            });
        }
        let prev_len = self.generations.last().map_or(0, |g| g.len());
        for parent in rays.parent_ids.iter().flatten() {
            if *parent as usize >= prev_len {
                return Err(RayError::ParentOutOfRange {
                    parent: *parent,
                    len: prev_len,
                });
            }
        }
        self.generations.push(rays);
        Ok(())
    }

    /// All stored generations, oldest first.
    pub fn generations(&self) -> &[RayCollection] {
        &self.generations
    }

    /// The most recent generation, if any.
    pub fn last(&self) -> Option<&RayCollection> {
        self.generations.last()
    }

    /// Number of stored generations.
    pub fn depth(&self) -> usize {
        self.generations.len()
    }

    /// Total ray count across all generations.
    pub fn total_rays(&self) -> usize {
        self.generations.iter().map(|g| g.len()).sum()
    }

    /// Walk a ray back to its source, returning `(generation, index)`
    /// pairs from the root ray down to the requested one.
    pub fn ancestry(&self, generation: u32, index: u32) -> Vec<(u32, u32)> {
        let mut chain = Vec::new();
        let mut g = generation as usize;
        let mut i = index;
        loop {
            chain.push((g as u32, i));
            let Some(rays) = self.generations.get(g) else {
                break;
            };
            match rays.parent_ids.get(i as usize).copied().flatten() {
                Some(parent) if g > 0 => {
                    g -= 1;
                    i = parent;
                }
                _ => break,
            }
        }
        chain.reverse();
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optiray_math::{Complex64, Dir3, Point3, Vec3};

    fn generation(g: u32, n: usize, parents: &[Option<u32>]) -> RayCollection {
        let mut rays = RayCollection::empty(g);
        for i in 0..n {
            rays.origin.push(Point3::new(i as f64, 0.0, 0.0));
            rays.direction.push(Dir3::new_normalize(Vec3::z()));
            rays.max_length.push(10.0);
            rays.e_vector.push(Vec3::x());
            rays.e1_amp.push(Complex64::new(1.0, 0.0));
            rays.e2_amp.push(Complex64::new(0.0, 0.0));
            rays.refractive_index.push(Complex64::new(1.0, 0.0));
            rays.wavelength.push(1.0);
            rays.parent_ids.push(parents[i]);
            rays.optic.push(None);
            rays.face_id.push(None);
        }
        rays
    }

    #[test]
    fn test_push_and_totals() {
        let mut tree = RayTree::new();
        tree.push(generation(0, 2, &[None, None])).unwrap();
        tree.push(generation(1, 3, &[Some(0), Some(0), Some(1)]))
            .unwrap();
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.total_rays(), 5);
    }

    #[test]
    fn test_push_wrong_generation() {
        let mut tree = RayTree::new();
        let err = tree.push(generation(3, 1, &[None])).unwrap_err();
        assert!(matches!(
            err,
            RayError::GenerationMismatch { expected: 0, got: 3 }
        ));
    }

    #[test]
    fn test_push_parent_out_of_range() {
        let mut tree = RayTree::new();
        tree.push(generation(0, 1, &[None])).unwrap();
        let err = tree.push(generation(1, 1, &[Some(5)])).unwrap_err();
        assert!(matches!(err, RayError::ParentOutOfRange { parent: 5, len: 1 }));
    }

    #[test]
    fn test_ancestry() {
        let mut tree = RayTree::new();
        tree.push(generation(0, 2, &[None, None])).unwrap();
        tree.push(generation(1, 2, &[Some(1), Some(0)])).unwrap();
        tree.push(generation(2, 1, &[Some(0)])).unwrap();
        // Ray (2,0) -> parent (1,0) -> parent (0,1)
        assert_eq!(tree.ancestry(2, 0), vec![(0, 1), (1, 0), (2, 0)]);
    }
}
