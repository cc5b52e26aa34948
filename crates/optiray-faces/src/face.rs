//! The face trait: batch intersection in a local frame.

use std::any::Any;

use optiray_math::{Dir3, Point3};

use crate::error::{FaceError, Result};
use crate::intersection::Intersection;

/// Hits at most this far from the segment start count as the ray
/// re-finding the cell it was launched from.
pub(crate) const SELF_HIT_TOLERANCE: f64 = 1e-9;

/// A single geometric primitive that rays can intersect.
///
/// All coordinates are in the face's local frame; the owning traceable
/// performs the world/local conversion. Implementations are stateless at
/// trace time apart from derived geometry cached at construction.
pub trait Face: Send + Sync + std::fmt::Debug {
    /// Batch intersection of N segments with this face.
    ///
    /// `p1[i]`/`p2[i]` are the segment endpoints of ray `i`; hits are
    /// restricted to `0 < length ≤ max_length[i]`, and among multiple
    /// mathematical crossings the one closest to `p1` is returned.
    /// Misses yield the sentinel record.
    fn intersect(
        &self,
        p1: &[Point3],
        p2: &[Point3],
        max_length: &[f64],
    ) -> Result<Vec<Intersection>>;

    /// As [`Face::intersect`], but suppressing a hit on the ray's
    /// `exclude` cell when it sits at the segment start, stepping past
    /// it to the next crossing. A distant crossing of the excluded cell
    /// is a genuine hit and is kept; curved single-cell faces can be
    /// crossed twice by a straight ray.
    fn intersect_excluding(
        &self,
        p1: &[Point3],
        p2: &[Point3],
        max_length: &[f64],
        exclude: &[Option<u32>],
    ) -> Result<Vec<Intersection>> {
        if exclude.len() != p1.len() {
            return Err(FaceError::ShapeMismatch {
                field: "exclude",
                expected: p1.len(),
                got: exclude.len(),
            });
        }
        let mut records = self.intersect(p1, p2, max_length)?;
        for i in 0..records.len() {
            let record = records[i];
            if record.is_miss()
                || exclude[i] != Some(record.cell)
                || record.length > SELF_HIT_TOLERANCE
            {
                continue;
            }
            // Nearest crossing is the launch point itself. Look again
            // from just past it for a further crossing.
            records[i] = Intersection::miss();
            let span = p2[i] - p1[i];
            let norm = span.norm();
            if norm < SELF_HIT_TOLERANCE {
                continue;
            }
            let skip = record.length + SELF_HIT_TOLERANCE;
            if skip >= max_length[i] || skip >= norm {
                continue;
            }
            let start = p1[i] + (span / norm) * skip;
            let further = self.intersect(&[start], &[p2[i]], &[max_length[i] - skip])?;
            if !further[0].is_miss() {
                records[i] = Intersection {
                    length: further[0].length + skip,
                    cell: further[0].cell,
                    point: further[0].point,
                };
            }
        }
        Ok(records)
    }

    /// Surface normals (local frame, outward oriented) at the given hit
    /// points on the given cells.
    fn compute_normal(&self, points: &[Point3], cells: &[u32]) -> Result<Vec<Dir3>>;

    /// Number of distinguishable sub-regions (cells) this face exposes.
    fn cell_count(&self) -> u32 {
        1
    }

    /// Clone this face into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Face>;

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support, for shape edits on concrete face types.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Clone for Box<dyn Face> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Validate that the batch arrays of an intersection call agree in
/// length, returning that length.
pub(crate) fn check_batch(p1: &[Point3], p2: &[Point3], max_length: &[f64]) -> Result<usize> {
    let n = p1.len();
    if p2.len() != n {
        return Err(FaceError::ShapeMismatch {
            field: "p2",
            expected: n,
            got: p2.len(),
        });
    }
    if max_length.len() != n {
        return Err(FaceError::ShapeMismatch {
            field: "max_length",
            expected: n,
            got: max_length.len(),
        });
    }
    Ok(n)
}

/// Validate the `compute_normal` batch arrays.
pub(crate) fn check_normal_batch(points: &[Point3], cells: &[u32]) -> Result<usize> {
    if cells.len() != points.len() {
        return Err(FaceError::ShapeMismatch {
            field: "cells",
            expected: points.len(),
            got: cells.len(),
        });
    }
    Ok(points.len())
}
