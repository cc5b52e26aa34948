//! The per-ray intersection record.

use optiray_math::Point3;

/// Result of one ray's intersection query against a face or traceable.
///
/// A miss is a value, not an error: `length` is `+∞` and `cell` is the
/// `u32::MAX` sentinel. Batch queries return one record per ray.
#[derive(Debug, Clone, Copy)]
pub struct Intersection {
    /// Distance from the segment start to the hit, `+∞` if none.
    pub length: f64,
    /// Cell id of the hit primitive within the queried object.
    pub cell: u32,
    /// Hit location, in the frame of the query.
    pub point: Point3,
}

impl Intersection {
    /// The "no hit in range" sentinel.
    pub fn miss() -> Self {
        Self {
            length: f64::INFINITY,
            cell: u32::MAX,
            point: Point3::origin(),
        }
    }

    /// True if this record represents no intersection.
    pub fn is_miss(&self) -> bool {
        !self.length.is_finite()
    }

    /// Pick the nearer of two records. On an exact tie the first operand
    /// wins, which gives the stable lowest-face-index rule when folding
    /// per-face results in order.
    pub fn nearer(self, other: Self) -> Self {
        if other.length < self.length {
            other
        } else {
            self
        }
    }

    /// Shift the cell id by a face's base offset, leaving misses alone.
    pub fn offset_cell(mut self, offset: u32) -> Self {
        if !self.is_miss() {
            self.cell += offset;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_is_miss() {
        assert!(Intersection::miss().is_miss());
    }

    #[test]
    fn test_nearer_prefers_first_on_tie() {
        let a = Intersection {
            length: 5.0,
            cell: 0,
            point: Point3::origin(),
        };
        let b = Intersection {
            length: 5.0,
            cell: 1,
            point: Point3::origin(),
        };
        assert_eq!(a.nearer(b).cell, 0);
    }

    #[test]
    fn test_nearer_vs_miss() {
        let hit = Intersection {
            length: 2.0,
            cell: 3,
            point: Point3::origin(),
        };
        assert_eq!(Intersection::miss().nearer(hit).cell, 3);
        assert_eq!(hit.nearer(Intersection::miss()).cell, 3);
    }

    #[test]
    fn test_offset_cell_skips_miss() {
        let m = Intersection::miss().offset_cell(10);
        assert!(m.is_miss());
        assert_eq!(m.cell, u32::MAX);
    }
}
