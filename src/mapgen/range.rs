//! Inclusive integer ranges and placement descriptors

use crate::error::LoadError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// An inclusive `(min, max)` range. `get` rolls uniformly, or returns
/// `min` outright when the range is a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntRange {
    pub min: i32,
    pub max: i32,
}

impl IntRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub const fn fixed(value: i32) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn get(&self, rng: &mut impl Rng) -> i32 {
        if self.min >= self.max {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }

    pub const fn offset(&self, delta: i32) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    /// Both ends inside `[0, extent)`?
    pub fn within(&self, extent: i32) -> bool {
        self.min >= 0 && self.min <= self.max && self.max < extent
    }
}

impl Default for IntRange {
    fn default() -> Self {
        Self::fixed(0)
    }
}

/// Where and how often one piece is applied: an inclusive coordinate range
/// per axis plus a repeat count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementDescriptor {
    pub x: IntRange,
    pub y: IntRange,
    pub repeat: IntRange,
}

impl PlacementDescriptor {
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            x: IntRange::fixed(x),
            y: IntRange::fixed(y),
            repeat: IntRange::fixed(1),
        }
    }

    /// Validate both axes against the grid extent. Load-time literals that
    /// straddle a chunk boundary are rejected here.
    pub fn check_bounds(&self, extent: i32, context: &str) -> Result<(), LoadError> {
        for (axis, range) in [('x', self.x), ('y', self.y)] {
            if !range.within(extent) {
                let value = if range.min < 0 { range.min } else { range.max };
                return Err(LoadError::OutOfBounds {
                    context: context.to_string(),
                    axis,
                    value,
                    extent,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn fixed_range_never_rolls() {
        let mut rng = StdRng::seed_from_u64(0);
        let r = IntRange::fixed(5);
        for _ in 0..10 {
            assert_eq!(r.get(&mut rng), 5);
        }
    }

    #[test]
    fn roll_stays_inside_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let r = IntRange::new(2, 6);
        for _ in 0..100 {
            let v = r.get(&mut rng);
            assert!((2..=6).contains(&v));
        }
    }

    #[test]
    fn bounds_check_rejects_straddling_ranges() {
        let desc = PlacementDescriptor {
            x: IntRange::new(20, 25),
            y: IntRange::fixed(3),
            repeat: IntRange::fixed(1),
        };
        let err = desc.check_bounds(24, "test").unwrap_err();
        assert!(matches!(err, LoadError::OutOfBounds { axis: 'x', .. }));
        assert!(desc.check_bounds(26, "test").is_ok());
    }

    #[test]
    fn bounds_check_rejects_negative_min() {
        let desc = PlacementDescriptor {
            x: IntRange::fixed(0),
            y: IntRange::new(-1, 3),
            repeat: IntRange::fixed(1),
        };
        assert!(desc.check_bounds(24, "test").is_err());
    }
}
