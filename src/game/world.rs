//! World queries consumed by the simulation.
//!
//! The simulation never resolves collisions itself. It only asks the host's
//! world for the ground height under a planar point.

use crate::core::fixed::Fixed;

/// Ground-surface probe.
///
/// Returns the height of the first surface hit when probing straight down
/// at `(x, z)`, or `None` when nothing is hit.
pub trait GroundQuery: Send + Sync {
    /// Height of the ground under `(x, z)`.
    fn ground_height(&self, x: Fixed, z: Fixed) -> Option<Fixed>;
}

/// Infinite flat plane at a fixed height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlatGround {
    /// Height of the plane
    pub height: Fixed,
}

impl FlatGround {
    /// Plane at `height`.
    pub const fn new(height: Fixed) -> Self {
        Self { height }
    }
}

impl GroundQuery for FlatGround {
    fn ground_height(&self, _x: Fixed, _z: Fixed) -> Option<Fixed> {
        Some(self.height)
    }
}

/// A world with no ground. Every probe misses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoGround;

impl GroundQuery for NoGround {
    fn ground_height(&self, _x: Fixed, _z: Fixed) -> Option<Fixed> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::to_fixed;

    #[test]
    fn test_ground_queries() {
        let flat = FlatGround::new(to_fixed(2.0));
        assert_eq!(flat.ground_height(0, to_fixed(-300.0)), Some(to_fixed(2.0)));
        assert_eq!(NoGround.ground_height(0, 0), None);
    }
}
