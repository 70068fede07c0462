//! Fixed-Point World Position
//!
//! Deterministic 3D vector. The ground plane is XZ; Y is height and only
//! comes from ground probes, so every gameplay distance is planar.

use std::fmt;
use std::ops::{Add, Sub};
use serde::{Serialize, Deserialize};

use super::fixed::{
    Fixed, FIXED_ONE, FIXED_SCALE,
    fixed_div, fixed_mul, fixed_mul_wide, fixed_sqrt_wide,
};

/// 3D vector with fixed-point components.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FixedVec3 {
    /// X component (Q16.16 fixed-point)
    pub x: Fixed,
    /// Y component, height above the world origin
    pub y: Fixed,
    /// Z component (Q16.16 fixed-point)
    pub z: Fixed,
}

impl FixedVec3 {
    /// Zero vector (world origin)
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };

    /// Unit vector pointing forward (+Z)
    pub const FORWARD: Self = Self { x: 0, y: 0, z: FIXED_ONE };

    /// Create a new vector from fixed-point components.
    #[inline]
    pub const fn new(x: Fixed, y: Fixed, z: Fixed) -> Self {
        Self { x, y, z }
    }

    /// Create a vector from integer components.
    #[inline]
    pub const fn from_ints(x: i32, y: i32, z: i32) -> Self {
        Self {
            x: x << FIXED_SCALE,
            y: y << FIXED_SCALE,
            z: z << FIXED_SCALE,
        }
    }

    /// Create a ground-plane point at height zero.
    #[inline]
    pub const fn on_plane(x: Fixed, z: Fixed) -> Self {
        Self { x, y: 0, z }
    }

    /// Add another vector.
    #[inline]
    pub fn add(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_add(other.x),
            y: self.y.wrapping_add(other.y),
            z: self.z.wrapping_add(other.z),
        }
    }

    /// Subtract another vector.
    #[inline]
    pub fn sub(self, other: Self) -> Self {
        Self {
            x: self.x.wrapping_sub(other.x),
            y: self.y.wrapping_sub(other.y),
            z: self.z.wrapping_sub(other.z),
        }
    }

    /// Scale by a fixed-point scalar.
    #[inline]
    pub fn scale(self, scalar: Fixed) -> Self {
        Self {
            x: fixed_mul(self.x, scalar),
            y: fixed_mul(self.y, scalar),
            z: fixed_mul(self.z, scalar),
        }
    }

    /// Same position with a different height.
    #[inline]
    pub fn with_y(self, y: Fixed) -> Self {
        Self { y, ..self }
    }

    /// Squared planar (XZ) distance, widened to i64 Q16.16.
    #[inline]
    pub fn planar_distance_squared(self, other: Self) -> i64 {
        let dx = self.x.wrapping_sub(other.x);
        let dz = self.z.wrapping_sub(other.z);
        fixed_mul_wide(dx, dx) + fixed_mul_wide(dz, dz)
    }

    /// Planar (XZ) distance. Prefer the squared form for comparisons.
    #[inline]
    pub fn planar_distance(self, other: Self) -> Fixed {
        fixed_sqrt_wide(self.planar_distance_squared(other))
    }

    /// Is `other` within `radius` of this point on the ground plane?
    #[inline]
    pub fn within_planar(self, other: Self, radius: Fixed) -> bool {
        self.planar_distance_squared(other) <= fixed_mul_wide(radius, radius)
    }

    /// Unit-length direction on the ground plane (Y dropped).
    ///
    /// `None` when the planar part is too short to give a direction.
    pub fn normalize_planar(self) -> Option<Self> {
        let len = fixed_sqrt_wide(fixed_mul_wide(self.x, self.x) + fixed_mul_wide(self.z, self.z));
        if len == 0 {
            return None;
        }
        Some(Self {
            x: fixed_div(self.x, len),
            y: 0,
            z: fixed_div(self.z, len),
        })
    }

    /// Convert to float tuple for logging.
    #[inline]
    pub fn to_floats(self) -> (f32, f32, f32) {
        (
            self.x as f32 / FIXED_ONE as f32,
            self.y as f32 / FIXED_ONE as f32,
            self.z as f32 / FIXED_ONE as f32,
        )
    }
}

impl Add for FixedVec3 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        FixedVec3::add(self, rhs)
    }
}

impl Sub for FixedVec3 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        FixedVec3::sub(self, rhs)
    }
}

impl fmt::Debug for FixedVec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (fx, fy, fz) = self.to_floats();
        write!(f, "Vec3({:.3}, {:.3}, {:.3})", fx, fy, fz)
    }
}

impl fmt::Display for FixedVec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (fx, fy, fz) = self.to_floats();
        write!(f, "({:.3}, {:.3}, {:.3})", fx, fy, fz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::to_fixed;

    #[test]
    fn test_vec3_add_sub() {
        let a = FixedVec3::from_ints(3, 1, 4);
        let b = FixedVec3::from_ints(1, 1, 2);
        assert_eq!(a + b, FixedVec3::from_ints(4, 2, 6));
        assert_eq!(a - b, FixedVec3::from_ints(2, 0, 2));
    }

    #[test]
    fn test_planar_distance_ignores_height() {
        let a = FixedVec3::from_ints(0, 0, 0);
        let b = FixedVec3::from_ints(3, 50, 4);
        assert_eq!(a.planar_distance(b), to_fixed(5.0));
    }

    #[test]
    fn test_planar_distance_far_corner() {
        // 400,400 is far beyond the i32 range once squared
        let corner = FixedVec3::from_ints(400, 0, 300);
        assert_eq!(FixedVec3::ZERO.planar_distance(corner), to_fixed(500.0));
    }

    #[test]
    fn test_within_planar_is_inclusive() {
        let center = FixedVec3::ZERO;
        let edge = FixedVec3::from_ints(200, 0, 0);
        assert!(center.within_planar(edge, to_fixed(200.0)));
        assert!(!center.within_planar(edge, to_fixed(199.0)));
    }

    #[test]
    fn test_normalize_planar() {
        let dir = FixedVec3::from_ints(100, 7, 0).normalize_planar().unwrap();
        assert_eq!(dir, FixedVec3::new(FIXED_ONE, 0, 0));

        let diag = FixedVec3::from_ints(3, 0, -4).normalize_planar().unwrap();
        assert!((diag.x - to_fixed(0.6)).abs() <= 2);
        assert!((diag.z - to_fixed(-0.8)).abs() <= 2);

        assert_eq!(FixedVec3::from_ints(0, 9, 0).normalize_planar(), None);
        assert_eq!(FixedVec3::ZERO.normalize_planar(), None);
    }
}
