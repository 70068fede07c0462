//! Q16.16 Fixed-Point Arithmetic
//!
//! Deterministic scalar math for the match simulation. Health, armor,
//! weights, radii and every timer are stored as Q16.16 so that a host and
//! any replaying client reach bit-identical results.
//!
//! ## Format: Q16.16
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bit Layout: Q16.16 (32-bit signed integer)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [S][IIIIIIIIIIIIIIII][FFFFFFFFFFFFFFFF]                    │
//! │   │  └──── 16 bits ────┘└──── 16 bits ────┘                 │
//! │   └─ Sign bit                                               │
//! │                                                             │
//! │  Range: -32768.0 to +32767.99998 (approx)                   │
//! │  Precision: 1/65536 ≈ 0.000015 units                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Squared distances on a 400-unit map overflow the 32-bit range, so every
//! squared quantity is produced as a widened `i64` (see [`fixed_mul_wide`]).

/// Q16.16 fixed-point number stored as i32.
/// 16 bits integer, 16 bits fractional.
pub type Fixed = i32;

/// Number of fractional bits (16)
pub const FIXED_SCALE: i32 = 16;

/// 1.0 in fixed-point (65536)
pub const FIXED_ONE: Fixed = 1 << FIXED_SCALE; // 65536

/// 0.5 in fixed-point (32768)
pub const FIXED_HALF: Fixed = FIXED_ONE >> 1; // 32768

// =============================================================================
// SIMULATION CONSTANTS
// =============================================================================

/// Tick duration: 1/60 second = round(65536/60) = 1092
pub const TICK_DURATION: Fixed = 1092;

/// Half-extent of the playable map on X and Z (400 units).
pub const MAP_HALF_EXTENT: Fixed = 400 * FIXED_ONE;

/// Height the ground probe starts from (100 units).
pub const GROUND_PROBE_HEIGHT: Fixed = 100 * FIXED_ONE;

// =============================================================================
// CORE OPERATIONS
// =============================================================================

/// Convert a compile-time float to fixed-point.
///
/// # Warning
/// Only use at compile-time or initialization. NEVER in tick loop.
///
/// # Example
/// ```
/// use dropzone::core::fixed::{to_fixed, FIXED_ONE};
/// const MY_VALUE: i32 = to_fixed(2.5);
/// assert_eq!(MY_VALUE, FIXED_ONE * 2 + FIXED_ONE / 2);
/// ```
#[inline]
pub const fn to_fixed(f: f64) -> Fixed {
    (f * (FIXED_ONE as f64)) as Fixed
}

/// Convert a whole number to fixed-point.
#[inline]
pub const fn from_int(i: i32) -> Fixed {
    i << FIXED_SCALE
}

/// Convert fixed-point to float for display/logging.
///
/// # Warning
/// Only use for visual output. NEVER use result in game logic.
#[inline]
pub fn to_float(f: Fixed) -> f32 {
    f as f32 / FIXED_ONE as f32
}

/// Multiply two fixed-point numbers.
///
/// Uses i64 intermediate to prevent overflow, then truncates.
#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    let wide = (a as i64) * (b as i64);
    (wide >> FIXED_SCALE) as Fixed
}

/// Multiply two fixed-point numbers keeping the Q16.16 result in an i64.
///
/// Used for squared lengths, which leave the i32 range past ~181 units.
#[inline]
pub fn fixed_mul_wide(a: Fixed, b: Fixed) -> i64 {
    ((a as i64) * (b as i64)) >> FIXED_SCALE
}

/// Divide two fixed-point numbers.
///
/// Pre-shifts numerator to maintain precision.
/// Returns 0 on divide-by-zero.
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if b == 0 {
        return 0; // Deterministic: don't panic
    }
    let wide = (a as i64) << FIXED_SCALE;
    (wide / b as i64) as Fixed
}

/// Square root of a widened Q16.16 value.
///
/// Integer Newton iteration on the Q32.32 radicand; returns 0 for
/// non-positive input.
pub fn fixed_sqrt_wide(x: i64) -> Fixed {
    if x <= 0 {
        return 0;
    }
    // sqrt(x * 2^16) in Q16.16 == sqrt(x << 16) as raw integer
    let n = (x as u128) << FIXED_SCALE;
    let mut guess = n;
    let mut next = (guess + 1) >> 1;
    while next < guess {
        guess = next;
        next = (guess + n / guess) >> 1;
    }
    guess.min(i32::MAX as u128) as Fixed
}

/// Square root of a fixed-point number.
#[inline]
pub fn fixed_sqrt(x: Fixed) -> Fixed {
    fixed_sqrt_wide(x as i64)
}

/// Clamp a fixed-point number to a range.
#[inline]
pub fn fixed_clamp(value: Fixed, min: Fixed, max: Fixed) -> Fixed {
    value.max(min).min(max)
}

/// Linear interpolation: a + (b - a) * t
/// where t is in fixed-point (0.0 = 0, 1.0 = FIXED_ONE)
#[inline]
pub fn fixed_lerp(a: Fixed, b: Fixed, t: Fixed) -> Fixed {
    let diff = b.wrapping_sub(a);
    a.wrapping_add(fixed_mul(diff, t))
}

// =============================================================================
// SERDE
// =============================================================================

/// Serialize `Fixed` fields as human-readable decimals.
///
/// Used by configuration files: `#[serde(with = "crate::core::fixed::as_float")]`.
/// The decimal is converted once at load time, never inside the tick.
pub mod as_float {
    use serde::{Deserialize, Deserializer, Serializer};
    use super::{Fixed, FIXED_ONE};

    /// Write the value as an `f64`.
    pub fn serialize<S: Serializer>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(*value as f64 / FIXED_ONE as f64)
    }

    /// Read an `f64` and round it to the nearest Q16.16 step.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Fixed, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ok((value * FIXED_ONE as f64).round() as Fixed)
    }
}

// =============================================================================
// TESTS
// =============================================================================
