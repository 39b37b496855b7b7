//! Fixed-point quantization
//!
//! Hardware fields store `round(value * 2^q)` clamped to the field's bit-width range.
//! Rounding is half away from zero and always happens before clamping.

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Largest supported Q scale
pub const MAX_Q_BITS: u32 = 32;

/// Inclusive integer range of a hardware field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldRange {
    /// Smallest representable value
    pub min: i64,
    /// Largest representable value
    pub max: i64,
}

impl FieldRange {
    /// Range of a zero-width field
    pub const EMPTY: Self = Self { min: 0, max: -1 };

    /// Explicit range
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Two's complement range of a `bits` wide field, `bits` capped at 32.
    ///
    /// Zero bits give an empty range, which the register encoder refuses.
    pub fn signed(bits: u32) -> Self {
        if bits == 0 {
            return Self::EMPTY;
        }
        let bits = bits.min(32);
        Self {
            min: -(1i64 << (bits - 1)),
            max: (1i64 << (bits - 1)) - 1,
        }
    }

    /// Unsigned range of a `bits` wide field, `bits` capped at 32; zero bits give an empty range
    pub fn unsigned(bits: u32) -> Self {
        if bits == 0 {
            return Self::EMPTY;
        }
        let bits = bits.min(32);
        Self {
            min: 0,
            max: (1i64 << bits) - 1,
        }
    }

    /// Clamp `value` into the range
    pub fn clamp(&self, value: i64) -> i64 {
        value.max(self.min).min(self.max)
    }

    /// Clamp a 32-bit `value`, with the bounds first narrowed to `i32`
    pub fn clamp_i32(&self, value: i32) -> i32 {
        let narrow = |bound: i64| bound.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        value.max(narrow(self.min)).min(narrow(self.max))
    }

    /// Whether no value fits
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Whether `value` is representable
    pub fn contains(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// How a scaled value is stored in its field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    /// `round(value * 2^q)`
    #[default]
    Direct,
    /// `2^bit_width - round(|value| * 2^q)`, for sign/magnitude LUT fields
    Complement {
        /// Width of the raw field
        bit_width: u32,
    },
}

pub(crate) fn check_q_bits(q_bits: u32) -> Result<()> {
    if q_bits > MAX_Q_BITS {
        return Err(CoreError::InvalidQBits(q_bits));
    }
    Ok(())
}

/// `round(value * 2^q_bits)`, half away from zero, saturating at the i64 range
pub fn scale_to_q(value: f32, q_bits: u32) -> i64 {
    (f64::from(value) * 2f64.powi(q_bits as i32)).round() as i64
}

/// Scale, round, then clamp into `range`
pub fn quantize(value: f32, q_bits: u32, range: FieldRange) -> i64 {
    range.clamp(scale_to_q(value, q_bits))
}

/// Inverse of [`scale_to_q`]
pub fn dequantize(raw: i64, q_bits: u32) -> f32 {
    (raw as f64 / 2f64.powi(q_bits as i32)) as f32
}

/// Store the quantized magnitude as its complement against `2^bit_width`
pub fn complement_encode(value: f32, q_bits: u32, bit_width: u32, range: FieldRange) -> i64 {
    let magnitude = scale_to_q(value.abs(), q_bits);
    let full_scale = 1i64 << bit_width.min(62);
    range.clamp(full_scale - magnitude)
}

/// Encode `value` with `encoding`
pub fn encode(value: f32, q_bits: u32, range: FieldRange, encoding: Encoding) -> i64 {
    match encoding {
        Encoding::Direct => quantize(value, q_bits, range),
        Encoding::Complement { bit_width } => complement_encode(value, q_bits, bit_width, range),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_after_round() {
        // 1.2 * 256 = 307.2 rounds to 307 before the clamp to 255
        assert_eq!(scale_to_q(1.2, 8), 307);
        assert_eq!(quantize(1.2, 8, FieldRange::unsigned(8)), 255);
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(scale_to_q(0.5, 0), 1);
        assert_eq!(scale_to_q(-0.5, 0), -1);
        assert_eq!(scale_to_q(2.5, 0), 3);
        assert_eq!(scale_to_q(-2.5, 0), -3);
    }

    #[test]
    fn test_bit_field_ranges() {
        assert_eq!(FieldRange::signed(8), FieldRange::new(-128, 127));
        assert_eq!(FieldRange::unsigned(12), FieldRange::new(0, 4095));
        assert_eq!(FieldRange::unsigned(32).max, u32::MAX as i64);
        assert!(FieldRange::signed(0).is_empty());
        assert!(FieldRange::unsigned(0).is_empty());
        assert!(!FieldRange::unsigned(1).is_empty());
    }

    #[test]
    fn test_clamp_i32_with_wide_bounds() {
        let wide = FieldRange::new(-(1i64 << 40), 1i64 << 40);
        assert_eq!(wide.clamp_i32(i32::MAX), i32::MAX);
        assert_eq!(wide.clamp_i32(-7), -7);

        // Upper bound inside i32, lower bound below it
        let low_wide = FieldRange::new(i64::MIN, 1000);
        assert_eq!(low_wide.clamp_i32(5000), 1000);
        assert_eq!(low_wide.clamp_i32(i32::MIN), i32::MIN);
    }

    #[test]
    fn test_negative_clamps_to_signed_min() {
        assert_eq!(quantize(-3.0, 6, FieldRange::signed(8)), -128);
        assert_eq!(quantize(-1.0, 6, FieldRange::signed(8)), -64);
    }

    #[test]
    fn test_complement_trick() {
        let range = FieldRange::unsigned(8);
        // 0.25 * 2^6 = 16, stored as 256 - 16
        assert_eq!(complement_encode(-0.25, 6, 8, range), 240);
        // Zero magnitude overflows the field and clamps
        assert_eq!(complement_encode(0.0, 6, 8, range), 255);
    }

    #[test]
    fn test_dequantize() {
        assert_eq!(dequantize(384, 8), 1.5);
        assert_eq!(dequantize(-64, 6), -1.0);
    }

    #[test]
    fn test_q_bits_limit() {
        assert!(check_q_bits(32).is_ok());
        assert_eq!(check_q_bits(33), Err(CoreError::InvalidQBits(33)));
    }
}
