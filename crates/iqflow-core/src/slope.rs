//! Slope/shift encoding for piecewise-linear falloff tables
//!
//! Radial and spatial falloff evaluators in hardware take each segment's slope as a
//! `(mantissa, shift)` pair. The slope is split into a normalized fraction in
//! `[0.5, 1)` and a binary exponent, the fraction is quantized to `q_bits` by
//! rounding up, and the exponent becomes the shift.

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Mantissa width and exponent bias of a slope table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlopeEncoding {
    /// Mantissa precision in bits
    pub q_bits: u32,
    /// Added to the negated exponent to form the shift
    pub bias: i32,
}

impl SlopeEncoding {
    /// Radial gain and activity tables
    pub const RADIAL: SlopeEncoding = SlopeEncoding {
        q_bits: 11,
        bias: 2,
    };

    /// Face radius falloff tables
    pub const FACE_RADIUS: SlopeEncoding = SlopeEncoding {
        q_bits: 11,
        bias: 1,
    };

    /// Reject mantissa widths the encoder cannot represent
    pub fn validate(&self) -> Result<()> {
        if self.q_bits == 0 || self.q_bits > 30 {
            return Err(CoreError::InvalidSlopeQBits(self.q_bits));
        }
        Ok(())
    }
}

impl Default for SlopeEncoding {
    fn default() -> Self {
        Self::RADIAL
    }
}

/// Encoded slope of one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlopeEntry {
    /// Signed mantissa
    pub mantissa: i32,
    /// Right shift applied to the mantissa
    pub shift: u32,
}

impl SlopeEntry {
    /// Raw hardware value `mantissa / 2^shift`
    pub fn raw(&self) -> f64 {
        f64::from(self.mantissa) / 2f64.powi(self.shift as i32)
    }

    /// Slope this entry encodes under `encoding`
    pub fn decode(&self, encoding: SlopeEncoding) -> f64 {
        self.raw() * 2f64.powi(encoding.bias - encoding.q_bits as i32)
    }
}

/// Split `x` into a fraction with magnitude in `[0.5, 1)` and a power of two.
///
/// Zero, infinities and NaN come back unchanged with exponent 0.
pub fn frexp(x: f64) -> (f64, i32) {
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }

    let bits = x.to_bits();
    let exponent_bits = ((bits >> 52) & 0x7ff) as i32;
    if exponent_bits == 0 {
        // Subnormal: normalize first
        let (fraction, exponent) = frexp(x * 2f64.powi(54));
        return (fraction, exponent - 54);
    }

    let fraction = f64::from_bits((bits & !(0x7ffu64 << 52)) | (1022u64 << 52));
    (fraction, exponent_bits - 1022)
}

/// Encode one slope
pub fn encode_slope(slope: f64, encoding: SlopeEncoding) -> SlopeEntry {
    let q_bits = encoding.q_bits as i32;
    let (fraction, mut exponent) = frexp(slope);
    let mut fraction = fraction.abs();

    // Rounding up to a full mantissa carries into the exponent
    let full = 2f64.powi(q_bits);
    if (fraction * full).ceil() >= full {
        fraction = 0.5;
        exponent += 1;
    }

    let natural_shift = encoding.bias - exponent;
    let (mantissa, shift) = if natural_shift >= 0 {
        ((fraction * full).ceil(), natural_shift as u32)
    } else {
        (
            (fraction * 2f64.powi(q_bits + exponent - encoding.bias)).ceil(),
            0,
        )
    };

    let mantissa = mantissa as i32;
    SlopeEntry {
        mantissa: if slope < 0.0 { -mantissa } else { mantissa },
        shift,
    }
}

/// Check that knot positions are strictly increasing
pub fn validate_knots(knots: &[i32]) -> Result<()> {
    if knots.len() < 2 {
        return Err(CoreError::TooFewKnots(knots.len()));
    }
    for (index, pair) in knots.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(CoreError::DegenerateKnots {
                index,
                position: pair[0],
            });
        }
    }
    Ok(())
}

/// Encode the slope of every segment between adjacent control points
pub fn encode_slope_table(
    control_points: &[f32],
    knots: &[i32],
    encoding: SlopeEncoding,
) -> Result<Vec<SlopeEntry>> {
    encoding.validate()?;
    if control_points.len() != knots.len() {
        return Err(CoreError::KnotCountMismatch {
            points: control_points.len(),
            knots: knots.len(),
        });
    }
    validate_knots(knots)?;

    Ok(control_points
        .windows(2)
        .zip(knots.windows(2))
        .map(|(cp, kn)| {
            let rise = f64::from(cp[1]) - f64::from(cp[0]);
            let run = f64::from(kn[1]) - f64::from(kn[0]);
            encode_slope(rise / run, encoding)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frexp() {
        assert_eq!(frexp(1.0), (0.5, 1));
        assert_eq!(frexp(0.75), (0.75, 0));
        assert_eq!(frexp(-6.0), (-0.75, 3));
        assert_eq!(frexp(0.0), (0.0, 0));
        let (f, e) = frexp(f64::MIN_POSITIVE / 8.0);
        assert_eq!(f, 0.5);
        assert_eq!(e, -1024);
    }

    #[test]
    fn test_encode_simple_slope() {
        // 0.75 = 0.75 * 2^0: mantissa ceil(0.75 * 2048), shift 2
        let e = encode_slope(0.75, SlopeEncoding::RADIAL);
        assert_eq!(e, SlopeEntry { mantissa: 1536, shift: 2 });
        assert!((e.decode(SlopeEncoding::RADIAL) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_negative_slope_keeps_sign() {
        let e = encode_slope(-0.75, SlopeEncoding::RADIAL);
        assert_eq!(e.mantissa, -1536);
        assert!((e.decode(SlopeEncoding::RADIAL) + 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_carry_renormalizes() {
        // Fraction just below 1 rounds up to 2^11 and must carry
        let slope = 0.99999;
        let e = encode_slope(slope, SlopeEncoding::RADIAL);
        assert_eq!(e.mantissa, 1 << 10);
        assert_eq!(e.shift, 1);
        let rel = (e.decode(SlopeEncoding::RADIAL) - slope).abs() / slope;
        assert!(rel < 1e-3);
    }

    #[test]
    fn test_large_slope_uses_zero_shift() {
        let e = encode_slope(24.0, SlopeEncoding::RADIAL);
        assert_eq!(e.shift, 0);
        assert!((e.decode(SlopeEncoding::RADIAL) - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_table() {
        let entries =
            encode_slope_table(&[1.0, 1.5, 1.25], &[0, 2, 4], SlopeEncoding::RADIAL).unwrap();
        assert_eq!(entries.len(), 2);
        assert!((entries[0].decode(SlopeEncoding::RADIAL) - 0.25).abs() < 1e-9);
        assert!((entries[1].decode(SlopeEncoding::RADIAL) + 0.125).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_knots_rejected() {
        assert_eq!(
            encode_slope_table(&[1.0, 2.0, 3.0], &[0, 4, 4], SlopeEncoding::RADIAL),
            Err(CoreError::DegenerateKnots {
                index: 1,
                position: 4
            })
        );
        assert_eq!(validate_knots(&[3]), Err(CoreError::TooFewKnots(1)));
        assert!(matches!(
            encode_slope_table(&[1.0, 2.0], &[0, 1, 2], SlopeEncoding::RADIAL),
            Err(CoreError::KnotCountMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_q_bits() {
        let bad = SlopeEncoding { q_bits: 0, bias: 2 };
        assert_eq!(
            encode_slope_table(&[0.0, 1.0], &[0, 1], bad),
            Err(CoreError::InvalidSlopeQBits(0))
        );
    }
}
