//! Parameter blending
//!
//! Every module blends two neighbouring parameter blocks the same way: floating
//! scalars and arrays move linearly from `A` to `B`, everything else is copied from `A`.

use crate::{CoreError, Result};

/// Tolerance for recognising the endpoint ratios 0 and 1
pub const RATIO_EPSILON: f32 = 1e-9;

/// Parameter records that can be blended field by field
pub trait Interpolate: Clone {
    /// Blend every blendable field towards `other` by `ratio`, copying the rest from `self`.
    ///
    /// Only called with `ratio` strictly inside (0, 1).
    fn blend_fields(&self, other: &Self, ratio: f32) -> Result<Self>;
}

/// Blend `a` towards `b` by `ratio`.
///
/// The same block on both sides returns a copy without looking at the ratio.
/// Ratios 0 and 1 return copies of `a` and `b`. Anything outside [0, 1] fails.
pub fn interpolate<P: Interpolate>(a: &P, b: &P, ratio: f32) -> Result<P> {
    if std::ptr::eq(a, b) {
        return Ok(a.clone());
    }
    if ratio > 0.0 && ratio < 1.0 {
        a.blend_fields(b, ratio)
    } else if ratio.abs() < RATIO_EPSILON {
        Ok(a.clone())
    } else if (ratio - 1.0).abs() < RATIO_EPSILON {
        Ok(b.clone())
    } else {
        Err(CoreError::InvalidRatio(ratio))
    }
}

/// Pick `b` once `ratio` reaches one half, else `a`
pub fn nearest_neighbour<P: Clone>(a: &P, b: &P, ratio: f32) -> P {
    if ratio + 0.5 >= 1.0 {
        b.clone()
    } else {
        a.clone()
    }
}

/// Linear blend of two scalars, evaluated in double precision
pub fn lerp(a: f32, b: f32, ratio: f32) -> f32 {
    let (a, b, ratio) = (f64::from(a), f64::from(b), f64::from(ratio));
    (a + ratio * (b - a)) as f32
}

/// Element-wise [`lerp`] of two equally sized arrays
pub fn lerp_slice(field: &str, a: &[f32], b: &[f32], ratio: f32) -> Result<Vec<f32>> {
    if a.len() != b.len() {
        return Err(CoreError::FieldMismatch {
            field: field.to_string(),
        });
    }
    Ok(a.iter().zip(b).map(|(&x, &y)| lerp(x, y, ratio)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Pair {
        gain: f32,
        enable: bool,
    }

    impl Interpolate for Pair {
        fn blend_fields(&self, other: &Self, ratio: f32) -> Result<Self> {
            Ok(Pair {
                gain: lerp(self.gain, other.gain, ratio),
                enable: self.enable,
            })
        }
    }

    #[test]
    fn test_endpoints_copy() {
        let a = Pair { gain: 1.0, enable: true };
        let b = Pair { gain: 3.0, enable: false };
        assert_eq!(interpolate(&a, &b, 0.0).unwrap(), a);
        assert_eq!(interpolate(&a, &b, 1.0).unwrap(), b);
    }

    #[test]
    fn test_midpoint_keeps_flags_from_a() {
        let a = Pair { gain: 0.0, enable: true };
        let b = Pair { gain: 10.0, enable: false };
        let mid = interpolate(&a, &b, 0.5).unwrap();
        assert_eq!(mid.gain, 5.0);
        assert!(mid.enable);
    }

    #[test]
    fn test_same_block_ignores_ratio() {
        let a = Pair { gain: 2.0, enable: false };
        // Even an invalid ratio is fine when both sides are the same block
        assert_eq!(interpolate(&a, &a, 7.0).unwrap(), a);
    }

    #[test]
    fn test_invalid_ratio() {
        let a = Pair { gain: 0.0, enable: true };
        let b = a.clone();
        assert_eq!(
            interpolate(&a, &b, 1.5).unwrap_err(),
            CoreError::InvalidRatio(1.5)
        );
        assert!(interpolate(&a, &b, -0.1).is_err());
        assert!(interpolate(&a, &b, f32::NAN).is_err());
    }

    #[test]
    fn test_nearest_neighbour() {
        assert_eq!(nearest_neighbour(&1, &2, 0.49), 1);
        assert_eq!(nearest_neighbour(&1, &2, 0.5), 2);
    }

    #[test]
    fn test_lerp_slice_length_mismatch() {
        assert!(lerp_slice("c", &[1.0, 2.0], &[1.0], 0.5).is_err());
        assert_eq!(
            lerp_slice("c", &[0.0, 2.0], &[4.0, 2.0], 0.25).unwrap(),
            vec![1.0, 2.0]
        );
    }
}
