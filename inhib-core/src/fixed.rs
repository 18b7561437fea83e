//! # Fixed Point - S-format Arithmetic
//!
//! All inhibition arithmetic is integer. A value in S<N> carries N
//! fractional bits, so `1.0` in S20 is `1 << 20`.
//!
//! ## Scales in use
//!
//! - **S7**: cell activity and delivered inhibition (mV)
//! - **S15**: decay persistence `omega`, autoscale rate
//! - **S20**: band multipliers `beta` / `asbeta`
//! - **S24**: autoscale multiplier `gbcm`
//!
//! Squared activity is shifted back to S7 so that every band sum shares
//! one scale regardless of the squaring option.
//!
//! ## Overflow
//!
//! Band sums live in `i64` but are held under [`BAND_SUM_CEILING`] so the
//! later `sum * asbeta` product cannot leave `i64`. Every primitive that can
//! saturate returns a [`Clamped`] so callers count the event instead of
//! silently wrapping.

/// Cell activity, S7 fixed point
pub type Activity = i32;

pub const S7: u32 = 7;
pub const S15: u32 = 15;
pub const S20: u32 = 20;
pub const S24: u32 = 24;

pub const ONE_S7: i32 = 1 << S7;
pub const ONE_S15: i32 = 1 << S15;
pub const ONE_S20: i32 = 1 << S20;
pub const ONE_S24: i32 = 1 << S24;

/// Largest band sum that any S20 beta can multiply without leaving i64
pub const BAND_SUM_CEILING: i64 = i64::MAX / i32::MAX as i64;

/// Range of the delivered S7 value
pub const OUTPUT_CEILING: i64 = i32::MAX as i64;

/// A value that may have been clamped to its representable range
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Clamped<T> {
    pub value: T,
    pub overflowed: bool,
}

impl<T> Clamped<T> {
    pub fn exact(value: T) -> Self {
        Self {
            value,
            overflowed: false,
        }
    }

    pub fn clamped(value: T) -> Self {
        Self {
            value,
            overflowed: true,
        }
    }
}

/// Add `value` to `sum`, clamping the result to `[-ceiling, ceiling]`
pub fn accumulate(sum: i64, value: i64, ceiling: i64) -> Clamped<i64> {
    match sum.checked_add(value) {
        Some(total) if total > ceiling => Clamped::clamped(ceiling),
        Some(total) if total < -ceiling => Clamped::clamped(-ceiling),
        Some(total) => Clamped::exact(total),
        None if value > 0 => Clamped::clamped(ceiling),
        None => Clamped::clamped(-ceiling),
    }
}

/// Clamp an already computed i64 into `[-ceiling, ceiling]`
pub fn clamp_to(value: i64, ceiling: i64) -> Clamped<i64> {
    if value > ceiling {
        Clamped::clamped(ceiling)
    } else if value < -ceiling {
        Clamped::clamped(-ceiling)
    } else {
        Clamped::exact(value)
    }
}

/// Square an S7 activity, staying in S7
pub fn square_s7(activity: Activity) -> i64 {
    let a = activity as i64;
    (a * a) >> S7
}

/// Apply the S24 autoscale multiplier to an S20 beta
pub fn scale_beta(beta: i32, gbcm: i32) -> Clamped<i32> {
    let scaled = (beta as i64 * gbcm as i64) >> S24;
    if scaled > i32::MAX as i64 {
        Clamped::clamped(i32::MAX)
    } else if scaled < i32::MIN as i64 {
        Clamped::clamped(i32::MIN)
    } else {
        Clamped::exact(scaled as i32)
    }
}

/// Weighted band value `asbeta * sum / area`, S20 beta removed, result S7
///
/// An area of zero is treated as one.
pub fn weighted_band(sum: i64, asbeta: i32, area: u32) -> Clamped<i64> {
    let area = area.max(1) as i64;
    match sum.checked_mul(asbeta as i64) {
        Some(product) => Clamped::exact((product / area) >> S20),
        None => {
            let positive = (sum > 0) == (asbeta > 0);
            Clamped::clamped(if positive { i64::MAX >> S20 } else { i64::MIN >> S20 })
        }
    }
}

/// Narrow an S7 total to the delivered i32
pub fn to_output(value: i64) -> Clamped<i32> {
    let c = clamp_to(value, OUTPUT_CEILING);
    Clamped {
        value: c.value as i32,
        overflowed: c.overflowed,
    }
}

/// Sign-preserving square of an S7 output
pub fn square_output(value: i32) -> Clamped<i32> {
    let v = value as i64;
    let squared = (v * v) >> S7;
    to_output(if value < 0 { -squared } else { squared })
}

/// Leaky blend of a fresh sum with its S15-decayed history
pub fn decay_blend(sum: i64, history: i64, omega: i32) -> i64 {
    let carried = history.saturating_mul(omega as i64) >> S15;
    sum.saturating_add(carried)
}

/// Integer square root (floor)
pub fn isqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    // Newton iteration from an upper bound
    let mut x = n / 2 + 1;
    let mut y = (x + n / x) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

/// Smallest r with r*r >= n
pub fn isqrt_ceil(n: u64) -> u64 {
    let r = isqrt(n);
    if r * r < n {
        r + 1
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_clamps_instead_of_wrapping() {
        let c = accumulate(BAND_SUM_CEILING - 1, 10, BAND_SUM_CEILING);
        assert!(c.overflowed);
        assert_eq!(c.value, BAND_SUM_CEILING);

        let c = accumulate(i64::MAX, 1, i64::MAX);
        assert!(c.overflowed);
        assert_eq!(c.value, i64::MAX);

        let c = accumulate(-5, -7, 100);
        assert!(!c.overflowed);
        assert_eq!(c.value, -12);
    }

    #[test]
    fn test_weighted_band_s7() {
        // beta 0.5, sum 4.0 over area 2 -> 1.0
        let c = weighted_band(4 * ONE_S7 as i64, ONE_S20 / 2, 2);
        assert_eq!(c, Clamped::exact(ONE_S7 as i64));
        // zero area behaves like one
        assert_eq!(weighted_band(ONE_S7 as i64, ONE_S20, 0).value, ONE_S7 as i64);
    }

    #[test]
    fn test_ceiling_keeps_products_in_range() {
        let c = weighted_band(BAND_SUM_CEILING, i32::MAX, 1);
        assert!(!c.overflowed);
        let c = weighted_band(i64::MAX, i32::MAX, 1);
        assert!(c.overflowed);
    }

    #[test]
    fn test_scale_beta() {
        assert_eq!(scale_beta(ONE_S20, ONE_S24).value, ONE_S20);
        assert_eq!(scale_beta(ONE_S20, ONE_S24 / 4).value, ONE_S20 / 4);
        assert!(scale_beta(i32::MAX, ONE_S24 * 2).overflowed);
    }

    #[test]
    fn test_square_output_keeps_sign() {
        assert_eq!(square_output(2 * ONE_S7).value, 4 * ONE_S7);
        assert_eq!(square_output(-2 * ONE_S7).value, -4 * ONE_S7);
        assert!(square_output(i32::MAX).overflowed);
    }

    #[test]
    fn test_decay_blend() {
        // half of the history carries over
        assert_eq!(decay_blend(100, 80, ONE_S15 / 2), 140);
        assert_eq!(decay_blend(100, 80, 0), 100);
    }

    #[test]
    fn test_isqrt() {
        for n in 0u64..2000 {
            let r = isqrt(n);
            assert!(r * r <= n && (r + 1) * (r + 1) > n, "isqrt({})", n);
            let c = isqrt_ceil(n);
            assert!(c * c >= n && (c == 0 || (c - 1) * (c - 1) < n));
        }
        assert_eq!(isqrt(u64::MAX), u32::MAX as u64);
    }
}
