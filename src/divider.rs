//! Fixed-point fractional divider arithmetic shared by the PLL and
//! multisynth planners.

use crate::registers::SynthParams;

/// Fractional denominator used for every non-integer ratio.
pub const FRAC_DENOM: u32 = 1_000_000;

/// Largest fractional denominator the chip accepts (20 bits).
pub const MAX_DENOM: u32 = 1_048_575;

/// A divider ratio `a + b / c`.
///
/// `c` is always in `[1, MAX_DENOM]` and `b < c`. An exact integer ratio is
/// stored as `(a, 0, 1)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DividerTriple {
    pub a: u32,
    pub b: u32,
    pub c: u32,
}

impl DividerTriple {
    /// Ratio used by the divide-by-4 output path, which ignores the divider.
    pub const DIV_BY_4: DividerTriple = DividerTriple { a: 0, b: 0, c: 1 };

    pub const fn integer(a: u32) -> Self {
        DividerTriple { a, b: 0, c: 1 }
    }

    pub fn is_integer(&self) -> bool {
        self.b == 0
    }

    /// Chip parameter encoding of this ratio:
    ///
    /// ```text
    /// P1 = 128 * a + floor(128 * b / c) - 512
    /// P2 = 128 * b - c * floor(128 * b / c)
    /// P3 = c
    /// ```
    ///
    /// The divide-by-4 ratio encodes as all-zero parameters.
    pub fn params(&self) -> SynthParams {
        if self.b == 0 {
            return SynthParams {
                p1: (128 * self.a).saturating_sub(512),
                p2: 0,
                p3: 1,
            };
        }

        let ratio = (128u64 * self.b as u64 / self.c as u64) as u32;
        SynthParams {
            p1: (128 * self.a + ratio).saturating_sub(512),
            p2: 128 * self.b - self.c * ratio,
            p3: self.c,
        }
    }

    /// `numerator / (a + b / c)`, truncated.
    pub fn divide(&self, numerator: u64) -> u64 {
        let scaled = self.a as u64 * self.c as u64 + self.b as u64;
        if scaled == 0 {
            return 0;
        }
        numerator * self.c as u64 / scaled
    }

    /// `value * (a + b / c)`, truncated.
    pub fn multiply(&self, value: u64) -> u64 {
        value * self.a as u64 + value * self.b as u64 / self.c as u64
    }
}

/// Approximates `target / reference` as `a + b / frac_denom`.
///
/// All divisions truncate. When the remainder yields no fractional numerator
/// the result is the pure integer `(a, 0, 1)`. `reference` must be non-zero.
pub fn solve(target: u64, reference: u64, frac_denom: u32) -> DividerTriple {
    let a = target / reference;
    let b = (target - a * reference) * frac_denom as u64 / reference;

    if b == 0 {
        DividerTriple::integer(a as u32)
    } else {
        DividerTriple {
            a: a as u32,
            b: b as u32,
            c: frac_denom,
        }
    }
}

/// Clamps the integer part of `target / reference` into `[min, max]`.
///
/// Returns `None` when no clamping is needed, otherwise the clamped integer.
/// The caller re-derives its target from the clamped value.
pub fn clamp_integer(target: u64, reference: u64, min: u32, max: u32) -> Option<u32> {
    let a = target / reference;
    if a < min as u64 {
        Some(min)
    } else if a > max as u64 {
        Some(max)
    } else {
        None
    }
}
