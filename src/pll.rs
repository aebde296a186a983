//! PLL feedback divider planning.
//!
//! The VCO runs at `f_ref * (a + b / c)` and has to stay within 600..900 MHz,
//! which on a 25 MHz crystal limits `a` to 24..36.

use core::convert::TryFrom;

use crate::divider::{self, DividerTriple, FRAC_DENOM};
use crate::log::debug;
use crate::FREQ_MULT;

pub const PLL_VCO_MIN: u64 = 600_000_000 * FREQ_MULT;
pub const PLL_VCO_MAX: u64 = 900_000_000 * FREQ_MULT;

pub const PLL_A_MIN: u32 = 24;
pub const PLL_A_MAX: u32 = 36;

/// Applies a signed parts-per-billion correction to a nominal reference.
///
/// Returns `None` when the corrected reference is not a positive frequency.
pub fn corrected_reference(nominal: u64, correction_ppb: i32) -> Option<u64> {
    let nominal = i64::try_from(nominal).ok()?;
    let delta = nominal.checked_mul(correction_ppb as i64)? / 1_000_000_000;
    let corrected = nominal.checked_add(delta)?;
    if corrected > 0 {
        Some(corrected as u64)
    } else {
        None
    }
}

/// Feedback divider for one PLL along with the VCO frequency it realizes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PllPlan {
    pub divider: DividerTriple,
    pub vco_freq: u64,
}

/// Computes the feedback divider producing `target_vco` from `ref_freq`.
///
/// An integer part outside `[PLL_A_MIN, PLL_A_MAX]` is clamped and the VCO
/// target becomes `ref_freq * a`. `ref_freq` must already carry the
/// reference correction.
pub fn plan_pll(ref_freq: u64, target_vco: u64) -> PllPlan {
    let target = match divider::clamp_integer(target_vco, ref_freq, PLL_A_MIN, PLL_A_MAX) {
        Some(a) => {
            debug!(target_vco, clamped_a = a, "PLL multiplier out of range");
            ref_freq * a as u64
        }
        None => target_vco,
    };

    let divider = divider::solve(target, ref_freq, FRAC_DENOM);
    let vco_freq = divider.multiply(ref_freq);
    debug!(
        target_vco,
        vco_freq,
        a = divider.a,
        b = divider.b,
        c = divider.c,
        "planned PLL"
    );

    PllPlan { divider, vco_freq }
}

/// Last committed configuration of one PLL. A frequency of 0 means the PLL
/// has not been programmed yet.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PllState {
    pub freq: u64,
    pub divider: DividerTriple,
}

impl PllState {
    pub const UNSET: PllState = PllState {
        freq: 0,
        divider: DividerTriple::integer(0),
    };

    pub fn is_set(&self) -> bool {
        self.freq != 0
    }
}

impl From<PllPlan> for PllState {
    fn from(plan: PllPlan) -> Self {
        PllState {
            freq: plan.vco_freq,
            divider: plan.divider,
        }
    }
}
