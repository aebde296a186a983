//! Output multisynth divider planning and R divider selection.

use crate::divider::{self, DividerTriple, FRAC_DENOM};
use crate::log::debug;
use crate::pll::PLL_VCO_MAX;
use crate::{OutputDivider, FREQ_MULT};

pub const MULTISYNTH_MIN_FREQ: u32 = 500_000 * FREQ_MULT as u32;
pub const MULTISYNTH_MAX_FREQ: u32 = 225_000_000 * FREQ_MULT as u32;
/// Above this, an output needs its PLL recalculated around it.
pub const MULTISYNTH_SHARE_MAX: u32 = 100_000_000 * FREQ_MULT as u32;
pub const MULTISYNTH_DIVBY4_FREQ: u32 = 150_000_000 * FREQ_MULT as u32;
pub const MULTISYNTH67_MAX_FREQ: u32 = MULTISYNTH_DIVBY4_FREQ;

pub const CLKOUT_MIN_FREQ: u32 = 4_000 * FREQ_MULT as u32;
pub const CLKOUT_MAX_FREQ: u32 = MULTISYNTH_MAX_FREQ;

pub const MULTISYNTH_A_MIN: u32 = 6;
pub const MULTISYNTH_A_MAX: u32 = 1800;
pub const MULTISYNTH67_A_MAX: u32 = 254;

/// Divider capabilities of an output stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SynthKind {
    /// MS0..MS5: fractional divider with a divide-by-4 fast path.
    Fractional,
    /// MS6, MS7: even integer divider only.
    Integer,
}

impl SynthKind {
    pub fn max_divider(&self) -> u32 {
        match self {
            SynthKind::Fractional => MULTISYNTH_A_MAX,
            SynthKind::Integer => MULTISYNTH67_A_MAX,
        }
    }

    pub fn max_freq(&self) -> u32 {
        match self {
            SynthKind::Fractional => MULTISYNTH_MAX_FREQ,
            SynthKind::Integer => MULTISYNTH67_MAX_FREQ - 1,
        }
    }
}

/// Result of planning one multisynth.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MultisynthPlan {
    pub divider: DividerTriple,
    /// PLL frequency the divider was computed against.
    pub pll_freq: u64,
    pub div_by_4: bool,
}

impl MultisynthPlan {
    /// Integer mode lowers jitter and applies whenever the ratio is exact.
    pub fn integer_mode(&self) -> bool {
        self.divider.is_integer()
    }

    /// Frequency at the multisynth output, before the R divider.
    pub fn output_freq(&self) -> u64 {
        if self.div_by_4 {
            self.pll_freq / 4
        } else {
            self.divider.divide(self.pll_freq)
        }
    }
}

/// Plans the divider producing `target` Hz.
///
/// With `pll_freq == None` the PLL is free and the largest integer divider
/// keeping the VCO at or below its maximum is chosen, fixing the PLL at
/// `a * target`. Otherwise the divider is derived from the committed PLL
/// frequency, clamping `a` and re-deriving the target from it when needed.
pub fn plan_multisynth(target: u32, pll_freq: Option<u64>, kind: SynthKind) -> MultisynthPlan {
    let target = target.clamp(MULTISYNTH_MIN_FREQ, kind.max_freq()) as u64;
    let div_by_4 = kind == SynthKind::Fractional && target >= MULTISYNTH_DIVBY4_FREQ as u64;

    let (divider, pll_freq) = match pll_freq {
        None => {
            let a = if div_by_4 {
                4
            } else {
                match (PLL_VCO_MAX / target) as u32 {
                    5 => 4,
                    7 => 6,
                    a => a,
                }
            };
            let a = constrain_integer(a, kind);
            (DividerTriple::integer(a), a as u64 * target)
        }
        Some(pll_freq) => {
            let min = MULTISYNTH_A_MIN;
            let max = kind.max_divider();
            let target = match divider::clamp_integer(pll_freq, target, min, max) {
                Some(a) => {
                    debug!(target, clamped_a = a, "multisynth divider out of range");
                    pll_freq / a as u64
                }
                None => target,
            };

            let mut divider = divider::solve(pll_freq, target, FRAC_DENOM);
            if divider.a > max {
                divider = DividerTriple::integer(max);
            }
            if kind == SynthKind::Integer {
                divider = DividerTriple::integer(constrain_integer(divider.a, kind));
            }
            (divider, pll_freq)
        }
    };

    let divider = if div_by_4 {
        DividerTriple::DIV_BY_4
    } else {
        divider
    };

    MultisynthPlan {
        divider,
        pll_freq,
        div_by_4,
    }
}

fn constrain_integer(a: u32, kind: SynthKind) -> u32 {
    match kind {
        SynthKind::Fractional => a,
        SynthKind::Integer => a.clamp(MULTISYNTH_A_MIN, MULTISYNTH67_A_MAX) & !1,
    }
}

/// Picks the R divider for `freq` and returns it with the frequency the
/// multisynth has to produce in front of it.
///
/// Frequencies in `[CLKOUT_MIN_FREQ * 2^k, CLKOUT_MIN_FREQ * 2^(k+1))` use a
/// divider of `128 / 2^k`; anything from `CLKOUT_MIN_FREQ * 128` up is
/// passed through.
pub fn select_r_div(freq: u32) -> (OutputDivider, u32) {
    const DIVIDERS: [OutputDivider; 7] = [
        OutputDivider::Div128,
        OutputDivider::Div64,
        OutputDivider::Div32,
        OutputDivider::Div16,
        OutputDivider::Div8,
        OutputDivider::Div4,
        OutputDivider::Div2,
    ];

    let mut lower = CLKOUT_MIN_FREQ;
    for &r_div in DIVIDERS.iter() {
        if freq >= lower && freq < lower * 2 {
            return (r_div, freq * r_div.denominator_u8() as u32);
        }
        lower *= 2;
    }

    (OutputDivider::Div1, freq)
}
