/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
/*!
A platform agnostic frequency planner and driver for the [Si5351], based on
the [`embedded-hal`] traits.

## The Device

The Silicon Labs [Si5351] is an any-frequency CMOS clock generator with two
PLLs (A and B), six fractional output multisynths (CLK0..CLK5) and two
integer-only ones (CLK6, CLK7).

The device has an I²C interface.

## Frequency planning

Every output frequency is the product of two dividers:

```text
f_vco = f_xtal * (a + b / c)          PLL feedback, a in 24..36
f_out = f_vco / (a + b / c) / R       output multisynth, a in 6..1800
```

Outputs share a PLL. Setting an output above 100 MHz recalculates its PLL
around that output and re-derives every other output bound to the same PLL,
followed by a PLL reset. Lower frequencies only touch their own multisynth
(and the PLL, when no other output is using it). Out-of-range requests are
clamped, never rejected.

## Usage

Initialize I²C bus (differs between `embedded_hal` implementations), then
instantiate the device:

```no_run
# fn example<I2C, E>(i2c: I2C) -> Result<(), si5351_plan::Error<E>>
# where I2C: embedded_hal::blocking::i2c::Write<Error = E> + embedded_hal::blocking::i2c::WriteRead<Error = E>, E: core::fmt::Debug {
use si5351_plan::{ClockOutput, Si5351, Si5351Device};

let mut clock = Si5351Device::new_adafruit_module(i2c);
clock.init()?;
clock.set_frequency(ClockOutput::Clk0, 14_175_000)?;
# Ok(())
# }
```

A device shared between contexts goes into a [`SharedSi5351`], which holds a
critical section for the duration of each multi-register operation.

[Si5351]: https://www.silabs.com/documents/public/data-sheets/Si5351-B.pdf
[`embedded-hal`]: https://github.com/japaric/embedded-hal
*/
//#![deny(missing_docs)]
#![deny(warnings)]
#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate bitflags;
use embedded_hal as hal;

use core::convert::TryFrom;

mod log;

mod config;
mod device;
pub mod divider;
mod error;
pub mod multisynth;
pub mod pll;
mod port;
pub mod registers;
mod shared;

#[cfg(test)]
mod mock;

pub use crate::config::Config;
pub use crate::device::{Channel, Si5351Device};
pub use crate::divider::DividerTriple;
pub use crate::error::Error;
pub use crate::multisynth::MultisynthPlan;
pub use crate::pll::PllPlan;
pub use crate::port::{I2cPort, RegisterPort};
pub use crate::registers::{DeviceStatusBits, StickyStatusBits, SynthParams};
pub use crate::shared::SharedSi5351;

use crate::multisynth::SynthKind;

/// Scale of every frequency constant, for builds working in sub-Hz units.
pub const FREQ_MULT: u64 = 1;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CrystalLoad {
    _6,
    _8,
    _10,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PLL {
    A,
    B,
}

impl PLL {
    fn ix(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClockOutput {
    Clk0 = 0,
    Clk1,
    Clk2,
    Clk3,
    Clk4,
    Clk5,
    Clk6,
    Clk7,
}

impl ClockOutput {
    pub const ALL: [ClockOutput; 8] = [
        ClockOutput::Clk0,
        ClockOutput::Clk1,
        ClockOutput::Clk2,
        ClockOutput::Clk3,
        ClockOutput::Clk4,
        ClockOutput::Clk5,
        ClockOutput::Clk6,
        ClockOutput::Clk7,
    ];

    fn ix(&self) -> u8 {
        *self as u8
    }

    fn bit(&self) -> u8 {
        1u8 << self.ix()
    }

    /// CLK6 and CLK7 are driven by the integer-only multisynths.
    pub fn is_aux(&self) -> bool {
        match self {
            ClockOutput::Clk6 | ClockOutput::Clk7 => true,
            _ => false,
        }
    }

    fn synth_kind(&self) -> SynthKind {
        if self.is_aux() {
            SynthKind::Integer
        } else {
            SynthKind::Fractional
        }
    }
}

impl TryFrom<u8> for ClockOutput {
    type Error = ();

    fn try_from(ix: u8) -> Result<Self, ()> {
        ClockOutput::ALL.get(ix as usize).copied().ok_or(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputDivider {
    Div1 = 0,
    Div2,
    Div4,
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
}

impl OutputDivider {
    fn bits(&self) -> u8 {
        *self as u8
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => OutputDivider::Div1,
            1 => OutputDivider::Div2,
            2 => OutputDivider::Div4,
            3 => OutputDivider::Div8,
            4 => OutputDivider::Div16,
            5 => OutputDivider::Div32,
            6 => OutputDivider::Div64,
            _ => OutputDivider::Div128,
        }
    }

    pub fn denominator_u8(&self) -> u8 {
        1 << self.bits()
    }
}

/// Output driver current in mA.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DriveStrength {
    _2,
    _4,
    _6,
    _8,
}

pub trait Si5351 {
    type Error;

    fn init(&mut self) -> Result<(), Self::Error>;
    fn reset(&mut self) -> Result<(), Self::Error>;
    fn read_device_status(&mut self) -> Result<DeviceStatusBits, Self::Error>;
    fn read_sticky_status(&mut self) -> Result<StickyStatusBits, Self::Error>;

    fn set_frequency(&mut self, clk: ClockOutput, freq: u32) -> Result<(), Self::Error>;
    fn set_output_enabled(&mut self, clk: ClockOutput, enabled: bool) -> Result<(), Self::Error>;
    fn set_all_outputs_enabled(&mut self, enabled: bool) -> Result<(), Self::Error>;
    fn reset_pll(&mut self, pll: PLL) -> Result<(), Self::Error>;

    fn select_clock_pll(&mut self, clk: ClockOutput, pll: PLL) -> Result<(), Self::Error>;
    fn set_drive_strength(
        &mut self,
        clk: ClockOutput,
        strength: DriveStrength,
    ) -> Result<(), Self::Error>;
    fn set_phase_offset(&mut self, clk: ClockOutput, offset: u8) -> Result<(), Self::Error>;

    fn output_frequency(&self, clk: ClockOutput) -> u32;
    fn pll_frequency(&self, pll: PLL) -> u64;
}
