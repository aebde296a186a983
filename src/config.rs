use crate::pll::corrected_reference;
use crate::registers::CrystalLoadBits;
use crate::{CrystalLoad, FREQ_MULT};

/// Static configuration of one Si5351.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// Identifies the device in errors and log events.
    pub name: &'static str,
    /// State of the `A0` address pin (0x60 when low, 0x61 when high).
    pub address_bit: bool,
    /// Crystal or external oscillator frequency in Hz.
    pub xtal_freq: u32,
    pub crystal_load: CrystalLoad,
    /// Reference correction in parts per billion.
    pub correction_ppb: i32,
}

impl Config {
    pub const fn new(xtal_freq: u32) -> Self {
        Config {
            name: "si5351",
            address_bit: false,
            xtal_freq,
            crystal_load: CrystalLoad::_10,
            correction_ppb: 0,
        }
    }

    /// [Adafruit module]: 25 MHz crystal with a 10 pF load.
    ///
    /// [Adafruit module]: https://www.adafruit.com/product/2045
    pub const fn adafruit_module() -> Self {
        Config::new(25_000_000)
    }

    pub const fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub const fn with_address_bit(mut self, address_bit: bool) -> Self {
        self.address_bit = address_bit;
        self
    }

    pub const fn with_crystal_load(mut self, crystal_load: CrystalLoad) -> Self {
        self.crystal_load = crystal_load;
        self
    }

    pub const fn with_correction(mut self, correction_ppb: i32) -> Self {
        self.correction_ppb = correction_ppb;
        self
    }

    /// Reference frequency used for PLL planning, correction applied.
    ///
    /// `None` for a zero crystal or a correction that leaves no positive
    /// frequency.
    pub fn reference_freq(&self) -> Option<u64> {
        corrected_reference(self.xtal_freq as u64 * FREQ_MULT, self.correction_ppb)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::adafruit_module()
    }
}

impl CrystalLoad {
    pub(crate) fn bits(&self) -> u8 {
        (CrystalLoadBits::RESERVED
            | match *self {
                CrystalLoad::_6 => CrystalLoadBits::CL_6,
                CrystalLoad::_8 => CrystalLoadBits::CL_8,
                CrystalLoad::_10 => CrystalLoadBits::CL_10,
            })
        .bits()
    }
}
