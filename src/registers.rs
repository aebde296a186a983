//! Register map and bit-level encodings.

use crate::{ClockOutput, OutputDivider, PLL};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Register {
    DeviceStatus = 0,
    InterruptStatusSticky = 1,
    OutputEnable = 3,
    Clk0 = 16,
    Clk1 = 17,
    Clk2 = 18,
    Clk3 = 19,
    Clk4 = 20,
    Clk5 = 21,
    Clk6 = 22,
    Clk7 = 23,
    Clk6_7OutputDivider = 92,
    Clk0PhaseOffset = 165,
    Clk1PhaseOffset = 166,
    Clk2PhaseOffset = 167,
    Clk3PhaseOffset = 168,
    Clk4PhaseOffset = 169,
    Clk5PhaseOffset = 170,
    PLLReset = 177,
    CrystalLoad = 183,
}

impl Register {
    pub fn addr(&self) -> u8 {
        *self as u8
    }
}

pub(crate) const CLK_REGS: [Register; 8] = [
    Register::Clk0,
    Register::Clk1,
    Register::Clk2,
    Register::Clk3,
    Register::Clk4,
    Register::Clk5,
    Register::Clk6,
    Register::Clk7,
];

bitflags! {
    pub struct DeviceStatusBits: u8 {
        const SYS_INIT = 0b1000_0000;
        const LOL_B = 0b0100_0000;
        const LOL_A = 0b0010_0000;
        const LOS = 0b0001_0000;
        const REVID_MASK = 0b0000_0011;
    }
}

impl DeviceStatusBits {
    pub fn revision(&self) -> u8 {
        (*self & DeviceStatusBits::REVID_MASK).bits()
    }
}

bitflags! {
    pub struct StickyStatusBits: u8 {
        const SYS_INIT_STKY = 0b1000_0000;
        const LOL_B_STKY = 0b0100_0000;
        const LOL_A_STKY = 0b0010_0000;
        const LOS_STKY = 0b0001_0000;
    }
}

bitflags! {
    pub(crate) struct CrystalLoadBits: u8 {
        const RESERVED = 0b00_010010;
        const CL_MASK = 0b11_000000;
        const CL_6 = 0b01_000000;
        const CL_8 = 0b10_000000;
        const CL_10 = 0b11_000000;
    }
}

bitflags! {
    pub(crate) struct ClockControlBits: u8 {
        const CLK_PDN = 0b1000_0000;
        const MS_INT = 0b0100_0000;
        const MS_SRC = 0b0010_0000;
        const CLK_INV = 0b0001_0000;
        const CLK_SRC_MASK = 0b0000_1100;
        const CLK_SRC_XTAL = 0b0000_0000;
        const CLK_SRC_CLKIN = 0b0000_0100;
        const CLK_SRC_MS_ALT = 0b0000_1000;
        const CLK_SRC_MS = 0b0000_1100;
        const CLK_DRV_MASK = 0b0000_0011;
        const CLK_DRV_2 = 0b0000_0000;
        const CLK_DRV_4 = 0b0000_0001;
        const CLK_DRV_6 = 0b0000_0010;
        const CLK_DRV_8 = 0b0000_0011;
    }
}

bitflags! {
    pub(crate) struct PLLResetBits: u8 {
        const PLLB_RST = 0b1000_0000;
        const PLLA_RST = 0b0010_0000;
    }
}

impl PLL {
    pub(crate) fn base_addr(&self) -> u8 {
        match *self {
            PLL::A => 26,
            PLL::B => 34,
        }
    }

    pub(crate) fn reset_bits(&self) -> PLLResetBits {
        match *self {
            PLL::A => PLLResetBits::PLLA_RST,
            PLL::B => PLLResetBits::PLLB_RST,
        }
    }
}

impl ClockOutput {
    pub(crate) fn register(self) -> Register {
        CLK_REGS[self.ix() as usize]
    }

    pub(crate) fn phase_register(self) -> Option<Register> {
        match self {
            ClockOutput::Clk0 => Some(Register::Clk0PhaseOffset),
            ClockOutput::Clk1 => Some(Register::Clk1PhaseOffset),
            ClockOutput::Clk2 => Some(Register::Clk2PhaseOffset),
            ClockOutput::Clk3 => Some(Register::Clk3PhaseOffset),
            ClockOutput::Clk4 => Some(Register::Clk4PhaseOffset),
            ClockOutput::Clk5 => Some(Register::Clk5PhaseOffset),
            _ => None,
        }
    }

    /// First register of the output's multisynth parameter block.
    pub(crate) fn base_addr(self) -> u8 {
        match self {
            ClockOutput::Clk6 => 90,
            ClockOutput::Clk7 => 91,
            clk => 42 + 8 * clk.ix(),
        }
    }

    /// Register holding the output's R divider (and divide-by-4 field).
    pub(crate) fn divider_addr(self) -> u8 {
        if self.is_aux() {
            Register::Clk6_7OutputDivider.addr()
        } else {
            self.base_addr() + 2
        }
    }
}

/// `MSx_P1`, `MSx_P2`, `MSx_P3` register parameters of a fractional divider.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SynthParams {
    pub p1: u32,
    pub p2: u32,
    pub p3: u32,
}

impl SynthParams {
    /// Packs the parameters into a parameter block write beginning with
    /// `base_addr`.
    ///
    /// ```text
    /// [0] base_addr
    /// [1] P3[15:8]   [2] P3[7:0]
    /// [3] P1[17:16]  [4] P1[15:8]   [5] P1[7:0]
    /// [6] P3[19:16] << 4 | P2[19:16]
    /// [7] P2[15:8]   [8] P2[7:0]
    /// ```
    pub fn encode(&self, base_addr: u8) -> [u8; 9] {
        let SynthParams { p1, p2, p3 } = *self;
        [
            base_addr,
            ((p3 & 0x0000_FF00) >> 8) as u8,
            p3 as u8,
            ((p1 & 0x0003_0000) >> 16) as u8,
            ((p1 & 0x0000_FF00) >> 8) as u8,
            p1 as u8,
            (((p3 & 0x000F_0000) >> 12) | ((p2 & 0x000F_0000) >> 16)) as u8,
            ((p2 & 0x0000_FF00) >> 8) as u8,
            p2 as u8,
        ]
    }

    /// Inverse of [`SynthParams::encode`] for the 8 bytes following the
    /// address. Bits outside the parameter fields are ignored.
    pub fn decode(block: &[u8; 8]) -> Self {
        let p3 = ((block[5] as u32 & 0xF0) << 12) | (block[0] as u32) << 8 | block[1] as u32;
        let p1 = ((block[2] as u32 & 0x03) << 16) | (block[3] as u32) << 8 | block[4] as u32;
        let p2 = ((block[5] as u32 & 0x0F) << 16) | (block[6] as u32) << 8 | block[7] as u32;
        SynthParams { p1, p2, p3 }
    }
}

/// Divider-control field of a multisynth parameter block (`base + 2`) or of
/// the shared CLK6/CLK7 output divider register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DividerControl {
    pub r_div: OutputDivider,
    pub div_by_4: bool,
}

const R_DIV_SHIFT: u8 = 4;
const R_DIV_MASK: u8 = 0b0111_0000;
const DIVBY4_MASK: u8 = 0b0000_1100;
const CLK6_R_DIV_MASK: u8 = 0b0000_0111;

impl DividerControl {
    /// Bits owned by this field for `clk`.
    pub fn mask(clk: ClockOutput) -> u8 {
        match clk {
            ClockOutput::Clk6 => CLK6_R_DIV_MASK,
            ClockOutput::Clk7 => R_DIV_MASK,
            _ => R_DIV_MASK | DIVBY4_MASK,
        }
    }

    pub fn pack(&self, clk: ClockOutput) -> u8 {
        match clk {
            ClockOutput::Clk6 => self.r_div.bits(),
            ClockOutput::Clk7 => self.r_div.bits() << R_DIV_SHIFT,
            _ => {
                let div_by_4 = if self.div_by_4 { DIVBY4_MASK } else { 0 };
                self.r_div.bits() << R_DIV_SHIFT | div_by_4
            }
        }
    }

    pub fn unpack(clk: ClockOutput, value: u8) -> Self {
        let r_div = match clk {
            ClockOutput::Clk6 => value & CLK6_R_DIV_MASK,
            _ => (value & R_DIV_MASK) >> R_DIV_SHIFT,
        };
        DividerControl {
            r_div: OutputDivider::from_bits(r_div),
            div_by_4: !clk.is_aux() && value & DIVBY4_MASK == DIVBY4_MASK,
        }
    }

    /// Read-modify-write merge into the current register `value`.
    pub fn merge(&self, clk: ClockOutput, value: u8) -> u8 {
        (value & !Self::mask(clk)) | self.pack(clk)
    }
}
