use crate::divider::DividerTriple;
use crate::error::Error;
use crate::hal::blocking::i2c::{Write, WriteRead};
use crate::log::{debug, info, trace};
use crate::multisynth::{
    plan_multisynth, select_r_div, MultisynthPlan, SynthKind, CLKOUT_MIN_FREQ,
    MULTISYNTH_SHARE_MAX,
};
use crate::pll::{plan_pll, PllState};
use crate::port::{I2cPort, RegisterPort};
use crate::registers::{
    ClockControlBits, DeviceStatusBits, DividerControl, Register, StickyStatusBits, CLK_REGS,
};
use crate::{ClockOutput, Config, DriveStrength, OutputDivider, Si5351, PLL};

const INIT_POLL_ATTEMPTS: usize = 1000;

/// Runtime state of one clock output.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Requested frequency in Hz after clamping, 0 while unset.
    pub freq: u32,
    pub pll: PLL,
    pub r_div: OutputDivider,
    pub divider: DividerTriple,
    pub int_mode: bool,
    pub div_by_4: bool,
    /// The first frequency set turned the output on.
    pub ever_enabled: bool,
    pub drive: DriveStrength,
}

impl Channel {
    const UNSET: Channel = Channel {
        freq: 0,
        pll: PLL::A,
        r_div: OutputDivider::Div1,
        divider: DividerTriple::integer(0),
        int_mode: false,
        div_by_4: false,
        ever_enabled: false,
        drive: DriveStrength::_8,
    };

    pub fn is_set(&self) -> bool {
        self.freq != 0
    }

    fn apply(&mut self, r_div: OutputDivider, plan: &MultisynthPlan) {
        self.r_div = r_div;
        self.divider = plan.divider;
        self.int_mode = plan.integer_mode();
        self.div_by_4 = plan.div_by_4;
    }
}

impl DriveStrength {
    fn control_bits(&self) -> ClockControlBits {
        match *self {
            DriveStrength::_2 => ClockControlBits::CLK_DRV_2,
            DriveStrength::_4 => ClockControlBits::CLK_DRV_4,
            DriveStrength::_6 => ClockControlBits::CLK_DRV_6,
            DriveStrength::_8 => ClockControlBits::CLK_DRV_8,
        }
    }
}

/// Control register contents for `clk` and the bits of it this driver owns.
fn clock_control(
    clk: ClockOutput,
    channel: &Channel,
    enabled: bool,
) -> (ClockControlBits, ClockControlBits) {
    let mut bits = ClockControlBits::CLK_SRC_MS | channel.drive.control_bits();
    if !enabled {
        bits |= ClockControlBits::CLK_PDN;
    }
    if channel.pll == PLL::B {
        bits |= ClockControlBits::MS_SRC;
    }

    let mut mask = ClockControlBits::all() - ClockControlBits::CLK_INV;
    if clk.is_aux() {
        // bit 6 of CLK6/CLK7 control is the PLL's FBx_INT
        mask -= ClockControlBits::MS_INT;
    } else if channel.int_mode {
        bits |= ClockControlBits::MS_INT;
    }

    (bits, mask)
}

/// Si5351 driver
pub struct Si5351Device<P> {
    port: P,
    config: Config,
    ref_freq: Option<u64>,
    plls: [PllState; 2],
    channels: [Channel; 8],
    clk_enabled_mask: u8,
}

impl<I2C, E> Si5351Device<I2cPort<I2C>>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    /// Creates a new driver from a I2C peripheral
    pub fn new(i2c: I2C, address_bit: bool, xtal_freq: u32) -> Self {
        Si5351Device::with_config(
            i2c,
            Config::new(xtal_freq).with_address_bit(address_bit),
        )
    }

    pub fn new_adafruit_module(i2c: I2C) -> Self {
        Si5351Device::with_config(i2c, Config::adafruit_module())
    }

    pub fn with_config(i2c: I2C, config: Config) -> Self {
        Si5351Device::with_port(I2cPort::new(i2c, config.address_bit), config)
    }
}

impl<P: RegisterPort> Si5351Device<P> {
    pub fn with_port(port: P, config: Config) -> Self {
        Si5351Device {
            port,
            config,
            ref_freq: config.reference_freq(),
            plls: [PllState::UNSET; 2],
            channels: [Channel::UNSET; 8],
            clk_enabled_mask: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn channel(&self, clk: ClockOutput) -> &Channel {
        &self.channels[clk.ix() as usize]
    }

    /// Crystal frequency with the ppb correction applied, `None` when the
    /// configuration leaves no usable reference.
    pub fn reference_frequency(&self) -> Option<u64> {
        self.ref_freq
    }

    fn planning_reference(&self) -> Result<u64, Error<P::Error>> {
        self.ref_freq.ok_or(Error::InvalidParameter)
    }

    pub fn release(self) -> P {
        self.port
    }

    #[cfg(test)]
    pub(crate) fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    fn read_register(&mut self, reg: Register) -> Result<u8, Error<P::Error>> {
        self.read_addr(reg.addr())
    }

    fn read_addr(&mut self, addr: u8) -> Result<u8, Error<P::Error>> {
        self.port
            .read(addr)
            .map_err(Error::transport(self.config.name, addr))
    }

    fn write_register(&mut self, reg: Register, byte: u8) -> Result<(), Error<P::Error>> {
        self.write_block(&[reg.addr(), byte])
    }

    fn write_block(&mut self, bytes: &[u8]) -> Result<(), Error<P::Error>> {
        trace!(register = bytes[0], len = bytes.len() - 1, "write");
        self.port
            .write(bytes)
            .map_err(Error::transport(self.config.name, bytes[0]))
    }

    fn modify_addr(&mut self, addr: u8, mask: u8, bits: u8) -> Result<(), Error<P::Error>> {
        let value = self.read_addr(addr)?;
        self.write_block(&[addr, (value & !mask) | (bits & mask)])
    }

    fn write_output_enable(&mut self, enabled_mask: u8) -> Result<(), Error<P::Error>> {
        self.write_register(Register::OutputEnable, !enabled_mask)
    }

    fn power_down_outputs(&mut self) -> Result<(), Error<P::Error>> {
        self.write_output_enable(0)?;
        for &reg in CLK_REGS.iter() {
            self.write_register(reg, ClockControlBits::CLK_PDN.bits())?;
        }
        Ok(())
    }

    fn clear_state(&mut self) {
        self.plls = [PllState::UNSET; 2];
        self.channels = [Channel::UNSET; 8];
        self.clk_enabled_mask = 0;
    }

    fn write_pll(&mut self, pll: PLL, divider: &DividerTriple) -> Result<(), Error<P::Error>> {
        self.write_block(&divider.params().encode(pll.base_addr()))
    }

    fn pulse_pll_reset(&mut self, pll: PLL) -> Result<(), Error<P::Error>> {
        debug!(device = self.config.name, ?pll, "PLL reset");
        self.write_register(Register::PLLReset, pll.reset_bits().bits())
    }

    /// Writes the divider of `clk` with its R divider and divide-by-4
    /// fields, then its control register.
    fn write_multisynth(
        &mut self,
        clk: ClockOutput,
        channel: &Channel,
        enabled: bool,
    ) -> Result<(), Error<P::Error>> {
        let control = DividerControl {
            r_div: channel.r_div,
            div_by_4: channel.div_by_4,
        };

        if clk.is_aux() {
            self.write_block(&[clk.base_addr(), channel.divider.a as u8])?;
            let addr = clk.divider_addr();
            let value = self.read_addr(addr)?;
            self.write_block(&[addr, control.merge(clk, value)])?;
        } else {
            let mut block = channel.divider.params().encode(clk.base_addr());
            // base + 2 carries P1[17:16] next to the divider fields
            block[3] = control.merge(clk, block[3]);
            self.write_block(&block)?;
        }

        self.write_clock_control(clk, channel, enabled)
    }

    fn write_clock_control(
        &mut self,
        clk: ClockOutput,
        channel: &Channel,
        enabled: bool,
    ) -> Result<(), Error<P::Error>> {
        let (bits, mask) = clock_control(clk, channel, enabled);
        self.modify_addr(clk.register().addr(), mask.bits(), bits.bits())
    }

    /// Recalculates the PLL of `clk` around its frequency and re-derives
    /// every output bound to that PLL, then resets the PLL.
    fn recalculate_shared_pll(
        &mut self,
        clk: ClockOutput,
        channels: &mut [Channel; 8],
        enabled_mask: u8,
    ) -> Result<PllState, Error<P::Error>> {
        let ref_freq = self.planning_reference()?;
        let pll = channels[clk.ix() as usize].pll;
        let driver = plan_multisynth(
            channels[clk.ix() as usize].freq,
            None,
            SynthKind::Fractional,
        );
        let plan = plan_pll(ref_freq, driver.pll_freq);
        self.write_pll(pll, &plan.divider)?;

        for &other in ClockOutput::ALL.iter() {
            let channel = &mut channels[other.ix() as usize];
            if channel.pll != pll || !channel.is_set() {
                continue;
            }

            let (r_div, ms_freq) = select_r_div(channel.freq);
            let ms = plan_multisynth(ms_freq, Some(plan.vco_freq), other.synth_kind());
            channel.apply(r_div, &ms);
            debug!(
                device = self.config.name,
                clk = ?other,
                freq = channel.freq,
                a = ms.divider.a,
                b = ms.divider.b,
                c = ms.divider.c,
                "re-derived output on shared PLL"
            );
            self.write_multisynth(other, channel, enabled_mask & other.bit() != 0)?;
        }

        self.pulse_pll_reset(pll)?;
        Ok(plan.into())
    }

    /// Updates one output, re-planning its PLL only when no other output
    /// depends on it.
    fn update_single_output(
        &mut self,
        clk: ClockOutput,
        channels: &mut [Channel; 8],
        enabled_mask: u8,
    ) -> Result<PllState, Error<P::Error>> {
        let ref_freq = self.planning_reference()?;
        let ix = clk.ix() as usize;
        let pll = channels[ix].pll;
        let kind = clk.synth_kind();
        let (r_div, ms_freq) = select_r_div(channels[ix].freq);

        let shared = ClockOutput::ALL.iter().any(|&other| {
            let channel = &channels[other.ix() as usize];
            other != clk && channel.pll == pll && channel.is_set()
        });
        let committed = self.plls[pll.ix()];

        let pll_state = if committed.is_set() && shared {
            committed
        } else {
            let free = plan_multisynth(ms_freq, None, kind);
            let plan = plan_pll(ref_freq, free.pll_freq);
            self.write_pll(pll, &plan.divider)?;
            PllState::from(plan)
        };

        let ms = plan_multisynth(ms_freq, Some(pll_state.freq), kind);
        channels[ix].apply(r_div, &ms);
        debug!(
            device = self.config.name,
            ?clk,
            freq = channels[ix].freq,
            pll_freq = pll_state.freq,
            a = ms.divider.a,
            b = ms.divider.b,
            c = ms.divider.c,
            "planned output"
        );
        self.write_multisynth(clk, &channels[ix], enabled_mask & clk.bit() != 0)?;

        Ok(pll_state)
    }

    /// Plans `clk` from its stored frequency on its bound PLL, taking the
    /// shared pass for fractional outputs above the sharing threshold.
    fn plan_output(
        &mut self,
        clk: ClockOutput,
        channels: &mut [Channel; 8],
        enabled_mask: u8,
    ) -> Result<PllState, Error<P::Error>> {
        let freq = channels[clk.ix() as usize].freq;
        if clk.synth_kind() == SynthKind::Fractional && freq > MULTISYNTH_SHARE_MAX {
            self.recalculate_shared_pll(clk, channels, enabled_mask)
        } else {
            self.update_single_output(clk, channels, enabled_mask)
        }
    }

    /// Returns `clk` to the unset state and turns it off.
    fn clear_output(&mut self, clk: ClockOutput) -> Result<(), Error<P::Error>> {
        let mut channel = self.channels[clk.ix() as usize];
        channel.freq = 0;
        channel.ever_enabled = false;

        let mask = self.clk_enabled_mask & !clk.bit();
        self.write_clock_control(clk, &channel, false)?;
        self.write_output_enable(mask)?;

        self.channels[clk.ix() as usize] = channel;
        self.clk_enabled_mask = mask;
        Ok(())
    }
}

impl<P: RegisterPort> Si5351 for Si5351Device<P> {
    type Error = Error<P::Error>;

    fn init(&mut self) -> Result<(), Self::Error> {
        self.planning_reference()?;

        let mut ready = false;
        for _ in 0..INIT_POLL_ATTEMPTS {
            if !self
                .read_device_status()?
                .contains(DeviceStatusBits::SYS_INIT)
            {
                ready = true;
                break;
            }
        }
        if !ready {
            return Err(Error::NotReady {
                name: self.config.name,
            });
        }

        self.power_down_outputs()?;
        self.write_register(Register::CrystalLoad, self.config.crystal_load.bits())?;
        self.clear_state();

        info!(
            device = self.config.name,
            ref_freq = ?self.ref_freq,
            "initialized"
        );
        Ok(())
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.power_down_outputs()?;
        self.clear_state();
        Ok(())
    }

    fn read_device_status(&mut self) -> Result<DeviceStatusBits, Self::Error> {
        Ok(DeviceStatusBits::from_bits_truncate(
            self.read_register(Register::DeviceStatus)?,
        ))
    }

    fn read_sticky_status(&mut self) -> Result<StickyStatusBits, Self::Error> {
        Ok(StickyStatusBits::from_bits_truncate(
            self.read_register(Register::InterruptStatusSticky)?,
        ))
    }

    fn set_frequency(&mut self, clk: ClockOutput, freq: u32) -> Result<(), Self::Error> {
        if freq == 0 {
            return self.clear_output(clk);
        }

        self.planning_reference()?;

        let ix = clk.ix() as usize;
        let freq = freq.clamp(CLKOUT_MIN_FREQ, clk.synth_kind().max_freq());

        let mut channels = self.channels;
        let mut mask = self.clk_enabled_mask;

        // Enable the output on first set only
        if !channels[ix].ever_enabled {
            mask |= clk.bit();
            self.write_output_enable(mask)?;
            channels[ix].ever_enabled = true;
        }
        channels[ix].freq = freq;

        let pll = channels[ix].pll;
        let pll_state = self.plan_output(clk, &mut channels, mask)?;

        self.channels = channels;
        self.plls[pll.ix()] = pll_state;
        self.clk_enabled_mask = mask;
        Ok(())
    }

    fn set_output_enabled(&mut self, clk: ClockOutput, enabled: bool) -> Result<(), Self::Error> {
        let mask = if enabled {
            self.clk_enabled_mask | clk.bit()
        } else {
            self.clk_enabled_mask & !clk.bit()
        };

        let channel = self.channels[clk.ix() as usize];
        self.write_clock_control(clk, &channel, enabled)?;
        self.write_output_enable(mask)?;
        self.clk_enabled_mask = mask;
        Ok(())
    }

    fn set_all_outputs_enabled(&mut self, enabled: bool) -> Result<(), Self::Error> {
        let mask = if enabled { 0xFF } else { 0x00 };
        for &clk in ClockOutput::ALL.iter() {
            let channel = self.channels[clk.ix() as usize];
            self.write_clock_control(clk, &channel, enabled)?;
        }
        self.write_output_enable(mask)?;
        self.clk_enabled_mask = mask;
        Ok(())
    }

    fn reset_pll(&mut self, pll: PLL) -> Result<(), Self::Error> {
        self.pulse_pll_reset(pll)
    }

    fn select_clock_pll(&mut self, clk: ClockOutput, pll: PLL) -> Result<(), Self::Error> {
        let ix = clk.ix() as usize;
        let mut channels = self.channels;
        let rebinding = channels[ix].pll != pll;
        channels[ix].pll = pll;
        let enabled = self.clk_enabled_mask & clk.bit() != 0;

        if !(rebinding && channels[ix].is_set()) {
            self.write_clock_control(clk, &channels[ix], enabled)?;
            self.channels = channels;
            return Ok(());
        }

        // A running output is re-derived against its new PLL
        debug!(device = self.config.name, ?clk, ?pll, "moving output");
        let pll_state = self.plan_output(clk, &mut channels, self.clk_enabled_mask)?;
        self.channels = channels;
        self.plls[pll.ix()] = pll_state;
        Ok(())
    }

    fn set_drive_strength(
        &mut self,
        clk: ClockOutput,
        strength: DriveStrength,
    ) -> Result<(), Self::Error> {
        let mut channel = self.channels[clk.ix() as usize];
        channel.drive = strength;

        let enabled = self.clk_enabled_mask & clk.bit() != 0;
        self.write_clock_control(clk, &channel, enabled)?;
        self.channels[clk.ix() as usize] = channel;
        Ok(())
    }

    /// Write the 7bit phase register.  The phase is in units of
    /// VCO/4 period.
    fn set_phase_offset(&mut self, clk: ClockOutput, offset: u8) -> Result<(), Self::Error> {
        let reg = clk.phase_register().ok_or(Error::InvalidParameter)?;
        let offset = offset & 0b0111_1111; // upper bit is reserved
        self.write_register(reg, offset)
    }

    fn output_frequency(&self, clk: ClockOutput) -> u32 {
        self.channels[clk.ix() as usize].freq
    }

    fn pll_frequency(&self, pll: PLL) -> u64 {
        self.plls[pll.ix()].freq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockError, MockI2c, Op};
    use crate::registers::SynthParams;
    use crate::divider::FRAC_DENOM;

    type Device = Si5351Device<I2cPort<MockI2c>>;

    fn bus(dev: &mut Device) -> &mut MockI2c {
        dev.port_mut().i2c_mut()
    }

    fn device() -> Device {
        let mut dev = Si5351Device::new_adafruit_module(MockI2c::new());
        dev.init().unwrap();
        bus(&mut dev).ops.clear();
        dev
    }

    fn params_at(dev: &mut Device, base: u8) -> SynthParams {
        SynthParams::decode(&bus(dev).block(base))
    }

    #[test]
    fn init_sequence() {
        let mut dev = Si5351Device::new_adafruit_module(MockI2c::new());
        dev.init().unwrap();

        let bus = bus(&mut dev);
        assert_eq!(Some(0x60), bus.address);
        assert_eq!(Op::Read(0), bus.ops[0]);
        let mut expected = vec![vec![3, 0xFF]];
        expected.extend((16..=23).map(|reg| vec![reg, 0x80]));
        expected.push(vec![183, 0xD2]);
        assert_eq!(expected, bus.writes());
    }

    #[test]
    fn init_waits_for_sys_init() {
        let mut i2c = MockI2c::new();
        i2c.regs[0] = 0x80;
        let mut dev = Si5351Device::new(i2c, true, 27_000_000);
        assert_eq!(Err(Error::NotReady { name: "si5351" }), dev.init());
        assert_eq!(Some(0x61), bus(&mut dev).address);
        assert!(bus(&mut dev).writes().is_empty());
    }

    #[test]
    fn integer_plan_for_10mhz() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk0, 10_000_000).unwrap();

        // 900 MHz VCO = 25 MHz * 36, output divider 90
        assert_eq!(900_000_000, dev.pll_frequency(PLL::A));
        assert_eq!(
            SynthParams {
                p1: 128 * 36 - 512,
                p2: 0,
                p3: 1
            },
            params_at(&mut dev, 26)
        );
        assert_eq!(
            SynthParams {
                p1: 128 * 90 - 512,
                p2: 0,
                p3: 1
            },
            params_at(&mut dev, 42)
        );

        let bus = bus(&mut dev);
        assert_eq!(0xFE, bus.regs[3]);
        // powered up, integer mode, PLL A, multisynth source, 8 mA
        assert_eq!(0x4F, bus.regs[16]);
        assert!(bus.writes_to(177).is_empty());
    }

    #[test]
    fn low_frequency_uses_r_divider() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk1, 10_000).unwrap();

        let channel = *dev.channel(ClockOutput::Clk1);
        assert_eq!(OutputDivider::Div64, channel.r_div);
        // multisynth runs at 640 kHz: 899.84 MHz / 1406
        assert_eq!(DividerTriple::integer(1406), channel.divider);
        assert_eq!(899_840_000, dev.pll_frequency(PLL::A));

        let p1 = 128 * 1406 - 512;
        assert_eq!(p1, params_at(&mut dev, 50).p1);
        let reg = bus(&mut dev).regs[52];
        assert_eq!((p1 >> 16) as u8, reg & 0b11);
        assert_eq!(
            DividerControl {
                r_div: OutputDivider::Div64,
                div_by_4: false
            },
            DividerControl::unpack(ClockOutput::Clk1, reg)
        );
    }

    #[test]
    fn repeated_set_skips_output_enable() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk0, 14_175_000).unwrap();
        let first = bus(&mut dev).writes();
        assert_eq!(1, first.iter().filter(|w| w[0] == 3).count());

        bus(&mut dev).ops.clear();
        dev.set_frequency(ClockOutput::Clk0, 14_175_000).unwrap();
        let second = bus(&mut dev).writes();

        let expected: Vec<_> = first.into_iter().filter(|w| w[0] != 3).collect();
        assert_eq!(expected, second);
    }

    #[test]
    fn outputs_above_100mhz_share_one_pll_reset() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk0, 150_000_000).unwrap();
        assert_eq!(600_000_000, dev.pll_frequency(PLL::A));
        assert_eq!(1, bus(&mut dev).writes_to(177).len());

        bus(&mut dev).ops.clear();
        dev.set_frequency(ClockOutput::Clk1, 160_000_000).unwrap();
        assert_eq!(640_000_000, dev.pll_frequency(PLL::A));

        let bus = bus(&mut dev);
        assert_eq!(vec![vec![177, 0x20]], bus.writes_to(177));
        assert_eq!(1, bus.writes_to(26).len());
        assert_eq!(1, bus.writes_to(42).len());
        assert_eq!(1, bus.writes_to(50).len());
        assert_eq!(0b1100, bus.regs[44] & 0b1100);
        assert_eq!(0b1100, bus.regs[52] & 0b1100);
        assert_eq!(
            SynthParams { p1: 0, p2: 0, p3: 1 },
            SynthParams::decode(&bus.block(50))
        );

        assert!(dev.channel(ClockOutput::Clk0).div_by_4);
        assert!(dev.channel(ClockOutput::Clk1).div_by_4);
    }

    #[test]
    fn shared_recalculation_rederives_other_outputs() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk0, 10_000_000).unwrap();
        bus(&mut dev).ops.clear();

        // 900 / 120 = 7, which the VCO can't use; 6 * 120 MHz = 720 MHz
        dev.set_frequency(ClockOutput::Clk1, 120_000_000).unwrap();
        assert_eq!(720_000_000, dev.pll_frequency(PLL::A));
        assert_eq!(
            DividerTriple::integer(72),
            dev.channel(ClockOutput::Clk0).divider
        );
        assert_eq!(
            DividerTriple::integer(6),
            dev.channel(ClockOutput::Clk1).divider
        );
        assert_eq!(
            SynthParams {
                p1: 128 * 72 - 512,
                p2: 0,
                p3: 1
            },
            params_at(&mut dev, 42)
        );
        assert_eq!(1, bus(&mut dev).writes_to(177).len());
    }

    #[test]
    fn outputs_on_other_pll_are_left_alone() {
        let mut dev = device();
        dev.select_clock_pll(ClockOutput::Clk2, PLL::B).unwrap();
        dev.set_frequency(ClockOutput::Clk2, 25_000_000).unwrap();
        dev.set_frequency(ClockOutput::Clk0, 10_000_000).unwrap();
        bus(&mut dev).ops.clear();

        dev.set_frequency(ClockOutput::Clk1, 200_000_000).unwrap();
        let bus = bus(&mut dev);
        assert!(bus.writes_to(58).is_empty());
        assert!(bus.writes_to(34).is_empty());
        assert_eq!(1, bus.writes_to(42).len());
        assert_eq!(vec![vec![177, 0x20]], bus.writes_to(177));
    }

    #[test]
    fn single_output_keeps_committed_pll() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk0, 10_000_000).unwrap();
        bus(&mut dev).ops.clear();

        dev.set_frequency(ClockOutput::Clk1, 7_000_000).unwrap();
        assert_eq!(900_000_000, dev.pll_frequency(PLL::A));
        assert_eq!(
            DividerTriple {
                a: 128,
                b: 571_428,
                c: FRAC_DENOM
            },
            dev.channel(ClockOutput::Clk1).divider
        );

        let bus = bus(&mut dev);
        assert!(bus.writes_to(26).is_empty());
        assert!(bus.writes_to(177).is_empty());
        // fractional, so no integer mode
        assert_eq!(0x0F, bus.regs[17]);
    }

    #[test]
    fn pll_b_binding() {
        let mut dev = device();
        dev.select_clock_pll(ClockOutput::Clk3, PLL::B).unwrap();
        assert_eq!(0x20, bus(&mut dev).regs[19] & 0x20);

        dev.set_frequency(ClockOutput::Clk3, 10_000_000).unwrap();
        assert_eq!(900_000_000, dev.pll_frequency(PLL::B));
        assert_eq!(0, dev.pll_frequency(PLL::A));
        assert_eq!(1, bus(&mut dev).writes_to(34).len());
        assert!(bus(&mut dev).writes_to(26).is_empty());
        assert_eq!(0x6F, bus(&mut dev).regs[19]);
    }

    #[test]
    fn aux_outputs_use_integer_dividers() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk6, 10_000_000).unwrap();
        assert_eq!(900_000_000, dev.pll_frequency(PLL::A));
        assert_eq!(90, bus(&mut dev).regs[90]);
        assert_eq!(0x0F, bus(&mut dev).regs[22]);

        // 50 kHz * 16 = 800 kHz needs 1125, clamped to 254
        dev.set_frequency(ClockOutput::Clk7, 50_000).unwrap();
        let bus = bus(&mut dev);
        assert_eq!(254, bus.regs[91]);
        assert_eq!(OutputDivider::Div16.bits() << 4, bus.regs[92]);
        assert_eq!(0xFF & !0b1100_0000, bus.regs[3]);
    }

    #[test]
    fn transport_failure_leaves_state_unchanged() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk0, 10_000_000).unwrap();

        bus(&mut dev).fail_at = Some(50);
        assert_eq!(
            Err(Error::Transport {
                name: "si5351",
                register: 50,
                cause: MockError
            }),
            dev.set_frequency(ClockOutput::Clk1, 20_000_000)
        );
        assert_eq!(0, dev.output_frequency(ClockOutput::Clk1));
        assert!(!dev.channel(ClockOutput::Clk1).ever_enabled);
        assert_eq!(10_000_000, dev.output_frequency(ClockOutput::Clk0));
        assert_eq!(900_000_000, dev.pll_frequency(PLL::A));
    }

    #[test]
    fn disabled_output_stays_off_across_frequency_changes() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk2, 10_000_000).unwrap();
        dev.set_output_enabled(ClockOutput::Clk2, false).unwrap();
        assert_eq!(0x04, bus(&mut dev).regs[3] & 0x04);
        assert_eq!(0x80, bus(&mut dev).regs[18] & 0x80);

        bus(&mut dev).ops.clear();
        dev.set_frequency(ClockOutput::Clk2, 12_000_000).unwrap();
        assert!(bus(&mut dev).writes_to(3).is_empty());
        assert_eq!(0x80, bus(&mut dev).regs[18] & 0x80);

        dev.set_output_enabled(ClockOutput::Clk2, true).unwrap();
        assert_eq!(0, bus(&mut dev).regs[3] & 0x04);
        assert_eq!(0, bus(&mut dev).regs[18] & 0x80);
    }

    #[test]
    fn zero_frequency_unsets_output() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk0, 10_000_000).unwrap();
        dev.set_frequency(ClockOutput::Clk0, 0).unwrap();
        assert!(!dev.channel(ClockOutput::Clk0).is_set());
        assert_eq!(0x01, bus(&mut dev).regs[3] & 0x01);

        bus(&mut dev).ops.clear();
        dev.set_frequency(ClockOutput::Clk0, 10_000_000).unwrap();
        assert_eq!(1, bus(&mut dev).writes_to(3).len());
        assert_eq!(0, bus(&mut dev).regs[3] & 0x01);
    }

    #[test]
    fn frequencies_are_clamped_silently() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk0, 1).unwrap();
        assert_eq!(4_000, dev.output_frequency(ClockOutput::Clk0));
        assert_eq!(OutputDivider::Div128, dev.channel(ClockOutput::Clk0).r_div);

        dev.set_frequency(ClockOutput::Clk0, 300_000_000).unwrap();
        assert_eq!(225_000_000, dev.output_frequency(ClockOutput::Clk0));
        assert_eq!(900_000_000, dev.pll_frequency(PLL::A));
    }

    #[test]
    fn all_outputs_and_pll_reset() {
        let mut dev = device();
        dev.set_all_outputs_enabled(true).unwrap();
        assert_eq!(vec![vec![3, 0x00]], bus(&mut dev).writes_to(3));
        assert!(bus(&mut dev).regs[16..=23].iter().all(|&reg| reg & 0x80 == 0));

        bus(&mut dev).ops.clear();
        dev.set_all_outputs_enabled(false).unwrap();
        dev.reset_pll(PLL::B).unwrap();
        let bus = bus(&mut dev);
        assert_eq!(vec![vec![3, 0xFF]], bus.writes_to(3));
        assert_eq!(vec![vec![177, 0x80]], bus.writes_to(177));
        assert!(bus.regs[16..=23].iter().all(|&reg| reg & 0x80 == 0x80));
    }

    #[test]
    fn enable_all_powers_up_disabled_output() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk0, 10_000_000).unwrap();
        dev.set_output_enabled(ClockOutput::Clk0, false).unwrap();
        assert_eq!(0xCF, bus(&mut dev).regs[16]);

        dev.set_all_outputs_enabled(true).unwrap();
        assert_eq!(0x00, bus(&mut dev).regs[3]);
        assert_eq!(0x4F, bus(&mut dev).regs[16]);
    }

    #[test]
    fn moving_running_output_rederives_it() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk0, 10_000_000).unwrap();
        bus(&mut dev).ops.clear();

        dev.select_clock_pll(ClockOutput::Clk0, PLL::B).unwrap();
        assert_eq!(900_000_000, dev.pll_frequency(PLL::B));
        assert_eq!(1, bus(&mut dev).writes_to(34).len());
        assert_eq!(1, bus(&mut dev).writes_to(42).len());
        assert_eq!(0x20, bus(&mut dev).regs[16] & 0x20);

        // 896 MHz on PLL A, then onto the 900 MHz PLL B
        dev.set_frequency(ClockOutput::Clk1, 7_000_000).unwrap();
        assert_eq!(896_000_000, dev.pll_frequency(PLL::A));
        dev.select_clock_pll(ClockOutput::Clk1, PLL::B).unwrap();
        assert_eq!(900_000_000, dev.pll_frequency(PLL::B));

        let clk0 = *dev.channel(ClockOutput::Clk0);
        assert_eq!(DividerTriple::integer(90), clk0.divider);
        assert_eq!(
            10_000_000,
            clk0.divider.divide(dev.pll_frequency(PLL::B))
        );
        assert_eq!(
            DividerTriple {
                a: 128,
                b: 571_428,
                c: FRAC_DENOM
            },
            dev.channel(ClockOutput::Clk1).divider
        );
        assert_eq!(0x20, bus(&mut dev).regs[17] & 0x20);
    }

    #[test]
    fn unusable_reference_is_rejected() {
        let config = Config::adafruit_module().with_correction(-1_000_000_000);
        let mut dev = Si5351Device::with_config(MockI2c::new(), config);
        assert_eq!(None, dev.reference_frequency());
        assert_eq!(Err(Error::InvalidParameter), dev.init());
        assert_eq!(
            Err(Error::InvalidParameter),
            dev.set_frequency(ClockOutput::Clk0, 10_000_000)
        );
        assert!(bus(&mut dev).ops.is_empty());

        let mut dev = Si5351Device::new(MockI2c::new(), false, 0);
        assert_eq!(
            Err(Error::InvalidParameter),
            dev.set_frequency(ClockOutput::Clk6, 10_000_000)
        );
        assert_eq!(0, dev.output_frequency(ClockOutput::Clk6));
    }

    #[test]
    fn shared_pass_keeps_r_divider_of_low_outputs() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk2, 10_000).unwrap();
        bus(&mut dev).ops.clear();

        dev.set_frequency(ClockOutput::Clk0, 120_000_000).unwrap();
        assert_eq!(720_000_000, dev.pll_frequency(PLL::A));

        // R divider from the stored 10 kHz, multisynth against 720 MHz
        let clk2 = *dev.channel(ClockOutput::Clk2);
        assert_eq!(OutputDivider::Div64, clk2.r_div);
        assert_eq!(DividerTriple::integer(1125), clk2.divider);
        assert_eq!(10_000, clk2.divider.divide(720_000_000) / 64);

        let bus = bus(&mut dev);
        assert_eq!(1, bus.writes_to(58).len());
        assert_eq!(
            OutputDivider::Div64,
            DividerControl::unpack(ClockOutput::Clk2, bus.regs[60]).r_div
        );
    }

    #[test]
    fn shared_pass_rederives_aux_outputs() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk6, 10_000_000).unwrap();
        assert_eq!(90, bus(&mut dev).regs[90]);
        bus(&mut dev).ops.clear();

        dev.set_frequency(ClockOutput::Clk0, 150_000_000).unwrap();
        assert_eq!(600_000_000, dev.pll_frequency(PLL::A));
        assert_eq!(
            DividerTriple::integer(60),
            dev.channel(ClockOutput::Clk6).divider
        );

        let bus = bus(&mut dev);
        assert_eq!(vec![vec![90, 60]], bus.writes_to(90));
        assert_eq!(vec![vec![177, 0x20]], bus.writes_to(177));
    }

    #[test]
    fn failure_during_shared_pass_leaves_state_unchanged() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk0, 10_000_000).unwrap();
        let clk0 = *dev.channel(ClockOutput::Clk0);
        bus(&mut dev).ops.clear();

        bus(&mut dev).fail_at = Some(42);
        assert_eq!(
            Err(Error::Transport {
                name: "si5351",
                register: 42,
                cause: MockError
            }),
            dev.set_frequency(ClockOutput::Clk1, 120_000_000)
        );
        // the new PLL was already written when the first output failed
        assert_eq!(1, bus(&mut dev).writes_to(26).len());
        assert!(bus(&mut dev).writes_to(177).is_empty());

        assert_eq!(900_000_000, dev.pll_frequency(PLL::A));
        assert_eq!(clk0, *dev.channel(ClockOutput::Clk0));
        assert_eq!(0, dev.output_frequency(ClockOutput::Clk1));
        assert!(!dev.channel(ClockOutput::Clk1).ever_enabled);
    }

    #[test]
    fn phase_offset() {
        let mut dev = device();
        dev.set_phase_offset(ClockOutput::Clk1, 0xFF).unwrap();
        assert_eq!(vec![vec![166, 0x7F]], bus(&mut dev).writes());
        assert_eq!(
            Err(Error::InvalidParameter),
            dev.set_phase_offset(ClockOutput::Clk6, 1)
        );
    }

    #[test]
    fn drive_strength_keeps_inversion_bit() {
        let mut dev = device();
        bus(&mut dev).regs[16] = 0x80 | 0x10;
        dev.set_drive_strength(ClockOutput::Clk0, DriveStrength::_4)
            .unwrap();
        assert_eq!(0x80 | 0x10 | 0x0C | 0x01, bus(&mut dev).regs[16]);
    }

    #[test]
    fn status_registers() {
        let mut dev = device();
        bus(&mut dev).regs[0] = 0x11;
        bus(&mut dev).regs[1] = 0x60;
        let status = dev.read_device_status().unwrap();
        assert!(status.contains(DeviceStatusBits::LOS));
        assert_eq!(1, status.revision());
        assert_eq!(
            StickyStatusBits::LOL_A_STKY | StickyStatusBits::LOL_B_STKY,
            dev.read_sticky_status().unwrap()
        );
    }

    #[test]
    fn reset_returns_to_unset() {
        let mut dev = device();
        dev.set_frequency(ClockOutput::Clk0, 10_000_000).unwrap();
        dev.reset().unwrap();
        assert_eq!(0, dev.pll_frequency(PLL::A));
        assert_eq!(Channel::UNSET, *dev.channel(ClockOutput::Clk0));
        assert_eq!(0xFF, bus(&mut dev).regs[3]);
        assert_eq!(0x80, bus(&mut dev).regs[16]);
    }

    #[test]
    fn corrected_reference_drives_pll() {
        let config = Config::adafruit_module().with_correction(100);
        let mut dev = Si5351Device::with_config(MockI2c::new(), config);
        dev.init().unwrap();
        assert_eq!(Some(25_000_002), dev.reference_frequency());

        dev.set_frequency(ClockOutput::Clk0, 10_000_000).unwrap();
        // 900 MHz / 25.000002 MHz = 35.99999712
        assert_eq!(
            DividerTriple {
                a: 35,
                b: 999_997,
                c: FRAC_DENOM
            },
            dev.plls[0].divider
        );
    }
}
