use core::cell::RefCell;

use critical_section::Mutex;

use crate::device::Si5351Device;
use crate::port::RegisterPort;
use crate::{ClockOutput, Error, Si5351, PLL};

/// A [`Si5351Device`] shared between execution contexts.
///
/// Every operation runs inside one critical section, so a frequency change
/// touching several registers is never interleaved with another caller.
pub struct SharedSi5351<P> {
    inner: Mutex<RefCell<Si5351Device<P>>>,
}

impl<P: RegisterPort> SharedSi5351<P> {
    pub const fn new(device: Si5351Device<P>) -> Self {
        SharedSi5351 {
            inner: Mutex::new(RefCell::new(device)),
        }
    }

    /// Runs `f` with exclusive access to the device.
    pub fn lock<R>(&self, f: impl FnOnce(&mut Si5351Device<P>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    pub fn set_frequency(&self, clk: ClockOutput, freq: u32) -> Result<(), Error<P::Error>> {
        self.lock(|dev| dev.set_frequency(clk, freq))
    }

    pub fn set_output_enabled(
        &self,
        clk: ClockOutput,
        enabled: bool,
    ) -> Result<(), Error<P::Error>> {
        self.lock(|dev| dev.set_output_enabled(clk, enabled))
    }

    pub fn set_all_outputs_enabled(&self, enabled: bool) -> Result<(), Error<P::Error>> {
        self.lock(|dev| dev.set_all_outputs_enabled(enabled))
    }

    pub fn reset_pll(&self, pll: PLL) -> Result<(), Error<P::Error>> {
        self.lock(|dev| dev.reset_pll(pll))
    }

    pub fn output_frequency(&self, clk: ClockOutput) -> u32 {
        self.lock(|dev| dev.output_frequency(clk))
    }

    pub fn into_inner(self) -> Si5351Device<P> {
        self.inner.into_inner().into_inner()
    }
}
