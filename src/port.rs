use crate::hal::blocking::i2c::{Write, WriteRead};

/// Byte-addressed access to the device registers.
pub trait RegisterPort {
    type Error;

    /// Writes `bytes[1..]` starting at register `bytes[0]` in one transaction.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Reads a single register.
    fn read(&mut self, register: u8) -> Result<u8, Self::Error>;
}

const ADDRESS: u8 = 0b0110_0000;

/// [`RegisterPort`] on top of an `embedded-hal` I²C bus.
pub struct I2cPort<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> I2cPort<I2C> {
    pub fn new(i2c: I2C, address_bit: bool) -> Self {
        I2cPort {
            i2c,
            address: ADDRESS | if address_bit { 1 } else { 0 },
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    #[cfg(test)]
    pub(crate) fn i2c_mut(&mut self) -> &mut I2C {
        &mut self.i2c
    }
}

impl<I2C, E> RegisterPort for I2cPort<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    type Error = E;

    fn write(&mut self, bytes: &[u8]) -> Result<(), E> {
        self.i2c.write(self.address, bytes)
    }

    fn read(&mut self, register: u8) -> Result<u8, E> {
        let mut buffer = [0u8; 1];
        self.i2c.write_read(self.address, &[register], &mut buffer)?;
        Ok(buffer[0])
    }
}
