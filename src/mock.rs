use crate::hal::blocking::i2c::{Write, WriteRead};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Write(Vec<u8>),
    Read(u8),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MockError;

/// I²C bus with an auto-incrementing register file behind it.
pub struct MockI2c {
    pub regs: [u8; 256],
    pub ops: Vec<Op>,
    /// Transactions starting at this register fail.
    pub fail_at: Option<u8>,
    pub address: Option<u8>,
}

impl MockI2c {
    pub fn new() -> Self {
        MockI2c {
            regs: [0; 256],
            ops: Vec::new(),
            fail_at: None,
            address: None,
        }
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Write(bytes) => Some(bytes.clone()),
                Op::Read(_) => None,
            })
            .collect()
    }

    pub fn writes_to(&self, register: u8) -> Vec<Vec<u8>> {
        self.writes()
            .into_iter()
            .filter(|bytes| bytes[0] == register)
            .collect()
    }

    pub fn block(&self, base: u8) -> [u8; 8] {
        let mut block = [0u8; 8];
        block.copy_from_slice(&self.regs[base as usize..base as usize + 8]);
        block
    }

    fn check(&mut self, address: u8, register: u8) -> Result<(), MockError> {
        self.address = Some(address);
        if self.fail_at == Some(register) {
            Err(MockError)
        } else {
            Ok(())
        }
    }
}

impl Write for MockI2c {
    type Error = MockError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), MockError> {
        self.check(address, bytes[0])?;
        self.ops.push(Op::Write(bytes.to_vec()));
        for (offset, &byte) in bytes[1..].iter().enumerate() {
            self.regs[(bytes[0] as usize + offset) & 0xFF] = byte;
        }
        Ok(())
    }
}

impl WriteRead for MockI2c {
    type Error = MockError;

    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), MockError> {
        self.check(address, bytes[0])?;
        self.ops.push(Op::Read(bytes[0]));
        for (offset, byte) in buffer.iter_mut().enumerate() {
            *byte = self.regs[(bytes[0] as usize + offset) & 0xFF];
        }
        Ok(())
    }
}
