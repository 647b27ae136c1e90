use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFault {
    #[error("Address out of bounds: 0x{0:04X}")]
    OutOfBounds(u16),

    #[error("Unaligned word access: 0x{0:04X}")]
    Unaligned(u16),

    #[error("Write to protected address: 0x{0:04X}")]
    Protected(u16),
}

/// Byte-addressed memory seen by the assembler's emitter and by the VM.
/// Words are little-endian: low byte at `addr`, high byte at `addr + 1`.
pub trait Bus {
    fn get(&self, addr: u16) -> Result<u16, MemoryFault>;
    fn put(&mut self, addr: u16, v: u16) -> Result<(), MemoryFault>;
    fn get_byte(&self, addr: u16) -> Result<u8, MemoryFault>;
    fn put_byte(&mut self, addr: u16, v: u8) -> Result<(), MemoryFault>;
}

/// Plain 64 KiB image, used for assembling into a file.
#[derive(Debug, Clone)]
pub struct Image(pub Vec<u8>);

impl Image {
    pub fn new() -> Self {
        Image(vec![0; 0x10000])
    }

    pub fn bytes(&self, end: usize) -> &[u8] {
        &self.0[..end.min(self.0.len())]
    }
}

impl Default for Image {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for Image {
    fn get(&self, addr: u16) -> Result<u16, MemoryFault> {
        let lo = self.get_byte(addr)?;
        let hi = self.get_byte(addr.wrapping_add(1))?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn put(&mut self, addr: u16, v: u16) -> Result<(), MemoryFault> {
        let [lo, hi] = v.to_le_bytes();
        self.put_byte(addr, lo)?;
        self.put_byte(addr.wrapping_add(1), hi)
    }

    fn get_byte(&self, addr: u16) -> Result<u8, MemoryFault> {
        self.0
            .get(addr as usize)
            .copied()
            .ok_or(MemoryFault::OutOfBounds(addr))
    }

    fn put_byte(&mut self, addr: u16, v: u8) -> Result<(), MemoryFault> {
        match self.0.get_mut(addr as usize) {
            Some(b) => {
                *b = v;
                Ok(())
            }
            None => Err(MemoryFault::OutOfBounds(addr)),
        }
    }
}
