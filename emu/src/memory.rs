use arch::bus::{Bus, MemoryFault};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Error;

/// What to do about a bad access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Log and carry on. Bad reads give 0, bad writes are dropped.
    #[default]
    Warn,
    /// Return a `MemoryFault`.
    Fail,
}

#[derive(Debug, Clone)]
struct Region {
    base: u16,
    bytes: Vec<u8>,
}

impl Region {
    fn offset(&self, addr: u16) -> Option<usize> {
        let off = addr.checked_sub(self.base)? as usize;
        (off < self.bytes.len()).then_some(off)
    }
}

/// Byte-addressed store with optional ROM/RAM split, a watched address and
/// an advisory write-protected range.
#[derive(Debug, Clone)]
pub struct Memory {
    regions: Vec<Region>,
    policy: Policy,
    watch: Option<u16>,
    protect: Option<(u16, u16)>,
}

impl Memory {
    /// One region starting at 0.
    pub fn new(size: usize) -> Self {
        Memory {
            regions: vec![Region {
                base: 0,
                bytes: vec![0; size.min(0x1_0000)],
            }],
            policy: Policy::Warn,
            watch: None,
            protect: None,
        }
    }

    /// ROM at `0..rom` and RAM at `ram_base..ram_base + ram`.
    pub fn split(rom: usize, ram_base: u16, ram: usize) -> Result<Self, Error> {
        if rom > ram_base as usize || ram_base as usize + ram > 0x1_0000 {
            return Err(Error::Layout(format!(
                "rom 0x0000..0x{:04X} ram 0x{:04X}..0x{:X}",
                rom,
                ram_base,
                ram_base as usize + ram
            )));
        }
        Ok(Memory {
            regions: vec![
                Region {
                    base: 0,
                    bytes: vec![0; rom],
                },
                Region {
                    base: ram_base,
                    bytes: vec![0; ram],
                },
            ],
            policy: Policy::Warn,
            watch: None,
            protect: None,
        })
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn size(&self) -> usize {
        self.regions.iter().map(|r| r.bytes.len()).sum()
    }

    pub fn set_watch(&mut self, addr: u16) {
        self.watch = Some(addr);
    }

    pub fn clear_watch(&mut self) {
        self.watch = None;
    }

    /// Diagnose writes to `start..end`. Under `Policy::Fail` they are refused.
    pub fn write_protect(&mut self, start: u16, end: u16) {
        self.protect = Some((start, end));
    }

    pub fn clear_protect(&mut self) {
        self.protect = None;
    }

    /// Borrow `len` bytes starting at `addr`. The range must lie in one region.
    pub fn slice(&self, addr: u16, len: usize) -> Result<&[u8], MemoryFault> {
        let (idx, off) = self.span(addr, len)?;
        Ok(&self.regions[idx].bytes[off..off + len])
    }

    pub fn slice_mut(&mut self, addr: u16, len: usize) -> Result<&mut [u8], MemoryFault> {
        let (idx, off) = self.span(addr, len)?;
        Ok(&mut self.regions[idx].bytes[off..off + len])
    }

    /// Copy a raw image in, bypassing protection.
    pub fn load(&mut self, addr: u16, bytes: &[u8]) -> Result<(), MemoryFault> {
        self.slice_mut(addr, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    fn span(&self, addr: u16, len: usize) -> Result<(usize, usize), MemoryFault> {
        self.regions
            .iter()
            .enumerate()
            .find_map(|(idx, r)| {
                let off = r.offset(addr)?;
                (off + len <= r.bytes.len()).then_some((idx, off))
            })
            .ok_or(MemoryFault::OutOfBounds(addr))
    }

    fn locate(&self, addr: u16) -> Option<(usize, usize)> {
        self.regions
            .iter()
            .enumerate()
            .find_map(|(idx, r)| r.offset(addr).map(|off| (idx, off)))
    }

    fn fault(&self, fault: MemoryFault) -> Result<(), MemoryFault> {
        match self.policy {
            Policy::Warn => {
                warn!("{}", fault);
                Ok(())
            }
            Policy::Fail => Err(fault),
        }
    }

    fn check_watch(&self, addr: u16, access: &str) {
        if self.watch == Some(addr) {
            info!("watch 0x{:04X}: {}", addr, access);
        }
    }

    fn check_protect(&self, addr: u16) -> Result<(), MemoryFault> {
        match self.protect {
            Some((start, end)) if start <= addr && addr < end => {
                self.fault(MemoryFault::Protected(addr))
            }
            _ => Ok(()),
        }
    }

    fn read(&self, addr: u16) -> Result<u8, MemoryFault> {
        match self.locate(addr) {
            Some((idx, off)) => Ok(self.regions[idx].bytes[off]),
            None => self.fault(MemoryFault::OutOfBounds(addr)).map(|_| 0),
        }
    }

    fn write(&mut self, addr: u16, v: u8) -> Result<(), MemoryFault> {
        match self.locate(addr) {
            Some((idx, off)) => {
                self.regions[idx].bytes[off] = v;
                Ok(())
            }
            None => self.fault(MemoryFault::OutOfBounds(addr)),
        }
    }
}

/// Bus used to place a program. Bytes land in whichever region holds them and
/// protection is ignored.
pub struct Loader<'a>(&'a mut Memory);

impl Memory {
    pub fn loader(&mut self) -> Loader<'_> {
        Loader(self)
    }
}

impl Bus for Loader<'_> {
    fn get(&self, addr: u16) -> Result<u16, MemoryFault> {
        self.0.get(addr)
    }

    fn put(&mut self, addr: u16, v: u16) -> Result<(), MemoryFault> {
        let [lo, hi] = v.to_le_bytes();
        self.put_byte(addr, lo)?;
        self.put_byte(addr.wrapping_add(1), hi)
    }

    fn get_byte(&self, addr: u16) -> Result<u8, MemoryFault> {
        self.0.get_byte(addr)
    }

    fn put_byte(&mut self, addr: u16, v: u8) -> Result<(), MemoryFault> {
        self.0.load(addr, &[v])
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(0x1_0000)
    }
}

impl Bus for Memory {
    fn get(&self, addr: u16) -> Result<u16, MemoryFault> {
        if addr & 1 != 0 {
            self.fault(MemoryFault::Unaligned(addr))?;
        }
        self.check_watch(addr, "read");
        let lo = self.read(addr)?;
        let hi = self.read(addr.wrapping_add(1))?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn put(&mut self, addr: u16, v: u16) -> Result<(), MemoryFault> {
        if addr & 1 != 0 {
            self.fault(MemoryFault::Unaligned(addr))?;
        }
        self.check_watch(addr, "write");
        self.check_protect(addr)?;
        self.check_protect(addr.wrapping_add(1))?;
        let [lo, hi] = v.to_le_bytes();
        self.write(addr, lo)?;
        self.write(addr.wrapping_add(1), hi)
    }

    fn get_byte(&self, addr: u16) -> Result<u8, MemoryFault> {
        self.check_watch(addr, "read byte");
        self.read(addr)
    }

    fn put_byte(&mut self, addr: u16, v: u8) -> Result<(), MemoryFault> {
        self.check_watch(addr, "write byte");
        self.check_protect(addr)?;
        self.write(addr, v)
    }
}
