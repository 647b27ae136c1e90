use arch::reg::Reg;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;

use crate::error::Error;
use crate::memory::{Memory, Policy};

/// Emulator setup, read from YAML.
///
/// ```yaml
/// memory:
///   rom: 0x4000
///   ram: { base: 0x8000, size: 0x8000 }
///   policy: fail
///   protect: [0x0000, 0x4000]
/// syscalls: 32
/// dump:
///   0x0100: { regs: [A, SP], stack: true, mem: [0x8000] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub memory: MemoryConfig,
    pub syscalls: usize,
    /// Where a raw image is copied.
    pub load: u16,
    /// Initial PC after reset.
    pub entry: Option<u16>,
    pub dump: HashMap<u16, DumpConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryConfig {
    pub size: usize,
    pub rom: Option<usize>,
    pub ram: Option<RamConfig>,
    pub policy: Policy,
    pub protect: Option<(u16, u16)>,
    pub watch: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RamConfig {
    pub base: u16,
    pub size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DumpConfig {
    pub regs: Vec<Reg>,
    pub stack: bool,
    pub mem: Vec<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            memory: MemoryConfig::default(),
            syscalls: 32,
            load: 0,
            entry: None,
            dump: HashMap::new(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            size: 0x1_0000,
            rom: None,
            ram: None,
            policy: Policy::Warn,
            protect: None,
            watch: None,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::FileOpen(path.to_string(), e))?;
        serde_yaml::from_reader(BufReader::new(file)).map_err(|e| Error::Config(path.to_string(), e))
    }

    pub fn parse(text: &str) -> Result<Self, Error> {
        serde_yaml::from_str(text).map_err(|e| Error::Config("<string>".to_string(), e))
    }

    /// Build the memory this config describes.
    pub fn memory(&self) -> Result<Memory, Error> {
        let cfg = &self.memory;
        let mut mem = match (cfg.rom, &cfg.ram) {
            (Some(rom), Some(ram)) => Memory::split(rom, ram.base, ram.size)?,
            (None, None) => Memory::new(cfg.size),
            _ => {
                return Err(Error::Layout(
                    "`rom` and `ram` must be given together".to_string(),
                ))
            }
        }
        .with_policy(cfg.policy);
        if let Some((start, end)) = cfg.protect {
            mem.write_protect(start, end);
        }
        if let Some(addr) = cfg.watch {
            mem.set_watch(addr);
        }
        Ok(mem)
    }
}
