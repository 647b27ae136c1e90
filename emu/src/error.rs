use arch::bus::MemoryFault;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Invalid config `{0}`: {1}")]
    Config(String, #[source] serde_yaml::Error),

    #[error("Invalid memory layout: {0}")]
    Layout(String),

    #[error("Machine fault: {0}")]
    Memory(#[from] MemoryFault),

    #[error(transparent)]
    Asm(#[from] fasm::Error),
}
