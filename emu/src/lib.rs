pub mod config;
pub mod error;
pub mod hooks;
pub mod memory;
pub mod syscalls;
pub mod vm;

pub use memory::{Loader, Memory, Policy};
pub use vm::{Cycle, State, Vm};
