pub mod dump;
pub mod trace;

use crate::vm::{Cycle, Vm};

/// Observer run after every executed instruction.
pub trait Hook {
    fn init(&mut self, vm: &mut Vm);
    fn exec(&mut self, time: u64, cycle: &Cycle, vm: &mut Vm);
}
