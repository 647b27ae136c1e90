use super::Hook;
use crate::vm::{Cycle, Vm};

/// Print every executed instruction.
#[derive(Debug, Default)]
pub struct Trace;

impl Hook for Trace {
    fn init(&mut self, _vm: &mut Vm) {
        println!(" * Trace all");
    }

    fn exec(&mut self, time: u64, cycle: &Cycle, _vm: &mut Vm) {
        println!(
            "[{:>6}] {:04X} {}{}",
            time,
            cycle.addr,
            cycle.inst.format(),
            if cycle.skipped { " ;skip" } else { "" }
        );
    }
}
