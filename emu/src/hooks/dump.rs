use arch::{bus::Bus, op::Op, reg::Reg};
use color_print::cprintln;
use std::collections::HashMap;
use strum::IntoEnumIterator;

use super::Hook;
use crate::config::DumpConfig;
use crate::vm::{Cycle, Vm};

/// Cells shown below the stack pointer.
const STACK_DEPTH: u16 = 8;

/// Print machine state at configured addresses and on `BRK`.
#[derive(Debug, Default)]
pub struct Dump {
    list: HashMap<u16, DumpConfig>,
}

impl Dump {
    pub fn new(list: HashMap<u16, DumpConfig>) -> Self {
        Self { list }
    }
}

impl Hook for Dump {
    fn init(&mut self, _vm: &mut Vm) {
        if !self.list.is_empty() {
            println!(" * Dump[{}]", self.list.len());
        }
    }

    fn exec(&mut self, time: u64, cycle: &Cycle, vm: &mut Vm) {
        if let Some(cfg) = self.list.get(&cycle.addr) {
            cprintln!("<c>[{}] dump @{:04X}</>", time, cycle.addr);
            if cfg.regs.is_empty() {
                print_regs(vm);
            } else {
                for r in &cfg.regs {
                    println!(" | {:>2}: {:04X}", r.to_string(), vm.get(*r));
                }
            }
            if cfg.stack {
                print_stack(vm);
            }
            print_mem(vm, &cfg.mem);
        } else if cycle.inst.op == Op::BRK && !cycle.skipped {
            cprintln!("<y>[{}] BRK @{:04X}</>", time, cycle.addr);
            print_regs(vm);
            print_stack(vm);
        }
    }
}

fn print_regs(vm: &Vm) {
    let regs: Vec<Reg> = Reg::iter().collect();
    println!(" +---------+---------+---------+---------+");
    for row in regs.chunks(4) {
        let cells: Vec<String> = row
            .iter()
            .map(|r| format!("{:>2}: {:04X}", r.to_string(), vm.get(*r)))
            .collect();
        println!(" | {} |", cells.join(" | "));
    }
    let f = vm.flags();
    println!(
        " | C:{} Z:{} S:{} O:{}                       |",
        f.c as u8, f.z as u8, f.s as u8, f.o as u8
    );
    println!(" +---------+---------+---------+---------+");
}

fn print_stack(vm: &Vm) {
    let sp = vm.get(Reg::SP);
    for i in 1..=STACK_DEPTH {
        let Some(addr) = sp.checked_add(i * 2) else {
            break;
        };
        match vm.mem().get(addr) {
            Ok(v) => println!(" | {:04X} : {:04X}", addr, v),
            Err(_) => break,
        }
    }
    println!(" +---------------------------------------+");
}

fn print_mem(vm: &Vm, addrs: &[u16]) {
    for addr in addrs {
        match vm.mem().get(*addr) {
            Ok(v) => println!(" | {:04X} : {:04X}", addr, v),
            Err(e) => cprintln!(" | {:04X} : <r>{}</>", addr, e),
        }
    }
    if !addrs.is_empty() {
        println!(" +---------------------------------------+");
    }
}
