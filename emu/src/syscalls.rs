use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::{self, BufRead, Read, Write};
use std::rc::Rc;

use arch::bus::{Bus, MemoryFault};
use fasm::lexer::parse_number;
use num_enum::IntoPrimitive;
use strum::{Display, EnumIter};

use crate::vm::Vm;

/// Host services reachable through `SYSCALL n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, EnumIter, Display)]
#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum Sys {
    DEBUG = 0,
    TYPE = 1,
    TYPELN = 2,
    DOT = 3,
    GETC = 4,
    PUTC = 5,
    INLINE = 6,
    FLUSH = 7,
    NUMBER = 8,
    H_AT = 9,
    H_STORE = 10,
    D_ADD = 11,
    D_SUB = 12,
    D_MUL = 13,
    D_DIV = 14,
    D_SR = 15,
    D_SL = 16,
    D_AND = 17,
    D_OR = 18,
    D_INVERT = 19,
    DOTC = 20,
}

/// Character device behind the console syscalls.
pub trait Console {
    fn write(&mut self, text: &str);
    /// Next input byte, `None` at end of input.
    fn getc(&mut self) -> Option<u8>;
    /// Next input line without its terminator, `None` at end of input.
    fn read_line(&mut self) -> Option<String>;
    fn flush(&mut self);
}

/// Process stdin/stdout.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn write(&mut self, text: &str) {
        print!("{}", text);
    }

    fn getc(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        match io::stdin().read(&mut buf) {
            Ok(1) => Some(buf[0]),
            _ => None,
        }
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_string()),
        }
    }

    fn flush(&mut self) {
        let _ = io::stdout().flush();
    }
}

/// In-memory console.
#[derive(Debug, Default)]
pub struct BufferConsole {
    pub input: VecDeque<u8>,
    pub output: String,
}

impl BufferConsole {
    pub fn new(input: &str) -> Self {
        BufferConsole {
            input: input.bytes().collect(),
            output: String::new(),
        }
    }
}

impl Console for BufferConsole {
    fn write(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn getc(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn read_line(&mut self) -> Option<String> {
        if self.input.is_empty() {
            return None;
        }
        let mut line = Vec::new();
        while let Some(b) = self.input.pop_front() {
            if b == b'\n' {
                break;
            }
            line.push(b);
        }
        let text = String::from_utf8_lossy(&line);
        Some(text.trim_end_matches('\r').to_string())
    }

    fn flush(&mut self) {}
}

// ----------------------------------------------------------------------------
// Formatting and parsing

fn format_value(v: u16, base: u16) -> String {
    match base {
        16 => format!("0x{:04x}", v),
        2 => format!("0b{:016b}", v),
        _ => format!("{}", v as i16),
    }
}

fn format_byte(v: u8, base: u16) -> String {
    match base {
        16 => format!("0x{:02x}", v),
        2 => format!("0b{:08b}", v),
        _ => format!("{}", v),
    }
}

/// Prefixed literals follow the assembler's number grammar; bare digits are
/// read in `base`.
pub fn number(text: &str, base: u16) -> Option<u16> {
    let prefixed = text.starts_with('-')
        || text.starts_with('\'')
        || text.starts_with("0x")
        || text.starts_with("0b");
    let v = match prefixed {
        true => parse_number(text).ok()?,
        false => match base {
            2 | 16 => i32::from_str_radix(text, base as u32).ok()?,
            _ => text.parse::<i32>().ok()?,
        },
    };
    (-32768..=65535).contains(&v).then_some(v as u16)
}

fn counted_string(vm: &Vm, addr: u16) -> Result<Vec<u8>, MemoryFault> {
    let len = vm.mem().get(addr)?;
    (0..len)
        .map(|i| vm.mem().get_byte(addr.wrapping_add(2).wrapping_add(i)))
        .collect()
}

// ----------------------------------------------------------------------------
// Double cells

fn pop_double(vm: &mut Vm) -> Result<u32, MemoryFault> {
    let h = vm.pop()? as u32;
    let l = vm.pop()? as u32;
    Ok((h << 16) | l)
}

fn push_double(vm: &mut Vm, v: u32) -> Result<(), MemoryFault> {
    vm.push(v as u16)?;
    vm.push((v >> 16) as u16)
}

fn binary_double(vm: &mut Vm, f: fn(u32, u32) -> u32) -> Result<(), MemoryFault> {
    let top = pop_double(vm)?;
    let second = pop_double(vm)?;
    push_double(vm, f(second, top))
}

// ----------------------------------------------------------------------------
// Installation

/// Install the host library on `vm`, routing console traffic to `console`.
pub fn install<C: Console + 'static>(vm: &mut Vm, console: Rc<RefCell<C>>) {
    let putc = |console: Rc<RefCell<C>>| {
        move |vm: &mut Vm| -> Result<(), MemoryFault> {
            let c = vm.pop()?;
            console.borrow_mut().write(&char::from(c as u8).to_string());
            Ok(())
        }
    };
    vm.add_syscall(Sys::DEBUG.into(), putc(console.clone()));
    vm.add_syscall(Sys::PUTC.into(), putc(console.clone()));

    let type_string = |console: Rc<RefCell<C>>, newline: bool| {
        move |vm: &mut Vm| -> Result<(), MemoryFault> {
            let addr = vm.pop()?;
            let bytes = counted_string(vm, addr)?;
            let mut text: String = bytes.iter().map(|&b| b as char).collect();
            if newline {
                text.push('\n');
            }
            let mut console = console.borrow_mut();
            console.write(&text);
            console.flush();
            Ok(())
        }
    };
    vm.add_syscall(Sys::TYPE.into(), type_string(console.clone(), false));
    vm.add_syscall(Sys::TYPELN.into(), type_string(console.clone(), true));

    let con = console.clone();
    vm.add_syscall(Sys::DOT.into(), move |vm: &mut Vm| {
        let base = vm.pop()?;
        let v = vm.pop()?;
        con.borrow_mut().write(&format_value(v, base));
        Ok(())
    });

    let con = console.clone();
    vm.add_syscall(Sys::DOTC.into(), move |vm: &mut Vm| {
        let base = vm.pop()?;
        let v = vm.pop()?;
        con.borrow_mut().write(&format_byte(v as u8, base));
        Ok(())
    });

    let con = console.clone();
    vm.add_syscall(Sys::GETC.into(), move |vm: &mut Vm| {
        let c = con.borrow_mut().getc();
        vm.push(c.map(u16::from).unwrap_or(0xFFFF))
    });

    let con = console.clone();
    vm.add_syscall(Sys::INLINE.into(), move |vm: &mut Vm| {
        let buf = vm.pop()?;
        let start = buf.wrapping_add(4);
        let line = con.borrow_mut().read_line().unwrap_or_default();
        let bytes = &line.as_bytes()[..line.len().min(127)];
        if bytes.is_empty() {
            return vm.push(0);
        }
        for (i, b) in bytes.iter().enumerate() {
            vm.mem_mut().put_byte(start.wrapping_add(i as u16), *b)?;
        }
        let end = start.wrapping_add(bytes.len() as u16 - 1);
        vm.mem_mut().put(buf.wrapping_add(2), end)?;
        vm.mem_mut().put(buf, start)?;
        vm.push(1)
    });

    let con = console;
    vm.add_syscall(Sys::FLUSH.into(), move |_: &mut Vm| {
        con.borrow_mut().flush();
        Ok(())
    });

    vm.add_syscall(Sys::NUMBER.into(), |vm: &mut Vm| {
        let base = vm.pop()?;
        let addr = vm.pop()?;
        let bytes = counted_string(vm, addr)?;
        let text: String = bytes.iter().map(|&b| b as char).collect();
        match number(&text, base) {
            Some(v) => {
                vm.push(v)?;
                vm.push(1)
            }
            None => vm.push(0),
        }
    });

    let host: Rc<RefCell<HashMap<u32, u32>>> = Rc::new(RefCell::new(HashMap::new()));
    let bus = host.clone();
    vm.add_syscall(Sys::H_AT.into(), move |vm: &mut Vm| {
        let addr = pop_double(vm)?;
        let v = bus.borrow().get(&addr).copied().unwrap_or(0);
        push_double(vm, v)
    });
    let bus = host;
    vm.add_syscall(Sys::H_STORE.into(), move |vm: &mut Vm| {
        let addr = pop_double(vm)?;
        let v = pop_double(vm)?;
        bus.borrow_mut().insert(addr, v);
        Ok(())
    });

    vm.add_syscall(Sys::D_ADD.into(), |vm: &mut Vm| {
        binary_double(vm, u32::wrapping_add)
    });
    vm.add_syscall(Sys::D_SUB.into(), |vm: &mut Vm| {
        binary_double(vm, u32::wrapping_sub)
    });
    vm.add_syscall(Sys::D_MUL.into(), |vm: &mut Vm| {
        binary_double(vm, u32::wrapping_mul)
    });
    vm.add_syscall(Sys::D_DIV.into(), |vm: &mut Vm| {
        binary_double(vm, |a, b| a.checked_div(b).unwrap_or(u32::MAX))
    });
    vm.add_syscall(Sys::D_AND.into(), |vm: &mut Vm| binary_double(vm, |a, b| a & b));
    vm.add_syscall(Sys::D_OR.into(), |vm: &mut Vm| binary_double(vm, |a, b| a | b));
    vm.add_syscall(Sys::D_INVERT.into(), |vm: &mut Vm| {
        let v = pop_double(vm)?;
        push_double(vm, !v)
    });
    vm.add_syscall(Sys::D_SR.into(), |vm: &mut Vm| {
        let shift = vm.pop()? as u32;
        let v = pop_double(vm)?;
        push_double(vm, v.checked_shr(shift).unwrap_or(0))
    });
    vm.add_syscall(Sys::D_SL.into(), |vm: &mut Vm| {
        let shift = vm.pop()? as u32;
        let v = pop_double(vm)?;
        push_double(vm, v.checked_shl(shift).unwrap_or(0))
    });
}
