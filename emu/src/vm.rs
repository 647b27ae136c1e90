use arch::{
    alu::{self, Flags},
    bus::{Bus, MemoryFault},
    cond::{Cc, Cond},
    inst::Inst,
    op::Op,
    reg::Reg,
};
use tracing::{error, trace, warn};

use crate::memory::Memory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Halted,
    Running,
    /// A memory access failed under `Policy::Fail`. Only `reset` leaves it.
    Fault(MemoryFault),
}

/// Host function behind `SYSCALL n`.
pub type Syscall = Box<dyn FnMut(&mut Vm) -> Result<(), MemoryFault>>;

/// Record of one executed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    pub addr: u16,
    pub inst: Inst,
    /// Condition failed; the instruction acted as NOP.
    pub skipped: bool,
}

pub struct Vm {
    regs: [u16; 16],
    flags: Flags,
    state: State,
    mem: Memory,
    syscalls: Vec<Option<Syscall>>,
}

impl Vm {
    /// A halted machine with `slots` empty syscall slots.
    pub fn new(mem: Memory, slots: usize) -> Self {
        Vm {
            regs: [0; 16],
            flags: Flags::default(),
            state: State::Halted,
            mem,
            syscalls: (0..slots).map(|_| None).collect(),
        }
    }

    /// Start running from address 0.
    pub fn reset(&mut self) {
        self.regs[Reg::PC.idx()] = 0;
        self.state = State::Running;
    }

    pub fn halt(&mut self) {
        self.state = State::Halted;
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == State::Halted
    }

    pub fn get(&self, r: Reg) -> u16 {
        self.regs[r.idx()]
    }

    pub fn set(&mut self, r: Reg, v: u16) {
        self.regs[r.idx()] = v;
    }

    pub fn pc(&self) -> u16 {
        self.get(Reg::PC)
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: Flags) {
        self.flags = flags;
    }

    pub fn mem(&self) -> &Memory {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    pub fn add_syscall(
        &mut self,
        idx: u8,
        handler: impl FnMut(&mut Vm) -> Result<(), MemoryFault> + 'static,
    ) {
        match self.syscalls.get_mut(idx as usize) {
            Some(slot) => *slot = Some(Box::new(handler)),
            None => warn!(
                "syscall {} is outside the table ({} slots)",
                idx,
                self.syscalls.len()
            ),
        }
    }
}

// ----------------------------------------------------------------------------
// Stacks

impl Vm {
    fn push_on(&mut self, sp: Reg, v: u16) -> Result<(), MemoryFault> {
        let addr = self.get(sp);
        self.mem.put(addr, v)?;
        self.set(sp, addr.wrapping_sub(2));
        Ok(())
    }

    fn pop_from(&mut self, sp: Reg) -> Result<u16, MemoryFault> {
        let addr = self.get(sp).wrapping_add(2);
        self.set(sp, addr);
        self.mem.get(addr)
    }

    /// Push onto the data stack (SP).
    pub fn push(&mut self, v: u16) -> Result<(), MemoryFault> {
        self.push_on(Reg::SP, v)
    }

    /// Pop from the data stack (SP).
    pub fn pop(&mut self) -> Result<u16, MemoryFault> {
        self.pop_from(Reg::SP)
    }

    pub fn rpush(&mut self, v: u16) -> Result<(), MemoryFault> {
        self.push_on(Reg::RS, v)
    }

    pub fn rpop(&mut self) -> Result<u16, MemoryFault> {
        self.pop_from(Reg::RS)
    }
}

// ----------------------------------------------------------------------------
// Execution

impl Vm {
    /// Execute one instruction. `None` when not running.
    pub fn step(&mut self) -> Option<Cycle> {
        if self.state != State::Running {
            return None;
        }
        match self.cycle() {
            Ok(cycle) => {
                trace!(
                    "{:04X} {}{}",
                    cycle.addr,
                    cycle.inst.format(),
                    if cycle.skipped { " (skipped)" } else { "" }
                );
                Some(cycle)
            }
            Err(fault) => {
                error!("{} at PC 0x{:04X}", fault, self.pc());
                self.state = State::Fault(fault);
                None
            }
        }
    }

    /// Step until the machine stops.
    pub fn run(&mut self) -> State {
        while self.step().is_some() {}
        self.state
    }

    fn test(&self, cond: Cond) -> bool {
        let flag = match cond.cc {
            Cc::C => self.flags.c,
            Cc::Z => self.flags.z,
            Cc::P => self.flags.o,
            Cc::M => self.flags.s,
        };
        flag != cond.invert
    }

    fn cycle(&mut self) -> Result<Cycle, MemoryFault> {
        let addr = self.pc();
        let word = self.mem.get(addr)?;
        self.set(Reg::PC, addr.wrapping_add(2));

        let mut inst = Inst::decode(word);
        // The trailing word is consumed even when the condition fails.
        if inst.op.is_long() {
            let il = self.mem.get(self.pc())?;
            self.set(Reg::PC, self.pc().wrapping_add(2));
            inst = inst.with_il(il);
        }

        let skipped = match inst.cond {
            Some(cond) => !self.test(cond),
            None => false,
        };
        if !skipped {
            self.execute(&inst)?;
        }
        Ok(Cycle {
            addr,
            inst,
            skipped,
        })
    }

    fn arith(&mut self, r: Reg, v: u32) {
        self.flags = Flags::arith(v);
        self.set(r, v as u16);
    }

    fn boolean(&mut self, r: Reg, v: u32) {
        self.flags = Flags::boolean(v);
        self.set(r, v as u16);
    }

    fn jump(&mut self, call: bool, target: u16) -> Result<(), MemoryFault> {
        if call {
            self.rpush(self.pc())?;
        }
        self.set(Reg::PC, target);
        Ok(())
    }

    fn syscall(&mut self, idx: usize) -> Result<(), MemoryFault> {
        let Some(mut handler) = self.syscalls.get_mut(idx).and_then(Option::take) else {
            trace!("syscall {} not installed", idx);
            return Ok(());
        };
        let result = handler(self);
        if let Some(slot) = self.syscalls.get_mut(idx) {
            slot.get_or_insert(handler);
        }
        result
    }

    fn execute(&mut self, inst: &Inst) -> Result<(), MemoryFault> {
        use Op::*;

        let ra = inst.ra();
        let a = self.get(ra);
        let b = self.get(inst.rb());
        let n4 = inst.n4();
        let u4 = inst.u4();
        let n8 = inst.n8();
        let il = inst.il.unwrap_or(0);
        let acc_a = self.get(Reg::A);
        let acc_b = self.get(Reg::B);
        let index = |base: u16| base.wrapping_add((n4 as u16).wrapping_mul(2));

        match inst.op {
            NOP | BRK => {}

            // Moves
            MOV => self.set(ra, b),
            MOVI => self.set(ra, n4 as u16),
            MOVIL => self.set(ra, il),
            MOVAI => self.set(Reg::A, n8 as u16),
            MOVBI => self.set(Reg::B, n8 as u16),

            // Loads
            LD => {
                let v = self.mem.get(b)?;
                self.set(ra, v);
            }
            LD_B => {
                let v = self.mem.get_byte(b)?;
                self.set(ra, v as u16);
            }
            LDAX => {
                let v = self.mem.get(index(a))?;
                self.set(Reg::A, v);
            }
            LDBX => {
                let v = self.mem.get(index(a))?;
                self.set(Reg::B, v);
            }
            LDAX_B => {
                let v = self.mem.get_byte(index(a))?;
                self.set(Reg::A, v as u16);
            }
            LDBX_B => {
                let v = self.mem.get_byte(index(a))?;
                self.set(Reg::B, v as u16);
            }

            // Stores
            ST => self.mem.put(a, b)?,
            ST_B => self.mem.put_byte(a, b as u8)?,
            STI => self.mem.put(a, n4 as u16)?,
            STI_B => self.mem.put_byte(a, n4 as u8)?,
            STIL => self.mem.put(a, il)?,
            STAI => self.mem.put(acc_a, n8 as u16)?,
            STBI => self.mem.put(acc_b, n8 as u16)?,
            STAI_B => self.mem.put_byte(acc_a, n8 as u8)?,
            STBI_B => self.mem.put_byte(acc_b, n8 as u8)?,
            STXA => self.mem.put(index(a), acc_a)?,
            STXB => self.mem.put(index(a), acc_b)?,
            STXA_B => self.mem.put_byte(a.wrapping_add(n4 as u16), acc_a as u8)?,
            STXB_B => self.mem.put_byte(a.wrapping_add(n4 as u16), acc_b as u8)?,

            // Stacks
            PUSHD => self.push(a)?,
            PUSHR => self.rpush(a)?,
            POPD => {
                let v = self.pop()?;
                self.set(ra, v);
            }
            POPR => {
                let v = self.rpop()?;
                self.set(ra, v);
            }

            // Arithmetic
            ADD => self.arith(ra, alu::add(a, b as i32)),
            ADDI => self.arith(ra, alu::add(a, n4 as i32)),
            ADDAI => self.arith(Reg::A, alu::add(acc_a, n8 as i32)),
            ADDBI => self.arith(Reg::B, alu::add(acc_b, n8 as i32)),
            ADDIL => self.arith(ra, alu::add(a, il as i32)),
            SUB => self.arith(ra, alu::sub(a, b as i32)),
            SUBI => self.arith(ra, alu::sub(a, n4 as i32)),
            SUBAI => self.arith(Reg::A, alu::sub(acc_a, n8 as i32)),
            SUBBI => self.arith(Reg::B, alu::sub(acc_b, n8 as i32)),
            SUBIL => self.arith(ra, alu::sub(a, il as i32)),
            MUL => self.arith(ra, alu::mul(a, b)),
            DIV => match b {
                0 => {
                    self.flags.c = true;
                    self.flags.o = true;
                }
                _ => self.arith(ra, (a / b) as u32),
            },
            CMP => self.flags = Flags::arith(alu::sub(a, b as i32)),
            CMPI => self.flags = Flags::arith(alu::sub(a, n4 as i32)),
            CMPAI => self.flags = Flags::arith(alu::sub(acc_a, n8 as i32)),
            CMPBI => self.flags = Flags::arith(alu::sub(acc_b, n8 as i32)),
            CMPIL => self.flags = Flags::arith(alu::sub(a, il as i32)),

            // Boolean
            AND => self.boolean(ra, (a & b) as u32),
            OR => self.boolean(ra, (a | b) as u32),
            XOR => self.boolean(ra, (a ^ b) as u32),
            NOT => self.boolean(ra, !a as u32),

            // Shifts and rotates
            SL | SLI => {
                let n = if inst.op == SL { b } else { u4 };
                self.boolean(ra, alu::sl(a, n));
            }
            SR | SRI => {
                let n = if inst.op == SR { b } else { u4 };
                self.boolean(ra, alu::sr(a, n) as u32);
                self.flags.c = a & 0x0001 != 0;
            }
            RR | RRI => {
                let n = if inst.op == RR { b } else { u4 };
                let r = alu::rr(a, n);
                self.boolean(ra, r as u32);
                self.flags.c = r & 0x8000 != 0;
            }
            RL | RLI => {
                let n = if inst.op == RL { b } else { u4 };
                let r = alu::rl(a, n);
                self.boolean(ra, r as u32);
                self.flags.c = r & 0x0001 != 0;
            }
            RRC | RRCI => {
                let n = if inst.op == RRC { b } else { u4 };
                let (r, c) = alu::rrc(a, self.flags.c, n);
                self.set(ra, r);
                self.flags.c = c;
            }
            RLC | RLCI => {
                let n = if inst.op == RLC { b } else { u4 };
                let (r, c) = alu::rlc(a, self.flags.c, n);
                self.set(ra, r);
                self.flags.c = c;
            }

            // Single bits
            BIT | BITI => {
                let n = if inst.op == BIT { b } else { u4 };
                self.flags.z = a & (1 << (n % 16)) == 0;
            }
            SET | SETI => {
                let n = if inst.op == SET { b } else { u4 };
                self.set(ra, a | (1 << (n % 16)));
            }
            CLR | CLRI => {
                let n = if inst.op == CLR { b } else { u4 };
                self.set(ra, a & !(1 << (n % 16)));
            }

            // Control flow
            JP | CALL => self.jump(inst.op.is_call(), il)?,
            JR | CALLR => {
                let target = self.pc().wrapping_add((n8 as u16).wrapping_mul(2));
                self.jump(inst.op.is_call(), target)?;
            }
            JX | CALLX => self.jump(inst.op.is_call(), index(a))?,
            JXL | CALLXL => self.jump(inst.op.is_call(), a.wrapping_add(il))?,
            RET => {
                let v = self.rpop()?;
                self.set(Reg::PC, v);
            }

            SYSCALL => self.syscall(inst.u8() as usize)?,
            HALT => self.state = State::Halted,
        }
        Ok(())
    }
}
