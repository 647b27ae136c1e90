use crate::{
    bus::{Bus, MemoryFault},
    inst::Inst,
};

/// One decoded cell of a memory range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disasm {
    Inst(u16, Inst),
    /// Word that does not encode any instruction.
    Data(u16, u16),
}

impl Disasm {
    pub fn addr(&self) -> u16 {
        match self {
            Disasm::Inst(addr, _) | Disasm::Data(addr, _) => *addr,
        }
    }

    pub fn size(&self) -> u16 {
        match self {
            Disasm::Inst(_, inst) => inst.op.size(),
            Disasm::Data(..) => 2,
        }
    }

    /// Assembler source for this cell.
    pub fn format(&self) -> String {
        match self {
            Disasm::Inst(_, inst) => inst.format(),
            Disasm::Data(_, word) => format!(".DATA 0x{:04X}", word),
        }
    }
}

/// Decode `start..end` back into instructions. Words that would not
/// re-encode to themselves are reported as data.
pub fn disassemble(bus: &impl Bus, start: u16, end: u16) -> Result<Vec<Disasm>, MemoryFault> {
    let mut out = Vec::new();
    let mut addr = start as u32;
    while addr < end as u32 {
        let at = addr as u16;
        let word = bus.get(at)?;
        let inst = Inst::decode(word);
        let cell = if inst.word() != word {
            Disasm::Data(at, word)
        } else if inst.op.is_long() {
            Disasm::Inst(at, inst.with_il(bus.get(at.wrapping_add(2))?))
        } else {
            Disasm::Inst(at, inst)
        };
        addr += cell.size() as u32;
        out.push(cell);
    }
    Ok(out)
}
