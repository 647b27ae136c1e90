use crate::{
    cond::Cond,
    op::{Op, Shape},
    reg::Reg,
};

use color_print::cformat;

/// One decoded instruction: opcode, optional condition, the two 4-bit operand
/// fields and the trailing immediate word of long forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inst {
    pub op: Op,
    pub cond: Option<Cond>,
    pub a: u8,
    pub b: u8,
    pub il: Option<u16>,
}

/// Sign-extend `v` whose sign bit is `bit`.
pub fn sext(v: u16, bit: u32) -> i16 {
    if v & (1 << bit) != 0 {
        (v | !((1u16 << bit) - 1)) as i16
    } else {
        v as i16
    }
}

impl Inst {
    pub fn new(op: Op) -> Self {
        Inst {
            op,
            cond: None,
            a: 0,
            b: 0,
            il: None,
        }
    }

    pub fn with_cond(mut self, cond: Option<Cond>) -> Self {
        self.cond = cond;
        self
    }

    pub fn with_a(mut self, r: Reg) -> Self {
        self.a = u8::from(r) & 0x0F;
        self
    }

    pub fn with_b(mut self, r: Reg) -> Self {
        self.b = u8::from(r) & 0x0F;
        self
    }

    pub fn with_il(mut self, il: u16) -> Self {
        self.il = Some(il);
        self
    }

    /// Place an immediate into the fields its shape dictates. The value is
    /// truncated to the field width; range checks belong to the caller.
    pub fn with_imm(mut self, v: i32) -> Self {
        match self.op.shape() {
            Shape::RI4 | Shape::RUI4 => self.b = (v & 0x0F) as u8,
            Shape::I8 | Shape::U8 => {
                self.a = ((v >> 4) & 0x0F) as u8;
                self.b = (v & 0x0F) as u8;
            }
            Shape::RI | Shape::IL => self.il = Some(v as u16),
            Shape::RR | Shape::R | Shape::Nil => {}
        }
        self
    }

    pub fn ra(&self) -> Reg {
        Reg::field(self.a)
    }

    pub fn rb(&self) -> Reg {
        Reg::field(self.b)
    }

    pub fn n4(&self) -> i16 {
        sext(self.b as u16, 3)
    }

    pub fn u4(&self) -> u16 {
        self.b as u16
    }

    pub fn n8(&self) -> i16 {
        sext(self.u8(), 7)
    }

    pub fn u8(&self) -> u16 {
        ((self.a as u16) << 4) | self.b as u16
    }

    /// Immediate operand as written in source, if the shape has one.
    pub fn imm(&self) -> Option<i32> {
        match self.op.shape() {
            Shape::RI4 => Some(self.n4() as i32),
            Shape::RUI4 => Some(self.u4() as i32),
            Shape::I8 => Some(self.n8() as i32),
            Shape::U8 => Some(self.u8() as i32),
            Shape::RI | Shape::IL => self.il.map(|v| v as i32),
            Shape::RR | Shape::R | Shape::Nil => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Binary

impl Inst {
    pub fn word(&self) -> u16 {
        let op = (u8::from(self.op) as u16) << 8;
        let args = ((self.a as u16 & 0x0F) << 4) | (self.b as u16 & 0x0F);
        if self.op.is_control() {
            let cond = self.cond.map(|c| c.encode()).unwrap_or(0);
            op | cond | args
        } else {
            (op & 0x7F00) | args
        }
    }

    /// Instruction word followed by the immediate word for long forms.
    pub fn encode(&self) -> (u16, Option<u16>) {
        match self.op.is_long() {
            true => (self.word(), Some(self.il.unwrap_or(0))),
            false => (self.word(), None),
        }
    }

    /// Decode an instruction word. The trailing word of long forms is not
    /// part of `word`; attach it with [`Inst::with_il`].
    pub fn decode(word: u16) -> Self {
        let a = ((word >> 4) & 0x0F) as u8;
        let b = (word & 0x0F) as u8;
        if word & 0x8000 != 0 {
            let op = Op::from(((word & !Cond::MASK) >> 8) as u8);
            Inst {
                op,
                cond: Cond::decode(word),
                a,
                b,
                il: None,
            }
        } else {
            Inst {
                op: Op::from(((word >> 8) & 0x7F) as u8),
                cond: None,
                a,
                b,
                il: None,
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Text

impl Inst {
    fn mnemonic(&self) -> String {
        match self.cond {
            Some(cond) => format!("{}{}", self.op, cond),
            None => format!("{}", self.op),
        }
    }

    fn word_imm(&self) -> String {
        format!("0x{:04X}", self.il.unwrap_or(0))
    }

    /// Plain text accepted back by the assembler.
    pub fn format(&self) -> String {
        let name = self.mnemonic();
        match self.op.shape() {
            Shape::RR => format!("{} {},{}", name, self.ra(), self.rb()),
            Shape::RI4 => format!("{} {},{}", name, self.ra(), self.n4()),
            Shape::RUI4 => format!("{} {},{}", name, self.ra(), self.u4()),
            Shape::I8 => format!("{} {}", name, self.n8()),
            Shape::U8 => format!("{} {}", name, self.u8()),
            Shape::RI => format!("{} {},{}", name, self.ra(), self.word_imm()),
            Shape::IL => format!("{} {}", name, self.word_imm()),
            Shape::R => format!("{} {}", name, self.ra()),
            Shape::Nil => name,
        }
    }

    pub fn cformat(&self) -> String {
        let name = self.mnemonic();
        match self.op.shape() {
            Shape::RR => cformat!("<r>{:<10}</><b>{},{}</>", name, self.ra(), self.rb()),
            Shape::RI4 => cformat!("<r>{:<10}</><b>{}</>,<y>{}</>", name, self.ra(), self.n4()),
            Shape::RUI4 => cformat!("<r>{:<10}</><b>{}</>,<y>{}</>", name, self.ra(), self.u4()),
            Shape::I8 => cformat!("<r>{:<10}</><y>{}</>", name, self.n8()),
            Shape::U8 => cformat!("<r>{:<10}</><y>{}</>", name, self.u8()),
            Shape::RI => {
                cformat!("<r>{:<10}</><b>{}</>,<y>{}</>", name, self.ra(), self.word_imm())
            }
            Shape::IL => cformat!("<r>{:<10}</><y>{}</>", name, self.word_imm()),
            Shape::R => cformat!("<r>{:<10}</><b>{}</>", name, self.ra()),
            Shape::Nil => cformat!("<r>{}</>", name),
        }
    }
}
