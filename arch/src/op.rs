use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Opcode byte. General opcodes occupy 0x00..=0x7F (bits 14-8 of the word),
/// control-flow opcodes are the high byte of the word with the condition bits cleared.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Default,
    FromPrimitive,
    IntoPrimitive,
    EnumString,
    EnumIter,
    Display,
)]
#[repr(u8)]
#[allow(non_camel_case_types)]
pub enum Op {
    #[default]
    NOP = 0,
    MOV = 1,
    MOVI = 2,
    MOVIL = 3,
    MOVAI = 4,
    MOVBI = 5,
    LD = 6,
    LD_B = 7,
    LDAX = 8,
    LDBX = 9,
    LDAX_B = 10,
    LDBX_B = 11,
    STI = 12,
    STAI = 13,
    STBI = 14,
    STIL = 15,
    ST = 16,
    ST_B = 17,
    STI_B = 18,
    STAI_B = 19,
    STBI_B = 20,
    STXA = 21,
    STXB = 22,
    STXA_B = 23,
    STXB_B = 24,
    PUSHD = 25,
    PUSHR = 26,
    POPD = 27,
    POPR = 28,
    ADD = 29,
    ADDI = 30,
    ADDAI = 31,
    ADDBI = 32,
    ADDIL = 33,
    SUB = 34,
    SUBI = 35,
    SUBAI = 36,
    SUBBI = 37,
    SUBIL = 38,
    MUL = 39,
    DIV = 40,
    AND = 41,
    OR = 42,
    NOT = 43,
    XOR = 44,
    SL = 45,
    SR = 46,
    RR = 47,
    RRC = 48,
    RL = 49,
    RLC = 50,
    BIT = 51,
    SET = 52,
    CLR = 53,
    SLI = 54,
    SRI = 55,
    RRI = 56,
    RRCI = 57,
    RLI = 58,
    RLCI = 59,
    BITI = 60,
    SETI = 61,
    CLRI = 62,
    CMP = 63,
    CMPI = 64,
    CMPAI = 65,
    CMPBI = 66,
    CMPIL = 67,
    RET = 68,
    SYSCALL = 69,
    HALT = 70,
    BRK = 71,

    JP = 0x80,
    JR = 0x81,
    JX = 0x82,
    JXL = 0x83,
    CALL = 0xC0,
    CALLR = 0xC1,
    CALLX = 0xC2,
    CALLXL = 0xC3,
}

impl Op {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_uppercase().parse::<Self>() {
            Ok(a) => Ok(a),
            Err(_) => Err(format!("Undefined Op: {s}")),
        }
    }

    /// True if `byte` names an opcode rather than falling back to NOP.
    pub fn is_defined(byte: u8) -> bool {
        u8::from(Op::from(byte)) == byte
    }
}

/// Operand encoding shape of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// `Ra,Rb`
    RR,
    /// `Ra,n4` signed -8..7 in argb
    RI4,
    /// `Ra,u4` unsigned 0..15 in argb
    RUI4,
    /// `n8` signed -128..127 across arga:argb
    I8,
    /// `u8` unsigned 0..255 across arga:argb
    U8,
    /// `Ra,IL` with the word in the following cell
    RI,
    /// `IL` only
    IL,
    /// `Ra`
    R,
    Nil,
}

impl Op {
    pub fn shape(&self) -> Shape {
        use Op::*;
        match self {
            MOV | LD | LD_B | ST | ST_B | ADD | SUB | MUL | DIV | AND | OR | XOR | SL | SR | RL
            | RR | RLC | RRC | BIT | SET | CLR | CMP => Shape::RR,

            MOVI | LDAX | LDBX | LDAX_B | LDBX_B | STI | STI_B | STXA | STXB | STXA_B | STXB_B
            | ADDI | SUBI | CMPI | JX | CALLX => Shape::RI4,

            SLI | SRI | RLI | RRI | RLCI | RRCI | BITI | SETI | CLRI => Shape::RUI4,

            MOVAI | MOVBI | STAI | STBI | STAI_B | STBI_B | ADDAI | ADDBI | SUBAI | SUBBI
            | CMPAI | CMPBI | JR | CALLR => Shape::I8,

            SYSCALL => Shape::U8,

            MOVIL | STIL | ADDIL | SUBIL | CMPIL | JXL | CALLXL => Shape::RI,

            JP | CALL => Shape::IL,

            NOT | PUSHD | PUSHR | POPD | POPR => Shape::R,

            NOP | RET | HALT | BRK => Shape::Nil,
        }
    }

    /// Instruction is followed by an immediate word.
    pub fn is_long(&self) -> bool {
        matches!(self.shape(), Shape::RI | Shape::IL)
    }

    /// Control-flow instruction (bit 15 set), the only kind that takes a condition.
    pub fn is_control(&self) -> bool {
        u8::from(*self) & 0x80 != 0
    }

    pub fn is_call(&self) -> bool {
        u8::from(*self) & 0xC0 == 0xC0
    }

    /// JR and CALLR take a word distance relative to the next instruction.
    pub fn is_relative(&self) -> bool {
        matches!(self, Op::JR | Op::CALLR)
    }

    /// Size in bytes including the trailing immediate word.
    pub fn size(&self) -> u16 {
        if self.is_long() {
            4
        } else {
            2
        }
    }
}
