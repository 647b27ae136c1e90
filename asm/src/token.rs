use arch::{
    cond::Cond,
    header::Scope,
    inst::Inst,
    op::{Op, Shape},
    reg::Reg,
};

/// Index of a token in the assembler's arena.
pub type TokenId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
    /// Assigned by pass 2.
    pub address: Option<u16>,
    /// Label bound to the same address, for listings.
    pub label: Option<TokenId>,
}

impl Token {
    pub fn new(kind: TokenKind, pos: Pos) -> Self {
        Token {
            kind,
            pos,
            address: None,
            label: None,
        }
    }

    pub fn error(msg: &str, pos: Pos) -> Self {
        Token::new(TokenKind::Error(msg.to_string()), pos)
    }

    /// Name of the symbol this token defines.
    pub fn defines(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Label(name)
            | TokenKind::Const(name, _)
            | TokenKind::Var(name, _)
            | TokenKind::Str(name, _) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Opcode(Code),
    Label(String),
    /// `#NAME: value`
    Const(String, i32),
    /// `%NAME: size`
    Var(String, Operand),
    /// `$NAME: "text"`
    Str(String, String),
    Comment(String),
    Directive(Directive),
    Error(String),
    Eof,
}

/// Numeric operand, symbolic until pass 3 replaces it with its value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(i32),
    Symbol(String),
}

impl Operand {
    pub fn value(&self) -> Option<i32> {
        match self {
            Operand::Value(v) => Some(*v),
            Operand::Symbol(_) => None,
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Operand::Symbol(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Org(Operand),
    Data(Operand),
    Alias(Reg, String),
    Text(String),
    Header(Scope, String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub op: Op,
    pub cond: Option<Cond>,
    pub a: Reg,
    pub b: Reg,
    pub imm: Operand,
}

impl Code {
    pub fn new(op: Op) -> Self {
        Code {
            op,
            cond: None,
            a: Reg::R0,
            b: Reg::R0,
            imm: Operand::Value(0),
        }
    }

    /// Encodable instruction. Symbolic immediates encode as zero.
    pub fn inst(&self) -> Inst {
        let imm = self.imm.value().unwrap_or(0);
        let inst = Inst::new(self.op).with_cond(self.cond);
        match self.op.shape() {
            Shape::RR => inst.with_a(self.a).with_b(self.b),
            Shape::RI4 | Shape::RUI4 | Shape::RI => inst.with_a(self.a).with_imm(imm),
            Shape::I8 | Shape::U8 | Shape::IL => inst.with_imm(imm),
            Shape::R => inst.with_a(self.a),
            Shape::Nil => inst,
        }
    }

    /// Source form, keeping symbol names.
    pub fn format(&self) -> String {
        match &self.imm {
            Operand::Symbol(name) => {
                let name_cond = match self.cond {
                    Some(cond) => format!("{}{}", self.op, cond),
                    None => self.op.to_string(),
                };
                match self.op.shape() {
                    Shape::RI4 | Shape::RUI4 | Shape::RI => {
                        format!("{} {},{}", name_cond, self.a, name)
                    }
                    _ => format!("{} {}", name_cond, name),
                }
            }
            Operand::Value(_) => self.inst().format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_to_inst() {
        let mut code = Code::new(Op::ADDI);
        code.a = Reg::B;
        code.imm = Operand::Value(-2);
        assert_eq!(code.inst().word(), (30 << 8) | 0x9E);
        assert_eq!(code.format(), "ADDI B,-2");
    }

    #[test]
    fn symbolic_format() {
        let mut code = Code::new(Op::MOVIL);
        code.a = Reg::SP;
        code.imm = Operand::Symbol("#STACK".to_string());
        assert_eq!(code.format(), "MOVIL SP,#STACK");
        assert_eq!(code.inst().il, Some(0));
    }
}
