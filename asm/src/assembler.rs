use arch::{bus::Bus, header::header_word, op::Shape};
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::{
    error::{Diagnostic, Error, RangeKind},
    lexer::Lexer,
    symbol::{Symbol, Symbols},
    token::{Code, Directive, Operand, Pos, Token, TokenId, TokenKind},
};

/// Progress of one assembly session. Each pass requires the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Empty,
    Tokenized,
    Addressed,
    Resolved,
    Emitted,
}

pub struct Assembler {
    file: String,
    source: String,
    tokens: Vec<Token>,
    symbols: Symbols,
    options: IndexMap<String, i32>,
    diags: Vec<Diagnostic>,
    phase: Phase,
    end: u32,
}

fn align(n: usize) -> u32 {
    ((n + 1) & !1) as u32
}

impl Assembler {
    pub fn new(file: &str, source: &str) -> Self {
        Assembler {
            file: file.to_string(),
            source: source.to_string(),
            tokens: Vec::new(),
            symbols: Symbols::new(),
            options: IndexMap::new(),
            diags: Vec::new(),
            phase: Phase::Empty,
            end: 0,
        }
    }

    /// Read a whole source file.
    pub fn slurp(path: &str) -> Result<Self, Error> {
        let source =
            std::fs::read_to_string(path).map_err(|e| Error::FileOpen(path.to_string(), e))?;
        Ok(Self::new(path, &source))
    }

    /// Pre-seed a constant. It takes precedence over an in-source definition
    /// of the same name. Must be called before `pass1`.
    pub fn set_option(&mut self, name: &str, value: i32) {
        let name = match name.starts_with('#') {
            true => name.to_string(),
            false => format!("#{name}"),
        };
        self.options.insert(name, value);
    }

    pub fn file(&self) -> &str {
        &self.file
    }
    pub fn source(&self) -> &str {
        &self.source
    }
    pub fn phase(&self) -> Phase {
        self.phase
    }
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
    pub fn symbols(&self) -> &Symbols {
        &self.symbols
    }
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diags
    }

    /// One past the highest address assigned by pass 2.
    pub fn end(&self) -> usize {
        self.end as usize
    }

    pub fn phase1_error(&self) -> bool {
        self.diags.iter().any(|d| d.phase == 1)
    }
    pub fn phase2_error(&self) -> bool {
        self.diags.iter().any(|d| d.phase == 2)
    }
    pub fn phase3_error(&self) -> bool {
        self.diags.iter().any(|d| d.phase == 3)
    }

    pub fn print_diags(&self) {
        for diag in &self.diags {
            diag.print_diag(&self.file, &self.source);
        }
    }

    fn diag(&mut self, phase: u8, pos: Pos, error: Error) {
        trace!(phase, line = pos.line, col = pos.col, "{}", error);
        self.diags.push(Diagnostic { phase, pos, error });
    }

    fn require(&self, allowed: &[Phase], required: Phase) -> Result<(), Error> {
        match allowed.contains(&self.phase) {
            true => Ok(()),
            false => Err(Error::PhaseOrder {
                required,
                current: self.phase,
            }),
        }
    }
}

// ----------------------------------------------------------------------------
// Symbol lookup

impl Assembler {
    /// Value a symbol stands for: constants give their value, everything
    /// else gives its address.
    pub fn symbol_value(&self, name: &str) -> Result<i32, Error> {
        let undefined = || Error::Undefined(name.to_string());
        match self.symbols.get(name).ok_or_else(undefined)? {
            Symbol::Option(v) => Ok(*v),
            Symbol::Token(id) => {
                let tok = &self.tokens[*id];
                match &tok.kind {
                    TokenKind::Const(_, v) => Ok(*v),
                    TokenKind::Label(_) | TokenKind::Var(..) | TokenKind::Str(..) => {
                        tok.address.map(|a| a as i32).ok_or_else(undefined)
                    }
                    _ => Err(undefined()),
                }
            }
        }
    }

    /// Operand that must be known before addresses are assigned.
    fn constant(&self, operand: &Operand) -> Result<i32, Error> {
        match operand {
            Operand::Value(v) => Ok(*v),
            Operand::Symbol(name) => match self.symbols.get(name) {
                Some(Symbol::Option(v)) => Ok(*v),
                Some(Symbol::Token(id)) => match &self.tokens[*id].kind {
                    TokenKind::Const(_, v) => Ok(*v),
                    _ => Err(Error::ConstantExpected(name.clone())),
                },
                None => Err(Error::Undefined(name.clone())),
            },
        }
    }

    fn operand_value(&self, operand: &Operand) -> Result<i32, Error> {
        match operand {
            Operand::Value(v) => Ok(*v),
            Operand::Symbol(name) => self.symbol_value(name),
        }
    }
}

// ----------------------------------------------------------------------------
// Pass 1: tokenize and collect symbols

impl Assembler {
    pub fn pass1(&mut self) -> Result<(), Error> {
        self.require(&[Phase::Empty], Phase::Empty)?;

        for (name, value) in &self.options {
            let _ = self.symbols.define(name, Symbol::Option(*value));
        }

        let tokens: Vec<Token> = Lexer::new(&self.source).collect();
        for mut tok in tokens {
            let id: TokenId = self.tokens.len();
            if let TokenKind::Error(msg) = &tok.kind {
                let msg = msg.clone();
                self.diag(1, tok.pos, Error::Lexical(msg));
            }
            if let Some(name) = tok.defines().map(str::to_string) {
                match self.symbols.define(&name, Symbol::Token(id)) {
                    Ok(()) => {}
                    Err(Symbol::Option(v)) => {
                        if let TokenKind::Const(_, value) = &mut tok.kind {
                            debug!("{} = {} (option overrides {})", name, v, value);
                            *value = v;
                            // A second source definition is then a redefinition.
                            self.symbols.rebind(&name, Symbol::Token(id));
                        } else {
                            self.diag(1, tok.pos, Error::Redefined(name));
                        }
                    }
                    Err(Symbol::Token(_)) => self.diag(1, tok.pos, Error::Redefined(name)),
                }
            }
            self.tokens.push(tok);
        }

        debug!(
            tokens = self.tokens.len(),
            symbols = self.symbols.len(),
            "pass 1 done"
        );
        self.phase = Phase::Tokenized;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Pass 2: assign addresses

impl Assembler {
    /// Can be repeated; the result depends only on the token stream.
    pub fn pass2(&mut self) -> Result<(), Error> {
        self.require(&[Phase::Tokenized, Phase::Addressed], Phase::Tokenized)?;
        self.diags.retain(|d| d.phase != 2);

        let mut addr: u32 = 0;
        let mut end: u32 = 0;
        let mut pending: Option<TokenId> = None;

        for id in 0..self.tokens.len() {
            self.tokens[id].label = None;
            self.tokens[id].address = Some(addr as u16);

            let size = match &self.tokens[id].kind {
                TokenKind::Directive(Directive::Org(operand)) => {
                    match self.constant(operand).and_then(|v| RangeKind::Word.check(v)) {
                        Ok(v) => {
                            addr = v as u16 as u32;
                            self.tokens[id].address = Some(addr as u16);
                        }
                        Err(e) => {
                            let pos = self.tokens[id].pos;
                            self.diag(2, pos, e);
                        }
                    }
                    continue;
                }
                TokenKind::Label(_) => {
                    pending = Some(id);
                    continue;
                }
                TokenKind::Opcode(code) => code.op.size() as u32,
                TokenKind::Var(_, size) => match self.constant(size) {
                    Ok(v) => v.max(0) as u32,
                    Err(e) => {
                        let pos = self.tokens[id].pos;
                        self.diag(2, pos, e);
                        0
                    }
                },
                TokenKind::Str(_, text) => align(text.len() + 2),
                TokenKind::Directive(Directive::Data(_)) => 2,
                TokenKind::Directive(Directive::Text(text)) => align(text.len()),
                TokenKind::Directive(Directive::Header(_, text)) => align(text.len() + 2),
                _ => 0,
            };

            if size > 0 {
                if let Some(label) = pending.take() {
                    if self.tokens[label].address == Some(addr as u16) {
                        self.tokens[id].label = Some(label);
                    }
                }
            }

            addr += size;
            if addr > 0x1_0000 {
                let pos = self.tokens[id].pos;
                self.diag(2, pos, Error::AddressOverflow(addr));
                addr &= 0xFFFF;
            }
            end = end.max(addr);
        }

        self.end = end;
        debug!("pass 2 done, end 0x{:04X}", end);
        self.phase = Phase::Addressed;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Pass 3: resolve operands

impl Assembler {
    pub fn pass3(&mut self) -> Result<(), Error> {
        self.require(&[Phase::Addressed], Phase::Addressed)?;

        for id in 0..self.tokens.len() {
            let addr = self.tokens[id].address.unwrap_or(0);
            let pos = self.tokens[id].pos;
            let resolved = match &self.tokens[id].kind {
                TokenKind::Opcode(code) => self.resolve_code(code, addr).map(TokenKind::Opcode),
                TokenKind::Var(name, size) => self
                    .constant(size)
                    .map(|v| TokenKind::Var(name.clone(), Operand::Value(v))),
                TokenKind::Directive(Directive::Org(operand)) => self
                    .constant(operand)
                    .map(|v| TokenKind::Directive(Directive::Org(Operand::Value(v)))),
                TokenKind::Directive(Directive::Data(operand)) => self
                    .operand_value(operand)
                    .and_then(|v| RangeKind::Word.check(v))
                    .map(|v| TokenKind::Directive(Directive::Data(Operand::Value(v)))),
                _ => continue,
            };
            match resolved {
                Ok(kind) => self.tokens[id].kind = kind,
                Err(e) => {
                    self.tokens[id].kind = TokenKind::Error(e.to_string());
                    // `.ORG` and variable sizes were already reported by pass 2.
                    if !self.diags.iter().any(|d| d.phase == 2 && d.pos == pos) {
                        self.diag(3, pos, e);
                    }
                }
            }
        }

        debug!(errors = self.diags.len(), "pass 3 done");
        self.phase = Phase::Resolved;
        Ok(())
    }

    fn resolve_code(&self, code: &Code, addr: u16) -> Result<Code, Error> {
        let mut code = code.clone();
        let v = match &code.imm {
            Operand::Value(v) => *v,
            Operand::Symbol(name) => {
                let target = self.symbol_value(name)?;
                match code.op.is_relative() {
                    true => (target - addr as i32 - 2) >> 1,
                    false => target,
                }
            }
        };
        let range = match code.op.shape() {
            Shape::RI4 => RangeKind::TinySigned,
            Shape::RUI4 => RangeKind::TinyUnsigned,
            Shape::I8 => RangeKind::ByteSigned,
            Shape::U8 => RangeKind::ByteUnsigned,
            Shape::RI | Shape::IL => RangeKind::Word,
            Shape::RR | Shape::R | Shape::Nil => return Ok(code),
        };
        code.imm = Operand::Value(range.check(v)?);
        Ok(code)
    }
}

// ----------------------------------------------------------------------------
// Emission

impl Assembler {
    /// Write the resolved program into `bus`.
    pub fn emit(&mut self, bus: &mut impl Bus) -> Result<(), Error> {
        self.require(&[Phase::Resolved, Phase::Emitted], Phase::Resolved)?;

        for tok in &self.tokens {
            let Some(addr) = tok.address else {
                continue;
            };
            match &tok.kind {
                TokenKind::Opcode(code) => {
                    let (word, il) = code.inst().encode();
                    let [lo, hi] = word.to_le_bytes();
                    bus.put_byte(addr, lo)?;
                    bus.put_byte(addr.wrapping_add(1), hi)?;
                    if let Some(il) = il {
                        bus.put(addr.wrapping_add(2), il)?;
                    }
                }
                TokenKind::Var(_, size) => {
                    let size = size.value().unwrap_or(0).max(0) as u16;
                    for i in 0..size {
                        bus.put_byte(addr.wrapping_add(i), 0)?;
                    }
                }
                TokenKind::Str(_, text) => {
                    bus.put(addr, text.len() as u16)?;
                    put_bytes(bus, addr.wrapping_add(2), text.as_bytes())?;
                }
                TokenKind::Directive(Directive::Data(operand)) => {
                    bus.put(addr, operand.value().unwrap_or(0) as u16)?;
                }
                TokenKind::Directive(Directive::Text(text)) => {
                    put_bytes(bus, addr, text.as_bytes())?;
                }
                TokenKind::Directive(Directive::Header(scope, text)) => {
                    bus.put(addr, header_word(*scope, text.len()))?;
                    put_bytes(bus, addr.wrapping_add(2), text.as_bytes())?;
                }
                _ => {}
            }
        }

        debug!(bytes = self.end, "emitted");
        self.phase = Phase::Emitted;
        Ok(())
    }

    /// Run every pass and emit. Nothing is written if any pass reported errors.
    pub fn assemble(&mut self, bus: &mut impl Bus) -> Result<(), Error> {
        self.pass1()?;
        self.pass2()?;
        self.pass3()?;
        if !self.diags.is_empty() {
            return Err(Error::Failed(self.diags.len()));
        }
        self.emit(bus)
    }
}

fn put_bytes(bus: &mut impl Bus, addr: u16, bytes: &[u8]) -> Result<(), Error> {
    for (i, b) in bytes.iter().enumerate() {
        bus.put_byte(addr.wrapping_add(i as u16), *b)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arch::bus::Image;

    fn run(source: &str) -> Assembler {
        let mut asm = Assembler::new("test.fasm", source);
        asm.pass1().unwrap();
        asm.pass2().unwrap();
        asm.pass3().unwrap();
        asm
    }

    #[test]
    fn phase_order() {
        let mut asm = Assembler::new("test.fasm", "HALT");
        assert!(matches!(
            asm.pass3(),
            Err(Error::PhaseOrder {
                required: Phase::Addressed,
                current: Phase::Empty
            })
        ));
        assert!(matches!(asm.pass2(), Err(Error::PhaseOrder { .. })));
        assert!(matches!(asm.emit(&mut Image::new()), Err(Error::PhaseOrder { .. })));
        asm.pass1().unwrap();
        assert!(matches!(asm.pass1(), Err(Error::PhaseOrder { .. })));
    }

    #[test]
    fn sizes() {
        let asm = run(concat!(
            "NOP\n",
            "MOVIL A,0x1234\n",
            ".STRING \"abc\"\n",
            ".NWORD \"DUP\"\n",
            "$S: \"hi\"\n",
            "%V: 3\n",
            ".DATA 7\n",
            "END:\n",
        ));
        let addrs: Vec<u16> = asm
            .tokens()
            .iter()
            .filter(|t| !matches!(t.kind, TokenKind::Eof))
            .map(|t| t.address.unwrap())
            .collect();
        assert_eq!(addrs, [0, 2, 6, 10, 16, 20, 23, 25]);
        assert_eq!(asm.end(), 25);
    }

    #[test]
    fn org_with_constant() {
        let asm = run("#BASE: 0x100\n.ORG #BASE\nSTART: HALT\n");
        assert_eq!(asm.symbol_value("START").unwrap(), 0x100);
        let halt = &asm.tokens()[3];
        assert_eq!(halt.label, Some(2));
    }

    #[test]
    fn constant_vs_address() {
        let asm = run("#N: 40\nNOP\nL: MOVIL A,#N\nMOVIL B,L\n");
        let ils: Vec<Option<u16>> = asm
            .tokens()
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Opcode(code) if code.op.is_long() => Some(code.inst().il),
                _ => None,
            })
            .collect();
        assert_eq!(ils, [Some(40), Some(2)]);
    }

    #[test]
    fn backward_relative_branch() {
        let asm = run("LOOP: NOP\nJR LOOP\n");
        match &asm.tokens()[2].kind {
            TokenKind::Opcode(code) => assert_eq!(code.imm, Operand::Value(-2)),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn undefined_symbol() {
        let asm = run("JP NOWHERE\n");
        assert!(asm.phase3_error());
        assert!(matches!(asm.tokens()[0].kind, TokenKind::Error(_)));
        assert!(matches!(
            &asm.diagnostics()[0].error,
            Error::Undefined(name) if name == "NOWHERE"
        ));
    }

    #[test]
    fn variable_size_must_be_constant() {
        let asm = run("L: NOP\n%V: #L\n");
        assert!(asm.phase2_error());
    }

    #[test]
    fn unresolved_sizes_reported_once() {
        let asm = run("%V: #NOPE\n.ORG #GONE\nHALT\n");
        assert_eq!(asm.diagnostics().len(), 2);
        assert!(asm.diagnostics().iter().all(|d| d.phase == 2));
        assert!(!asm.phase3_error());
        assert!(matches!(asm.tokens()[0].kind, TokenKind::Error(_)));
        assert!(matches!(asm.tokens()[1].kind, TokenKind::Error(_)));

        let mut asm = Assembler::new("test.fasm", "%V: #NOPE\n.ORG #GONE\n");
        assert!(matches!(asm.assemble(&mut Image::new()), Err(Error::Failed(2))));
    }
}
