use arch::{
    cond::Cond,
    header::Scope,
    op::{Op, Shape},
    reg::Reg,
};
use bimap::BiMap;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::iter::{Enumerate, Peekable};
use std::str::{CharIndices, Lines};

use crate::token::{Code, Directive, Operand, Pos, Token, TokenKind};

pub const NAME_EXPECTED: &str = "Name expected";
pub const ALIAS_EXPECTED: &str = "Alias expected";
pub const REGISTER_NAME_EXPECTED: &str = "Register name expected";
pub const DIRECTIVE_EXPECTED: &str = "Directive expected";
pub const NUMBER_EXPECTED: &str = "Number expected";
pub const OPCODE_EXPECTED: &str = "Opcode expected";
pub const INVALID_CONDITION: &str = "Invalid condition";
pub const COMMA_EXPECTED: &str = "Comma expected";
pub const NUMBER_OR_LABEL_EXPECTED: &str = "Number or label expected";
pub const CONSTANT_EXPECTED: &str = "Constant expected";
pub const STRING_EXPECTED: &str = "String expected";
pub const STRING_TOO_LONG: &str = "String too long for a header (max 255)";
pub const HEX_NUMBER_EXPECTED: &str = "Hex number expected";
pub const BINARY_NUMBER_EXPECTED: &str = "Binary number expected";
pub const DECIMAL_NUMBER_EXPECTED: &str = "Decimal number expected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DirectiveKind {
    Org,
    Data,
    Alias,
    Text,
    Header(Scope),
}

static DIRECTIVES: Lazy<BiMap<&'static str, DirectiveKind>> = Lazy::new(|| {
    let mut map: BiMap<&'static str, DirectiveKind> = BiMap::new();
    map.insert("ORG", DirectiveKind::Org);
    map.insert("DATA", DirectiveKind::Data);
    map.insert("ALIAS", DirectiveKind::Alias);
    map.insert("STRING", DirectiveKind::Text);
    map.insert("NWORD", DirectiveKind::Header(Scope::Normal));
    map.insert("RWORD", DirectiveKind::Header(Scope::Runtime));
    map.insert("IWORD", DirectiveKind::Header(Scope::Immediate));
    map.insert("XWORD", DirectiveKind::Header(Scope::Executive));
    map
});

/// Directive keyword for a header scope, as written in source.
pub fn header_keyword(scope: Scope) -> &'static str {
    DIRECTIVES
        .get_by_right(&DirectiveKind::Header(scope))
        .copied()
        .unwrap_or("NWORD")
}

/// Forward-only token stream over a whole source buffer. Lines are scanned
/// lazily; a lexical error ends the current line.
pub struct Lexer<'a> {
    lines: Enumerate<Lines<'a>>,
    queue: VecDeque<Token>,
    aliases: IndexMap<String, Reg>,
    line_count: usize,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines().enumerate(),
            queue: VecDeque::new(),
            aliases: IndexMap::new(),
            line_count: 0,
            done: false,
        }
    }

    pub fn aliases(&self) -> &IndexMap<String, Reg> {
        &self.aliases
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if let Some(tok) = self.queue.pop_front() {
                return Some(tok);
            }
            if self.done {
                return None;
            }
            match self.lines.next() {
                Some((idx, line)) => {
                    self.line_count = idx + 1;
                    let tokens = LineLexer::new(line, idx + 1, &self.aliases).parse();
                    for tok in &tokens {
                        if let TokenKind::Directive(Directive::Alias(reg, name)) = &tok.kind {
                            self.aliases.insert(name.clone(), *reg);
                        }
                    }
                    self.queue.extend(tokens);
                }
                None => {
                    self.done = true;
                    let pos = Pos {
                        line: self.line_count + 1,
                        col: 1,
                    };
                    self.queue.push_back(Token::new(TokenKind::Eof, pos));
                }
            }
        }
    }
}

pub struct LineLexer<'a> {
    iter: Peekable<CharIndices<'a>>,
    len: usize,
    line: usize,
    aliases: &'a IndexMap<String, Reg>,
}

impl<'a> LineLexer<'a> {
    pub fn new(code: &'a str, line: usize, aliases: &'a IndexMap<String, Reg>) -> Self {
        Self {
            iter: code.char_indices().peekable(),
            len: code.len(),
            line,
            aliases,
        }
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

impl<'a> LineLexer<'a> {
    fn peek(&mut self) -> Option<char> {
        self.iter.peek().map(|&(_, ch)| ch)
    }
    fn peek_nth(&self, n: usize) -> Option<char> {
        self.iter.clone().nth(n).map(|(_, ch)| ch)
    }
    fn consume(&mut self) -> Option<char> {
        self.iter.next().map(|(_, ch)| ch)
    }
    fn pos(&mut self) -> Pos {
        let idx = self.iter.peek().map(|&(idx, _)| idx).unwrap_or(self.len);
        Pos {
            line: self.line,
            col: idx + 1,
        }
    }
    fn skip_spaces(&mut self) {
        while let Some(_) = self.iter.next_if(|(_, ch)| *ch == ' ' || *ch == '\t') {}
    }
    fn take_while(&mut self, f: impl Fn(char) -> bool) -> String {
        let mut lexeme = String::new();
        while let Some((_, ch)) = self.iter.next_if(|(_, ch)| f(*ch)) {
            lexeme.push(ch);
        }
        lexeme
    }
    fn ident(&mut self) -> String {
        self.take_while(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    }
    fn colon(&mut self) -> Result<(), &'static str> {
        self.skip_spaces();
        match self.consume() {
            Some(':') => Ok(()),
            _ => Err(NAME_EXPECTED),
        }
    }
    fn comma(&mut self) -> Result<(), &'static str> {
        self.skip_spaces();
        match self.peek() {
            Some(',') => {
                self.consume();
                Ok(())
            }
            _ => Err(COMMA_EXPECTED),
        }
    }
    /// Numbers must be followed by a separator or the end of the line.
    fn terminator(&mut self, msg: &'static str) -> Result<(), &'static str> {
        match self.peek() {
            None | Some(' ' | '\t' | '\r' | ',' | ';' | ']') => Ok(()),
            _ => Err(msg),
        }
    }
}

fn is_number_start(ch: char) -> bool {
    ch.is_ascii_digit() || ch == '-' || ch == '\''
}

fn escape(ch: char) -> Option<char> {
    match ch {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        '0' => Some('\0'),
        'b' => Some('\x08'),
        '\\' => Some('\\'),
        '\'' => Some('\''),
        '"' => Some('"'),
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Parser
// ----------------------------------------------------------------------------

impl<'a> LineLexer<'a> {
    pub fn parse(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_spaces();
            let pos = self.pos();
            let Some(ch0) = self.peek() else {
                break;
            };

            let result = match ch0 {
                ';' => {
                    self.consume();
                    let comment = self.iter.by_ref().map(|(_, ch)| ch).collect::<String>();
                    Ok(TokenKind::Comment(comment.trim().to_string()))
                }
                '#' => self.constant(),
                '%' => self.variable(),
                '$' => self.string_def(),
                '.' => self.directive(),
                '\r' => {
                    self.consume();
                    continue;
                }
                ch if ch.is_ascii_alphabetic() || ch == '_' => self.statement(),
                _ => Err(OPCODE_EXPECTED),
            };

            match result {
                Ok(kind) => tokens.push(Token::new(kind, pos)),
                Err(msg) => {
                    let pos = self.pos();
                    tokens.push(Token::error(msg, pos));
                    break;
                }
            }
        }
        tokens
    }

    // LABEL:  or  OP[cc] operands
    fn statement(&mut self) -> Result<TokenKind, &'static str> {
        let name = self.ident();
        if self.peek() == Some(':') {
            self.consume();
            return Ok(TokenKind::Label(name));
        }
        self.opcode(&name).map(TokenKind::Opcode)
    }

    fn opcode(&mut self, name: &str) -> Result<Code, &'static str> {
        let op = Op::parse(name).map_err(|_| OPCODE_EXPECTED)?;
        let mut code = Code::new(op);

        if self.peek() == Some('[') {
            self.consume();
            let mut text = String::new();
            loop {
                match self.consume() {
                    Some(']') => break,
                    Some(ch) => text.push(ch),
                    None => return Err(INVALID_CONDITION),
                }
            }
            let cond = Cond::parse(&text).map_err(|_| INVALID_CONDITION)?;
            if !op.is_control() {
                return Err(INVALID_CONDITION);
            }
            code.cond = Some(cond);
        }

        match op.shape() {
            Shape::RR => {
                code.a = self.reg()?;
                self.comma()?;
                code.b = self.reg()?;
            }
            Shape::RI4 | Shape::RUI4 | Shape::RI => {
                code.a = self.reg()?;
                self.comma()?;
                code.imm = self.operand()?;
            }
            Shape::I8 | Shape::U8 | Shape::IL => code.imm = self.operand()?,
            Shape::R => code.a = self.reg()?,
            Shape::Nil => {}
        }
        Ok(code)
    }

    fn reg(&mut self) -> Result<Reg, &'static str> {
        self.skip_spaces();
        let name = self.ident();
        if name.is_empty() {
            return Err(REGISTER_NAME_EXPECTED);
        }
        if let Some(reg) = self.aliases.get(&name) {
            return Ok(*reg);
        }
        Reg::parse(&name).map_err(|_| REGISTER_NAME_EXPECTED)
    }

    fn operand(&mut self) -> Result<Operand, &'static str> {
        self.skip_spaces();
        match self.peek() {
            Some(ch) if is_number_start(ch) => self.number().map(Operand::Value),
            Some(sigil @ ('#' | '$' | '%')) => {
                self.consume();
                let name = self.ident();
                if name.is_empty() {
                    return Err(NAME_EXPECTED);
                }
                Ok(Operand::Symbol(format!("{sigil}{name}")))
            }
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => Ok(Operand::Symbol(self.ident())),
            _ => Err(NUMBER_OR_LABEL_EXPECTED),
        }
    }

    // #NAME: value
    fn constant(&mut self) -> Result<TokenKind, &'static str> {
        self.consume();
        let name = self.ident();
        if name.is_empty() {
            return Err(NAME_EXPECTED);
        }
        self.colon()?;
        self.skip_spaces();
        match self.peek() {
            Some(ch) if is_number_start(ch) => {
                Ok(TokenKind::Const(format!("#{name}"), self.number()?))
            }
            _ => Err(NUMBER_EXPECTED),
        }
    }

    // %NAME: size
    fn variable(&mut self) -> Result<TokenKind, &'static str> {
        self.consume();
        let name = self.ident();
        if name.is_empty() {
            return Err(NAME_EXPECTED);
        }
        self.colon()?;
        self.skip_spaces();
        let size = match self.peek() {
            Some('#') => {
                self.consume();
                let cname = self.ident();
                if cname.is_empty() {
                    return Err(CONSTANT_EXPECTED);
                }
                Operand::Symbol(format!("#{cname}"))
            }
            Some(ch) if is_number_start(ch) => match self.number()? {
                v if v < 0 => return Err(NUMBER_EXPECTED),
                v => Operand::Value(v),
            },
            _ => return Err(CONSTANT_EXPECTED),
        };
        Ok(TokenKind::Var(format!("%{name}"), size))
    }

    // $NAME: "text"
    fn string_def(&mut self) -> Result<TokenKind, &'static str> {
        self.consume();
        let name = self.ident();
        if name.is_empty() {
            return Err(NAME_EXPECTED);
        }
        self.colon()?;
        self.skip_spaces();
        Ok(TokenKind::Str(format!("${name}"), self.string()?))
    }

    fn directive(&mut self) -> Result<TokenKind, &'static str> {
        self.consume();
        let name = self.take_while(|ch| ch.is_ascii_alphabetic());
        let kind = DIRECTIVES
            .get_by_left(name.to_ascii_uppercase().as_str())
            .copied()
            .ok_or(DIRECTIVE_EXPECTED)?;

        let directive = match kind {
            DirectiveKind::Org => Directive::Org(self.operand()?),
            DirectiveKind::Data => Directive::Data(self.operand()?),
            DirectiveKind::Alias => {
                let reg = self.reg()?;
                self.comma()?;
                self.skip_spaces();
                let alias = self.ident();
                if alias.is_empty() {
                    return Err(ALIAS_EXPECTED);
                }
                Directive::Alias(reg, alias)
            }
            DirectiveKind::Text => {
                self.skip_spaces();
                Directive::Text(self.string()?)
            }
            DirectiveKind::Header(scope) => {
                self.skip_spaces();
                let text = self.string()?;
                if text.len() > 255 {
                    return Err(STRING_TOO_LONG);
                }
                Directive::Header(scope, text)
            }
        };
        Ok(TokenKind::Directive(directive))
    }

    // "hoge\nfuga"
    fn string(&mut self) -> Result<String, &'static str> {
        if self.peek() != Some('"') {
            return Err(STRING_EXPECTED);
        }
        self.consume();
        let mut lexeme = String::new();
        loop {
            match self.consume() {
                None => return Err(STRING_EXPECTED),
                Some('"') => break,
                Some('\\') => match self.consume().and_then(escape) {
                    Some(ch) => lexeme.push(ch),
                    None => return Err(STRING_EXPECTED),
                },
                Some(ch) => lexeme.push(ch),
            }
        }
        Ok(lexeme)
    }

    fn number(&mut self) -> Result<i32, &'static str> {
        match (self.peek(), self.peek_nth(1)) {
            (Some('\''), _) => self.char_literal(),
            (Some('0'), Some('x' | 'X')) => {
                self.consume();
                self.consume();
                let digits = self.take_while(|ch| ch.is_ascii_hexdigit());
                if digits.is_empty() || digits.len() > 4 {
                    return Err(HEX_NUMBER_EXPECTED);
                }
                self.terminator(HEX_NUMBER_EXPECTED)?;
                i32::from_str_radix(&digits, 16).map_err(|_| HEX_NUMBER_EXPECTED)
            }
            (Some('0'), Some('b' | 'B')) => {
                self.consume();
                self.consume();
                let digits = self.take_while(|ch| ch == '0' || ch == '1');
                if digits.is_empty() || digits.len() > 16 {
                    return Err(BINARY_NUMBER_EXPECTED);
                }
                self.terminator(BINARY_NUMBER_EXPECTED)?;
                i32::from_str_radix(&digits, 2).map_err(|_| BINARY_NUMBER_EXPECTED)
            }
            _ => {
                let negative = self.peek() == Some('-');
                if negative {
                    self.consume();
                }
                let digits = self.take_while(|ch| ch.is_ascii_digit());
                if digits.is_empty() || digits.len() > 5 {
                    return Err(DECIMAL_NUMBER_EXPECTED);
                }
                self.terminator(DECIMAL_NUMBER_EXPECTED)?;
                let v: i32 = digits.parse().map_err(|_| DECIMAL_NUMBER_EXPECTED)?;
                Ok(if negative { -v } else { v })
            }
        }
    }

    // 'c' or '\n'
    fn char_literal(&mut self) -> Result<i32, &'static str> {
        self.consume();
        let ch = match self.consume() {
            Some('\\') => self.consume().and_then(escape).ok_or(NUMBER_EXPECTED)?,
            Some('\'') | None => return Err(NUMBER_EXPECTED),
            Some(ch) => ch,
        };
        if self.consume() != Some('\'') {
            return Err(NUMBER_EXPECTED);
        }
        self.terminator(NUMBER_EXPECTED)?;
        Ok(ch as i32)
    }
}

/// Parse a complete numeric literal (`-12`, `0x1F`, `0b101`, `'c'`).
pub fn parse_number(text: &str) -> Result<i32, &'static str> {
    let aliases = IndexMap::new();
    let mut lexer = LineLexer::new(text.trim(), 0, &aliases);
    match lexer.peek() {
        Some(ch) if is_number_start(ch) => {}
        _ => return Err(NUMBER_EXPECTED),
    }
    let v = lexer.number()?;
    match lexer.peek() {
        None => Ok(v),
        Some(_) => Err(NUMBER_EXPECTED),
    }
}
