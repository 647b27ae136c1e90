use arch::header::header_word;
use color_print::cformat;

use crate::{
    assembler::Assembler,
    lexer::header_keyword,
    token::{Directive, Operand, TokenKind},
};

fn hex_block(addr: u16, bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(8)
        .enumerate()
        .map(|(i, chunk)| {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
            format!("{:04X} {}", addr.wrapping_add((i * 8) as u16), hex.join(" "))
        })
        .collect()
}

/// Words are shown high byte first; data blocks keep memory order.
fn word_line(addr: u16, word: u16) -> String {
    let [hi, lo] = word.to_be_bytes();
    format!("{:04X} {:02X} {:02X}", addr, hi, lo)
}

fn counted(len: u16, text: &str) -> Vec<u8> {
    let mut bytes = len.to_le_bytes().to_vec();
    bytes.extend_from_slice(text.as_bytes());
    bytes
}

fn escape(text: &str) -> String {
    text.chars().flat_map(char::escape_default).collect()
}

/// Emitted view: address, then the word or data bytes.
pub fn listing(asm: &Assembler) -> String {
    let mut lines = Vec::new();
    for tok in asm.tokens() {
        let Some(addr) = tok.address else {
            continue;
        };
        match &tok.kind {
            TokenKind::Opcode(code) => {
                let inst = code.inst();
                let (word, il) = inst.encode();
                lines.push(format!("{}  {}", word_line(addr, word), inst.format()));
                if let Some(il) = il {
                    lines.push(word_line(addr.wrapping_add(2), il));
                }
            }
            TokenKind::Directive(Directive::Data(operand)) => {
                lines.push(word_line(addr, operand.value().unwrap_or(0) as u16));
            }
            TokenKind::Directive(Directive::Text(text)) => {
                lines.extend(hex_block(addr, text.as_bytes()));
            }
            TokenKind::Directive(Directive::Header(scope, text)) => {
                let bytes = counted(header_word(*scope, text.len()), text);
                lines.extend(hex_block(addr, &bytes));
            }
            TokenKind::Str(_, text) => {
                lines.extend(hex_block(addr, &counted(text.len() as u16, text)));
            }
            TokenKind::Var(_, size) => {
                let zeros = vec![0u8; size.value().unwrap_or(0).max(0) as usize];
                lines.extend(hex_block(addr, &zeros));
            }
            _ => {}
        }
    }
    lines.join("\n")
}

fn operand(operand: &Operand) -> String {
    match operand {
        Operand::Value(v) => format!("0x{:04X}", *v as u16),
        Operand::Symbol(name) => name.clone(),
    }
}

/// Symbolic view: one line per token, names kept.
pub fn dump(asm: &Assembler, color: bool) -> String {
    let mut lines = Vec::new();
    for tok in asm.tokens() {
        let addr = tok.address.unwrap_or(0);
        let line = match &tok.kind {
            TokenKind::Const(name, v) => match color {
                true => cformat!("<g>{}</>: {:04X}", name, *v as u16),
                false => format!("{}: {:04X}", name, *v as u16),
            },
            TokenKind::Label(name) => match color {
                true => cformat!("{:04X} <g,s>{}</>:", addr, name),
                false => format!("{:04X} {}:", addr, name),
            },
            TokenKind::Opcode(code) => match color {
                true => cformat!("{:04X}   {}", addr, code.inst().cformat()),
                false => format!("{:04X}   {}", addr, code.format()),
            },
            TokenKind::Var(name, size) => format!("{:04X} {}: {}", addr, name, operand(size)),
            TokenKind::Str(name, text) => format!("{:04X} {}: \"{}\"", addr, name, escape(text)),
            TokenKind::Comment(text) => match color {
                true => cformat!("<dim>; {}</>", text),
                false => format!("; {}", text),
            },
            TokenKind::Directive(directive) => {
                let text = match directive {
                    Directive::Org(v) => format!(".ORG {}", operand(v)),
                    Directive::Data(v) => format!(".DATA {}", operand(v)),
                    Directive::Alias(reg, name) => format!(".ALIAS {},{}", reg, name),
                    Directive::Text(text) => format!(".STRING \"{}\"", escape(text)),
                    Directive::Header(scope, text) => {
                        format!(".{} \"{}\"", header_keyword(*scope), escape(text))
                    }
                };
                format!("{:04X} {}", addr, text)
            }
            TokenKind::Error(msg) => match color {
                true => cformat!("<r,s>error</>: {}", msg),
                false => format!("error: {}", msg),
            },
            TokenKind::Eof => continue,
        };
        lines.push(line);
    }
    lines.join("\n")
}
