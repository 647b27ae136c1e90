use arch::bus::MemoryFault;
use color_print::cprintln;
use std::fmt;
use thiserror::Error;

use crate::{assembler::Phase, token::Pos};

/// Encoding slot an immediate did not fit into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    TinySigned,
    TinyUnsigned,
    ByteSigned,
    ByteUnsigned,
    Word,
}

impl RangeKind {
    pub fn bounds(&self) -> (i32, i32) {
        match self {
            RangeKind::TinySigned => (-8, 7),
            RangeKind::TinyUnsigned => (0, 15),
            RangeKind::ByteSigned => (-128, 127),
            RangeKind::ByteUnsigned => (0, 255),
            RangeKind::Word => (-32768, 65535),
        }
    }

    pub fn check(&self, v: i32) -> Result<i32, Error> {
        let (lo, hi) = self.bounds();
        match lo <= v && v <= hi {
            true => Ok(v),
            false => Err(Error::Range(*self, v)),
        }
    }
}

impl fmt::Display for RangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeKind::TinySigned => write!(f, "Tiny immediate range (-8 to 7) exceeded"),
            RangeKind::TinyUnsigned => {
                write!(f, "Tiny unsigned immediate range (0 to 15) exceeded")
            }
            RangeKind::ByteSigned => write!(f, "Immediate range (-128 to 127) exceeded"),
            RangeKind::ByteUnsigned => write!(f, "Unsigned immediate range (0 to 255) exceeded"),
            RangeKind::Word => write!(f, "Word range (-32768 to 65535) exceeded"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Lexical(String),

    #[error("Re-defined symbol: `{0}`")]
    Redefined(String),

    #[error("Undefined symbol: `{0}`")]
    Undefined(String),

    #[error("Constant expected: `{0}`")]
    ConstantExpected(String),

    #[error("{0}: {1}")]
    Range(RangeKind, i32),

    #[error("Address space exceeded: 0x{0:X}")]
    AddressOverflow(u32),

    #[error("{required:?} phase required, assembler is {current:?}")]
    PhaseOrder { required: Phase, current: Phase },

    #[error("Assembly failed with {0} error(s)")]
    Failed(usize),

    #[error(transparent)]
    Memory(#[from] MemoryFault),

    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to create file: {0}")]
    FileCreate(String, #[source] std::io::Error),

    #[error("Failed to write file: {0}")]
    FileWrite(String, #[source] std::io::Error),
}

/// One collected problem, tagged with the pass that found it.
#[derive(Debug)]
pub struct Diagnostic {
    pub phase: u8,
    pub pos: Pos,
    pub error: Error,
}

impl Diagnostic {
    /// Print with file location and the offending source line.
    pub fn print_diag(&self, file: &str, source: &str) {
        cprintln!("<red,bold>error</>: {}", self.error);
        cprintln!(
            "     <blue>--></> <underline>{}:{}:{}</>",
            file,
            self.pos.line,
            self.pos.col
        );
        cprintln!("      <blue>|</>");

        let line_content = source
            .lines()
            .nth(self.pos.line.saturating_sub(1))
            .unwrap_or("");

        cprintln!(" <blue>{:>4} |</> {}", self.pos.line, line_content);
        cprintln!(
            "      <blue>|</> {}<red,bold>^</>",
            " ".repeat(self.pos.col.saturating_sub(1))
        );
    }
}
