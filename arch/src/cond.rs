use bimap::BiMap;
use num_enum::{FromPrimitive, IntoPrimitive};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Flag tested by a conditional control-flow instruction.
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
)]
#[repr(u8)]
pub enum Cc {
    /// Carry
    #[default]
    C,
    /// Zero
    Z,
    /// Parity (odd / overflow)
    P,
    /// Minus (sign)
    M,
}

static CC_NAME: Lazy<BiMap<&'static str, Cc>> = Lazy::new(|| {
    let mut map: BiMap<&'static str, Cc> = BiMap::new();
    map.insert("C", Cc::C);
    map.insert("Z", Cc::Z);
    map.insert("P", Cc::P);
    map.insert("M", Cc::M);
    map
});

impl Cc {
    pub fn name(&self) -> &'static str {
        CC_NAME.get_by_right(self).copied().unwrap_or("?")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cond {
    pub cc: Cc,
    pub invert: bool,
}

impl Cond {
    pub const APPLY_BIT: u16 = 13;
    pub const INVERT_BIT: u16 = 12;
    pub const CC_BITS: u16 = 10;
    /// All condition bits of a control-flow word.
    pub const MASK: u16 = 0x0F << Self::CC_BITS;

    pub fn new(cc: Cc, invert: bool) -> Self {
        Cond { cc, invert }
    }

    /// Parse the text between the brackets of `OP[NZ]`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let upper = s.to_ascii_uppercase();
        let (invert, name) = match upper.strip_prefix('N') {
            Some(rest) if !rest.is_empty() => (true, rest),
            _ => (false, upper.as_str()),
        };
        match CC_NAME.get_by_left(name) {
            Some(cc) => Ok(Cond::new(*cc, invert)),
            None => Err(format!("Invalid condition: {s}")),
        }
    }

    /// Bits 13..10 of a control-flow word.
    pub fn encode(&self) -> u16 {
        (1 << Self::APPLY_BIT)
            | ((self.invert as u16) << Self::INVERT_BIT)
            | ((u8::from(self.cc) as u16) << Self::CC_BITS)
    }

    pub fn decode(word: u16) -> Option<Self> {
        if word & 0x8000 == 0 || word & (1 << Self::APPLY_BIT) == 0 {
            return None;
        }
        let cc = Cc::from(((word >> Self::CC_BITS) & 0x03) as u8);
        let invert = word & (1 << Self::INVERT_BIT) != 0;
        Some(Cond::new(cc, invert))
    }
}

impl Display for Cond {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.invert {
            write!(f, "[N{}]", self.cc.name())
        } else {
            write!(f, "[{}]", self.cc.name())
        }
    }
}
