use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Dictionary scope of a header string.
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
    Display,
)]
#[repr(u8)]
pub enum Scope {
    #[default]
    Normal,
    Runtime,
    Immediate,
    Executive,
}

pub const HEADER_BIT: u16 = 15;
pub const SCOPE_BITS: u16 = 8;
pub const LEN_MASK: u16 = 0x00FF;

/// Header word written in front of a dictionary name.
pub fn header_word(scope: Scope, len: usize) -> u16 {
    (1 << HEADER_BIT) | ((u8::from(scope) as u16) << SCOPE_BITS) | (len as u16 & LEN_MASK)
}

/// Split a header word into scope and length; `None` if the marker bit is clear.
pub fn parse_header(word: u16) -> Option<(Scope, usize)> {
    if word & (1 << HEADER_BIT) == 0 {
        return None;
    }
    let scope = Scope::from(((word >> SCOPE_BITS) & 0x03) as u8);
    Some((scope, (word & LEN_MASK) as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        assert_eq!(header_word(Scope::Normal, 3), 0x8003);
        assert_eq!(header_word(Scope::Executive, 5), 0x8305);
        assert_eq!(parse_header(0x8205), Some((Scope::Immediate, 5)));
        assert_eq!(parse_header(0x0205), None);
    }
}
