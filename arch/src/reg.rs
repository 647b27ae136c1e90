use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

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
pub enum Reg {
    #[default]
    #[strum(to_string = "0", serialize = "R0")]
    #[serde(rename = "0", alias = "R0")]
    R0,
    #[strum(to_string = "1", serialize = "R1")]
    #[serde(rename = "1", alias = "R1")]
    R1,
    #[strum(to_string = "2", serialize = "R2")]
    #[serde(rename = "2", alias = "R2")]
    R2,
    #[strum(to_string = "3", serialize = "R3")]
    #[serde(rename = "3", alias = "R3")]
    R3,
    #[strum(to_string = "4", serialize = "R4")]
    #[serde(rename = "4", alias = "R4")]
    R4,
    #[strum(to_string = "5", serialize = "R5")]
    #[serde(rename = "5", alias = "R5")]
    R5,
    #[strum(to_string = "6", serialize = "R6")]
    #[serde(rename = "6", alias = "R6")]
    R6,
    #[strum(to_string = "7", serialize = "R7")]
    #[serde(rename = "7", alias = "R7")]
    R7,
    A,
    B,
    I,
    CA,
    WA,
    SP,
    RS,
    PC,
}

impl Reg {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_ascii_uppercase().parse::<Self>() {
            Ok(r) => Ok(r),
            Err(_) => Err(format!("Unknown reg name: {s}")),
        }
    }

    /// Register held in a 4-bit operand field.
    pub fn field(n: u8) -> Self {
        Reg::from(n & 0x0F)
    }

    pub fn idx(self) -> usize {
        u8::from(self) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    macro_rules! test_reg {
        ($($name:ident: $text:expr => $reg:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(Reg::parse($text), Ok($reg));
                }
            )*
        }
    }

    test_reg! {
        parse_digit: "0" => Reg::R0,
        parse_prefixed: "r7" => Reg::R7,
        parse_acc: "A" => Reg::A,
        parse_lower: "sp" => Reg::SP,
        parse_rs: "RS" => Reg::RS,
        parse_pc: "pc" => Reg::PC,
    }

    #[test]
    fn unknown() {
        assert!(Reg::parse("R8").is_err());
        assert!(Reg::parse("X").is_err());
    }

    #[test]
    fn field_indices() {
        for (idx, reg) in Reg::iter().enumerate() {
            assert_eq!(reg.idx(), idx);
            assert_eq!(Reg::field(idx as u8), reg);
        }
        assert_eq!(Reg::A.idx(), 8);
        assert_eq!(Reg::PC.idx(), 15);
    }

    #[test]
    fn display_reparses() {
        for reg in Reg::iter() {
            assert_eq!(Reg::parse(&reg.to_string()), Ok(reg));
        }
        assert_eq!(Reg::R3.to_string(), "3");
    }
}
