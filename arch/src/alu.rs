use serde::{Deserialize, Serialize};

/// Condition flags. `o` doubles as overflow for arithmetic results and as
/// parity (odd) for boolean results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags {
    pub c: bool,
    pub z: bool,
    pub s: bool,
    pub o: bool,
}

impl Flags {
    /// Flags of a widened arithmetic result.
    pub fn arith(r: u32) -> Self {
        Flags {
            c: r & 0x1_0000 != 0,
            z: r & 0xFFFF == 0,
            s: r & 0x8000 != 0,
            o: r & 0xFFFF_0000 != 0,
        }
    }

    /// Flags of a boolean or shift result.
    pub fn boolean(r: u32) -> Self {
        Flags {
            c: r & 0x1_0000 != 0,
            z: r & 0xFFFF == 0,
            s: r & 0x8000 != 0,
            o: r & 0x01 != 0,
        }
    }
}

pub fn add(a: u16, b: i32) -> u32 {
    (a as u32).wrapping_add(b as u32)
}

pub fn sub(a: u16, b: i32) -> u32 {
    (a as u32).wrapping_sub(b as u32)
}

pub fn mul(a: u16, b: u16) -> u32 {
    a as u32 * b as u32
}

/// Logical left shift keeping the bits pushed out above bit 15.
pub fn sl(a: u16, n: u16) -> u32 {
    if n >= 32 {
        0
    } else {
        (a as u32) << n
    }
}

pub fn sr(a: u16, n: u16) -> u16 {
    if n >= 16 {
        0
    } else {
        a >> n
    }
}

pub fn rr(a: u16, n: u16) -> u16 {
    a.rotate_right((n % 16) as u32)
}

pub fn rl(a: u16, n: u16) -> u16 {
    a.rotate_left((n % 16) as u32)
}

/// Rotate right through carry, one bit per step.
pub fn rrc(mut a: u16, mut c: bool, n: u16) -> (u16, bool) {
    for _ in 0..(n % 17) {
        let out = a & 0x0001 != 0;
        a = (a >> 1) | if c { 0x8000 } else { 0 };
        c = out;
    }
    (a, c)
}

/// Rotate left through carry, one bit per step.
pub fn rlc(mut a: u16, mut c: bool, n: u16) -> (u16, bool) {
    for _ in 0..(n % 17) {
        let out = a & 0x8000 != 0;
        a = (a << 1) | c as u16;
        c = out;
    }
    (a, c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_carry() {
        let r = add(0x8000, 0x8000);
        assert_eq!(r as u16, 0);
        let f = Flags::arith(r);
        assert!(f.c);
        assert!(f.z);
        assert!(f.o);
    }

    #[test]
    fn add_negative_immediate() {
        let r = add(5, -2);
        assert_eq!(r as u16, 3);
        assert!(!Flags::arith(r).c);
    }

    #[test]
    fn sub_borrow() {
        let r = sub(3, 7);
        assert_eq!(r as u16 as i16, -4);
        assert!(Flags::arith(r).c);
        assert!(Flags::arith(r).s);
        let r = sub(0xAAAA, 0x1111);
        assert_eq!(r as u16, 0x9999);
        assert!(!Flags::arith(r).c);
    }

    #[test]
    fn mul_no_carry() {
        let r = mul(0x1111, 4);
        assert_eq!(r as u16, 0x4444);
        assert!(!Flags::arith(r).c);
    }

    #[test]
    fn parity() {
        assert!(Flags::boolean(0x0001).o);
        assert!(!Flags::boolean(0x0002).o);
        assert!(!Flags::arith(0x0001).o);
    }

    #[test]
    fn shifts() {
        assert_eq!(sl(0x8001, 1), 0x1_0002);
        assert!(Flags::boolean(sl(0x8001, 1)).c);
        assert_eq!(sr(0x8001, 1), 0x4000);
        assert_eq!(sr(0xFFFF, 16), 0);
        assert_eq!(rr(0x0001, 1), 0x8000);
        assert_eq!(rl(0x8000, 1), 0x0001);
        assert_eq!(rr(0x1234, 0), 0x1234);
    }

    #[test]
    fn through_carry() {
        assert_eq!(rrc(0x0001, false, 1), (0x0000, true));
        assert_eq!(rrc(0x0000, true, 1), (0x8000, false));
        assert_eq!(rlc(0x8000, false, 1), (0x0000, true));
        assert_eq!(rlc(0x0000, true, 1), (0x0001, false));
        let mut state = (0x1234, true);
        for _ in 0..17 {
            state = rlc(state.0, state.1, 1);
        }
        assert_eq!(state, (0x1234, true));
    }
}
