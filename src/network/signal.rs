use std::fmt;
use std::ops::{BitXor, BitXorAssign, Not};

/// Representation of a signal: a constant, a primary input or a gate output, possibly inverted
///
/// Inverters are implicit and occupy the lowest bit.
/// Primary inputs use the upper half of the index space, so that gates and inputs
/// can never be confused.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Default)]
pub struct Signal {
    a: u32,
}

const INPUT_FLAG: u32 = 0x8000_0000;

impl Signal {
    /// Constant zero signal
    pub fn zero() -> Signal {
        Signal { a: 0 }
    }

    /// Constant one signal
    pub fn one() -> Signal {
        Signal { a: 1 }
    }

    /// Create a signal from a gate index
    pub fn from_var(v: u32) -> Signal {
        debug_assert!(v < (INPUT_FLAG >> 1) - 1);
        Signal { a: (v + 1) << 1 }
    }

    /// Create a signal from a primary input index
    pub fn from_input(v: u32) -> Signal {
        debug_assert!(v < INPUT_FLAG >> 1);
        Signal {
            a: INPUT_FLAG | (v << 1),
        }
    }

    /// Gate index of the signal
    pub fn var(&self) -> u32 {
        assert!(self.is_var(), "{self} is not a gate output");
        (self.a >> 1) - 1
    }

    /// Primary input index of the signal
    pub fn input(&self) -> u32 {
        assert!(self.is_input(), "{self} is not a primary input");
        (self.a & !INPUT_FLAG) >> 1
    }

    /// Returns true if the signal is a constant
    pub fn is_constant(&self) -> bool {
        self.a >> 1 == 0
    }

    /// Returns true if the signal is a primary input
    pub fn is_input(&self) -> bool {
        self.a & INPUT_FLAG != 0
    }

    /// Returns true if the signal is a gate output
    pub fn is_var(&self) -> bool {
        !self.is_input() && !self.is_constant()
    }

    /// Returns true if the signal is complemented
    ///
    /// The constant one is the complement of zero.
    pub fn is_inverted(&self) -> bool {
        self.a & 1 != 0
    }

    /// The same signal without the implicit inverter
    pub fn without_inversion(&self) -> Signal {
        Signal { a: self.a & !1 }
    }

    /// Raw encoding, mostly useful for hashing and sorting
    pub fn raw(&self) -> u32 {
        self.a
    }
}

impl From<bool> for Signal {
    fn from(b: bool) -> Signal {
        Signal { a: b as u32 }
    }
}

impl Not for Signal {
    type Output = Signal;
    fn not(self) -> Signal {
        Signal { a: self.a ^ 1 }
    }
}

impl Not for &'_ Signal {
    type Output = Signal;
    fn not(self) -> Signal {
        !*self
    }
}

impl BitXorAssign<bool> for Signal {
    fn bitxor_assign(&mut self, rhs: bool) {
        self.a ^= rhs as u32;
    }
}

impl BitXor<bool> for Signal {
    type Output = Signal;
    fn bitxor(mut self, rhs: bool) -> Signal {
        self ^= rhs;
        self
    }
}

impl BitXor<bool> for &'_ Signal {
    type Output = Signal;
    fn bitxor(self, rhs: bool) -> Signal {
        *self ^ rhs
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_constant() {
            return write!(f, "{}", self.a & 1);
        }
        if self.is_inverted() {
            write!(f, "!")?;
        }
        if self.is_input() {
            write!(f, "i{}", self.input())
        } else {
            write!(f, "x{}", self.var())
        }
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(Signal::zero(), !Signal::one());
        assert_eq!(Signal::from(true), Signal::one());
        assert_eq!(Signal::from(false), Signal::zero());
        assert!(Signal::one().is_constant());
        assert!(!Signal::one().is_var());
        assert!(!Signal::one().is_input());
        assert_eq!(format!("{}", Signal::one()), "1");
    }

    #[test]
    fn test_kinds_are_disjoint() {
        for v in [0u32, 1, 7, 1000] {
            let g = Signal::from_var(v);
            let i = Signal::from_input(v);
            assert_ne!(g, i);
            assert!(g.is_var() && !g.is_input());
            assert!(i.is_input() && !i.is_var());
            assert_eq!(g.var(), v);
            assert_eq!(i.input(), v);
            assert_eq!((!g).var(), v);
            assert_eq!((!i).input(), v);
            assert_eq!((!i).without_inversion(), i);
            assert_eq!(format!("{}", !g), format!("!x{v}"));
            assert_eq!(format!("{}", i), format!("i{v}"));
        }
    }

    #[test]
    fn test_xor_bool() {
        let s = Signal::from_var(3);
        assert_eq!(s ^ false, s);
        assert_eq!(s ^ true, !s);
        assert!((s ^ true).is_inverted());
    }
}
