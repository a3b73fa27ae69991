//! Ternary (0/1/X) logic values
//!
//! [`Value3`] is the canonical representation of a single value.
//! [`PackedVal3`] holds [`WORD_BITS`] independent values in two machine words, and is what
//! pattern-parallel simulation and test vectors work on:
//!
//! | value | pat0 | pat1 |
//! |-------|------|------|
//! | 0     | 1    | 0    |
//! | 1     | 0    | 1    |
//! | X     | 0    | 0    |
//!
//! The fourth combination (both bits set) has no meaning. The operations never produce it
//! from valid operands, and constructors check that it does not appear.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Not};

use crate::network::LogicValue;

/// A machine word of binary values, one per lane
pub type PackedVal = u64;

/// Number of lanes in a [`PackedVal`]
pub const WORD_BITS: usize = PackedVal::BITS as usize;

/// Word with every lane at 0
pub const ALL0: PackedVal = 0;

/// Word with every lane at 1
pub const ALL1: PackedVal = !0;

/// A ternary logic value
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Value3 {
    /// Logic 0
    Zero,
    /// Logic 1
    One,
    /// Unknown or unassigned
    #[default]
    X,
}

impl Value3 {
    /// Returns true for 0 and 1
    pub fn is_determined(self) -> bool {
        self != Value3::X
    }

    /// Binary value, if determined
    pub fn to_bool(self) -> Option<bool> {
        match self {
            Value3::Zero => Some(false),
            Value3::One => Some(true),
            Value3::X => None,
        }
    }

    /// Character used in pattern files
    pub fn to_char(self) -> char {
        match self {
            Value3::Zero => '0',
            Value3::One => '1',
            Value3::X => 'X',
        }
    }

    /// Parse a pattern file character; both cases of x are accepted
    pub fn from_char(c: char) -> Option<Value3> {
        match c {
            '0' => Some(Value3::Zero),
            '1' => Some(Value3::One),
            'x' | 'X' => Some(Value3::X),
            _ => None,
        }
    }
}

impl From<bool> for Value3 {
    fn from(b: bool) -> Value3 {
        if b {
            Value3::One
        } else {
            Value3::Zero
        }
    }
}

impl Not for Value3 {
    type Output = Value3;
    fn not(self) -> Value3 {
        match self {
            Value3::Zero => Value3::One,
            Value3::One => Value3::Zero,
            Value3::X => Value3::X,
        }
    }
}

impl BitAnd for Value3 {
    type Output = Value3;
    fn bitand(self, rhs: Value3) -> Value3 {
        use Value3::*;
        match (self, rhs) {
            (Zero, _) | (_, Zero) => Zero,
            (One, One) => One,
            _ => X,
        }
    }
}

impl BitOr for Value3 {
    type Output = Value3;
    fn bitor(self, rhs: Value3) -> Value3 {
        !(!self & !rhs)
    }
}

impl BitXor for Value3 {
    type Output = Value3;
    fn bitxor(self, rhs: Value3) -> Value3 {
        match (self.to_bool(), rhs.to_bool()) {
            (Some(a), Some(b)) => Value3::from(a ^ b),
            _ => Value3::X,
        }
    }
}

impl LogicValue for Value3 {
    fn constant(b: bool) -> Self {
        Value3::from(b)
    }
}

impl fmt::Display for Value3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// [`WORD_BITS`] ternary values, packed in two words
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct PackedVal3 {
    pat0: PackedVal,
    pat1: PackedVal,
}

impl PackedVal3 {
    /// Build from the lanes that are 0 and the lanes that are 1
    pub fn new(pat0: PackedVal, pat1: PackedVal) -> PackedVal3 {
        let ret = PackedVal3 { pat0, pat1 };
        debug_assert!(ret.is_valid(), "Lanes {:#x} are both 0 and 1", pat0 & pat1);
        ret
    }

    /// All lanes unknown
    pub fn all_x() -> PackedVal3 {
        PackedVal3 {
            pat0: ALL0,
            pat1: ALL0,
        }
    }

    /// Fully determined value from a binary word
    pub fn from_binary(pat: PackedVal) -> PackedVal3 {
        PackedVal3 {
            pat0: !pat,
            pat1: pat,
        }
    }

    /// The same value in every lane
    pub fn splat(v: Value3) -> PackedVal3 {
        match v {
            Value3::Zero => PackedVal3::from_binary(ALL0),
            Value3::One => PackedVal3::from_binary(ALL1),
            Value3::X => PackedVal3::all_x(),
        }
    }

    /// Lanes whose value is 0 (raw word)
    pub fn pat0(&self) -> PackedVal {
        self.pat0
    }

    /// Lanes whose value is 1 (raw word)
    pub fn pat1(&self) -> PackedVal {
        self.pat1
    }

    /// Check that no lane uses the meaningless fourth encoding
    pub fn is_valid(&self) -> bool {
        self.pat0 & self.pat1 == 0
    }

    /// Lanes at X
    pub fn extract_x(&self) -> PackedVal {
        !(self.pat0 | self.pat1)
    }

    /// Lanes at 0 or 1
    pub fn extract_determined(&self) -> PackedVal {
        self.pat0 | self.pat1
    }

    /// Lanes where the encoding differs from another value
    pub fn diff(&self, other: &PackedVal3) -> PackedVal {
        (self.pat0 ^ other.pat0) | (self.pat1 ^ other.pat1)
    }

    /// Value of a single lane
    pub fn get(&self, lane: usize) -> Value3 {
        debug_assert!(lane < WORD_BITS);
        let b0 = (self.pat0 >> lane) & 1 != 0;
        let b1 = (self.pat1 >> lane) & 1 != 0;
        match (b0, b1) {
            (true, false) => Value3::Zero,
            (false, true) => Value3::One,
            (false, false) => Value3::X,
            (true, true) => panic!("Invalid ternary encoding in lane {lane}"),
        }
    }

    /// Change a single lane
    pub fn set(&mut self, lane: usize, v: Value3) {
        debug_assert!(lane < WORD_BITS);
        self.set_with_mask(&PackedVal3::splat(v), 1 << lane);
    }

    /// Copy the lanes selected by the mask from another value
    pub fn set_with_mask(&mut self, src: &PackedVal3, mask: PackedVal) {
        self.pat0 = (self.pat0 & !mask) | (src.pat0 & mask);
        self.pat1 = (self.pat1 & !mask) | (src.pat1 & mask);
    }

    /// Lane-wise if-then-else: lanes of `a` where `sel` is 1, lanes of `b` elsewhere
    pub fn ite(sel: PackedVal, a: &PackedVal3, b: &PackedVal3) -> PackedVal3 {
        PackedVal3 {
            pat0: (sel & a.pat0) | (!sel & b.pat0),
            pat1: (sel & a.pat1) | (!sel & b.pat1),
        }
    }
}

impl Not for PackedVal3 {
    type Output = PackedVal3;
    fn not(self) -> PackedVal3 {
        PackedVal3 {
            pat0: self.pat1,
            pat1: self.pat0,
        }
    }
}

impl BitAndAssign for PackedVal3 {
    fn bitand_assign(&mut self, rhs: PackedVal3) {
        self.pat0 |= rhs.pat0;
        self.pat1 &= rhs.pat1;
    }
}

impl BitOrAssign for PackedVal3 {
    fn bitor_assign(&mut self, rhs: PackedVal3) {
        self.pat0 &= rhs.pat0;
        self.pat1 |= rhs.pat1;
    }
}

impl BitXorAssign for PackedVal3 {
    fn bitxor_assign(&mut self, rhs: PackedVal3) {
        // (self & !rhs) | (!self & rhs)
        let a = self.pat0 | rhs.pat1;
        let b = self.pat1 & rhs.pat0;
        let c = self.pat1 | rhs.pat0;
        let d = self.pat0 & rhs.pat1;
        self.pat0 = a & c;
        self.pat1 = b | d;
    }
}

impl BitAnd for PackedVal3 {
    type Output = PackedVal3;
    fn bitand(mut self, rhs: PackedVal3) -> PackedVal3 {
        self &= rhs;
        self
    }
}

impl BitOr for PackedVal3 {
    type Output = PackedVal3;
    fn bitor(mut self, rhs: PackedVal3) -> PackedVal3 {
        self |= rhs;
        self
    }
}

impl BitXor for PackedVal3 {
    type Output = PackedVal3;
    fn bitxor(mut self, rhs: PackedVal3) -> PackedVal3 {
        self ^= rhs;
        self
    }
}

impl LogicValue for PackedVal3 {
    fn constant(b: bool) -> Self {
        PackedVal3::splat(Value3::from(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALUES: [Value3; 3] = [Value3::Zero, Value3::One, Value3::X];

    /// Every combination of two ternary values, one per lane
    fn pairs() -> (PackedVal3, PackedVal3) {
        let mut a = PackedVal3::all_x();
        let mut b = PackedVal3::all_x();
        for (i, va) in VALUES.iter().enumerate() {
            for (j, vb) in VALUES.iter().enumerate() {
                a.set(3 * i + j, *va);
                b.set(3 * i + j, *vb);
            }
        }
        (a, b)
    }

    #[test]
    fn test_lanes() {
        let mut p = PackedVal3::all_x();
        for lane in [0, 1, 17, 63] {
            for v in VALUES {
                p.set(lane, v);
                assert_eq!(p.get(lane), v);
            }
        }
        assert!(p.is_valid());
        let b = PackedVal3::from_binary(0b101);
        assert_eq!(b.get(0), Value3::One);
        assert_eq!(b.get(1), Value3::Zero);
        assert_eq!(b.extract_determined(), ALL1);
        assert_eq!(PackedVal3::all_x().extract_x(), ALL1);
    }

    #[test]
    fn test_lanes_match_scalar() {
        let (a, b) = pairs();
        for i in 0..9 {
            let (va, vb) = (a.get(i), b.get(i));
            assert_eq!((a & b).get(i), va & vb);
            assert_eq!((a | b).get(i), va | vb);
            assert_eq!((a ^ b).get(i), va ^ vb);
            assert_eq!((!a).get(i), !va);
        }
        assert!((a & b).is_valid());
        assert!((a | b).is_valid());
        assert!((a ^ b).is_valid());
    }

    #[test]
    fn test_laws() {
        let (x, y) = pairs();
        assert_eq!(!!x, x);
        assert_eq!(x & x, x);
        assert_eq!(x | x, x);
        assert_eq!(!(x & y), !x | !y);
        assert_eq!(!(x | y), !x & !y);
        assert_eq!(PackedVal3::ite(ALL1, &x, &y), x);
        assert_eq!(PackedVal3::ite(ALL0, &x, &y), y);
    }

    #[test]
    fn test_scalar_tables() {
        use Value3::*;
        assert_eq!(Zero & X, Zero);
        assert_eq!(One & X, X);
        assert_eq!(One | X, One);
        assert_eq!(Zero | X, X);
        assert_eq!(One ^ X, X);
        assert_eq!(One ^ One, Zero);
        assert_eq!(!X, X);
    }

    #[test]
    fn test_mask_and_diff() {
        let a = PackedVal3::from_binary(0b0011);
        let mut b = PackedVal3::all_x();
        b.set_with_mask(&a, 0b0110);
        assert_eq!(b.get(0), Value3::X);
        assert_eq!(b.get(1), Value3::One);
        assert_eq!(b.get(2), Value3::Zero);
        assert_eq!(b.get(3), Value3::X);
        assert_eq!(a.diff(&b) & 0xf, 0b1001);
        assert_eq!(a.diff(&a), 0);
    }

    #[test]
    fn test_chars() {
        for v in VALUES {
            assert_eq!(Value3::from_char(v.to_char()), Some(v));
        }
        assert_eq!(Value3::from_char('x'), Some(Value3::X));
        assert_eq!(Value3::from_char('2'), None);
    }
}
