use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};
use std::slice;

use itertools::Itertools;
use volute::Lut;

use crate::network::signal::Signal;

/// Basic types of 2-input gates
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum BinaryType {
    /// 2-input And gate
    And,
    /// 2-input Xor gate
    Xor,
}

/// Basic types of 3-input gates
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum TernaryType {
    /// 3-input And gate
    And,
    /// 3-input Xor gate
    Xor,
    /// Majority gate (a + b + c >= 2)
    Maj,
    /// Multiplexer a ? b : c
    Mux,
}

/// Basic types of N-input gates
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum NaryType {
    /// N-input And gate
    And,
    /// N-input Or gate
    Or,
    /// N-input Nand gate
    Nand,
    /// N-input Nor gate
    Nor,
    /// N-input Xor gate
    Xor,
    /// N-input Xnor gate
    Xnor,
}

/// Lut gate: an arbitrary function given by its truth table
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct LutGate {
    /// Inputs of the Lut, in truth table order
    pub inputs: Box<[Signal]>,
    /// Truth table
    pub lut: Lut,
}

/// Logic gate representation
///
/// Each gate has a single output. Inputs are signals, and may be inverted:
/// the value seen on an input pin is the value of the signal, inversion included.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum Gate {
    /// Arbitrary 2-input gate (And/Xor)
    Binary([Signal; 2], BinaryType),
    /// Arbitrary 3-input gate (And/Xor/Mux/Maj)
    Ternary([Signal; 3], TernaryType),
    /// Arbitrary N-input gate (And/Or/Xor/Nand/Nor/Xnor)
    Nary(Box<[Signal]>, NaryType),
    /// Buf or Not
    Buf(Signal),
    /// D flip-flop with enable and reset
    Dff([Signal; 3]),
    /// Lut
    Lut(Box<LutGate>),
}

/// Values that gates can be evaluated on
///
/// Implemented for plain booleans, for ternary values and for their bit-parallel versions,
/// so that the same gate definition serves simulation, implication and fault collapsing.
pub trait LogicValue:
    Copy
    + Not<Output = Self>
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
{
    /// Constant value, replicated if the type is bit-parallel
    fn constant(b: bool) -> Self;
}

impl LogicValue for bool {
    fn constant(b: bool) -> Self {
        b
    }
}

impl LogicValue for u64 {
    fn constant(b: bool) -> Self {
        if b {
            !0
        } else {
            0
        }
    }
}

/// Maximum number of inputs for which cofactors are computed by enumeration
const MAX_COFACTOR_INPUTS: usize = 16;

impl Gate {
    /// Create a 2-input And
    pub fn and(a: Signal, b: Signal) -> Gate {
        Gate::Binary([a, b], BinaryType::And)
    }

    /// Create a 2-input Xor
    pub fn xor(a: Signal, b: Signal) -> Gate {
        Gate::Binary([a, b], BinaryType::Xor)
    }

    /// Create a n-input gate
    pub fn nary(v: &[Signal], tp: NaryType) -> Gate {
        Gate::Nary(v.into(), tp)
    }

    /// Create a Mux
    pub fn mux(s: Signal, a: Signal, b: Signal) -> Gate {
        Gate::Ternary([s, a, b], TernaryType::Mux)
    }

    /// Create a Maj
    pub fn maj(a: Signal, b: Signal, c: Signal) -> Gate {
        Gate::Ternary([a, b, c], TernaryType::Maj)
    }

    /// Create a Dff
    pub fn dff(d: Signal, en: Signal, res: Signal) -> Gate {
        Gate::Dff([d, en, res])
    }

    /// Create a n-input Lut
    pub fn lut(v: &[Signal], lut: Lut) -> Gate {
        assert_eq!(v.len(), lut.num_vars());
        Gate::Lut(Box::new(LutGate {
            inputs: v.into(),
            lut,
        }))
    }

    /// Obtain all signals feeding this gate
    pub fn dependencies(&self) -> &[Signal] {
        use Gate::*;
        match self {
            Binary(s, _) => s,
            Ternary(s, _) => s,
            Nary(v, _) => v,
            Dff(s) => s,
            Buf(s) => slice::from_ref(s),
            Lut(lut) => lut.inputs.as_ref(),
        }
    }

    /// Number of input pins
    pub fn nb_pins(&self) -> usize {
        self.dependencies().len()
    }

    /// Obtain all gates feeding this gate (not inputs or constants)
    pub fn vars(&self) -> impl Iterator<Item = u32> + '_ {
        self.dependencies()
            .iter()
            .filter(|s| s.is_var())
            .map(|s| s.var())
    }

    /// Returns whether the gate is combinatorial
    pub fn is_comb(&self) -> bool {
        !matches!(self, Gate::Dff(_))
    }

    /// Returns whether the gate is a Xor or Xnor of any arity
    pub fn is_xor_like(&self) -> bool {
        matches!(
            self,
            Gate::Binary(_, BinaryType::Xor)
                | Gate::Ternary(_, TernaryType::Xor)
                | Gate::Nary(_, NaryType::Xor)
                | Gate::Nary(_, NaryType::Xnor)
        )
    }

    /// For And, Or, Nand and Nor gates, the controlling input value and the output it forces
    ///
    /// Returns None for other gates, where no single input value determines the output.
    pub fn controlling_value(&self) -> Option<(bool, bool)> {
        use Gate::*;
        match self {
            Binary(_, BinaryType::And) | Ternary(_, TernaryType::And) | Nary(_, NaryType::And) => {
                Some((false, false))
            }
            Nary(_, NaryType::Nand) => Some((false, true)),
            Nary(_, NaryType::Or) => Some((true, true)),
            Nary(_, NaryType::Nor) => Some((true, false)),
            _ => None,
        }
    }

    /// Evaluate the gate, given the value seen on each input pin
    pub fn eval<V: LogicValue, F: Fn(usize) -> V>(&self, pin: F) -> V {
        use Gate::*;
        match self {
            Binary(_, BinaryType::And) | Ternary(_, TernaryType::And) => {
                and_n(self.nb_pins(), &pin)
            }
            Binary(_, BinaryType::Xor) | Ternary(_, TernaryType::Xor) => {
                xor_n(self.nb_pins(), &pin)
            }
            Ternary(_, TernaryType::Maj) => {
                let (a, b, c) = (pin(0), pin(1), pin(2));
                (a & b) | (a & c) | (b & c)
            }
            Ternary(_, TernaryType::Mux) => {
                let s = pin(0);
                (s & pin(1)) | (!s & pin(2))
            }
            Nary(v, tp) => match tp {
                NaryType::And => and_n(v.len(), &pin),
                NaryType::Nand => !and_n(v.len(), &pin),
                NaryType::Or => !and_n(v.len(), &|i| !pin(i)),
                NaryType::Nor => and_n(v.len(), &|i| !pin(i)),
                NaryType::Xor => xor_n(v.len(), &pin),
                NaryType::Xnor => !xor_n(v.len(), &pin),
            },
            Buf(_) => pin(0),
            Lut(lut) => {
                // Sum of minterms; exact for binary values, conservative for unknowns
                let mut ret = V::constant(false);
                for mask in 0..lut.lut.num_bits() {
                    if !lut.lut.value(mask) {
                        continue;
                    }
                    let mut term = V::constant(true);
                    for i in 0..lut.inputs.len() {
                        let v = pin(i);
                        term = term & if (mask >> i) & 1 != 0 { v } else { !v };
                    }
                    ret = ret | term;
                }
                ret
            }
            Dff(_) => panic!("Flip-flops cannot be evaluated as combinatorial logic"),
        }
    }

    /// Value the gate output collapses to when input pin `pos` is fixed to `value`
    ///
    /// Returns None if the output still depends on the other inputs.
    /// Gates with many inputs are not analyzed and return None.
    pub fn cofactor(&self, pos: usize, value: bool) -> Option<bool> {
        let n = self.nb_pins();
        assert!(pos < n, "Pin {pos} out of range for a {n}-input gate");
        if let Some((ctrl, forced)) = self.controlling_value() {
            return if value == ctrl { Some(forced) } else { None };
        }
        if !self.is_comb() || n > MAX_COFACTOR_INPUTS {
            return None;
        }
        let mut seen = [false; 2];
        for mask in 0u32..(1 << (n - 1)) {
            let pin = |i: usize| -> bool {
                if i == pos {
                    value
                } else {
                    let b = if i < pos { i } else { i - 1 };
                    (mask >> b) & 1 != 0
                }
            };
            seen[self.eval(pin) as usize] = true;
            if seen[0] && seen[1] {
                return None;
            }
        }
        Some(seen[1])
    }
}

fn and_n<V: LogicValue>(n: usize, pin: &dyn Fn(usize) -> V) -> V {
    (0..n).fold(V::constant(true), |acc, i| acc & pin(i))
}

fn xor_n<V: LogicValue>(n: usize, pin: &dyn Fn(usize) -> V) -> V {
    (0..n).fold(V::constant(false), |acc, i| acc ^ pin(i))
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Gate::*;
        let joined = |sep: &str| self.dependencies().iter().join(sep);
        match self {
            Binary(_, BinaryType::And) | Ternary(_, TernaryType::And) => {
                write!(f, "{}", joined(" & "))
            }
            Binary(_, BinaryType::Xor) | Ternary(_, TernaryType::Xor) => {
                write!(f, "{}", joined(" ^ "))
            }
            Ternary([s, a, b], TernaryType::Mux) => write!(f, "{s} ? {a} : {b}"),
            Ternary([a, b, c], TernaryType::Maj) => write!(f, "Maj({a}, {b}, {c})"),
            Dff([d, en, res]) => {
                write!(f, "Dff({d}")?;
                if *en != Signal::one() {
                    write!(f, ", en={en}")?;
                }
                if *res != Signal::zero() {
                    write!(f, ", res={res}")?;
                }
                write!(f, ")")
            }
            Nary(_, tp) => match tp {
                NaryType::And => write!(f, "{}", joined(" & ")),
                NaryType::Or => write!(f, "{}", joined(" | ")),
                NaryType::Xor => write!(f, "{}", joined(" ^ ")),
                NaryType::Nand => write!(f, "!({})", joined(" & ")),
                NaryType::Nor => write!(f, "!({})", joined(" | ")),
                NaryType::Xnor => write!(f, "!({})", joined(" ^ ")),
            },
            Buf(s) => write!(f, "{s}"),
            Lut(lut) => write!(f, "{}({})", lut.lut, joined(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(n: u32) -> Vec<Signal> {
        (0..n).map(Signal::from_input).collect()
    }

    #[test]
    fn test_eval_bool() {
        let v = vars(3);
        let pins = |bits: u32| move |i: usize| (bits >> i) & 1 != 0;
        for bits in 0..8u32 {
            let a = bits & 1 != 0;
            let b = bits & 2 != 0;
            let c = bits & 4 != 0;
            assert_eq!(Gate::and(v[0], v[1]).eval(pins(bits)), a && b);
            assert_eq!(Gate::xor(v[0], v[1]).eval(pins(bits)), a ^ b);
            assert_eq!(
                Gate::maj(v[0], v[1], v[2]).eval(pins(bits)),
                (a as u8 + b as u8 + c as u8) >= 2
            );
            assert_eq!(
                Gate::mux(v[0], v[1], v[2]).eval(pins(bits)),
                if a { b } else { c }
            );
            assert_eq!(
                Gate::nary(&v, NaryType::Nor).eval(pins(bits)),
                !(a || b || c)
            );
            assert_eq!(
                Gate::nary(&v, NaryType::Xnor).eval(pins(bits)),
                !(a ^ b ^ c)
            );
        }
    }

    #[test]
    fn test_eval_lut() {
        let v = vars(3);
        // Majority truth table
        let g = Gate::lut(&v, Lut::from_hex_string(3, "e8").unwrap());
        let m = Gate::maj(v[0], v[1], v[2]);
        for bits in 0..8u32 {
            let pin = |i: usize| (bits >> i) & 1 != 0;
            assert_eq!(g.eval(pin), m.eval(pin));
        }
        // Bit-parallel evaluation matches too
        let words = [0xaau64, 0xcc, 0xf0];
        assert_eq!(g.eval(|i| words[i]), m.eval(|i| words[i]));
        assert_eq!(g.eval(|i| words[i]) & 0xff, 0xe8);
    }

    #[test]
    fn test_cofactor() {
        let v = vars(3);
        let and = Gate::nary(&v, NaryType::And);
        assert_eq!(and.cofactor(1, false), Some(false));
        assert_eq!(and.cofactor(1, true), None);
        let nor = Gate::nary(&v, NaryType::Nor);
        assert_eq!(nor.cofactor(0, true), Some(false));
        assert_eq!(nor.cofactor(0, false), None);
        let xor = Gate::xor(v[0], v[1]);
        assert_eq!(xor.cofactor(0, false), None);
        assert_eq!(xor.cofactor(1, true), None);
        let maj = Gate::maj(v[0], v[1], v[2]);
        assert_eq!(maj.cofactor(2, true), None);
        // An Or written as a Lut collapses like an Or
        let or = Gate::lut(&v[0..2], Lut::from_hex_string(2, "e").unwrap());
        assert_eq!(or.cofactor(0, true), Some(true));
        assert_eq!(or.cofactor(1, false), None);
        assert_eq!(Gate::Buf(v[0]).cofactor(0, true), Some(true));
    }

    #[test]
    fn test_display() {
        let v = vars(2);
        assert_eq!(format!("{}", Gate::and(v[0], !v[1])), "i0 & !i1");
        assert_eq!(format!("{}", Gate::nary(&v, NaryType::Nand)), "!(i0 & i1)");
        assert_eq!(format!("{}", Gate::Buf(!v[1])), "!i1");
    }
}
