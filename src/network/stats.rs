//! Compute gate statistics
//!
//! ```
//! # use satpg::Network;
//! # let network = Network::new();
//! use satpg::network::stats::stats;
//! let stats = stats(&network);
//!
//! // Check that there is no flip-flop
//! assert_eq!(stats.nb_dff, 0);
//!
//! // Show the statistics
//! println!("{}", stats);
//! ```

use std::fmt;

use crate::network::{BinaryType, TernaryType};
use crate::{Gate, NaryType, Network};

/// Number of inputs, outputs and gates in a network
#[derive(Clone, Debug, Default)]
pub struct NetworkStats {
    /// Number of inputs
    pub nb_inputs: usize,
    /// Number of outputs
    pub nb_outputs: usize,
    /// Number of And and Nand gates
    pub nb_and: usize,
    /// Number of Or and Nor gates
    pub nb_or: usize,
    /// Arity of And, Nand, Or and Nor gates
    pub and_arity: Vec<usize>,
    /// Number of Xor and Xnor gates
    pub nb_xor: usize,
    /// Arity of Xor gates
    pub xor_arity: Vec<usize>,
    /// Number of Mux
    pub nb_mux: usize,
    /// Number of Maj
    pub nb_maj: usize,
    /// Number of Lut
    pub nb_lut: usize,
    /// Number of positive Buf
    pub nb_buf: usize,
    /// Number of Not (negative Buf)
    pub nb_not: usize,
    /// Number of Dff
    pub nb_dff: usize,
    /// Number of Dff with enable
    pub nb_dffe: usize,
    /// Number of Dff with reset
    pub nb_dffr: usize,
    /// Number of gate input pins, which bounds the number of input faults
    pub nb_pins: usize,
}

impl NetworkStats {
    /// Total number of gates, including Dff
    pub fn nb_gates(&self) -> usize {
        self.nb_and
            + self.nb_or
            + self.nb_xor
            + self.nb_mux
            + self.nb_maj
            + self.nb_lut
            + self.nb_buf
            + self.nb_not
            + self.nb_dff
    }

    /// Number of stuck-at faults before collapsing, for a combinatorial network
    pub fn nb_faults(&self) -> usize {
        2 * (self.nb_inputs + self.nb_gates() + self.nb_pins)
    }

    fn add_arity(arity: &mut Vec<usize>, sz: usize) {
        if arity.len() <= sz {
            arity.resize(sz + 1, 0);
        }
        arity[sz] += 1;
    }
}

impl fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stats:")?;
        writeln!(f, "  Inputs: {}", self.nb_inputs)?;
        writeln!(f, "  Outputs: {}", self.nb_outputs)?;
        writeln!(f, "  Gates: {}", self.nb_gates())?;
        if self.nb_dff != 0 {
            writeln!(f, "  Dff: {}", self.nb_dff)?;
            if self.nb_dffe != 0 {
                writeln!(f, "      enable: {}", self.nb_dffe)?;
            }
            if self.nb_dffr != 0 {
                writeln!(f, "      reset: {}", self.nb_dffr)?;
            }
        }
        if self.nb_and + self.nb_or != 0 {
            writeln!(f, "  And: {}", self.nb_and)?;
            writeln!(f, "  Or: {}", self.nb_or)?;
            for (i, nb) in self.and_arity.iter().enumerate() {
                if *nb != 0 {
                    writeln!(f, "      {}: {}", i, nb)?;
                }
            }
        }
        if self.nb_xor != 0 {
            writeln!(f, "  Xor: {}", self.nb_xor)?;
            for (i, nb) in self.xor_arity.iter().enumerate() {
                if *nb != 0 {
                    writeln!(f, "      {}: {}", i, nb)?;
                }
            }
        }
        if self.nb_mux != 0 {
            writeln!(f, "  Mux: {}", self.nb_mux)?;
        }
        if self.nb_maj != 0 {
            writeln!(f, "  Maj: {}", self.nb_maj)?;
        }
        if self.nb_lut != 0 {
            writeln!(f, "  Lut: {}", self.nb_lut)?;
        }
        if self.nb_not != 0 {
            writeln!(f, "  Not: {}", self.nb_not)?;
        }
        if self.nb_buf != 0 {
            writeln!(f, "  Buf: {}", self.nb_buf)?;
        }
        write!(f, "  Faults: {}", self.nb_faults())
    }
}

/// Compute the statistics of the network
pub fn stats(a: &Network) -> NetworkStats {
    use Gate::*;
    let mut ret = NetworkStats {
        nb_inputs: a.nb_inputs(),
        nb_outputs: a.nb_outputs(),
        ..Default::default()
    };
    for i in 0..a.nb_nodes() {
        let g = a.gate(i);
        if g.is_comb() {
            ret.nb_pins += g.nb_pins();
        }
        match g {
            Binary(_, BinaryType::And) | Ternary(_, TernaryType::And) => {
                ret.nb_and += 1;
                NetworkStats::add_arity(&mut ret.and_arity, g.nb_pins());
            }
            Binary(_, BinaryType::Xor) | Ternary(_, TernaryType::Xor) => {
                ret.nb_xor += 1;
                NetworkStats::add_arity(&mut ret.xor_arity, g.nb_pins());
            }
            Ternary(_, TernaryType::Mux) => ret.nb_mux += 1,
            Ternary(_, TernaryType::Maj) => ret.nb_maj += 1,
            Lut(_) => ret.nb_lut += 1,
            Buf(s) => {
                if s.is_inverted() {
                    ret.nb_not += 1;
                } else {
                    ret.nb_buf += 1;
                }
            }
            Dff([_, en, res]) => {
                ret.nb_dff += 1;
                if !en.is_constant() {
                    ret.nb_dffe += 1;
                }
                if !res.is_constant() {
                    ret.nb_dffr += 1;
                }
            }
            Nary(v, tp) => match tp {
                NaryType::And | NaryType::Nand => {
                    ret.nb_and += 1;
                    NetworkStats::add_arity(&mut ret.and_arity, v.len());
                }
                NaryType::Or | NaryType::Nor => {
                    ret.nb_or += 1;
                    NetworkStats::add_arity(&mut ret.and_arity, v.len());
                }
                NaryType::Xor | NaryType::Xnor => {
                    ret.nb_xor += 1;
                    NetworkStats::add_arity(&mut ret.xor_arity, v.len());
                }
            },
        }
    }

    ret
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultManager;

    #[test]
    fn test_fault_count() {
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let c = net.add_input();
        let x0 = net.and(a, b);
        let x1 = net.add(Gate::nary(&[x0, !c, a], NaryType::Nor));
        let x2 = net.add(Gate::Buf(!x1));
        net.add_output(x2);
        let s = stats(&net);
        assert_eq!(s.nb_gates(), 3);
        assert_eq!(s.nb_and, 1);
        assert_eq!(s.nb_or, 1);
        assert_eq!(s.nb_not, 1);
        assert_eq!(s.and_arity[2], 1);
        assert_eq!(s.and_arity[3], 1);

        let mut mgr = FaultManager::new();
        mgr.build(&net);
        assert_eq!(mgr.nb_faults(), s.nb_faults());
    }
}
