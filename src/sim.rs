//! Simulation of networks and fault simulation

mod pattern_sim;

pub use pattern_sim::PatternSimulator;

use crate::fault::{Fault, FaultId};
use crate::tv::TestVector;
use crate::value::Value3;
use crate::{Network, Signal};

/// Fault simulation engine used by test generation
pub trait FaultSimulator {
    /// Set the faults to simulate
    fn set_faults(&mut self, faults: &[(FaultId, Fault)]);

    /// Simulate up to [`WORD_BITS`](crate::value::WORD_BITS) vectors, and return for each of them
    /// the faults it detects
    fn run(&mut self, network: &Network, vectors: &[&TestVector]) -> Vec<Vec<FaultId>>;

    /// Simulate a single vector
    fn run_single(&mut self, network: &Network, tv: &TestVector) -> Vec<FaultId> {
        self.run(network, &[tv]).pop().unwrap_or_default()
    }
}

/// Simulate a combinatorial network on a single vector, and return the output values
pub fn simulate(network: &Network, tv: &TestVector) -> Vec<Value3> {
    assert!(network.is_comb());
    assert_eq!(network.nb_inputs(), tv.len());
    let mut values = Vec::with_capacity(network.nb_nodes());
    let value = |values: &[Value3], s: Signal| -> Value3 {
        let v = if s.is_constant() {
            Value3::Zero
        } else if s.is_input() {
            tv.get(s.input() as usize)
        } else {
            values[s.var() as usize]
        };
        if s.is_inverted() {
            !v
        } else {
            v
        }
    };
    for i in 0..network.nb_nodes() {
        let g = network.gate(i);
        let deps = g.dependencies();
        let v = g.eval(|p| value(&values, deps[p]));
        values.push(v);
    }
    (0..network.nb_outputs())
        .map(|o| value(&values, network.output(o)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Gate;

    #[test]
    fn test_simulate() {
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let c = net.add_input();
        let m = net.add(Gate::maj(a, b, !c));
        let x = net.xor(m, c);
        net.add_output(x);
        net.add_output(!m);
        net.add_output(Signal::one());

        let mut tv = TestVector::new(3);
        assert!(tv.parse_binary("110"));
        assert_eq!(
            simulate(&net, &tv),
            vec![Value3::One, Value3::Zero, Value3::One]
        );
        // A majority of known values is enough
        assert!(tv.parse_binary("11X"));
        assert_eq!(
            simulate(&net, &tv),
            vec![Value3::X, Value3::Zero, Value3::One]
        );
    }
}
