use std::cmp::Reverse;
use std::collections::BinaryHeap;

use log::trace;

use crate::fault::{Fault, FaultId};
use crate::network::Topology;
use crate::sim::FaultSimulator;
use crate::tv::TestVector;
use crate::value::{PackedVal, PackedVal3, WORD_BITS};
use crate::{Network, Signal};

/// Pattern-parallel, single fault propagation simulator on ternary values
///
/// Up to [`WORD_BITS`] vectors are simulated at once, one per lane. The fault-free circuit
/// is simulated once, then each fault is injected and only the modified nodes are
/// re-evaluated, lowest index first.
pub struct PatternSimulator {
    topo: Topology,
    faults: Vec<(FaultId, Fault)>,
    /// Fault-free values, one per node
    good: Vec<PackedVal3>,
    /// Values with the current fault injected
    faulty: Vec<PackedVal3>,
    /// Queue of gates to update, lowest index first
    update_queue: BinaryHeap<Reverse<usize>>,
    /// Nodes whose faulty value differs from the fault-free one
    modified_values: Vec<usize>,
}

impl PatternSimulator {
    /// Build a simulator for a network
    pub fn new(network: &Network) -> PatternSimulator {
        assert!(network.is_comb());
        let topo = Topology::new(network);
        let nb = topo.nb_nodes();
        PatternSimulator {
            topo,
            faults: Vec::new(),
            good: vec![PackedVal3::all_x(); nb],
            faulty: vec![PackedVal3::all_x(); nb],
            update_queue: BinaryHeap::new(),
            modified_values: Vec::new(),
        }
    }

    /// Value of a signal in a value table
    fn signal_value(&self, values: &[PackedVal3], s: Signal) -> PackedVal3 {
        if s.is_constant() {
            PackedVal3::from_binary(if s.is_inverted() { !0 } else { 0 })
        } else {
            let v = values[self.topo.index(s)];
            if s.is_inverted() {
                !v
            } else {
                v
            }
        }
    }

    /// Evaluate a gate on a value table, optionally with one pin forced
    fn eval_gate(
        &self,
        network: &Network,
        values: &[PackedVal3],
        g: usize,
        forced: Option<(usize, bool)>,
    ) -> PackedVal3 {
        let gate = network.gate(g);
        let deps = gate.dependencies();
        gate.eval(|i| match forced {
            Some((pos, value)) if pos == i => PackedVal3::from_binary(if value { !0 } else { 0 }),
            _ => self.signal_value(values, deps[i]),
        })
    }

    /// Load the vectors and simulate the fault-free circuit
    fn run_good(&mut self, network: &Network, vectors: &[&TestVector]) {
        assert!(vectors.len() <= WORD_BITS);
        for i in 0..network.nb_inputs() {
            let mut pat0: PackedVal = 0;
            let mut pat1: PackedVal = 0;
            for (lane, tv) in vectors.iter().enumerate() {
                match tv.get(i).to_bool() {
                    Some(false) => pat0 |= 1 << lane,
                    Some(true) => pat1 |= 1 << lane,
                    None => (),
                }
            }
            self.good[i] = PackedVal3::new(pat0, pat1);
        }
        for g in 0..network.nb_nodes() {
            let v = self.eval_gate(network, &self.good, g, None);
            self.good[self.topo.gate_index(g)] = v;
        }
        self.faulty.clone_from(&self.good);
    }

    /// Change the faulty value of a node and schedule its users
    fn update_node(&mut self, node: usize, value: PackedVal3) {
        if self.faulty[node] == value {
            return;
        }
        if self.faulty[node] == self.good[node] {
            self.modified_values.push(node);
        }
        self.faulty[node] = value;
        for &(g, _) in self.topo.fanouts(node) {
            self.update_queue.push(Reverse(g));
        }
    }

    /// Propagate a fault and return the lanes where it is detected
    fn detects_fault(&mut self, network: &Network, fault: Fault) -> PackedVal {
        let node = self.topo.index(fault.node());
        match fault {
            Fault::OutputStuckAt { value, .. } => {
                self.update_node(node, PackedVal3::from_binary(if value { !0 } else { 0 }));
            }
            Fault::InputStuckAt { input, value, .. } => {
                let g = self.topo.gate_of(node).expect("Input faults are on gates");
                let v = self.eval_gate(network, &self.faulty, g, Some((input, value)));
                self.update_node(node, v);
            }
        }
        while let Some(Reverse(g)) = self.update_queue.pop() {
            let v = self.eval_gate(network, &self.faulty, g, None);
            self.update_node(self.topo.gate_index(g), v);
        }
        let mut ret = 0;
        for &n in &self.modified_values {
            if self.topo.outputs(n).is_empty() {
                continue;
            }
            let (g, f) = (self.good[n], self.faulty[n]);
            ret |= g.extract_determined() & f.extract_determined() & g.diff(&f);
        }
        self.reset();
        ret
    }

    /// Restore the fault-free values
    fn reset(&mut self) {
        for &n in &self.modified_values {
            self.faulty[n] = self.good[n];
        }
        self.modified_values.clear();
        self.update_queue.clear();
    }
}

impl FaultSimulator for PatternSimulator {
    fn set_faults(&mut self, faults: &[(FaultId, Fault)]) {
        self.faults = faults.to_vec();
    }

    fn run(&mut self, network: &Network, vectors: &[&TestVector]) -> Vec<Vec<FaultId>> {
        let mut ret = vec![Vec::new(); vectors.len()];
        if vectors.is_empty() {
            return ret;
        }
        self.run_good(network, vectors);
        let faults = std::mem::take(&mut self.faults);
        for (id, fault) in &faults {
            let det = self.detects_fault(network, *fault);
            if det != 0 {
                trace!("{fault} detected on lanes {det:#x}");
            }
            for (lane, hits) in ret.iter_mut().enumerate() {
                if (det >> lane) & 1 != 0 {
                    hits.push(*id);
                }
            }
        }
        self.faults = faults;
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultManager;
    use crate::value::Value3;

    fn primed(net: &Network, mgr: &FaultManager) -> PatternSimulator {
        let mut sim = PatternSimulator::new(net);
        let faults: Vec<_> = mgr
            .rep_list()
            .iter()
            .map(|f| (*f, mgr.fault(*f)))
            .collect();
        sim.set_faults(&faults);
        sim
    }

    fn vector(s: &str) -> TestVector {
        let mut tv = TestVector::new(s.len());
        assert!(tv.parse_binary(s));
        tv
    }

    #[test]
    fn test_and2() {
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let x = net.and(a, b);
        net.add_output(x);
        let mut mgr = FaultManager::new();
        mgr.build(&net);
        let mut sim = primed(&net, &mgr);

        let o0 = mgr.find_output_fault(x, false);
        let o1 = mgr.find_output_fault(x, true);
        let a1 = mgr.find_input_fault(x, 0, true);
        let b1 = mgr.find_input_fault(x, 1, true);

        let v11 = vector("11");
        let v01 = vector("01");
        let v10 = vector("10");
        let v00 = vector("00");
        let hits = sim.run(&net, &[&v11, &v01, &v10, &v00]);
        assert_eq!(hits[0], vec![o0]);
        assert_eq!(hits[1], vec![o1, a1]);
        assert_eq!(hits[2], vec![o1, b1]);
        assert_eq!(hits[3], vec![o1]);
    }

    #[test]
    fn test_unknown_is_conservative() {
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let x = net.xor(a, b);
        net.add_output(x);
        let mut mgr = FaultManager::new();
        mgr.build(&net);
        let mut sim = primed(&net, &mgr);
        // With b unknown, no fault effect reaches the output
        let mut tv = TestVector::new(2);
        tv.set(0, Value3::One);
        assert!(sim.run_single(&net, &tv).is_empty());
    }

    #[test]
    fn test_inverted_output_and_fanout() {
        // o0 = !(a & b), o1 = (a & b) ^ c
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let c = net.add_input();
        let x0 = net.and(a, b);
        let x1 = net.xor(x0, c);
        net.add_output(!x0);
        net.add_output(x1);
        let mut mgr = FaultManager::new();
        mgr.build(&net);
        let mut sim = primed(&net, &mgr);
        let hits = sim.run_single(&net, &vector("110"));
        let x0_0 = mgr.find_output_fault(x0, false);
        let c1 = mgr.find_output_fault(c, true);
        assert!(hits.contains(&x0_0));
        assert!(hits.contains(&mgr.representative(c1)));
        assert!(!hits.contains(&mgr.find_output_fault(x0, true)));
        // Repeated runs give the same answer
        assert_eq!(sim.run_single(&net, &vector("110")), hits);
    }
}
