//! Structural queries used by fault collapsing and test generation
//!
//! Primary inputs and gates are numbered together as nodes: inputs come first,
//! then gates in network order. This is the numbering used by the fault tables.

use crate::{Network, Signal};

/// Fanout and region information for a combinatorial network
#[derive(Debug, Clone)]
pub struct Topology {
    nb_inputs: usize,
    /// Gate and pin using each node
    fanouts: Vec<Vec<(usize, usize)>>,
    /// Primary outputs driven by each node
    outputs: Vec<Vec<usize>>,
}

impl Topology {
    /// Analyze a network
    pub fn new(network: &Network) -> Topology {
        assert!(network.is_topo_sorted());
        let nb_inputs = network.nb_inputs();
        let nb = nb_inputs + network.nb_nodes();
        let mut fanouts = vec![Vec::new(); nb];
        let mut outputs = vec![Vec::new(); nb];
        for i in 0..network.nb_nodes() {
            for (pin, s) in network.gate(i).dependencies().iter().enumerate() {
                if !s.is_constant() {
                    fanouts[index_in(nb_inputs, *s)].push((i, pin));
                }
            }
        }
        for o in 0..network.nb_outputs() {
            let s = network.output(o);
            if !s.is_constant() {
                outputs[index_in(nb_inputs, s)].push(o);
            }
        }
        Topology {
            nb_inputs,
            fanouts,
            outputs,
        }
    }

    /// Number of nodes, inputs included
    pub fn nb_nodes(&self) -> usize {
        self.fanouts.len()
    }

    /// Node index of a (non-constant) signal, ignoring its inversion
    pub fn index(&self, s: Signal) -> usize {
        index_in(self.nb_inputs, s)
    }

    /// Node index of the gate at index i
    pub fn gate_index(&self, i: usize) -> usize {
        self.nb_inputs + i
    }

    /// Signal driven by a node
    pub fn signal(&self, node: usize) -> Signal {
        if node < self.nb_inputs {
            Signal::from_input(node as u32)
        } else {
            Signal::from_var((node - self.nb_inputs) as u32)
        }
    }

    /// Gate index of a node, if it is a gate
    pub fn gate_of(&self, node: usize) -> Option<usize> {
        node.checked_sub(self.nb_inputs)
    }

    /// Gate and pin pairs using a node
    pub fn fanouts(&self, node: usize) -> &[(usize, usize)] {
        &self.fanouts[node]
    }

    /// Primary outputs directly driven by a node
    pub fn outputs(&self, node: usize) -> &[usize] {
        &self.outputs[node]
    }

    /// Returns whether the node is the root of a fanout-free region
    ///
    /// This is the case unless the node drives exactly one gate pin and no primary output.
    pub fn is_stem(&self, node: usize) -> bool {
        self.single_fanout(node).is_none()
    }

    /// The only gate pin using this node, if it has a single fanout and drives no output
    pub fn single_fanout(&self, node: usize) -> Option<(usize, usize)> {
        if self.fanouts[node].len() == 1 && self.outputs[node].is_empty() {
            Some(self.fanouts[node][0])
        } else {
            None
        }
    }

    /// Order gates so that each fanout-free region is visited as a block, root first
    ///
    /// Within a region, every gate comes after the gate it feeds.
    pub fn ffr_order(&self, network: &Network) -> Vec<usize> {
        let mut ret = Vec::with_capacity(network.nb_nodes());
        let mut stack = Vec::new();
        for root in 0..network.nb_nodes() {
            if !self.is_stem(self.gate_index(root)) {
                continue;
            }
            stack.push(root);
            while let Some(g) = stack.pop() {
                ret.push(g);
                for s in network.gate(g).dependencies().iter().rev() {
                    if s.is_var() && !self.is_stem(self.index(*s)) {
                        stack.push(s.var() as usize);
                    }
                }
            }
        }
        ret
    }

    /// Mark the nodes in the transitive fanout of a node, itself included
    pub fn transitive_fanout(&self, node: usize) -> Vec<bool> {
        let mut ret = vec![false; self.nb_nodes()];
        ret[node] = true;
        // Gates are sorted, so a single forward pass is enough
        for n in node..self.nb_nodes() {
            if !ret[n] {
                continue;
            }
            for (g, _) in &self.fanouts[n] {
                ret[self.gate_index(*g)] = true;
            }
        }
        ret
    }

    /// Primary outputs reachable from a node
    pub fn reachable_outputs(&self, node: usize) -> Vec<usize> {
        let tfo = self.transitive_fanout(node);
        let mut ret: Vec<usize> = (0..self.nb_nodes())
            .filter(|n| tfo[*n])
            .flat_map(|n| self.outputs[n].iter().copied())
            .collect();
        ret.sort();
        ret.dedup();
        ret
    }

    /// Mark the nodes in the transitive fanin of the given primary outputs
    pub fn transitive_fanin(&self, network: &Network, outputs: &[usize]) -> Vec<bool> {
        let mut ret = vec![false; self.nb_nodes()];
        for o in outputs {
            let s = network.output(*o);
            if !s.is_constant() {
                ret[self.index(s)] = true;
            }
        }
        for n in (self.nb_inputs..self.nb_nodes()).rev() {
            if !ret[n] {
                continue;
            }
            for s in network.gate(n - self.nb_inputs).dependencies() {
                if !s.is_constant() {
                    ret[self.index(*s)] = true;
                }
            }
        }
        ret
    }
}

fn index_in(nb_inputs: usize, s: Signal) -> usize {
    if s.is_input() {
        s.input() as usize
    } else {
        nb_inputs + s.var() as usize
    }
}
