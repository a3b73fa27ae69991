use std::fmt;

use crate::network::gates::Gate;
use crate::network::signal::Signal;

/// Gate-level network under test
///
/// Inputs are implicit and numbered from zero, gates are stored in a vector and
/// primary outputs are signals referencing inputs, gates or constants.
/// Test generation expects the network to be combinatorial and topologically sorted,
/// so that each gate only depends on inputs and gates with a lower index.
#[derive(Debug, Clone, Default)]
pub struct Network {
    nb_inputs: usize,
    nodes: Vec<Gate>,
    outputs: Vec<Signal>,
}

impl Network {
    /// Create a new network
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the number of primary inputs
    pub fn nb_inputs(&self) -> usize {
        self.nb_inputs
    }

    /// Return the number of primary outputs
    pub fn nb_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Return the number of gates in the network
    pub fn nb_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Get the input at index i
    pub fn input(&self, i: usize) -> Signal {
        assert!(i < self.nb_inputs());
        Signal::from_input(i as u32)
    }

    /// Get the output at index i
    pub fn output(&self, i: usize) -> Signal {
        self.outputs[i]
    }

    /// Get the signal for the gate at index i
    pub fn node(&self, i: usize) -> Signal {
        Signal::from_var(i as u32)
    }

    /// Get the gate at index i
    pub fn gate(&self, i: usize) -> &Gate {
        &self.nodes[i]
    }

    /// Add a new primary input
    pub fn add_input(&mut self) -> Signal {
        self.nb_inputs += 1;
        self.input(self.nb_inputs - 1)
    }

    /// Add multiple primary inputs
    pub fn add_inputs(&mut self, nb: usize) {
        self.nb_inputs += nb;
    }

    /// Add a new primary output
    pub fn add_output(&mut self, s: Signal) {
        self.outputs.push(s)
    }

    /// Add a new gate
    pub fn add(&mut self, gate: Gate) -> Signal {
        let s = Signal::from_var(self.nodes.len() as u32);
        self.nodes.push(gate);
        s
    }

    /// Create an And2 gate
    pub fn and(&mut self, a: Signal, b: Signal) -> Signal {
        self.add(Gate::and(a, b))
    }

    /// Create a Xor2 gate
    pub fn xor(&mut self, a: Signal, b: Signal) -> Signal {
        self.add(Gate::xor(a, b))
    }

    /// Return whether the network is purely combinatorial
    pub fn is_comb(&self) -> bool {
        self.nodes.iter().all(|g| g.is_comb())
    }

    /// Return whether each gate only uses gates with a lower index
    pub fn is_topo_sorted(&self) -> bool {
        self.nodes
            .iter()
            .enumerate()
            .all(|(i, g)| g.vars().all(|v| (v as usize) < i))
    }

    /// Sort the gates topologically; this invalidates the signals held by the caller
    ///
    /// Flip-flops break cycles: their inputs are not considered as dependencies.
    /// Panics if there is a combinatorial loop.
    pub fn topo_sort(&mut self) {
        let n = self.nb_nodes();
        let mut nb_missing = vec![0usize; n];
        let mut users: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, g) in self.nodes.iter().enumerate() {
            if !g.is_comb() {
                continue;
            }
            for v in g.vars() {
                nb_missing[i] += 1;
                users[v as usize].push(i);
            }
        }
        let mut order = Vec::with_capacity(n);
        let mut ready: Vec<usize> = (0..n).rev().filter(|i| nb_missing[*i] == 0).collect();
        while let Some(i) = ready.pop() {
            order.push(i);
            for &u in &users[i] {
                nb_missing[u] -= 1;
                if nb_missing[u] == 0 {
                    ready.push(u);
                }
            }
        }
        if order.len() != n {
            panic!("Unable to find a valid topological sort: there must be a combinatorial loop");
        }
        self.remap(&order);
    }

    /// Reorder the gates: the new gate i is the old gate order[i]
    fn remap(&mut self, order: &[usize]) {
        let mut translation = vec![Signal::zero(); self.nb_nodes()];
        for (new_i, old_i) in order.iter().enumerate() {
            translation[*old_i] = Signal::from_var(new_i as u32);
        }
        let t = |s: &Signal| -> Signal {
            if s.is_var() {
                translation[s.var() as usize] ^ s.is_inverted()
            } else {
                *s
            }
        };
        self.nodes = order.iter().map(|i| remap_gate(&self.nodes[*i], t)).collect();
        self.outputs = self.outputs.iter().map(t).collect();
    }

    /// Check consistency of the datastructure
    pub fn check(&self) {
        for i in 0..self.nb_nodes() {
            for s in self.gate(i).dependencies() {
                assert!(self.is_valid(*s), "Invalid signal {s} in gate {i}");
            }
        }
        for s in &self.outputs {
            assert!(self.is_valid(*s), "Invalid output {s}");
        }
    }

    /// Returns whether a signal is within bounds
    pub fn is_valid(&self, s: Signal) -> bool {
        if s.is_input() {
            (s.input() as usize) < self.nb_inputs()
        } else if s.is_var() {
            (s.var() as usize) < self.nb_nodes()
        } else {
            true
        }
    }
}

/// Apply a signal translation to the inputs of a gate
fn remap_gate<F: Fn(&Signal) -> Signal>(g: &Gate, t: F) -> Gate {
    use crate::network::gates::LutGate;
    use Gate::*;
    match g {
        Binary([a, b], tp) => Binary([t(a), t(b)], *tp),
        Ternary([a, b, c], tp) => Ternary([t(a), t(b), t(c)], *tp),
        Nary(v, tp) => Nary(v.iter().map(&t).collect(), *tp),
        Buf(s) => Buf(t(s)),
        Dff([d, en, res]) => Dff([t(d), t(en), t(res)]),
        Lut(lut) => Lut(Box::new(LutGate {
            inputs: lut.inputs.iter().map(&t).collect(),
            lut: lut.lut.clone(),
        })),
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Network with {} inputs, {} outputs:",
            self.nb_inputs(),
            self.nb_outputs()
        )?;
        for i in 0..self.nb_nodes() {
            writeln!(f, "\t{} = {}", self.node(i), self.gate(i))?;
        }
        for (i, s) in self.outputs.iter().enumerate() {
            writeln!(f, "\to{} = {}", i, s)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Gate, Network, Signal};

    #[test]
    fn test_basic() {
        let mut net = Network::new();
        let i0 = net.add_input();
        let i1 = net.add_input();
        let x = net.xor(i0, i1);
        net.add_output(x);
        assert_eq!(net.nb_inputs(), 2);
        assert_eq!(net.nb_outputs(), 1);
        assert_eq!(net.nb_nodes(), 1);
        assert!(net.is_comb());
        assert!(net.is_topo_sorted());
        assert_eq!(net.output(0), x);
        net.check();
    }

    #[test]
    fn test_topo_sort() {
        let mut net = Network::new();
        let i0 = net.add_input();
        let i1 = net.add_input();
        // x0 uses x1, which is defined later
        let x1 = Signal::from_var(1);
        net.add(Gate::and(i0, !x1));
        net.add(Gate::xor(i0, i1));
        net.add_output(Signal::from_var(0));
        assert!(!net.is_topo_sorted());
        net.topo_sort();
        assert!(net.is_topo_sorted());
        assert_eq!(net.gate(0), &Gate::xor(i0, i1));
        assert_eq!(net.gate(1), &Gate::and(i0, !Signal::from_var(0)));
        assert_eq!(net.output(0), Signal::from_var(1));
    }

    #[test]
    #[should_panic]
    fn test_loop() {
        let mut net = Network::new();
        let i0 = net.add_input();
        net.add(Gate::and(i0, Signal::from_var(1)));
        net.add(Gate::and(i0, Signal::from_var(0)));
        net.topo_sort();
    }
}
