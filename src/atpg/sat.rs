//! Test generation with a SAT solver
//!
//! The fault-free circuit is encoded on the input cone of the outputs the fault can reach, and
//! a faulty copy is encoded for the part of that cone that the fault affects. A miter requires
//! one of the outputs to differ.

use fxhash::FxHashMap;
use log::{trace, warn};
use rustsat::solvers::{Solve, SolverResult};
use rustsat::types::{Clause, Lit, TernaryVal};
use rustsat_kissat::Kissat;

use crate::atpg::{DtpgBackend, DtpgOutcome};
use crate::fault::Fault;
use crate::network::{BinaryType, NaryType, TernaryType, Topology};
use crate::tv::TestVector;
use crate::value::Value3;
use crate::{Gate, Network, Signal};

/// Deterministic generation backend based on Kissat
///
/// The solver runs to completion, so this backend never aborts unless the solver fails.
#[derive(Debug, Default)]
pub struct SatBackend {
    nb_solves: usize,
    /// Structure of the last network seen
    topo: Option<Topology>,
}

impl SatBackend {
    /// Create a backend
    pub fn new() -> SatBackend {
        SatBackend::default()
    }

    /// Number of SAT problems solved
    pub fn nb_solves(&self) -> usize {
        self.nb_solves
    }

    fn topology(&mut self, network: &Network) -> &Topology {
        let nb = network.nb_inputs() + network.nb_nodes();
        if self.topo.as_ref().is_some_and(|t| t.nb_nodes() != nb) {
            self.topo = None;
        }
        self.topo.get_or_insert_with(|| Topology::new(network))
    }
}

impl DtpgBackend for SatBackend {
    fn name(&self) -> &'static str {
        "sat"
    }

    fn run(&mut self, network: &Network, fault: Fault) -> DtpgOutcome {
        let topo = self.topology(network);
        let site = topo.index(fault.node());
        let outputs = topo.reachable_outputs(site);
        if outputs.is_empty() {
            return DtpgOutcome::Untestable;
        }
        let enc = Encoder::build(network, topo, fault, &outputs);
        self.nb_solves += 1;
        match enc.solve() {
            Ok(Some(care)) => DtpgOutcome::Detected(care),
            Ok(None) => DtpgOutcome::Untestable,
            Err(e) => {
                warn!("SAT solver failed on {fault}: {e:#}");
                DtpgOutcome::Aborted
            }
        }
    }
}

fn lit_xor(l: Lit, inv: bool) -> Lit {
    if inv {
        !l
    } else {
        l
    }
}

/// CNF encoding of the detection problem for one fault
struct Encoder {
    nb_inputs: usize,
    clauses: Vec<Vec<Lit>>,
    /// Fault-free value of the nodes in the cone
    good: Vec<Option<Lit>>,
    /// Faulty value of the nodes affected by the fault
    faulty: FxHashMap<usize, Lit>,
    next_var: u32,
    one: Lit,
}

impl Encoder {
    fn build(network: &Network, topo: &Topology, fault: Fault, outputs: &[usize]) -> Encoder {
        let mut enc = Encoder {
            nb_inputs: network.nb_inputs(),
            clauses: Vec::new(),
            good: vec![None; topo.nb_nodes()],
            faulty: FxHashMap::default(),
            next_var: 1,
            one: Lit::positive(0),
        };
        enc.clauses.push(vec![enc.one]);

        let tfi = topo.transitive_fanin(network, outputs);
        for n in 0..topo.nb_nodes() {
            if !tfi[n] {
                continue;
            }
            let out = enc.new_lit();
            enc.good[n] = Some(out);
            if let Some(g) = topo.gate_of(n) {
                let gate = network.gate(g);
                let pins: Vec<Lit> = gate
                    .dependencies()
                    .iter()
                    .map(|s| enc.good_lit(topo, *s))
                    .collect();
                enc.encode_gate(gate, &pins, out);
            }
        }

        let site = topo.index(fault.node());
        let tfo = topo.transitive_fanout(site);
        for n in site..topo.nb_nodes() {
            if !tfo[n] || !tfi[n] {
                continue;
            }
            let out = enc.new_lit();
            enc.faulty.insert(n, out);
            match (n == site, fault) {
                (true, Fault::OutputStuckAt { value, .. }) => {
                    enc.clauses.push(vec![lit_xor(out, !value)]);
                }
                (true, Fault::InputStuckAt { input, value, .. }) => {
                    let gate = network.gate(topo.gate_of(n).expect("Input faults are on gates"));
                    let mut pins: Vec<Lit> = gate
                        .dependencies()
                        .iter()
                        .map(|s| enc.faulty_lit(topo, *s))
                        .collect();
                    pins[input] = enc.const_lit(value);
                    enc.encode_gate(gate, &pins, out);
                }
                (false, _) => {
                    let gate = network.gate(topo.gate_of(n).expect("Only gates are affected"));
                    let pins: Vec<Lit> = gate
                        .dependencies()
                        .iter()
                        .map(|s| enc.faulty_lit(topo, *s))
                        .collect();
                    enc.encode_gate(gate, &pins, out);
                }
            }
        }

        let mut miter = Vec::new();
        for o in outputs {
            let s = network.output(*o);
            let g = enc.good_lit(topo, s);
            let f = enc.faulty_lit(topo, s);
            let d = enc.new_lit();
            enc.clauses.push(vec![!d, g, f]);
            enc.clauses.push(vec![!d, !g, !f]);
            miter.push(d);
        }
        enc.clauses.push(miter);
        trace!(
            "Encoded {fault} with {} variables and {} clauses",
            enc.next_var,
            enc.clauses.len()
        );
        enc
    }

    fn new_lit(&mut self) -> Lit {
        let l = Lit::positive(self.next_var);
        self.next_var += 1;
        l
    }

    fn const_lit(&self, value: bool) -> Lit {
        lit_xor(self.one, !value)
    }

    fn good_lit(&self, topo: &Topology, s: Signal) -> Lit {
        if s.is_constant() {
            return self.const_lit(s.is_inverted());
        }
        let l = self.good[topo.index(s)].expect("Signal outside of the encoded cone");
        lit_xor(l, s.is_inverted())
    }

    fn faulty_lit(&self, topo: &Topology, s: Signal) -> Lit {
        if s.is_constant() {
            return self.const_lit(s.is_inverted());
        }
        match self.faulty.get(&topo.index(s)) {
            Some(l) => lit_xor(*l, s.is_inverted()),
            None => self.good_lit(topo, s),
        }
    }

    /// out <=> pins[0] & pins[1] & ...
    fn and_clauses(&mut self, pins: &[Lit], out: Lit) {
        let mut last = vec![out];
        for p in pins {
            self.clauses.push(vec![*p, !out]);
            last.push(!*p);
        }
        self.clauses.push(last);
    }

    /// out <=> a ^ b
    fn xor_clauses(&mut self, a: Lit, b: Lit, out: Lit) {
        self.clauses.push(vec![a, b, !out]);
        self.clauses.push(vec![!a, !b, !out]);
        self.clauses.push(vec![!a, b, out]);
        self.clauses.push(vec![a, !b, out]);
    }

    /// out <=> pins[0] ^ pins[1] ^ ...
    fn xor_chain(&mut self, pins: &[Lit], out: Lit) {
        match pins {
            [] => self.clauses.push(vec![!out]),
            [a] => {
                self.clauses.push(vec![*a, !out]);
                self.clauses.push(vec![!*a, out]);
            }
            _ => {
                let mut acc = pins[0];
                for (i, p) in pins.iter().enumerate().skip(1) {
                    let t = if i + 1 == pins.len() {
                        out
                    } else {
                        self.new_lit()
                    };
                    self.xor_clauses(acc, *p, t);
                    acc = t;
                }
            }
        }
    }

    fn encode_gate(&mut self, gate: &Gate, pins: &[Lit], n: Lit) {
        use Gate::*;
        let neg: Vec<Lit> = pins.iter().map(|l| !*l).collect();
        match gate {
            Binary(_, BinaryType::And) | Ternary(_, TernaryType::And) => self.and_clauses(pins, n),
            Binary(_, BinaryType::Xor) | Ternary(_, TernaryType::Xor) => self.xor_chain(pins, n),
            Nary(_, tp) => match tp {
                NaryType::And => self.and_clauses(pins, n),
                NaryType::Nand => self.and_clauses(pins, !n),
                NaryType::Or => self.and_clauses(&neg, !n),
                NaryType::Nor => self.and_clauses(&neg, n),
                NaryType::Xor => self.xor_chain(pins, n),
                NaryType::Xnor => self.xor_chain(pins, !n),
            },
            Ternary(_, TernaryType::Mux) => {
                let (s, a, b) = (pins[0], pins[1], pins[2]);
                self.clauses.push(vec![!s, !a, n]);
                self.clauses.push(vec![!s, a, !n]);
                self.clauses.push(vec![s, !b, n]);
                self.clauses.push(vec![s, b, !n]);
                // Redundant but useful
                self.clauses.push(vec![a, b, !n]);
                self.clauses.push(vec![!a, !b, n]);
            }
            Ternary(_, TernaryType::Maj) => {
                let (a, b, c) = (pins[0], pins[1], pins[2]);
                self.clauses.push(vec![!a, !b, n]);
                self.clauses.push(vec![!a, !c, n]);
                self.clauses.push(vec![!b, !c, n]);
                self.clauses.push(vec![a, b, !n]);
                self.clauses.push(vec![a, c, !n]);
                self.clauses.push(vec![b, c, !n]);
            }
            Buf(_) => {
                self.clauses.push(vec![pins[0], !n]);
                self.clauses.push(vec![!pins[0], n]);
            }
            Lut(lut) => {
                // One clause per truth table row
                for mask in 0..lut.lut.num_bits() {
                    let mut c: Vec<Lit> = pins
                        .iter()
                        .enumerate()
                        .map(|(i, p)| lit_xor(*p, (mask >> i) & 1 != 0))
                        .collect();
                    c.push(lit_xor(n, !lut.lut.value(mask)));
                    self.clauses.push(c);
                }
            }
            Dff(_) => panic!("Combinatorial network expected"),
        }
    }

    /// Solve the problem, and return the values of the inputs in the cone
    fn solve(&self) -> anyhow::Result<Option<TestVector>> {
        let mut solver = Kissat::default();
        for c in &self.clauses {
            solver.add_clause(Clause::from(c.as_slice()))?;
        }
        match solver.solve()? {
            SolverResult::Sat => (),
            SolverResult::Unsat => return Ok(None),
            SolverResult::Interrupted => anyhow::bail!("solver interrupted"),
        }
        let mut care = TestVector::new(self.nb_inputs);
        for i in 0..self.nb_inputs {
            if let Some(l) = self.good[i] {
                let v = match solver.lit_val(l)? {
                    TernaryVal::True => Value3::One,
                    TernaryVal::False | TernaryVal::DontCare => Value3::Zero,
                };
                care.set(i, v);
            }
        }
        Ok(Some(care))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::FaultManager;
    use crate::sim::{FaultSimulator, PatternSimulator};

    /// o0 = (a & b) | c, o1 = a & !a (constant in practice)
    fn network() -> Network {
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let c = net.add_input();
        let x0 = net.and(a, b);
        let x1 = net.add(Gate::nary(&[x0, c], NaryType::Or));
        let x2 = net.and(a, !a);
        net.add_output(x1);
        net.add_output(x2);
        net
    }

    #[test]
    fn test_all_faults() {
        let net = network();
        let mut mgr = FaultManager::new();
        mgr.build(&net);
        let mut sat = SatBackend::new();
        let mut sim = PatternSimulator::new(&net);
        let mut nb_untestable = 0;
        for f in mgr.rep_list() {
            let fault = mgr.fault(*f);
            sim.set_faults(&[(*f, fault)]);
            match sat.run(&net, fault) {
                DtpgOutcome::Detected(care) => {
                    // The care bits alone detect the fault
                    assert_eq!(sim.run_single(&net, &care), vec![*f], "{fault}");
                }
                DtpgOutcome::Untestable => nb_untestable += 1,
                DtpgOutcome::Aborted => panic!("Unexpected abort"),
            }
        }
        // Only x2 stuck at 0, which is constant anyway
        assert_eq!(nb_untestable, 1);
    }

    #[test]
    fn test_care_bits() {
        let net = network();
        let x0 = net.node(0);
        let fault = Fault::OutputStuckAt {
            node: x0,
            value: false,
        };
        let DtpgOutcome::Detected(care) = SatBackend::new().run(&net, fault) else {
            panic!("Fault should be detected");
        };
        assert_eq!(care.to_binary(), "110");
    }

    #[test]
    fn test_network_change() {
        let mut sat = SatBackend::new();
        let net = network();
        let fault = Fault::OutputStuckAt {
            node: net.node(1),
            value: true,
        };
        assert!(matches!(sat.run(&net, fault), DtpgOutcome::Detected(_)));
        assert_eq!(sat.topo.as_ref().map(|t| t.nb_nodes()), Some(6));

        // A larger network replaces the cached structure
        let mut other = Network::new();
        let a = other.add_input();
        let b = other.add_input();
        let x = other.and(a, b);
        let y = other.and(x, !b);
        other.add_output(y);
        let fault = Fault::OutputStuckAt { node: y, value: false };
        assert_eq!(sat.run(&other, fault), DtpgOutcome::Untestable);
        assert_eq!(sat.topo.as_ref().map(|t| t.nb_nodes()), Some(4));
        assert_eq!(sat.nb_solves(), 2);
    }

    #[test]
    fn test_xor_and_lut() {
        use volute::Lut;
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let c = net.add_input();
        let d = net.add_input();
        let x = net.add(Gate::nary(&[a, b, c], NaryType::Xnor));
        let y = net.add(Gate::lut(&[x, d], Lut::from_hex_string(2, "6").unwrap()));
        let z = net.add(Gate::mux(a, y, !d));
        net.add_output(z);
        let mut mgr = FaultManager::new();
        mgr.build(&net);
        let mut sat = SatBackend::new();
        let mut sim = PatternSimulator::new(&net);
        for f in mgr.rep_list() {
            let fault = mgr.fault(*f);
            sim.set_faults(&[(*f, fault)]);
            if let DtpgOutcome::Detected(care) = sat.run(&net, fault) {
                assert_eq!(sim.run_single(&net, &care), vec![*f], "{fault}");
            }
        }
        assert!(sat.nb_solves() > 0);
    }
}
