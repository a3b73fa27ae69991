//! Structural test generation
//!
//! Path-oriented decision making: decisions are only taken on primary inputs, and the values of
//! the fault-free and faulty circuits are implied by ternary simulation after each decision.

use log::trace;

use crate::atpg::{DtpgBackend, DtpgOutcome};
use crate::fault::Fault;
use crate::network::{TernaryType, Topology};
use crate::tv::TestVector;
use crate::value::Value3;
use crate::{Gate, Network, Signal};

/// Default maximum number of backtracks for a single fault
pub const DEFAULT_BACKTRACK_LIMIT: usize = 1000;

/// Deterministic generation backend based on a structural search
///
/// The search gives up and reports an abort after a configurable number of backtracks.
/// A backend is tied to a single network.
#[derive(Debug)]
pub struct PodemBackend {
    backtrack_limit: usize,
    total_backtracks: usize,
    topo: Option<Topology>,
    /// Sorted outputs of the active region, if restricted to one fault
    scope: Option<Vec<usize>>,
}

impl PodemBackend {
    /// Create a backend with the default backtrack limit
    pub fn new() -> PodemBackend {
        PodemBackend {
            backtrack_limit: DEFAULT_BACKTRACK_LIMIT,
            total_backtracks: 0,
            topo: None,
            scope: None,
        }
    }

    /// Maximum number of backtracks for a single fault
    pub fn backtrack_limit(&self) -> usize {
        self.backtrack_limit
    }

    fn topology(&mut self, network: &Network) -> &Topology {
        let nb = network.nb_inputs() + network.nb_nodes();
        if self.topo.as_ref().is_some_and(|t| t.nb_nodes() != nb) {
            self.topo = None;
        }
        self.topo.get_or_insert_with(|| Topology::new(network))
    }
}

impl Default for PodemBackend {
    fn default() -> Self {
        PodemBackend::new()
    }
}

impl DtpgBackend for PodemBackend {
    fn name(&self) -> &'static str {
        "podem"
    }

    fn run(&mut self, network: &Network, fault: Fault) -> DtpgOutcome {
        let limit = self.backtrack_limit;
        let (outcome, backtracks) = {
            let topo = self.topology(network);
            Search::new(network, topo, fault).run(limit)
        };
        trace!("{fault}: {outcome:?} after {backtracks} backtracks");
        self.total_backtracks += backtracks;
        outcome
    }

    fn supports_scoping(&self) -> bool {
        true
    }

    fn activate_all(&mut self, network: &Network) {
        self.topology(network);
        self.scope = None;
    }

    fn activate_fault(&mut self, network: &Network, fault: Fault) -> bool {
        let topo = self.topology(network);
        let outputs = topo.reachable_outputs(topo.index(fault.node()));
        if outputs.is_empty() {
            self.scope = None;
            false
        } else {
            self.scope = Some(outputs);
            true
        }
    }

    fn check_fault(&self, network: &Network, fault: Fault) -> bool {
        let Some(scope) = &self.scope else {
            return true;
        };
        let outputs = match &self.topo {
            Some(topo) => topo.reachable_outputs(topo.index(fault.node())),
            None => {
                let topo = Topology::new(network);
                topo.reachable_outputs(topo.index(fault.node()))
            }
        };
        outputs.iter().all(|o| scope.binary_search(o).is_ok())
    }

    fn deactivate(&mut self) {
        self.scope = None;
    }

    fn backtrack_count(&self) -> usize {
        self.total_backtracks
    }

    fn set_backtrack_limit(&mut self, limit: usize) {
        self.backtrack_limit = limit;
    }
}

/// Next action of the search
enum Step {
    Detected,
    Conflict,
    /// Try to set a node to a value
    Objective(usize, bool),
}

/// Search state for a single fault
struct Search<'a> {
    network: &'a Network,
    topo: &'a Topology,
    fault: Fault,
    site: usize,
    /// Nodes whose faulty value may differ
    tfo: Vec<bool>,
    /// Nodes that can reach an observed output
    useful: Vec<bool>,
    observed: Vec<usize>,
    assign: Vec<Value3>,
    good: Vec<Value3>,
    faulty: Vec<Value3>,
}

fn sig_val(values: &[Value3], topo: &Topology, s: Signal) -> Value3 {
    let v = if s.is_constant() {
        Value3::Zero
    } else {
        values[topo.index(s)]
    };
    if s.is_inverted() {
        !v
    } else {
        v
    }
}

impl<'a> Search<'a> {
    fn new(network: &'a Network, topo: &'a Topology, fault: Fault) -> Search<'a> {
        let site = topo.index(fault.node());
        let observed = topo.reachable_outputs(site);
        let tfo = topo.transitive_fanout(site);
        let useful = topo.transitive_fanin(network, &observed);
        Search {
            network,
            topo,
            fault,
            site,
            tfo,
            useful,
            observed,
            assign: vec![Value3::X; network.nb_inputs()],
            good: vec![Value3::X; topo.nb_nodes()],
            faulty: vec![Value3::X; topo.nb_nodes()],
        }
    }

    /// The pin forced by the fault, if it is an input fault on this gate
    fn forced_pin(&self, n: usize) -> Option<(usize, bool)> {
        match self.fault {
            Fault::InputStuckAt { input, value, .. } if n == self.site => Some((input, value)),
            _ => None,
        }
    }

    /// Values seen by a pin in the fault-free and faulty circuits
    fn pin_values(&self, n: usize, pin: usize, s: Signal) -> (Value3, Value3) {
        let g = sig_val(&self.good, self.topo, s);
        match self.forced_pin(n) {
            Some((p, value)) if p == pin => (g, Value3::from(value)),
            _ => (g, sig_val(&self.faulty, self.topo, s)),
        }
    }

    /// Simulate both circuits from the current input assignment
    fn imply(&mut self) {
        let nb_inputs = self.network.nb_inputs();
        self.good[..nb_inputs].copy_from_slice(&self.assign);
        self.faulty[..nb_inputs].copy_from_slice(&self.assign);
        if let Fault::OutputStuckAt { value, .. } = self.fault {
            self.faulty[self.site] = Value3::from(value);
        }
        for g in 0..self.network.nb_nodes() {
            let n = self.topo.gate_index(g);
            let gate = self.network.gate(g);
            let deps = gate.dependencies();
            let v = gate.eval(|p| sig_val(&self.good, self.topo, deps[p]));
            self.good[n] = v;
            self.faulty[n] = if !self.tfo[n] {
                v
            } else if n == self.site && self.fault.is_output() {
                Value3::from(self.fault.value())
            } else {
                gate.eval(|p| self.pin_values(n, p, deps[p]).1)
            };
        }
    }

    /// Decide what to do from the current state
    fn step(&self) -> Step {
        // Activation: the fault-free value at the fault site must be the opposite of the fault
        let s = match self.fault {
            Fault::OutputStuckAt { node, .. } => node,
            Fault::InputStuckAt { node, input, .. } => {
                self.network.gate(node.var() as usize).dependencies()[input]
            }
        };
        match sig_val(&self.good, self.topo, s).to_bool() {
            Some(v) if v == self.fault.value() => return Step::Conflict,
            None => {
                return Step::Objective(self.topo.index(s), !self.fault.value() ^ s.is_inverted())
            }
            _ => (),
        }

        for &o in &self.observed {
            let s = self.network.output(o);
            let g = sig_val(&self.good, self.topo, s);
            let f = sig_val(&self.faulty, self.topo, s);
            if g.is_determined() && f.is_determined() && g != f {
                return Step::Detected;
            }
        }

        // Propagation through the D-frontier
        for n in self.site..self.topo.nb_nodes() {
            if !self.tfo[n] || !self.useful[n] {
                continue;
            }
            if self.good[n].is_determined() && self.faulty[n].is_determined() {
                continue;
            }
            let Some(g) = self.topo.gate_of(n) else {
                continue;
            };
            let gate = self.network.gate(g);
            let deps = gate.dependencies();
            let pins: Vec<(Value3, Value3)> = (0..deps.len())
                .map(|p| self.pin_values(n, p, deps[p]))
                .collect();
            let Some(d_pin) = pins
                .iter()
                .position(|(g, f)| g.is_determined() && f.is_determined() && g != f)
            else {
                continue;
            };
            let forced = self.forced_pin(n).map(|(p, _)| p);
            let x_pin = (0..deps.len())
                .find(|p| Some(*p) != forced && (!pins[*p].0.is_determined() || !pins[*p].1.is_determined()));
            if let Some(p) = x_pin {
                let v = propagation_value(gate, &pins, d_pin, p);
                let s = deps[p];
                return Step::Objective(self.topo.index(s), v ^ s.is_inverted());
            }
        }
        Step::Conflict
    }

    /// Follow unknown values back to an unassigned input
    fn backtrace(&self, mut node: usize, mut value: bool) -> Option<(usize, bool)> {
        loop {
            let Some(g) = self.topo.gate_of(node) else {
                return if self.assign[node].is_determined() {
                    None
                } else {
                    Some((node, value))
                };
            };
            let gate = self.network.gate(g);
            let deps = gate.dependencies();
            let forced = self.forced_pin(node).map(|(p, _)| p);
            let nb = deps.len();
            let candidates = move || (0..nb).filter(move |p| Some(*p) != forced);
            let p = candidates()
                .find(|p| !sig_val(&self.good, self.topo, deps[*p]).is_determined())
                .or_else(|| {
                    candidates().find(|p| !sig_val(&self.faulty, self.topo, deps[*p]).is_determined())
                })?;
            let pin_value = match gate.controlling_value() {
                Some((ctrl, out)) => {
                    if value == out {
                        ctrl
                    } else {
                        !ctrl
                    }
                }
                None => value,
            };
            let s = deps[p];
            if s.is_constant() {
                return None;
            }
            node = self.topo.index(s);
            value = pin_value ^ s.is_inverted();
        }
    }

    /// Care bits of the current assignment
    fn care_bits(&self) -> TestVector {
        let mut ret = TestVector::new(self.assign.len());
        for (i, v) in self.assign.iter().enumerate() {
            if v.is_determined() {
                ret.set(i, *v);
            }
        }
        ret
    }

    /// Run the search, and return the outcome and the number of backtracks
    fn run(mut self, limit: usize) -> (DtpgOutcome, usize) {
        if self.observed.is_empty() {
            return (DtpgOutcome::Untestable, 0);
        }
        // Decisions taken so far: input, value, and whether the other value was already tried
        let mut stack: Vec<(usize, bool, bool)> = Vec::new();
        let mut backtracks = 0;
        loop {
            self.imply();
            let conflict = match self.step() {
                Step::Detected => return (DtpgOutcome::Detected(self.care_bits()), backtracks),
                Step::Conflict => true,
                Step::Objective(node, value) => match self.backtrace(node, value) {
                    Some((i, v)) => {
                        self.assign[i] = Value3::from(v);
                        stack.push((i, v, false));
                        false
                    }
                    None => true,
                },
            };
            if !conflict {
                continue;
            }
            loop {
                match stack.pop() {
                    None => return (DtpgOutcome::Untestable, backtracks),
                    Some((i, v, false)) => {
                        if backtracks >= limit {
                            return (DtpgOutcome::Aborted, backtracks);
                        }
                        backtracks += 1;
                        self.assign[i] = Value3::from(!v);
                        stack.push((i, !v, true));
                        break;
                    }
                    Some((i, _, true)) => self.assign[i] = Value3::X,
                }
            }
        }
    }
}

/// Pin value that lets a difference on `d_pin` through the gate, to assign on `x_pin`
fn propagation_value(gate: &Gate, pins: &[(Value3, Value3)], d_pin: usize, x_pin: usize) -> bool {
    if let Some((ctrl, _)) = gate.controlling_value() {
        return !ctrl;
    }
    match gate {
        Gate::Ternary(_, TernaryType::Mux) => {
            if x_pin == 0 {
                // Select the data input carrying the difference
                d_pin == 1
            } else {
                // The difference is on the select: data inputs must differ
                let other = 3 - x_pin;
                pins[other].0.to_bool().map_or(false, |b| !b)
            }
        }
        Gate::Ternary(_, TernaryType::Maj) => {
            // The two other inputs must differ
            let other = 3 - d_pin - x_pin;
            pins[other].0.to_bool().map_or(false, |b| !b)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atpg::SatBackend;
    use crate::fault::FaultManager;
    use crate::sim::{FaultSimulator, PatternSimulator};
    use crate::NaryType;

    fn check_against_sat(net: &Network) {
        let mut mgr = FaultManager::new();
        mgr.build(net);
        let mut podem = PodemBackend::new();
        let mut sat = SatBackend::new();
        let mut sim = PatternSimulator::new(net);
        podem.activate_all(net);
        for f in mgr.rep_list() {
            let fault = mgr.fault(*f);
            sim.set_faults(&[(*f, fault)]);
            match (podem.run(net, fault), sat.run(net, fault)) {
                (DtpgOutcome::Detected(care), DtpgOutcome::Detected(_)) => {
                    assert_eq!(sim.run_single(net, &care), vec![*f], "{fault}");
                }
                (DtpgOutcome::Untestable, DtpgOutcome::Untestable) => (),
                (a, b) => panic!("{fault}: structural {a:?}, SAT {b:?}"),
            }
        }
    }

    #[test]
    fn test_simple_gates() {
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let c = net.add_input();
        let x0 = net.add(Gate::nary(&[a, !b], NaryType::Nor));
        let x1 = net.add(Gate::mux(c, x0, b));
        let x2 = net.add(Gate::maj(x1, a, !c));
        let x3 = net.xor(x2, x0);
        net.add_output(x3);
        net.add_output(!x1);
        check_against_sat(&net);
    }

    #[test]
    fn test_reconvergence() {
        // o = a | (a & b) = a, so the And is redundant
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let x0 = net.and(a, b);
        let x1 = net.add(Gate::nary(&[a, x0], NaryType::Or));
        net.add_output(x1);
        check_against_sat(&net);

        let mut podem = PodemBackend::new();
        let fault = Fault::OutputStuckAt {
            node: x0,
            value: false,
        };
        assert_eq!(podem.run(&net, fault), DtpgOutcome::Untestable);
    }

    #[test]
    fn test_abort() {
        // o = (a ^ b) & (a & b) is constant, found after a backtrack
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let x = net.xor(a, b);
        let y = net.and(a, b);
        let o = net.and(x, y);
        net.add_output(o);
        let fault = Fault::OutputStuckAt {
            node: o,
            value: false,
        };
        let mut podem = PodemBackend::new();
        podem.set_backtrack_limit(0);
        assert_eq!(podem.run(&net, fault), DtpgOutcome::Aborted);
        podem.set_backtrack_limit(DEFAULT_BACKTRACK_LIMIT);
        assert_eq!(podem.run(&net, fault), DtpgOutcome::Untestable);
        assert!(podem.backtrack_count() > 0);
    }

    #[test]
    fn test_scoping() {
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let c = net.add_input();
        let x0 = net.and(a, b);
        let x1 = net.and(b, c);
        let x2 = net.xor(a, c);
        net.add_output(x0);
        net.add_output(x1);
        let mut podem = PodemBackend::new();
        let on = |node: Signal| Fault::OutputStuckAt { node, value: true };

        assert!(podem.activate_fault(&net, on(b)));
        assert!(podem.check_fault(&net, on(x0)));
        assert!(podem.check_fault(&net, on(x1)));
        podem.deactivate();

        assert!(podem.activate_fault(&net, on(x0)));
        assert!(!podem.check_fault(&net, on(b)));
        assert!(!podem.check_fault(&net, on(x1)));
        podem.deactivate();

        // Dangling logic cannot be observed
        assert!(!podem.activate_fault(&net, on(x2)));
    }
}
