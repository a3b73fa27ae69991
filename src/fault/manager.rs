use log::debug;

use crate::fault::{Fault, FaultId, FaultStatus};
use crate::network::Topology;
use crate::tv::TvId;
use crate::{Gate, Network, Signal};

/// Information shared by all faults of an equivalence class
#[derive(Clone, Debug)]
struct FaultClass {
    status: FaultStatus,
    det_vectors: Vec<TvId>,
    members: Vec<FaultId>,
}

/// Database of the stuck-at faults of a network
///
/// Every node has a table of `2 + 2 * fanin` faults: stuck-at-0/1 on the output, then
/// stuck-at-0/1 on each input pin. Equivalent faults share a class, whose first member is
/// the representative and carries the status.
///
/// The representatives are partitioned in three lists: detected, remaining and untestable.
/// Status changes do not move faults between lists; [`FaultManager::reconcile`] must be called
/// before reading them again.
#[derive(Clone, Debug, Default)]
pub struct FaultManager {
    nb_inputs: usize,
    /// First fault of each node
    node_offset: Vec<usize>,
    faults: Vec<Fault>,
    /// Class of each fault, once registered
    class_of: Vec<Option<u32>>,
    classes: Vec<FaultClass>,
    all: Vec<FaultId>,
    reps: Vec<FaultId>,
    det: Vec<FaultId>,
    remain: Vec<FaultId>,
    untest: Vec<FaultId>,
    dirty: bool,
    built: bool,
}

impl FaultManager {
    /// Create an empty manager
    pub fn new() -> FaultManager {
        FaultManager::default()
    }

    /// Forget all faults and classes
    pub fn clear(&mut self) {
        *self = FaultManager {
            dirty: true,
            ..FaultManager::default()
        };
    }

    /// Create the fault tables of a network, without registering any fault
    ///
    /// Faults are then registered with [`FaultManager::add_output_fault`] and
    /// [`FaultManager::add_input_fault`]. Most users want [`FaultManager::build`] instead.
    pub fn allocate(&mut self, network: &Network) {
        self.clear();
        self.nb_inputs = network.nb_inputs();
        for i in 0..network.nb_inputs() {
            let node = network.input(i);
            self.node_offset.push(self.faults.len());
            for value in [false, true] {
                self.faults.push(Fault::OutputStuckAt { node, value });
            }
        }
        for i in 0..network.nb_nodes() {
            let node = network.node(i);
            self.node_offset.push(self.faults.len());
            for value in [false, true] {
                self.faults.push(Fault::OutputStuckAt { node, value });
            }
            for input in 0..network.gate(i).nb_pins() {
                for value in [false, true] {
                    self.faults.push(Fault::InputStuckAt { node, input, value });
                }
            }
        }
        self.class_of = vec![None; self.faults.len()];
        self.built = true;
    }

    /// Create all faults of a combinatorial network and group them in equivalence classes
    ///
    /// Fanout-free regions are processed one at a time, from their root towards their inputs,
    /// and primary inputs last. A node with a single fanout shares the classes of the pin it
    /// feeds. Input faults join an output class when fixing the pin fixes the gate output.
    pub fn build(&mut self, network: &Network) {
        assert!(
            network.is_comb(),
            "Fault analysis requires a combinatorial network"
        );
        self.allocate(network);
        let topo = Topology::new(network);
        for g in topo.ffr_order(network) {
            self.register_node(network, &topo, topo.gate_index(g));
        }
        for i in 0..network.nb_inputs() {
            self.register_node(network, &topo, i);
        }
        debug!(
            "Built {} faults in {} equivalence classes",
            self.nb_faults(),
            self.nb_reps()
        );
    }

    /// Register the faults of a node, finding their representatives
    fn register_node(&mut self, network: &Network, topo: &Topology, node: usize) {
        let s = topo.signal(node);
        let (rep0, rep1) = match topo.single_fanout(node) {
            Some((g, pin)) => {
                let inv = network.gate(g).dependencies()[pin].is_inverted();
                let gs = network.node(g);
                (
                    Some(self.find_input_fault(gs, pin, inv)),
                    Some(self.find_input_fault(gs, pin, !inv)),
                )
            }
            None => (None, None),
        };
        let f0 = self.add_output_fault(s, false, rep0);
        let f1 = self.add_output_fault(s, true, rep1);
        if let Some(g) = topo.gate_of(node) {
            let gate = network.gate(g);
            for pos in 0..gate.nb_pins() {
                for value in [false, true] {
                    let rep = input_fault_rep(gate, pos, value).map(|v| if v { f1 } else { f0 });
                    self.add_input_fault(s, pos, value, rep);
                }
            }
        }
    }

    /// Register an output fault, in the class of `rep` or in a new class
    pub fn add_output_fault(&mut self, node: Signal, value: bool, rep: Option<FaultId>) -> FaultId {
        let f = self.find_output_fault(node, value);
        self.add_fault(f, rep);
        f
    }

    /// Register an input fault, in the class of `rep` or in a new class
    pub fn add_input_fault(
        &mut self,
        node: Signal,
        pos: usize,
        value: bool,
        rep: Option<FaultId>,
    ) -> FaultId {
        let f = self.find_input_fault(node, pos, value);
        self.add_fault(f, rep);
        f
    }

    fn add_fault(&mut self, f: FaultId, rep: Option<FaultId>) {
        assert!(
            self.class_of[f.index()].is_none(),
            "{} registered twice",
            self.fault(f)
        );
        let class = match rep {
            Some(r) => self.class_index(r),
            None => {
                self.classes.push(FaultClass {
                    status: FaultStatus::Undetected,
                    det_vectors: Vec::new(),
                    members: Vec::new(),
                });
                self.reps.push(f);
                self.remain.push(f);
                self.classes.len() - 1
            }
        };
        self.classes[class].members.push(f);
        self.class_of[f.index()] = Some(class as u32);
        self.all.push(f);
        self.dirty = true;
    }

    fn node_index(&self, node: Signal) -> usize {
        debug_assert!(self.built, "Fault tables queried before build");
        debug_assert!(!node.is_inverted());
        if node.is_input() {
            node.input() as usize
        } else {
            self.nb_inputs + node.var() as usize
        }
    }

    fn class_index(&self, f: FaultId) -> usize {
        match self.class_of[f.index()] {
            Some(c) => c as usize,
            None => panic!("{} is not registered", self.fault(f)),
        }
    }

    /// Output fault of a node
    pub fn find_output_fault(&self, node: Signal, value: bool) -> FaultId {
        let offset = self.node_offset[self.node_index(node)];
        FaultId((offset + value as usize) as u32)
    }

    /// Input fault of a gate
    pub fn find_input_fault(&self, node: Signal, pos: usize, value: bool) -> FaultId {
        let n = self.node_index(node);
        let offset = self.node_offset[n];
        let end = self
            .node_offset
            .get(n + 1)
            .copied()
            .unwrap_or(self.faults.len());
        let f = offset + 2 + 2 * pos + value as usize;
        assert!(f < end, "Pin {pos} out of range for {node}");
        FaultId(f as u32)
    }

    /// Location and value of a fault
    pub fn fault(&self, f: FaultId) -> Fault {
        self.faults[f.index()]
    }

    /// Status of the fault's class
    pub fn status(&self, f: FaultId) -> FaultStatus {
        self.classes[self.class_index(f)].status
    }

    /// Representative of the fault's class
    pub fn representative(&self, f: FaultId) -> FaultId {
        self.classes[self.class_index(f)].members[0]
    }

    /// All faults equivalent to this one, representative first
    pub fn class_members(&self, f: FaultId) -> &[FaultId] {
        &self.classes[self.class_index(f)].members
    }

    /// Vectors recorded to detect the fault's class
    pub fn detecting_vectors(&self, f: FaultId) -> &[TvId] {
        &self.classes[self.class_index(f)].det_vectors
    }

    /// Change the status of the fault's class
    ///
    /// The lists are not updated until the next call to [`FaultManager::reconcile`].
    pub fn set_status(&mut self, f: FaultId, status: FaultStatus) {
        let c = self.class_index(f);
        self.classes[c].status = status;
        self.dirty = true;
    }

    /// Record that a vector detects the fault's class
    pub fn record_detection(&mut self, f: FaultId, tv: TvId) {
        let c = self.class_index(f);
        let v = &mut self.classes[c].det_vectors;
        if !v.contains(&tv) {
            v.push(tv);
        }
    }

    /// Forget the detecting vectors that do not satisfy the predicate
    pub fn retain_detecting_vectors<F: Fn(TvId) -> bool>(&mut self, keep: F) {
        for c in &mut self.classes {
            c.det_vectors.retain(|tv| keep(*tv));
        }
    }

    /// Re-partition the remaining faults according to their status
    ///
    /// Detected and untestable faults move to their own list. Aborted faults are reset to
    /// undetected and stay. Without status changes since the last call, this does nothing.
    pub fn reconcile(&mut self) {
        if !self.dirty {
            return;
        }
        let mut kept = Vec::with_capacity(self.remain.len());
        for &f in &self.remain {
            let c = self.class_index(f);
            let status = self.classes[c].status.after_reconcile();
            self.classes[c].status = status;
            match status {
                FaultStatus::Undetected => kept.push(f),
                FaultStatus::Detected => self.det.push(f),
                FaultStatus::Untestable => self.untest.push(f),
                FaultStatus::Aborted => unreachable!(),
            }
        }
        self.remain = kept;
        self.dirty = false;
    }

    /// Returns true if statuses changed since the last [`FaultManager::reconcile`]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// All registered faults
    pub fn all_list(&self) -> &[FaultId] {
        &self.all
    }

    /// Representative faults
    pub fn rep_list(&self) -> &[FaultId] {
        &self.reps
    }

    /// Detected representatives
    pub fn det_list(&self) -> &[FaultId] {
        &self.det
    }

    /// Representatives still to be processed
    pub fn remain_list(&self) -> &[FaultId] {
        &self.remain
    }

    /// Untestable representatives
    pub fn untest_list(&self) -> &[FaultId] {
        &self.untest
    }

    /// Number of registered faults
    pub fn nb_faults(&self) -> usize {
        self.all.len()
    }

    /// Number of equivalence classes
    pub fn nb_reps(&self) -> usize {
        self.reps.len()
    }

    /// Number of detected classes
    pub fn nb_detected(&self) -> usize {
        self.det.len()
    }

    /// Number of remaining classes
    pub fn nb_remaining(&self) -> usize {
        self.remain.len()
    }

    /// Number of untestable classes
    pub fn nb_untestable(&self) -> usize {
        self.untest.len()
    }

    /// Proportion of detected classes
    pub fn coverage(&self) -> f64 {
        if self.reps.is_empty() {
            1.0
        } else {
            self.det.len() as f64 / self.reps.len() as f64
        }
    }
}

/// Output value an input fault is equivalent to being stuck at, if any
fn input_fault_rep(gate: &Gate, pos: usize, value: bool) -> Option<bool> {
    if gate.is_xor_like() {
        None
    } else {
        gate.cofactor(pos, value)
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::NaryType;

    fn and2() -> Network {
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let x = net.and(a, b);
        net.add_output(x);
        net
    }

    fn check_partition(mgr: &FaultManager) {
        for f in mgr.rep_list() {
            let nb = [mgr.det_list(), mgr.remain_list(), mgr.untest_list()]
                .iter()
                .filter(|l| l.contains(f))
                .count();
            assert_eq!(nb, 1, "{} is in {} lists", mgr.fault(*f), nb);
        }
        assert_eq!(
            mgr.nb_detected() + mgr.nb_remaining() + mgr.nb_untestable(),
            mgr.nb_reps()
        );
    }

    #[test]
    fn test_and2_classes() {
        let net = and2();
        let mut mgr = FaultManager::new();
        mgr.build(&net);
        assert_eq!(mgr.nb_faults(), 10);
        assert_eq!(mgr.nb_reps(), 4);
        let x = net.node(0);
        let o0 = mgr.find_output_fault(x, false);
        let o1 = mgr.find_output_fault(x, true);
        assert!(mgr.rep_list().contains(&o0));
        assert!(mgr.rep_list().contains(&o1));
        // Both input stuck-at-0 and both primary input stuck-at-0 are the output stuck-at-0
        for i in 0..2 {
            let pin = mgr.find_input_fault(x, i, false);
            assert_eq!(mgr.representative(pin), o0);
            let pi = mgr.find_output_fault(net.input(i), false);
            assert_eq!(mgr.representative(pi), o0);
            // Stuck-at-1 on each input is its own class, shared with the primary input
            let pin1 = mgr.find_input_fault(x, i, true);
            let pi1 = mgr.find_output_fault(net.input(i), true);
            assert_eq!(mgr.representative(pi1), pin1);
            assert_eq!(mgr.representative(pin1), pin1);
        }
        assert_eq!(mgr.class_members(o0).len(), 5);
        assert_eq!(mgr.class_members(o1).len(), 1);
        check_partition(&mgr);
    }

    #[test]
    fn test_inverted_edge() {
        // x0 = !i0 & i1, x1 = !x0 & i1 ; the input i1 has two fanouts
        let mut net = Network::new();
        let i0 = net.add_input();
        let i1 = net.add_input();
        let x0 = net.and(!i0, i1);
        let x1 = net.and(!x0, i1);
        net.add_output(x1);
        let mut mgr = FaultManager::new();
        mgr.build(&net);
        // i0 stuck at 1 means the And sees 0 on pin 0
        let pi1 = mgr.find_output_fault(i0, true);
        assert_eq!(
            mgr.representative(pi1),
            mgr.find_output_fault(x0, false)
        );
        // x0 stuck at 0 means x1 sees 1 on pin 0, which is not collapsed
        let x0_0 = mgr.find_output_fault(x0, false);
        let x1_p0_1 = mgr.find_input_fault(x1, 0, true);
        assert_eq!(mgr.representative(x0_0), x1_p0_1);
        // x0 stuck at 1 collapses onto x1 stuck at 0
        let x0_1 = mgr.find_output_fault(x0, true);
        assert_eq!(
            mgr.representative(x0_1),
            mgr.find_output_fault(x1, false)
        );
        // i1 is a stem
        let i1_0 = mgr.find_output_fault(i1, false);
        assert_eq!(mgr.representative(i1_0), i1_0);
    }

    #[test]
    fn test_gate_rules() {
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let c = net.add_input();
        let nand = net.add(Gate::nary(&[a, b], NaryType::Nand));
        let nor = net.add(Gate::nary(&[a, b], NaryType::Nor));
        let or = net.add(Gate::nary(&[a, c], NaryType::Or));
        let xor = net.xor(b, c);
        let mux = net.add(Gate::mux(a, b, c));
        let buf = net.add(Gate::Buf(!c));
        for s in [nand, nor, or, xor, mux, buf] {
            net.add_output(s);
        }
        let mut mgr = FaultManager::new();
        mgr.build(&net);
        let rep = |f: FaultId| mgr.representative(f);
        assert_eq!(
            rep(mgr.find_input_fault(nand, 1, false)),
            mgr.find_output_fault(nand, true)
        );
        assert_eq!(
            rep(mgr.find_input_fault(nor, 0, true)),
            mgr.find_output_fault(nor, false)
        );
        assert_eq!(
            rep(mgr.find_input_fault(or, 1, true)),
            mgr.find_output_fault(or, true)
        );
        for pos in 0..2 {
            for value in [false, true] {
                let f = mgr.find_input_fault(xor, pos, value);
                assert_eq!(rep(f), f);
                // No single mux pin fixes the output
                let f = mgr.find_input_fault(mux, pos, value);
                assert_eq!(rep(f), f);
            }
        }
        assert_eq!(
            rep(mgr.find_input_fault(buf, 0, true)),
            mgr.find_output_fault(buf, true)
        );
        // Every fault is in exactly one class
        let total: usize = mgr
            .rep_list()
            .iter()
            .map(|f| mgr.class_members(*f).len())
            .sum();
        assert_eq!(total, mgr.nb_faults());
        assert_eq!(mgr.all_list().iter().unique().count(), mgr.nb_faults());
    }

    #[test]
    fn test_reconcile() {
        let net = and2();
        let mut mgr = FaultManager::new();
        mgr.build(&net);
        mgr.reconcile();
        assert!(!mgr.is_dirty());
        let reps = mgr.rep_list().to_vec();
        mgr.set_status(reps[0], FaultStatus::Detected);
        mgr.set_status(reps[1], FaultStatus::Untestable);
        mgr.set_status(reps[2], FaultStatus::Aborted);
        assert!(mgr.is_dirty());
        // Lists are stale until reconciled
        assert_eq!(mgr.nb_remaining(), 4);
        mgr.reconcile();
        check_partition(&mgr);
        assert_eq!(mgr.det_list(), &[reps[0]]);
        assert_eq!(mgr.untest_list(), &[reps[1]]);
        assert_eq!(mgr.remain_list(), &[reps[2], reps[3]]);
        assert_eq!(mgr.status(reps[2]), FaultStatus::Undetected);

        let (det, remain, untest) = (
            mgr.det_list().to_vec(),
            mgr.remain_list().to_vec(),
            mgr.untest_list().to_vec(),
        );
        mgr.reconcile();
        assert_eq!(mgr.det_list(), det.as_slice());
        assert_eq!(mgr.remain_list(), remain.as_slice());
        assert_eq!(mgr.untest_list(), untest.as_slice());
    }

    #[test]
    fn test_status_is_shared() {
        let net = and2();
        let mut mgr = FaultManager::new();
        mgr.build(&net);
        let pi0 = mgr.find_output_fault(net.input(0), false);
        mgr.set_status(pi0, FaultStatus::Detected);
        let o0 = mgr.find_output_fault(net.node(0), false);
        assert_eq!(mgr.status(o0), FaultStatus::Detected);
    }

    #[test]
    fn test_manual_registration() {
        let net = and2();
        let mut mgr = FaultManager::new();
        mgr.allocate(&net);
        let x = net.node(0);
        let o0 = mgr.add_output_fault(x, false, None);
        let p0 = mgr.add_input_fault(x, 0, false, Some(o0));
        assert_eq!(mgr.nb_faults(), 2);
        assert_eq!(mgr.nb_reps(), 1);
        assert_eq!(mgr.class_members(p0), &[o0, p0]);
    }

    #[test]
    #[should_panic]
    fn test_pin_out_of_range() {
        let net = and2();
        let mut mgr = FaultManager::new();
        mgr.build(&net);
        mgr.find_input_fault(net.node(0), 2, false);
    }
}
