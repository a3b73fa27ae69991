use crate::atpg::SectionTimer;
use crate::fault::FaultManager;
use crate::sim::{FaultSimulator, PatternSimulator};
use crate::tv::{TestVector, TvArena, TvId};
use crate::Network;

/// State shared by the test generation passes
///
/// Owns the network under test, its faults, the test vectors and the fault simulator.
/// Passes take it by mutable reference and run one after the other.
pub struct AtpgContext {
    pub(crate) network: Network,
    pub(crate) fault_mgr: FaultManager,
    pub(crate) tv_arena: TvArena,
    pub(crate) tv_list: Vec<TvId>,
    pub(crate) fsim: Box<dyn FaultSimulator>,
    pub(crate) timer: SectionTimer,
}

impl AtpgContext {
    /// Create a context for a combinatorial network, with the default fault simulator
    pub fn new(network: Network) -> AtpgContext {
        let fsim = Box::new(PatternSimulator::new(&network));
        AtpgContext::with_simulator(network, fsim)
    }

    /// Create a context with a custom fault simulator
    pub fn with_simulator(network: Network, fsim: Box<dyn FaultSimulator>) -> AtpgContext {
        assert!(
            network.is_comb(),
            "Test generation requires a combinatorial network"
        );
        assert!(network.is_topo_sorted());
        let tv_arena = TvArena::new(network.nb_inputs());
        AtpgContext {
            network,
            fault_mgr: FaultManager::new(),
            tv_arena,
            tv_list: Vec::new(),
            fsim,
            timer: SectionTimer::new(),
        }
    }

    /// Network under test
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Fault database
    pub fn fault_mgr(&self) -> &FaultManager {
        &self.fault_mgr
    }

    /// Fault database, for status changes
    pub fn fault_mgr_mut(&mut self) -> &mut FaultManager {
        &mut self.fault_mgr
    }

    /// Storage for the test vectors
    pub fn tv_arena(&self) -> &TvArena {
        &self.tv_arena
    }

    /// Storage for the test vectors, to create new ones
    pub fn tv_arena_mut(&mut self) -> &mut TvArena {
        &mut self.tv_arena
    }

    /// Test vectors generated so far
    pub fn tv_list(&self) -> &[TvId] {
        &self.tv_list
    }

    /// Test vectors generated so far, in order
    pub fn vectors(&self) -> impl Iterator<Item = &TestVector> + '_ {
        self.tv_list.iter().map(|id| self.tv_arena.get(*id))
    }

    /// Time spent in each section
    pub fn timer(&self) -> &SectionTimer {
        &self.timer
    }

    /// Time accounting, to switch sections
    pub fn timer_mut(&mut self) -> &mut SectionTimer {
        &mut self.timer
    }

    /// Create the faults of the network, forgetting any previous result
    pub fn build_faults(&mut self) {
        self.clear_vectors();
        self.fault_mgr.build(&self.network);
        self.fault_mgr.reconcile();
    }

    /// Set the fault simulator to the remaining representative faults
    pub fn prime_simulator(&mut self) {
        let faults: Vec<_> = self
            .fault_mgr
            .remain_list()
            .iter()
            .map(|f| (*f, self.fault_mgr.fault(*f)))
            .collect();
        self.fsim.set_faults(&faults);
    }

    /// Append an externally created vector to the list
    pub fn push_vector(&mut self, tv: TvId) {
        self.tv_list.push(tv);
    }

    /// Give every listed vector back to the arena, and forget the detections they recorded
    pub(crate) fn clear_vectors(&mut self) {
        for tv in self.tv_list.drain(..) {
            self.tv_arena.delete_vector(tv);
        }
        self.fault_mgr.retain_detecting_vectors(|_| false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atpg::TvBuffer;

    #[test]
    fn test_clear_vectors() {
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let x = net.and(a, b);
        net.add_output(x);
        let mut ctx = AtpgContext::new(net);
        ctx.build_faults();
        ctx.prime_simulator();

        let tv = ctx.tv_arena_mut().new_vector();
        assert!(ctx.tv_arena_mut().get_mut(tv).parse_binary("11"));
        let mut buffer = TvBuffer::new();
        buffer.put(&mut ctx, tv);
        ctx.push_vector(tv);
        assert_eq!(buffer.flush(&mut ctx), 1);
        let o0 = ctx.fault_mgr().find_output_fault(x, false);
        assert_eq!(ctx.fault_mgr().detecting_vectors(o0), &[tv]);

        ctx.clear_vectors();
        assert!(ctx.tv_list().is_empty());
        assert_eq!(ctx.tv_arena().nb_free(), 1);
        // The recycled handle is not referenced anymore
        assert!(ctx.fault_mgr().detecting_vectors(o0).is_empty());
    }
}
