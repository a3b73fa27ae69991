use log::trace;

use crate::atpg::{AtpgContext, Section};
use crate::fault::{FaultId, FaultStatus};
use crate::tv::TvId;
use crate::value::WORD_BITS;

/// Batch of vectors waiting for fault simulation
///
/// Vectors are simulated together once the batch is full, and every fault they hit is
/// credited, not only the ones they were generated for.
#[derive(Debug, Default)]
pub struct TvBuffer {
    pending: Vec<TvId>,
}

impl TvBuffer {
    /// Create an empty buffer
    pub fn new() -> TvBuffer {
        TvBuffer {
            pending: Vec::with_capacity(WORD_BITS),
        }
    }

    /// Number of vectors waiting
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if no vector is waiting
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Add a vector, and simulate the batch if it is full
    ///
    /// Returns the number of faults newly detected.
    pub fn put(&mut self, ctx: &mut AtpgContext, tv: TvId) -> usize {
        self.pending.push(tv);
        if self.pending.len() == WORD_BITS {
            self.flush(ctx)
        } else {
            0
        }
    }

    /// Simulate the waiting vectors and mark the faults they detect
    ///
    /// Returns the number of faults newly detected.
    pub fn flush(&mut self, ctx: &mut AtpgContext) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let prev = ctx.timer.change(Section::Fsim);
        let vectors: Vec<_> = self.pending.iter().map(|id| ctx.tv_arena.get(*id)).collect();
        let hits = ctx.fsim.run(&ctx.network, &vectors);
        let mut ret = 0;
        for (tv, faults) in self.pending.iter().zip(hits) {
            ret += credit_detections(ctx, *tv, &faults);
        }
        trace!(
            "Simulated {} buffered vectors, {} new detections",
            self.pending.len(),
            ret
        );
        self.pending.clear();
        ctx.timer.change(prev);
        ret
    }
}

/// Mark the undetected faults hit by a vector as detected, and record the vector for them
///
/// Returns the number of faults newly detected.
pub(crate) fn credit_detections(ctx: &mut AtpgContext, tv: TvId, faults: &[FaultId]) -> usize {
    let mut ret = 0;
    for &f in faults {
        if ctx.fault_mgr.status(f) != FaultStatus::Undetected {
            continue;
        }
        ctx.fault_mgr.set_status(f, FaultStatus::Detected);
        ctx.fault_mgr.record_detection(f, tv);
        ctx.tv_arena.get_mut(tv).add_detected_fault(f);
        ret += 1;
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Network;

    #[test]
    fn test_flush_credits_all_hits() {
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let x = net.and(a, b);
        net.add_output(x);
        let mut ctx = AtpgContext::new(net);
        ctx.build_faults();
        ctx.prime_simulator();

        let mut buffer = TvBuffer::new();
        for s in ["11", "00", "11"] {
            let tv = ctx.tv_arena_mut().new_vector();
            assert!(ctx.tv_arena_mut().get_mut(tv).parse_binary(s));
            assert_eq!(buffer.put(&mut ctx, tv), 0);
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.flush(&mut ctx), 2);
        assert!(buffer.is_empty());
        ctx.fault_mgr_mut().reconcile();

        let o0 = ctx.fault_mgr().find_output_fault(x, false);
        let o1 = ctx.fault_mgr().find_output_fault(x, true);
        assert!(ctx.fault_mgr().det_list().contains(&o0));
        assert!(ctx.fault_mgr().det_list().contains(&o1));
        assert_eq!(ctx.fault_mgr().nb_remaining(), 2);
        // Only the first vector detecting a fault is credited
        assert_eq!(ctx.fault_mgr().detecting_vectors(o0).len(), 1);
    }
}
