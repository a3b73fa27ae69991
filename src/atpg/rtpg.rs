//! Random test generation

use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::atpg::{AtpgContext, Section, TvBuffer};
use crate::tv::TvId;
use crate::value::WORD_BITS;

/// Stopping conditions of the random generator
#[derive(Clone, Debug)]
pub struct RtpgOptions {
    /// Stop when a batch detects fewer faults
    pub min_detect: usize,
    /// Stop after more consecutive batches without any detection
    pub max_stagnant: usize,
    /// Maximum number of vectors generated
    pub max_patterns: usize,
    /// Seed of the random generator
    pub seed: u64,
}

impl Default for RtpgOptions {
    fn default() -> Self {
        RtpgOptions {
            min_detect: 0,
            max_stagnant: 4,
            max_patterns: 100_000,
            seed: 1,
        }
    }
}

/// Results of a random generation run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RtpgStats {
    /// Faults newly detected
    pub detected: usize,
    /// Vectors generated
    pub generated: usize,
    /// Vectors kept in the list
    pub kept: usize,
    /// Batches simulated
    pub batches: usize,
    /// Time spent
    pub time: Duration,
}

impl fmt::Display for RtpgStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} detected with {} patterns ({} kept) in {} batches, {:.2}s",
            self.detected,
            self.generated,
            self.kept,
            self.batches,
            self.time.as_secs_f64()
        )
    }
}

/// Random test pattern generator
///
/// Vectors are generated and simulated by batches of [`WORD_BITS`]. Batches that detect no new
/// fault are thrown away.
pub struct Rtpg {
    rng: SmallRng,
    stats: RtpgStats,
}

impl Rtpg {
    /// Create a generator from a seed
    pub fn new(seed: u64) -> Rtpg {
        Rtpg {
            rng: SmallRng::seed_from_u64(seed),
            stats: RtpgStats::default(),
        }
    }

    /// Results of the last run
    pub fn stats(&self) -> &RtpgStats {
        &self.stats
    }

    /// Run with the stopping conditions of the options
    pub fn run_with(&mut self, ctx: &mut AtpgContext, options: &RtpgOptions) -> RtpgStats {
        self.run(
            ctx,
            options.min_detect,
            options.max_stagnant,
            options.max_patterns,
        )
    }

    /// Generate random vectors until one of the stopping conditions is met
    ///
    /// The run stops when all faults are detected, when a batch detects fewer than `min_detect`
    /// faults, after more than `max_stagnant` consecutive batches without detection, or when
    /// `max_patterns` vectors have been generated.
    pub fn run(
        &mut self,
        ctx: &mut AtpgContext,
        min_detect: usize,
        max_stagnant: usize,
        max_patterns: usize,
    ) -> RtpgStats {
        ctx.fault_mgr.reconcile();
        if ctx.fault_mgr.nb_remaining() == 0 {
            self.stats = RtpgStats::default();
            return self.stats.clone();
        }
        let prev = ctx.timer.change(Section::Rtpg);
        let start = Instant::now();
        ctx.prime_simulator();
        let detected_before = ctx.fault_mgr.nb_detected();

        let mut stats = RtpgStats::default();
        let mut stagnant = 0;
        let mut buffer = TvBuffer::new();
        loop {
            let nb = WORD_BITS.min(max_patterns - stats.generated);
            if nb == 0 {
                break;
            }
            let batch: Vec<TvId> = (0..nb)
                .map(|_| {
                    let tv = ctx.tv_arena.new_vector();
                    ctx.tv_arena.get_mut(tv).fill_random(&mut self.rng);
                    tv
                })
                .collect();
            stats.generated += nb;
            stats.batches += 1;

            let mut det = 0;
            for tv in &batch {
                det += buffer.put(ctx, *tv);
            }
            det += buffer.flush(ctx);
            ctx.fault_mgr.reconcile();
            debug!("Random batch {}: {} new detections", stats.batches, det);

            if det == 0 {
                for tv in batch {
                    ctx.tv_arena.delete_vector(tv);
                }
                stagnant += 1;
            } else {
                stats.kept += nb;
                ctx.tv_list.extend(batch);
                stagnant = 0;
                ctx.prime_simulator();
            }

            if ctx.fault_mgr.nb_remaining() == 0
                || det < min_detect
                || stagnant > max_stagnant
                || stats.generated >= max_patterns
            {
                break;
            }
        }
        stats.detected = ctx.fault_mgr.nb_detected() - detected_before;
        stats.time = start.elapsed();
        info!("Random generation: {stats}");
        ctx.timer.change(prev);
        self.stats = stats;
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::{Fault, FaultId};
    use crate::sim::FaultSimulator;
    use crate::tv::TestVector;
    use crate::Network;

    /// Never detects anything
    struct NullSimulator;

    impl FaultSimulator for NullSimulator {
        fn set_faults(&mut self, _faults: &[(FaultId, Fault)]) {}

        fn run(&mut self, _network: &Network, vectors: &[&TestVector]) -> Vec<Vec<FaultId>> {
            vec![Vec::new(); vectors.len()]
        }
    }

    fn and2() -> (Network, crate::Signal) {
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        let x = net.and(a, b);
        net.add_output(x);
        (net, x)
    }

    #[test]
    fn test_stagnation() {
        let (net, _) = and2();
        let mut ctx = AtpgContext::with_simulator(net, Box::new(NullSimulator));
        ctx.build_faults();
        let stats = Rtpg::new(1).run(&mut ctx, 0, 4, 100_000);
        assert_eq!(stats.batches, 5);
        assert_eq!(stats.generated, 5 * WORD_BITS);
        assert_eq!(stats.kept, 0);
        assert_eq!(stats.detected, 0);
        assert!(ctx.tv_list().is_empty());
        // Discarded vectors are recycled
        assert_eq!(ctx.tv_arena().nb_free(), ctx.tv_arena().nb_allocated());
    }

    #[test]
    fn test_max_patterns() {
        let (net, _) = and2();
        let mut ctx = AtpgContext::with_simulator(net, Box::new(NullSimulator));
        ctx.build_faults();
        let stats = Rtpg::new(1).run(&mut ctx, 0, 4, 100);
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.generated, 100);
    }

    #[test]
    fn test_and2() {
        let (net, x) = and2();
        let mut ctx = AtpgContext::new(net);
        ctx.build_faults();
        assert_eq!(ctx.fault_mgr().nb_reps(), 4);
        let stats = Rtpg::new(3).run_with(&mut ctx, &RtpgOptions::default());
        assert!(ctx.vectors().any(|tv| tv.to_binary() == "11"));
        let o0 = ctx.fault_mgr().find_output_fault(x, false);
        assert!(ctx.fault_mgr().det_list().contains(&o0));
        assert_eq!(ctx.fault_mgr().nb_remaining(), 0);
        assert_eq!(stats.detected, 4);
        assert_eq!(stats.kept, ctx.tv_list().len());
        for tv in ctx.vectors() {
            assert!(tv.is_determined());
        }
    }

    #[test]
    fn test_min_detect() {
        let (net, _) = and2();
        let mut ctx = AtpgContext::new(net);
        ctx.build_faults();
        // At most 4 faults can be detected in the first batch
        let stats = Rtpg::new(3).run(&mut ctx, 5, 4, 100_000);
        assert_eq!(stats.batches, 1);
    }
}
