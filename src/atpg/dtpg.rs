//! Deterministic test generation
//!
//! Each remaining fault is handed to a backend that either finds care bits detecting it or proves
//! it untestable. Care bits are completed with random values, and the resulting vectors are fault
//! simulated so that faults detected by the way are dropped before being targeted.

use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::atpg::buffer::credit_detections;
use crate::atpg::{
    AtpgContext, DtpgBackend, DtpgOutcome, PodemBackend, SatBackend, Section, TvBuffer,
};
use crate::fault::{FaultId, FaultStatus};
use crate::tv::TvId;

/// Engine used for deterministic generation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BackendKind {
    /// SAT-based generation with Kissat
    #[default]
    Sat,
    /// Structural search on the network
    Structural,
}

/// How generated vectors are simulated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SimMode {
    /// No batch simulation, faults are targeted in order
    ///
    /// Without verification a vector is only credited with the fault it was generated for.
    /// With verification, the other faults it detects are credited too.
    None,
    /// Simulate each vector as soon as it is generated, targeting faults in order
    Single,
    /// Target faults in random order and simulate vectors by batches
    #[default]
    Ppsfp,
}

/// Configuration of the deterministic generator
#[derive(Clone, Debug)]
pub struct DtpgConfig {
    /// Engine to use
    pub backend: BackendKind,
    /// Restrict the engine to the region of one fault at a time, if it supports it
    pub scoping: bool,
    /// Maximum number of backtracks per fault for the structural engine
    pub backtrack_limit: usize,
    /// Check every generated vector by fault simulation
    pub verify: bool,
    /// Simulation of the generated vectors
    pub sim_mode: SimMode,
    /// Seed for random completion of the vectors and fault order
    pub seed: u64,
}

impl Default for DtpgConfig {
    fn default() -> Self {
        DtpgConfig {
            backend: BackendKind::Sat,
            scoping: false,
            backtrack_limit: crate::atpg::podem::DEFAULT_BACKTRACK_LIMIT,
            verify: true,
            sim_mode: SimMode::Ppsfp,
            seed: 1,
        }
    }
}

/// Results of a deterministic generation run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DtpgStats {
    /// Number of calls to the engine
    pub nb_calls: usize,
    /// Faults newly detected, by generated vectors or as a side effect
    pub detected: usize,
    /// Faults proven untestable
    pub untestable: usize,
    /// Faults on which the engine gave up
    pub aborted: usize,
    /// Vectors generated
    pub patterns: usize,
    /// Backtracks in the engine
    pub backtracks: usize,
    /// Time spent
    pub time: Duration,
}

impl fmt::Display for DtpgStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} calls, {} detected, {} untestable, {} aborted, {} patterns, {} backtracks in {:.2}s",
            self.nb_calls,
            self.detected,
            self.untestable,
            self.aborted,
            self.patterns,
            self.backtracks,
            self.time.as_secs_f64()
        )
    }
}

/// Deterministic test pattern generator
pub struct Dtpg {
    config: DtpgConfig,
    backend: Box<dyn DtpgBackend>,
    rng: SmallRng,
    nb_calls: usize,
    nb_aborted: usize,
    stats: DtpgStats,
}

impl Dtpg {
    /// Create a generator with the engine selected by the configuration
    pub fn new(config: DtpgConfig) -> Dtpg {
        let backend: Box<dyn DtpgBackend> = match config.backend {
            BackendKind::Sat => Box::new(SatBackend::new()),
            BackendKind::Structural => Box::new(PodemBackend::new()),
        };
        Dtpg::with_backend(config, backend)
    }

    /// Create a generator with a custom engine
    pub fn with_backend(config: DtpgConfig, mut backend: Box<dyn DtpgBackend>) -> Dtpg {
        backend.set_backtrack_limit(config.backtrack_limit);
        let rng = SmallRng::seed_from_u64(config.seed);
        Dtpg {
            config,
            backend,
            rng,
            nb_calls: 0,
            nb_aborted: 0,
            stats: DtpgStats::default(),
        }
    }

    /// Configuration
    pub fn config(&self) -> &DtpgConfig {
        &self.config
    }

    /// Results of the last run
    pub fn stats(&self) -> &DtpgStats {
        &self.stats
    }

    /// Target every remaining fault
    ///
    /// Aborted faults go back to the remaining list at the end of the run, so that a later run
    /// retries them.
    pub fn run(&mut self, ctx: &mut AtpgContext) -> DtpgStats {
        ctx.fault_mgr.reconcile();
        if ctx.fault_mgr.nb_remaining() == 0 {
            self.stats = DtpgStats::default();
            return self.stats.clone();
        }
        let prev = ctx.timer.change(Section::Dtpg);
        let start = Instant::now();
        ctx.prime_simulator();

        let detected_before = ctx.fault_mgr.nb_detected();
        let untestable_before = ctx.fault_mgr.nb_untestable();
        let patterns_before = ctx.tv_list.len();
        let calls_before = self.nb_calls;
        let aborted_before = self.nb_aborted;
        let backtracks_before = self.backend.backtrack_count();

        let mut buffer = TvBuffer::new();
        if self.config.scoping && self.backend.supports_scoping() {
            self.run_scoped(ctx, &mut buffer);
        } else {
            self.backend.activate_all(&ctx.network);
            let faults = ctx.fault_mgr.remain_list().to_vec();
            self.process(ctx, &mut buffer, faults);
            self.backend.deactivate();
        }
        buffer.flush(ctx);
        ctx.fault_mgr.reconcile();

        self.stats = DtpgStats {
            nb_calls: self.nb_calls - calls_before,
            detected: ctx.fault_mgr.nb_detected() - detected_before,
            untestable: ctx.fault_mgr.nb_untestable() - untestable_before,
            aborted: self.nb_aborted - aborted_before,
            patterns: ctx.tv_list.len() - patterns_before,
            backtracks: self.backend.backtrack_count() - backtracks_before,
            time: start.elapsed(),
        };
        info!("Deterministic generation ({}): {}", self.backend.name(), self.stats);
        ctx.timer.change(prev);
        self.stats.clone()
    }

    /// Process the faults one region at a time
    fn run_scoped(&mut self, ctx: &mut AtpgContext, buffer: &mut TvBuffer) {
        let faults = ctx.fault_mgr.remain_list().to_vec();
        let mut cursor = 0;
        loop {
            while cursor < faults.len()
                && ctx.fault_mgr.status(faults[cursor]) != FaultStatus::Undetected
            {
                cursor += 1;
            }
            let Some(&f0) = faults.get(cursor) else {
                break;
            };
            cursor += 1;
            if !self
                .backend
                .activate_fault(&ctx.network, ctx.fault_mgr.fault(f0))
            {
                debug!("{} is not observable", ctx.fault_mgr.fault(f0));
                ctx.fault_mgr.set_status(f0, FaultStatus::Untestable);
                continue;
            }
            let mut cur = vec![f0];
            for &f in &faults[cursor..] {
                if ctx.fault_mgr.status(f) == FaultStatus::Undetected
                    && self.backend.check_fault(&ctx.network, ctx.fault_mgr.fault(f))
                {
                    cur.push(f);
                }
            }
            debug!("Region of {} contains {} faults", ctx.fault_mgr.fault(f0), cur.len());
            self.process(ctx, buffer, cur);
            self.backend.deactivate();
        }
    }

    /// Target a list of faults in the order given by the simulation mode
    fn process(&mut self, ctx: &mut AtpgContext, buffer: &mut TvBuffer, mut faults: Vec<FaultId>) {
        match self.config.sim_mode {
            SimMode::None => {
                for f in faults {
                    if let Some(tv) = self.generate_one(ctx, f) {
                        ctx.tv_list.push(tv);
                    }
                }
            }
            SimMode::Single => {
                for f in faults {
                    if let Some(tv) = self.generate_one(ctx, f) {
                        buffer.put(ctx, tv);
                        buffer.flush(ctx);
                        ctx.tv_list.push(tv);
                    }
                }
            }
            SimMode::Ppsfp => {
                while !faults.is_empty() {
                    let i = self.rng.gen_range(0..faults.len());
                    let f = faults.swap_remove(i);
                    if let Some(tv) = self.generate_one(ctx, f) {
                        buffer.put(ctx, tv);
                        ctx.tv_list.push(tv);
                    }
                }
            }
        }
    }

    /// Generate a vector for a single fault
    ///
    /// Nothing is done if the fault is no longer undetected. Otherwise the fault status is
    /// updated with the outcome. The vector is not added to the list of the context.
    /// With verification enabled, the fault simulator must have been primed with the fault.
    pub fn generate_one(&mut self, ctx: &mut AtpgContext, f: FaultId) -> Option<TvId> {
        let f = ctx.fault_mgr.representative(f);
        if ctx.fault_mgr.status(f) != FaultStatus::Undetected {
            return None;
        }
        let fault = ctx.fault_mgr.fault(f);
        self.nb_calls += 1;
        let prev = (self.config.backend == BackendKind::Sat).then(|| ctx.timer.change(Section::Sat));
        let outcome = self.backend.run(&ctx.network, fault);
        if let Some(prev) = prev {
            ctx.timer.change(prev);
        }
        match outcome {
            DtpgOutcome::Untestable => {
                debug!("{fault} is untestable");
                ctx.fault_mgr.set_status(f, FaultStatus::Untestable);
                None
            }
            DtpgOutcome::Aborted => {
                debug!("Aborted on {fault}");
                ctx.fault_mgr.set_status(f, FaultStatus::Aborted);
                self.nb_aborted += 1;
                None
            }
            DtpgOutcome::Detected(care) => {
                let tv = ctx.tv_arena.new_vector();
                let v = ctx.tv_arena.get_mut(tv);
                v.fill_random(&mut self.rng);
                v.merge_from(&care);
                if self.config.verify {
                    let prev = ctx.timer.change(Section::Fsim);
                    let hits = ctx.fsim.run_single(&ctx.network, ctx.tv_arena.get(tv));
                    ctx.timer.change(prev);
                    assert!(
                        hits.contains(&f),
                        "Vector {} generated for {fault} does not detect it",
                        ctx.tv_arena.get(tv)
                    );
                    credit_detections(ctx, tv, &hits);
                }
                credit_detections(ctx, tv, &[f]);
                Some(tv)
            }
        }
    }
}
