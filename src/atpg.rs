//! Test pattern generation
//!
//! Patterns are generated in passes sharing an [`AtpgContext`]: random generation first, then
//! deterministic generation for the faults that random vectors missed, and finally compaction of
//! the vector list.

mod backend;
mod buffer;
mod compact;
mod context;
mod dtpg;
mod podem;
mod rtpg;
mod sat;
mod timer;

use std::fmt;

use kdam::{tqdm, Bar, BarExt};
use log::{info, warn};

pub use backend::{DtpgBackend, DtpgOutcome};
pub use buffer::TvBuffer;
pub use compact::compact_patterns;
pub use context::AtpgContext;
pub use dtpg::{BackendKind, Dtpg, DtpgConfig, DtpgStats, SimMode};
pub use podem::{PodemBackend, DEFAULT_BACKTRACK_LIMIT};
pub use rtpg::{Rtpg, RtpgOptions, RtpgStats};
pub use sat::SatBackend;
pub use timer::{Section, SectionTimer};

use crate::{Gate, Network};

/// Expose flip_flops as inputs for ATPG
///
/// Flip-flop outputs are exposed are primary inputs. Flip-flop inputs, including
/// enable and reset, become primary outputs.
/// The new inputs and outputs are added after the original inputs, and their order
/// matches the order of the flip flops. The result is topologically sorted.
pub fn expose_dff(network: &Network) -> Network {
    let mut ret = Network::new();
    ret.add_inputs(network.nb_inputs());
    for i in 0..network.nb_outputs() {
        ret.add_output(network.output(i));
    }
    for i in 0..network.nb_nodes() {
        if let Gate::Dff([d, en, res]) = network.gate(i) {
            let new_input = ret.add_input();
            ret.add(Gate::Buf(new_input));
            ret.add_output(*d);
            if !en.is_constant() {
                ret.add_output(*en);
            }
            if !res.is_constant() {
                ret.add_output(*res);
            }
        } else {
            ret.add(network.gate(i).clone());
        }
    }
    ret.topo_sort();
    ret.check();
    ret
}

/// Options of the complete generation flow
#[derive(Clone, Debug)]
pub struct AtpgOptions {
    /// Random generation
    pub rtpg: RtpgOptions,
    /// Deterministic generation
    pub dtpg: DtpgConfig,
    /// Retry aborted faults with the other engine
    pub fallback: bool,
    /// Compact the vectors at the end
    pub compact: bool,
    /// Show a progress bar
    pub progress: bool,
}

impl Default for AtpgOptions {
    fn default() -> Self {
        AtpgOptions {
            rtpg: RtpgOptions::default(),
            dtpg: DtpgConfig::default(),
            fallback: true,
            compact: true,
            progress: false,
        }
    }
}

/// Summary of the complete generation flow
#[derive(Clone, Debug, Default)]
pub struct AtpgReport {
    /// Number of faults
    pub nb_faults: usize,
    /// Number of representative faults
    pub nb_reps: usize,
    /// Representative faults detected
    pub detected: usize,
    /// Representative faults proven untestable
    pub untestable: usize,
    /// Representative faults left undetected
    pub remaining: usize,
    /// Vectors in the final list
    pub patterns: usize,
    /// Random generation
    pub rtpg: RtpgStats,
    /// Deterministic generation
    pub dtpg: DtpgStats,
    /// Deterministic generation with the other engine, if it ran
    pub fallback: Option<DtpgStats>,
}

impl AtpgReport {
    /// Ratio of detected representative faults
    pub fn coverage(&self) -> f64 {
        if self.nb_reps == 0 {
            1.0
        } else {
            self.detected as f64 / self.nb_reps as f64
        }
    }
}

impl fmt::Display for AtpgReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Faults: {} ({} classes)", self.nb_faults, self.nb_reps)?;
        writeln!(f, "  Detected: {}", self.detected)?;
        writeln!(f, "  Untestable: {}", self.untestable)?;
        writeln!(f, "  Remaining: {}", self.remaining)?;
        writeln!(f, "Patterns: {}", self.patterns)?;
        writeln!(f, "Random: {}", self.rtpg)?;
        writeln!(f, "Deterministic: {}", self.dtpg)?;
        if let Some(s) = &self.fallback {
            writeln!(f, "Fallback: {s}")?;
        }
        write!(f, "Coverage: {:.2}%", 100.0 * self.coverage())
    }
}

fn update_progress(progress: &mut Option<Bar>, ctx: &AtpgContext) {
    if let Some(bar) = progress {
        let mgr = ctx.fault_mgr();
        bar.set_postfix(format!(
            "patterns={} untestable={}",
            ctx.tv_list().len(),
            mgr.nb_untestable()
        ));
        if let Err(e) = bar.update_to(mgr.nb_detected() + mgr.nb_untestable()) {
            warn!("Cannot update the progress bar: {e}");
        }
    }
}

fn write_progress(progress: &mut Option<Bar>, msg: String) {
    if let Some(bar) = progress {
        if let Err(e) = bar.write(msg) {
            warn!("Cannot write to the progress bar: {e}");
        }
    }
}

/// Generate combinatorial test patterns
///
/// This will build the faults of the network, generate random test patterns, then target the
/// remaining faults with a deterministic engine. The vectors are left in the context.
pub fn generate_test_patterns(ctx: &mut AtpgContext, options: &AtpgOptions) -> AtpgReport {
    ctx.build_faults();
    let mut progress = options.progress.then(|| {
        let mut bar = tqdm!(total = ctx.fault_mgr().nb_reps());
        bar.set_description("Faults processed");
        bar
    });
    write_progress(
        &mut progress,
        format!(
            "Analyzing network with {} inputs, {} outputs and {} possible faults ({} classes)",
            ctx.network().nb_inputs(),
            ctx.network().nb_outputs(),
            ctx.fault_mgr().nb_faults(),
            ctx.fault_mgr().nb_reps(),
        ),
    );

    let rtpg = Rtpg::new(options.rtpg.seed).run_with(ctx, &options.rtpg);
    update_progress(&mut progress, ctx);
    write_progress(&mut progress, format!("Random generation: {rtpg}"));

    let dtpg = Dtpg::new(options.dtpg.clone()).run(ctx);
    update_progress(&mut progress, ctx);
    write_progress(&mut progress, format!("Deterministic generation: {dtpg}"));

    let fallback = if options.fallback && ctx.fault_mgr().nb_remaining() > 0 {
        let backend = match options.dtpg.backend {
            BackendKind::Sat => BackendKind::Structural,
            BackendKind::Structural => BackendKind::Sat,
        };
        let config = DtpgConfig {
            backend,
            ..options.dtpg.clone()
        };
        let stats = Dtpg::new(config).run(ctx);
        update_progress(&mut progress, ctx);
        write_progress(&mut progress, format!("Fallback generation: {stats}"));
        Some(stats)
    } else {
        None
    };

    if options.compact {
        let before = ctx.tv_list().len();
        let kept = compact_patterns(ctx);
        write_progress(
            &mut progress,
            format!("Kept {kept} patterns out of {before}"),
        );
    }

    let mgr = ctx.fault_mgr();
    let report = AtpgReport {
        nb_faults: mgr.nb_faults(),
        nb_reps: mgr.nb_reps(),
        detected: mgr.nb_detected(),
        untestable: mgr.nb_untestable(),
        remaining: mgr.nb_remaining(),
        patterns: ctx.tv_list().len(),
        rtpg,
        dtpg,
        fallback,
    };
    info!(
        "Generated {} patterns, detecting {}/{} fault classes ({:.2}% coverage, {} untestable)",
        report.patterns,
        report.detected,
        report.nb_reps,
        100.0 * report.coverage(),
        report.untestable
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NaryType, Signal};

    #[test]
    fn test_expose_dff() {
        let mut net = Network::new();
        let a = net.add_input();
        let b = net.add_input();
        // Flip-flop looping on itself through a gate
        let q = Signal::from_var(1);
        let x = net.xor(a, q);
        net.add(Gate::dff(x, b, Signal::zero()));
        net.add_output(x);
        assert!(!net.is_comb());

        let comb = expose_dff(&net);
        assert!(comb.is_comb());
        assert!(comb.is_topo_sorted());
        assert_eq!(comb.nb_inputs(), 3);
        // Original output, data and enable
        assert_eq!(comb.nb_outputs(), 3);
    }

    #[test]
    fn test_full_flow() {
        let mut net = Network::new();
        let inputs: Vec<_> = (0..5).map(|_| net.add_input()).collect();
        let x0 = net.add(Gate::nary(&inputs[0..4], NaryType::And));
        let x1 = net.add(Gate::nary(&[x0, inputs[4]], NaryType::Nor));
        let x2 = net.xor(x1, inputs[2]);
        let x3 = net.and(x2, x2);
        net.add_output(x3);
        net.add_output(!x1);

        for backend in [BackendKind::Sat, BackendKind::Structural] {
            let mut ctx = AtpgContext::new(net.clone());
            let options = AtpgOptions {
                dtpg: DtpgConfig {
                    backend,
                    scoping: true,
                    ..Default::default()
                },
                progress: backend == BackendKind::Structural,
                ..Default::default()
            };
            let report = generate_test_patterns(&mut ctx, &options);
            assert_eq!(report.remaining, 0);
            assert_eq!(report.detected + report.untestable, report.nb_reps);
            assert_eq!(report.patterns, ctx.tv_list().len());
            assert!(report.fallback.is_none());
            assert!(report.coverage() > 0.5);
        }
    }
}
