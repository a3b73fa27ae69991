//! Command line interface

use std::path::PathBuf;

use anyhow::{ensure, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use satpg::atpg::{
    expose_dff, generate_test_patterns, AtpgContext, AtpgOptions, BackendKind, DtpgConfig,
    RtpgOptions, Section, SimMode, TvBuffer,
};
use satpg::io::{read_network_file, read_pattern_file, write_pattern_file, PatternFormat};
use satpg::network::stats::stats;
use satpg::sim::simulate;
use satpg::tv::TestVector;
use satpg::Network;

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Command line arguments
#[derive(Subcommand)]
pub enum Commands {
    /// Show statistics about a logic network
    ///
    /// Will print statistics on the number of inputs, outputs, gates and faults in the network.
    #[clap()]
    Show(ShowArgs),

    /// Simulate a logic network
    ///
    /// This uses the same test pattern format as Atalanta, with one bit per input:
    ///    1: 00011101
    ///    2: 01110000
    #[clap(alias = "sim")]
    Simulate(SimulateArgs),

    /// Fault simulation of existing test patterns
    ///
    /// Reports the stuck-at faults detected by the patterns.
    #[clap()]
    Fsim(FsimArgs),

    /// Test pattern generation for a logic network
    ///
    /// Generate patterns to find all possible faults in a design, assuming
    /// that the primary inputs, outputs and flip-flops can be scanned.
    /// Random patterns are generated first, then the remaining faults are targeted with
    /// a SAT solver or a structural search.
    ///
    /// Fault types are:
    ///   * Output stuck-at fault, where the output of the gate is stuck at a constant value
    ///   * Input stuck-at fault, where the input of the gate is stuck at a constant value
    #[clap()]
    Atpg(AtpgArgs),
}

impl Commands {
    /// Run the command
    pub fn run(&self) -> Result<()> {
        match self {
            Commands::Show(a) => a.run(),
            Commands::Simulate(a) => a.run(),
            Commands::Fsim(a) => a.run(),
            Commands::Atpg(a) => a.run(),
        }
    }
}

/// Read a network, exposing its flip-flops if it is sequential
fn read_comb_network(path: &PathBuf) -> Result<Network> {
    let network = read_network_file(path)?;
    if network.is_comb() {
        Ok(network)
    } else {
        info!("Exposing flip-flops for a sequential network");
        Ok(expose_dff(&network))
    }
}

/// Command arguments for network informations
#[derive(Args)]
pub struct ShowArgs {
    /// Network to show
    file: PathBuf,
}

impl ShowArgs {
    pub fn run(&self) -> Result<()> {
        let network = read_network_file(&self.file)?;
        println!("Network stats:\n{}\n", stats(&network));
        Ok(())
    }
}

/// Command arguments for simulation
#[derive(Args)]
pub struct SimulateArgs {
    /// Network to simulate
    network: PathBuf,

    /// Input patterns file
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Output file for output patterns
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Format of the pattern files
    #[arg(long, value_enum, default_value_t = PatternFormat::Binary)]
    format: PatternFormat,
}

impl SimulateArgs {
    pub fn run(&self) -> Result<()> {
        let network = read_comb_network(&self.network)?;
        let input_values = read_pattern_file(&self.input, network.nb_inputs(), self.format)?;
        let mut output_values = Vec::new();
        for pattern in &input_values {
            let mut tv = TestVector::new(network.nb_outputs());
            for (i, v) in simulate(&network, pattern).into_iter().enumerate() {
                tv.set(i, v);
            }
            output_values.push(tv);
        }
        write_pattern_file(&self.output, &output_values, self.format)
    }
}

/// Command arguments for fault simulation
#[derive(Args)]
pub struct FsimArgs {
    /// Network to simulate
    network: PathBuf,

    /// Test patterns file
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Format of the pattern file
    #[arg(long, value_enum, default_value_t = PatternFormat::Binary)]
    format: PatternFormat,
}

impl FsimArgs {
    pub fn run(&self) -> Result<()> {
        let network = read_comb_network(&self.network)?;
        let mut ctx = AtpgContext::new(network);
        let prev = ctx.timer_mut().change(Section::Read);
        let vectors = read_pattern_file(&self.input, ctx.tv_arena().input_width(), self.format)?;
        ctx.timer_mut().change(prev);
        ctx.build_faults();
        ctx.prime_simulator();
        let mut buffer = TvBuffer::new();
        for v in &vectors {
            let tv = ctx.tv_arena_mut().new_vector();
            ctx.tv_arena_mut().get_mut(tv).merge_from(v);
            buffer.put(&mut ctx, tv);
            ctx.push_vector(tv);
        }
        buffer.flush(&mut ctx);
        ctx.fault_mgr_mut().reconcile();
        let mgr = ctx.fault_mgr();
        println!(
            "{} patterns detect {}/{} fault classes ({:.2}% coverage), {} faults in total",
            vectors.len(),
            mgr.nb_detected(),
            mgr.nb_reps(),
            100.0 * mgr.coverage(),
            mgr.nb_faults()
        );
        println!("{}", ctx.timer());
        Ok(())
    }
}

/// Command arguments for test pattern generation
#[derive(Args)]
pub struct AtpgArgs {
    /// Network to write test patterns for
    network: PathBuf,

    /// Output file for test patterns
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Format of the pattern file
    #[arg(long, value_enum, default_value_t = PatternFormat::Binary)]
    format: PatternFormat,

    /// Random seed for test pattern generation
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Maximum number of random patterns to generate
    #[arg(short = 'r', long, default_value_t = 100_000)]
    num_random: usize,

    /// Number of random batches without detection before stopping
    #[arg(long, default_value_t = 4)]
    max_stagnant: usize,

    /// Stop random generation when a batch detects fewer faults
    #[arg(long, default_value_t = 0)]
    min_detect: usize,

    /// Engine for deterministic generation
    #[arg(long, value_enum, default_value_t = BackendKind::Sat)]
    backend: BackendKind,

    /// Simulation of the deterministic patterns
    #[arg(long, value_enum, default_value_t = SimMode::Ppsfp)]
    sim_mode: SimMode,

    /// Work on the region of one fault at a time, for engines that support it
    #[arg(long)]
    scoping: bool,

    /// Maximum number of backtracks per fault for the structural engine
    #[arg(long, default_value_t = satpg::atpg::DEFAULT_BACKTRACK_LIMIT)]
    backtrack_limit: usize,

    /// Do not check generated patterns by fault simulation
    #[arg(long)]
    no_verify: bool,

    /// Do not retry aborted faults with the other engine
    #[arg(long)]
    no_fallback: bool,

    /// Keep all generated patterns
    #[arg(long)]
    no_compact: bool,
}

impl AtpgArgs {
    pub fn run(&self) -> Result<()> {
        let network = read_comb_network(&self.network)?;
        ensure!(network.nb_inputs() > 0, "The network has no input");
        let options = AtpgOptions {
            rtpg: RtpgOptions {
                min_detect: self.min_detect,
                max_stagnant: self.max_stagnant,
                max_patterns: self.num_random,
                seed: self.seed,
            },
            dtpg: DtpgConfig {
                backend: self.backend,
                scoping: self.scoping,
                backtrack_limit: self.backtrack_limit,
                verify: !self.no_verify,
                sim_mode: self.sim_mode,
                seed: self.seed,
            },
            fallback: !self.no_fallback,
            compact: !self.no_compact,
            progress: true,
        };
        let mut ctx = AtpgContext::new(network);
        let report = generate_test_patterns(&mut ctx, &options);
        println!("{report}");
        println!("{}", ctx.timer());
        write_pattern_file(&self.output, ctx.vectors(), self.format)
    }
}
