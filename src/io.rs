//! Read and write logic networks and test patterns to files

mod bench;
mod patterns;
mod utils;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{bail, Context, Result};

pub use bench::{read_bench, write_bench};
pub use patterns::{read_patterns, write_patterns, PatternFormat};

use crate::tv::TestVector;
use crate::Network;

/// Read a logic network from a file
///
/// Following extensions are supported: .bench
pub fn read_network_file(path: &Path) -> Result<Network> {
    match path.extension() {
        Some(s) if s == "bench" => {
            let f = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
            read_bench(f).with_context(|| format!("Cannot read {}", path.display()))
        }
        Some(s) => bail!("Unknown extension {}", s.to_string_lossy()),
        None => bail!("No extension given for {}", path.display()),
    }
}

/// Read test vectors from a file
pub fn read_pattern_file(
    path: &Path,
    nb_inputs: usize,
    format: PatternFormat,
) -> Result<Vec<TestVector>> {
    let f = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    read_patterns(f, nb_inputs, format).with_context(|| format!("Cannot read {}", path.display()))
}

/// Write test vectors to a file
pub fn write_pattern_file<'a>(
    path: &Path,
    vectors: impl IntoIterator<Item = &'a TestVector>,
    format: PatternFormat,
) -> Result<()> {
    let f = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    write_patterns(&mut BufWriter::new(f), vectors, format)
}
