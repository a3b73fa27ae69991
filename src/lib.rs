//! Stuck-at fault test pattern generation
//!
//! This crate generates test patterns for gate-level combinatorial networks: sets of input
//! vectors that reveal as many [stuck-at faults](https://en.wikipedia.org/wiki/Stuck-at_fault)
//! as possible when the outputs of a manufactured circuit are compared to the expected values.
//!
//! # Usage
//!
//! ```bash
//! # Show available commands
//! # At the moment, only .bench files are supported
//! satpg help
//! # Show the size of a design and its number of faults
//! satpg show mydesign.bench
//! # Generate test patterns
//! satpg atpg mydesign.bench -o atpg.test
//! # Check the coverage of existing patterns
//! satpg fsim mydesign.bench -i atpg.test
//! ```
//!
//! # Flow
//!
//! Faults are enumerated on every primary input, gate output and gate input pin, then grouped
//! into equivalence classes with a single representative carrying the status of the class.
//! Generation proceeds in passes sharing an [`atpg::AtpgContext`]:
//! * random patterns are simulated by batches of 64, as long as they detect new faults;
//! * the remaining faults are handed one at a time to a deterministic engine, either a SAT
//!   solver or a structural search, which finds a detecting pattern or proves the fault
//!   untestable;
//! * the pattern list is compacted with a greedy set cover.
//!
//! Patterns are ternary: a position may be unknown. Simulation handles unknown values
//! conservatively, so a fault is only counted as detected when it is detected whatever the
//! unknown positions are.
//!
//! ```
//! # use satpg::{Gate, Network};
//! use satpg::atpg::{generate_test_patterns, AtpgContext, AtpgOptions};
//!
//! let mut net = Network::new();
//! let i0 = net.add_input();
//! let i1 = net.add_input();
//! let i2 = net.add_input();
//! let carry = net.add(Gate::maj(i0, i1, i2));
//! let out = net.xor(i0, i1);
//! let out = net.xor(out, i2);
//! net.add_output(carry);
//! net.add_output(out);
//!
//! let mut ctx = AtpgContext::new(net);
//! let report = generate_test_patterns(&mut ctx, &AtpgOptions::default());
//! assert_eq!(report.remaining, 0);
//! for tv in ctx.vectors() {
//!     println!("{tv}");
//! }
//! ```

#![warn(missing_docs)]

pub mod atpg;
pub mod fault;
pub mod io;
pub mod network;
pub mod sim;
pub mod tv;
pub mod value;

pub use network::{stats, Gate, NaryType, Network, Signal};
