//! Representation of the gate-level network under test

mod gates;
mod network;
mod signal;
pub mod stats;
pub mod topology;

pub use gates::{BinaryType, Gate, LogicValue, LutGate, NaryType, TernaryType};
pub use network::Network;
pub use signal::Signal;
pub use topology::Topology;
