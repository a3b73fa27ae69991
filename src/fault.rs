//! Stuck-at faults and their equivalence classes

#[allow(clippy::module_inception)]
mod fault;
mod manager;

pub use fault::{Fault, FaultId, FaultStatus};
pub use manager::FaultManager;
