use crate::fault::Fault;
use crate::tv::TestVector;
use crate::Network;

/// Result of deterministic generation for one fault
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DtpgOutcome {
    /// The fault is detected by any vector matching these care bits
    Detected(TestVector),
    /// The fault cannot be detected
    Untestable,
    /// A resource limit was reached before a conclusion
    Aborted,
}

/// Engine finding a test vector for a single fault
///
/// Engines that support scoping are activated on a region of the circuit before being run.
/// The default implementations describe an engine that always works on the whole circuit.
pub trait DtpgBackend {
    /// Name of the engine, for reports
    fn name(&self) -> &'static str;

    /// Generate care bits detecting a fault, or prove it untestable
    fn run(&mut self, network: &Network, fault: Fault) -> DtpgOutcome;

    /// Returns whether the engine can restrict itself to the region of one fault
    fn supports_scoping(&self) -> bool {
        false
    }

    /// Work on the whole circuit
    fn activate_all(&mut self, _network: &Network) {}

    /// Restrict the region to what is needed for a fault
    ///
    /// Returns false if the fault cannot be observed at all.
    fn activate_fault(&mut self, _network: &Network, _fault: Fault) -> bool {
        true
    }

    /// Returns whether another fault can be targeted in the current region
    fn check_fault(&self, _network: &Network, _fault: Fault) -> bool {
        true
    }

    /// Release the current region
    fn deactivate(&mut self) {}

    /// Total number of backtracks since creation
    fn backtrack_count(&self) -> usize {
        0
    }

    /// Maximum number of backtracks for a single fault
    fn set_backtrack_limit(&mut self, _limit: usize) {}
}
