use std::fmt;

use crate::Signal;

/// Stuck-at fault, with its location and value
///
/// The node is a primary input or a gate output, never inverted.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fault {
    /// The output of the node is stuck at a fixed value
    OutputStuckAt {
        /// Node where the fault is located
        node: Signal,
        /// Fault value
        value: bool,
    },
    /// An input pin of the gate is stuck at a fixed value
    ///
    /// The value is the one seen by the gate, after any inversion on the pin.
    InputStuckAt {
        /// Gate where the fault is located
        node: Signal,
        /// Pin where the fault is located
        input: usize,
        /// Fault value
        value: bool,
    },
}

impl Fault {
    /// Node where the fault is located
    pub fn node(&self) -> Signal {
        match self {
            Fault::OutputStuckAt { node, .. } => *node,
            Fault::InputStuckAt { node, .. } => *node,
        }
    }

    /// Stuck value
    pub fn value(&self) -> bool {
        match self {
            Fault::OutputStuckAt { value, .. } => *value,
            Fault::InputStuckAt { value, .. } => *value,
        }
    }

    /// Returns true for an output fault
    pub fn is_output(&self) -> bool {
        matches!(self, Fault::OutputStuckAt { .. })
    }

    /// Pin of an input fault
    pub fn input_pos(&self) -> Option<usize> {
        match self {
            Fault::OutputStuckAt { .. } => None,
            Fault::InputStuckAt { input, .. } => Some(*input),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::OutputStuckAt { node, value } => {
                write!(f, "{} output stuck at {}", node, i32::from(*value))
            }
            Fault::InputStuckAt { node, input, value } => {
                write!(
                    f,
                    "{} input {} stuck at {}",
                    node,
                    input,
                    i32::from(*value)
                )
            }
        }
    }
}

/// Handle to a fault owned by a [`FaultManager`](super::FaultManager)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FaultId(pub(super) u32);

impl FaultId {
    /// Index of the fault in its manager
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// Test generation status, shared by all faults of an equivalence class
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FaultStatus {
    /// No detecting vector known yet
    #[default]
    Undetected,
    /// Detected by at least one vector
    Detected,
    /// Proven impossible to detect
    Untestable,
    /// Generation gave up on a resource limit
    Aborted,
}

impl FaultStatus {
    /// Status after the fault lists are re-partitioned
    ///
    /// Aborted faults go back to Undetected, so that every later pass retries them.
    pub fn after_reconcile(self) -> FaultStatus {
        match self {
            FaultStatus::Aborted => FaultStatus::Undetected,
            s => s,
        }
    }
}

impl fmt::Display for FaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultStatus::Undetected => "undetected",
            FaultStatus::Detected => "detected",
            FaultStatus::Untestable => "untestable",
            FaultStatus::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let f = Fault::OutputStuckAt {
            node: Signal::from_var(3),
            value: false,
        };
        assert_eq!(format!("{f}"), "x3 output stuck at 0");
        let f = Fault::InputStuckAt {
            node: Signal::from_var(2),
            input: 1,
            value: true,
        };
        assert_eq!(format!("{f}"), "x2 input 1 stuck at 1");
        assert_eq!(f.input_pos(), Some(1));
        assert!(!f.is_output());
    }

    #[test]
    fn test_retry_policy() {
        assert_eq!(
            FaultStatus::Aborted.after_reconcile(),
            FaultStatus::Undetected
        );
        assert_eq!(
            FaultStatus::Detected.after_reconcile(),
            FaultStatus::Detected
        );
        assert_eq!(
            FaultStatus::Untestable.after_reconcile(),
            FaultStatus::Untestable
        );
    }
}
