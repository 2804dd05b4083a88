use serde::{Deserialize, Serialize};

/// Causal relationship between two vector clocks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ClockOrdering {
    /// Every component is equal.
    Equal,
    /// `self` happened-before `other`.
    Before,
    /// `other` happened-before `self`.
    After,
    /// Neither precedes the other.
    Concurrent,
}

impl ClockOrdering {
    /// The ordering seen from the other clock's side.
    pub fn reverse(self) -> Self {
        match self {
            ClockOrdering::Before => ClockOrdering::After,
            ClockOrdering::After => ClockOrdering::Before,
            other => other,
        }
    }
}
