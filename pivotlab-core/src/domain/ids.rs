use serde::{Deserialize, Serialize};
use std::fmt;

/// Position ID, unique within one account lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pos-{}", self.0)
    }
}

/// Monotonic ID generator.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    next_position: u64,
}

impl IdGen {
    /// Generator whose next id follows `last`.
    pub fn after(last: PositionId) -> Self {
        Self {
            next_position: last.0,
        }
    }

    pub fn next_position_id(&mut self) -> PositionId {
        self.next_position += 1;
        PositionId(self.next_position)
    }
}
