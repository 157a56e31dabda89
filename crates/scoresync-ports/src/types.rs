use serde::{Deserialize, Serialize};
use std::fmt;

pub use scoresync_timeline::{MeasureIndex, Millis};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

/// How many times the score is played before the clock reports it finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Repeat {
    Times(u32),
    Infinite,
}

impl Repeat {
    /// Number of passes, `None` when unbounded. `Times(0)` still plays once.
    pub fn passes(self) -> Option<u32> {
        match self {
            Repeat::Times(n) => Some(n.max(1)),
            Repeat::Infinite => None,
        }
    }
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat::Times(1)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
