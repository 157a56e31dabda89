use crate::temporal_index::{floor_by_timestamp, Timestamped, TIMESTAMP_EPSILON};
use crate::{MeasureIndex, Millis};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimemapEntry {
    pub measure: u32,
    pub timestamp: Millis,
    pub duration: Millis,
}

impl Timestamped for TimemapEntry {
    fn timestamp(&self) -> Millis {
        self.timestamp
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TimemapError {
    #[error("invalid timemap json: {0}")]
    Json(String),
    #[error("entry {index}: {reason}")]
    InvalidEntry { index: usize, reason: String },
    #[error("entry {index}: timestamp {timestamp} does not follow {previous}")]
    Unordered {
        index: usize,
        timestamp: Millis,
        previous: Millis,
    },
    #[error("entry {index}: measure {measure} goes back from {previous}")]
    MeasureRegression {
        index: usize,
        measure: u32,
        previous: u32,
    },
    #[error("entry {index}: previous entry ends at {expected}, not at {timestamp}")]
    Discontinuous {
        index: usize,
        expected: Millis,
        timestamp: Millis,
    },
}

/// Where a timestamp falls inside the timemap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeasurePosition {
    pub index: MeasureIndex,
    pub start: Millis,
    pub offset: Millis,
    pub duration: Millis,
}

/// Validated, immutable measure timemap of a linear (unrolled) score.
///
/// Entries are strictly increasing in `timestamp`, never go back in `measure`,
/// and each entry ends where the next one starts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TimemapEntry>", into = "Vec<TimemapEntry>")]
pub struct Timemap {
    entries: Vec<TimemapEntry>,
}

impl Timemap {
    pub fn new(entries: Vec<TimemapEntry>) -> Result<Self, TimemapError> {
        validate(&entries)?;
        Ok(Self { entries })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, TimemapError> {
        let entries: Vec<TimemapEntry> =
            serde_json::from_str(json).map_err(|e| TimemapError::Json(e.to_string()))?;
        Self::new(entries)
    }

    pub fn entries(&self) -> &[TimemapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: MeasureIndex) -> Option<&TimemapEntry> {
        self.entries.get(index)
    }

    pub fn start(&self) -> Millis {
        self.entries.first().map(|e| e.timestamp).unwrap_or(0.0)
    }

    pub fn end(&self) -> Millis {
        self.entries
            .last()
            .map(|e| e.timestamp + e.duration)
            .unwrap_or(0.0)
    }

    pub fn total_duration(&self) -> Millis {
        self.entries.iter().map(|e| e.duration).sum()
    }

    /// Index of the entry in effect at `timestamp`.
    pub fn floor_index(&self, timestamp: Millis) -> Option<MeasureIndex> {
        floor_by_timestamp(&self.entries, timestamp)
    }

    pub fn locate(&self, timestamp: Millis) -> Option<MeasurePosition> {
        let index = self.floor_index(timestamp)?;
        let entry = self.entries[index];
        Some(MeasurePosition {
            index,
            start: entry.timestamp,
            offset: timestamp - entry.timestamp,
            duration: entry.duration,
        })
    }

    /// Copy with the last entry stretched to the end of the score.
    pub fn with_total_duration(&self, total: Millis) -> Self {
        let mut entries = self.entries.clone();
        if let Some(last) = entries.last_mut() {
            if total.is_finite() {
                last.duration = (total - last.timestamp).max(0.0);
            }
        }
        Self { entries }
    }
}

impl TryFrom<Vec<TimemapEntry>> for Timemap {
    type Error = TimemapError;

    fn try_from(entries: Vec<TimemapEntry>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<Timemap> for Vec<TimemapEntry> {
    fn from(timemap: Timemap) -> Self {
        timemap.entries
    }
}

fn validate(entries: &[TimemapEntry]) -> Result<(), TimemapError> {
    for (index, entry) in entries.iter().enumerate() {
        if !entry.timestamp.is_finite() || entry.timestamp < 0.0 {
            return Err(TimemapError::InvalidEntry {
                index,
                reason: format!("timestamp {} is not a non-negative number", entry.timestamp),
            });
        }
        if !entry.duration.is_finite() || entry.duration < 0.0 {
            return Err(TimemapError::InvalidEntry {
                index,
                reason: format!("duration {} is not a non-negative number", entry.duration),
            });
        }
        if index == 0 {
            continue;
        }

        let prev = &entries[index - 1];
        if entry.timestamp - prev.timestamp < TIMESTAMP_EPSILON {
            return Err(TimemapError::Unordered {
                index,
                timestamp: entry.timestamp,
                previous: prev.timestamp,
            });
        }
        if entry.measure < prev.measure {
            return Err(TimemapError::MeasureRegression {
                index,
                measure: entry.measure,
                previous: prev.measure,
            });
        }
        let expected = prev.timestamp + prev.duration;
        if (expected - entry.timestamp).abs() >= TIMESTAMP_EPSILON {
            return Err(TimemapError::Discontinuous {
                index,
                expected,
                timestamp: entry.timestamp,
            });
        }
    }
    Ok(())
}
