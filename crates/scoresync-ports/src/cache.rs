use scoresync_timeline::TimemapEntry;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

/// Identity of a score conversion (score text plus the options that change the
/// converter's output).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoreKey(pub String);

impl fmt::Display for ScoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedConversion {
    pub converter: String,
    pub midi: Vec<u8>,
    pub timemap: Vec<TimemapEntry>,
}

pub trait MidiCache: Send + Sync {
    fn get(&self, key: &ScoreKey) -> Result<Option<CachedConversion>, CacheError>;
    fn put(&self, key: &ScoreKey, value: &CachedConversion) -> Result<(), CacheError>;
    /// Returns whether an entry was removed.
    fn delete(&self, key: &ScoreKey) -> Result<bool, CacheError>;
}
