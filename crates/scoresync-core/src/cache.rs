use parking_lot::Mutex;
use scoresync_ports::{CacheError, CachedConversion, MidiCache, ScoreKey};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Identity of a conversion: the score text and the options that change the
/// converter output.
pub fn score_key(score: &str, unroll: bool) -> ScoreKey {
    let mut hasher = Sha256::new();
    hasher.update(score.as_bytes());
    hasher.update([u8::from(unroll)]);
    ScoreKey(hex::encode(hasher.finalize()))
}

#[derive(Default)]
pub struct MemoryMidiCache {
    entries: Mutex<HashMap<ScoreKey, CachedConversion>>,
}

impl MemoryMidiCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl MidiCache for MemoryMidiCache {
    fn get(&self, key: &ScoreKey) -> Result<Option<CachedConversion>, CacheError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &ScoreKey, value: &CachedConversion) -> Result<(), CacheError> {
        self.entries.lock().insert(key.clone(), value.clone());
        Ok(())
    }

    fn delete(&self, key: &ScoreKey) -> Result<bool, CacheError> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}
