use scoresync_ports::{CacheError, CachedConversion, MidiCache, ScoreKey};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Conversion cache keeping one JSON file per score key.
pub struct FsMidiCache {
    base_dir: PathBuf,
}

impl FsMidiCache {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_base_dir() -> Result<PathBuf, CacheError> {
        let base = dirs_next::cache_dir()
            .ok_or_else(|| CacheError::Io("cache dir not found".to_string()))?;
        Ok(base.join("scoresync").join("midi"))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn entry_path(&self, key: &ScoreKey) -> Result<PathBuf, CacheError> {
        let valid = !key.0.is_empty()
            && key
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CacheError::Io(format!("invalid cache key: {key}")));
        }
        Ok(self.base_dir.join(format!("{key}.json")))
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, CacheError> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io(e.to_string())),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| CacheError::Serde(e.to_string()))
    }

    fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CacheError::Io(e.to_string()))?;
        }
        let data = serde_json::to_vec(value).map_err(|e| CacheError::Serde(e.to_string()))?;
        // Write beside the target and rename so readers never see half an entry.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data).map_err(|e| CacheError::Io(e.to_string()))?;
        fs::rename(&tmp, path).map_err(|e| CacheError::Io(e.to_string()))
    }
}

impl Default for FsMidiCache {
    fn default() -> Self {
        let base_dir = Self::default_base_dir().unwrap_or_else(|_| PathBuf::from(".scoresync"));
        Self { base_dir }
    }
}

impl MidiCache for FsMidiCache {
    fn get(&self, key: &ScoreKey) -> Result<Option<CachedConversion>, CacheError> {
        let path = self.entry_path(key)?;
        let entry = Self::read_json(&path)?;
        tracing::trace!(%key, hit = entry.is_some(), "midi cache lookup");
        Ok(entry)
    }

    fn put(&self, key: &ScoreKey, value: &CachedConversion) -> Result<(), CacheError> {
        let path = self.entry_path(key)?;
        Self::write_json(&path, value)
    }

    fn delete(&self, key: &ScoreKey) -> Result<bool, CacheError> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Io(e.to_string())),
        }
    }
}
