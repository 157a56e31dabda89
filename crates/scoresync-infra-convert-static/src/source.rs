use scoresync_ports::ConverterError;
use scoresync_timeline::{parse_event_timemap, timemap_from_events, Timemap, TimemapEntry};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub enum MidiSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

/// Pre-computed timemap supplied alongside the MIDI.
#[derive(Clone, Debug)]
pub enum TimemapSource {
    /// `[{ measure, timestamp, duration }]`
    Measures(Vec<TimemapEntry>),
    /// JSON text in either measure or event form.
    Json(String),
    /// JSON file in either measure or event form.
    Path(PathBuf),
}

impl MidiSource {
    pub fn load(&self) -> Result<Vec<u8>, ConverterError> {
        let data = match self {
            MidiSource::Bytes(bytes) => bytes.clone(),
            MidiSource::Path(path) => read_file(path)?,
        };
        midly::Smf::parse(&data).map_err(|e| ConverterError::Conversion(format!("invalid midi: {e}")))?;
        Ok(data)
    }
}

impl TimemapSource {
    pub fn load(&self) -> Result<Timemap, ConverterError> {
        match self {
            TimemapSource::Measures(entries) => Timemap::new(entries.clone()).map_err(invalid_timemap),
            TimemapSource::Json(json) => parse_timemap_json(json),
            TimemapSource::Path(path) => {
                let bytes = read_file(path)?;
                let json = String::from_utf8(bytes)
                    .map_err(|e| ConverterError::Io(format!("{}: {e}", path.display())))?;
                parse_timemap_json(&json)
            }
        }
    }
}

/// Accepts measure-form entries or an engraver's event-form timemap, telling
/// them apart by the `tstamp` key of the first row.
pub fn parse_timemap_json(json: &str) -> Result<Timemap, ConverterError> {
    let value: Value = serde_json::from_str(json).map_err(invalid_timemap)?;
    let event_form = value
        .as_array()
        .and_then(|rows| rows.first())
        .is_some_and(|row| row.get("tstamp").is_some());
    if event_form {
        let events = parse_event_timemap(json).map_err(invalid_timemap)?;
        timemap_from_events(&events).map_err(invalid_timemap)
    } else {
        Timemap::from_json_str(json).map_err(invalid_timemap)
    }
}

fn invalid_timemap(err: impl std::fmt::Display) -> ConverterError {
    ConverterError::Conversion(format!("invalid timemap: {err}"))
}

fn read_file(path: &Path) -> Result<Vec<u8>, ConverterError> {
    std::fs::read(path).map_err(|e| ConverterError::Io(format!("{}: {e}", path.display())))
}
