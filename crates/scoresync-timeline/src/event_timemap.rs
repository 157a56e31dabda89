use crate::timemap::{Timemap, TimemapEntry, TimemapError};
use crate::Millis;
use serde::{Deserialize, Serialize};

/// One row of an engraver's per-event timemap. Only rows that open a measure
/// carry `measure_on`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventTimemapEntry {
    pub tstamp: Millis,
    pub qstamp: Option<f64>,
    pub measure_on: Option<String>,
    pub on: Vec<String>,
    pub off: Vec<String>,
}

pub fn parse_event_timemap(json: &str) -> Result<Vec<EventTimemapEntry>, TimemapError> {
    serde_json::from_str(json).map_err(|e| TimemapError::Json(e.to_string()))
}

/// Collapse per-event rows into one entry per measure.
///
/// A measure starts at the `tstamp` of the row that opens it and lasts until
/// the next measure opens; the last measure ends at the last row.
pub fn measures_from_events(events: &[EventTimemapEntry]) -> Vec<TimemapEntry> {
    let mut rows: Vec<&EventTimemapEntry> = events.iter().collect();
    rows.sort_by(|a, b| a.tstamp.total_cmp(&b.tstamp));

    let mut measures: Vec<TimemapEntry> = Vec::new();
    for row in &rows {
        if row.measure_on.is_none() {
            continue;
        }
        if let Some(open) = measures.last_mut() {
            open.duration = row.tstamp - open.timestamp;
        }
        measures.push(TimemapEntry {
            measure: measures.len() as u32,
            timestamp: row.tstamp,
            duration: 0.0,
        });
    }

    if let (Some(open), Some(last_row)) = (measures.last_mut(), rows.last()) {
        open.duration = (last_row.tstamp - open.timestamp).max(0.0);
    }
    measures
}

pub fn timemap_from_events(events: &[EventTimemapEntry]) -> Result<Timemap, TimemapError> {
    Timemap::new(measures_from_events(events))
}
