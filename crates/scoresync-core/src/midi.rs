use crate::tempo::{TempoMap, TempoPoint, Tick, DEFAULT_US_PER_QUARTER};
use midly::{Fps, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use scoresync_ports::{ClockError, Millis};
use std::collections::BTreeMap;

/// Timing facts about a standard MIDI file.
#[derive(Clone, Debug)]
pub struct MidiSummary {
    pub ppq: u16,
    pub tempo_map: TempoMap,
    pub end_tick: Tick,
    pub duration: Millis,
    pub note_count: usize,
}

pub fn summarize_midi(data: &[u8]) -> Result<MidiSummary, ClockError> {
    let smf = Smf::parse(data).map_err(|e| ClockError::InvalidMidi(e.to_string()))?;
    let (ppq, tempo_override) = match smf.header.timing {
        Timing::Metrical(ticks) => (ticks.as_int(), None),
        Timing::Timecode(fps, ticks_per_frame) => {
            let (ppq, us_per_quarter) = timecode_ppq_and_tempo(fps, ticks_per_frame);
            (ppq, Some(us_per_quarter))
        }
    };

    let mut tempo_points: BTreeMap<Tick, u32> = BTreeMap::new();
    let mut end_tick: Tick = 0;
    let mut note_count = 0usize;

    for track in &smf.tracks {
        let mut tick: Tick = 0;
        for event in track {
            tick += event.delta.as_int() as Tick;
            match &event.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { vel, .. },
                    ..
                } if vel.as_int() > 0 => note_count += 1,
                TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter)) => {
                    tempo_points.insert(tick, us_per_quarter.as_int());
                }
                _ => {}
            }
        }
        end_tick = end_tick.max(tick);
    }

    let tempo_map = TempoMap::new(ppq, tempo_points_for(tempo_points, tempo_override));
    let duration = tempo_map.tick_to_ms(end_tick);
    Ok(MidiSummary {
        ppq,
        tempo_map,
        end_tick,
        duration,
        note_count,
    })
}

fn tempo_points_for(
    tempo_points: BTreeMap<Tick, u32>,
    override_us_per_quarter: Option<u32>,
) -> Vec<TempoPoint> {
    if let Some(us_per_quarter) = override_us_per_quarter {
        return vec![TempoPoint {
            tick: 0,
            us_per_quarter,
        }];
    }
    if tempo_points.is_empty() {
        return vec![TempoPoint {
            tick: 0,
            us_per_quarter: DEFAULT_US_PER_QUARTER,
        }];
    }
    tempo_points
        .into_iter()
        .map(|(tick, us_per_quarter)| TempoPoint {
            tick,
            us_per_quarter,
        })
        .collect()
}

fn timecode_ppq_and_tempo(fps: Fps, ticks_per_frame: u8) -> (u16, u32) {
    let ticks_per_frame = ticks_per_frame.max(1) as u16;
    match fps {
        Fps::Fps24 => (24 * ticks_per_frame, 1_000_000),
        Fps::Fps25 => (25 * ticks_per_frame, 1_000_000),
        Fps::Fps30 => (30 * ticks_per_frame, 1_000_000),
        Fps::Fps29 => (30 * ticks_per_frame, 1_001_000),
    }
}
