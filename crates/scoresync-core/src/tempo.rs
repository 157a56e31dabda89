use scoresync_ports::Millis;
use scoresync_timeline::{floor_index, search_by};

pub type Tick = i64;

pub const DEFAULT_US_PER_QUARTER: u32 = 500_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TempoPoint {
    pub tick: Tick,
    pub us_per_quarter: u32,
}

/// Piecewise-constant tempo map converting MIDI ticks to wall time.
#[derive(Clone, Debug)]
pub struct TempoMap {
    ppq: u16,
    segments: Vec<TempoSegment>,
}

#[derive(Clone, Copy, Debug)]
struct TempoSegment {
    start_tick: Tick,
    start_us: i64,
    us_per_quarter: u32,
}

impl TempoMap {
    pub fn new(ppq: u16, mut points: Vec<TempoPoint>) -> Self {
        let ppq = ppq.max(1);
        points.sort_by_key(|p| p.tick);
        points.dedup_by_key(|p| p.tick);
        if points.is_empty() || points[0].tick != 0 {
            points.insert(
                0,
                TempoPoint {
                    tick: 0,
                    us_per_quarter: DEFAULT_US_PER_QUARTER,
                },
            );
        }

        let mut segments = Vec::with_capacity(points.len());
        let mut current_us = 0i64;
        for (idx, point) in points.iter().enumerate() {
            if idx > 0 {
                let prev = &points[idx - 1];
                current_us += ticks_to_us(point.tick - prev.tick, prev.us_per_quarter, ppq);
            }
            segments.push(TempoSegment {
                start_tick: point.tick,
                start_us: current_us,
                us_per_quarter: point.us_per_quarter,
            });
        }

        Self { ppq, segments }
    }

    pub fn ppq(&self) -> u16 {
        self.ppq
    }

    pub fn tick_to_micros(&self, tick: Tick) -> i64 {
        let seg = self.segment_for_tick(tick);
        seg.start_us + ticks_to_us(tick - seg.start_tick, seg.us_per_quarter, self.ppq)
    }

    pub fn tick_to_ms(&self, tick: Tick) -> Millis {
        self.tick_to_micros(tick) as f64 / 1000.0
    }

    fn segment_for_tick(&self, tick: Tick) -> TempoSegment {
        let found = search_by(&self.segments, |seg| seg.start_tick.cmp(&tick));
        self.segments[floor_index(found)]
    }
}

fn ticks_to_us(ticks: Tick, us_per_quarter: u32, ppq: u16) -> i64 {
    let ticks = ticks as i128;
    let us_per_quarter = us_per_quarter as i128;
    let ppq = ppq as i128;
    ((ticks * us_per_quarter) / ppq) as i64
}
