use crate::midi::{summarize_midi, MidiSummary};
use async_trait::async_trait;
use parking_lot::Mutex;
use scoresync_ports::{ClockError, DeviceId, Millis, PlaybackClock, Repeat};
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
}

/// Wall-clock transport over a loaded MIDI file.
///
/// Position is derived from `tokio::time::Instant`, so paused-time tests drive
/// it deterministically. Sound output is left to whoever consumes the
/// settings; the clock only keeps time.
pub struct MidiClock {
    inner: Mutex<ClockInner>,
    ready: watch::Sender<bool>,
}

struct ClockInner {
    summary: Option<MidiSummary>,
    state: TransportState,
    /// Played time across all passes at `anchor_at`.
    anchor: Millis,
    anchor_at: Instant,
    repeat: Repeat,
    mute: bool,
    velocity: f32,
    output: Option<DeviceId>,
}

impl Default for MidiClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiClock {
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            inner: Mutex::new(ClockInner {
                summary: None,
                state: TransportState::Stopped,
                anchor: 0.0,
                anchor_at: Instant::now(),
                repeat: Repeat::default(),
                mute: false,
                velocity: 1.0,
                output: None,
            }),
            ready,
        }
    }

    pub fn state(&self) -> TransportState {
        self.inner.lock().state
    }

    pub fn summary(&self) -> Option<MidiSummary> {
        self.inner.lock().summary.clone()
    }

    pub fn repeat(&self) -> Repeat {
        self.inner.lock().repeat
    }

    pub fn is_muted(&self) -> bool {
        self.inner.lock().mute
    }

    pub fn velocity(&self) -> f32 {
        self.inner.lock().velocity
    }

    pub fn output(&self) -> Option<DeviceId> {
        self.inner.lock().output.clone()
    }
}

impl ClockInner {
    fn duration(&self) -> Millis {
        self.summary.as_ref().map(|s| s.duration).unwrap_or(0.0)
    }

    fn played(&self, now: Instant) -> Millis {
        match self.state {
            TransportState::Playing => {
                self.anchor + now.saturating_duration_since(self.anchor_at).as_secs_f64() * 1000.0
            }
            _ => self.anchor,
        }
    }

    /// Maps total played time to (pass, position within the pass, finished).
    fn resolve(&self, played: Millis) -> (u64, Millis, bool) {
        let duration = self.duration();
        if duration <= 0.0 {
            return (0, 0.0, self.summary.is_some() && played > 0.0);
        }
        let pass = (played / duration).floor().max(0.0) as u64;
        match self.repeat.passes() {
            Some(passes) if pass >= passes as u64 => (pass, duration, true),
            _ => (pass, played - pass as f64 * duration, false),
        }
    }

    fn rebase(&mut self, played: Millis, now: Instant) {
        self.anchor = played;
        self.anchor_at = now;
    }
}

#[async_trait]
impl PlaybackClock for MidiClock {
    fn load(&self, midi: &[u8]) -> Result<(), ClockError> {
        let summary = summarize_midi(midi)?;
        tracing::debug!(
            ppq = summary.ppq,
            notes = summary.note_count,
            duration_ms = summary.duration,
            "midi loaded"
        );
        {
            let mut inner = self.inner.lock();
            inner.summary = Some(summary);
            inner.state = TransportState::Stopped;
            inner.rebase(0.0, Instant::now());
        }
        self.ready.send_replace(true);
        Ok(())
    }

    async fn ready(&self) {
        let mut rx = self.ready.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    fn play(&self) -> Result<(), ClockError> {
        let mut inner = self.inner.lock();
        if inner.summary.is_none() {
            return Err(ClockError::NotLoaded);
        }
        if inner.state == TransportState::Playing {
            return Ok(());
        }
        let now = Instant::now();
        let (_, _, finished) = inner.resolve(inner.played(now));
        let start = if finished { 0.0 } else { inner.anchor };
        inner.rebase(start, now);
        inner.state = TransportState::Playing;
        Ok(())
    }

    fn pause(&self) -> Result<(), ClockError> {
        let mut inner = self.inner.lock();
        if inner.state != TransportState::Playing {
            return Ok(());
        }
        let now = Instant::now();
        let played = inner.played(now);
        inner.rebase(played, now);
        inner.state = TransportState::Paused;
        Ok(())
    }

    fn stop(&self) -> Result<(), ClockError> {
        let mut inner = self.inner.lock();
        inner.rebase(0.0, Instant::now());
        inner.state = TransportState::Stopped;
        Ok(())
    }

    fn seek(&self, position: Millis) -> Result<(), ClockError> {
        let mut inner = self.inner.lock();
        if inner.summary.is_none() {
            return Err(ClockError::NotLoaded);
        }
        let now = Instant::now();
        let duration = inner.duration();
        let (pass, _, finished) = inner.resolve(inner.played(now));
        // Seeking after the last pass restarts the final pass.
        let pass = if finished { pass.saturating_sub(1) } else { pass };
        let target = position.clamp(0.0, duration.max(0.0));
        inner.rebase(pass as f64 * duration + target, now);
        Ok(())
    }

    fn position(&self) -> Millis {
        let inner = self.inner.lock();
        let (_, position, _) = inner.resolve(inner.played(Instant::now()));
        position
    }

    fn duration(&self) -> Millis {
        self.inner.lock().duration()
    }

    fn is_finished(&self) -> bool {
        let inner = self.inner.lock();
        let (_, _, finished) = inner.resolve(inner.played(Instant::now()));
        finished
    }

    fn set_repeat(&self, repeat: Repeat) -> Result<(), ClockError> {
        self.inner.lock().repeat = repeat;
        Ok(())
    }

    fn set_mute(&self, mute: bool) -> Result<(), ClockError> {
        self.inner.lock().mute = mute;
        Ok(())
    }

    fn set_velocity(&self, velocity: f32) -> Result<(), ClockError> {
        if !velocity.is_finite() || velocity < 0.0 {
            return Err(ClockError::Backend(format!("invalid velocity {velocity}")));
        }
        self.inner.lock().velocity = velocity;
        Ok(())
    }

    fn set_output(&self, output: Option<DeviceId>) -> Result<(), ClockError> {
        self.inner.lock().output = output;
        Ok(())
    }

    fn close(&self) {
        let mut inner = self.inner.lock();
        inner.state = TransportState::Stopped;
        inner.rebase(0.0, Instant::now());
    }

    fn version(&self) -> String {
        format!("MidiClock {}", env!("CARGO_PKG_VERSION"))
    }
}
