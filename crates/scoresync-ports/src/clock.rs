use crate::types::*;
use async_trait::async_trait;

#[derive(thiserror::Error, Debug)]
pub enum ClockError {
    #[error("invalid midi: {0}")]
    InvalidMidi(String),
    #[error("clock has no score loaded")]
    NotLoaded,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Audio clock that plays the converted MIDI and reports where it is.
#[async_trait]
pub trait PlaybackClock: Send + Sync {
    fn load(&self, midi: &[u8]) -> Result<(), ClockError>;

    /// Resolves once asynchronous setup (sound bank, worklet, device) is done.
    async fn ready(&self);

    fn play(&self) -> Result<(), ClockError>;
    fn pause(&self) -> Result<(), ClockError>;
    fn stop(&self) -> Result<(), ClockError>;
    fn seek(&self, position: Millis) -> Result<(), ClockError>;

    fn position(&self) -> Millis;
    fn duration(&self) -> Millis;
    /// True once every repeat has played to the end.
    fn is_finished(&self) -> bool;

    fn set_repeat(&self, repeat: Repeat) -> Result<(), ClockError>;
    fn set_mute(&self, mute: bool) -> Result<(), ClockError>;
    fn set_velocity(&self, velocity: f32) -> Result<(), ClockError>;
    fn set_output(&self, output: Option<DeviceId>) -> Result<(), ClockError>;

    fn close(&self);

    fn version(&self) -> String;
}
