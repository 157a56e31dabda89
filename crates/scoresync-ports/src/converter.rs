use crate::config::PlayerConfig;
use crate::transform::TransformProcessor;
use async_trait::async_trait;
use scoresync_timeline::TimemapEntry;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum ConverterError {
    #[error("conversion failed: {0}")]
    Conversion(String),
    #[error("converter not initialized")]
    NotInitialized,
    #[error("io error: {0}")]
    Io(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Options and shared collaborators handed to `initialize` calls.
#[derive(Clone, Copy)]
pub struct InitContext<'a> {
    pub config: &'a PlayerConfig,
    pub transform: &'a Arc<dyn TransformProcessor>,
}

/// Score to MIDI converter.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn initialize(&self, score: &str, ctx: InitContext<'_>) -> Result<(), ConverterError>;

    /// Standard MIDI file bytes of the converted score.
    fn midi(&self) -> Result<Vec<u8>, ConverterError>;

    /// Measure timemap as reported by the converter, not validated yet.
    fn timemap(&self) -> Vec<TimemapEntry>;

    fn version(&self) -> String;
}
