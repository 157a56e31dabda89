use crate::source::{MidiSource, TimemapSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use scoresync_core::derive_timemap;
use scoresync_ports::{Converter, ConverterError, InitContext};
use scoresync_timeline::TimemapEntry;

struct Converted {
    midi: Vec<u8>,
    timemap: Vec<TimemapEntry>,
}

/// Converter for scores whose MIDI was rendered ahead of time. Without a
/// supplied timemap, one is derived from the score through the transform
/// processor.
pub struct StaticConverter {
    midi: MidiSource,
    timemap: Option<TimemapSource>,
    converted: Mutex<Option<Converted>>,
}

impl StaticConverter {
    pub fn new(midi: MidiSource, timemap: Option<TimemapSource>) -> Self {
        Self {
            midi,
            timemap,
            converted: Mutex::new(None),
        }
    }

    pub fn from_bytes(midi: Vec<u8>) -> Self {
        Self::new(MidiSource::Bytes(midi), None)
    }

    pub fn with_timemap(mut self, timemap: TimemapSource) -> Self {
        self.timemap = Some(timemap);
        self
    }
}

#[async_trait]
impl Converter for StaticConverter {
    async fn initialize(&self, score: &str, ctx: InitContext<'_>) -> Result<(), ConverterError> {
        let midi = self.midi.load()?;
        let timemap = match &self.timemap {
            Some(source) => source.load()?,
            None => derive_timemap(score, &ctx.config.timemap_xsl_uri, ctx.transform.as_ref()).await,
        };
        tracing::debug!(
            midi_bytes = midi.len(),
            measures = timemap.len(),
            "static conversion loaded"
        );
        *self.converted.lock() = Some(Converted {
            midi,
            timemap: timemap.entries().to_vec(),
        });
        Ok(())
    }

    fn midi(&self) -> Result<Vec<u8>, ConverterError> {
        self.converted
            .lock()
            .as_ref()
            .map(|converted| converted.midi.clone())
            .ok_or(ConverterError::NotInitialized)
    }

    fn timemap(&self) -> Vec<TimemapEntry> {
        self.converted
            .lock()
            .as_ref()
            .map(|converted| converted.timemap.clone())
            .unwrap_or_default()
    }

    fn version(&self) -> String {
        format!("StaticConverter {}", env!("CARGO_PKG_VERSION"))
    }
}
