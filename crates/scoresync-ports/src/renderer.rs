use crate::config::PlayerConfig;
use crate::container::Container;
use crate::transform::TransformProcessor;
use crate::types::*;
use async_trait::async_trait;
use scoresync_timeline::Timemap;
use std::sync::{Arc, Weak};

#[derive(thiserror::Error, Debug)]
pub enum RendererError {
    #[error("layout error: {0}")]
    Layout(String),
    #[error("renderer not initialized")]
    NotInitialized,
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransportEvent {
    Started,
    Paused,
    Stopped,
    Seeked { timestamp: Millis },
    Finished,
}

/// Back-reference from a renderer to the player that owns it.
pub trait PlayerHandle: Send + Sync {
    fn move_to(&self, measure: MeasureIndex, measure_start: Millis, offset: Millis);
}

#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub config: &'a PlayerConfig,
    pub transform: &'a Arc<dyn TransformProcessor>,
    pub timemap: &'a Arc<Timemap>,
    /// Total score duration.
    pub duration: Millis,
}

/// Score layout and cursor painting backend.
///
/// Methods take `&self`: implementations keep their own interior state so the
/// player can be re-entered from a click while a renderer call is on the stack.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn initialize(
        &self,
        container: Arc<dyn Container>,
        score: &str,
        ctx: RenderContext<'_>,
    ) -> Result<(), RendererError>;

    fn attach_player(&self, player: Weak<dyn PlayerHandle>);

    fn move_to(
        &self,
        measure: MeasureIndex,
        measure_start: Millis,
        offset: Millis,
        duration: Option<Millis>,
    );

    fn on_resize(&self);

    fn on_event(&self, event: &TransportEvent);

    fn destroy(&self) -> Result<(), RendererError>;

    fn version(&self) -> String;
}
