use crate::media::{read_measure_positions, read_segment_positions, ScoreMedia};
use async_trait::async_trait;
use parking_lot::Mutex;
use scoresync_ports::{
    Container, MeasureIndex, Millis, PlayerHandle, RenderContext, Renderer, RendererError,
    TransportEvent,
};
use scoresync_timeline::{scale_factor, SeekTarget, SegmentIndex, SpatialElement, Timemap};
use std::sync::{Arc, Weak};

/// Where the host should draw the cursor, in container pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CursorPosition {
    pub page: usize,
    pub x: f64,
    pub y: f64,
    pub height: f64,
}

/// Host drawing surface for the cursor line.
pub trait CursorSurface: Send + Sync {
    fn move_cursor(&self, position: CursorPosition);
    fn remove_cursor(&self);
}

struct Layout {
    container: Arc<dyn Container>,
    measures: Vec<SpatialElement>,
    segments: SegmentIndex,
    timemap: Arc<Timemap>,
    horizontal: bool,
}

impl Layout {
    fn scale(&self, media: &ScoreMedia, page: usize) -> f64 {
        if self.horizontal {
            return 1.0;
        }
        let native = media.pages.get(page).and_then(|p| p.native_width);
        scale_factor(self.container.bounds().width, native)
    }
}

/// Renderer for pre-engraved scores. It does not draw pages itself; it maps
/// time to positions on them and back.
pub struct PositionsRenderer {
    media: ScoreMedia,
    surface: Arc<dyn CursorSurface>,
    layout: Mutex<Option<Layout>>,
    player: Mutex<Option<Weak<dyn PlayerHandle>>>,
    last_move: Mutex<Option<(MeasureIndex, Millis, Millis)>>,
}

impl PositionsRenderer {
    pub fn new(media: ScoreMedia, surface: Arc<dyn CursorSurface>) -> Self {
        Self {
            media,
            surface,
            layout: Mutex::new(None),
            player: Mutex::new(None),
            last_move: Mutex::new(None),
        }
    }

    pub fn media(&self) -> &ScoreMedia {
        &self.media
    }

    pub fn segments(&self) -> SegmentIndex {
        self.layout
            .lock()
            .as_ref()
            .map(|layout| layout.segments.clone())
            .unwrap_or_default()
    }

    /// Seeks the owning player to the segment under a click on `page`.
    pub fn click(&self, page: usize, x: f64, y: f64) -> Option<SeekTarget> {
        let target = {
            let layout = self.layout.lock();
            let layout = layout.as_ref()?;
            let scale = layout.scale(&self.media, page);
            layout
                .segments
                .seek_target_at(page, x, y, scale, &layout.timemap)?
        };
        let player = self.player.lock().as_ref().and_then(Weak::upgrade);
        match player {
            Some(player) => player.move_to(target.measure, target.measure_start, target.offset),
            None => tracing::debug!("click before a player was attached"),
        }
        Some(target)
    }

    fn cursor_for(&self, measure: MeasureIndex, timestamp: Millis) -> Option<CursorPosition> {
        let layout = self.layout.lock();
        let layout = layout.as_ref()?;
        let segment = layout.segments.segment_at(timestamp)?;
        let height = layout
            .measures
            .get(measure)
            .or_else(|| layout.measures.get(segment.measure))
            .map(|m| m.sy)
            .unwrap_or(segment.sy);
        let scale = layout.scale(&self.media, segment.page);
        Some(CursorPosition {
            page: segment.page,
            x: segment.x * scale,
            y: segment.y * scale - height * scale / 2.0 + layout.container.bounds().top,
            height: height * scale * 2.0,
        })
    }
}

#[async_trait]
impl Renderer for PositionsRenderer {
    async fn initialize(
        &self,
        container: Arc<dyn Container>,
        _score: &str,
        ctx: RenderContext<'_>,
    ) -> Result<(), RendererError> {
        let transform = ctx.transform.as_ref();
        let measures = read_measure_positions(transform, &self.media.measure_positions).await?;
        let (elements, positions) =
            read_segment_positions(transform, &self.media.segment_positions).await?;

        let total = if self.media.duration_secs > 0.0 {
            self.media.duration_secs * 1000.0
        } else {
            ctx.duration
        };
        let segments = SegmentIndex::build(&elements, &positions, ctx.timemap, total)
            .map_err(|e| RendererError::Layout(e.to_string()))?;
        tracing::debug!(
            pages = self.media.pages.len(),
            measures = measures.len(),
            segments = segments.len(),
            "score layout loaded"
        );

        *self.layout.lock() = Some(Layout {
            container,
            measures,
            segments,
            timemap: ctx.timemap.clone(),
            horizontal: ctx.config.horizontal,
        });
        self.move_to(0, 0.0, 0.0, None);
        Ok(())
    }

    fn attach_player(&self, player: Weak<dyn PlayerHandle>) {
        *self.player.lock() = Some(player);
    }

    fn move_to(
        &self,
        measure: MeasureIndex,
        measure_start: Millis,
        offset: Millis,
        _duration: Option<Millis>,
    ) {
        *self.last_move.lock() = Some((measure, measure_start, offset));
        if let Some(position) = self.cursor_for(measure, measure_start + offset) {
            self.surface.move_cursor(position);
        }
    }

    fn on_resize(&self) {
        let last = *self.last_move.lock();
        if let Some((measure, measure_start, offset)) = last {
            self.move_to(measure, measure_start, offset, None);
        }
    }

    fn on_event(&self, event: &TransportEvent) {
        tracing::trace!(?event, "transport event");
    }

    fn destroy(&self) -> Result<(), RendererError> {
        self.surface.remove_cursor();
        *self.layout.lock() = None;
        *self.player.lock() = None;
        Ok(())
    }

    fn version(&self) -> String {
        format!("PositionsRenderer {}", env!("CARGO_PKG_VERSION"))
    }
}
