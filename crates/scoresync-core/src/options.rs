use crate::clock::MidiClock;
use crate::score::NullTransform;
use scoresync_ports::{
    ConfigError, Container, ContainerHost, ContainerTarget, Converter,
    MidiCache, PlaybackClock, PlayerConfig, Renderer, TransformProcessor,
};
use std::sync::Arc;

/// Everything `Player::create` needs. Collaborators are optional here and
/// checked by [`PlayerOptions::resolve`].
#[derive(Clone, Default)]
pub struct PlayerOptions {
    pub container: Option<ContainerTarget>,
    pub host: Option<Arc<dyn ContainerHost>>,
    pub score: Option<String>,
    pub converter: Option<Arc<dyn Converter>>,
    pub renderer: Option<Arc<dyn Renderer>>,
    pub clock: Option<Arc<dyn PlaybackClock>>,
    pub transform: Option<Arc<dyn TransformProcessor>>,
    pub cache: Option<Arc<dyn MidiCache>>,
    pub config: PlayerConfig,
}

/// Options with every required field present and defaults applied.
#[derive(Clone)]
pub struct ResolvedOptions {
    pub container: Arc<dyn Container>,
    pub score: String,
    pub converter: Arc<dyn Converter>,
    pub renderer: Arc<dyn Renderer>,
    pub clock: Arc<dyn PlaybackClock>,
    pub transform: Arc<dyn TransformProcessor>,
    pub cache: Option<Arc<dyn MidiCache>>,
    pub config: PlayerConfig,
}

impl PlayerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn container(mut self, target: impl Into<ContainerTarget>) -> Self {
        self.container = Some(target.into());
        self
    }

    pub fn host(mut self, host: Arc<dyn ContainerHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn score(mut self, score: impl Into<String>) -> Self {
        self.score = Some(score.into());
        self
    }

    pub fn converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn PlaybackClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn transform(mut self, transform: Arc<dyn TransformProcessor>) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn MidiCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn unroll(mut self, unroll: bool) -> Self {
        self.config.unroll = unroll;
        self
    }

    pub fn follow_cursor(mut self, follow: bool) -> Self {
        self.config.follow_cursor = follow;
        self
    }

    pub fn resolve(self) -> Result<ResolvedOptions, ConfigError> {
        self.config.validate()?;

        let container = match self.container.ok_or(ConfigError::Missing("container"))? {
            ContainerTarget::Element(container) => container,
            ContainerTarget::Id(id) => self
                .host
                .as_ref()
                .and_then(|host| host.find(&id))
                .ok_or(ConfigError::ContainerNotFound(id))?,
        };

        Ok(ResolvedOptions {
            container,
            score: self.score.ok_or(ConfigError::Missing("score"))?,
            converter: self.converter.ok_or(ConfigError::Missing("converter"))?,
            renderer: self.renderer.ok_or(ConfigError::Missing("renderer"))?,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(MidiClock::new()) as Arc<dyn PlaybackClock>),
            transform: self
                .transform
                .unwrap_or_else(|| Arc::new(NullTransform) as Arc<dyn TransformProcessor>),
            cache: self.cache,
            config: self.config,
        })
    }
}
