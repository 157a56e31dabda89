use crate::cache::score_key;
use crate::error::PlayerError;
use crate::follow::spawn_follower;
use crate::options::{PlayerOptions, ResolvedOptions};
use crate::score::{load_score, unroll_score, TITLE_QUERY};
use parking_lot::{Mutex, ReentrantMutex};
use scoresync_ports::{
    validate_velocity, CachedConversion, DeviceId, InitContext, MeasureIndex, MidiCache, Millis,
    PlaybackClock, PlayerConfig, PlayerHandle, RenderContext, Renderer, Repeat, ScoreKey,
    TransportEvent,
};
use scoresync_timeline::Timemap;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PlayerState {
    Stopped,
    Playing,
    Paused,
    Destroyed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayerVersion {
    pub player: String,
    pub renderer: String,
    pub converter: String,
    pub clock: String,
}

struct Transport {
    state: PlayerState,
    follower: Option<JoinHandle<()>>,
    last_cursor: Option<Millis>,
}

/// Playback orchestrator: owns the clock, drives the renderer's cursor from it
/// and routes seeks in both directions.
pub struct Player {
    score: String,
    title: Option<String>,
    midi: Vec<u8>,
    converter_version: String,
    timemap: Arc<Timemap>,
    renderer: Arc<dyn Renderer>,
    clock: Arc<dyn PlaybackClock>,
    config: Mutex<PlayerConfig>,
    follow_cursor: bool,
    cursor_interval_ms: u64,
    transport: Mutex<Transport>,
    /// Held around every cursor paint so a follow tick already in flight
    /// cannot land after a rewind, seek or teardown. Reentrant because a
    /// renderer may seek back into the player while painting.
    paint: ReentrantMutex<()>,
    weak_self: Weak<Player>,
}

/// Tears down collaborators that were started when `create` fails or is
/// dropped before it finishes.
struct InitGuard {
    renderer: Option<Arc<dyn Renderer>>,
    clock: Option<Arc<dyn PlaybackClock>>,
}

impl InitGuard {
    fn disarm(mut self) {
        self.renderer = None;
        self.clock = None;
    }
}

impl Drop for InitGuard {
    fn drop(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            if let Err(err) = renderer.destroy() {
                tracing::error!(error = %err, "renderer teardown failed after aborted create");
            }
        }
        if let Some(clock) = self.clock.take() {
            clock.close();
        }
    }
}

impl Player {
    pub async fn create(options: PlayerOptions) -> Result<Arc<Player>, PlayerError> {
        let ResolvedOptions {
            container,
            score,
            converter,
            renderer,
            clock,
            transform,
            cache,
            config,
        } = options.resolve()?;

        let info = load_score(&score, transform.as_ref(), &[("title", TITLE_QUERY)]).await?;
        let title = info.query("title").map(str::to_string);

        let score = if config.unroll {
            unroll_score(&score, &config, transform.as_ref()).await
        } else {
            score
        };

        let mut guard = InitGuard {
            renderer: None,
            clock: None,
        };

        let key = cache.as_ref().map(|_| score_key(&score, config.unroll));
        let conversion = match lookup_cache(cache.as_deref(), key.as_ref()) {
            Some(hit) => {
                tracing::info!(converter = %hit.converter, "using cached conversion");
                hit
            }
            None => {
                let ctx = InitContext {
                    config: &config,
                    transform: &transform,
                };
                converter.initialize(&score, ctx).await?;
                let conversion = CachedConversion {
                    converter: converter.version(),
                    midi: converter.midi()?,
                    timemap: converter.timemap(),
                };
                store_cache(cache.as_deref(), key.as_ref(), &conversion);
                conversion
            }
        };

        let timemap = Timemap::new(conversion.timemap)?;

        guard.clock = Some(clock.clone());
        clock.load(&conversion.midi)?;
        clock.set_repeat(config.repeat)?;
        clock.set_mute(config.mute)?;
        clock.set_velocity(config.velocity)?;
        clock.set_output(config.output.clone())?;

        let duration = clock.duration();
        let timemap = if duration > 0.0 && !timemap.is_empty() {
            Arc::new(timemap.with_total_duration(duration))
        } else {
            Arc::new(timemap)
        };

        guard.renderer = Some(renderer.clone());
        let ctx = RenderContext {
            config: &config,
            transform: &transform,
            timemap: &timemap,
            duration,
        };
        renderer.initialize(container, &score, ctx).await?;

        let follow_cursor = config.follow_cursor;
        let cursor_interval_ms = config.cursor_interval_ms;
        let player = Arc::new_cyclic(|weak_self| Player {
            score,
            title,
            midi: conversion.midi,
            converter_version: conversion.converter,
            timemap,
            renderer: renderer.clone(),
            clock,
            config: Mutex::new(config),
            follow_cursor,
            cursor_interval_ms,
            transport: Mutex::new(Transport {
                state: PlayerState::Stopped,
                follower: None,
                last_cursor: None,
            }),
            paint: ReentrantMutex::new(()),
            weak_self: weak_self.clone(),
        });

        let handle: Weak<dyn PlayerHandle> = player.weak_self.clone();
        renderer.attach_player(handle);
        guard.disarm();

        tracing::info!(
            measures = player.timemap.len(),
            duration_ms = duration,
            "player created"
        );
        Ok(player)
    }

    pub fn state(&self) -> PlayerState {
        self.transport.lock().state
    }

    /// Score text handed to the converter and renderer (unrolled when enabled).
    pub fn score(&self) -> &str {
        &self.score
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn midi(&self) -> &[u8] {
        &self.midi
    }

    pub fn timemap(&self) -> &Timemap {
        &self.timemap
    }

    pub fn config(&self) -> PlayerConfig {
        self.config.lock().clone()
    }

    pub fn position(&self) -> Millis {
        self.clock.position()
    }

    pub fn duration(&self) -> Millis {
        self.clock.duration()
    }

    pub fn version(&self) -> PlayerVersion {
        PlayerVersion {
            player: format!("scoresync {}", env!("CARGO_PKG_VERSION")),
            renderer: self.renderer.version(),
            converter: self.converter_version.clone(),
            clock: self.clock.version(),
        }
    }

    /// Starts or resumes playback once the clock has finished its setup. A
    /// score that already played to the end starts over.
    pub async fn play(&self) -> Result<(), PlayerError> {
        self.ensure_alive()?;
        self.clock.ready().await;
        {
            // Keeps an end-of-score tick from stopping the clock just restarted.
            let _paint = self.paint.lock();
            let mut transport = self.transport.lock();
            match transport.state {
                PlayerState::Destroyed => return Err(PlayerError::Destroyed),
                PlayerState::Playing if !self.clock.is_finished() => return Ok(()),
                PlayerState::Playing | PlayerState::Stopped | PlayerState::Paused => {}
            }
            self.clock.play()?;
            transport.state = PlayerState::Playing;
            transport.last_cursor = None;
            // The follower also detects the end of the score, so it runs even
            // when the cursor is not painted.
            let follower = spawn_follower(self.weak_self.clone(), self.cursor_interval_ms);
            if let Some(previous) = transport.follower.replace(follower) {
                previous.abort();
            }
        }
        self.renderer.on_event(&TransportEvent::Started);
        Ok(())
    }

    pub fn pause(&self) -> Result<(), PlayerError> {
        let follower = {
            let mut transport = self.transport.lock();
            match transport.state {
                PlayerState::Destroyed => return Err(PlayerError::Destroyed),
                PlayerState::Playing => {}
                PlayerState::Stopped | PlayerState::Paused => return Ok(()),
            }
            self.clock.pause()?;
            transport.state = PlayerState::Paused;
            transport.follower.take()
        };
        if let Some(follower) = follower {
            follower.abort();
        }
        self.renderer.on_event(&TransportEvent::Paused);
        Ok(())
    }

    pub fn rewind(&self) -> Result<(), PlayerError> {
        let follower = {
            let mut transport = self.transport.lock();
            if transport.state == PlayerState::Destroyed {
                return Err(PlayerError::Destroyed);
            }
            transport.state = PlayerState::Stopped;
            transport.last_cursor = None;
            transport.follower.take()
        };
        if let Some(follower) = follower {
            follower.abort();
        }
        self.clock.stop()?;
        {
            let _paint = self.paint.lock();
            self.renderer.move_to(0, 0.0, 0.0, None);
        }
        self.renderer.on_event(&TransportEvent::Stopped);
        Ok(())
    }

    /// Seeks the clock and forwards the arguments unchanged to the renderer.
    pub fn move_to(
        &self,
        measure: MeasureIndex,
        measure_start: Millis,
        offset: Millis,
    ) -> Result<(), PlayerError> {
        self.ensure_alive()?;
        let timestamp = match self.timemap.get(measure) {
            Some(entry) => entry.timestamp + offset,
            None => {
                let timestamp = (measure_start + offset).clamp(0.0, self.clock.duration().max(0.0));
                tracing::debug!(measure, timestamp, "seek to a measure outside the timemap");
                timestamp
            }
        };
        if let Err(err) = self.clock.seek(timestamp) {
            tracing::warn!(error = %err, timestamp, "clock seek failed");
        }
        self.transport.lock().last_cursor = None;
        {
            let _paint = self.paint.lock();
            self.renderer.move_to(measure, measure_start, offset, None);
        }
        self.renderer.on_event(&TransportEvent::Seeked { timestamp });
        Ok(())
    }

    pub fn set_repeat(&self, repeat: Repeat) -> Result<(), PlayerError> {
        self.ensure_alive()?;
        self.clock.set_repeat(repeat)?;
        self.config.lock().repeat = repeat;
        Ok(())
    }

    pub fn set_mute(&self, mute: bool) -> Result<(), PlayerError> {
        self.ensure_alive()?;
        self.clock.set_mute(mute)?;
        self.config.lock().mute = mute;
        Ok(())
    }

    pub fn set_velocity(&self, velocity: f32) -> Result<(), PlayerError> {
        self.ensure_alive()?;
        validate_velocity(velocity)?;
        self.clock.set_velocity(velocity)?;
        self.config.lock().velocity = velocity;
        Ok(())
    }

    pub fn set_output(&self, output: Option<DeviceId>) -> Result<(), PlayerError> {
        self.ensure_alive()?;
        self.clock.set_output(output.clone())?;
        self.config.lock().output = output;
        Ok(())
    }

    pub fn resize(&self) {
        if self.state() != PlayerState::Destroyed {
            self.renderer.on_resize();
        }
    }

    /// Releases the renderer and the clock. Later calls do nothing.
    pub fn destroy(&self) {
        let follower = {
            let mut transport = self.transport.lock();
            if transport.state == PlayerState::Destroyed {
                return;
            }
            transport.state = PlayerState::Destroyed;
            transport.follower.take()
        };
        if let Some(follower) = follower {
            follower.abort();
        }
        {
            let _paint = self.paint.lock();
            if let Err(err) = self.renderer.destroy() {
                tracing::error!(error = %err, "renderer teardown failed");
            }
        }
        self.clock.close();
        tracing::info!("player destroyed");
    }

    /// One follow step: detects the end of the score and, when cursor-follow
    /// is on, paints the current position. Returns false once the task
    /// should stop.
    pub(crate) fn follow_tick(&self) -> bool {
        let _paint = self.paint.lock();
        let position = {
            let mut transport = self.transport.lock();
            if transport.state != PlayerState::Playing {
                return false;
            }
            if self.clock.is_finished() {
                transport.state = PlayerState::Stopped;
                transport.last_cursor = None;
                // Dropping only detaches this task's own handle.
                drop(transport.follower.take());
                None
            } else if !self.follow_cursor {
                return true;
            } else {
                let position = self.clock.position();
                if transport.last_cursor == Some(position) {
                    return true;
                }
                transport.last_cursor = Some(position);
                Some(position)
            }
        };

        let Some(position) = position else {
            self.finish();
            return false;
        };
        if let Some(located) = self.timemap.locate(position) {
            self.renderer.move_to(
                located.index,
                located.start,
                located.offset,
                Some(located.duration),
            );
        }
        true
    }

    fn finish(&self) {
        if let Err(err) = self.clock.stop() {
            tracing::warn!(error = %err, "failed to stop clock at end of score");
        }
        self.renderer.move_to(0, 0.0, 0.0, None);
        self.renderer.on_event(&TransportEvent::Finished);
        tracing::debug!("playback finished");
    }

    fn ensure_alive(&self) -> Result<(), PlayerError> {
        if self.state() == PlayerState::Destroyed {
            return Err(PlayerError::Destroyed);
        }
        Ok(())
    }
}

impl PlayerHandle for Player {
    fn move_to(&self, measure: MeasureIndex, measure_start: Millis, offset: Millis) {
        if let Err(err) = Player::move_to(self, measure, measure_start, offset) {
            tracing::debug!(error = %err, "ignored seek request");
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        if let Some(follower) = self.transport.get_mut().follower.take() {
            follower.abort();
        }
    }
}

fn lookup_cache(cache: Option<&dyn MidiCache>, key: Option<&ScoreKey>) -> Option<CachedConversion> {
    let (cache, key) = (cache?, key?);
    match cache.get(key) {
        Ok(hit) => hit,
        Err(err) => {
            tracing::warn!(error = %err, %key, "midi cache lookup failed");
            None
        }
    }
}

fn store_cache(cache: Option<&dyn MidiCache>, key: Option<&ScoreKey>, value: &CachedConversion) {
    let (Some(cache), Some(key)) = (cache, key) else {
        return;
    };
    if let Err(err) = cache.put(key, value) {
        tracing::warn!(error = %err, %key, "midi cache store failed");
    }
}
