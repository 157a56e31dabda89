#![allow(dead_code)]

use async_trait::async_trait;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use parking_lot::Mutex;
use scoresync_core::{MidiClock, PlayerOptions};
use scoresync_ports::{
    ClockError, Container, ContainerHost, Converter, ConverterError, DeviceId, DocumentHandle,
    InitContext, Millis, PlaybackClock, PlayerHandle, QueryResult, Rect, RenderContext, Renderer,
    RendererError, Repeat, TransformError, TransformParams, TransformProcessor, TransportEvent,
};
use scoresync_timeline::TimemapEntry;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::watch;

pub const SAMPLE_SCORE: &str = r#"<score-partwise version="4.0">
  <work><work-title>Sample</work-title></work>
  <part id="P1">
    <measure number="1"><note><pitch><step>C</step><octave>4</octave></pitch></note></measure>
    <measure number="2"><note><pitch><step>D</step><octave>4</octave></pitch></note></measure>
  </part>
</score-partwise>"#;

/// One quarter note at 120 bpm lasting `ticks` at 480 ppq.
pub fn midi_bytes(ticks: u32) -> Vec<u8> {
    let track = vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500_000))),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(60),
                    vel: u7::new(64),
                },
            },
        },
        TrackEvent {
            delta: u28::new(ticks),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOff {
                    key: u7::new(60),
                    vel: u7::new(0),
                },
            },
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ];
    let smf = Smf {
        header: Header {
            format: midly::Format::SingleTrack,
            timing: Timing::Metrical(u15::new(480)),
        },
        tracks: vec![track],
    };
    let mut data = Vec::new();
    smf.write(&mut data).expect("write midi");
    data
}

/// Two seconds of MIDI.
pub fn two_second_midi() -> Vec<u8> {
    midi_bytes(1920)
}

pub fn entry(measure: u32, timestamp: f64, duration: f64) -> TimemapEntry {
    TimemapEntry {
        measure,
        timestamp,
        duration,
    }
}

pub struct MockContainer {
    pub id: String,
}

impl Container for MockContainer {
    fn id(&self) -> &str {
        &self.id
    }

    fn bounds(&self) -> Rect {
        Rect {
            left: 0.0,
            top: 0.0,
            width: 800.0,
            height: 600.0,
        }
    }
}

#[derive(Default)]
pub struct MapHost {
    pub containers: HashMap<String, Arc<dyn Container>>,
}

impl ContainerHost for MapHost {
    fn find(&self, id: &str) -> Option<Arc<dyn Container>> {
        self.containers.get(id).cloned()
    }
}

pub struct MockConverter {
    pub fail: bool,
    pub midi: Vec<u8>,
    pub timemap: Vec<TimemapEntry>,
    pub initialized: Mutex<Vec<String>>,
}

impl MockConverter {
    pub fn new() -> Self {
        Self {
            fail: false,
            midi: two_second_midi(),
            timemap: vec![entry(0, 0.0, 1000.0), entry(1, 1000.0, 1000.0)],
            initialized: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl Converter for MockConverter {
    async fn initialize(&self, score: &str, _ctx: InitContext<'_>) -> Result<(), ConverterError> {
        if self.fail {
            return Err(ConverterError::Conversion("converter init failed".to_string()));
        }
        self.initialized.lock().push(score.to_string());
        Ok(())
    }

    fn midi(&self) -> Result<Vec<u8>, ConverterError> {
        Ok(self.midi.clone())
    }

    fn timemap(&self) -> Vec<TimemapEntry> {
        self.timemap.clone()
    }

    fn version(&self) -> String {
        "mock-converter 1.0".to_string()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RenderCall {
    Initialize {
        container: String,
        score: String,
        measures: usize,
        duration: Millis,
    },
    MoveTo(usize, Millis, Millis, Option<Millis>),
    Resize,
    Event(TransportEvent),
    Destroy,
}

#[derive(Default)]
pub struct MockRenderer {
    pub fail_init: bool,
    pub hang_init: bool,
    pub fail_destroy: bool,
    pub calls: Mutex<Vec<RenderCall>>,
    pub player: Mutex<Option<Weak<dyn PlayerHandle>>>,
    /// When set, the next cursor-follow paint signals here and then stalls
    /// before it is recorded.
    pub stall_follow: Mutex<Option<std::sync::mpsc::Sender<()>>>,
}

impl MockRenderer {
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().clone()
    }

    pub fn moves(&self) -> Vec<(usize, Millis, Millis, Option<Millis>)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RenderCall::MoveTo(m, s, o, d) => Some((*m, *s, *o, *d)),
                _ => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<TransportEvent> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RenderCall::Event(event) => Some(*event),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// Simulates a user click resolved to a measure position.
    pub fn click(&self, measure: usize, measure_start: Millis, offset: Millis) {
        let player = self.player.lock().as_ref().and_then(Weak::upgrade);
        if let Some(player) = player {
            player.move_to(measure, measure_start, offset);
        }
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn initialize(
        &self,
        container: Arc<dyn Container>,
        score: &str,
        ctx: RenderContext<'_>,
    ) -> Result<(), RendererError> {
        self.calls.lock().push(RenderCall::Initialize {
            container: container.id().to_string(),
            score: score.to_string(),
            measures: ctx.timemap.len(),
            duration: ctx.duration,
        });
        if self.hang_init {
            std::future::pending::<()>().await;
        }
        if self.fail_init {
            return Err(RendererError::Layout("renderer init failed".to_string()));
        }
        Ok(())
    }

    fn attach_player(&self, player: Weak<dyn PlayerHandle>) {
        *self.player.lock() = Some(player);
    }

    fn move_to(&self, measure: usize, measure_start: Millis, offset: Millis, duration: Option<Millis>) {
        if duration.is_some() {
            let stall = self.stall_follow.lock().take();
            if let Some(started) = stall {
                let _ = started.send(());
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
        }
        self.calls
            .lock()
            .push(RenderCall::MoveTo(measure, measure_start, offset, duration));
    }

    fn on_resize(&self) {
        self.calls.lock().push(RenderCall::Resize);
    }

    fn on_event(&self, event: &TransportEvent) {
        self.calls.lock().push(RenderCall::Event(*event));
    }

    fn destroy(&self) -> Result<(), RendererError> {
        self.calls.lock().push(RenderCall::Destroy);
        if self.fail_destroy {
            return Err(RendererError::Backend("renderer destroy failed".to_string()));
        }
        Ok(())
    }

    fn version(&self) -> String {
        "mock-renderer 1.0".to_string()
    }
}

/// Transform processor with canned answers.
#[derive(Default)]
pub struct ScriptedTransform {
    pub invalid: bool,
    pub title: Option<String>,
    pub unrolled: Option<String>,
    pub timemap: Option<String>,
    pub transforms: Mutex<Vec<(String, TransformParams)>>,
}

impl ScriptedTransform {
    pub fn sample() -> Self {
        Self {
            title: Some("Sample".to_string()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl TransformProcessor for ScriptedTransform {
    async fn parse(&self, source: &str) -> Result<DocumentHandle, TransformError> {
        if source.trim().is_empty() {
            return Err(TransformError::Parse("empty document".to_string()));
        }
        Ok(DocumentHandle::new(source.to_string()))
    }

    fn query(&self, path: &str, _document: &DocumentHandle) -> Result<QueryResult, TransformError> {
        if path.starts_with("boolean(") {
            return Ok(QueryResult::Boolean(!self.invalid));
        }
        if path.contains("@version") {
            return Ok(QueryResult::Text("4.0".to_string()));
        }
        if path == "//work-title" {
            return Ok(self
                .title
                .clone()
                .map(QueryResult::Text)
                .unwrap_or(QueryResult::Empty));
        }
        Err(TransformError::Query(format!("unknown path {path}")))
    }

    async fn transform(
        &self,
        template: &str,
        _source: &str,
        params: &TransformParams,
    ) -> Result<String, TransformError> {
        self.transforms
            .lock()
            .push((template.to_string(), params.clone()));
        let output = if template.contains("unroll") {
            self.unrolled.clone()
        } else {
            self.timemap.clone()
        };
        output.ok_or_else(|| TransformError::Transform(format!("{template} failed")))
    }
}

/// MidiClock whose `ready` waits for an explicit gate.
pub struct GatedClock {
    pub inner: MidiClock,
    pub gate: watch::Sender<bool>,
}

impl GatedClock {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            inner: MidiClock::new(),
            gate,
        }
    }

    pub fn open(&self) {
        self.gate.send_replace(true);
    }
}

#[async_trait]
impl PlaybackClock for GatedClock {
    fn load(&self, midi: &[u8]) -> Result<(), ClockError> {
        self.inner.load(midi)
    }

    async fn ready(&self) {
        let mut rx = self.gate.subscribe();
        let _ = rx.wait_for(|open| *open).await;
        self.inner.ready().await;
    }

    fn play(&self) -> Result<(), ClockError> {
        self.inner.play()
    }

    fn pause(&self) -> Result<(), ClockError> {
        self.inner.pause()
    }

    fn stop(&self) -> Result<(), ClockError> {
        self.inner.stop()
    }

    fn seek(&self, position: Millis) -> Result<(), ClockError> {
        self.inner.seek(position)
    }

    fn position(&self) -> Millis {
        self.inner.position()
    }

    fn duration(&self) -> Millis {
        self.inner.duration()
    }

    fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    fn set_repeat(&self, repeat: Repeat) -> Result<(), ClockError> {
        self.inner.set_repeat(repeat)
    }

    fn set_mute(&self, mute: bool) -> Result<(), ClockError> {
        self.inner.set_mute(mute)
    }

    fn set_velocity(&self, velocity: f32) -> Result<(), ClockError> {
        self.inner.set_velocity(velocity)
    }

    fn set_output(&self, output: Option<DeviceId>) -> Result<(), ClockError> {
        self.inner.set_output(output)
    }

    fn close(&self) {
        self.inner.close()
    }

    fn version(&self) -> String {
        format!("gated {}", self.inner.version())
    }
}

pub fn container() -> Arc<dyn Container> {
    Arc::new(MockContainer {
        id: "score".to_string(),
    })
}

/// Routes player logs to the test harness; `RUST_LOG=debug` shows them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn options(converter: Arc<MockConverter>, renderer: Arc<MockRenderer>) -> PlayerOptions {
    init_tracing();
    PlayerOptions::new()
        .container(container())
        .score(SAMPLE_SCORE)
        .converter(converter)
        .renderer(renderer)
        .transform(Arc::new(ScriptedTransform::sample()))
        .follow_cursor(false)
}
