mod support;

use pretty_assertions::assert_eq;
use scoresync_core::{MemoryMidiCache, Player, PlayerError, PlayerOptions, PlayerState};
use scoresync_ports::{
    ConfigError, ContainerTarget, ConverterError, MidiCache, PlayerConfig, RendererError, Repeat,
    TransportEvent,
};
use std::sync::Arc;
use std::time::Duration;
use support::*;

async fn sample_player() -> (Arc<Player>, Arc<MockConverter>, Arc<MockRenderer>) {
    let converter = Arc::new(MockConverter::new());
    let renderer = Arc::new(MockRenderer::default());
    let player = Player::create(options(converter.clone(), renderer.clone()))
        .await
        .expect("player");
    (player, converter, renderer)
}

#[tokio::test]
async fn create_initializes_collaborators_in_order() {
    let (player, converter, renderer) = sample_player().await;

    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.position(), 0.0);
    assert_eq!(player.duration(), 2000.0);
    assert_eq!(player.title(), Some("Sample"));
    assert_eq!(player.score(), SAMPLE_SCORE);
    assert_eq!(player.midi(), two_second_midi().as_slice());
    assert_eq!(converter.initialized.lock().as_slice(), &[SAMPLE_SCORE.to_string()]);
    assert_eq!(
        renderer.calls(),
        vec![RenderCall::Initialize {
            container: "score".to_string(),
            score: SAMPLE_SCORE.to_string(),
            measures: 2,
            duration: 2000.0,
        }]
    );
    assert!(renderer.player.lock().is_some());
}

#[tokio::test]
async fn version_reports_every_collaborator() {
    let (player, _, _) = sample_player().await;
    let version = player.version();
    assert!(version.player.starts_with("scoresync "));
    assert_eq!(version.renderer, "mock-renderer 1.0");
    assert_eq!(version.converter, "mock-converter 1.0");
    assert!(version.clock.starts_with("MidiClock"));
}

#[tokio::test]
async fn last_measure_is_back_filled_from_clock_duration() {
    let mut converter = MockConverter::new();
    converter.timemap = vec![entry(0, 0.0, 1000.0), entry(1, 1000.0, 0.0)];
    let renderer = Arc::new(MockRenderer::default());
    let player = Player::create(options(Arc::new(converter), renderer))
        .await
        .expect("player");
    assert_eq!(player.timemap().entries()[1].duration, 1000.0);
}

#[tokio::test]
async fn missing_container_fails() {
    let renderer = Arc::new(MockRenderer::default());
    let options = options(Arc::new(MockConverter::new()), renderer.clone())
        .container("nowhere")
        .host(Arc::new(MapHost::default()));
    let err = Player::create(options).await.err().expect("create fails");
    assert!(matches!(
        err,
        PlayerError::Config(ConfigError::ContainerNotFound(_))
    ));
    assert!(err.to_string().contains("Failed to find container element"));
    assert!(renderer.calls().is_empty());
}

#[tokio::test]
async fn container_is_resolved_by_id() {
    let mut host = MapHost::default();
    host.containers.insert(
        "sheet".to_string(),
        Arc::new(MockContainer {
            id: "sheet".to_string(),
        }),
    );
    let renderer = Arc::new(MockRenderer::default());
    let mut options = options(Arc::new(MockConverter::new()), renderer.clone())
        .host(Arc::new(host));
    options.container = Some(ContainerTarget::Id("sheet".to_string()));
    Player::create(options).await.expect("player");
    assert!(matches!(
        renderer.calls().first(),
        Some(RenderCall::Initialize { container, .. }) if container.as_str() == "sheet"
    ));
}

#[tokio::test]
async fn missing_collaborators_are_configuration_errors() {
    let options = PlayerOptions::new()
        .container(container())
        .score(SAMPLE_SCORE)
        .renderer(Arc::new(MockRenderer::default()));
    let err = Player::create(options).await.err().expect("create fails");
    assert!(matches!(err, PlayerError::Config(ConfigError::Missing("converter"))));
}

#[tokio::test]
async fn invalid_velocity_is_rejected_up_front() {
    let config = PlayerConfig {
        velocity: -0.5,
        ..PlayerConfig::default()
    };
    let options = options(
        Arc::new(MockConverter::new()),
        Arc::new(MockRenderer::default()),
    )
    .config(config);
    let err = Player::create(options).await.err().expect("create fails");
    assert!(matches!(err, PlayerError::Config(ConfigError::Invalid(_))));
}

#[tokio::test]
async fn converter_failure_propagates() {
    let renderer = Arc::new(MockRenderer::default());
    let err = Player::create(options(Arc::new(MockConverter::failing()), renderer.clone()))
        .await
        .err()
        .expect("create fails");
    assert!(matches!(err, PlayerError::Converter(ConverterError::Conversion(_))));
    assert!(err.to_string().contains("converter init failed"));
    assert!(renderer.calls().is_empty());
}

#[tokio::test]
async fn renderer_failure_propagates_and_tears_down() {
    let renderer = Arc::new(MockRenderer {
        fail_init: true,
        ..MockRenderer::default()
    });
    let err = Player::create(options(Arc::new(MockConverter::new()), renderer.clone()))
        .await
        .err()
        .expect("create fails");
    assert!(matches!(err, PlayerError::Renderer(RendererError::Layout(_))));
    assert_eq!(renderer.calls().last(), Some(&RenderCall::Destroy));
}

#[tokio::test]
async fn invalid_score_is_rejected() {
    let transform = ScriptedTransform {
        invalid: true,
        ..ScriptedTransform::default()
    };
    let options = options(
        Arc::new(MockConverter::new()),
        Arc::new(MockRenderer::default()),
    )
    .transform(Arc::new(transform));
    let err = Player::create(options).await.err().expect("create fails");
    assert!(matches!(err, PlayerError::InvalidScore(_)));
}

#[tokio::test]
async fn converter_timemap_must_be_valid() {
    let mut converter = MockConverter::new();
    converter.timemap = vec![entry(0, 0.0, 400.0), entry(1, 1000.0, 1000.0)];
    let err = Player::create(options(
        Arc::new(converter),
        Arc::new(MockRenderer::default()),
    ))
    .await
    .err()
    .expect("create fails");
    assert!(matches!(err, PlayerError::Timemap(_)));
}

#[tokio::test]
async fn missing_transform_skips_validation() {
    let mut options = options(
        Arc::new(MockConverter::new()),
        Arc::new(MockRenderer::default()),
    );
    options.transform = None;
    let player = Player::create(options).await.expect("player");
    assert_eq!(player.title(), None);
}

#[tokio::test]
async fn unrolled_score_reaches_collaborators() {
    let unrolled = SAMPLE_SCORE.replace("number=\"2\"", "number=\"3\"");
    let transform = Arc::new(ScriptedTransform {
        unrolled: Some(unrolled.clone()),
        ..ScriptedTransform::sample()
    });
    let converter = Arc::new(MockConverter::new());
    let renderer = Arc::new(MockRenderer::default());
    let options = options(converter.clone(), renderer.clone())
        .transform(transform.clone())
        .unroll(true);
    let player = Player::create(options).await.expect("player");

    assert_eq!(player.score(), unrolled);
    assert_eq!(converter.initialized.lock().as_slice(), &[unrolled.clone()]);
    let transforms = transform.transforms.lock();
    assert_eq!(transforms.len(), 1);
    assert_eq!(transforms[0].0, "unroll.sef.json");
    assert_eq!(
        transforms[0].1.get("renumberMeasures"),
        Some(&serde_json::Value::Bool(true))
    );
}

#[tokio::test]
async fn failed_unroll_keeps_original_score() {
    let converter = Arc::new(MockConverter::new());
    let options = options(converter.clone(), Arc::new(MockRenderer::default())).unroll(true);
    let player = Player::create(options).await.expect("player");
    assert_eq!(player.score(), SAMPLE_SCORE);
}

#[tokio::test]
async fn play_pause_play_ends_playing() {
    let (player, _, renderer) = sample_player().await;
    player.play().await.expect("play");
    assert_eq!(player.state(), PlayerState::Playing);
    player.pause().expect("pause");
    assert_eq!(player.state(), PlayerState::Paused);
    player.play().await.expect("play");
    assert_eq!(player.state(), PlayerState::Playing);
    assert_eq!(
        renderer.events(),
        vec![
            TransportEvent::Started,
            TransportEvent::Paused,
            TransportEvent::Started
        ]
    );
}

#[tokio::test]
async fn pause_when_not_playing_is_a_no_op() {
    let (player, _, renderer) = sample_player().await;
    renderer.clear();
    player.pause().expect("pause");
    assert_eq!(player.state(), PlayerState::Stopped);
    assert!(renderer.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rewind_moves_cursor_home_exactly_once() {
    for setup in ["stopped", "playing", "paused"] {
        let (player, _, renderer) = sample_player().await;
        if setup != "stopped" {
            player.play().await.expect("play");
            tokio::time::sleep(Duration::from_millis(700)).await;
        }
        if setup == "paused" {
            player.pause().expect("pause");
        }
        renderer.clear();

        player.rewind().expect("rewind");

        assert_eq!(player.state(), PlayerState::Stopped, "{setup}");
        assert_eq!(player.position(), 0.0, "{setup}");
        assert_eq!(renderer.moves(), vec![(0, 0.0, 0.0, None)], "{setup}");
        assert_eq!(renderer.events(), vec![TransportEvent::Stopped], "{setup}");
    }
}

#[tokio::test]
async fn move_to_passes_arguments_through() {
    let (player, _, renderer) = sample_player().await;
    renderer.clear();

    player.move_to(1, 1000.0, 500.0).expect("move");

    assert_eq!(renderer.moves(), vec![(1, 1000.0, 500.0, None)]);
    assert_eq!(player.position(), 1500.0);
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(
        renderer.events(),
        vec![TransportEvent::Seeked { timestamp: 1500.0 }]
    );
}

#[tokio::test]
async fn move_to_outside_timemap_clamps_clock() {
    let (player, _, renderer) = sample_player().await;
    renderer.clear();

    player.move_to(7, 1800.0, 900.0).expect("move");

    assert_eq!(renderer.moves(), vec![(7, 1800.0, 900.0, None)]);
    assert_eq!(player.position(), 2000.0);
}

#[tokio::test]
async fn renderer_click_seeks_through_back_reference() {
    let (player, _, renderer) = sample_player().await;
    renderer.clear();

    renderer.click(1, 1000.0, 250.0);

    assert_eq!(player.position(), 1250.0);
    assert_eq!(renderer.moves(), vec![(1, 1000.0, 250.0, None)]);
}

#[tokio::test]
async fn destroy_tolerates_failing_renderer() {
    let renderer = Arc::new(MockRenderer {
        fail_destroy: true,
        ..MockRenderer::default()
    });
    let player = Player::create(options(Arc::new(MockConverter::new()), renderer.clone()))
        .await
        .expect("player");

    player.destroy();
    player.destroy();

    assert_eq!(player.state(), PlayerState::Destroyed);
    let destroys = renderer
        .calls()
        .into_iter()
        .filter(|call| *call == RenderCall::Destroy)
        .count();
    assert_eq!(destroys, 1);
    assert!(matches!(player.play().await, Err(PlayerError::Destroyed)));
    assert!(matches!(player.rewind(), Err(PlayerError::Destroyed)));
}

#[tokio::test]
async fn setters_update_config() {
    let (player, _, _) = sample_player().await;
    player.set_repeat(Repeat::Infinite).expect("repeat");
    player.set_mute(true).expect("mute");
    player.set_velocity(0.5).expect("velocity");
    player
        .set_output(Some(scoresync_ports::DeviceId("usb-synth".to_string())))
        .expect("output");

    let config = player.config();
    assert_eq!(config.repeat, Repeat::Infinite);
    assert!(config.mute);
    assert_eq!(config.velocity, 0.5);
    assert_eq!(config.output.map(|d| d.0), Some("usb-synth".to_string()));

    assert!(matches!(
        player.set_velocity(f32::NAN),
        Err(PlayerError::Config(_))
    ));
    assert_eq!(player.config().velocity, 0.5);
}

#[tokio::test]
async fn resize_is_forwarded() {
    let (player, _, renderer) = sample_player().await;
    renderer.clear();
    player.resize();
    assert_eq!(renderer.calls(), vec![RenderCall::Resize]);
}

#[tokio::test(start_paused = true)]
async fn cursor_follows_clock_while_playing() {
    let converter = Arc::new(MockConverter::new());
    let renderer = Arc::new(MockRenderer::default());
    let player = Player::create(options(converter, renderer.clone()).follow_cursor(true))
        .await
        .expect("player");

    player.play().await.expect("play");
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let moves = renderer.moves();
    let first = moves.first().copied().expect("cursor moved");
    assert_eq!(first.0, 0);
    assert_eq!(first.3, Some(1000.0));
    let (measure, start, offset, duration) = moves.last().copied().expect("cursor moved");
    assert_eq!((measure, start, duration), (1, 1000.0, Some(1000.0)));
    assert!(offset > 400.0 && offset <= 500.0);

    player.pause().expect("pause");
    let paused_moves = renderer.moves().len();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(renderer.moves().len(), paused_moves);
}

#[tokio::test(start_paused = true)]
async fn end_of_score_stops_and_rewinds_cursor() {
    let renderer = Arc::new(MockRenderer::default());
    let player = Player::create(
        options(Arc::new(MockConverter::new()), renderer.clone()).follow_cursor(true),
    )
    .await
    .expect("player");

    player.play().await.expect("play");
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.position(), 0.0);
    assert_eq!(renderer.moves().last(), Some(&(0, 0.0, 0.0, None)));
    assert_eq!(renderer.events().last(), Some(&TransportEvent::Finished));
}

#[tokio::test(start_paused = true)]
async fn end_of_score_stops_without_cursor_follow() {
    let renderer = Arc::new(MockRenderer::default());
    let player = Player::create(options(Arc::new(MockConverter::new()), renderer.clone()))
        .await
        .expect("player");

    player.play().await.expect("play");
    tokio::time::sleep(Duration::from_millis(5000)).await;

    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.position(), 0.0);
    assert_eq!(renderer.moves(), vec![(0, 0.0, 0.0, None)]);
    assert_eq!(
        renderer.events(),
        vec![TransportEvent::Started, TransportEvent::Finished]
    );

    player.play().await.expect("replay");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(player.state(), PlayerState::Playing);
    let position = player.position();
    assert!(position > 0.0 && position <= 500.0, "position {position}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rewind_lands_after_follow_paint_in_flight() {
    let renderer = Arc::new(MockRenderer::default());
    let (started_tx, started_rx) = std::sync::mpsc::channel();
    *renderer.stall_follow.lock() = Some(started_tx);
    let player = Player::create(
        options(Arc::new(MockConverter::new()), renderer.clone()).follow_cursor(true),
    )
    .await
    .expect("player");

    player.play().await.expect("play");
    tokio::task::spawn_blocking(move || started_rx.recv())
        .await
        .expect("join")
        .expect("follow paint started");
    player.rewind().expect("rewind");

    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(renderer.moves().last(), Some(&(0, 0.0, 0.0, None)));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(renderer.moves().last(), Some(&(0, 0.0, 0.0, None)));
}

#[tokio::test(start_paused = true)]
async fn play_waits_for_clock_setup() {
    let clock = Arc::new(GatedClock::new());
    let options = options(
        Arc::new(MockConverter::new()),
        Arc::new(MockRenderer::default()),
    )
    .clock(clock.clone());
    let player = Player::create(options).await.expect("player");

    let pending = tokio::spawn({
        let player = player.clone();
        async move { player.play().await }
    });
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert_eq!(player.state(), PlayerState::Stopped);

    clock.open();
    pending.await.expect("join").expect("play");
    assert_eq!(player.state(), PlayerState::Playing);
}

#[tokio::test(start_paused = true)]
async fn abandoned_create_tears_down_renderer() {
    let renderer = Arc::new(MockRenderer {
        hang_init: true,
        ..MockRenderer::default()
    });
    let create = Player::create(options(Arc::new(MockConverter::new()), renderer.clone()));
    let result = tokio::time::timeout(Duration::from_secs(1), create).await;

    assert!(result.is_err());
    assert_eq!(renderer.calls().last(), Some(&RenderCall::Destroy));
}

#[tokio::test]
async fn cache_hit_skips_conversion() {
    let cache = Arc::new(MemoryMidiCache::new());
    let first = Player::create(
        options(
            Arc::new(MockConverter::new()),
            Arc::new(MockRenderer::default()),
        )
        .cache(cache.clone()),
    )
    .await
    .expect("player");
    assert_eq!(cache.len(), 1);

    // A failing converter proves the second create never initializes it.
    let second = Player::create(
        options(
            Arc::new(MockConverter::failing()),
            Arc::new(MockRenderer::default()),
        )
        .cache(cache.clone()),
    )
    .await
    .expect("cached player");

    assert_eq!(second.midi(), first.midi());
    assert_eq!(second.timemap().entries(), first.timemap().entries());
    assert_eq!(second.version().converter, "mock-converter 1.0");
}

#[tokio::test]
async fn cache_is_keyed_by_unroll_flag() {
    let cache = Arc::new(MemoryMidiCache::new());
    for unroll in [false, true] {
        Player::create(
            options(
                Arc::new(MockConverter::new()),
                Arc::new(MockRenderer::default()),
            )
            .cache(cache.clone())
            .unroll(unroll),
        )
        .await
        .expect("player");
    }
    assert_eq!(cache.len(), 2);
    let key = scoresync_core::score_key(SAMPLE_SCORE, true);
    assert!(cache.delete(&key).expect("delete"));
    assert_eq!(cache.len(), 1);
}

#[test]
fn options_resolve_defaults() {
    let resolved = PlayerOptions::new()
        .container(container())
        .score(SAMPLE_SCORE)
        .converter(Arc::new(MockConverter::new()))
        .renderer(Arc::new(MockRenderer::default()))
        .resolve()
        .expect("resolved");
    assert!(resolved.cache.is_none());
    assert_eq!(resolved.config, PlayerConfig::default());
    assert!(resolved.clock.version().starts_with("MidiClock"));
}
