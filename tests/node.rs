mod common;

use common::{eventually, track, Backend, GatewayCall, RecordingGateway};
use obsidian_client::{
    ConnectOptions, EventKind, HttpClient, LoopType, Node, NodeConfig, NodeEvent, NodeRegistry,
    NodeState, ObsidianError, PlayOptions, Source, Track, TrackInfo, VoiceStateUpdate,
    VolumeFilter, SPOTIFY_MARKER,
};
use obsidian_client::{Filter, LowPassFilter, RotationFilter, VibratoFilter};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry() -> (NodeRegistry, Arc<RecordingGateway>) {
    let gateway = Arc::new(RecordingGateway::default());
    (NodeRegistry::new(gateway.clone()), gateway)
}

#[tokio::test]
async fn play_then_player_update_overwrites_local_state() {
    let mut backend = Backend::start().await;
    let (registry, gateway) = registry();
    let node = registry.initiate(backend.config()).await.unwrap();
    assert!(node.is_connected());

    let session = node.get_or_create_session(1);
    session.connect(5, ConnectOptions::default()).await.unwrap();
    assert_eq!(
        gateway.calls(),
        vec![GatewayCall::Join {
            guild_id: 1,
            channel_id: 5
        }]
    );

    let a = track("a", 10_000);
    session
        .play(a.clone(), PlayOptions { start_time: 500, end_time: 20_000, no_replace: false })
        .await
        .unwrap();
    let play = backend.expect_op(6).await;
    assert_eq!(play, json!({"guild_id": "1", "track": "id-a", "start_time": 500}));

    session.set_pause(Some(true)).await.unwrap();
    assert_eq!(
        backend.expect_op(8).await,
        json!({"guild_id": "1", "state": true})
    );
    assert!(session.is_paused());

    backend.push(
        5,
        json!({
            "guild_id": "1",
            "frames": {"sent": 50, "lost": 0, "usable": true},
            "current_track": {"track": "id-a", "position": 1200, "paused": false}
        }),
    );

    eventually(|| {
        let session = session.clone();
        async move { session.current_track_id().as_deref() == Some("id-a") }
    })
    .await;
    assert!(!session.is_paused());
    assert_eq!(session.frames().sent, Some(50));
    assert!(session.position() >= 1200.0);
}

#[tokio::test]
async fn voice_credentials_are_forwarded_once_both_halves_arrive() {
    let mut backend = Backend::start().await;
    let (registry, _) = registry();
    let node = registry.initiate(backend.config()).await.unwrap();
    let session = node.get_or_create_session(7);

    session
        .on_voice_server_update(json!({"token": "tok", "endpoint": "voice.example"}))
        .await
        .unwrap();
    session
        .on_voice_state_update(VoiceStateUpdate::joined(42, "sess"))
        .await
        .unwrap();

    let update = backend.expect_op(0).await;
    assert_eq!(
        update,
        json!({"session_id": "sess", "token": "tok", "endpoint": "voice.example"})
    );
    assert_eq!(session.channel_id(), Some(42));
}

#[tokio::test]
async fn filters_are_sent_as_one_payload() {
    let mut backend = Backend::start().await;
    let (registry, _) = registry();
    let node = registry.initiate(backend.config()).await.unwrap();
    let session = node.get_or_create_session(3);

    session.add_filter(VolumeFilter::new(1.5).unwrap()).await.unwrap();
    assert_eq!(
        backend.expect_op(9).await,
        json!({"guild_id": "3", "filters": {"volume": 1.5}})
    );
    assert_eq!(session.volume().await, 150);

    session.reset_filters().await.unwrap();
    assert_eq!(
        backend.expect_op(9).await,
        json!({"guild_id": "3", "filters": {}})
    );
}

#[tokio::test]
async fn listeners_and_event_stream_see_player_events() {
    let backend = Backend::start().await;
    let (registry, _) = registry();
    let node = registry.initiate(backend.config()).await.unwrap();
    let mut events = node.subscribe_events();
    node.get_or_create_session(9);
    backend.ready().await;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    node.subscribe(EventKind::TrackStuck, move |session, event| {
        let tx = tx.clone();
        async move {
            let _ = tx.send((session.guild_id(), event));
        }
    });

    backend.push(
        4,
        json!({"type": "TRACK_STUCK", "guild_id": "9", "track": "id-a", "threshold_ms": 4000}),
    );
    backend.push(4, json!({"type": "SOMETHING_NEW", "guild_id": "9"}));

    let (guild_id, event) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(guild_id, 9);
    assert_eq!(event.kind(), EventKind::TrackStuck);

    let player = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(NodeEvent::Player { guild_id, event }) = events.recv().await {
                return (guild_id, event.kind());
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(player, (9, EventKind::TrackStuck));
}

#[tokio::test]
async fn preset_session_advances_on_track_end() {
    let mut backend = Backend::start().await;
    let (registry, _) = registry();
    let node = registry.initiate(backend.config()).await.unwrap();

    let preset = node.get_or_create_preset(11).unwrap();
    preset.connect(1, ConnectOptions::default()).await.unwrap();
    preset.enqueue(track("a", 1000)).unwrap();
    preset.enqueue(track("b", 1000)).unwrap();
    preset.set_loop_type(LoopType::None).unwrap();

    preset.do_next().await.unwrap();
    assert_eq!(backend.expect_op(6).await["track"], "id-a");

    backend.push(
        4,
        json!({"type": "TRACK_END", "guild_id": "11", "track": "id-a", "reason": "FINISHED"}),
    );
    assert_eq!(backend.expect_op(6).await["track"], "id-b");
    assert_eq!(preset.index().unwrap(), Some(1));

    // a replaced track must not advance the queue
    backend.push(
        4,
        json!({"type": "TRACK_END", "guild_id": "11", "track": "id-b", "reason": "REPLACED"}),
    );
    backend.push(
        4,
        json!({"type": "TRACK_END", "guild_id": "11", "track": "id-b", "reason": "FINISHED"}),
    );
    eventually(|| {
        let preset = preset.clone();
        async move { preset.is_idle() }
    })
    .await;
    assert_eq!(preset.index().unwrap(), Some(2));
}

#[tokio::test]
async fn destroying_a_session_sends_player_destroy() {
    let mut backend = Backend::start().await;
    let (registry, gateway) = registry();
    let node = registry.initiate(backend.config()).await.unwrap();

    let session = node.get_or_create_session(4);
    session.connect(8, ConnectOptions::default()).await.unwrap();
    session.play(track("a", 1000), PlayOptions::default()).await.unwrap();
    backend.expect_op(6).await;

    session.destroy(false).await.unwrap();
    assert_eq!(backend.expect_op(7).await, json!({"guild_id": "4"}));
    assert_eq!(backend.expect_op(11).await, json!({"guild_id": "4"}));
    assert!(node.get_session(4).is_none());
    assert!(gateway.calls().contains(&GatewayCall::Leave { guild_id: 4 }));

    // second destroy is harmless
    session.destroy(false).await.unwrap();
}

#[tokio::test]
async fn bad_password_is_authorization_failure() {
    let backend = Backend::start().await;
    let (registry, _) = registry();

    let err = registry
        .initiate(backend.config().with_password("wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, ObsidianError::AuthorizationFailure { .. }));
    assert!(err.is_connection_failure());
    assert!(registry.get("MAIN").is_none());
}

#[tokio::test]
async fn refused_connection_is_connection_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let (registry, _) = registry();
    let err = registry
        .initiate(NodeConfig::new("127.0.0.1", port))
        .await
        .unwrap_err();
    assert!(matches!(err, ObsidianError::ConnectionFailure { .. }));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn duplicate_identifier_is_rejected_without_mutation() {
    let backend = Backend::start().await;
    let (registry, _) = registry();
    let first = registry.initiate(backend.config()).await.unwrap();

    let err = registry.initiate(backend.config()).await.unwrap_err();
    assert!(matches!(err, ObsidianError::AlreadyExists(id) if id == "MAIN"));
    assert_eq!(registry.len(), 1);
    assert_eq!(backend.connection_count(), 1);
    assert_eq!(registry.get_or_default().unwrap().identifier(), first.identifier());

    let second = registry
        .initiate(backend.config().with_identifier("SECOND"))
        .await
        .unwrap();
    assert_eq!(registry.len(), 2);

    second.destroy(false).await.unwrap();
    assert!(registry.get("SECOND").is_none());
    assert_eq!(second.state(), NodeState::Destroyed);
}

#[tokio::test]
async fn dropped_socket_reconnects_with_backoff() {
    let backend = Backend::start().await;
    let (registry, _) = registry();
    let node = registry.initiate(backend.config()).await.unwrap();
    let mut events = node.subscribe_events();

    backend.drop_connection();

    let reconnected = tokio::time::timeout(Duration::from_secs(5), async {
        let mut saw_reconnecting = false;
        loop {
            match events.recv().await {
                Ok(NodeEvent::Reconnecting { attempt, .. }) => {
                    assert_eq!(attempt, 1);
                    saw_reconnecting = true;
                }
                Ok(NodeEvent::Ready { .. }) => return saw_reconnecting,
                Ok(_) => {}
                Err(e) => panic!("event stream failed: {e}"),
            }
        }
    })
    .await
    .unwrap();

    assert!(reconnected);
    assert!(node.is_connected());
    assert_eq!(backend.connection_count(), 2);
}

#[tokio::test]
async fn disconnect_stops_reconnecting_and_clears_sessions() {
    let backend = Backend::start().await;
    let (registry, _) = registry();
    let node = registry.initiate(backend.config()).await.unwrap();
    node.get_or_create_session(1);
    let mut events = node.subscribe_events();

    node.disconnect(false).await.unwrap();
    assert!(!node.is_connected());
    assert!(node.sessions().is_empty());
    assert!(matches!(
        events.recv().await,
        Ok(NodeEvent::Disconnected { .. })
    ));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.connection_count(), 1);

    registry.destroy_all(false).await.unwrap();
    assert!(registry.is_empty());
}

fn unresolved(title: &str) -> Track {
    Track::new(
        SPOTIFY_MARKER,
        TrackInfo {
            title: title.to_string(),
            author: "Rick Astley".to_string(),
            uri: "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC".to_string(),
            identifier: "4uLU6hMCjMI75M1A2tKUQC".to_string(),
            length: 213_573,
            position: 0,
            is_stream: false,
            is_seekable: true,
            source_name: Source::Spotify,
            thumbnail: None,
        },
    )
}

async fn node_with_rest(backend: &Backend, rest: &MockServer) -> Node {
    let config = backend.config();
    let http = HttpClient::with_base_url(&config, rest.uri()).unwrap();
    let node = Node::with_http(config, Arc::new(RecordingGateway::default()), http).unwrap();
    node.connect().await.unwrap();
    node
}

#[tokio::test]
async fn unresolved_track_is_looked_up_before_playing() {
    let mut backend = Backend::start().await;
    let rest = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loadtracks"))
        .and(query_param("identifier", "ytsearch:Never Gonna Give You Up Rick Astley audio"))
        .and(header("Authorization", common::PASSWORD))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "load_type": "SEARCH_RESULT",
            "tracks": [{
                "track": "QAAAjQIAJVJpY2sgQXN0bGV5",
                "info": {
                    "title": "Rick Astley - Never Gonna Give You Up",
                    "author": "RickAstleyVEVO",
                    "uri": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                    "identifier": "dQw4w9WgXcQ",
                    "length": 212000,
                    "is_stream": false,
                    "is_seekable": true,
                    "source_name": "youtube"
                }
            }]
        })))
        .expect(1)
        .mount(&rest)
        .await;

    let node = node_with_rest(&backend, &rest).await;
    let session = node.get_or_create_session(1);
    let played = session
        .play(unresolved("Never Gonna Give You Up"), PlayOptions::default())
        .await
        .unwrap();

    assert_eq!(played.id(), "QAAAjQIAJVJpY2sgQXN0bGV5");
    assert_eq!(played.source(), Source::Spotify);
    assert_eq!(backend.expect_op(6).await["track"], "QAAAjQIAJVJpY2sgQXN0bGV5");
}

#[tokio::test]
async fn unresolvable_track_fails_without_sending() {
    let backend = Backend::start().await;
    let rest = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loadtracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"load_type": "NO_MATCHES"})))
        .mount(&rest)
        .await;

    let node = node_with_rest(&backend, &rest).await;
    let session = node.get_or_create_session(1);
    let err = session
        .play(unresolved("Nothing"), PlayOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ObsidianError::NoMatches(_)));
    assert!(session.current().is_none());
}

#[tokio::test]
async fn back_to_back_player_updates_apply_in_order() {
    let backend = Backend::start().await;
    let (registry, _) = registry();
    let node = registry.initiate(backend.config()).await.unwrap();
    let session = node.get_or_create_session(2);
    backend.ready().await;

    for n in 1..=50 {
        backend.push(
            5,
            json!({
                "guild_id": "2",
                "current_track": {"track": format!("id-{n}"), "position": n * 10, "paused": n % 2 == 0}
            }),
        );
    }

    eventually(|| {
        let session = session.clone();
        async move { session.current_track_id().as_deref() == Some("id-50") }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.current_track_id().as_deref(), Some("id-50"));
    assert!(session.is_paused());
}

#[tokio::test]
async fn concurrent_filter_edits_are_not_lost() {
    let mut backend = Backend::start().await;
    let (registry, _) = registry();
    let node = registry.initiate(backend.config()).await.unwrap();
    let session = node.get_or_create_session(6);

    let filters: Vec<Filter> = vec![
        VolumeFilter::new(0.8).unwrap().into(),
        RotationFilter::default().into(),
        LowPassFilter::default().into(),
        VibratoFilter::default().into(),
    ];
    let tasks: Vec<_> = filters
        .into_iter()
        .map(|filter| {
            let session = session.clone();
            tokio::spawn(async move { session.add_filter(filter).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut sizes = Vec::new();
    let mut last = json!(null);
    for _ in 0..4 {
        last = backend.expect_op(9).await;
        sizes.push(last["filters"].as_object().unwrap().len());
    }
    assert_eq!(sizes, vec![1, 2, 3, 4]);
    for key in ["volume", "rotation", "low_pass", "vibrato"] {
        assert!(last["filters"].get(key).is_some(), "missing {key}");
    }
    assert_eq!(session.filters().await.len(), 4);
}
