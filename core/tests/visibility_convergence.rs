//! End-to-end convergence tests driving the assembled engine through the
//! full flow: registry + session provider + criteria + scheduler ticks, with
//! recording viewer channels standing in for the transport.

use std::sync::Arc;

use holo_core::{
    EngineConfig, HologramEngine, HologramId, InMemorySessionProvider, Position,
    ProtocolVersion, RangeCriteria, SessionEvent, ViewerId, WirePacket, WorldId,
};
use tokio::sync::mpsc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn drain(rx: &mut mpsc::Receiver<WirePacket>) -> Vec<WirePacket> {
    let mut packets = Vec::new();
    while let Ok(packet) = rx.try_recv() {
        packets.push(packet);
    }
    packets
}

fn world() -> WorldId {
    WorldId::new("world")
}

/// The canonical three-line scenario: a viewer in range sees three stacked
/// proxies after one tick; shrinking to two lines produces exactly one
/// removal and touches nothing else.
#[test]
fn three_line_hologram_lifecycle_for_one_viewer() {
    init_tracing();
    let provider = Arc::new(InMemorySessionProvider::new());
    let criteria = Arc::new(RangeCriteria::new(provider.clone(), 48.0));
    let engine = HologramEngine::new(
        EngineConfig::for_testing().with_protocol_version(ProtocolVersion(758)),
        provider.clone(),
        criteria,
    )
    .unwrap();

    engine
        .create_hologram(
            HologramId::new("welcome"),
            Position::new(world(), 0.0, 64.0, 0.0),
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
        )
        .unwrap();

    let viewer = ViewerId::new();
    let mut rx = provider.connect(viewer);
    provider.set_position(&viewer, Position::new(world(), 4.0, 64.0, 4.0));

    let summary = engine.run_tick();
    assert_eq!(summary.shown, 1);

    // Three proxies at vertical offsets 0, -0.26, -0.52.
    let packets = drain(&mut rx);
    let spawned: Vec<(u64, f64)> = packets
        .iter()
        .filter_map(|p| match p {
            WirePacket::AddObject { entity_id, y, .. } => Some((*entity_id, *y)),
            _ => None,
        })
        .collect();
    assert_eq!(spawned.len(), 3);
    let ys: Vec<f64> = spawned.iter().map(|&(_, y)| y).collect();
    assert_eq!(ys, vec![64.0, 64.0 - 0.26, 64.0 - 0.52]);
    let third_entity = spawned[2].0;

    // Shrink to two lines: exactly one removal, for the third proxy only.
    engine
        .set_lines(
            &HologramId::new("welcome"),
            vec!["A".to_string(), "B".to_string()],
        )
        .unwrap();
    let packets = drain(&mut rx);
    assert_eq!(
        packets,
        vec![WirePacket::RemoveObjects {
            entity_ids: vec![third_entity],
        }]
    );

    // Another tick changes nothing.
    engine.run_tick();
    assert!(drain(&mut rx).is_empty());
}

/// Membership always matches the criteria at the tick's evaluation instant:
/// a viewer walking out of range is hidden, walking back in re-shown.
#[test]
fn range_transitions_track_viewer_movement() {
    init_tracing();
    let provider = Arc::new(InMemorySessionProvider::new());
    let criteria = Arc::new(RangeCriteria::new(provider.clone(), 10.0));
    let engine = HologramEngine::new(
        EngineConfig::for_testing(),
        provider.clone(),
        criteria,
    )
    .unwrap();

    engine
        .create_hologram(
            HologramId::new("shop"),
            Position::new(world(), 0.0, 64.0, 0.0),
            vec!["Buy!".to_string()],
        )
        .unwrap();

    let viewer = ViewerId::new();
    let mut rx = provider.connect(viewer);

    // Out of range: nothing shown.
    provider.set_position(&viewer, Position::new(world(), 100.0, 64.0, 0.0));
    let summary = engine.run_tick();
    assert_eq!((summary.shown, summary.hidden), (0, 0));
    assert!(drain(&mut rx).is_empty());

    // Walk in range.
    provider.set_position(&viewer, Position::new(world(), 3.0, 64.0, 0.0));
    assert_eq!(engine.run_tick().shown, 1);
    assert_eq!(drain(&mut rx).len(), 2);

    // Walk away again.
    provider.set_position(&viewer, Position::new(world(), 100.0, 64.0, 0.0));
    assert_eq!(engine.run_tick().hidden, 1);
    let packets = drain(&mut rx);
    assert_eq!(packets.len(), 1);
    assert!(matches!(packets[0], WirePacket::RemoveObjects { .. }));
}

/// Removing a hologram with two active viewers tears it down for both, and
/// the next tick no longer references it.
#[test]
fn removal_reaches_every_viewer() {
    init_tracing();
    let provider = Arc::new(InMemorySessionProvider::new());
    let criteria = Arc::new(RangeCriteria::new(provider.clone(), 48.0));
    let engine = HologramEngine::new(
        EngineConfig::for_testing(),
        provider.clone(),
        criteria,
    )
    .unwrap();

    engine
        .create_hologram(
            HologramId::new("event"),
            Position::new(world(), 0.0, 64.0, 0.0),
            vec!["1".to_string(), "2".to_string()],
        )
        .unwrap();

    let viewer_a = ViewerId::new();
    let viewer_b = ViewerId::new();
    let mut rx_a = provider.connect(viewer_a);
    let mut rx_b = provider.connect(viewer_b);
    provider.set_position(&viewer_a, Position::new(world(), 1.0, 64.0, 0.0));
    provider.set_position(&viewer_b, Position::new(world(), -1.0, 64.0, 0.0));

    assert_eq!(engine.run_tick().shown, 2);
    drain(&mut rx_a);
    drain(&mut rx_b);

    let id = HologramId::new("event");
    engine.remove_hologram(&id).unwrap();
    assert!(!engine.registry().contains(&id));

    for rx in [&mut rx_a, &mut rx_b] {
        let packets = drain(rx);
        assert_eq!(packets.len(), 2);
        assert!(packets
            .iter()
            .all(|p| matches!(p, WirePacket::RemoveObjects { .. })));
    }

    let summary = engine.run_tick();
    assert_eq!(summary.holograms, 0);
    assert!(drain(&mut rx_a).is_empty());
    assert!(drain(&mut rx_b).is_empty());
}

/// A viewer disconnecting between ticks is pruned without packets; a
/// reconnect converges them again through the session event path.
#[test]
fn disconnect_and_rejoin_self_heals() {
    init_tracing();
    let provider = Arc::new(InMemorySessionProvider::new());
    let criteria = Arc::new(RangeCriteria::new(provider.clone(), 48.0));
    let engine = HologramEngine::new(
        EngineConfig::for_testing(),
        provider.clone(),
        criteria,
    )
    .unwrap();

    engine
        .create_hologram(
            HologramId::new("board"),
            Position::new(world(), 0.0, 64.0, 0.0),
            vec!["hi".to_string()],
        )
        .unwrap();

    let viewer = ViewerId::new();
    let mut rx = provider.connect(viewer);
    provider.set_position(&viewer, Position::new(world(), 0.0, 64.0, 1.0));
    engine.run_tick();
    drain(&mut rx);

    provider.disconnect(&viewer);
    let summary = engine.run_tick();
    assert_eq!(summary.pruned, 1);

    // Rejoin: the session event converges without waiting for a tick.
    let mut rx = provider.connect(viewer);
    provider.set_position(&viewer, Position::new(world(), 0.0, 64.0, 1.0));
    engine.handle_session_event(SessionEvent::ViewerJoined { viewer });
    assert_eq!(drain(&mut rx).len(), 2);

    // The following tick finds nothing left to do.
    let summary = engine.run_tick();
    assert_eq!((summary.shown, summary.hidden, summary.pruned), (0, 0, 0));
}
