//! Registry behaviour with real handlers over scripted endpoints.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use femtologging_ws::{
    ConnectionState, FemtoLevel, FemtoTransport, FemtoWebSocketHandler, LogMetadata,
    TransportConfig, TransportRegistry, test_utils::ScriptedRemote,
};
use rstest::rstest;

fn install(registry: &mut TransportRegistry, name: &str, remote: &ScriptedRemote) {
    let handler = FemtoWebSocketHandler::with_connector(
        TransportConfig::new(format!("ws://{name}.test/logs")),
        Box::new(remote.connector()),
    );
    registry.install(name, Arc::new(handler));
}

fn wait_delivered(transport: &dyn FemtoTransport, count: usize, remote: &ScriptedRemote) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while remote.sent().len() < count && Instant::now() < deadline {
        let _ = transport.status();
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[rstest]
fn fans_out_to_every_installed_transport() {
    let primary = ScriptedRemote::new();
    let audit = ScriptedRemote::new();
    let mut registry = TransportRegistry::new();
    install(&mut registry, "primary", &primary);
    install(&mut registry, "audit", &audit);

    registry.write("shared", &LogMetadata::new(FemtoLevel::Info));

    for (name, remote) in [("primary", &primary), ("audit", &audit)] {
        let transport = registry.get(name).expect("installed");
        wait_delivered(transport.as_ref(), 1, remote);
        assert_eq!(remote.sent().len(), 1, "{name}");
        assert_eq!(transport.status().state, ConnectionState::Connected);
    }
}

#[rstest]
fn uninstall_closes_handler() {
    let remote = ScriptedRemote::new();
    let mut registry = TransportRegistry::new();
    install(&mut registry, "primary", &remote);
    let handle = registry.get("primary").expect("installed");

    assert!(registry.uninstall("primary"));
    assert!(registry.get("primary").is_none());
    let status = handle.status();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert!(!status.reconnect_enabled);
    assert!(handle.as_any().is::<FemtoWebSocketHandler>());
}

#[rstest]
fn close_all_empties_registry() {
    let remote = ScriptedRemote::new();
    let mut registry = TransportRegistry::new();
    install(&mut registry, "a", &remote);
    install(&mut registry, "b", &remote);
    assert_eq!(registry.len(), 2);
    registry.close_all();
    assert!(registry.is_empty());
    assert_eq!(remote.attempts(), 2);
}
