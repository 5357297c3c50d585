//! Facade tests driving `FemtoWebSocketHandler` over a scripted endpoint.

use std::time::{Duration, Instant, UNIX_EPOCH};

use crossbeam_channel::{Receiver, bounded};
use femtologging_ws::{
    ConfigUpdate, ConnectionState, FemtoLevel, FemtoTransport, FemtoWebSocketHandler, LogMetadata,
    TransportConfig, TransportStatus,
    test_utils::{ScriptedConnector, ScriptedOutcome, ScriptedRemote},
    websocket_handler::{ConnectError, SocketConnection, SocketConnector, SocketEvents},
};
use rstest::{fixture, rstest};
use serde_json::{Value, json};

fn config() -> TransportConfig {
    TransportConfig::new("ws://collector.test/logs")
        .with_reconnect_delay(Duration::from_millis(5))
        .with_poll_interval(Duration::from_millis(5))
}

fn handler_for(config: TransportConfig, remote: &ScriptedRemote) -> FemtoWebSocketHandler {
    FemtoWebSocketHandler::with_connector(config, Box::new(remote.connector()))
}

#[fixture]
fn pending_remote() -> ScriptedRemote {
    ScriptedRemote::with_fallback(ScriptedOutcome::Pending)
}

fn info() -> LogMetadata {
    LogMetadata::new(FemtoLevel::Info)
}

fn messages(payloads: &[String]) -> Vec<String> {
    payloads
        .iter()
        .map(|p| {
            let value: Value = serde_json::from_str(p).expect("payload is JSON");
            value["message"].as_str().expect("message field").to_owned()
        })
        .collect()
}

fn wait_until(
    handler: &FemtoWebSocketHandler,
    predicate: impl Fn(&TransportStatus) -> bool,
) -> TransportStatus {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let status = handler.status();
        if predicate(&status) || Instant::now() >= deadline {
            return status;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// Connected with nothing left in the buffer.
fn delivered(status: &TransportStatus) -> bool {
    status.state == ConnectionState::Connected && status.buffer_size == 0
}

#[rstest]
fn writes_reach_remote_in_order() {
    let remote = ScriptedRemote::new();
    let handler = handler_for(config(), &remote);
    for msg in ["a", "b", "c"] {
        handler.write(msg, &info());
    }
    let status = wait_until(&handler, delivered);
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(messages(&remote.sent()), ["a", "b", "c"]);
}

#[rstest]
fn unrepresentable_timestamp_does_not_stop_the_transport() {
    let remote = ScriptedRemote::new();
    let handler = handler_for(config(), &remote);
    let far_future = LogMetadata::at(FemtoLevel::Info, UNIX_EPOCH + Duration::from_secs(1 << 45));
    handler.write("far future", &far_future);
    handler.write("next", &info());
    let status = wait_until(&handler, delivered);
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(messages(&remote.sent()), ["far future", "next"]);
}

/// Connector whose first `open` waits for a release signal, standing in for
/// an endpoint that never answers.
struct GatedConnector {
    gate: Receiver<()>,
    inner: ScriptedConnector,
}

impl SocketConnector for GatedConnector {
    fn open(
        &mut self,
        config: &TransportConfig,
        events: SocketEvents,
    ) -> Result<Box<dyn SocketConnection>, ConnectError> {
        let _ = self.gate.recv_timeout(Duration::from_secs(5));
        self.inner.open(config, events)
    }
}

#[rstest]
fn blocked_connector_bounds_queued_writes(pending_remote: ScriptedRemote) {
    let (release, gate) = bounded(1);
    let connector = GatedConnector {
        gate,
        inner: pending_remote.connector(),
    };
    let handler = FemtoWebSocketHandler::with_connector(
        config().with_capacity(8).with_max_buffer_size(2),
        Box::new(connector),
    );
    let started = Instant::now();
    for n in 0..20 {
        handler.write(&n.to_string(), &info());
    }
    assert!(started.elapsed() < Duration::from_secs(1));

    release.send(()).expect("worker waits at the gate");
    let status = handler.status();
    assert_eq!(status.state, ConnectionState::Connecting);
    assert_eq!(status.buffer_size, 2);
    // 12 rejected by the full queue, 6 evicted from the buffer.
    assert_eq!(status.dropped, 18);

    pending_remote.accept_pending();
    let status = wait_until(&handler, delivered);
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(messages(&pending_remote.sent()), ["6", "7"]);
}

#[rstest]
fn status_reflects_buffer_while_connecting(pending_remote: ScriptedRemote) {
    let handler = handler_for(config().with_max_buffer_size(2), &pending_remote);
    for msg in ["1", "2", "3"] {
        handler.write(msg, &info());
    }
    let status = handler.status();
    assert_eq!(status.state, ConnectionState::Connecting);
    assert_eq!(status.buffer_size, 2);
    assert_eq!(status.max_buffer_size, 2);
    assert_eq!(status.dropped, 1);

    pending_remote.accept_pending();
    let status = wait_until(&handler, |s| s.buffer_size == 0);
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(messages(&pending_remote.sent()), ["2", "3"]);
}

#[rstest]
fn reconnects_after_drop_and_flushes_buffer() {
    let remote = ScriptedRemote::new();
    let handler = handler_for(config(), &remote);
    wait_until(&handler, delivered);
    remote.push_outcome(ScriptedOutcome::Pending);
    remote.drop_connection();
    let status = wait_until(&handler, |s| s.state == ConnectionState::Connecting);
    assert_eq!(status.state, ConnectionState::Connecting);
    assert_eq!(status.reconnect_attempts, 1);

    handler.write("while away", &info());
    remote.accept_pending();
    let status = wait_until(&handler, delivered);
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(status.reconnect_attempts, 0);
    assert_eq!(messages(&remote.sent()), ["while away"]);
}

#[rstest]
fn gives_up_after_ceiling() {
    let remote = ScriptedRemote::with_fallback(ScriptedOutcome::Refuse);
    let handler = handler_for(config().with_max_reconnect_attempts(2), &remote);
    let status = wait_until(&handler, |s| s.state == ConnectionState::Error);
    assert_eq!(status.state, ConnectionState::Error);
    assert_eq!(status.reconnect_attempts, 2);
    assert_eq!(remote.attempts(), 3);
}

#[rstest]
fn json_configure_switches_endpoint_and_ignores_unknown_keys() {
    let remote = ScriptedRemote::new();
    let handler = handler_for(config(), &remote);
    FemtoTransport::configure(
        &handler,
        &json!({
            "url": "ws://replacement.test/logs",
            "includeMetadata": false,
            "maxBufferSize": "not a number",
            "colour": "blue",
        }),
    );
    handler.write("raw", &info());
    let status = wait_until(&handler, |s| {
        delivered(s) && s.url == "ws://replacement.test/logs"
    });
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(status.url, "ws://replacement.test/logs");
    assert_eq!(status.max_buffer_size, 1000);
    assert_eq!(
        remote.urls(),
        ["ws://collector.test/logs", "ws://replacement.test/logs"]
    );
    assert_eq!(remote.sent(), ["raw"]);
}

#[rstest]
fn configure_can_disable_reconnection() {
    let remote = ScriptedRemote::new();
    let handler = handler_for(config(), &remote);
    handler.configure(ConfigUpdate::new().with_reconnect(false));
    wait_until(&handler, delivered);
    remote.drop_connection();
    let status = wait_until(&handler, |s| s.state == ConnectionState::Error);
    assert_eq!(status.state, ConnectionState::Error);
    assert!(!status.reconnect_enabled);
    assert_eq!(remote.attempts(), 1);
}

#[rstest]
fn close_is_idempotent(pending_remote: ScriptedRemote) {
    let handler = handler_for(config(), &pending_remote);
    handler.write("discarded", &info());
    handler.close();
    let first = handler.status();
    handler.close();
    assert_eq!(handler.status(), first);
    assert_eq!(first.state, ConnectionState::Disconnected);
    assert_eq!(first.buffer_size, 0);
    assert!(!first.reconnect_enabled);

    handler.write("after close", &info());
    pending_remote.accept_pending();
    assert!(pending_remote.sent().is_empty());
    assert_eq!(pending_remote.closes(), 1);
}

#[rstest]
fn dropping_handler_closes_connection() {
    let remote = ScriptedRemote::new();
    {
        let handler = handler_for(config(), &remote);
        assert_eq!(
            wait_until(&handler, delivered).state,
            ConnectionState::Connected
        );
    }
    assert_eq!(remote.closes(), 1);
}

#[rstest]
fn status_serialises_camel_case(pending_remote: ScriptedRemote) {
    let handler = handler_for(config(), &pending_remote);
    let value = serde_json::to_value(handler.status()).expect("status serialises");
    assert_eq!(value["state"], "connecting");
    assert_eq!(value["url"], "ws://collector.test/logs");
    assert_eq!(value["reconnectAttempts"], 0);
    assert_eq!(value["maxReconnectAttempts"], 5);
    assert_eq!(value["bufferSize"], 0);
    assert_eq!(value["maxBufferSize"], 1000);
    assert_eq!(value["reconnectEnabled"], true);
}
