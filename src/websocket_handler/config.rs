//! Configuration structures consumed by the WebSocket handler lifecycle.
//!
//! `WebSocketHandlerBuilder` constructs these values before passing them to
//! [`FemtoWebSocketHandler`](super::FemtoWebSocketHandler) for runtime use.
//! Live reconfiguration goes through [`ConfigUpdate`], which merges into the
//! current snapshot rather than replacing it.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::rate_limited_warner::DEFAULT_WARN_INTERVAL;

/// Default bounded capacity of the command channel feeding the worker.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
/// Default unit of the linear reconnect backoff.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);
/// Default ceiling on consecutive reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
/// Default capacity of the pending-envelope buffer.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1000;
/// Default connection timeout applied to TCP connect and the opening handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default write timeout applied to socket writes.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// Default interval at which a live socket is polled for inbound close frames.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Immutable configuration snapshot for one transport instance.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportConfig {
    /// Endpoint URL (`ws://` or `wss://`).
    pub url: String,
    /// Sub-protocols offered during the handshake.
    pub protocols: Vec<String>,
    /// Whether unexpected closes schedule reconnects.
    pub reconnect: bool,
    /// Linear backoff unit; attempt `n` waits `reconnect_delay * n`.
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
    pub max_buffer_size: usize,
    /// Send JSON envelopes when true, raw messages otherwise.
    pub include_metadata: bool,
    /// Extra headers added to the opening handshake.
    pub headers: BTreeMap<String, String>,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub poll_interval: Duration,
    pub warn_interval: Duration,
    /// Commands the worker may have queued; writes beyond this are dropped.
    /// Fixed when the handler starts.
    pub capacity: usize,
}

impl TransportConfig {
    /// Configuration targeting `url` with every other field defaulted.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocols: Vec::new(),
            reconnect: true,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            include_metadata: true,
            headers: BTreeMap::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            warn_interval: DEFAULT_WARN_INTERVAL,
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = enabled;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    pub fn with_include_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Merge a partial update into this snapshot, returning the new snapshot.
    pub fn merged(&self, update: &ConfigUpdate) -> Self {
        let mut next = self.clone();
        if let Some(url) = &update.url {
            next.url.clone_from(url);
        }
        if let Some(protocols) = &update.protocols {
            next.protocols.clone_from(protocols);
        }
        if let Some(reconnect) = update.reconnect {
            next.reconnect = reconnect;
        }
        if let Some(delay) = update.reconnect_delay {
            next.reconnect_delay = delay;
        }
        if let Some(attempts) = update.max_reconnect_attempts {
            next.max_reconnect_attempts = attempts;
        }
        if let Some(size) = update.max_buffer_size {
            next.max_buffer_size = size;
        }
        if let Some(include) = update.include_metadata {
            next.include_metadata = include;
        }
        if let Some(headers) = &update.headers {
            next.headers.clone_from(headers);
        }
        next
    }
}

/// Partial configuration applied by `configure`.
///
/// `None` leaves the corresponding field untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigUpdate {
    pub url: Option<String>,
    pub protocols: Option<Vec<String>>,
    pub reconnect: Option<bool>,
    pub reconnect_delay: Option<Duration>,
    pub max_reconnect_attempts: Option<u32>,
    pub max_buffer_size: Option<usize>,
    pub include_metadata: Option<bool>,
    pub headers: Option<BTreeMap<String, String>>,
}

impl ConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = Some(enabled);
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = Some(size);
        self
    }

    pub fn with_include_metadata(mut self, include: bool) -> Self {
        self.include_metadata = Some(include);
        self
    }

    /// Read an update from the camelCase option object used by host
    /// configuration (`url`, `protocols`, `reconnect`, `reconnectDelayMs`,
    /// `maxReconnectAttempts`, `maxBufferSize`, `includeMetadata`, `headers`).
    ///
    /// Unknown keys and values of the wrong type are skipped.
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        Self {
            url: obj.get("url").and_then(Value::as_str).map(str::to_owned),
            protocols: obj.get("protocols").and_then(parse_protocols),
            reconnect: obj.get("reconnect").and_then(Value::as_bool),
            reconnect_delay: obj
                .get("reconnectDelayMs")
                .and_then(Value::as_u64)
                .map(Duration::from_millis),
            max_reconnect_attempts: obj
                .get("maxReconnectAttempts")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok()),
            max_buffer_size: obj
                .get("maxBufferSize")
                .and_then(Value::as_u64)
                .and_then(|n| usize::try_from(n).ok()),
            include_metadata: obj.get("includeMetadata").and_then(Value::as_bool),
            headers: obj
                .get("headers")
                .and_then(Value::as_object)
                .map(parse_headers),
        }
    }
}

fn parse_protocols(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(single) => Some(vec![single.clone()]),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
        ),
        _ => None,
    }
}

fn parse_headers(obj: &Map<String, Value>) -> BTreeMap<String, String> {
    obj.iter()
        .filter_map(|(name, value)| value.as_str().map(|v| (name.clone(), v.to_owned())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_surface() {
        let config = TransportConfig::new("ws://localhost:9020");
        assert!(config.reconnect);
        assert_eq!(config.reconnect_delay, Duration::from_millis(1000));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.max_buffer_size, 1000);
        assert!(config.include_metadata);
        assert!(config.protocols.is_empty());
        assert!(config.headers.is_empty());
    }

    #[test]
    fn from_json_ignores_unknown_and_mistyped_fields() {
        let update = ConfigUpdate::from_json(&json!({
            "url": "ws://example.test/logs",
            "reconnect": "yes",
            "maxBufferSize": 10,
            "maxReconnectAttempts": -1,
            "flavour": "vanilla",
            "headers": { "x-token": "abc", "x-bad": 5 },
        }));
        assert_eq!(update.url.as_deref(), Some("ws://example.test/logs"));
        assert_eq!(update.reconnect, None);
        assert_eq!(update.max_buffer_size, Some(10));
        assert_eq!(update.max_reconnect_attempts, None);
        let headers = update.headers.expect("headers parsed");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["x-token"], "abc");
    }

    #[test]
    fn protocols_accept_string_or_list() {
        let single = ConfigUpdate::from_json(&json!({ "protocols": "log.v1" }));
        assert_eq!(single.protocols, Some(vec!["log.v1".to_owned()]));
        let many = ConfigUpdate::from_json(&json!({ "protocols": ["a", 1, "b"] }));
        assert_eq!(many.protocols, Some(vec!["a".to_owned(), "b".to_owned()]));
    }

    #[test]
    fn non_object_update_is_empty() {
        assert_eq!(ConfigUpdate::from_json(&json!([1, 2])), ConfigUpdate::default());
    }

    #[test]
    fn merged_only_touches_supplied_fields() {
        let base = TransportConfig::new("ws://a").with_max_buffer_size(7);
        let next = base.merged(
            &ConfigUpdate::new()
                .with_include_metadata(false)
                .with_reconnect_delay(Duration::from_millis(5)),
        );
        assert_eq!(next.url, "ws://a");
        assert_eq!(next.max_buffer_size, 7);
        assert!(!next.include_metadata);
        assert_eq!(next.reconnect_delay, Duration::from_millis(5));
    }
}
