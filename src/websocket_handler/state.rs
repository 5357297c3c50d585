//! Connection states and the status snapshot exposed to callers.

use std::fmt;

use serde::Serialize;

/// Lifecycle state of a transport.
///
/// `Error` is terminal for automatic transitions. Only an explicit
/// `connect`, a change of URL, or `close()` moves a transport out of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }

    /// States in which a socket attempt or live socket exists.
    pub fn has_socket(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of a transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportStatus {
    pub state: ConnectionState,
    pub url: String,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: u32,
    pub buffer_size: usize,
    pub max_buffer_size: usize,
    pub reconnect_enabled: bool,
    /// Envelopes evicted by buffer overflow, plus writes rejected by a full
    /// command queue, since creation.
    pub dropped: u64,
    /// Most recent connection or send failure.
    pub last_error: Option<String>,
}
