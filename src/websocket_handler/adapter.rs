//! Socket adapter seam between the state machine and concrete sockets.
//!
//! A [`SocketConnector`] opens connections; each connection reports its
//! lifecycle through the [`SocketEvents`] callbacks it was handed (`on_open`,
//! `on_close`, `on_error`). The state machine consumes the resulting
//! [`SocketEvent`] values and never inspects the socket type. Every event is
//! tagged with the generation of the attempt that produced it so events from
//! a superseded socket can be discarded.

use std::{fmt, io, sync::Arc};

use thiserror::Error;

use super::config::TransportConfig;

/// Lifecycle notification raised by a socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SocketEventKind {
    Open,
    Close { code: Option<u16>, reason: String },
    Error(String),
}

/// A [`SocketEventKind`] tagged with its connection attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocketEvent {
    pub generation: u64,
    pub kind: SocketEventKind,
}

/// Destination for socket events, typically a channel into the worker.
pub type EventRoute = Arc<dyn Fn(SocketEvent) + Send + Sync>;

/// Callback handle given to a connection when it is opened.
#[derive(Clone)]
pub struct SocketEvents {
    generation: u64,
    route: EventRoute,
}

impl SocketEvents {
    pub fn new(generation: u64, route: EventRoute) -> Self {
        Self { generation, route }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn on_open(&self) {
        self.emit(SocketEventKind::Open);
    }

    pub fn on_close(&self, code: Option<u16>, reason: impl Into<String>) {
        self.emit(SocketEventKind::Close {
            code,
            reason: reason.into(),
        });
    }

    pub fn on_error(&self, err: impl fmt::Display) {
        self.emit(SocketEventKind::Error(err.to_string()));
    }

    fn emit(&self, kind: SocketEventKind) {
        (self.route)(SocketEvent {
            generation: self.generation,
            kind,
        });
    }
}

impl fmt::Debug for SocketEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketEvents")
            .field("generation", &self.generation)
            .finish()
    }
}

/// Failures that make a connection impossible regardless of network state.
///
/// Connectors return these from [`SocketConnector::open`]; the transport
/// treats them as fatal and stops reconnecting. Network failures are reported
/// through [`SocketEvents`] instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported url scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("socket provider unavailable: {0}")]
    Unavailable(String),
}

/// Opens socket connections on behalf of the transport.
pub trait SocketConnector: Send {
    /// Begin a connection attempt.
    ///
    /// The returned connection reports `on_open` or `on_error`/`on_close`
    /// through `events`, either before this call returns or later from
    /// [`SocketConnection::poll`].
    fn open(
        &mut self,
        config: &TransportConfig,
        events: SocketEvents,
    ) -> Result<Box<dyn SocketConnection>, ConnectError>;
}

/// One socket attempt or live socket.
pub trait SocketConnection: Send {
    /// Send a single text frame.
    fn send(&mut self, payload: &str) -> io::Result<()>;

    /// Drive inbound I/O so closes initiated by the peer are observed.
    fn poll(&mut self) {}

    /// Close the socket. Must tolerate repeated calls.
    fn close(&mut self);
}
