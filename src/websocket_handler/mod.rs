//! WebSocket-based logging transport.
//!
//! This module defines [`FemtoWebSocketHandler`], a handler that encodes
//! formatted messages into JSON envelopes (or raw text frames) and streams
//! them to a remote WebSocket endpoint. A worker thread owns the connection
//! state machine, buffers messages while the endpoint is unreachable, and
//! reconnects with linear backoff until an attempt ceiling is reached.
//!
//! # Failure classification
//!
//! - **Fatal**: the connector cannot even begin (malformed URL, unsupported
//!   scheme, invalid header, TLS provider unavailable). The transport enters
//!   [`ConnectionState::Error`] and never retries.
//! - **Transient**: a refused connection, failed handshake, peer close or
//!   socket error. Retried up to `max_reconnect_attempts` times.
//! - **Overflow**: the buffer is full; the oldest envelope is dropped and a
//!   rate-limited warning is logged. Writes arriving while the worker's
//!   bounded command queue is full are dropped the same way.
//! - **Send failure**: the envelope is re-buffered and a reconnect begins.

mod adapter;
mod backoff;
mod buffer;
mod config;
mod envelope;
mod handler;
mod state;
mod state_machine;
mod transport;
mod worker;


pub use adapter::{
    ConnectError, EventRoute, SocketConnection, SocketConnector, SocketEvent, SocketEventKind,
    SocketEvents,
};
pub use backoff::{BackoffScheduler, ScheduledReconnect};
pub use buffer::BoundedBuffer;
pub use config::{
    ConfigUpdate, DEFAULT_CHANNEL_CAPACITY, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_BUFFER_SIZE, DEFAULT_MAX_RECONNECT_ATTEMPTS,
    DEFAULT_POLL_INTERVAL, DEFAULT_RECONNECT_DELAY, DEFAULT_WRITE_TIMEOUT, TransportConfig,
};
pub use envelope::{BufferedEnvelope, encode, iso_timestamp};
pub use handler::FemtoWebSocketHandler;
pub use state::{ConnectionState, TransportStatus};
pub use state_machine::TransportCore;
pub use transport::{TlsOptions, TungsteniteConnector};
