//! Connection state machine shared by the worker thread and tests.
//!
//! `TransportCore` is single-owner and synchronous. Whoever owns it feeds it
//! commands, socket events and reconnect deadlines in order; it never blocks
//! except inside the connector it was given.

use std::time::{Duration, Instant};

use log::{debug, error, warn};

use crate::{log_metadata::LogMetadata, rate_limited_warner::RateLimitedWarner};

use super::{
    adapter::{
        EventRoute, SocketConnection, SocketConnector, SocketEvent, SocketEventKind, SocketEvents,
    },
    backoff::{BackoffScheduler, ScheduledReconnect, deadline_after},
    buffer::BoundedBuffer,
    config::{ConfigUpdate, TransportConfig},
    envelope::{BufferedEnvelope, encode},
    state::{ConnectionState, TransportStatus},
};

/// State machine driving one WebSocket transport.
pub struct TransportCore {
    config: TransportConfig,
    connector: Box<dyn SocketConnector>,
    route: EventRoute,
    connection: Option<Box<dyn SocketConnection>>,
    state: ConnectionState,
    generation: u64,
    reconnect_attempts: u32,
    backoff: BackoffScheduler,
    pending: Option<ScheduledReconnect>,
    next_poll: Instant,
    buffer: BoundedBuffer,
    closed: bool,
    fatal: bool,
    last_error: Option<String>,
    overflow_warner: RateLimitedWarner,
}

impl TransportCore {
    /// Create a core in the `Disconnected` state. Call [`connect`] to start.
    ///
    /// [`connect`]: TransportCore::connect
    pub fn new(
        config: TransportConfig,
        connector: Box<dyn SocketConnector>,
        route: EventRoute,
    ) -> Self {
        Self {
            backoff: BackoffScheduler::from_config(&config),
            buffer: BoundedBuffer::new(config.max_buffer_size),
            overflow_warner: RateLimitedWarner::new(config.warn_interval),
            config,
            connector,
            route,
            connection: None,
            state: ConnectionState::Disconnected,
            generation: 0,
            reconnect_attempts: 0,
            pending: None,
            next_poll: Instant::now(),
            closed: false,
            fatal: false,
            last_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// The reconnect waiting to fire, if any.
    pub fn scheduled_reconnect(&self) -> Option<&ScheduledReconnect> {
        self.pending.as_ref()
    }

    /// Payloads currently buffered, oldest first.
    pub fn buffered_payloads(&self) -> Vec<String> {
        self.buffer.iter().map(|e| e.payload.clone()).collect()
    }

    pub fn status(&self) -> TransportStatus {
        TransportStatus {
            state: self.state,
            url: self.config.url.clone(),
            reconnect_attempts: self.reconnect_attempts,
            max_reconnect_attempts: self.config.max_reconnect_attempts,
            buffer_size: self.buffer.len(),
            max_buffer_size: self.buffer.capacity(),
            reconnect_enabled: self.config.reconnect && !self.closed && !self.fatal,
            dropped: self.buffer.dropped(),
            last_error: self.last_error.clone(),
        }
    }

    /// Start a connection attempt unless one is already in progress or live.
    ///
    /// An explicit connect re-enables an instance stopped by `close` or by a
    /// fatal connector error.
    pub fn connect(&mut self) {
        self.closed = false;
        self.fatal = false;
        if self.state.has_socket() {
            return;
        }
        self.pending = None;
        self.begin_attempt();
    }

    fn begin_attempt(&mut self) {
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        let events = SocketEvents::new(self.generation, self.route.clone());
        match self.connector.open(&self.config, events) {
            Ok(connection) => self.connection = Some(connection),
            Err(err) => {
                error!(
                    "FemtoWebSocketHandler cannot connect to {}: {err}; reconnection disabled",
                    self.config.url
                );
                self.last_error = Some(err.to_string());
                self.fatal = true;
                self.state = ConnectionState::Error;
            }
        }
    }

    /// Accept a message from the producer. Never fails.
    pub fn write(&mut self, message: &str, metadata: &LogMetadata) {
        let payload = encode(message, metadata, self.config.include_metadata);
        if self.state != ConnectionState::Connected {
            self.enqueue(BufferedEnvelope::new(payload));
            return;
        }
        let Some(connection) = self.connection.as_mut() else {
            self.enqueue(BufferedEnvelope::new(payload));
            return;
        };
        if let Err(err) = connection.send(&payload) {
            warn!("FemtoWebSocketHandler write failed: {err}");
            self.last_error = Some(err.to_string());
            self.enqueue(BufferedEnvelope::new(payload));
            self.on_transport_failure();
        }
    }

    fn enqueue(&mut self, envelope: BufferedEnvelope) {
        if self.buffer.enqueue(envelope).is_some() {
            self.overflow_warner.record_drop();
            self.overflow_warner.warn_if_due(|count| {
                warn!("FemtoWebSocketHandler buffer full; dropped {count} oldest envelopes");
            });
        }
    }

    /// Apply a socket lifecycle event. Events from superseded attempts are
    /// ignored.
    pub fn handle_event(&mut self, event: SocketEvent) {
        if event.generation != self.generation {
            debug!(
                "FemtoWebSocketHandler ignoring stale event from attempt {}",
                event.generation
            );
            return;
        }
        match event.kind {
            SocketEventKind::Open => {
                if self.state == ConnectionState::Connecting {
                    self.on_open();
                }
            }
            SocketEventKind::Error(err) => {
                if self.state.has_socket() {
                    warn!("FemtoWebSocketHandler socket error: {err}");
                    self.last_error = Some(err);
                    self.on_transport_failure();
                }
            }
            SocketEventKind::Close { code, reason } => {
                if self.state.has_socket() {
                    warn!(
                        "FemtoWebSocketHandler connection closed (code {}): {reason}",
                        code.map_or_else(|| "none".to_owned(), |c| c.to_string())
                    );
                    self.on_transport_failure();
                }
            }
        }
    }

    fn on_open(&mut self) {
        debug!("FemtoWebSocketHandler connected to {}", self.config.url);
        self.state = ConnectionState::Connected;
        self.reconnect_attempts = 0;
        self.pending = None;
        self.flush_buffer();
    }

    fn flush_buffer(&mut self) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        while let Some(envelope) = self.buffer.front() {
            if let Err(err) = connection.send(&envelope.payload) {
                warn!("FemtoWebSocketHandler flush failed: {err}");
                self.last_error = Some(err.to_string());
                self.on_transport_failure();
                return;
            }
            self.buffer.dequeue();
        }
    }

    fn on_transport_failure(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        if self.closed {
            self.state = ConnectionState::Disconnected;
            return;
        }
        if !self.config.reconnect {
            warn!("FemtoWebSocketHandler reconnection disabled; transport stopped");
            self.state = ConnectionState::Error;
            return;
        }
        let attempt = self.reconnect_attempts + 1;
        if !self.backoff.should_retry(attempt) {
            error!(
                "FemtoWebSocketHandler giving up after {} reconnect attempts",
                self.reconnect_attempts
            );
            self.state = ConnectionState::Error;
            return;
        }
        self.reconnect_attempts = attempt;
        let scheduled = self.backoff.schedule(attempt, Instant::now());
        debug!(
            "FemtoWebSocketHandler reconnect attempt {attempt} in {:?}",
            scheduled.delay
        );
        self.pending = Some(scheduled);
        self.state = ConnectionState::Reconnecting;
    }

    /// Fire the scheduled reconnect if its deadline has passed.
    pub fn fire_due_reconnect(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(scheduled) if scheduled.is_due(now) => self.fire_reconnect(),
            _ => false,
        }
    }

    /// Fire the scheduled reconnect regardless of its deadline.
    pub fn fire_reconnect(&mut self) -> bool {
        if self.pending.take().is_none() || self.state != ConnectionState::Reconnecting {
            return false;
        }
        self.begin_attempt();
        true
    }

    /// Let the socket observe inbound traffic once the poll interval has
    /// elapsed. Returns whether a poll ran.
    pub fn poll_if_due(&mut self, now: Instant) -> bool {
        if now < self.next_poll {
            return false;
        }
        let Some(connection) = self.connection.as_mut() else {
            return false;
        };
        connection.poll();
        self.next_poll = deadline_after(now, self.config.poll_interval);
        true
    }

    /// How long the owner may sleep before calling back in.
    pub fn next_wakeup(&self, now: Instant) -> Option<Duration> {
        let timer = self.pending.map(|p| p.remaining(now));
        let poll = self
            .connection
            .as_ref()
            .map(|_| self.next_poll.saturating_duration_since(now));
        match (timer, poll) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Merge a partial configuration. A changed URL closes the current
    /// connection and starts over against the new endpoint.
    pub fn configure(&mut self, update: &ConfigUpdate) {
        let next = self.config.merged(update);
        let url_changed = next.url != self.config.url;
        self.backoff = BackoffScheduler::from_config(&next);
        let evicted = self.buffer.set_capacity(next.max_buffer_size);
        if evicted > 0 {
            warn!("FemtoWebSocketHandler buffer resized; dropped {evicted} oldest envelopes");
        }
        self.config = next;
        if url_changed {
            debug!("FemtoWebSocketHandler endpoint changed to {}", self.config.url);
            self.close();
            self.reconnect_attempts = 0;
            self.last_error = None;
            self.connect();
        }
    }

    /// Stop the transport. Idempotent.
    pub fn close(&mut self) {
        self.closed = true;
        self.pending = None;
        self.generation += 1;
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        self.buffer.clear();
        self.state = ConnectionState::Disconnected;
        self.overflow_warner.flush(|count| {
            warn!("FemtoWebSocketHandler dropped {count} oldest envelopes before close");
        });
    }
}
