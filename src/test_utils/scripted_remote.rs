//! In-memory stand-in for a WebSocket endpoint.
//!
//! A [`ScriptedRemote`] hands out [`ScriptedConnector`]s whose connection
//! attempts follow a queue of [`ScriptedOutcome`]s. Tests keep a clone of the
//! remote to inspect sent frames and to drop or accept connections.

use std::{collections::VecDeque, io, sync::Arc};

use parking_lot::Mutex;

use crate::websocket_handler::{
    ConnectError, SocketConnection, SocketConnector, SocketEvents, TransportConfig,
};

/// What the next connection attempt does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptedOutcome {
    /// Open immediately.
    Open,
    /// Fail transiently (error followed by close).
    Refuse,
    /// Fail with a fatal connector error.
    Fatal(String),
    /// Stay in the connecting phase until [`ScriptedRemote::accept_pending`].
    Pending,
}

#[derive(Debug)]
struct RemoteState {
    outcomes: VecDeque<ScriptedOutcome>,
    fallback: ScriptedOutcome,
    sent: Vec<String>,
    fail_sends: bool,
    attempts: usize,
    closes: usize,
    polls: usize,
    urls: Vec<String>,
    live: Option<SocketEvents>,
}

/// Shared handle to a scripted endpoint.
#[derive(Clone, Debug)]
pub struct ScriptedRemote {
    inner: Arc<Mutex<RemoteState>>,
}

impl Default for ScriptedRemote {
    fn default() -> Self {
        Self::with_fallback(ScriptedOutcome::Open)
    }
}

impl ScriptedRemote {
    /// Remote that opens every connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote whose unscripted attempts all produce `fallback`.
    pub fn with_fallback(fallback: ScriptedOutcome) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RemoteState {
                outcomes: VecDeque::new(),
                fallback,
                sent: Vec::new(),
                fail_sends: false,
                attempts: 0,
                closes: 0,
                polls: 0,
                urls: Vec::new(),
                live: None,
            })),
        }
    }

    /// Queue the outcome of the next unscripted attempt.
    pub fn push_outcome(&self, outcome: ScriptedOutcome) -> &Self {
        self.inner.lock().outcomes.push_back(outcome);
        self
    }

    pub fn connector(&self) -> ScriptedConnector {
        ScriptedConnector {
            remote: self.clone(),
        }
    }

    /// Frames received so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.inner.lock().sent.clone()
    }

    /// Number of connection attempts made.
    pub fn attempts(&self) -> usize {
        self.inner.lock().attempts
    }

    /// Number of times a connection was closed by the transport.
    pub fn closes(&self) -> usize {
        self.inner.lock().closes
    }

    /// Number of times a connection was polled for inbound traffic.
    pub fn polls(&self) -> usize {
        self.inner.lock().polls
    }

    /// URLs targeted by each attempt.
    pub fn urls(&self) -> Vec<String> {
        self.inner.lock().urls.clone()
    }

    /// Make every subsequent send fail (or succeed again).
    pub fn fail_sends(&self, fail: bool) {
        self.inner.lock().fail_sends = fail;
    }

    /// Complete the most recent pending attempt.
    pub fn accept_pending(&self) {
        let events = self.inner.lock().live.clone();
        if let Some(events) = events {
            events.on_open();
        }
    }

    /// Simulate the peer dropping the most recent connection.
    pub fn drop_connection(&self) {
        let events = self.inner.lock().live.take();
        if let Some(events) = events {
            events.on_close(Some(1006), "abnormal closure");
        }
    }
}

/// Connector backed by a [`ScriptedRemote`].
#[derive(Debug)]
pub struct ScriptedConnector {
    remote: ScriptedRemote,
}

impl SocketConnector for ScriptedConnector {
    fn open(
        &mut self,
        config: &TransportConfig,
        events: SocketEvents,
    ) -> Result<Box<dyn SocketConnection>, ConnectError> {
        let outcome = {
            let mut state = self.remote.inner.lock();
            state.attempts += 1;
            state.urls.push(config.url.clone());
            let outcome = state
                .outcomes
                .pop_front()
                .unwrap_or_else(|| state.fallback.clone());
            state.live = matches!(outcome, ScriptedOutcome::Open | ScriptedOutcome::Pending)
                .then(|| events.clone());
            outcome
        };
        match outcome {
            ScriptedOutcome::Open => events.on_open(),
            ScriptedOutcome::Refuse => {
                events.on_error("connection refused");
                events.on_close(Some(1006), "connection refused");
            }
            ScriptedOutcome::Fatal(reason) => return Err(ConnectError::Unavailable(reason)),
            ScriptedOutcome::Pending => {}
        }
        Ok(Box::new(ScriptedConnection {
            remote: self.remote.clone(),
            closed: false,
        }))
    }
}

struct ScriptedConnection {
    remote: ScriptedRemote,
    closed: bool,
}

impl SocketConnection for ScriptedConnection {
    fn send(&mut self, payload: &str) -> io::Result<()> {
        let mut state = self.remote.inner.lock();
        if self.closed || state.fail_sends {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted send failure"));
        }
        state.sent.push(payload.to_owned());
        Ok(())
    }

    fn poll(&mut self) {
        self.remote.inner.lock().polls += 1;
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.remote.inner.lock().closes += 1;
        }
    }
}
