//! Deterministic driver for [`TransportCore`].
//!
//! Socket events are collected on a channel instead of a worker thread, and
//! tests decide when to deliver them with [`CoreHarness::pump`].

use std::sync::Arc;

use crossbeam_channel::{Receiver, unbounded};

use crate::{
    level::FemtoLevel,
    log_metadata::LogMetadata,
    websocket_handler::{SocketEvent, TransportConfig, TransportCore},
};

use super::scripted_remote::ScriptedRemote;

pub struct CoreHarness {
    pub core: TransportCore,
    pub remote: ScriptedRemote,
    events: Receiver<SocketEvent>,
}

impl CoreHarness {
    /// Build a core wired to `remote` without connecting.
    pub fn new(config: TransportConfig, remote: ScriptedRemote) -> Self {
        let (tx, rx) = unbounded();
        let route = Arc::new(move |event: SocketEvent| {
            let _ = tx.send(event);
        });
        let core = TransportCore::new(config, Box::new(remote.connector()), route);
        Self {
            core,
            remote,
            events: rx,
        }
    }

    /// Build, connect, and deliver the first round of events.
    pub fn connected(config: TransportConfig, remote: ScriptedRemote) -> Self {
        let mut harness = Self::new(config, remote);
        harness.core.connect();
        harness.pump();
        harness
    }

    /// Deliver every queued socket event to the core.
    pub fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.core.handle_event(event);
        }
    }

    /// Fire the pending reconnect and deliver the resulting events.
    pub fn fire(&mut self) -> bool {
        let fired = self.core.fire_reconnect();
        self.pump();
        fired
    }

    /// Write `message` at info level.
    pub fn write(&mut self, message: &str) {
        self.core.write(message, &LogMetadata::new(FemtoLevel::Info));
    }
}
