//! Public handler type exported by the crate.

use std::{
    any::Any,
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::Duration,
};

use crossbeam_channel::Sender;
use log::warn;
use parking_lot::Mutex;

use crate::{
    handler::FemtoTransport, log_metadata::LogMetadata, rate_limited_warner::RateLimitedWarner,
};

use super::{
    adapter::SocketConnector,
    config::{ConfigUpdate, TransportConfig},
    state::TransportStatus,
    transport::TungsteniteConnector,
    worker::{SharedStatus, TransportCommand, enqueue_write, request, send_control, spawn_worker},
};

/// Handler streaming log messages to a WebSocket endpoint.
///
/// Construction spawns a worker thread that connects immediately. Writes are
/// queued on a bounded channel without blocking and dropped when it is full;
/// while the endpoint is unreachable they collect in a bounded drop-oldest
/// buffer that is flushed, in order, on reconnect.
pub struct FemtoWebSocketHandler {
    tx: Mutex<Option<Sender<TransportCommand>>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    status: SharedStatus,
    warner: RateLimitedWarner,
    queue_dropped: AtomicU64,
    reply_timeout: Duration,
}

impl FemtoWebSocketHandler {
    /// Connect to `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_config(TransportConfig::new(url))
    }

    /// Construct the handler from a configuration object.
    pub fn with_config(config: TransportConfig) -> Self {
        Self::with_connector(config, Box::new(TungsteniteConnector::new()))
    }

    /// Construct the handler with a custom socket connector.
    pub fn with_connector(config: TransportConfig, connector: Box<dyn SocketConnector>) -> Self {
        let warner = RateLimitedWarner::new(config.warn_interval);
        let reply_timeout = config.connect_timeout + config.write_timeout;
        let (tx, handle, status) = spawn_worker(config, connector);
        Self {
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
            status,
            warner,
            queue_dropped: AtomicU64::new(0),
            reply_timeout,
        }
    }

    fn sender(&self) -> Option<Sender<TransportCommand>> {
        self.tx.lock().as_ref().cloned()
    }

    /// Queue a message for delivery. Never blocks and never fails.
    pub fn write(&self, message: &str, metadata: &LogMetadata) {
        let Some(tx) = self.sender() else {
            self.warner.record_drop();
            self.warner.warn_if_due(|count| {
                warn!("FemtoWebSocketHandler dropped {count} messages after close");
            });
            return;
        };
        let queued = enqueue_write(
            &tx,
            TransportCommand::Write {
                message: message.to_owned(),
                metadata: metadata.clone(),
            },
            &self.warner,
        );
        if !queued {
            self.queue_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Merge a partial configuration into the running transport.
    pub fn configure(&self, update: ConfigUpdate) {
        let Some(tx) = self.sender() else {
            return;
        };
        if !send_control(&tx, TransportCommand::Configure(update), self.reply_timeout) {
            warn!("FemtoWebSocketHandler configure not delivered; worker queue unavailable");
        }
    }

    /// Merge a camelCase option object, ignoring unknown or mistyped keys.
    pub fn configure_json(&self, options: &serde_json::Value) {
        self.configure(ConfigUpdate::from_json(options));
    }

    /// Snapshot of the transport after every previously queued command.
    ///
    /// Falls back to the last published snapshot when the worker is closed or
    /// does not answer in time. `dropped` includes writes rejected by a full
    /// command queue.
    pub fn status(&self) -> TransportStatus {
        let mut status = self
            .sender()
            .and_then(|tx| request(&tx, TransportCommand::Status, self.reply_timeout))
            .unwrap_or_else(|| self.status.lock().clone());
        status.dropped += self.queue_dropped.load(Ordering::Relaxed);
        status
    }

    /// Wait until the worker has processed every command queued so far.
    pub fn flush(&self) -> bool {
        let Some(tx) = self.sender() else {
            return false;
        };
        self.warner.flush(|count| {
            warn!("FemtoWebSocketHandler dropped {count} messages in the last interval");
        });
        request(&tx, TransportCommand::Flush, self.reply_timeout).is_some()
    }

    /// Close the transport and wait for the worker to exit. Idempotent.
    pub fn close(&self) {
        let Some(tx) = self.tx.lock().take() else {
            return;
        };
        if request(&tx, TransportCommand::Close, self.reply_timeout).is_none() {
            warn!("FemtoWebSocketHandler worker did not acknowledge close in time");
        }
        drop(tx);
        self.join_worker();
    }

    fn join_worker(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.join().is_err() {
            warn!("FemtoWebSocketHandler: worker thread panicked");
        }
    }
}

impl FemtoTransport for FemtoWebSocketHandler {
    fn write(&self, message: &str, metadata: &LogMetadata) {
        FemtoWebSocketHandler::write(self, message, metadata);
    }

    fn configure(&self, options: &serde_json::Value) {
        self.configure_json(options);
    }

    fn status(&self) -> TransportStatus {
        FemtoWebSocketHandler::status(self)
    }

    fn flush(&self) -> bool {
        FemtoWebSocketHandler::flush(self)
    }

    fn close(&self) {
        FemtoWebSocketHandler::close(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for FemtoWebSocketHandler {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for FemtoWebSocketHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FemtoWebSocketHandler")
            .field("reply_timeout", &self.reply_timeout)
            .finish()
    }
}
