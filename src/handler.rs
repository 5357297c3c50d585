//! Trait implemented by every streaming transport.

use std::any::Any;

use crate::{log_metadata::LogMetadata, websocket_handler::TransportStatus};

/// Interface a logger uses to drive an installed transport.
///
/// Implementations must be `Send + Sync` so a logger can share them across
/// threads, and every method must return promptly: `write` in particular
/// never blocks on the network and never reports failure to the caller.
pub trait FemtoTransport: Send + Sync {
    /// Deliver a formatted message and its metadata.
    fn write(&self, message: &str, metadata: &LogMetadata);

    /// Merge a partial option object into the running configuration.
    ///
    /// Unknown or mistyped keys are ignored.
    fn configure(&self, options: &serde_json::Value);

    /// Point-in-time snapshot of the transport.
    fn status(&self) -> TransportStatus;

    /// Wait for queued work to be processed.
    fn flush(&self) -> bool {
        true
    }

    /// Stop the transport. Must be idempotent.
    fn close(&self);

    fn as_any(&self) -> &dyn Any;
}
