//! Resilient WebSocket streaming transport for log records.
//!
//! A logger hands each formatted message and its [`LogMetadata`] to the
//! transports installed in its [`TransportRegistry`]. The
//! [`FemtoWebSocketHandler`] transport streams them to a remote endpoint,
//! buffering while the endpoint is unreachable and reconnecting with linear
//! backoff.

mod handler;
pub mod handlers;
mod level;
mod log_metadata;
mod rate_limited_warner;
mod registry;
pub mod websocket_handler;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use handler::FemtoTransport;
pub use handlers::{HandlerBuildError, HandlerBuilderTrait, WebSocketHandlerBuilder};
pub use level::FemtoLevel;
pub use log_metadata::LogMetadata;
pub use rate_limited_warner::{DEFAULT_WARN_INTERVAL, RateLimitedWarner};
pub use registry::TransportRegistry;
pub use websocket_handler::{
    ConfigUpdate, ConnectionState, FemtoWebSocketHandler, TransportConfig, TransportStatus,
};
