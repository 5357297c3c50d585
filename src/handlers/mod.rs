//! Transport builders and associated traits.
//!
//! Provides a minimal builder API for constructing transports in a
//! type‑safe manner. Each builder implements [`HandlerBuilderTrait`]
//! which returns a boxed [`FemtoTransport`] ready for installation in a
//! [`TransportRegistry`](crate::registry::TransportRegistry).

use thiserror::Error;

use crate::handler::FemtoTransport;

mod builder_macros;
pub mod websocket_builder;

pub use websocket_builder::WebSocketHandlerBuilder;

/// Errors that may occur while building a transport.
#[derive(Debug, Error)]
pub enum HandlerBuildError {
    /// Invalid user supplied configuration.
    #[error("invalid handler configuration: {0}")]
    InvalidConfig(String),
}

/// Trait implemented by all transport builders.
///
/// Builders return boxed [`FemtoTransport`] objects so the caller can
/// install them without knowing the concrete transport type.
pub trait HandlerBuilderTrait: Send + Sync {
    /// Build the transport instance.
    fn build(&self) -> Result<Box<dyn FemtoTransport>, HandlerBuildError>;
}
