//! Builder for [`FemtoWebSocketHandler`](crate::websocket_handler::FemtoWebSocketHandler).
//!
//! Exposes the endpoint, reconnection policy, buffering, handshake headers,
//! timeout tuning and TLS configuration. Only structural problems are caught
//! here; a URL that cannot be parsed is accepted and surfaces as the `error`
//! state once the handler tries to connect.

use std::{collections::BTreeMap, time::Duration};

use crate::{
    handler::FemtoTransport,
    websocket_handler::{FemtoWebSocketHandler, TlsOptions, TransportConfig, TungsteniteConnector},
};

use super::{
    HandlerBuildError, HandlerBuilderTrait,
    builder_macros::{ensure_positive, option_setter},
};

/// Builder for constructing [`FemtoWebSocketHandler`] instances.
#[derive(Clone, Debug, Default)]
pub struct WebSocketHandlerBuilder {
    url: Option<String>,
    protocols: Vec<String>,
    headers: BTreeMap<String, String>,
    reconnect: Option<bool>,
    reconnect_delay_ms: Option<u64>,
    max_reconnect_attempts: Option<u32>,
    max_buffer_size: Option<usize>,
    include_metadata: Option<bool>,
    connect_timeout_ms: Option<u64>,
    write_timeout_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    warn_interval_ms: Option<u64>,
    capacity: Option<usize>,
    tls: Option<TlsOptions>,
}

impl WebSocketHandlerBuilder {
    /// Create a new builder with no endpoint configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `ws://` or `wss://` endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Offer sub-protocols during the opening handshake.
    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Add a header to the opening handshake request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Configure TLS validation for `wss://` endpoints.
    pub fn with_tls_insecure(mut self, insecure: bool) -> Self {
        self.tls = Some(TlsOptions {
            insecure_skip_verify: insecure,
        });
        self
    }

    option_setter!(
        #[doc = "Enable or disable automatic reconnection."]
        with_reconnect,
        reconnect,
        bool
    );
    option_setter!(
        #[doc = "Set the linear backoff unit in milliseconds."]
        with_reconnect_delay_ms,
        reconnect_delay_ms,
        u64
    );
    option_setter!(with_max_reconnect_attempts, max_reconnect_attempts, u32);
    option_setter!(
        #[doc = "Set the capacity of the offline buffer."]
        with_max_buffer_size,
        max_buffer_size,
        usize
    );
    option_setter!(
        #[doc = "Send JSON envelopes (`true`) or raw message text (`false`)."]
        with_include_metadata,
        include_metadata,
        bool
    );
    option_setter!(with_connect_timeout_ms, connect_timeout_ms, u64);
    option_setter!(with_write_timeout_ms, write_timeout_ms, u64);
    option_setter!(with_poll_interval_ms, poll_interval_ms, u64);
    option_setter!(with_warn_interval_ms, warn_interval_ms, u64);
    option_setter!(
        #[doc = "Set the bounded command channel capacity."]
        with_capacity,
        capacity,
        usize
    );

    fn validate(&self) -> Result<(), HandlerBuildError> {
        self.validate_url()?;
        self.validate_buffer()?;
        self.validate_timeouts()?;
        Ok(())
    }

    fn validate_url(&self) -> Result<(), HandlerBuildError> {
        match &self.url {
            None => Err(HandlerBuildError::InvalidConfig(
                "websocket handler requires a url".into(),
            )),
            Some(url) if url.trim().is_empty() => Err(HandlerBuildError::InvalidConfig(
                "websocket url must not be empty".into(),
            )),
            Some(_) => Ok(()),
        }
    }

    fn validate_buffer(&self) -> Result<(), HandlerBuildError> {
        if let Some(size) = self.max_buffer_size {
            ensure_positive!(size, "max_buffer_size")?;
        }
        if let Some(capacity) = self.capacity {
            ensure_positive!(capacity, "capacity")?;
        }
        Ok(())
    }

    fn validate_timeouts(&self) -> Result<(), HandlerBuildError> {
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(timeout) = self.write_timeout_ms {
            ensure_positive!(timeout, "write_timeout_ms")?;
        }
        if let Some(interval) = self.poll_interval_ms {
            ensure_positive!(interval, "poll_interval_ms")?;
        }
        Ok(())
    }

    /// Validate the builder and produce the transport configuration.
    pub fn build_config(&self) -> Result<TransportConfig, HandlerBuildError> {
        self.validate()?;
        let url = self.url.clone().unwrap_or_default();
        let mut config = TransportConfig::new(url).with_protocols(self.protocols.clone());
        config.headers = self.headers.clone();
        self.apply_optional_fields(&mut config);
        Ok(config)
    }

    fn apply_optional_fields(&self, config: &mut TransportConfig) {
        if let Some(enabled) = self.reconnect {
            config.reconnect = enabled;
        }
        if let Some(delay) = self.reconnect_delay_ms {
            config.reconnect_delay = Duration::from_millis(delay);
        }
        if let Some(attempts) = self.max_reconnect_attempts {
            config.max_reconnect_attempts = attempts;
        }
        if let Some(size) = self.max_buffer_size {
            config.max_buffer_size = size;
        }
        if let Some(include) = self.include_metadata {
            config.include_metadata = include;
        }
        if let Some(timeout) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(timeout);
        }
        if let Some(timeout) = self.write_timeout_ms {
            config.write_timeout = Duration::from_millis(timeout);
        }
        if let Some(interval) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(interval);
        }
        if let Some(interval) = self.warn_interval_ms {
            config.warn_interval = Duration::from_millis(interval);
        }
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
    }

    /// Build the concrete handler.
    pub fn build_inner(&self) -> Result<FemtoWebSocketHandler, HandlerBuildError> {
        let config = self.build_config()?;
        let connector = TungsteniteConnector::new().with_tls(self.tls.clone().unwrap_or_default());
        Ok(FemtoWebSocketHandler::with_connector(
            config,
            Box::new(connector),
        ))
    }
}

impl HandlerBuilderTrait for WebSocketHandlerBuilder {
    fn build(&self) -> Result<Box<dyn FemtoTransport>, HandlerBuildError> {
        Ok(Box::new(self.build_inner()?))
    }
}
