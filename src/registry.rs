//! Per-logger registry of installed transports.
//!
//! Each logger owns its own `TransportRegistry`; there is no process-wide
//! instance. Uninstalling or replacing a transport closes it.

use std::sync::Arc;

use log::debug;

use crate::{handler::FemtoTransport, log_metadata::LogMetadata};

#[derive(Default)]
pub struct TransportRegistry {
    transports: Vec<(String, Arc<dyn FemtoTransport>)>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `transport` under `name`, closing any transport it replaces.
    pub fn install(&mut self, name: impl Into<String>, transport: Arc<dyn FemtoTransport>) {
        let name = name.into();
        if let Some(slot) = self.transports.iter_mut().find(|(n, _)| *n == name) {
            debug!("replacing transport '{name}'");
            let previous = std::mem::replace(&mut slot.1, transport);
            previous.close();
            return;
        }
        self.transports.push((name, transport));
    }

    /// Remove and close the transport registered as `name`.
    pub fn uninstall(&mut self, name: &str) -> bool {
        let Some(pos) = self.transports.iter().position(|(n, _)| n == name) else {
            return false;
        };
        let (_, transport) = self.transports.remove(pos);
        transport.close();
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FemtoTransport>> {
        self.transports
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| Arc::clone(t))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transports.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.transports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }

    /// Fan a message out to every installed transport in installation order.
    pub fn write(&self, message: &str, metadata: &LogMetadata) {
        for (_, transport) in &self.transports {
            transport.write(message, metadata);
        }
    }

    /// Close and remove every transport.
    pub fn close_all(&mut self) {
        for (_, transport) in self.transports.drain(..) {
            transport.close();
        }
    }
}

impl Drop for TransportRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}

impl std::fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
