//! Metadata accompanying each formatted message handed to a transport.
//!
//! The formatter produces a display string plus a `LogMetadata` value. The
//! transport never mutates either; it only reads them while encoding an
//! envelope.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use serde::Serialize;
use serde_json::Value;

use crate::level::FemtoLevel;

/// Structured metadata for a single log message.
#[derive(Clone, Debug, PartialEq)]
pub struct LogMetadata {
    /// Severity of the message.
    pub level: FemtoLevel,
    /// Time the message was produced.
    pub timestamp: SystemTime,
    /// Logger namespace, when the logger has one.
    pub namespace: Option<String>,
    /// Arbitrary structured context supplied by the caller.
    pub context: Option<BTreeMap<String, Value>>,
    /// Prefix segments rendered ahead of the message.
    pub prefix: Option<Vec<String>>,
}

impl LogMetadata {
    /// Metadata stamped with the current time.
    pub fn new(level: FemtoLevel) -> Self {
        Self::at(level, SystemTime::now())
    }

    /// Metadata with an explicit timestamp.
    pub fn at(level: FemtoLevel, timestamp: SystemTime) -> Self {
        Self {
            level,
            timestamp,
            namespace: None,
            context: None,
            prefix: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_prefix<I, S>(mut self, prefix: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix = Some(prefix.into_iter().map(Into::into).collect());
        self
    }

    /// Attach a context entry.
    ///
    /// Values that cannot be represented as JSON (for example maps keyed by
    /// tuples) are stored as their `Debug` rendering instead.
    pub fn with_context_value<T>(mut self, key: impl Into<String>, value: T) -> Self
    where
        T: Serialize + fmt::Debug,
    {
        let json = serde_json::to_value(&value).unwrap_or_else(|_| Value::String(format!("{value:?}")));
        self.context
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), json);
        self
    }
}
