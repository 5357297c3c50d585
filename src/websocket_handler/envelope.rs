//! Envelope encoding for outbound frames.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};
use log::warn;
use serde::Serialize;
use serde_json::Value;

use crate::log_metadata::LogMetadata;

/// An encoded payload waiting in the buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferedEnvelope {
    pub payload: String,
    pub enqueued_at: SystemTime,
}

impl BufferedEnvelope {
    pub fn new(payload: String) -> Self {
        Self {
            payload,
            enqueued_at: SystemTime::now(),
        }
    }
}

#[derive(Serialize)]
struct WireEnvelope<'a> {
    message: &'a str,
    level: u8,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a BTreeMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<&'a [String]>,
}

/// Render a timestamp as ISO-8601 with millisecond precision and a `Z` suffix.
///
/// Instants outside the range `chrono` can represent are clamped to the
/// nearest representable one.
pub fn iso_timestamp(timestamp: SystemTime) -> String {
    utc_datetime(timestamp).to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn utc_datetime(timestamp: SystemTime) -> DateTime<Utc> {
    let converted = match timestamp.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs())
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, after.subsec_nanos())),
        Err(err) => {
            let before = err.duration();
            i64::try_from(before.as_secs()).ok().and_then(|secs| {
                let nanos = before.subsec_nanos();
                if nanos == 0 {
                    DateTime::<Utc>::from_timestamp(-secs, 0)
                } else {
                    DateTime::<Utc>::from_timestamp(-secs - 1, 1_000_000_000 - nanos)
                }
            })
        }
    };
    converted.unwrap_or_else(|| {
        if timestamp < UNIX_EPOCH {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        }
    })
}

/// Encode a message into the payload sent as one text frame.
///
/// With `include_metadata` the payload is a JSON object; without it the
/// message is returned unchanged.
pub fn encode(message: &str, metadata: &LogMetadata, include_metadata: bool) -> String {
    if !include_metadata {
        return message.to_owned();
    }
    let envelope = WireEnvelope {
        message,
        level: metadata.level.as_wire(),
        timestamp: iso_timestamp(metadata.timestamp),
        namespace: metadata.namespace.as_deref(),
        context: metadata.context.as_ref(),
        prefix: metadata.prefix.as_deref(),
    };
    serde_json::to_string(&envelope).unwrap_or_else(|err| {
        warn!("FemtoWebSocketHandler envelope serialisation error: {err}");
        serde_json::json!({
            "message": message,
            "level": envelope.level,
            "timestamp": envelope.timestamp,
        })
        .to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::FemtoLevel;
    use rstest::{fixture, rstest};
    use std::time::{Duration, UNIX_EPOCH};

    #[fixture]
    fn stamp() -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(1_700_000_000_123)
    }

    #[rstest]
    fn minimal_envelope_is_exact(stamp: SystemTime) {
        let meta = LogMetadata::at(FemtoLevel::Debug, stamp);
        assert_eq!(
            encode("m", &meta, true),
            r#"{"message":"m","level":1,"timestamp":"2023-11-14T22:13:20.123Z"}"#
        );
    }

    #[rstest]
    fn raw_mode_returns_message(stamp: SystemTime) {
        let meta = LogMetadata::at(FemtoLevel::Error, stamp).with_namespace("svc");
        assert_eq!(encode("m", &meta, false), "m");
    }

    #[rstest]
    fn optional_fields_follow_core_fields(stamp: SystemTime) {
        let meta = LogMetadata::at(FemtoLevel::Warn, stamp)
            .with_namespace("api:auth")
            .with_prefix(["[auth]"])
            .with_context_value("user", "ada");
        let payload = encode("denied", &meta, true);
        assert_eq!(
            payload,
            concat!(
                r#"{"message":"denied","level":3,"timestamp":"2023-11-14T22:13:20.123Z","#,
                r#""namespace":"api:auth","context":{"user":"ada"},"prefix":["[auth]"]}"#
            )
        );
    }

    #[rstest]
    fn pre_epoch_timestamps_still_render() {
        let meta = LogMetadata::at(FemtoLevel::Info, UNIX_EPOCH - Duration::from_secs(1));
        let parsed: Value = serde_json::from_str(&encode("old", &meta, true)).expect("json");
        assert_eq!(parsed["timestamp"], "1969-12-31T23:59:59.000Z");
    }

    #[rstest]
    fn sub_second_pre_epoch_timestamps_round_down() {
        let meta = LogMetadata::at(FemtoLevel::Info, UNIX_EPOCH - Duration::from_millis(1_250));
        let parsed: Value = serde_json::from_str(&encode("old", &meta, true)).expect("json");
        assert_eq!(parsed["timestamp"], "1969-12-31T23:59:58.750Z");
    }

    #[rstest]
    fn far_future_timestamps_clamp_instead_of_panicking() {
        let meta = LogMetadata::at(FemtoLevel::Info, UNIX_EPOCH + Duration::from_secs(1 << 45));
        let parsed: Value = serde_json::from_str(&encode("late", &meta, true)).expect("json");
        assert_eq!(parsed["message"], "late");
        assert_eq!(
            parsed["timestamp"],
            DateTime::<Utc>::MAX_UTC.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
    }
}
