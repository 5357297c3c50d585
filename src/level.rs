//! Severity levels carried in [`LogMetadata`](crate::log_metadata::LogMetadata).
//!
//! Levels travel over the wire as integers so that collectors written in any
//! language can order them without parsing names.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum FemtoLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Critical,
}

impl FemtoLevel {
    /// Upper-case name of the level.
    pub fn as_str(self) -> &'static str {
        match self {
            FemtoLevel::Trace => "TRACE",
            FemtoLevel::Debug => "DEBUG",
            FemtoLevel::Info => "INFO",
            FemtoLevel::Warn => "WARN",
            FemtoLevel::Error => "ERROR",
            FemtoLevel::Critical => "CRITICAL",
        }
    }

    /// Integer representation used in JSON envelopes.
    pub fn as_wire(self) -> u8 {
        match self {
            FemtoLevel::Trace => 0,
            FemtoLevel::Debug => 1,
            FemtoLevel::Info => 2,
            FemtoLevel::Warn => 3,
            FemtoLevel::Error => 4,
            FemtoLevel::Critical => 5,
        }
    }

    pub fn parse_or_info(s: &str) -> Self {
        s.parse().unwrap_or(Self::Info)
    }
}

impl fmt::Display for FemtoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FemtoLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(()),
        }
    }
}

impl Serialize for FemtoLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("warning", FemtoLevel::Warn)]
    #[case("Error", FemtoLevel::Error)]
    #[case("bogus", FemtoLevel::Info)]
    fn parse_or_info_falls_back(#[case] input: &str, #[case] expected: FemtoLevel) {
        assert_eq!(FemtoLevel::parse_or_info(input), expected);
    }

    #[rstest]
    fn wire_values_follow_severity() {
        assert_eq!(FemtoLevel::Debug.as_wire(), 1);
        assert!(FemtoLevel::Warn.as_wire() < FemtoLevel::Critical.as_wire());
        assert_eq!(serde_json::to_string(&FemtoLevel::Error).unwrap(), "4");
    }
}
