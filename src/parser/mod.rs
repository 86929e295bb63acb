pub mod pattern;

use crate::metrics::MetricSample;
use crate::source::timestamp::{parse_line_timestamp, LogTimeZone, TimestampError};
use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;
use tracing::warn;

pub use pattern::{MessageKind, MessagePattern, UNKNOWN_QUALITY};

/// Outer log line format: `[<date> <time>.<millis> <four fields>] <message>`
pub const ENVELOPE_PATTERN: &str = r"^\[(?P<datetime>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\.(?P<millis>\d{3}) \S+ \S+ \S+ \S+\] (?P<message>.+)$";

#[derive(Debug, Error)]
pub enum LineError {
    #[error("regex compilation error for pattern '{pattern}': {source}")]
    RegexCompilation {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid line timestamp: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("field '{field}' value '{value}' is not an integer: {source}")]
    Field {
        field: String,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// A log line whose envelope matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

pub struct LineParser {
    envelope: Regex,
    patterns: Vec<MessagePattern>,
    tz: LogTimeZone,
}

impl LineParser {
    /// Build a parser for the given message kinds, tried in the order given
    pub fn new(tz: LogTimeZone, kinds: &[MessageKind]) -> Result<Self, LineError> {
        let envelope = Regex::new(ENVELOPE_PATTERN).map_err(|e| LineError::RegexCompilation {
            pattern: ENVELOPE_PATTERN.to_string(),
            source: e,
        })?;

        let patterns = kinds
            .iter()
            .map(|kind| MessagePattern::compile(*kind))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            envelope,
            patterns,
            tz,
        })
    }

    /// Parser with the default message set: temperature and link condition,
    /// plus connection status when `connection_status` is set
    pub fn with_defaults(tz: LogTimeZone, connection_status: bool) -> Result<Self, LineError> {
        let mut kinds = vec![MessageKind::Temperature, MessageKind::LinkCondition];
        if connection_status {
            kinds.push(MessageKind::ConnectionStatus);
        }
        Self::new(tz, &kinds)
    }

    pub fn kinds(&self) -> Vec<MessageKind> {
        self.patterns.iter().map(MessagePattern::kind).collect()
    }

    /// Split a raw line into its timestamp and message.
    ///
    /// Returns `Ok(None)` for lines that do not carry the envelope.
    pub fn parse_envelope(&self, line: &str) -> Result<Option<LogLine>, LineError> {
        let Some(caps) = self.envelope.captures(line) else {
            return Ok(None);
        };

        let (Some(datetime), Some(millis), Some(message)) =
            (caps.name("datetime"), caps.name("millis"), caps.name("message"))
        else {
            return Ok(None);
        };

        let timestamp = parse_line_timestamp(datetime.as_str(), millis.as_str(), &self.tz)?;

        Ok(Some(LogLine {
            timestamp,
            message: message.as_str().to_string(),
        }))
    }

    /// Every sample the message yields; each matching pattern contributes one.
    ///
    /// A match whose numeric field does not fit in an `i64` is logged and
    /// contributes nothing.
    pub fn samples(&self, line: &LogLine) -> Result<Vec<MetricSample>, LineError> {
        let mut samples = Vec::new();
        for pattern in &self.patterns {
            match pattern.extract(&line.message, line.timestamp) {
                Ok(Some(sample)) => samples.push(sample),
                Ok(None) => {}
                Err(LineError::Field { field, value, .. }) => {
                    warn!(
                        kind = ?pattern.kind(),
                        field = %field,
                        value = %value,
                        message = %line.message,
                        "Skipping out-of-range field"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::FieldValue;

    fn parser() -> LineParser {
        LineParser::with_defaults(LogTimeZone::utc(), false).unwrap()
    }

    #[test]
    fn test_envelope() {
        let line = parser()
            .parse_envelope("[2020-06-01 10:15:02.042 1234 5678 I CU] M_Temperature=5, R_Temperature=7")
            .unwrap()
            .unwrap();

        assert_eq!(line.timestamp.to_rfc3339(), "2020-06-01T10:15:02.042+00:00");
        assert_eq!(line.message, "M_Temperature=5, R_Temperature=7");
    }

    #[test]
    fn test_envelope_mismatch_is_skipped() {
        let parser = parser();

        assert!(parser.parse_envelope("").unwrap().is_none());
        assert!(parser
            .parse_envelope("2020-06-01 10:15:02.042 no brackets")
            .unwrap()
            .is_none());
        // Only three fields after the time
        assert!(parser
            .parse_envelope("[2020-06-01 10:15:02.042 a b c] message")
            .unwrap()
            .is_none());
        // Empty message
        assert!(parser
            .parse_envelope("[2020-06-01 10:15:02.042 a b c d] ")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_envelope_with_invalid_date_is_error() {
        let result = parser().parse_envelope("[2020-02-30 10:15:02.042 a b c d] message");

        assert!(matches!(result, Err(LineError::Timestamp(_))));
    }

    #[test]
    fn test_temperature_line_yields_one_sample() {
        let parser = parser();
        let line = parser
            .parse_envelope("[2020-06-01 10:15:02.042 a b c d] M_Temperature=5, R_Temperature=7")
            .unwrap()
            .unwrap();

        let samples = parser.samples(&line).unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].field("m"), Some(&FieldValue::Integer(5)));
        assert_eq!(samples[0].field("r"), Some(&FieldValue::Integer(7)));
        assert_eq!(samples[0].timestamp, line.timestamp);
    }

    #[test]
    fn test_unmatched_message_yields_nothing() {
        let parser = parser();
        let line = LogLine {
            timestamp: chrono::Utc::now(),
            message: "Something else entirely".to_string(),
        };

        assert!(parser.samples(&line).unwrap().is_empty());
    }

    #[test]
    fn test_connection_status_disabled_by_default() {
        let line = LogLine {
            timestamp: chrono::Utc::now(),
            message: "Connection Status set to 2 (CONNECTION_STATUS_CONNECTED)".to_string(),
        };

        assert!(parser().samples(&line).unwrap().is_empty());

        let enabled = LineParser::with_defaults(LogTimeZone::utc(), true).unwrap();
        let samples = enabled.samples(&line).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].series, "vive_wireless_connection");
    }

    #[test]
    fn test_message_matching_several_patterns() {
        // A link message that also satisfies a custom ordering still yields one
        // sample per matching pattern
        let parser = LineParser::new(
            LogTimeZone::utc(),
            &[MessageKind::LinkCondition, MessageKind::LinkCondition],
        )
        .unwrap();
        let line = LogLine {
            timestamp: chrono::Utc::now(),
            message: "Link Condition Change : peerSignalQuality = 1, performanceQuality = 2"
                .to_string(),
        };

        assert_eq!(parser.samples(&line).unwrap().len(), 2);
    }

    #[test]
    fn test_out_of_range_field_is_skipped() {
        let parser = parser();
        let line = parser
            .parse_envelope(
                "[2020-06-01 10:15:02.042 a b c d] M_Temperature=99999999999999999999, R_Temperature=7",
            )
            .unwrap()
            .unwrap();

        assert!(parser.samples(&line).unwrap().is_empty());
    }

    #[test]
    fn test_default_kinds() {
        assert_eq!(
            parser().kinds(),
            vec![MessageKind::Temperature, MessageKind::LinkCondition]
        );
    }
}
