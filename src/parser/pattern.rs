use crate::metrics::MetricSample;
use crate::parser::LineError;
use chrono::{DateTime, Utc};
use regex::{Captures, Regex};

/// Quality readings of 255 mean the device does not know the value
pub const UNKNOWN_QUALITY: i64 = 255;

/// Known message bodies that carry metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Temperature,
    LinkCondition,
    ConnectionStatus,
}

impl MessageKind {
    pub const ALL: [MessageKind; 3] = [
        MessageKind::Temperature,
        MessageKind::LinkCondition,
        MessageKind::ConnectionStatus,
    ];

    pub fn regex(self) -> &'static str {
        match self {
            MessageKind::Temperature => r"^M_Temperature=(?P<m>\d+), R_Temperature=(?P<r>\d+)$",
            MessageKind::LinkCondition => {
                r"^.*Link Condition Change : peerSignalQuality = (?P<signal>\d+), performanceQuality = (?P<perf>\d+)$"
            }
            MessageKind::ConnectionStatus => {
                r"^Connection Status set to \d+\s*\(CONNECTION_STATUS_(?P<status>.+)\)$"
            }
        }
    }

    pub fn series(self) -> &'static str {
        match self {
            MessageKind::Temperature => "vive_wireless_temperature",
            MessageKind::LinkCondition => "vive_wireless_signal",
            MessageKind::ConnectionStatus => "vive_wireless_connection",
        }
    }
}

/// A compiled message pattern
#[derive(Debug, Clone)]
pub struct MessagePattern {
    kind: MessageKind,
    regex: Regex,
}

impl MessagePattern {
    pub fn compile(kind: MessageKind) -> Result<Self, LineError> {
        let regex = Regex::new(kind.regex()).map_err(|e| LineError::RegexCompilation {
            pattern: kind.regex().to_string(),
            source: e,
        })?;

        Ok(Self { kind, regex })
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Build a sample from `message` if it matches this pattern
    pub fn extract(
        &self,
        message: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<MetricSample>, LineError> {
        let Some(caps) = self.regex.captures(message) else {
            return Ok(None);
        };

        let sample = MetricSample::new(self.kind.series(), timestamp);
        let sample = match self.kind {
            MessageKind::Temperature => sample
                .with_int("m", int_group(&caps, "m")?)
                .with_int("r", int_group(&caps, "r")?),
            MessageKind::LinkCondition => sample
                .with_int(
                    "peerSignalQuality",
                    remap_unknown(int_group(&caps, "signal")?),
                )
                .with_int(
                    "performanceQuality",
                    remap_unknown(int_group(&caps, "perf")?),
                ),
            MessageKind::ConnectionStatus => sample.with_str("status", str_group(&caps, "status")),
        };

        Ok(Some(sample))
    }
}

fn remap_unknown(value: i64) -> i64 {
    if value == UNKNOWN_QUALITY {
        -1
    } else {
        value
    }
}

fn str_group<'a>(caps: &'a Captures<'_>, name: &str) -> &'a str {
    caps.name(name).map(|m| m.as_str()).unwrap_or_default()
}

fn int_group(caps: &Captures<'_>, name: &str) -> Result<i64, LineError> {
    let value = str_group(caps, name);
    value.parse().map_err(|e| LineError::Field {
        field: name.to_string(),
        value: value.to_string(),
        source: e,
    })
}
