use chrono::{
    DateTime, Duration, FixedOffset, Local, LocalResult, NaiveDateTime, Offset, TimeZone, Timelike,
    Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Format of the timestamp embedded in log file names (`HtcCU_<date>_<time>_<pid>.txt`)
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Format of the second-resolution part of a log line timestamp
pub const LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("failed to parse timestamp '{value}' with format '{format}': {source}")]
    ParseError {
        value: String,
        format: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("file name '{0}' does not carry a <date>_<time> timestamp")]
    FileName(String),

    #[error("invalid millisecond value '{0}'")]
    Millis(String),

    #[error("local time {0} cannot be mapped to UTC")]
    Unmappable(NaiveDateTime),

    #[error("invalid timezone '{0}': expected 'local', 'utc' or an offset like '+02:00'")]
    InvalidTimeZone(String),
}

/// Timezone in which the device writes its wall-clock timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogTimeZone {
    /// The operating system's local timezone
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl LogTimeZone {
    pub fn utc() -> Self {
        LogTimeZone::Fixed(Utc.fix())
    }

    /// Convert a local wall-clock time to UTC.
    ///
    /// Ambiguous times (DST fall-back) resolve to the later, standard-time instant.
    /// Times inside a DST gap are read with the offset in effect before the gap.
    pub fn to_utc(&self, naive: &NaiveDateTime) -> Result<DateTime<Utc>, TimestampError> {
        match self {
            LogTimeZone::Local => resolve_local(&Local, naive),
            LogTimeZone::Fixed(offset) => resolve_local(offset, naive),
        }
    }
}

fn resolve_local<Tz: TimeZone>(
    tz: &Tz,
    naive: &NaiveDateTime,
) -> Result<DateTime<Utc>, TimestampError> {
    match tz.from_local_datetime(naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(_, later) => Ok(later.with_timezone(&Utc)),
        LocalResult::None => tz
            .from_local_datetime(&(*naive - Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc) + Duration::hours(1))
            .ok_or(TimestampError::Unmappable(*naive)),
    }
}

impl TryFrom<String> for LogTimeZone {
    type Error = TimestampError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LogTimeZone> for String {
    fn from(tz: LogTimeZone) -> Self {
        tz.to_string()
    }
}

impl std::str::FromStr for LogTimeZone {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "local" => return Ok(LogTimeZone::Local),
            "utc" | "z" => return Ok(LogTimeZone::utc()),
            _ => {}
        }

        let invalid = || TimestampError::InvalidTimeZone(s.to_string());

        let (sign, rest) = match trimmed.as_bytes().first() {
            Some(b'+') => (1, &trimmed[1..]),
            Some(b'-') => (-1, &trimmed[1..]),
            _ => return Err(invalid()),
        };

        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
        let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
        if minutes >= 60 {
            return Err(invalid());
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(LogTimeZone::Fixed)
            .ok_or_else(invalid)
    }
}

impl fmt::Display for LogTimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogTimeZone::Local => write!(f, "local"),
            LogTimeZone::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

/// Parse the timestamp embedded in a log file name.
///
/// The second and third `_`-separated components form the timestamp, e.g.
/// `HtcCU_20200601_101500_4242.txt` is 2020-06-01 10:15:00 local time.
pub fn parse_file_timestamp(
    file_name: &str,
    tz: &LogTimeZone,
) -> Result<DateTime<Utc>, TimestampError> {
    let mut parts = file_name.split('_').skip(1);
    let (Some(date), Some(time)) = (parts.next(), parts.next()) else {
        return Err(TimestampError::FileName(file_name.to_string()));
    };

    let value = format!("{}_{}", date, time);
    let naive = NaiveDateTime::parse_from_str(&value, FILE_TIMESTAMP_FORMAT).map_err(|e| {
        TimestampError::ParseError {
            value,
            format: FILE_TIMESTAMP_FORMAT.to_string(),
            source: e,
        }
    })?;

    tz.to_utc(&naive)
}

/// Parse a log line timestamp given as `YYYY-MM-DD HH:MM:SS` plus a three digit
/// millisecond fraction.
pub fn parse_line_timestamp(
    datetime: &str,
    millis: &str,
    tz: &LogTimeZone,
) -> Result<DateTime<Utc>, TimestampError> {
    let naive = NaiveDateTime::parse_from_str(datetime, LINE_TIMESTAMP_FORMAT).map_err(|e| {
        TimestampError::ParseError {
            value: datetime.to_string(),
            format: LINE_TIMESTAMP_FORMAT.to_string(),
            source: e,
        }
    })?;

    let millis_value: u32 = millis
        .parse()
        .ok()
        .filter(|ms| *ms < 1000)
        .ok_or_else(|| TimestampError::Millis(millis.to_string()))?;

    let naive = naive
        .with_nanosecond(millis_value * 1_000_000)
        .ok_or_else(|| TimestampError::Millis(millis.to_string()))?;

    tz.to_utc(&naive)
}
