use crate::source::timestamp::{parse_file_timestamp, LogTimeZone, TimestampError};
use chrono::{DateTime, Utc};
use glob::Pattern;
use std::path::{Path, PathBuf};
use thiserror::Error;

const BYTE_ORDER_MARK: char = '\u{feff}';

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("io error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("timestamp error for '{path}': {source}")]
    Timestamp {
        path: PathBuf,
        #[source]
        source: TimestampError,
    },

    #[error("'{path}' is not valid UTF-16LE: {reason}")]
    Decode { path: PathBuf, reason: String },
}

/// A log file in the working directory together with the timestamp carried in its name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

impl LogFile {
    pub fn new(path: PathBuf, tz: &LogTimeZone) -> Result<Self, ReaderError> {
        let name = file_name(&path);
        let timestamp = parse_file_timestamp(&name, tz).map_err(|e| ReaderError::Timestamp {
            path: path.clone(),
            source: e,
        })?;

        Ok(Self { path, timestamp })
    }

    pub fn name(&self) -> String {
        file_name(&self.path)
    }

    /// Read and decode the whole file, returning its lines without terminators.
    ///
    /// `\r\n`, a bare `\r` and `\n` all end a line.
    pub fn read_lines(&self) -> Result<Vec<String>, ReaderError> {
        let bytes = std::fs::read(&self.path).map_err(|e| ReaderError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        let text = decode_utf16le(&bytes).map_err(|reason| ReaderError::Decode {
            path: self.path.clone(),
            reason,
        })?;

        let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text.as_str());

        Ok(split_lines(text))
    }
}

/// List log files in `dir` matching `pattern`, ordered by file name.
///
/// File names start with a fixed prefix followed by `YYYYMMDD_HHMMSS`, so name
/// order is chronological order.
pub fn list_log_files(
    dir: &Path,
    pattern: &str,
    tz: &LogTimeZone,
) -> Result<Vec<LogFile>, ReaderError> {
    find_matching(dir, pattern)?
        .into_iter()
        .map(|path| LogFile::new(path, tz))
        .collect()
}

/// Find regular files directly inside `dir` whose names match `pattern`, sorted by name
pub fn find_matching(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, ReaderError> {
    let matcher = Pattern::new(pattern).map_err(|e| ReaderError::InvalidPattern {
        pattern: pattern.to_string(),
        source: e,
    })?;

    let entries = std::fs::read_dir(dir).map_err(|e| ReaderError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ReaderError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();

        // Skip directories
        if path.is_dir() {
            continue;
        }

        if matcher.matches(&entry.file_name().to_string_lossy()) {
            paths.push(path);
        }
    }

    paths.sort_by_key(|path| file_name(path));
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn split_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(str::to_string)
        .collect()
}

fn decode_utf16le(bytes: &[u8]) -> Result<String, String> {
    if bytes.len() % 2 != 0 {
        return Err(format!("odd byte length {}", bytes.len()));
    }

    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));

    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|e| e.to_string())
}

/// Encode text as UTF-16LE the way the device writes its logs
#[cfg(test)]
pub(crate) fn encode_utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}
