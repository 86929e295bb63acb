use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CURRENT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum WatermarkError {
    #[error("failed to {action} watermark file '{path}': {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watermark file '{path}' is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("watermark file '{path}' has unsupported version {version}")]
    InvalidVersion { path: PathBuf, version: u32 },
}

pub type Result<T> = std::result::Result<T, WatermarkError>;

/// Cursor over already imported data: the newest fully imported file and line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    pub last_file: DateTime<Utc>,
    pub last_line: DateTime<Utc>,
}

impl Watermark {
    /// Earliest instant a watermark can hold, 0001-01-01T00:00:00Z
    pub fn min_instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self {
            last_file: Self::min_instant(),
            last_line: Self::min_instant(),
        }
    }
}

/// On-disk layout of the watermark file
#[derive(Debug, Serialize, Deserialize)]
struct StoredWatermark {
    version: u32,
    last_file: DateTime<Utc>,
    last_line: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct VersionProbe {
    version: u32,
}

/// JSON file holding the watermark between runs
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted watermark, or the minimum watermark if none was saved yet
    pub fn load(&self) -> Result<Watermark> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No watermark found, starting from the beginning");
                return Ok(Watermark::default());
            }
            Err(e) => {
                return Err(WatermarkError::Io {
                    action: "read",
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let corrupt = |e| WatermarkError::Corrupt {
            path: self.path.clone(),
            source: e,
        };

        let probe: VersionProbe = serde_json::from_slice(&contents).map_err(corrupt)?;
        if probe.version != CURRENT_VERSION {
            return Err(WatermarkError::InvalidVersion {
                path: self.path.clone(),
                version: probe.version,
            });
        }

        let stored: StoredWatermark = serde_json::from_slice(&contents).map_err(corrupt)?;
        let watermark = Watermark {
            last_file: stored.last_file,
            last_line: stored.last_line,
        };

        info!(
            last_file = %watermark.last_file,
            last_line = %watermark.last_line,
            "Loaded watermark"
        );
        Ok(watermark)
    }

    /// Atomically replace the persisted watermark
    pub fn save(&self, watermark: &Watermark) -> Result<()> {
        let stored = StoredWatermark {
            version: CURRENT_VERSION,
            last_file: watermark.last_file,
            last_line: watermark.last_line,
        };

        let io_err = |action: &'static str| {
            let path = self.path.clone();
            move |e: std::io::Error| WatermarkError::Io {
                action,
                path,
                source: e,
            }
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(io_err("create directory for"))?;
            }
        }

        let temp_path = self
            .path
            .with_extension(format!("tmp.{}", std::process::id()));

        let file = File::create(&temp_path).map_err(io_err("create temp file for"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &stored).map_err(|e| {
            WatermarkError::Io {
                action: "serialize",
                path: self.path.clone(),
                source: e.into(),
            }
        })?;
        writer.flush().map_err(io_err("flush"))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(io_err("sync"))?;
        drop(writer);

        fs::rename(&temp_path, &self.path).map_err(io_err("replace"))?;

        debug!(
            last_file = %watermark.last_file,
            last_line = %watermark.last_line,
            "Watermark saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_watermark() -> Watermark {
        Watermark {
            last_file: Utc.with_ymd_and_hms(2020, 6, 1, 10, 15, 0).unwrap(),
            last_line: Utc.with_ymd_and_hms(2020, 6, 1, 11, 0, 2).unwrap()
                + chrono::Duration::milliseconds(42),
        }
    }

    #[test]
    fn test_missing_file_yields_minimum() {
        let temp_dir = TempDir::new().unwrap();
        let store = WatermarkStore::new(temp_dir.path().join("state.json"));

        let watermark = store.load().unwrap();

        assert_eq!(watermark, Watermark::default());
        assert_eq!(watermark.last_file.to_rfc3339(), "0001-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = WatermarkStore::new(temp_dir.path().join("state.json"));

        store.save(&sample_watermark()).unwrap();

        assert_eq!(store.load().unwrap(), sample_watermark());
    }

    #[test]
    fn test_round_trip_minimum() {
        let temp_dir = TempDir::new().unwrap();
        let store = WatermarkStore::new(temp_dir.path().join("state.json"));

        store.save(&Watermark::default()).unwrap();

        assert_eq!(store.load().unwrap(), Watermark::default());
    }

    #[test]
    fn test_save_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = WatermarkStore::new(temp_dir.path().join("state.json"));

        store.save(&Watermark::default()).unwrap();
        store.save(&sample_watermark()).unwrap();

        assert_eq!(store.load().unwrap(), sample_watermark());
        // Temp file must not linger after the rename
        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = WatermarkStore::new(temp_dir.path().join("nested/dir/state.json"));

        store.save(&sample_watermark()).unwrap();

        assert_eq!(store.load().unwrap(), sample_watermark());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        fs::write(&path, b"\x80\x04}q\x00.").unwrap();

        let result = WatermarkStore::new(&path).load();

        assert!(matches!(result, Err(WatermarkError::Corrupt { .. })));
    }

    #[test]
    fn test_version_mismatch_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        fs::write(
            &path,
            r#"{"version": 999, "last_file": "2020-01-01T00:00:00Z", "last_line": "2020-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let result = WatermarkStore::new(&path).load();

        assert!(matches!(
            result,
            Err(WatermarkError::InvalidVersion { version: 999, .. })
        ));
    }

    #[test]
    fn test_file_format() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        WatermarkStore::new(&path).save(&sample_watermark()).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();

        assert_eq!(value["version"], 1);
        assert_eq!(value["last_file"], "2020-06-01T10:15:00Z");
        assert_eq!(value["last_line"], "2020-06-01T11:00:02.042Z");
    }
}
