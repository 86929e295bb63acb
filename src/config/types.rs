use crate::source::timestamp::LogTimeZone;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub emitter: EmitterConfig,
    #[serde(default)]
    pub timezone: LogTimeZone,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            work_dir: default_work_dir(),
            state: StateConfig::default(),
            import: ImportConfig::default(),
            emitter: EmitterConfig::default(),
            timezone: LogTimeZone::default(),
        }
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Directory the device writes its logs to
    #[serde(default = "default_source_dir")]
    pub dir: PathBuf,
    /// Glob matched against file names inside `dir`
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dir: default_source_dir(),
            pattern: default_pattern(),
        }
    }
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("$env{ProgramData}/VIVE Wireless/ConnectionUtility/Log")
}

fn default_pattern() -> String {
    "HtcCU_*_*_*.txt".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    /// Watermark file; relative paths are resolved against `work_dir`
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from("state.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportConfig {
    /// Pause after each imported line
    #[serde(default = "default_line_delay", with = "humantime_serde")]
    pub line_delay: Duration,
    /// Emit `vive_wireless_connection` samples
    #[serde(default)]
    pub connection_status: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            line_delay: default_line_delay(),
            connection_status: false,
        }
    }
}

fn default_line_delay() -> Duration {
    Duration::from_millis(1)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmitterConfig {
    /// Value of the `host` tag; the machine hostname when unset
    #[serde(default)]
    pub host_tag: Option<String>,
}

impl Config {
    /// Watermark file location with relative paths anchored at `work_dir`
    pub fn state_path(&self) -> PathBuf {
        if self.state.path.is_absolute() {
            self.state.path.clone()
        } else {
            self.work_dir.join(&self.state.path)
        }
    }
}
