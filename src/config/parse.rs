use super::types::Config;
use crate::config::{expand_path, unexpanded_vars};
use glob::Pattern;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),
}

/// Load, expand and validate the config file at `path`
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_config(&yaml)
}

/// Parse config YAML. Every field is optional; an empty document yields the defaults.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let config = if yaml.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(yaml)?
    };

    finalize(config)
}

/// Expand paths in `config` and validate the result
pub fn finalize(mut config: Config) -> Result<Config, ConfigError> {
    expand_paths(&mut config);
    validate_config(&config)?;
    Ok(config)
}

fn expand_paths(config: &mut Config) {
    config.source.dir = expand_path(&config.source.dir);
    config.work_dir = expand_path(&config.work_dir);
    config.state.path = expand_path(&config.state.path);
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    for (field, path) in [
        ("source.dir", &config.source.dir),
        ("work_dir", &config.work_dir),
        ("state.path", &config.state.path),
    ] {
        let vars = unexpanded_vars(&path.to_string_lossy());
        if !vars.is_empty() {
            errors.push(format!(
                "{}: environment variable(s) not set: {}. Set them or replace $env{{...}} with an actual path",
                field,
                vars.join(", ")
            ));
        }
    }

    let pattern = &config.source.pattern;
    if pattern.is_empty() {
        errors.push("source.pattern: must not be empty".to_string());
    } else if pattern.contains('/') || pattern.contains('\\') {
        errors.push(format!(
            "source.pattern: '{}' must match file names only, not paths",
            pattern
        ));
    } else if let Err(e) = Pattern::new(pattern) {
        errors.push(format!("source.pattern: invalid glob '{}': {}", pattern, e));
    }

    if let Some(host_tag) = &config.emitter.host_tag {
        if host_tag.trim().is_empty() {
            errors.push("emitter.host_tag: must not be empty".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::timestamp::LogTimeZone;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_empty_document_uses_defaults() {
        std::env::set_var("ProgramData", "/programdata");

        let config = parse_config("").unwrap();

        assert_eq!(
            config.source.dir,
            PathBuf::from("/programdata/VIVE Wireless/ConnectionUtility/Log")
        );
        assert_eq!(config.source.pattern, "HtcCU_*_*_*.txt");
        assert_eq!(config.work_dir, PathBuf::from("."));
        assert_eq!(config.state_path(), PathBuf::from("./state.json"));
        assert_eq!(config.import.line_delay, Duration::from_millis(1));
        assert!(!config.import.connection_status);
        assert!(config.emitter.host_tag.is_none());
        assert_eq!(config.timezone, LogTimeZone::Local);
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
source:
  dir: /mnt/vive/Log
  pattern: "HtcCU_*.txt"
work_dir: /var/lib/vivelog
state:
  path: /var/lib/vivelog/watermark.json
import:
  line_delay: 5ms
  connection_status: true
emitter:
  host_tag: vr-rig
timezone: "+01:00"
"#;

        let config = parse_config(yaml).unwrap();

        assert_eq!(config.source.dir, PathBuf::from("/mnt/vive/Log"));
        assert_eq!(config.source.pattern, "HtcCU_*.txt");
        assert_eq!(
            config.state_path(),
            PathBuf::from("/var/lib/vivelog/watermark.json")
        );
        assert_eq!(config.import.line_delay, Duration::from_millis(5));
        assert!(config.import.connection_status);
        assert_eq!(config.emitter.host_tag.as_deref(), Some("vr-rig"));
        assert_eq!(config.timezone, "+01:00".parse::<LogTimeZone>().unwrap());
    }

    #[test]
    fn test_unset_env_var_is_reported() {
        let yaml = "source:\n  dir: \"$env{VIVELOG_DEFINITELY_UNSET}/Log\"\n";

        let err = parse_config(yaml).unwrap_err();

        match err {
            ConfigError::ValidationList(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("VIVELOG_DEFINITELY_UNSET"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_pattern() {
        let yaml = "source:\n  dir: /tmp\n  pattern: \"HtcCU_[*.txt\"\n";

        assert!(matches!(
            parse_config(yaml),
            Err(ConfigError::ValidationList(_))
        ));
    }

    #[test]
    fn test_pattern_with_separator() {
        let yaml = "source:\n  dir: /tmp\n  pattern: \"logs/*.txt\"\n";

        assert!(matches!(
            parse_config(yaml),
            Err(ConfigError::ValidationList(_))
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "source:\n  dir: /tmp\n  follow: true\n";

        assert!(matches!(parse_config(yaml), Err(ConfigError::YamlParse(_))));
    }

    #[test]
    fn test_invalid_timezone_rejected() {
        let yaml = "source:\n  dir: /tmp\ntimezone: Mars/Olympus\n";

        assert!(matches!(parse_config(yaml), Err(ConfigError::YamlParse(_))));
    }

    #[test]
    fn test_empty_host_tag_rejected() {
        let yaml = "source:\n  dir: /tmp\nemitter:\n  host_tag: \" \"\n";

        assert!(matches!(
            parse_config(yaml),
            Err(ConfigError::ValidationList(_))
        ));
    }
}
