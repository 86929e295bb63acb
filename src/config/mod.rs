pub mod parse;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub use parse::{load_config, parse_config, ConfigError};
pub use types::{Config, EmitterConfig, ImportConfig, SourceConfig, StateConfig};

/// `$env{VAR_NAME}` where VAR_NAME starts with a letter or underscore
const ENV_VAR_PATTERN: &str = r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}";

pub(crate) fn env_var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ENV_VAR_PATTERN).expect("env var pattern is valid"))
}

/// Replace every `$env{VAR}` in `text` with the variable's value.
/// Variables that are not set are left in place so validation can report them.
pub fn expand_env_vars(text: &str) -> String {
    env_var_regex()
        .replace_all(text, |caps: &regex::Captures| {
            let whole = &caps[0];
            std::env::var(&caps[1]).unwrap_or_else(|_| whole.to_string())
        })
        .into_owned()
}

/// Names of the `$env{VAR}` references still present in `text`, sorted and deduplicated
pub fn unexpanded_vars(text: &str) -> Vec<String> {
    let mut vars: Vec<String> = env_var_regex()
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect();
    vars.sort();
    vars.dedup();
    vars
}

/// Expand a leading `~` to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match dirs::home_dir() {
        Some(home) if rest.as_os_str().is_empty() => home,
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Expand `$env{VAR}` references and a leading `~` in a path
pub fn expand_path(path: &Path) -> PathBuf {
    let expanded = expand_env_vars(&path.to_string_lossy());
    expand_tilde(Path::new(&expanded))
}

/// The config file to load: the explicit path if given, otherwise
/// `~/.config/vivelog/config.yml` when it exists
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    dirs::home_dir()
        .map(|home| home.join(".config/vivelog/config.yml"))
        .filter(|path| path.exists())
}
