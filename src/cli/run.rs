use crate::config::{load_config, parse_config, resolve_config_path, Config};
use crate::import::{ImportStats, Importer};
use crate::metrics::{default_host_tag, UdpEmitter};
use crate::parser::LineParser;
use crate::source::{list_log_files, sync_logs};
use crate::storage::WatermarkStore;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("failed to create working directory '{path}': {source}")]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sync error: {0}")]
    Sync(#[from] crate::source::SyncError),

    #[error("source reader error: {0}")]
    SourceReader(#[from] crate::source::ReaderError),

    #[error("parser error: {0}")]
    Parser(#[from] crate::parser::LineError),

    #[error("emitter error: {0}")]
    Emitter(#[from] crate::metrics::EmitError),

    #[error("watermark error: {0}")]
    Watermark(#[from] crate::storage::WatermarkError),

    #[error("import error: {0}")]
    Import(#[from] crate::import::ImportError),
}

/// Command line inputs
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub host: String,
    pub port: u16,
    pub config: Option<PathBuf>,
}

pub async fn run(args: RunArgs) -> Result<ImportStats, RunError> {
    let config = match resolve_config_path(args.config.as_deref()) {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(&path)?
        }
        None => {
            info!("No config file found, using defaults");
            parse_config("")?
        }
    };

    run_with_config(&config, &args.host, args.port).await
}

/// Sync the device logs into the working directory, then import everything
/// newer than the stored watermark into the collector at `host:port`
pub async fn run_with_config(
    config: &Config,
    host: &str,
    port: u16,
) -> Result<ImportStats, RunError> {
    let host_tag = match &config.emitter.host_tag {
        Some(tag) => tag.clone(),
        None => default_host_tag()?,
    };

    info!(collector = %format!("{}:{}", host, port), host_tag = %host_tag, "Connecting to collector");
    let emitter = UdpEmitter::connect(host, port, host_tag).await?;

    std::fs::create_dir_all(&config.work_dir).map_err(|e| RunError::WorkDir {
        path: config.work_dir.clone(),
        source: e,
    })?;

    info!(
        src = %config.source.dir.display(),
        dst = %config.work_dir.display(),
        pattern = %config.source.pattern,
        "Synchronizing logs"
    );
    sync_logs(&config.source.dir, &config.source.pattern, &config.work_dir)?;

    let files = list_log_files(&config.work_dir, &config.source.pattern, &config.timezone)?;

    let store = WatermarkStore::new(config.state_path());
    let watermark = store.load()?;

    let parser = LineParser::with_defaults(config.timezone, config.import.connection_status)?;
    info!(kinds = ?parser.kinds(), files = files.len(), "Starting import");

    let importer = Importer::new(&parser, &emitter, &store, config.import.line_delay);
    let (_, stats) = importer.run(&files, watermark).await?;

    Ok(stats)
}
