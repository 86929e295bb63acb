use crate::metrics::{EmitError, MetricSink};
use crate::parser::{LineError, LineParser};
use crate::source::reader::{LogFile, ReaderError};
use crate::storage::{Watermark, WatermarkError, WatermarkStore};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("line error in '{file}': {source}")]
    Line {
        file: String,
        #[source]
        source: LineError,
    },

    #[error("emit error: {0}")]
    Emit(#[from] EmitError),

    #[error("watermark error: {0}")]
    Watermark(#[from] WatermarkError),
}

/// Counters for a single import run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub files_imported: usize,
    pub files_skipped: usize,
    pub lines_imported: usize,
    /// Lines older than the line watermark
    pub lines_skipped: usize,
    /// Lines without a recognizable envelope
    pub lines_ignored: usize,
    pub samples_emitted: usize,
}

/// Replays log files into a metric sink, resuming from a watermark
pub struct Importer<'a, S: MetricSink + ?Sized> {
    parser: &'a LineParser,
    sink: &'a S,
    store: &'a WatermarkStore,
    line_delay: Duration,
}

impl<'a, S: MetricSink + ?Sized> Importer<'a, S> {
    pub fn new(
        parser: &'a LineParser,
        sink: &'a S,
        store: &'a WatermarkStore,
        line_delay: Duration,
    ) -> Self {
        Self {
            parser,
            sink,
            store,
            line_delay,
        }
    }

    /// Import `files` (in chronological order) starting from `watermark`.
    ///
    /// The watermark is saved after every completed file and the final value is
    /// returned. A file older than `last_file` is skipped whole; inside a file,
    /// lines older than `last_line` are skipped.
    pub async fn run(
        &self,
        files: &[LogFile],
        mut watermark: Watermark,
    ) -> Result<(Watermark, ImportStats), ImportError> {
        let mut stats = ImportStats::default();

        for file in files {
            if file.timestamp < watermark.last_file {
                debug!(file = %file.path.display(), "Skipping already imported file");
                stats.files_skipped += 1;
                continue;
            }

            info!(file = %file.path.display(), "Importing");
            watermark = self.import_file(file, watermark, &mut stats).await?;

            watermark.last_file = file.timestamp;
            self.store.save(&watermark)?;
            stats.files_imported += 1;
        }

        info!(
            files_imported = stats.files_imported,
            files_skipped = stats.files_skipped,
            lines_imported = stats.lines_imported,
            lines_skipped = stats.lines_skipped,
            lines_ignored = stats.lines_ignored,
            samples_emitted = stats.samples_emitted,
            "Import complete"
        );

        Ok((watermark, stats))
    }

    async fn import_file(
        &self,
        file: &LogFile,
        mut watermark: Watermark,
        stats: &mut ImportStats,
    ) -> Result<Watermark, ImportError> {
        let line_err = |e: LineError| ImportError::Line {
            file: file.name(),
            source: e,
        };

        for raw in file.read_lines()? {
            let Some(line) = self.parser.parse_envelope(&raw).map_err(line_err)? else {
                stats.lines_ignored += 1;
                continue;
            };

            if line.timestamp < watermark.last_line {
                stats.lines_skipped += 1;
                continue;
            }

            for sample in self.parser.samples(&line).map_err(line_err)? {
                self.sink.send(&sample).await?;
                stats.samples_emitted += 1;
            }

            if !self.line_delay.is_zero() {
                sleep(self.line_delay).await;
            }

            watermark.last_line = line.timestamp;
            stats.lines_imported += 1;
        }

        Ok(watermark)
    }
}
