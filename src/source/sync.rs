use crate::source::reader::{find_matching, ReaderError};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to list source logs: {0}")]
    List(#[from] ReaderError),

    #[error("failed to {action} '{src}' to '{dst}': {source}")]
    Io {
        action: &'static str,
        src: PathBuf,
        dst: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What happened to a single file during synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Copied { bytes: u64 },
    Appended { bytes: u64 },
    UpToDate,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub copied: usize,
    pub appended: usize,
    pub up_to_date: usize,
    pub bytes: u64,
}

impl SyncReport {
    fn record(&mut self, action: SyncAction) {
        match action {
            SyncAction::Copied { bytes } => {
                self.copied += 1;
                self.bytes += bytes;
            }
            SyncAction::Appended { bytes } => {
                self.appended += 1;
                self.bytes += bytes;
            }
            SyncAction::UpToDate => self.up_to_date += 1,
        }
    }
}

/// Mirror every file in `src_dir` matching `pattern` into `dst_dir`.
///
/// Log files are only ever appended to by the device, so a destination that is
/// shorter than its source is a prefix of it and only the missing tail is copied.
/// A missing `src_dir` has nothing to copy; the working copies are left as they are.
pub fn sync_logs(src_dir: &Path, pattern: &str, dst_dir: &Path) -> Result<SyncReport, SyncError> {
    let mut report = SyncReport::default();

    let sources = match find_matching(src_dir, pattern) {
        Ok(paths) => paths,
        Err(ReaderError::Io { path, source }) if source.kind() == ErrorKind::NotFound => {
            warn!(src = %path.display(), "Source log directory not found, nothing to copy");
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    for src in sources {
        let Some(name) = src.file_name() else {
            continue;
        };
        let dst = dst_dir.join(name);

        let action = sync_file(&src, &dst)?;
        report.record(action);
    }

    info!(
        copied = report.copied,
        appended = report.appended,
        up_to_date = report.up_to_date,
        bytes = report.bytes,
        "Log synchronization complete"
    );

    Ok(report)
}

/// Bring `dst` up to date with `src` without touching bytes already present in `dst`
pub fn sync_file(src: &Path, dst: &Path) -> Result<SyncAction, SyncError> {
    let io_err = |action: &'static str| {
        let src = src.to_path_buf();
        let dst = dst.to_path_buf();
        move |e: std::io::Error| SyncError::Io {
            action,
            src,
            dst,
            source: e,
        }
    };

    if !dst.exists() {
        info!(src = %src.display(), dst = %dst.display(), "Copy");
        let bytes = fs::copy(src, dst).map_err(io_err("copy"))?;
        return Ok(SyncAction::Copied { bytes });
    }

    let src_len = fs::metadata(src).map_err(io_err("stat"))?.len();
    let dst_len = fs::metadata(dst).map_err(io_err("stat"))?.len();

    if src_len > dst_len {
        let delta = src_len - dst_len;
        info!(src = %src.display(), dst = %dst.display(), bytes = delta, "Append");

        let mut reader = File::open(src).map_err(io_err("open"))?;
        reader
            .seek(SeekFrom::Start(dst_len))
            .map_err(io_err("seek"))?;

        let mut writer = OpenOptions::new()
            .append(true)
            .open(dst)
            .map_err(io_err("open"))?;
        let bytes = std::io::copy(&mut reader, &mut writer).map_err(io_err("append"))?;

        return Ok(SyncAction::Appended { bytes });
    }

    if dst_len > src_len {
        warn!(
            src = %src.display(),
            dst = %dst.display(),
            src_len,
            dst_len,
            "Destination is longer than source, leaving it untouched"
        );
    }

    Ok(SyncAction::UpToDate)
}
