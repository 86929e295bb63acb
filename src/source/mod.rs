pub mod reader;
pub mod sync;
pub mod timestamp;

pub use reader::{list_log_files, LogFile, ReaderError};
pub use sync::{sync_logs, SyncAction, SyncError, SyncReport};
pub use timestamp::{LogTimeZone, TimestampError};
