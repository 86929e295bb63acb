pub mod watermark;

pub use watermark::{Watermark, WatermarkError, WatermarkStore};
