pub mod core;
pub mod plugins;

pub use crate::core::engine::Engine;
pub use crate::core::error::{BufferError, DownloadError, TransferError};
pub use crate::core::model::{DownloadRequest, DownloadSummary, TransferMode};
