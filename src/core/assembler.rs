use crate::core::buffer::ChunkBuffer;
use crate::core::error::DownloadError;
use std::path::Path;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};

pub struct Assembler;

impl Assembler {
    /// Write `chunks` to `dest` in index order, truncating whatever was there.
    ///
    /// Buffers are consumed and released as they are written. Parent directories
    /// are not created. Returns the number of bytes written.
    pub async fn write(dest: &Path, chunks: Vec<ChunkBuffer>) -> Result<u64, DownloadError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;

        let mut writer = BufWriter::with_capacity(512 * 1024, file);
        let mut written = 0u64;
        for (index, chunk) in chunks.into_iter().enumerate() {
            writer
                .write_all(chunk.as_slice())
                .await
                .map_err(|e| DownloadError::io(dest, e))?;
            written += chunk.len() as u64;
            tracing::trace!(index, bytes = chunk.len(), "chunk written");
        }

        writer.flush().await.map_err(|e| DownloadError::io(dest, e))?;
        writer.get_mut().sync_all().await.map_err(|e| DownloadError::io(dest, e))?;

        tracing::debug!(dest = %dest.display(), written, "output assembled");
        Ok(written)
    }
}
