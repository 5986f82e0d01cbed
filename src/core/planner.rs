use crate::core::error::DownloadError;
use crate::core::model::{ByteRange, ChunkDescriptor, DownloadPlan};

/// Split `[0, num_chunks * chunk_size)` into `num_chunks` contiguous inclusive ranges.
///
/// The last upper bound is not clamped to the resource length; the server decides
/// what a range past the end returns.
pub fn plan_ranges(num_chunks: usize, chunk_size: u64) -> Result<DownloadPlan, DownloadError> {
    if num_chunks == 0 {
        return Err(DownloadError::InvalidPlan("number of chunks must be positive".to_string()));
    }
    if chunk_size == 0 {
        return Err(DownloadError::InvalidPlan("chunk size must be positive".to_string()));
    }

    let total = u64::try_from(num_chunks)
        .ok()
        .and_then(|n| chunk_size.checked_mul(n))
        .ok_or_else(|| {
            DownloadError::InvalidPlan(format!(
                "{} chunks of {} bytes exceed the addressable range",
                num_chunks, chunk_size
            ))
        })?;

    let mut chunks = Vec::new();
    chunks.try_reserve_exact(num_chunks).map_err(|_| {
        DownloadError::InvalidPlan(format!("cannot hold a plan of {} chunks in memory", num_chunks))
    })?;

    // total fits in u64, so no bound below can overflow
    let mut lower = 0u64;
    for index in 0..num_chunks {
        let upper = chunk_size * (index as u64 + 1) - 1;
        chunks.push(ChunkDescriptor {
            index,
            range: ByteRange { start: lower, end_inclusive: upper },
        });
        lower = upper + 1;
    }
    debug_assert_eq!(lower, total);

    Ok(DownloadPlan { chunks, chunk_size })
}
