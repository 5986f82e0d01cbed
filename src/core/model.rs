use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Inclusive byte span `[start, end_inclusive]`, never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub(crate) start: u64,
    pub(crate) end_inclusive: u64,
}

impl ByteRange {
    pub fn new(start: u64, end_inclusive: u64) -> Option<Self> {
        (start <= end_inclusive).then_some(Self { start, end_inclusive })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end_inclusive(&self) -> u64 {
        self.end_inclusive
    }

    /// Number of bytes the range asks for.
    pub fn span(&self) -> u64 {
        self.end_inclusive - self.start + 1
    }

    /// Value for the HTTP `Range` header.
    pub fn header_value(&self) -> String {
        format!("bytes={}", self)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end_inclusive)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub index: usize,
    pub range: ByteRange,
}

/// Ordered, contiguous chunk ranges for one download. Built by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    pub(crate) chunks: Vec<ChunkDescriptor>,
    pub(crate) chunk_size: u64,
}

impl DownloadPlan {
    pub fn chunks(&self) -> &[ChunkDescriptor] {
        &self.chunks
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Upper bound of the bytes this plan can fetch.
    pub fn planned_bytes(&self) -> u64 {
        self.chunks.last().map(|c| c.range.end_inclusive + 1).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    #[default]
    Serial,
    Parallel,
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: Url,
    pub dest: PathBuf,
    pub mode: TransferMode,
    pub num_chunks: usize,
    pub chunk_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub dest: PathBuf,
    pub chunks: usize,
    pub bytes_written: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_rejects_reversed_bounds() {
        assert_eq!(ByteRange::new(5, 4), None);
        let r = ByteRange::new(5, 5).unwrap();
        assert_eq!(r.span(), 1);
        assert_eq!((r.start(), r.end_inclusive()), (5, 5));
    }

    #[test]
    fn test_range_text_forms() {
        let r = ByteRange::new(100, 199).unwrap();
        assert_eq!(r.to_string(), "100-199");
        assert_eq!(r.header_value(), "bytes=100-199");
        assert_eq!(r.span(), 100);
    }
}
