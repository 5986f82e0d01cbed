use std::path::PathBuf;

/// A chunk buffer could not grow to accept more data.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("not enough memory to grow chunk buffer by {requested} bytes")]
    OutOfMemory { requested: usize },
}

/// Outcome of a single range request that did not succeed.
#[derive(thiserror::Error, Debug)]
pub enum TransferError {
    /// The request could not be configured (bad header, client build failure, subsystem gone).
    #[error("invalid request setup: {0}")]
    Setup(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("http status error: {0}")]
    Status(u16),

    /// 非首个分片收到 200：服务器没有按 Range 返回
    #[error("server ignored range and returned full content")]
    RangeIgnored,

    /// The body ran past the requested range; streaming stopped at the limit.
    #[error("response exceeded requested range of {limit} bytes")]
    Overflow { limit: u64 },

    #[error(transparent)]
    OutOfMemory(#[from] BufferError),
}

#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("invalid download plan: {0}")]
    InvalidPlan(String),

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("chunk {index} failed: {source}")]
    Chunk {
        index: usize,
        #[source]
        source: TransferError,
    },

    /// A chunk came back short while a later chunk still carried data.
    #[error("chunk {index} truncated: expected {expected} bytes, received {received}")]
    Truncated { index: usize, expected: u64, received: u64 },

    #[error("chunk {index} overflowed its range: expected at most {expected} bytes, received {received}")]
    Overflow { index: usize, expected: u64, received: u64 },

    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
