use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TabixError>;

/// Everything that can go wrong while building, loading or querying a tabix index.
///
/// A query for a sequence the index has never seen is not an error: it simply
/// produces no records.
#[derive(thiserror::Error, Debug)]
pub enum TabixError {
    /// A data line whose coordinate columns could not be interpreted.
    ///
    /// Recoverable: the builder and the query cursor log it and move on.
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    /// The input is not sorted by (sequence, begin).
    #[error("records out of order at line {line}: {message}")]
    OutOfOrder { line: u64, message: String },

    /// A record whose stream offsets do not advance.
    #[error("malformed offsets at line {line}: begin {begin:#x} is not before end {end:#x}")]
    MalformedOffset { line: u64, begin: u64, end: u64 },

    /// The binary index is invalid or truncated.
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// A region string that does not follow `name[:start[-end]]`.
    #[error("invalid region '{0}'")]
    InvalidRegion(String),

    /// Underlying stream failure. Never retried.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TabixError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        TabixError::MalformedRecord {
            line: 0,
            reason: reason.into(),
        }
    }

    /// Attach a line number to a `MalformedRecord` raised without one.
    pub(crate) fn at_line(self, lineno: u64) -> Self {
        match self {
            TabixError::MalformedRecord { reason, .. } => TabixError::MalformedRecord {
                line: lineno,
                reason,
            },
            other => other,
        }
    }

    /// True for per-record failures the caller may skip over.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TabixError::MalformedRecord { .. })
    }
}

impl From<TabixError> for io::Error {
    fn from(e: TabixError) -> Self {
        match e {
            TabixError::Io(inner) => inner,
            TabixError::InvalidRegion(_) => io::Error::new(io::ErrorKind::InvalidInput, e),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
