//! Error types for ipxdb.

use thiserror::Error;

/// Error type for ipxdb operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid IPv4 address string
    #[error("invalid ip address `{0}`")]
    InvalidIp(String),

    /// Malformed segment line (wrong field count)
    #[error("invalid ip segment line `{0}`")]
    InvalidSegmentLine(String),

    /// Segment with start ip greater than end ip
    #[error("start ip `{start}` should not be greater than end ip `{end}`")]
    InvertedSegment { start: String, end: String },

    /// Segment out of order or overlapping the previous one
    #[error("segment `{0}` overlaps or is out of order with the previous segment")]
    OutOfOrderSegment(String),

    /// Segment line with no region payload
    #[error("empty region info in segment line `{0}`")]
    EmptyRegion(String),

    /// Region payload longer than the u16 length field allows
    #[error("too long region info `{0}`: should be less than {} bytes", 0xffffu32)]
    RegionTooLong(String),

    /// No segments were loaded before building
    #[error("empty segment list")]
    EmptySegmentList,

    /// Unsupported xdb format version
    #[error("unsupported xdb version: {0}")]
    UnsupportedVersion(u16),

    /// Buffer or file too short for the requested read
    #[error("truncated xdb data: need {expected} bytes at offset {offset}, have {actual}")]
    Truncated {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ipxdb operations.
pub type Result<T> = std::result::Result<T, Error>;
