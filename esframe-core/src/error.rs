//! Error types shared by every esframe crate.
//!
//! Scanning outcomes ([`ScanError`]) are kept apart from hard failures
//! ([`Error`]): the former are part of normal stream resynchronization and
//! never escape the pipeline, the latter do.

use thiserror::Error;

/// Main error type for the esframe library.
#[derive(Error, Debug)]
pub enum Error {
    /// Bitstream parsing errors.
    #[error("Bitstream error: {0}")]
    Bitstream(#[from] BitstreamError),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid parameter provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Unsupported feature or format.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Resource exhausted (memory, buffers, etc.).
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Buffer too small for operation.
    #[error("Buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

/// Bitstream parsing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BitstreamError {
    /// Unexpected end of bitstream.
    #[error("Unexpected end of bitstream")]
    UnexpectedEnd,

    /// Invalid syntax element value.
    #[error("Invalid syntax element: {element} = {value}")]
    InvalidSyntax { element: &'static str, value: i64 },

    /// Generic bitstream error message.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for BitstreamError {
    fn from(s: &str) -> Self {
        BitstreamError::Other(s.to_string())
    }
}

/// Outcome of a failed attempt to delimit a frame in a byte window.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// The window ends before a frame could be delimited.
    ///
    /// `offset` is the position of the candidate sync pattern, or `None`
    /// when no sync pattern was found at all.
    #[error("Need more data (sync at {offset:?})")]
    NeedMoreData { offset: Option<usize> },

    /// A sync pattern was found at `offset` but the header behind it is invalid.
    #[error("Malformed header at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: Malformation },
}

impl ScanError {
    /// Shorthand for a malformed header.
    pub fn malformed(offset: usize, reason: Malformation) -> Self {
        ScanError::Malformed { offset, reason }
    }

    /// Check whether more input could turn this into a frame.
    #[must_use]
    pub fn is_need_more_data(&self) -> bool {
        matches!(self, ScanError::NeedMoreData { .. })
    }
}

/// Why a header was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformation {
    /// Reserved sample-rate code.
    #[error("reserved sample rate code {0}")]
    SampleRateCode(u8),

    /// Frame size code outside the frame size table.
    #[error("frame size code {0} out of range")]
    FrameSizeCode(u8),

    /// Bitstream identifier selects no known sub-type.
    #[error("unknown bitstream id {0}")]
    BitstreamId(u8),

    /// Reserved stream type.
    #[error("reserved stream type {0}")]
    StreamType(u8),

    /// Frame length smaller than the header or otherwise impossible.
    #[error("invalid frame length {0}")]
    FrameLength(usize),

    /// Frame length larger than the reassembly cap.
    #[error("frame length {length} exceeds cap {cap}")]
    Oversized { length: usize, cap: usize },

    /// Any other field with an out-of-range value.
    #[error("invalid {field} = {value}")]
    Field { field: &'static str, value: u32 },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid parameter error.
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Check if this error is recoverable (can continue processing).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Bitstream(BitstreamError::InvalidSyntax { .. })
                | Error::Bitstream(BitstreamError::UnexpectedEnd)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidParameter("test parameter".into());
        assert_eq!(err.to_string(), "Invalid parameter: test parameter");
    }

    #[test]
    fn test_bitstream_conversion() {
        let err: Error = BitstreamError::UnexpectedEnd.into();
        assert!(matches!(err, Error::Bitstream(BitstreamError::UnexpectedEnd)));
        assert!(err.is_recoverable());
        assert!(!Error::ResourceExhausted("pool".into()).is_recoverable());
    }

    #[test]
    fn test_scan_error_display() {
        let err = ScanError::malformed(4, Malformation::FrameSizeCode(40));
        assert_eq!(
            err.to_string(),
            "Malformed header at offset 4: frame size code 40 out of range"
        );
        assert!(!err.is_need_more_data());
        assert!(ScanError::NeedMoreData { offset: None }.is_need_more_data());
    }
}
