//! Error types for `DstsGeom`

use thiserror::Error;

/// The error type for `DstsGeom` operations.
///
/// Every codec variant carries the absolute byte offset (from the start of the
/// byte source) at which the problem was detected. In-memory operations that
/// never touch a byte source report `None`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from the underlying byte source or sink.
    ///
    /// Unexpected end of input is never reported through this variant, see
    /// [`Error::TruncatedInput`].
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Container Errors ====================
    /// Bad magic or version in a fixed header.
    #[error("malformed header at {offset:#x}: {message}")]
    MalformedHeader {
        /// Position of the offending header.
        offset: u64,
        /// Description of what is wrong.
        message: String,
    },

    /// A seek or read ran past the end of the byte source.
    #[error("truncated input: reading {len} byte(s) at {offset:#x} runs past end of source")]
    TruncatedInput {
        /// Position of the failed read.
        offset: u64,
        /// Number of bytes requested.
        len: usize,
    },

    /// A recomputed derived value disagrees with the stored one.
    #[error("inconsistent invariant{}: {}", at(.offset), .message)]
    InconsistentInvariant {
        /// Position of the stored value, if any.
        offset: Option<u64>,
        /// Description of the mismatch.
        message: String,
    },

    /// The file uses a feature this codec deliberately does not handle.
    #[error("unsupported feature{}: {}", at(.offset), .feature)]
    UnsupportedFeature {
        /// Position of the field announcing the feature.
        offset: Option<u64>,
        /// Name of the feature.
        feature: String,
    },

    /// Malformed base-46 text or an unresolvable shader parameter id.
    #[error("invalid encoding{}: {}", at(.offset), .message)]
    InvalidEncoding {
        /// Position of the encoded value, if any.
        offset: Option<u64>,
        /// Description of the encoding problem.
        message: String,
    },

    /// A string or indirection-table index outside its table.
    #[error("{} index {} out of range (len {}){}", .what, .index, .len, at(.offset))]
    OutOfRange {
        /// Position of the index field, if any.
        offset: Option<u64>,
        /// The table being indexed.
        what: &'static str,
        /// The offending index.
        index: u64,
        /// Length of the table.
        len: u64,
    },

    // ==================== Parsing Errors ====================
    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedHeader,
    TruncatedInput,
    InconsistentInvariant,
    UnsupportedFeature,
    InvalidEncoding,
    OutOfRange,
    Io,
    Json,
}

impl Error {
    /// The taxonomy bucket this error belongs to.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::MalformedHeader { .. } => ErrorKind::MalformedHeader,
            Self::TruncatedInput { .. } => ErrorKind::TruncatedInput,
            Self::InconsistentInvariant { .. } => ErrorKind::InconsistentInvariant,
            Self::UnsupportedFeature { .. } => ErrorKind::UnsupportedFeature,
            Self::InvalidEncoding { .. } => ErrorKind::InvalidEncoding,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::JsonError(_) => ErrorKind::Json,
        }
    }

    /// Byte offset at which the error was detected, when known.
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::MalformedHeader { offset, .. } | Self::TruncatedInput { offset, .. } => {
                Some(*offset)
            }
            Self::InconsistentInvariant { offset, .. }
            | Self::UnsupportedFeature { offset, .. }
            | Self::InvalidEncoding { offset, .. }
            | Self::OutOfRange { offset, .. } => *offset,
            Self::Io(_) | Self::JsonError(_) => None,
        }
    }

    pub(crate) fn inconsistent(offset: Option<u64>, message: impl Into<String>) -> Self {
        Self::InconsistentInvariant {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(offset: u64, feature: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            offset: Some(offset),
            feature: feature.into(),
        }
    }

    pub(crate) fn out_of_range(
        offset: Option<u64>,
        what: &'static str,
        index: impl Into<u64>,
        len: usize,
    ) -> Self {
        Self::OutOfRange {
            offset,
            what,
            index: index.into(),
            len: len as u64,
        }
    }

    /// Attach `position` to an invariant failure raised without one.
    pub(crate) fn located(self, position: u64) -> Self {
        match self {
            Self::InconsistentInvariant {
                offset: None,
                message,
            } => Self::InconsistentInvariant {
                offset: Some(position),
                message,
            },
            other => other,
        }
    }
}

fn at<'a>(offset: impl Into<Option<&'a u64>>) -> String {
    offset.into().map(|o| format!(" at {o:#x}")).unwrap_or_default()
}

/// A specialized Result type for `DstsGeom` operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_offset() {
        let err = Error::TruncatedInput { offset: 0x40, len: 4 };
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
        assert_eq!(err.offset(), Some(0x40));

        let err = Error::out_of_range(None, "bone", 7u32, 3);
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        assert_eq!(err.offset(), None);
        assert_eq!(err.to_string(), "bone index 7 out of range (len 3)");
    }

    #[test]
    fn test_display_with_offset() {
        let err = Error::inconsistent(Some(0x10), "bounds differ");
        assert_eq!(err.to_string(), "inconsistent invariant at 0x10: bounds differ");
    }
}
