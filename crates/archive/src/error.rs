//! Archive error types
//!
//! Every variant is a stream-level fault: once one is raised the archive
//! cannot be read any further.

use crate::compression::DecodeFailure;
use std::io;
use thiserror::Error;

/// Errors that can occur while reading or writing an archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// IO error on the underlying stream
    #[error("IO error: {0}")]
    Io(io::Error),

    /// The compressed stream could not be decoded
    #[error("Decompression error ({codec}): {reason}")]
    Decompression {
        /// Codec that failed
        codec: &'static str,
        /// Decoder message
        reason: String,
    },

    /// An array element is not a valid record
    #[error("Invalid record at index {index}: {source}")]
    Json {
        /// Zero-based element index
        index: usize,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },

    /// The stream is not a single JSON array of objects
    #[error("Malformed archive after {records} records: {reason}")]
    Malformed {
        /// Records successfully read before the failure
        records: usize,
        /// What was wrong
        reason: String,
    },

    /// A record's entity lacks a key property
    #[error("Record {index} for table {table} is missing {property}")]
    MissingKey {
        /// Zero-based element index
        index: usize,
        /// Table named by the record
        table: String,
        /// The absent key property
        property: &'static str,
    },
}

impl ArchiveError {
    /// Create a malformed archive error
    pub fn malformed(records: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            records,
            reason: reason.into(),
        }
    }

    /// Classify a parser error for the element at `index`
    ///
    /// Read failures surfaced through the parser keep their IO or
    /// decompression classification.
    pub fn from_json(index: usize, source: serde_json::Error) -> Self {
        if source.is_io() {
            return io::Error::from(source).into();
        }
        Self::Json { index, source }
    }
}

impl From<io::Error> for ArchiveError {
    fn from(err: io::Error) -> Self {
        let is_decode = err
            .get_ref()
            .is_some_and(|inner| inner.is::<DecodeFailure>());
        if !is_decode {
            return ArchiveError::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<DecodeFailure>()) {
            Some(Ok(failure)) => ArchiveError::Decompression {
                codec: failure.codec,
                reason: failure.to_string(),
            },
            _ => ArchiveError::Decompression {
                codec: "unknown",
                reason: "decoder failed".to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(err: serde_json::Error) -> Self {
        ArchiveError::from_json(0, err)
    }
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;
