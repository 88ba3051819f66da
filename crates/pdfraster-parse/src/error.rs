//! Error types for the parsing layer.
//!
//! Uses [`thiserror`] for ergonomic error derivation. Provides
//! [`BackendError`] that wraps lopdf and tokenizer failures and converts
//! them to [`DecodeError`] for unified error handling across the library.

use pdfraster_core::error::DecodeError;
use thiserror::Error;

/// Error type for PDF parsing and walking operations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Error from PDF parsing (structure, syntax, object resolution).
    #[error("PDF parse error: {0}")]
    Parse(String),

    /// Error reading PDF data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecoverable error while walking a page content stream.
    #[error("content stream error: {0}")]
    ContentStream(String),

    /// A decoding-pipeline error.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl From<BackendError> for DecodeError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Parse(msg) => DecodeError::Parse(msg),
            BackendError::Io(e) => DecodeError::Io(e.to_string()),
            BackendError::ContentStream(msg) => DecodeError::MalformedContentStream(msg),
            BackendError::Decode(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let err = BackendError::Parse("invalid xref table".to_string());
        assert_eq!(err.to_string(), "PDF parse error: invalid xref table");
    }

    #[test]
    fn io_error_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: BackendError = io_err.into();
        assert!(matches!(err, BackendError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn decode_error_passes_through() {
        let original = DecodeError::UnsupportedBitDepth(3);
        let backend: BackendError = original.clone().into();
        let back: DecodeError = backend.into();
        assert_eq!(back, original);
    }

    #[test]
    fn content_stream_error_maps_to_malformed() {
        let backend = BackendError::ContentStream("unterminated string".to_string());
        let decode: DecodeError = backend.into();
        assert_eq!(
            decode,
            DecodeError::MalformedContentStream("unterminated string".to_string())
        );
    }

    #[test]
    fn parse_error_maps_to_parse() {
        let backend = BackendError::Parse("bad syntax".to_string());
        let decode: DecodeError = backend.into();
        assert_eq!(decode, DecodeError::Parse("bad syntax".to_string()));
    }

    #[test]
    fn implements_std_error() {
        let err: Box<dyn std::error::Error> =
            Box::new(BackendError::Parse("test".to_string()));
        assert!(err.to_string().contains("test"));
    }
}
