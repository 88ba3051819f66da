//! Error types for image decoding.
//!
//! Provides [`DecodeError`], the unified error for the image decoding
//! pipeline. Per-image errors abort that image's decode and surface from
//! the caller; they never poison page-level image discovery.

use std::fmt;

/// Fatal error for a single image decode or a page walk.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// A filter name is not implemented, or a native-container filter
    /// appears before the final position of the chain.
    UnsupportedFilter(String),
    /// ICC inference with a component count outside {1, 3, 4}, or a
    /// color-space family the renderer cannot handle.
    UnsupportedColorSpace(String),
    /// BitsPerComponent outside {1, 2, 4, 8}.
    UnsupportedBitDepth(u16),
    /// The chosen builder rejects the container / color-space pair.
    UnsupportedByRenderer(String),
    /// A decode array that cannot be applied on the native-container path.
    UnsupportedDecodeArray(String),
    /// A color-key mask on a non-Indexed source image.
    UnsupportedMaskColorSpace(String),
    /// The sample payload is shorter than width × height × components.
    TruncatedImage {
        /// Number of bytes the image dimensions require.
        expected: usize,
        /// Number of bytes actually present.
        actual: usize,
    },
    /// Unrecoverable parse error in a page content stream.
    MalformedContentStream(String),
    /// Error parsing PDF structure or resolving objects.
    Parse(String),
    /// I/O error reading PDF data.
    Io(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnsupportedFilter(name) => write!(f, "unsupported filter: {name}"),
            DecodeError::UnsupportedColorSpace(msg) => {
                write!(f, "unsupported color space: {msg}")
            }
            DecodeError::UnsupportedBitDepth(bpc) => {
                write!(f, "unsupported bits per component: {bpc}")
            }
            DecodeError::UnsupportedByRenderer(msg) => {
                write!(f, "renderer cannot handle: {msg}")
            }
            DecodeError::UnsupportedDecodeArray(msg) => {
                write!(f, "unsupported decode array: {msg}")
            }
            DecodeError::UnsupportedMaskColorSpace(msg) => {
                write!(f, "unsupported mask color space: {msg}")
            }
            DecodeError::TruncatedImage { expected, actual } => write!(
                f,
                "truncated image data: expected {expected} bytes, got {actual}"
            ),
            DecodeError::MalformedContentStream(msg) => {
                write!(f, "malformed content stream: {msg}")
            }
            DecodeError::Parse(msg) => write!(f, "parse error: {msg}"),
            DecodeError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        DecodeError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unsupported_filter() {
        let err = DecodeError::UnsupportedFilter("JBIG2Decode".to_string());
        assert_eq!(err.to_string(), "unsupported filter: JBIG2Decode");
    }

    #[test]
    fn display_unsupported_bit_depth() {
        let err = DecodeError::UnsupportedBitDepth(16);
        assert_eq!(err.to_string(), "unsupported bits per component: 16");
    }

    #[test]
    fn display_truncated_image() {
        let err = DecodeError::TruncatedImage {
            expected: 12,
            actual: 7,
        };
        assert_eq!(
            err.to_string(),
            "truncated image data: expected 12 bytes, got 7"
        );
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: DecodeError = io_err.into();
        assert!(matches!(err, DecodeError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn implements_std_error() {
        let err: Box<dyn std::error::Error> =
            Box::new(DecodeError::Parse("bad xref".to_string()));
        assert!(err.to_string().contains("bad xref"));
    }

    #[test]
    fn clone_and_eq() {
        let err = DecodeError::MalformedContentStream("unterminated string".to_string());
        assert_eq!(err.clone(), err);
    }
}
