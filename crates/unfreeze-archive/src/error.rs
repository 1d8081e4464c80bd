//! Error types for archive decoding.
//!
//! Only failures that make the whole archive unreadable are errors; problems
//! confined to one entry are reported as [`Diagnostic`](crate::Diagnostic)s.

use thiserror::Error;

/// Fatal errors that abort decoding of an archive.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error.
    #[error("{0}")]
    Common(#[from] unfreeze_common::Error),

    /// Input ended inside a fixed-size structure.
    #[error("truncated {what}: needed {needed} bytes but only {available} available")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    /// No trailer cookie anywhere in the input.
    #[error("missing cookie: unsupported PyInstaller version or not a PyInstaller archive")]
    CookieNotFound,

    /// Cookie fields are inconsistent with the input size.
    #[error("invalid archive header: {0}")]
    HeaderDecode(String),

    /// Table of contents cannot be decoded.
    #[error("malformed table of contents at offset {offset}: {reason}")]
    MalformedToc { offset: usize, reason: String },
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Convert a short read from the common reader into [`Error::Truncated`].
    pub(crate) fn truncated(what: &'static str, err: unfreeze_common::Error) -> Self {
        match err {
            unfreeze_common::Error::UnexpectedEof { needed, available } => Error::Truncated {
                what,
                needed,
                available,
            },
            other => Error::Common(other),
        }
    }
}
