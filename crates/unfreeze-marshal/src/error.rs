//! Error types for marshal decoding.

use thiserror::Error;

/// Errors that can occur when decoding marshal data.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error (short read).
    #[error("{0}")]
    Common(#[from] unfreeze_common::Error),

    /// Type code this decoder does not handle.
    #[error("unsupported marshal type {code:?} at offset {offset}")]
    UnsupportedType { code: char, offset: usize },

    /// Back reference to an object that does not exist (yet).
    #[error("invalid back reference {index} (only {available} objects recorded)")]
    InvalidReference { index: u32, available: usize },

    /// Integer does not fit in an i64.
    #[error("integer with {digits} digits does not fit in 64 bits")]
    IntegerOverflow { digits: i32 },

    /// Negative length or count field.
    #[error("negative length {0}")]
    NegativeLength(i32),

    /// Nesting deeper than the decoder allows.
    #[error("object nesting exceeds {0} levels")]
    TooDeep(usize),

    /// Back references expand to more objects than the decoder allows.
    #[error("object graph expands past {0} objects")]
    TooManyObjects(usize),

    /// Float stored as text that does not parse.
    #[error("invalid float literal {0:?}")]
    InvalidFloat(String),
}

/// Result type for marshal decoding.
pub type Result<T> = std::result::Result<T, Error>;
