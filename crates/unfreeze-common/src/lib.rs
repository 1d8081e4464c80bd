//! Common utilities for unfreeze.
//!
//! This crate provides the foundational types shared by the unfreeze crates:
//!
//! - [`BinaryReader`] - Bounded binary reading from byte slices, in both byte orders
//! - [`rfind_bounded`] - Backward windowed search for trailer signatures

mod error;
mod reader;
mod search;

pub use error::{Error, Result};
pub use reader::BinaryReader;
pub use search::rfind_bounded;

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Re-export memchr for SIMD-accelerated byte searching
pub use memchr;
