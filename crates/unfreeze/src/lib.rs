//! Unfreeze - PyInstaller executable unpacking library.
//!
//! This crate provides a unified interface to the Unfreeze crates for
//! recovering Python modules from PyInstaller-built executables.
//!
//! # Crates
//!
//! - [`unfreeze_common`] - Common utilities (binary reading, trailer search)
//! - [`unfreeze_marshal`] - Python `marshal` decoding
//! - [`unfreeze_archive`] - CArchive and PYZ extraction with `.pyc` rebuilding
//!
//! # Example
//!
//! ```no_run
//! use unfreeze::prelude::*;
//!
//! let data = std::fs::read("app.exe")?;
//! let archive = CArchive::parse(&data)?;
//! println!("Python {}", archive.header().runtime);
//!
//! let extraction = archive.extract();
//! if let Some(main) = extraction.get("main.pyc") {
//!     println!("Entry point: {} bytes", main.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use unfreeze_archive as archive;
pub use unfreeze_common as common;
pub use unfreeze_marshal as marshal;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use unfreeze_archive::{
        extract, CArchive, Diagnostic, EntryKind, Extraction, PycMagic, RuntimeVersion, TocEntry,
    };
    pub use unfreeze_common::BinaryReader;
    pub use unfreeze_marshal::{Object, Unmarshaler};
}

// Re-export commonly used items at the crate root
pub use unfreeze_archive::{extract, Extraction};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
