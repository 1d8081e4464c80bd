//! PyInstaller archive reader.
//!
//! A PyInstaller executable is a native bootloader with a "CArchive" appended
//! to it. The archive ends with a cookie that locates a table of contents;
//! each TOC record describes one packed item (compiled modules, the entry
//! point script, shared libraries, data files, and one or more PYZ archives
//! that hold the bulk of the pure-Python modules).
//!
//! This crate recovers every packed item and rebuilds compiled modules into
//! loadable `.pyc` files:
//!
//! - Trailer cookie search and both cookie layouts (PyInstaller 2.0 and 2.1+)
//! - zlib-compressed TOC entries
//! - PYZ archives indexed by a marshalled Python object (Python 3 only)
//! - `.pyc` header synthesis for the running Python version, with the magic
//!   number patched in once it has been discovered
//!
//! Per-entry problems (corrupt compression, encrypted modules, malformed
//! PYZ indexes) never abort extraction; they are recorded as
//! [`Diagnostic`]s on the result.
//!
//! # Example
//!
//! ```no_run
//! let data = std::fs::read("app.exe")?;
//! let extraction = unfreeze_archive::extract(&data)?;
//!
//! for (path, bytes) in extraction.files() {
//!     println!("{path}: {} bytes", bytes.len());
//! }
//! for problem in extraction.diagnostics() {
//!     eprintln!("warning: {problem}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod archive;
mod context;
mod cookie;
mod decompress;
mod diagnostic;
mod error;
mod extract;
mod fixup;
mod header;
mod magic;
mod parallel;
mod pyc;
mod pyz;
mod toc;

#[cfg(test)]
mod testutil;

pub use archive::{extract, CArchive, Extraction};
pub use cookie::{find_cookie, CookieV1, CookieV2, COOKIE_MAGIC};
pub use decompress::{inflate, InflateError};
pub use diagnostic::Diagnostic;
pub use error::{Error, Result};
pub use header::{ArchiveHeader, ArchiveLayout, FormatVersion, RuntimeVersion};
pub use magic::{MagicCell, MagicSource, PycMagic};
pub use pyc::{has_legacy_header, header_padding_len, synthesize_pyc, PYC_SUFFIX};
pub use pyz::{module_path, parse_index, IndexError, PyzEntry, PYZ_MAGIC, PYZ_SUFFIX};
pub use toc::{EntryKind, TocEntry, TOC_ENTRY_PREFIX_SIZE};
