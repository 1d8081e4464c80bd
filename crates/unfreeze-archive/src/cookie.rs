//! CArchive trailer cookie.
//!
//! The cookie sits near the end of the executable (a code signature or other
//! trailing data may follow it). Two layouts exist: PyInstaller 2.0 writes the
//! 24-byte [`CookieV1`], 2.1 and later append the Python library name to form
//! the 88-byte [`CookieV2`].

use unfreeze_common::rfind_bounded;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result};

/// Magic bytes at the start of the cookie.
pub const COOKIE_MAGIC: [u8; 8] = *b"MEI\x0c\x0b\x0a\x0b\x0e";

/// Size of each backward search window.
const SEARCH_CHUNK_SIZE: usize = 8192;

/// PyInstaller 2.0 cookie.
///
/// Fields are stored little-endian on disk; use the accessors to read them.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct CookieV1 {
    /// [`COOKIE_MAGIC`].
    pub magic: [u8; 8],
    /// Length of the whole package, cookie included.
    pub package_length: u32,
    /// TOC offset relative to the start of the package.
    pub toc_offset: u32,
    /// TOC length in bytes.
    pub toc_length: i32,
    /// Python version packed as `major * 10 + minor` or `major * 100 + minor`.
    pub python_version: i32,
}

impl CookieV1 {
    /// On-disk size of the cookie.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Package length.
    pub fn package_length(&self) -> u32 {
        u32::from_le(self.package_length)
    }

    /// TOC offset relative to the overlay.
    pub fn toc_offset(&self) -> u32 {
        u32::from_le(self.toc_offset)
    }

    /// TOC length.
    pub fn toc_length(&self) -> i32 {
        i32::from_le(self.toc_length)
    }

    /// Packed Python version.
    pub fn python_version(&self) -> i32 {
        i32::from_le(self.python_version)
    }
}

/// PyInstaller 2.1+ cookie.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct CookieV2 {
    /// The 2.0 fields.
    pub base: CookieV1,
    /// NUL-padded Python library name, e.g. `python38.dll`.
    pub python_lib_name: [u8; 64],
}

impl CookieV2 {
    /// On-disk size of the cookie.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Python library name with the NUL padding removed.
    pub fn python_lib_name(&self) -> String {
        let name = &self.python_lib_name;
        let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        String::from_utf8_lossy(&name[..end]).into_owned()
    }
}

/// Locate the cookie closest to the end of `data`.
///
/// # Errors
///
/// [`Error::Truncated`] if `data` is shorter than the magic,
/// [`Error::CookieNotFound`] if no magic is present.
pub fn find_cookie(data: &[u8]) -> Result<usize> {
    if data.len() < COOKIE_MAGIC.len() {
        return Err(Error::Truncated {
            what: "file",
            needed: COOKIE_MAGIC.len(),
            available: data.len(),
        });
    }

    rfind_bounded(data, &COOKIE_MAGIC, SEARCH_CHUNK_SIZE).ok_or(Error::CookieNotFound)
}
