//! Cookie decoding and archive geometry.

use std::fmt;

use unfreeze_common::{memchr::memmem, BinaryReader};

use crate::cookie::{CookieV1, CookieV2};
use crate::{Error, Result};

/// Bytes after the 2.0 cookie slot inspected for the Python library name.
const SCAN_LEN: usize = 64;

/// Cookie layout of the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    /// PyInstaller 2.0, [`CookieV1`].
    V20,
    /// PyInstaller 2.1 and later, [`CookieV2`].
    V21,
}

impl FormatVersion {
    /// Cookie size for this layout.
    pub const fn cookie_size(self) -> usize {
        match self {
            FormatVersion::V20 => CookieV1::SIZE,
            FormatVersion::V21 => CookieV2::SIZE,
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatVersion::V20 => f.write_str("2.0"),
            FormatVersion::V21 => f.write_str("2.1+"),
        }
    }
}

/// Python version the archive was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuntimeVersion {
    pub major: u32,
    pub minor: u32,
}

impl RuntimeVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Decode the packed version integer from the cookie.
    ///
    /// Three-digit values carry a two-digit minor (`310` is 3.10); smaller
    /// values carry a single-digit minor (`38` is 3.8).
    pub const fn from_packed(packed: u32) -> Self {
        if packed >= 100 {
            Self::new(packed / 100, packed % 100)
        } else {
            Self::new(packed / 10, packed % 10)
        }
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Absolute offsets derived from the cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLayout {
    /// Size of the whole input.
    pub file_size: usize,
    /// Offset of the cookie magic.
    pub cookie_position: usize,
    /// Size of the cookie layout in use.
    pub cookie_size: usize,
    /// Start of the appended package.
    pub overlay_position: usize,
    /// Package length plus any bytes trailing the cookie.
    pub overlay_size: usize,
    /// Absolute offset of the table of contents.
    pub toc_position: usize,
    /// Length of the table of contents.
    pub toc_size: usize,
}

impl ArchiveLayout {
    /// Derive the layout from cookie fields.
    ///
    /// Bytes after the cookie (for example a code signature) belong to the
    /// overlay, so the overlay is measured back from the end of the file.
    pub fn derive(
        file_size: usize,
        cookie_position: usize,
        cookie_size: usize,
        package_length: u32,
        toc_offset: u32,
        toc_length: i32,
    ) -> Result<Self> {
        let tail = file_size
            .checked_sub(cookie_position)
            .and_then(|n| n.checked_sub(cookie_size))
            .ok_or_else(|| Error::HeaderDecode("cookie extends past end of file".to_string()))?;

        let overlay_size = (package_length as usize)
            .checked_add(tail)
            .filter(|&size| size <= file_size)
            .ok_or_else(|| {
                Error::HeaderDecode(format!(
                    "package length {package_length} exceeds file size {file_size}"
                ))
            })?;
        let overlay_position = file_size - overlay_size;

        let toc_size = usize::try_from(toc_length)
            .map_err(|_| Error::HeaderDecode(format!("negative TOC length {toc_length}")))?;
        let toc_position = overlay_position
            .checked_add(toc_offset as usize)
            .filter(|&pos| {
                pos.checked_add(toc_size)
                    .map_or(false, |end| end <= file_size)
            })
            .ok_or_else(|| {
                Error::HeaderDecode(format!(
                    "TOC at overlay offset {toc_offset} with length {toc_size} lies outside the file"
                ))
            })?;

        Ok(Self {
            file_size,
            cookie_position,
            cookie_size,
            overlay_position,
            overlay_size,
            toc_position,
            toc_size,
        })
    }
}

/// Everything learned from the cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub format: FormatVersion,
    pub runtime: RuntimeVersion,
    /// Length of the package as recorded in the cookie.
    pub package_length: u32,
    /// Python library name (2.1+ only).
    pub python_library: Option<String>,
    pub layout: ArchiveLayout,
}

impl ArchiveHeader {
    /// Decode the cookie at `cookie_position`.
    pub fn decode(data: &[u8], cookie_position: usize) -> Result<Self> {
        let format = detect_format(data, cookie_position);

        let mut reader = BinaryReader::new_at(data, cookie_position)?;
        let (base, python_library) = match format {
            FormatVersion::V20 => {
                let cookie: CookieV1 = reader
                    .read_struct()
                    .map_err(|e| Error::truncated("cookie", e))?;
                (cookie, None)
            }
            FormatVersion::V21 => {
                let cookie: CookieV2 = reader
                    .read_struct()
                    .map_err(|e| Error::truncated("cookie", e))?;
                (cookie.base, Some(cookie.python_lib_name()))
            }
        };

        let packed = u32::try_from(base.python_version()).map_err(|_| {
            Error::HeaderDecode(format!("negative Python version {}", base.python_version()))
        })?;
        let runtime = RuntimeVersion::from_packed(packed);

        let layout = ArchiveLayout::derive(
            data.len(),
            cookie_position,
            format.cookie_size(),
            base.package_length(),
            base.toc_offset(),
            base.toc_length(),
        )?;

        tracing::info!("PyInstaller version: {format}");
        if let Some(library) = &python_library {
            tracing::info!("Python library file: {library}");
        }
        tracing::info!("Python version: {runtime}");
        tracing::info!("Length of package: {} bytes", base.package_length());

        Ok(Self {
            format,
            runtime,
            package_length: base.package_length(),
            python_library,
            layout,
        })
    }
}

/// The 2.1+ cookie carries the Python library name right after the 2.0
/// fields; a 2.0 cookie has arbitrary (usually TOC) bytes there instead.
fn detect_format(data: &[u8], cookie_position: usize) -> FormatVersion {
    let scan_start = cookie_position.saturating_add(CookieV1::SIZE).min(data.len());
    let scan_end = scan_start.saturating_add(SCAN_LEN).min(data.len());
    let window = data[scan_start..scan_end].to_ascii_lowercase();

    if memmem::find(&window, b"python").is_some() {
        FormatVersion::V21
    } else {
        FormatVersion::V20
    }
}
