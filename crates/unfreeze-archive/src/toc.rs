//! CArchive table of contents.

use rand::distr::{Alphanumeric, SampleString};
use unfreeze_common::BinaryReader;

use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::header::ArchiveLayout;
use crate::{Error, Result};

/// Size of the fixed part of a TOC record, before the name.
pub const TOC_ENTRY_PREFIX_SIZE: usize = 18;

/// Kind of a TOC record, from its ASCII type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// `b`: shared library or other binary.
    Binary,
    /// `d`: runtime dependency reference, not a file.
    Dependency,
    /// `x`: data file.
    Data,
    /// `z`: PYZ archive.
    Pyz,
    /// `Z`: zip archive.
    ZipFile,
    /// `M`: package `__init__` module.
    PyPackage,
    /// `m`: plain module.
    PyModule,
    /// `s`: entry point script, stored as a bare code object.
    PySource,
    /// `o`: interpreter option, not a file.
    RuntimeOption,
    /// `n`: splash screen resources.
    Splash,
    /// `l`: symbolic link.
    Symlink,
    /// Any other type code.
    Unknown(u8),
}

impl EntryKind {
    /// Classify a type code.
    pub const fn from_code(code: u8) -> Self {
        match code {
            b'b' => EntryKind::Binary,
            b'd' => EntryKind::Dependency,
            b'x' => EntryKind::Data,
            b'z' => EntryKind::Pyz,
            b'Z' => EntryKind::ZipFile,
            b'M' => EntryKind::PyPackage,
            b'm' => EntryKind::PyModule,
            b's' => EntryKind::PySource,
            b'o' => EntryKind::RuntimeOption,
            b'n' => EntryKind::Splash,
            b'l' => EntryKind::Symlink,
            other => EntryKind::Unknown(other),
        }
    }

    /// The type code as stored in the archive.
    pub const fn code(self) -> u8 {
        match self {
            EntryKind::Binary => b'b',
            EntryKind::Dependency => b'd',
            EntryKind::Data => b'x',
            EntryKind::Pyz => b'z',
            EntryKind::ZipFile => b'Z',
            EntryKind::PyPackage => b'M',
            EntryKind::PyModule => b'm',
            EntryKind::PySource => b's',
            EntryKind::RuntimeOption => b'o',
            EntryKind::Splash => b'n',
            EntryKind::Symlink => b'l',
            EntryKind::Unknown(code) => code,
        }
    }

    /// Records that describe runtime configuration rather than files.
    pub const fn is_metadata(self) -> bool {
        matches!(self, EntryKind::Dependency | EntryKind::RuntimeOption)
    }
}

/// One record of the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// Record size including the name.
    pub entry_size: u32,
    /// Data offset relative to the overlay.
    pub data_position: u32,
    /// Stored (possibly compressed) size.
    pub data_size: u32,
    /// Size after decompression.
    pub uncompressed_size: u32,
    /// 1 when the data is zlib-compressed.
    pub compression_flag: u8,
    pub kind: EntryKind,
    pub name: String,
}

impl TocEntry {
    /// Whether the stored data is zlib-compressed.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.compression_flag == 1
    }
}

/// Decode every record of the table of contents.
///
/// Only bytes inside `[toc_position, toc_position + toc_size)` are read.
/// Records without a name get a random placeholder name.
pub(crate) fn parse_toc(
    data: &[u8],
    layout: &ArchiveLayout,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<TocEntry>> {
    let toc = &data[layout.toc_position..layout.toc_position + layout.toc_size];
    let mut reader = BinaryReader::new(toc);
    let mut entries = Vec::new();

    while !reader.is_empty() {
        let offset = layout.toc_position + reader.position();
        let malformed = |reason: String| Error::MalformedToc { offset, reason };

        let prefix = reader
            .read_bytes(TOC_ENTRY_PREFIX_SIZE)
            .map_err(|e| malformed(e.to_string()))?;
        let mut fields = BinaryReader::new(prefix);
        let entry_size = fields.read_u32()?;
        let data_position = fields.read_u32()?;
        let data_size = fields.read_u32()?;
        let uncompressed_size = fields.read_u32()?;
        let compression_flag = fields.read_u8()?;
        let type_code = fields.read_u8()?;

        let name_len = (entry_size as usize)
            .checked_sub(TOC_ENTRY_PREFIX_SIZE)
            .ok_or_else(|| malformed(format!("record size {entry_size} is smaller than its header")))?;
        let name_bytes = reader.read_bytes(name_len).map_err(|_| {
            malformed(format!(
                "record of {entry_size} bytes overruns the table of contents ({} bytes)",
                layout.toc_size
            ))
        })?;

        let name = decode_name(name_bytes).unwrap_or_else(|| {
            let placeholder = placeholder_name();
            diagnostics.push(Diagnostic::UnnamedEntry {
                placeholder: placeholder.clone(),
            });
            placeholder
        });

        entries.push(TocEntry {
            entry_size,
            data_position,
            data_size,
            uncompressed_size,
            compression_flag,
            kind: EntryKind::from_code(type_code),
            name,
        });
    }

    tracing::info!("Found {} files in CArchive", entries.len());
    Ok(entries)
}

/// Name with trailing NUL padding removed, or `None` if nothing is left.
fn decode_name(bytes: &[u8]) -> Option<String> {
    let end = bytes.iter().rposition(|&b| b != 0)? + 1;
    Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

fn placeholder_name() -> String {
    format!(
        "unnamed_{}",
        Alphanumeric.sample_string(&mut rand::rng(), 12)
    )
}
