//! CArchive reader and the extraction pipeline.

use std::collections::BTreeMap;

use crate::context::ArchiveContext;
use crate::cookie::find_cookie;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::extract::extract_entries;
use crate::fixup::apply_fixups;
use crate::header::{ArchiveHeader, FormatVersion, RuntimeVersion};
use crate::magic::PycMagic;
use crate::toc::{parse_toc, TocEntry};
use crate::Result;

/// A parsed CArchive borrowing the executable's bytes.
#[derive(Debug)]
pub struct CArchive<'a> {
    data: &'a [u8],
    header: ArchiveHeader,
    entries: Vec<TocEntry>,
    diagnostics: Diagnostics,
}

impl<'a> CArchive<'a> {
    /// Locate the cookie and decode the header and table of contents.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let cookie_position = find_cookie(data)?;
        tracing::debug!("Found cookie at offset {cookie_position:#x}");

        let header = ArchiveHeader::decode(data, cookie_position)?;
        let mut diagnostics = Diagnostics::default();
        let entries = parse_toc(data, &header.layout, &mut diagnostics)?;

        Ok(Self {
            data,
            header,
            entries,
            diagnostics,
        })
    }

    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// Records of the table of contents, in archive order.
    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    /// Problems found while parsing the table of contents.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.diagnostics.as_slice()
    }

    /// Extract every entry and decode nested PYZ archives.
    pub fn extract(&self) -> Extraction {
        let mut ctx = ArchiveContext::new(self.header.runtime, self.diagnostics.clone());
        extract_entries(&mut ctx, self.data, &self.header.layout, &self.entries);
        apply_fixups(&mut ctx);

        Extraction {
            files: ctx.files,
            diagnostics: ctx.diagnostics.into_vec(),
            magic: ctx.magic.get(),
            runtime: self.header.runtime,
            format: self.header.format,
        }
    }
}

/// Everything recovered from one archive.
#[derive(Debug, Clone)]
pub struct Extraction {
    files: BTreeMap<String, Vec<u8>>,
    diagnostics: Vec<Diagnostic>,
    magic: Option<PycMagic>,
    runtime: RuntimeVersion,
    format: FormatVersion,
}

impl Extraction {
    /// Extracted files keyed by `/`-separated path.
    pub fn files(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.files
    }

    pub fn into_files(self) -> BTreeMap<String, Vec<u8>> {
        self.files
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Recoverable problems, in the order they occurred.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The `.pyc` magic written into synthesized headers, if one was found.
    pub fn magic(&self) -> Option<PycMagic> {
        self.magic
    }

    pub fn runtime(&self) -> RuntimeVersion {
        self.runtime
    }

    pub fn format(&self) -> FormatVersion {
        self.format
    }
}

/// Parse and extract a PyInstaller executable in one step.
///
/// # Errors
///
/// Only when the archive itself is unreadable (no cookie, inconsistent
/// header, malformed table of contents). Per-entry problems are reported
/// through [`Extraction::diagnostics`].
pub fn extract(data: &[u8]) -> Result<Extraction> {
    Ok(CArchive::parse(data)?.extract())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{pyz_archive, zlib, ArchiveBuilder, PyzModule, PY38_MAGIC};
    use crate::Error;

    #[test]
    fn test_minimal_entry_point() {
        let data = ArchiveBuilder::new(37).v1().entry("main", b's', b"\xe3abc").build();

        let extraction = extract(&data).unwrap();

        assert_eq!(extraction.format(), FormatVersion::V20);
        assert_eq!(extraction.runtime(), RuntimeVersion::new(3, 7));
        assert_eq!(extraction.len(), 1);
        let image = extraction.get("main.pyc").unwrap();
        assert_eq!(image.len(), 4 + 12 + 4);
        assert_eq!(&image[16..], b"\xe3abc");
        // No magic anywhere in this archive.
        assert_eq!(extraction.magic(), None);
        assert!(matches!(
            extraction.diagnostics(),
            [Diagnostic::MagicNeverDiscovered { pending: 1 }]
        ));
    }

    #[test]
    fn test_corrupt_entry_does_not_stop_extraction() {
        let data = ArchiveBuilder::new(38)
            .compressed("first.txt", b'x', b"first")
            .raw_entry("broken.bin", b'b', &zlib(b"0123456789abcdef")[..6], 16, 1)
            .compressed("after.txt", b'x', b"after")
            .entry("lib.so", b'b', b"\x7fELF")
            .build();

        let extraction = extract(&data).unwrap();

        assert_eq!(extraction.get("first.txt"), Some(&b"first"[..]));
        assert_eq!(
            extraction.get("broken.bin"),
            Some(&zlib(b"0123456789abcdef")[..6])
        );
        assert_eq!(extraction.get("after.txt"), Some(&b"after"[..]));
        assert_eq!(extraction.get("lib.so"), Some(&b"\x7fELF"[..]));
        assert!(matches!(
            extraction.diagnostics(),
            [Diagnostic::EntryDecompressFailure { name, .. }] if name == "broken.bin"
        ));
    }

    #[test]
    fn test_full_pipeline_with_pyz() {
        let pyz = pyz_archive(
            PY38_MAGIC,
            &[
                PyzModule::new("app", true, b"\xe3init"),
                PyzModule::new("app.util", false, b"\xe3util"),
            ],
        );
        let data = ArchiveBuilder::new(38)
            .trailer(b"code signature")
            .compressed("struct", b'm', b"\xe3struct")
            .compressed("main", b's', b"\xe3main")
            .entry("PYZ-00.pyz", b'z', &pyz)
            .entry("python38.dll", b'b', b"MZ")
            .entry("base_library.zip", b'x', b"PK\x05\x06")
            .entry("pyi-runtime-tmpdir", b'o', b"")
            .build();

        let archive = CArchive::parse(&data).unwrap();
        assert_eq!(archive.header().format, FormatVersion::V21);
        assert_eq!(archive.header().python_library.as_deref(), Some("python38.dll"));
        assert_eq!(archive.entries().len(), 6);

        let extraction = archive.extract();
        assert!(extraction.diagnostics().is_empty(), "{:?}", extraction.diagnostics());
        assert_eq!(extraction.magic(), Some(PycMagic(PY38_MAGIC)));

        let mut keys: Vec<&str> = extraction.files().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "PYZ-00.pyz",
                "app/__init__.pyc",
                "app/util.pyc",
                "base_library.zip",
                "main.pyc",
                "python38.dll",
                "struct.pyc",
            ]
        );

        // Written before the PYZ magic was known, patched afterwards.
        for key in ["struct.pyc", "main.pyc", "app/util.pyc"] {
            assert_eq!(&extraction.get(key).unwrap()[..4], &PY38_MAGIC, "{key}");
        }
        assert_eq!(extraction.get("PYZ-00.pyz"), Some(&pyz[..]));
    }

    #[test]
    fn test_legacy_header_module_provides_magic() {
        let mut legacy = PY38_MAGIC.to_vec();
        legacy.extend_from_slice(&[0; 12]);
        legacy.extend_from_slice(b"\xe3mod");

        let data = ArchiveBuilder::new(38)
            .stub(b"MZ\x90\0 windows bootloader")
            .entry("main", b's', b"\xe3main")
            .entry("mod", b'm', &legacy)
            .build();

        let extraction = extract(&data).unwrap();
        assert!(extraction.diagnostics().is_empty());
        assert_eq!(extraction.get("mod.pyc"), Some(&legacy[..]));
        assert_eq!(&extraction.get("main.pyc").unwrap()[..4], &PY38_MAGIC);
    }

    #[test]
    fn test_fatal_errors() {
        assert!(matches!(
            extract(&[0u8; 4096]),
            Err(Error::CookieNotFound)
        ));

        // Cookie claims a package larger than the file.
        let mut data = vec![0u8; 64];
        data.extend(crate::testutil::cookie_v1(10_000, 0, 0, 38));
        assert!(matches!(extract(&data), Err(Error::HeaderDecode(_))));
    }
}
