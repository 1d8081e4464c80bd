//! Builders for synthetic archives used by the unit tests.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::cookie::COOKIE_MAGIC;
use crate::toc::TOC_ENTRY_PREFIX_SIZE;

pub(crate) const PY38_MAGIC: [u8; 4] = *b"\x55\x0d\x0d\x0a";

pub(crate) fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub(crate) fn cookie_v1(package_length: u32, toc_offset: u32, toc_length: i32, version: i32) -> Vec<u8> {
    let mut cookie = COOKIE_MAGIC.to_vec();
    cookie.extend_from_slice(&package_length.to_le_bytes());
    cookie.extend_from_slice(&toc_offset.to_le_bytes());
    cookie.extend_from_slice(&toc_length.to_le_bytes());
    cookie.extend_from_slice(&version.to_le_bytes());
    cookie
}

pub(crate) fn cookie_v2(
    package_length: u32,
    toc_offset: u32,
    toc_length: i32,
    version: i32,
    library: &str,
) -> Vec<u8> {
    let mut cookie = cookie_v1(package_length, toc_offset, toc_length, version);
    let mut name = [0u8; 64];
    name[..library.len()].copy_from_slice(library.as_bytes());
    cookie.extend_from_slice(&name);
    cookie
}

/// One TOC record, name NUL-padded to a 16-byte boundary.
pub(crate) fn toc_record(
    name: &str,
    position: u32,
    size: u32,
    uncompressed_size: u32,
    flag: u8,
    kind: u8,
) -> Vec<u8> {
    let unpadded = TOC_ENTRY_PREFIX_SIZE + name.len() + 1;
    let entry_size = unpadded.div_ceil(16) * 16;

    let mut record = Vec::with_capacity(entry_size);
    record.extend_from_slice(&(entry_size as u32).to_le_bytes());
    record.extend_from_slice(&position.to_le_bytes());
    record.extend_from_slice(&size.to_le_bytes());
    record.extend_from_slice(&uncompressed_size.to_le_bytes());
    record.push(flag);
    record.push(kind);
    record.extend_from_slice(name.as_bytes());
    record.resize(entry_size, 0);
    record
}

struct BuilderEntry {
    name: String,
    kind: u8,
    stored: Vec<u8>,
    uncompressed_size: u32,
    flag: u8,
}

/// Assembles `stub | package | toc | cookie | trailer`.
pub(crate) struct ArchiveBuilder {
    version: i32,
    library: Option<String>,
    stub: Vec<u8>,
    trailer: Vec<u8>,
    entries: Vec<BuilderEntry>,
}

impl ArchiveBuilder {
    /// 2.1+ layout for the given packed Python version.
    pub(crate) fn new(version: i32) -> Self {
        Self {
            version,
            library: Some(format!("python{version}.dll")),
            stub: b"\x7fELF bootloader stub".to_vec(),
            trailer: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Switch to the 2.0 cookie layout.
    pub(crate) fn v1(mut self) -> Self {
        self.library = None;
        self
    }

    pub(crate) fn stub(mut self, stub: &[u8]) -> Self {
        self.stub = stub.to_vec();
        self
    }

    pub(crate) fn trailer(mut self, trailer: &[u8]) -> Self {
        self.trailer = trailer.to_vec();
        self
    }

    /// Uncompressed entry.
    pub(crate) fn entry(self, name: &str, kind: u8, data: &[u8]) -> Self {
        let size = data.len() as u32;
        self.raw_entry(name, kind, data, size, 0)
    }

    /// zlib-compressed entry.
    pub(crate) fn compressed(self, name: &str, kind: u8, data: &[u8]) -> Self {
        let size = data.len() as u32;
        self.raw_entry(name, kind, &zlib(data), size, 1)
    }

    /// Entry with explicit stored bytes, declared size and flag.
    pub(crate) fn raw_entry(
        mut self,
        name: &str,
        kind: u8,
        stored: &[u8],
        uncompressed_size: u32,
        flag: u8,
    ) -> Self {
        self.entries.push(BuilderEntry {
            name: name.to_string(),
            kind,
            stored: stored.to_vec(),
            uncompressed_size,
            flag,
        });
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let mut package = Vec::new();
        let mut toc = Vec::new();
        for entry in &self.entries {
            toc.extend(toc_record(
                &entry.name,
                package.len() as u32,
                entry.stored.len() as u32,
                entry.uncompressed_size,
                entry.flag,
                entry.kind,
            ));
            package.extend_from_slice(&entry.stored);
        }

        let toc_offset = package.len() as u32;
        let cookie_size = if self.library.is_some() { 88 } else { 24 };
        let package_length = (package.len() + toc.len() + cookie_size) as u32;
        let cookie = match &self.library {
            Some(library) => cookie_v2(package_length, toc_offset, toc.len() as i32, self.version, library),
            None => cookie_v1(package_length, toc_offset, toc.len() as i32, self.version),
        };

        let mut out = self.stub;
        out.extend(package);
        out.extend(toc);
        out.extend(cookie);
        out.extend(self.trailer);
        out
    }
}

/// Minimal marshal writer for PYZ indexes.
pub(crate) mod marshal {
    pub(crate) fn str(value: &str) -> Vec<u8> {
        let mut out = vec![b'z', value.len() as u8];
        out.extend_from_slice(value.as_bytes());
        out
    }

    pub(crate) fn int(value: i32) -> Vec<u8> {
        let mut out = vec![b'i'];
        out.extend_from_slice(&value.to_le_bytes());
        out
    }

    pub(crate) fn tuple(items: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![b')', items.len() as u8];
        items.iter().for_each(|item| out.extend_from_slice(item));
        out
    }

    pub(crate) fn list(items: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![b'['];
        out.extend_from_slice(&(items.len() as u32).to_le_bytes());
        items.iter().for_each(|item| out.extend_from_slice(item));
        out
    }

    pub(crate) fn dict(pairs: &[(Vec<u8>, Vec<u8>)]) -> Vec<u8> {
        let mut out = vec![b'{'];
        for (key, value) in pairs {
            out.extend_from_slice(key);
            out.extend_from_slice(value);
        }
        out.push(b'0');
        out
    }

    /// `(name, (ispkg, pos, len))`
    pub(crate) fn index_entry(name: &str, is_package: bool, position: usize, length: usize) -> Vec<u8> {
        tuple(&[
            str(name),
            tuple(&[int(is_package as i32), int(position as i32), int(length as i32)]),
        ])
    }
}

/// A PYZ module: dotted name, package flag, and stored (compressed) bytes.
pub(crate) struct PyzModule<'a> {
    pub name: &'a str,
    pub is_package: bool,
    pub stored: Vec<u8>,
}

impl<'a> PyzModule<'a> {
    pub(crate) fn new(name: &'a str, is_package: bool, code: &[u8]) -> Self {
        Self {
            name,
            is_package,
            stored: zlib(code),
        }
    }

    pub(crate) fn raw(name: &'a str, is_package: bool, stored: &[u8]) -> Self {
        Self {
            name,
            is_package,
            stored: stored.to_vec(),
        }
    }
}

/// `PYZ\0 | magic | index offset (BE) | modules | marshalled list index`.
pub(crate) fn pyz_archive(magic: [u8; 4], modules: &[PyzModule<'_>]) -> Vec<u8> {
    let (mut out, entries) = pyz_body(magic, modules);
    let index = marshal::list(&entries);
    finish_pyz(&mut out, &index);
    out
}

/// Same as [`pyz_archive`] with a dict-shaped index.
pub(crate) fn pyz_archive_dict(magic: [u8; 4], modules: &[PyzModule<'_>]) -> Vec<u8> {
    let mut out = pyz_header(magic);
    let mut pairs = Vec::new();
    for module in modules {
        pairs.push((
            marshal::str(module.name),
            marshal::tuple(&[
                marshal::int(module.is_package as i32),
                marshal::int(out.len() as i32),
                marshal::int(module.stored.len() as i32),
            ]),
        ));
        out.extend_from_slice(&module.stored);
    }
    let index = marshal::dict(&pairs);
    finish_pyz(&mut out, &index);
    out
}

fn pyz_header(magic: [u8; 4]) -> Vec<u8> {
    let mut out = b"PYZ\0".to_vec();
    out.extend_from_slice(&magic);
    out.extend_from_slice(&[0; 4]);
    out
}

fn pyz_body(magic: [u8; 4], modules: &[PyzModule<'_>]) -> (Vec<u8>, Vec<Vec<u8>>) {
    let mut out = pyz_header(magic);
    let mut entries = Vec::new();
    for module in modules {
        entries.push(marshal::index_entry(
            module.name,
            module.is_package,
            out.len(),
            module.stored.len(),
        ));
        out.extend_from_slice(&module.stored);
    }
    (out, entries)
}

fn finish_pyz(out: &mut Vec<u8>, index: &[u8]) {
    let offset = out.len() as u32;
    out[8..12].copy_from_slice(&offset.to_be_bytes());
    out.extend_from_slice(index);
}
