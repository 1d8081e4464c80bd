//! PYZ archives: zlib-compressed modules behind a marshalled index.
//!
//! ```text
//! +--------+----------+-------------------+----------------+---------+
//! | "PYZ\0" | magic[4] | index offset (BE) | module data ... | index   |
//! +--------+----------+-------------------+----------------+---------+
//! ```
//!
//! The index is a marshalled list of `(name, (ispkg, position, length))`
//! tuples. Newer PyInstaller releases write a dict keyed by name instead.

use thiserror::Error;
use unfreeze_common::BinaryReader;
use unfreeze_marshal::{Object, Unmarshaler};

use crate::context::ArchiveContext;
use crate::decompress::inflate;
use crate::diagnostic::Diagnostic;
use crate::magic::{MagicSource, PycMagic};
use crate::parallel::map_ordered;
use crate::pyc::PYC_SUFFIX;

/// Tag at the start of every PYZ archive.
pub const PYZ_MAGIC: [u8; 4] = *b"PYZ\0";

/// Name suffix of PYZ archives inside a CArchive.
pub const PYZ_SUFFIX: &str = ".pyz";

/// Suffix appended to modules that could not be inflated.
const ENCRYPTED_SUFFIX: &str = ".encrypted";

/// One module listed in a PYZ index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyzEntry {
    /// Dotted module name.
    pub name: String,
    pub is_package: bool,
    /// Offset of the compressed module from the start of the PYZ archive.
    pub position: usize,
    pub length: usize,
}

/// Why a PYZ index could not be read.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid header: {0}")]
    Header(#[from] unfreeze_common::Error),

    #[error("marshal: {0}")]
    Marshal(#[from] unfreeze_marshal::Error),

    #[error("unexpected index shape: {0}")]
    Shape(String),
}

#[derive(Debug)]
struct PyzHeader {
    magic: PycMagic,
    index_offset: usize,
}

impl PyzHeader {
    fn read(data: &[u8]) -> Result<Self, IndexError> {
        let mut reader = BinaryReader::new(data);
        reader.expect_magic(&PYZ_MAGIC)?;
        let magic = PycMagic(reader.read_array()?);
        let index_offset = reader.read_u32_be()? as usize;
        Ok(Self {
            magic,
            index_offset,
        })
    }
}

/// Turn a decoded index object into entries.
///
/// Accepts a list or tuple of `(name, (ispkg, position, length))` pairs, or
/// a dict mapping names to `(ispkg, position, length)`.
pub fn parse_index(root: &Object) -> Result<Vec<PyzEntry>, IndexError> {
    match root {
        Object::List(items) | Object::Tuple(items) => items
            .iter()
            .map(|item| match item.as_sequence() {
                Some([name, value]) => parse_entry(name, value),
                _ => Err(IndexError::Shape(format!(
                    "expected a (name, info) pair, found {}",
                    item.type_name()
                ))),
            })
            .collect(),
        Object::Dict(pairs) => pairs
            .iter()
            .map(|(name, value)| parse_entry(name, value))
            .collect(),
        other => Err(IndexError::Shape(format!(
            "expected a list or dict, found {}",
            other.type_name()
        ))),
    }
}

fn parse_entry(name: &Object, value: &Object) -> Result<PyzEntry, IndexError> {
    let name = name
        .as_str()
        .ok_or_else(|| IndexError::Shape(format!("module name is a {}", name.type_name())))?;

    let [kind, position, length] = value.as_sequence().unwrap_or_default() else {
        return Err(IndexError::Shape(format!(
            "expected (ispkg, position, length) for {name}"
        )));
    };

    let field = |object: &Object, what: &str| -> Result<usize, IndexError> {
        object
            .as_int()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| IndexError::Shape(format!("invalid {what} for {name}")))
    };

    Ok(PyzEntry {
        name: name.to_string(),
        is_package: kind.as_int() == Some(1),
        position: field(position, "position")?,
        length: field(length, "length")?,
    })
}

/// Output path for a dotted module name.
///
/// `..` becomes `__` before dots become separators, so no component can
/// climb out of the output root.
pub fn module_path(name: &str, is_package: bool) -> String {
    let path = name.replace("..", "__").replace('.', "/");
    if is_package {
        format!("{path}/__init__{PYC_SUFFIX}")
    } else {
        format!("{path}{PYC_SUFFIX}")
    }
}

fn load_index(data: &[u8], offset: usize) -> Result<Vec<PyzEntry>, IndexError> {
    let root = Unmarshaler::new_at(data, offset)?.load()?;
    parse_index(&root)
}

/// Inflated module code, or the (clamped) stored bytes on failure.
fn inflate_module(data: &[u8], entry: &PyzEntry) -> Result<Vec<u8>, Vec<u8>> {
    let start = entry.position.min(data.len());
    let end = entry.position.saturating_add(entry.length).min(data.len());
    let stored = &data[start..end];

    if end - start < entry.length {
        return Err(stored.to_vec());
    }
    inflate(stored, entry.length.saturating_mul(2)).map_err(|e| {
        tracing::debug!("Inflating {} failed: {e}", entry.name);
        stored.to_vec()
    })
}

/// Decode the PYZ archive stored as `archive` into `ctx`.
///
/// Problems are reported as diagnostics; a broken index skips the whole
/// archive, a broken module skips only that module.
pub(crate) fn extract_pyz(ctx: &mut ArchiveContext, archive: &str, data: &[u8]) {
    if ctx.runtime.major != 3 {
        ctx.warn(Diagnostic::UnsupportedRuntimeMajorVersion {
            archive: archive.to_string(),
            version: ctx.runtime,
        });
        return;
    }

    let index_failure = |e: IndexError| Diagnostic::IndexDecodeFailure {
        archive: archive.to_string(),
        reason: e.to_string(),
    };

    let header = match PyzHeader::read(data) {
        Ok(header) => header,
        Err(e) => return ctx.warn(index_failure(e)),
    };

    let source = MagicSource::NestedIndex {
        archive: archive.to_string(),
    };
    if let Some(previous) = ctx.magic.overwrite(header.magic, source) {
        ctx.warn(Diagnostic::MagicMismatch {
            archive: archive.to_string(),
            previous,
            found: header.magic,
        });
    }
    tracing::info!("Found pyc magic {} in {archive}", header.magic);

    let entries = match load_index(data, header.index_offset) {
        Ok(entries) => entries,
        Err(e) => return ctx.warn(index_failure(e)),
    };
    tracing::info!("Found {} files in PYZ archive", entries.len());

    let modules = map_ordered(&entries, |entry| inflate_module(data, entry));
    for (entry, module) in entries.iter().zip(modules) {
        let path = module_path(&entry.name, entry.is_package);
        match module {
            Ok(code) => {
                tracing::debug!("Extracted {path}");
                ctx.write_code_image(path, &code);
            }
            Err(stored) => {
                let path = format!("{path}{ENCRYPTED_SUFFIX}");
                ctx.warn(Diagnostic::EncryptedOrCorruptModule { path: path.clone() });
                ctx.insert(path, stored);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Diagnostics;
    use crate::header::RuntimeVersion;
    use crate::testutil::{marshal, pyz_archive, pyz_archive_dict, PyzModule, PY38_MAGIC};

    fn context(major: u32, minor: u32) -> ArchiveContext {
        ArchiveContext::new(RuntimeVersion::new(major, minor), Diagnostics::default())
    }

    #[test]
    fn test_module_path() {
        assert_eq!(module_path("a.b.c", true), "a/b/c/__init__.pyc");
        assert_eq!(module_path("a.b.c", false), "a/b/c.pyc");
        assert_eq!(module_path("os", false), "os.pyc");
    }

    #[test]
    fn test_module_path_never_climbs() {
        for name in ["..evil", "a..b", "a...b", "....x", "pkg.....mod"] {
            for is_package in [false, true] {
                let path = module_path(name, is_package);
                assert!(
                    path.split('/').all(|component| component != ".."),
                    "{name} -> {path}"
                );
            }
        }
        assert_eq!(module_path("a..b", false), "a__b.pyc");
    }

    #[test]
    fn test_parse_list_and_dict_index() {
        let list = Object::List(vec![Object::Tuple(vec![
            Object::Str("pkg".into()),
            Object::Tuple(vec![Object::Int(1), Object::Int(12), Object::Int(30)]),
        ])]);
        let dict = Object::Dict(vec![(
            Object::Str("pkg".into()),
            Object::Tuple(vec![Object::Bool(true), Object::Int(12), Object::Int(30)]),
        )]);
        let expected = vec![PyzEntry {
            name: "pkg".into(),
            is_package: true,
            position: 12,
            length: 30,
        }];

        assert_eq!(parse_index(&list).unwrap(), expected);
        assert_eq!(parse_index(&dict).unwrap(), expected);
    }

    #[test]
    fn test_parse_index_shape_errors() {
        assert!(matches!(parse_index(&Object::Int(3)), Err(IndexError::Shape(_))));

        let bad_pair = Object::List(vec![Object::Str("lonely".into())]);
        assert!(matches!(parse_index(&bad_pair), Err(IndexError::Shape(_))));

        let negative = Object::List(vec![Object::Tuple(vec![
            Object::Str("m".into()),
            Object::Tuple(vec![Object::Int(0), Object::Int(-1), Object::Int(3)]),
        ])]);
        assert!(matches!(parse_index(&negative), Err(IndexError::Shape(_))));
    }

    #[test]
    fn test_extract_modules() {
        let data = pyz_archive(
            PY38_MAGIC,
            &[
                PyzModule::new("app", true, b"\xe3pkg"),
                PyzModule::new("app.main", false, b"\xe3main"),
            ],
        );
        let mut ctx = context(3, 8);

        extract_pyz(&mut ctx, "PYZ-00.pyz", &data);

        assert!(ctx.diagnostics.is_empty());
        assert_eq!(ctx.magic.get(), Some(PycMagic(PY38_MAGIC)));
        let init = &ctx.files["app/__init__.pyc"];
        assert_eq!(&init[..4], &PY38_MAGIC);
        assert_eq!(&init[16..], b"\xe3pkg");
        assert_eq!(&ctx.files["app/main.pyc"][16..], b"\xe3main");
        assert!(ctx.pending.is_empty());
    }

    #[test]
    fn test_dict_index_archive() {
        let data = pyz_archive_dict(PY38_MAGIC, &[PyzModule::new("json.decoder", false, b"x")]);
        let mut ctx = context(3, 8);

        extract_pyz(&mut ctx, "PYZ-00.pyz", &data);
        assert!(ctx.files.contains_key("json/decoder.pyc"));
    }

    #[test]
    fn test_encrypted_module_kept_raw() {
        let data = pyz_archive(
            PY38_MAGIC,
            &[
                PyzModule::raw("secret", false, b"ciphertext"),
                PyzModule::new("plain", false, b"code"),
            ],
        );
        let mut ctx = context(3, 9);

        extract_pyz(&mut ctx, "PYZ-00.pyz", &data);

        assert_eq!(ctx.files["secret.pyc.encrypted"], b"ciphertext");
        assert!(ctx.files.contains_key("plain.pyc"));
        assert_eq!(ctx.diagnostics.len(), 1);
    }

    #[test]
    fn test_magic_mismatch_last_wins() {
        let mut ctx = context(3, 8);
        ctx.magic.adopt_if_unknown(
            PycMagic(*b"\x42\x0d\x0d\x0a"),
            MagicSource::ModuleHeader {
                entry: "m".to_string(),
            },
        );
        let data = pyz_archive(PY38_MAGIC, &[]);

        extract_pyz(&mut ctx, "PYZ-00.pyz", &data);

        assert_eq!(ctx.magic.get(), Some(PycMagic(PY38_MAGIC)));
        assert_eq!(ctx.diagnostics.len(), 1);
        assert!(matches!(
            ctx.diagnostics.into_vec()[..],
            [Diagnostic::MagicMismatch { .. }]
        ));
    }

    #[test]
    fn test_python2_skipped() {
        let data = pyz_archive(PY38_MAGIC, &[PyzModule::new("m", false, b"c")]);
        let mut ctx = context(2, 7);

        extract_pyz(&mut ctx, "PYZ-00.pyz", &data);

        assert!(ctx.files.is_empty());
        assert!(!ctx.magic.is_known());
        assert!(matches!(
            ctx.diagnostics.into_vec()[..],
            [Diagnostic::UnsupportedRuntimeMajorVersion { .. }]
        ));
    }

    #[test]
    fn test_header_tag_and_offset() {
        let data = pyz_archive(PY38_MAGIC, &[]);
        let header = PyzHeader::read(&data).unwrap();
        assert_eq!(header.magic, PycMagic(PY38_MAGIC));
        assert_eq!(header.index_offset, 12);

        assert!(matches!(
            PyzHeader::read(b"PYX\0\x55\x0d\x0d\x0a\0\0\0\x0c"),
            Err(IndexError::Header(unfreeze_common::Error::InvalidMagic { .. }))
        ));
        assert!(matches!(
            PyzHeader::read(b"PYZ\0\x55\x0d"),
            Err(IndexError::Header(unfreeze_common::Error::UnexpectedEof { .. }))
        ));
    }

    #[test]
    fn test_bad_tag_and_bad_index() {
        let mut ctx = context(3, 8);
        extract_pyz(&mut ctx, "bad.pyz", b"NOPE\x55\x0d\x0d\x0a\0\0\0\x0c");
        assert!(!ctx.magic.is_known());

        // Index offset points at an integer instead of a list.
        let mut data = b"PYZ\0".to_vec();
        data.extend_from_slice(&PY38_MAGIC);
        data.extend_from_slice(&12u32.to_be_bytes());
        data.extend_from_slice(&marshal::int(5));
        extract_pyz(&mut ctx, "shape.pyz", &data);

        // Index offset past the end.
        let mut data = pyz_archive(PY38_MAGIC, &[]);
        data[8..12].copy_from_slice(&1000u32.to_be_bytes());
        extract_pyz(&mut ctx, "offset.pyz", &data);

        assert!(ctx.files.is_empty());
        let diagnostics = ctx.diagnostics.into_vec();
        assert_eq!(diagnostics.len(), 3);
        assert!(diagnostics
            .iter()
            .all(|d| matches!(d, Diagnostic::IndexDecodeFailure { .. })));
    }
}
