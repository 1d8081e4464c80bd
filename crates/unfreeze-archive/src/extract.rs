//! Reading, inflating and routing CArchive entries.

use crate::context::ArchiveContext;
use crate::decompress::inflate;
use crate::diagnostic::Diagnostic;
use crate::header::ArchiveLayout;
use crate::magic::{MagicSource, PycMagic};
use crate::parallel::map_ordered;
use crate::pyc::{has_legacy_header, PYC_SUFFIX};
use crate::pyz::{extract_pyz, PYZ_SUFFIX};
use crate::toc::{EntryKind, TocEntry};

/// Stored bytes of one entry after decompression.
#[derive(Debug)]
pub(crate) struct Materialized {
    pub(crate) bytes: Vec<u8>,
    /// False when `bytes` are still in their stored form.
    pub(crate) decoded: bool,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

/// Read and inflate one entry. Never fails; problems become diagnostics.
pub(crate) fn materialize(data: &[u8], overlay_position: usize, entry: &TocEntry) -> Materialized {
    let mut diagnostics = Vec::new();

    let start = overlay_position
        .saturating_add(entry.data_position as usize)
        .min(data.len());
    let expected = entry.data_size as usize;
    let end = start.saturating_add(expected).min(data.len());
    let stored = &data[start..end];
    if stored.len() < expected {
        diagnostics.push(Diagnostic::TruncatedPayload {
            name: entry.name.clone(),
            expected,
            available: stored.len(),
        });
    }

    let (bytes, decoded) = match entry.compression_flag {
        0 => (stored.to_vec(), true),
        1 => match inflate(stored, entry.uncompressed_size as usize) {
            Ok(bytes) => {
                if bytes.len() != entry.uncompressed_size as usize {
                    diagnostics.push(Diagnostic::SizeMismatch {
                        name: entry.name.clone(),
                        expected: entry.uncompressed_size,
                        actual: bytes.len(),
                    });
                }
                (bytes, true)
            }
            Err(e) => {
                diagnostics.push(Diagnostic::EntryDecompressFailure {
                    name: entry.name.clone(),
                    reason: e.to_string(),
                });
                (stored.to_vec(), false)
            }
        },
        flag => {
            diagnostics.push(Diagnostic::UnknownCompression {
                name: entry.name.clone(),
                flag,
            });
            (stored.to_vec(), false)
        }
    };

    Materialized {
        bytes,
        decoded,
        diagnostics,
    }
}

/// Extract every TOC entry into `ctx`, then decode the PYZ archives found.
pub(crate) fn extract_entries(
    ctx: &mut ArchiveContext,
    data: &[u8],
    layout: &ArchiveLayout,
    entries: &[TocEntry],
) {
    let materialized = map_ordered(entries, |entry| {
        if entry.kind.is_metadata() {
            None
        } else {
            Some(materialize(data, layout.overlay_position, entry))
        }
    });

    let mut pyz_keys = Vec::new();
    for (entry, item) in entries.iter().zip(materialized) {
        let Some(item) = item else {
            tracing::debug!("Skipping {} record {}", char::from(entry.kind.code()), entry.name);
            continue;
        };
        ctx.diagnostics.extend(item.diagnostics);

        if let Some(key) = dispatch(ctx, entry, item.bytes, item.decoded) {
            if key.ends_with(PYZ_SUFFIX) && !pyz_keys.contains(&key) {
                pyz_keys.push(key);
            }
        }
    }

    for key in pyz_keys {
        // Taken out of the map for the duration of the decode and put back after.
        let Some(archive) = ctx.files.remove(&key) else {
            continue;
        };
        extract_pyz(ctx, &key, &archive);
        ctx.files.entry(key).or_insert(archive);
    }
}

/// Route one entry into the output map. Returns the key it was stored under.
fn dispatch(
    ctx: &mut ArchiveContext,
    entry: &TocEntry,
    bytes: Vec<u8>,
    decoded: bool,
) -> Option<String> {
    if !decoded {
        ctx.insert(entry.name.clone(), bytes);
        return Some(entry.name.clone());
    }

    match entry.kind {
        EntryKind::Dependency | EntryKind::RuntimeOption => None,
        EntryKind::PySource => {
            let path = format!("{}{PYC_SUFFIX}", entry.name);
            tracing::debug!("Entry point {path}");
            ctx.write_code_image(path.clone(), &bytes);
            Some(path)
        }
        EntryKind::PyPackage | EntryKind::PyModule => {
            let path = format!("{}{PYC_SUFFIX}", entry.name);
            if has_legacy_header(&bytes) {
                if let Some(magic) = PycMagic::from_prefix(&bytes) {
                    let source = MagicSource::ModuleHeader {
                        entry: entry.name.clone(),
                    };
                    if ctx.magic.adopt_if_unknown(magic, source) {
                        tracing::info!("Found pyc magic {magic} in {}", entry.name);
                    }
                }
                ctx.insert(path.clone(), bytes);
            } else {
                ctx.write_code_image(path.clone(), &bytes);
            }
            Some(path)
        }
        _ => {
            ctx.insert(entry.name.clone(), bytes);
            Some(entry.name.clone())
        }
    }
}
