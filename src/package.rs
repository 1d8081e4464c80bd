//! Zip packaging of extracted files.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Borrowing iterator over a path-to-bytes map.
pub fn entries(files: &BTreeMap<String, Vec<u8>>) -> impl Iterator<Item = (&str, &[u8])> {
    files.iter().map(|(path, data)| (path.as_str(), data.as_slice()))
}

/// Entries of `extra` whose path is not already taken by `files`.
///
/// A zip may hold each name once, so the file already present wins.
pub fn unclaimed<'a>(
    files: &'a BTreeMap<String, Vec<u8>>,
    extra: &'a BTreeMap<String, Vec<u8>>,
) -> impl Iterator<Item = (&'a str, &'a [u8])> {
    entries(extra).filter(move |(path, _)| {
        let taken = files.contains_key(*path);
        if taken {
            tracing::warn!("Skipping decompiled {path}: an extracted file has the same name");
        }
        !taken
    })
}

/// Write `files` into a new deflate-compressed zip at `path`.
///
/// Returns the number of files written.
pub fn write_zip<'a>(
    path: &Path,
    files: impl IntoIterator<Item = (&'a str, &'a [u8])>,
) -> Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(false);

    let mut count = 0;
    for (name, data) in files {
        zip.start_file(name, options)
            .with_context(|| format!("Failed to add {name}"))?;
        zip.write_all(data)?;
        count += 1;
    }

    zip.finish()
        .context("Failed to finish zip")?
        .flush()?;

    Ok(count)
}
