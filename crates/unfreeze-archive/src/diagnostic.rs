//! Recoverable problems found while extracting.

use thiserror::Error;

use crate::header::RuntimeVersion;
use crate::magic::PycMagic;

/// A problem confined to one entry or one nested archive.
///
/// Extraction continues after each of these; they are collected on the
/// [`Extraction`](crate::Extraction) in the order they occurred.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    /// TOC record had an empty name.
    #[error("found an unnamed file in CArchive, using random name {placeholder}")]
    UnnamedEntry { placeholder: String },

    /// Record data extends past the end of the input.
    #[error("data of {name} is truncated: expected {expected} bytes, found {available}")]
    TruncatedPayload {
        name: String,
        expected: usize,
        available: usize,
    },

    /// Compression flag other than 0 or 1.
    #[error("unknown compression flag {flag} for {name}, extracting as-is")]
    UnknownCompression { name: String, flag: u8 },

    /// Record data failed to inflate; the stored bytes were kept.
    #[error("failed to decompress {name} in CArchive, extracting as-is: {reason}")]
    EntryDecompressFailure { name: String, reason: String },

    /// Inflated length differs from the TOC.
    #[error("decompressed size mismatch for {name}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        name: String,
        expected: u32,
        actual: usize,
    },

    /// PYZ archives are only decoded for Python 3.
    #[error("skipping PYZ extraction of {archive}: Python {version} is not supported")]
    UnsupportedRuntimeMajorVersion {
        archive: String,
        version: RuntimeVersion,
    },

    /// The PYZ archive could not be indexed; none of its modules were extracted.
    #[error("failed to decode index of {archive}: {reason}")]
    IndexDecodeFailure { archive: String, reason: String },

    /// The PYZ archive carries a different magic than the one already known.
    #[error("pyc magic {found} in {archive} replaces the different magic {previous} found earlier")]
    MagicMismatch {
        archive: String,
        previous: PycMagic,
        found: PycMagic,
    },

    /// A PYZ module failed to inflate, usually because it is encrypted.
    #[error("failed to decompress {path} in PYZ archive, likely encrypted, extracting as-is")]
    EncryptedOrCorruptModule { path: String },

    /// Headers were synthesized but no magic was ever found.
    #[error("pyc magic was never found, {pending} files keep a zeroed magic")]
    MagicNeverDiscovered { pending: usize },
}

/// Ordered diagnostic log that mirrors every entry to `tracing`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("{diagnostic}");
        self.0.push(diagnostic);
    }

    pub(crate) fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }

    pub(crate) fn as_slice(&self) -> &[Diagnostic] {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}
