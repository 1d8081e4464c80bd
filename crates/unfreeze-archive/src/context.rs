//! Mutable state threaded through one extraction.

use std::collections::{BTreeMap, BTreeSet};

use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::header::RuntimeVersion;
use crate::magic::MagicCell;
use crate::pyc::synthesize_pyc;

/// Output map, magic discovery, and fixup queue for one archive.
#[derive(Debug)]
pub(crate) struct ArchiveContext {
    pub(crate) files: BTreeMap<String, Vec<u8>>,
    pub(crate) magic: MagicCell,
    /// Keys written with a placeholder magic.
    pub(crate) pending: BTreeSet<String>,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) runtime: RuntimeVersion,
}

impl ArchiveContext {
    pub(crate) fn new(runtime: RuntimeVersion, diagnostics: Diagnostics) -> Self {
        Self {
            files: BTreeMap::new(),
            magic: MagicCell::default(),
            pending: BTreeSet::new(),
            diagnostics,
            runtime,
        }
    }

    /// Store `data` under `path`, replacing any earlier file of that name.
    ///
    /// A replaced image is no longer patched by the fixup pass.
    pub(crate) fn insert(&mut self, path: String, data: Vec<u8>) {
        self.pending.remove(&path);
        if self.files.insert(path.clone(), data).is_some() {
            tracing::debug!("Replacing duplicate entry {path}");
        }
    }

    /// Wrap a bare code object in a `.pyc` header and store it.
    ///
    /// Without a known magic the header gets the placeholder and `path` is
    /// queued for the fixup pass.
    pub(crate) fn write_code_image(&mut self, path: String, code: &[u8]) {
        let image = synthesize_pyc(self.magic.value_or_placeholder(), self.runtime, code);
        self.insert(path.clone(), image);
        if !self.magic.is_known() {
            self.pending.insert(path);
        }
    }

    pub(crate) fn warn(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::magic::{MagicSource, PycMagic};
    use crate::testutil::PY38_MAGIC;

    #[test]
    fn test_code_image_queued_until_magic_known() {
        let mut ctx = ArchiveContext::new(RuntimeVersion::new(3, 8), Diagnostics::default());

        ctx.write_code_image("early.pyc".to_string(), b"code");
        assert!(ctx.pending.contains("early.pyc"));
        assert_eq!(&ctx.files["early.pyc"][..4], &[0; 4]);

        ctx.magic.adopt_if_unknown(
            PycMagic(PY38_MAGIC),
            MagicSource::ModuleHeader {
                entry: "mod".to_string(),
            },
        );
        ctx.write_code_image("late.pyc".to_string(), b"code");
        assert_eq!(ctx.pending.len(), 1);
        assert_eq!(&ctx.files["late.pyc"][..4], &PY38_MAGIC);
        assert_eq!(ctx.files["late.pyc"].len(), 16 + 4);
    }

    #[test]
    fn test_verbatim_write_leaves_fixup_queue() {
        let mut ctx = ArchiveContext::new(RuntimeVersion::new(3, 8), Diagnostics::default());

        ctx.write_code_image("main.pyc".to_string(), b"code");
        ctx.write_code_image("other.pyc".to_string(), b"code");
        ctx.insert("main.pyc".to_string(), b"verbatim".to_vec());

        assert_eq!(ctx.pending.len(), 1);
        assert!(ctx.pending.contains("other.pyc"));
    }
}
