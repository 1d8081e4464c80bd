//! Deferred magic patching.

use crate::context::ArchiveContext;
use crate::diagnostic::Diagnostic;

/// Write the discovered magic into every image synthesized before it was known.
///
/// Runs once, after all entries and PYZ archives have been extracted. If no
/// magic was found the placeholder stays in place.
pub(crate) fn apply_fixups(ctx: &mut ArchiveContext) {
    let pending = std::mem::take(&mut ctx.pending);
    if pending.is_empty() {
        return;
    }

    let Some(magic) = ctx.magic.get() else {
        ctx.warn(Diagnostic::MagicNeverDiscovered {
            pending: pending.len(),
        });
        return;
    };

    let mut patched = 0usize;
    for key in &pending {
        if let Some(image) = ctx.files.get_mut(key) {
            if let Some(prefix) = image.get_mut(..4) {
                prefix.copy_from_slice(magic.as_bytes());
                patched += 1;
            }
        }
    }
    tracing::info!("Patched pyc magic {magic} into {patched} files");
}
