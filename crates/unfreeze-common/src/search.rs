//! Backward signature search over large buffers.

use memchr::memmem;

/// Find the occurrence of `needle` closest to the end of `data`.
///
/// The buffer is scanned from the end in windows of `window` bytes. Each new
/// window ends `needle.len() - 1` bytes past the start of the previous one,
/// so a match straddling a window boundary is still found.
///
/// Returns `None` for an empty needle, for a buffer shorter than the needle,
/// or when no window contains a match.
pub fn rfind_bounded(data: &[u8], needle: &[u8], window: usize) -> Option<usize> {
    if needle.is_empty() || data.len() < needle.len() {
        return None;
    }
    // Smaller windows could not make progress across the overlap.
    let window = window.max(needle.len() * 2);
    let finder = memmem::FinderRev::new(needle);

    let mut end = data.len();
    loop {
        let start = end.saturating_sub(window);
        if end - start < needle.len() {
            return None;
        }
        if let Some(offset) = finder.rfind(&data[start..end]) {
            return Some(start + offset);
        }
        if start == 0 {
            return None;
        }
        end = start + needle.len() - 1;
    }
}
