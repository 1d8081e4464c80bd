//! zlib decompression for archive entries.

use flate2::{Decompress, FlushDecompress, Status};
use thiserror::Error;

/// Upper bound on the buffer reserved up front from a size hint.
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

/// Growth step once the size hint is exhausted.
const GROW_BY: usize = 64 * 1024;

/// Why a zlib stream could not be inflated.
#[derive(Debug, Error)]
pub enum InflateError {
    /// Invalid header, bad block, or checksum mismatch.
    #[error("corrupt zlib stream: {0}")]
    Corrupt(#[from] flate2::DecompressError),

    /// Input ended before the end of the stream.
    #[error("zlib stream ends early after {produced} bytes of output")]
    Truncated { produced: usize },
}

/// Inflate a complete zlib stream.
///
/// `size_hint` is the expected output size; it only sizes the initial
/// buffer. A stream that stops before its end marker is an error rather
/// than a short result.
pub fn inflate(data: &[u8], size_hint: usize) -> Result<Vec<u8>, InflateError> {
    let mut decoder = Decompress::new(true);
    let mut output = Vec::with_capacity(size_hint.clamp(GROW_BY, MAX_PREALLOC));

    loop {
        if output.len() == output.capacity() {
            output.reserve(GROW_BY);
        }

        let total_in = decoder.total_in();
        let total_out = decoder.total_out();
        let input = &data[(total_in as usize).min(data.len())..];

        let status = decoder.decompress_vec(input, &mut output, FlushDecompress::None)?;
        if status == Status::StreamEnd {
            return Ok(output);
        }

        // No progress with room left in the output means the input ran dry.
        if decoder.total_in() == total_in && decoder.total_out() == total_out {
            return Err(InflateError::Truncated {
                produced: output.len(),
            });
        }
    }
}
