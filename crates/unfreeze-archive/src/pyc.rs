//! `.pyc` image synthesis.
//!
//! PyInstaller stores most modules as bare marshalled code objects. A
//! loadable `.pyc` needs the magic number followed by a header whose layout
//! depends on the Python version:
//!
//! | Python      | Header after the magic                        |
//! |-------------|-----------------------------------------------|
//! | 3.7+        | bit field (4) + timestamp and size, or hash (8) |
//! | 3.3 to 3.6  | timestamp (4) + source size (4)                |
//! | older       | timestamp (4)                                  |
//!
//! Every field after the magic is written as zero.

use crate::header::RuntimeVersion;
use crate::magic::PycMagic;

/// Suffix of compiled module paths.
pub const PYC_SUFFIX: &str = ".pyc";

/// Length of the header fields that follow the magic.
pub const fn header_padding_len(runtime: RuntimeVersion) -> usize {
    if runtime.major >= 3 && runtime.minor >= 7 {
        // PEP 552
        12
    } else if runtime.major >= 3 && runtime.minor >= 3 {
        8
    } else {
        4
    }
}

/// Build a `.pyc` image around a bare code object.
pub fn synthesize_pyc(magic: PycMagic, runtime: RuntimeVersion, code: &[u8]) -> Vec<u8> {
    let padding = header_padding_len(runtime);
    let mut image = Vec::with_capacity(4 + padding + code.len());
    image.extend_from_slice(magic.as_bytes());
    image.resize(4 + padding, 0);
    image.extend_from_slice(code);
    image
}

/// Whether `data` starts with a `.pyc` magic (PyInstaller before 5.3 kept it).
///
/// Every magic number ends in `\r\n`, which a bare code object never does.
pub fn has_legacy_header(data: &[u8]) -> bool {
    data.get(2..4) == Some(b"\r\n".as_slice())
}
