//! The `.pyc` magic number and where it was discovered.

use std::fmt;

/// Four-byte `.pyc` magic number, specific to one Python version.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PycMagic(pub [u8; 4]);

impl PycMagic {
    /// Written into headers synthesized before the real magic is known.
    pub const PLACEHOLDER: PycMagic = PycMagic([0; 4]);

    /// Magic from the first four bytes of `data`.
    pub fn from_prefix(data: &[u8]) -> Option<Self> {
        let bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
        Some(Self(bytes))
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for PycMagic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a:02x}{b:02x}{c:02x}{d:02x}")
    }
}

impl fmt::Debug for PycMagic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PycMagic({self})")
    }
}

/// Where a magic number came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MagicSource {
    /// Header of a module stored with its `.pyc` header intact.
    ModuleHeader { entry: String },
    /// Header of a PYZ archive.
    NestedIndex { archive: String },
}

/// Discovery cell for the magic number shared by every stage of extraction.
///
/// A module header only fills an empty cell, while a PYZ header always
/// replaces the current value.
#[derive(Debug, Clone, Default)]
pub struct MagicCell {
    value: Option<(PycMagic, MagicSource)>,
}

impl MagicCell {
    /// The magic, if discovered.
    #[inline]
    pub fn get(&self) -> Option<PycMagic> {
        self.value.as_ref().map(|(magic, _)| *magic)
    }

    /// Where the current magic came from.
    pub fn source(&self) -> Option<&MagicSource> {
        self.value.as_ref().map(|(_, source)| source)
    }

    #[inline]
    pub fn is_known(&self) -> bool {
        self.value.is_some()
    }

    /// The magic, or [`PycMagic::PLACEHOLDER`] if not yet discovered.
    #[inline]
    pub fn value_or_placeholder(&self) -> PycMagic {
        self.get().unwrap_or(PycMagic::PLACEHOLDER)
    }

    /// Store `magic` if the cell is empty. Returns whether it was stored.
    pub fn adopt_if_unknown(&mut self, magic: PycMagic, source: MagicSource) -> bool {
        if self.value.is_some() {
            return false;
        }
        tracing::debug!("Adopting pyc magic {magic} from {source:?}");
        self.value = Some((magic, source));
        true
    }

    /// Store `magic` unconditionally.
    ///
    /// Returns the previous magic when it differed from the new one.
    pub fn overwrite(&mut self, magic: PycMagic, source: MagicSource) -> Option<PycMagic> {
        let previous = self.get().filter(|&old| old != magic);
        tracing::debug!("Setting pyc magic {magic} from {source:?}");
        self.value = Some((magic, source));
        previous
    }
}
