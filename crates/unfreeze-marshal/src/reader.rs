//! Marshal stream decoder.

use unfreeze_common::BinaryReader;

use crate::{Error, Object, Result};

/// Set on a type code when the object is recorded for later back references.
const FLAG_REF: u8 = 0x80;

/// PYZ indexes nest three levels deep; anything near this is hostile.
const MAX_DEPTH: usize = 256;

/// Upper bound on decoded objects, with back references counted at full size.
const MAX_OBJECTS: usize = 1_000_000;

mod code {
    pub const NULL: u8 = b'0';
    pub const NONE: u8 = b'N';
    pub const FALSE: u8 = b'F';
    pub const TRUE: u8 = b'T';
    pub const STOPITER: u8 = b'S';
    pub const ELLIPSIS: u8 = b'.';
    pub const INT: u8 = b'i';
    pub const INT64: u8 = b'I';
    pub const FLOAT: u8 = b'f';
    pub const BINARY_FLOAT: u8 = b'g';
    pub const LONG: u8 = b'l';
    pub const STRING: u8 = b's';
    pub const INTERNED: u8 = b't';
    pub const REF: u8 = b'r';
    pub const TUPLE: u8 = b'(';
    pub const SMALL_TUPLE: u8 = b')';
    pub const LIST: u8 = b'[';
    pub const DICT: u8 = b'{';
    pub const UNICODE: u8 = b'u';
    pub const SET: u8 = b'<';
    pub const FROZENSET: u8 = b'>';
    pub const ASCII: u8 = b'a';
    pub const ASCII_INTERNED: u8 = b'A';
    pub const SHORT_ASCII: u8 = b'z';
    pub const SHORT_ASCII_INTERNED: u8 = b'Z';
}

/// Decodes one marshalled object from a byte slice.
#[derive(Debug)]
pub struct Unmarshaler<'a> {
    reader: BinaryReader<'a>,
    /// Objects recorded with `FLAG_REF` and their object counts; `None`
    /// while a container is still being decoded.
    refs: Vec<Option<(Object, usize)>>,
    depth: usize,
    objects: usize,
}

impl<'a> Unmarshaler<'a> {
    /// Create a decoder reading from the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: BinaryReader::new(data),
            refs: Vec::new(),
            depth: 0,
            objects: 0,
        }
    }

    /// Create a decoder reading from `offset` within `data`.
    pub fn new_at(data: &'a [u8], offset: usize) -> Result<Self> {
        Ok(Self {
            reader: BinaryReader::new_at(data, offset)?,
            refs: Vec::new(),
            depth: 0,
            objects: 0,
        })
    }

    /// Decode the object at the current position.
    pub fn load(mut self) -> Result<Object> {
        self.read_object()
    }

    fn read_object(&mut self) -> Result<Object> {
        let offset = self.reader.position();
        match self.read_object_or_null()? {
            Some(object) => Ok(object),
            None => Err(Error::UnsupportedType {
                code: char::from(code::NULL),
                offset,
            }),
        }
    }

    /// Returns `None` for the NULL marker that terminates dicts.
    fn read_object_or_null(&mut self) -> Result<Option<Object>> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let result = self.read_tagged();
        self.depth -= 1;
        result
    }

    /// Charge `count` objects against [`MAX_OBJECTS`].
    fn charge(&mut self, count: usize) -> Result<()> {
        self.objects = self.objects.saturating_add(count);
        if self.objects > MAX_OBJECTS {
            return Err(Error::TooManyObjects(MAX_OBJECTS));
        }
        Ok(())
    }

    fn read_tagged(&mut self) -> Result<Option<Object>> {
        let offset = self.reader.position();
        let byte = self.reader.read_u8()?;
        let type_code = byte & !FLAG_REF;
        let first = self.objects;
        self.charge(1)?;

        // Containers reserve their slot before their children, so reserving
        // up front gives every object the index CPython would assign.
        let slot = if byte & FLAG_REF != 0 {
            self.refs.push(None);
            Some(self.refs.len() - 1)
        } else {
            None
        };

        let object = match type_code {
            code::NULL => return Ok(None),
            code::NONE => Object::None,
            code::FALSE => Object::Bool(false),
            code::TRUE => Object::Bool(true),
            code::STOPITER => Object::StopIteration,
            code::ELLIPSIS => Object::Ellipsis,
            code::INT => Object::Int(i64::from(self.reader.read_i32()?)),
            code::INT64 => Object::Int(self.reader.read_i64()?),
            code::LONG => Object::Int(self.read_long()?),
            code::BINARY_FLOAT => Object::Float(self.reader.read_f64()?),
            code::FLOAT => {
                let len = usize::from(self.reader.read_u8()?);
                let text = String::from_utf8_lossy(self.reader.read_bytes(len)?).into_owned();
                let value = text.trim().parse().map_err(|_| Error::InvalidFloat(text))?;
                Object::Float(value)
            }
            code::STRING => {
                let len = self.read_len()?;
                Object::Bytes(self.reader.read_bytes(len)?.to_vec())
            }
            code::UNICODE | code::INTERNED | code::ASCII | code::ASCII_INTERNED => {
                let len = self.read_len()?;
                Object::Str(self.read_text(len)?)
            }
            code::SHORT_ASCII | code::SHORT_ASCII_INTERNED => {
                let len = usize::from(self.reader.read_u8()?);
                Object::Str(self.read_text(len)?)
            }
            code::TUPLE => {
                let count = self.read_len()?;
                Object::Tuple(self.read_items(count)?)
            }
            code::SMALL_TUPLE => {
                let count = usize::from(self.reader.read_u8()?);
                Object::Tuple(self.read_items(count)?)
            }
            code::LIST => {
                let count = self.read_len()?;
                Object::List(self.read_items(count)?)
            }
            code::SET => {
                let count = self.read_len()?;
                Object::Set(self.read_items(count)?)
            }
            code::FROZENSET => {
                let count = self.read_len()?;
                Object::FrozenSet(self.read_items(count)?)
            }
            code::DICT => {
                let mut pairs = Vec::new();
                while let Some(key) = self.read_object_or_null()? {
                    let value = self.read_object()?;
                    pairs.push((key, value));
                }
                Object::Dict(pairs)
            }
            code::REF => {
                let index = self.reader.read_u32()?;
                let (object, count) = self
                    .refs
                    .get(index as usize)
                    .and_then(Option::as_ref)
                    .ok_or(Error::InvalidReference {
                        index,
                        available: self.refs.len(),
                    })?;
                let (object, count) = (object.clone(), *count);
                self.charge(count)?;
                object
            }
            other => {
                return Err(Error::UnsupportedType {
                    code: char::from(other),
                    offset,
                })
            }
        };

        if let Some(slot) = slot {
            self.refs[slot] = Some((object.clone(), self.objects - first));
        }
        Ok(Some(object))
    }

    fn read_len(&mut self) -> Result<usize> {
        let len = self.reader.read_i32()?;
        usize::try_from(len).map_err(|_| Error::NegativeLength(len))
    }

    fn read_text(&mut self, len: usize) -> Result<String> {
        Ok(String::from_utf8_lossy(self.reader.read_bytes(len)?).into_owned())
    }

    fn read_items(&mut self, count: usize) -> Result<Vec<Object>> {
        // Every item takes at least one byte, which bounds hostile counts.
        let mut items = Vec::with_capacity(count.min(self.reader.remaining()));
        for _ in 0..count {
            items.push(self.read_object()?);
        }
        Ok(items)
    }

    /// Arbitrary precision integer stored as 15-bit digits, least significant first.
    fn read_long(&mut self) -> Result<i64> {
        let digits = self.reader.read_i32()?;
        let count = digits.unsigned_abs();
        if count > 5 {
            return Err(Error::IntegerOverflow { digits });
        }

        let mut magnitude: i128 = 0;
        for i in 0..count {
            let digit = i128::from(self.reader.read_u16()? & 0x7fff);
            magnitude |= digit << (15 * i);
        }
        let value = if digits < 0 { -magnitude } else { magnitude };
        i64::try_from(value).map_err(|_| Error::IntegerOverflow { digits })
    }
}
