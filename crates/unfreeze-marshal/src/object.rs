//! Decoded marshal values.

/// A decoded marshal object.
///
/// Python's `str` and the various ASCII string encodings all decode to
/// [`Object::Str`]; `bytes` decode to [`Object::Bytes`].
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// `None`.
    None,
    /// `True` or `False`.
    Bool(bool),
    /// Any integer that fits in 64 bits.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// `bytes`.
    Bytes(Vec<u8>),
    /// `str`.
    Str(String),
    /// `tuple`.
    Tuple(Vec<Object>),
    /// `list`.
    List(Vec<Object>),
    /// `dict`, in serialized order.
    Dict(Vec<(Object, Object)>),
    /// `set`.
    Set(Vec<Object>),
    /// `frozenset`.
    FrozenSet(Vec<Object>),
    /// `StopIteration`.
    StopIteration,
    /// `...`.
    Ellipsis,
}

impl Object {
    /// Items of a tuple or list.
    pub fn as_sequence(&self) -> Option<&[Object]> {
        match self {
            Object::Tuple(items) | Object::List(items) => Some(items),
            _ => None,
        }
    }

    /// Text of a `str`, or of `bytes` holding valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Object::Str(s) => Some(s),
            Object::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Integer value; booleans count as 0 and 1 as they do in Python.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Object::Int(v) => Some(*v),
            Object::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::None => "None",
            Object::Bool(_) => "bool",
            Object::Int(_) => "int",
            Object::Float(_) => "float",
            Object::Bytes(_) => "bytes",
            Object::Str(_) => "str",
            Object::Tuple(_) => "tuple",
            Object::List(_) => "list",
            Object::Dict(_) => "dict",
            Object::Set(_) => "set",
            Object::FrozenSet(_) => "frozenset",
            Object::StopIteration => "StopIteration",
            Object::Ellipsis => "Ellipsis",
        }
    }
}
