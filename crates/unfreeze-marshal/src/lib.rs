//! Decoder for Python's `marshal` serialization format.
//!
//! PyInstaller stores the index of its PYZ archives as a marshalled Python
//! object. This crate decodes the data-only subset of the format into a
//! closed [`Object`] tree that callers consume with exhaustive matching.
//! Code objects are not supported; the index never contains them.
//!
//! # Example
//!
//! ```
//! use unfreeze_marshal::{Object, Unmarshaler};
//!
//! // [('a', (0, 17, 42))]
//! let data = b"[\x01\x00\x00\x00)\x02z\x01a)\x03\xe9\x00\x00\x00\x00\xe9\x11\x00\x00\x00\xe9\x2a\x00\x00\x00";
//! let object = Unmarshaler::new(data).load()?;
//!
//! let Object::List(items) = object else { panic!("expected a list") };
//! assert_eq!(items.len(), 1);
//! # Ok::<(), unfreeze_marshal::Error>(())
//! ```

mod error;
mod object;
mod reader;

pub use error::{Error, Result};
pub use object::Object;
pub use reader::Unmarshaler;
