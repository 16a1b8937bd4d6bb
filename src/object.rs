use crate::dictionary::Dictionary;
use crate::error::{Error, Result};

/// Identity of an indirect object: (object number, generation number).
pub type ObjectId = (u32, u16);

/// Whether a `ByteString` was written as a parenthesized literal or an
/// angle-bracketed hex string. Carried only for round-trip fidelity;
/// equality between two `Object::String` values ignores this flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    Literal,
    Hexadecimal,
}

/// A PDF stream: a dictionary plus a raw byte body (§3, Invariant 2: the
/// dictionary's `Length` entry must match `content.len()` on emission).
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    pub content: Vec<u8>,
    /// Byte offset of the `stream` keyword's data in the source document,
    /// set by the parser for streams whose `Length` needed late resolution.
    pub start_position: Option<usize>,
}

impl Stream {
    pub fn new(mut dict: Dictionary, content: Vec<u8>) -> Self {
        dict.set("Length", content.len() as i64);
        Stream { dict, content, start_position: None }
    }

    /// Replace the raw (still filtered) content and fix up `Length`.
    pub fn set_content(&mut self, content: Vec<u8>) {
        self.dict.set("Length", content.len() as i64);
        self.content = content;
    }

    fn filter_names(&self) -> Result<Vec<Vec<u8>>> {
        match self.dict.get(b"Filter") {
            Ok(Object::Name(n)) => Ok(vec![n.clone()]),
            Ok(Object::Array(arr)) => arr.iter().map(|o| o.as_name().map(|n| n.to_vec())).collect(),
            Ok(Object::Null) | Err(_) => Ok(Vec::new()),
            Ok(_) => Err(Error::Type("Name or Array for /Filter")),
        }
    }

    fn decode_parms(&self) -> Result<Vec<Option<Dictionary>>> {
        match self.dict.get(b"DecodeParms").or_else(|_| self.dict.get(b"DP")) {
            Ok(Object::Dictionary(d)) => Ok(vec![Some(d.clone())]),
            Ok(Object::Array(arr)) => Ok(arr
                .iter()
                .map(|o| o.as_dict().ok().cloned())
                .collect()),
            Ok(Object::Null) | Err(_) => Ok(Vec::new()),
            Ok(_) => Ok(Vec::new()),
        }
    }

    /// Run the full filter chain (§4.2) and return the materialized body.
    pub fn decompressed_content(&self) -> Result<Vec<u8>> {
        let filters = self.filter_names()?;
        let parms = self.decode_parms()?;
        let mut data = self.content.clone();
        for (i, name) in filters.iter().enumerate() {
            let parm = parms.get(i).cloned().flatten();
            data = crate::filters::decode(name, &data, parm.as_ref())?;
        }
        Ok(data)
    }

    pub fn is_compressed(&self) -> bool {
        !matches!(self.dict.get(b"Filter"), Ok(Object::Null) | Err(_))
    }
}

/// The algebraic PDF value type (§3): nine variants.
#[derive(Debug, Clone)]
pub enum Object {
    Null,
    Boolean(bool),
    /// IEEE-754 double plus an is-integer flag, so e.g. `3` round-trips as
    /// `3` rather than `3.0` while `3.0` written in the source stays real.
    Number(f64, bool),
    String(Vec<u8>, StringFormat),
    Name(Vec<u8>),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        use Object::*;
        match (self, other) {
            (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Number(a, ia), Number(b, ib)) => a == b && ia == ib,
            (String(a, _), String(b, _)) => a == b,
            (Name(a), Name(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Dictionary(a), Dictionary(b)) => a == b,
            (Stream(a), Stream(b)) => a == b,
            (Reference(a), Reference(b)) => a == b,
            _ => false,
        }
    }
}

impl Object {
    pub fn integer(v: i64) -> Self {
        Object::Number(v as f64, true)
    }

    pub fn real(v: f64) -> Self {
        Object::Number(v, false)
    }

    pub fn string_literal<B: Into<Vec<u8>>>(bytes: B) -> Self {
        Object::String(bytes.into(), StringFormat::Literal)
    }

    pub fn name<B: Into<Vec<u8>>>(bytes: B) -> Self {
        Object::Name(bytes.into())
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Object::Number(_, true))
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Object::Boolean(b) => Ok(*b),
            _ => Err(Error::Type("Boolean")),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Object::Number(n, _) => Ok(*n),
            _ => Err(Error::Type("Number")),
        }
    }

    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Object::Number(n, _) => Ok(*n as i64),
            _ => Err(Error::Type("Number")),
        }
    }

    pub fn as_name(&self) -> Result<&[u8]> {
        match self {
            Object::Name(n) => Ok(n),
            _ => Err(Error::Type("Name")),
        }
    }

    pub fn as_name_str(&self) -> Result<&str> {
        self.as_name()
            .and_then(|n| std::str::from_utf8(n).map_err(|_| Error::Type("utf8 Name")))
    }

    pub fn as_str(&self) -> Result<&[u8]> {
        match self {
            Object::String(s, _) => Ok(s),
            _ => Err(Error::Type("String")),
        }
    }

    pub fn as_array(&self) -> Result<&[Object]> {
        match self {
            Object::Array(a) => Ok(a),
            _ => Err(Error::Type("Array")),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Vec<Object>> {
        match self {
            Object::Array(a) => Ok(a),
            _ => Err(Error::Type("Array")),
        }
    }

    pub fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Object::Dictionary(d) => Ok(d),
            Object::Stream(s) => Ok(&s.dict),
            _ => Err(Error::Type("Dictionary")),
        }
    }

    pub fn as_dict_mut(&mut self) -> Result<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Ok(d),
            Object::Stream(s) => Ok(&mut s.dict),
            _ => Err(Error::Type("Dictionary")),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream> {
        match self {
            Object::Stream(s) => Ok(s),
            _ => Err(Error::Type("Stream")),
        }
    }

    pub fn as_stream_mut(&mut self) -> Result<&mut Stream> {
        match self {
            Object::Stream(s) => Ok(s),
            _ => Err(Error::Type("Stream")),
        }
    }

    pub fn as_reference(&self) -> Result<ObjectId> {
        match self {
            Object::Reference(id) => Ok(*id),
            _ => Err(Error::Type("Reference")),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }
}

impl From<bool> for Object {
    fn from(v: bool) -> Self {
        Object::Boolean(v)
    }
}
impl From<i64> for Object {
    fn from(v: i64) -> Self {
        Object::integer(v)
    }
}
impl From<i32> for Object {
    fn from(v: i32) -> Self {
        Object::integer(v as i64)
    }
}
impl From<u32> for Object {
    fn from(v: u32) -> Self {
        Object::integer(v as i64)
    }
}
impl From<f64> for Object {
    fn from(v: f64) -> Self {
        Object::real(v)
    }
}
impl From<Vec<Object>> for Object {
    fn from(v: Vec<Object>) -> Self {
        Object::Array(v)
    }
}
impl From<Dictionary> for Object {
    fn from(v: Dictionary) -> Self {
        Object::Dictionary(v)
    }
}
impl From<Stream> for Object {
    fn from(v: Stream) -> Self {
        Object::Stream(v)
    }
}
impl From<ObjectId> for Object {
    fn from(v: ObjectId) -> Self {
        Object::Reference(v)
    }
}
