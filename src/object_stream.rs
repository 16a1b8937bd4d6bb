use std::collections::BTreeMap;

use crate::error::{Error, ParseError, Result};
use crate::object::{Object, ObjectId, Stream};
use crate::parser;

/// A decoded `/Type /ObjStm` object stream (ISO 32000-1 §7.5.7): a packed
/// sequence of compressed indirect objects, each addressable by
/// `XrefEntry::Compressed { container, index }`.
pub struct ObjectStream {
    pub objects: BTreeMap<ObjectId, Object>,
}

impl ObjectStream {
    pub fn new(stream: &mut Stream) -> Result<Self> {
        if stream.content.is_empty() {
            let length = stream
                .dict
                .get(b"Length")
                .and_then(Object::as_i64)
                .unwrap_or(0);
            if length != 0 {
                return Err(Error::Parse(ParseError::InvalidObjectStream));
            }
        }

        let data = stream.decompressed_content()?;

        let n = stream
            .dict
            .get(b"N")
            .and_then(Object::as_i64)
            .map_err(|_| Error::Parse(ParseError::InvalidObjectStream))? as usize;
        let first = stream
            .dict
            .get(b"First")
            .and_then(Object::as_i64)
            .map_err(|_| Error::Parse(ParseError::InvalidObjectStream))? as usize;

        // Header: N pairs of (object number, relative offset), whitespace separated.
        let header = std::str::from_utf8(&data[..first.min(data.len())])
            .map_err(|_| Error::Parse(ParseError::InvalidObjectStream))?;
        let mut numbers = header.split_ascii_whitespace();
        let mut pairs = Vec::with_capacity(n);
        for _ in 0..n {
            let num: u32 = numbers
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or(Error::Parse(ParseError::InvalidObjectStream))?;
            let offset: usize = numbers
                .next()
                .and_then(|s| s.parse().ok())
                .ok_or(Error::Parse(ParseError::InvalidObjectStream))?;
            pairs.push((num, offset));
        }

        let extends = stream.dict.get(b"Extends").and_then(Object::as_reference).ok();
        let _ = extends; // chained ObjStm resolution is the caller's responsibility (Document side)

        let mut objects = BTreeMap::new();
        for (num, rel_offset) in pairs {
            let start = first + rel_offset;
            if start > data.len() {
                continue;
            }
            let slice = &data[start..];
            if let Some((obj, _)) = parser::parse_top_level(slice, 0) {
                objects.insert((num, 0), obj);
            }
        }

        Ok(ObjectStream { objects })
    }
}
