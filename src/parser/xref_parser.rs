//! Classic xref table and cross-reference stream parsing (ISO 32000-1
//! §7.5.4, §7.5.8), grounded on the `W`/`Index` field layout shown in
//! `oxidizePdf`'s xref-stream parser and on the subsection-loop shape common
//! to hand-written PDF lexers.

use crate::dictionary::Dictionary;
use crate::error::{Error, ParseError, XrefError};
use crate::object::Object;
use crate::parser::object_parser;
use crate::reader::Reader;
use crate::xref::{Xref, XrefEntry};
use crate::Result;

/// Parse `subsection* trailer` following the `xref` keyword at `pos`.
pub fn parse_classic_xref_and_trailer(bytes: &[u8], mut pos: usize) -> Result<(Xref, Dictionary)> {
    let mut xref = Xref::new(0);

    loop {
        pos = object_parser::skip_space(bytes, pos);
        if bytes[pos..].starts_with(b"trailer") {
            pos += b"trailer".len();
            break;
        }

        let (first, is_int, next) = parse_uint(bytes, pos).ok_or(Error::Parse(ParseError::InvalidXref))?;
        let _ = is_int;
        pos = object_parser::skip_space(bytes, next);
        let (count, _, next) = parse_uint(bytes, pos).ok_or(Error::Parse(ParseError::InvalidXref))?;
        pos = object_parser::skip_space(bytes, next);

        for i in 0..count {
            // Each entry is exactly 20 bytes: 10-digit offset, space,
            // 5-digit generation, space, 'n'/'f', 2-byte EOL.
            if pos + 18 > bytes.len() {
                return Err(Error::Parse(ParseError::InvalidXref));
            }
            let entry_bytes = &bytes[pos..pos + 18];
            let offset_str = std::str::from_utf8(&entry_bytes[0..10]).map_err(|_| Error::Parse(ParseError::InvalidXref))?;
            let gen_str = std::str::from_utf8(&entry_bytes[11..16]).map_err(|_| Error::Parse(ParseError::InvalidXref))?;
            let kind = entry_bytes[17];
            let object_number = first + i;

            let entry = match kind {
                b'n' => {
                    let offset: u32 = offset_str.trim().parse().map_err(|_| Error::Parse(ParseError::InvalidXref))?;
                    let generation: u16 = gen_str.trim().parse().map_err(|_| Error::Parse(ParseError::InvalidXref))?;
                    XrefEntry::Normal { offset, generation }
                }
                b'f' => {
                    let next: u32 = offset_str.trim().parse().map_err(|_| Error::Parse(ParseError::InvalidXref))?;
                    XrefEntry::Free { next }
                }
                _ => return Err(Error::Parse(ParseError::InvalidXref)),
            };
            xref.insert(object_number, entry);

            // Advance past the 20-byte record; tolerate single-byte EOL too.
            pos += 18;
            pos = object_parser::skip_space(bytes, pos);
        }
    }

    pos = object_parser::skip_space(bytes, pos);
    let (dict, _) = object_parser::parse_dict(bytes, pos, 0).ok_or(Error::Parse(ParseError::InvalidXref))?;
    let size = dict.get(b"Size").and_then(Object::as_i64).unwrap_or(0).max(0) as u32;
    xref.size = size;
    Ok((xref, dict))
}

fn parse_uint(bytes: &[u8], pos: usize) -> Option<(u32, bool, usize)> {
    match object_parser::parse_value(bytes, pos, 0)? {
        (Object::Number(n, true), end) if n >= 0.0 => Some((n as u32, true, end)),
        _ => None,
    }
}

/// Parse a `/Type /XRef` cross-reference stream object (§7.5.8). `bytes`
/// points at the `N G obj` header.
pub fn parse_xref_stream(bytes: &[u8], pos: usize, reader: &Reader) -> Result<(Xref, Dictionary)> {
    use std::collections::HashSet;

    let mut already_seen = HashSet::new();
    let (_, obj) = super::indirect_object(
        super::ParserInput::new_extra(&bytes[pos..], "xref-stream"),
        pos,
        None,
        reader,
        &mut already_seen,
    )?;
    let stream = obj.as_stream().map_err(|_| Error::Parse(ParseError::InvalidXref))?;
    let dict = stream.dict.clone();

    let widths: Vec<usize> = dict
        .get(b"W")
        .and_then(Object::as_array)
        .map_err(|_| Error::Xref(XrefError::MissingWidths))?
        .iter()
        .map(|o| o.as_i64().unwrap_or(0) as usize)
        .collect();
    if widths.len() != 3 {
        return Err(Error::Xref(XrefError::InvalidWidths));
    }
    let (w0, w1, w2) = (widths[0], widths[1], widths[2]);
    let record_len = w0 + w1 + w2;

    let size = dict.get(b"Size").and_then(Object::as_i64).unwrap_or(0).max(0) as u32;
    let index: Vec<(u32, u32)> = match dict.get(b"Index").and_then(Object::as_array) {
        Ok(arr) => arr
            .chunks(2)
            .filter_map(|pair| match pair {
                [a, b] => Some((a.as_i64().unwrap_or(0) as u32, b.as_i64().unwrap_or(0) as u32)),
                _ => None,
            })
            .collect(),
        Err(_) => vec![(0, size)],
    };

    let data = stream.decompressed_content()?;
    let mut xref = Xref::new(size);
    let mut cursor = 0usize;

    for (first, count) in index {
        for i in 0..count {
            if cursor + record_len > data.len() {
                break;
            }
            let field = |off: usize, width: usize| -> u64 {
                data[cursor + off..cursor + off + width]
                    .iter()
                    .fold(0u64, |acc, &b| (acc << 8) | b as u64)
            };
            // A zero-width field 1 defaults to type 1 (in-use) per spec.
            let entry_type = if w0 == 0 { 1 } else { field(0, w0) };
            let f2 = field(w0, w1);
            let f3 = field(w0 + w1, w2);

            let object_number = first + i;
            let entry = match entry_type {
                0 => XrefEntry::Free { next: f2 as u32 },
                1 => XrefEntry::Normal { offset: f2 as u32, generation: f3 as u16 },
                2 => XrefEntry::Compressed { container: f2 as u32, index: f3 as u16 },
                _ => XrefEntry::UnusableFree,
            };
            xref.insert(object_number, entry);
            cursor += record_len;
        }
    }

    Ok((xref, dict))
}
