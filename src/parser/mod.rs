//! Entry points that glue the leaf-value grammar in [`object_parser`] to the
//! file-level productions (header, xref, trailer, indirect objects) that
//! need access to a [`Reader`] for resolving indirect `/Length` values.

mod object_parser;
mod xref_parser;

pub mod content_parser;

pub use object_parser::{parse_dict, parse_top_level, parse_value, skip_space, MAX_BRACKET, MAX_CONTAINER_DEPTH};

use std::collections::HashSet;

use nom_locate::LocatedSpan;

use crate::dictionary::Dictionary;
use crate::error::{Error, ParseError};
use crate::object::{Object, ObjectId};
use crate::reader::Reader;
use crate::xref::Xref;
use crate::Result;

/// A byte slice tagged with a human-readable name for diagnostics, mirroring
/// the `nom_locate` span type the teacher's lexer threads through every
/// entry point.
pub type ParserInput<'a> = LocatedSpan<&'a [u8], &'a str>;

/// Parse the `%PDF-x.y` header, returning the version string (e.g. `"1.7"`).
pub fn header(input: ParserInput) -> Option<String> {
    let bytes = input.fragment();
    if !bytes.starts_with(b"%PDF-") {
        return None;
    }
    let rest = &bytes[5..];
    let end = rest.iter().position(|&b| b == b'\r' || b == b'\n').unwrap_or(rest.len());
    std::str::from_utf8(&rest[..end]).ok().map(|s| s.trim().to_string())
}

/// Parse the four-byte (or more) high-bit binary marker comment on line 2 of
/// a well-formed PDF (§4.1, "binary marker" convention).
pub fn binary_mark(input: ParserInput) -> Option<Vec<u8>> {
    let bytes = input.fragment();
    if bytes.is_empty() || bytes[0] != b'%' {
        return None;
    }
    let end = bytes.iter().position(|&b| b == b'\r' || b == b'\n').unwrap_or(bytes.len());
    Some(bytes[1..end].to_vec())
}

/// Parse the trailing `startxref\n<offset>\n%%EOF` footer, returning the
/// byte offset of the cross-reference section.
pub fn xref_start(input: ParserInput) -> Option<i64> {
    let bytes = input.fragment();
    let pos = bytes.windows(b"startxref".len()).position(|w| w == b"startxref")?;
    let after = &bytes[pos + b"startxref".len()..];
    let after_pos = object_parser::skip_space(after, 0);
    let (n, is_int, _) = object_parser::parse_value(after, after_pos, 0).and_then(|(obj, end)| match obj {
        Object::Number(n, is_int) => Some((n, is_int, end)),
        _ => None,
    })?;
    if !is_int || n < 0.0 {
        return None;
    }
    Some(n as i64)
}

/// Parse either a classic xref table + trailer, or a cross-reference stream
/// (whose trailer dictionary is the stream dictionary itself) at `input`.
pub fn xref_and_trailer(input: ParserInput, reader: &Reader) -> Result<(Xref, Dictionary)> {
    let bytes = input.fragment();
    let pos = object_parser::skip_space(bytes, 0);
    if bytes[pos..].starts_with(b"xref") {
        xref_parser::parse_classic_xref_and_trailer(bytes, pos + b"xref".len())
    } else {
        xref_parser::parse_xref_stream(bytes, pos, reader)
    }
}

/// Parse the indirect object `N G obj ... endobj` located at `offset` in
/// `reader`'s buffer. When `expected_id` is given, a mismatched object
/// number/generation is still returned (callers decide whether to trust the
/// xref table or the object header, per §4.1's "object header wins"
/// recovery rule) rather than erroring.
pub fn indirect_object(
    input: ParserInput, offset: usize, expected_id: Option<ObjectId>, reader: &Reader,
    already_seen: &mut HashSet<ObjectId>,
) -> Result<(ObjectId, Object)> {
    let bytes = input.fragment();
    let mut p = object_parser::skip_space(bytes, 0);

    let (num, is_int_num, next) = match object_parser::parse_value(bytes, p, 0) {
        Some((Object::Number(n, true), end)) => (n as u32, true, end),
        _ => return Err(Error::Parse(ParseError::Syntax { offset, message: "expected object number".into() })),
    };
    let _ = is_int_num;
    p = object_parser::skip_space(bytes, next);
    let (generation, _, next) = match object_parser::parse_value(bytes, p, 0) {
        Some((Object::Number(n, true), end)) => (n as u16, true, end),
        _ => return Err(Error::Parse(ParseError::Syntax { offset, message: "expected generation number".into() })),
    };
    p = object_parser::skip_space(bytes, next);
    if !bytes[p..].starts_with(b"obj") {
        return Err(Error::Parse(ParseError::Syntax { offset, message: "expected `obj` keyword".into() }));
    }
    p += 3;

    let id = expected_id.unwrap_or((num, generation));

    p = object_parser::skip_space(bytes, p);
    let (mut obj, after_value) = object_parser::parse_value(bytes, p, 0)
        .ok_or(Error::Parse(ParseError::Syntax { offset, message: "malformed object value".into() }))?;
    p = object_parser::skip_space(bytes, after_value);

    if bytes[p..].starts_with(b"stream") {
        let dict = obj
            .as_dict()
            .map_err(|_| Error::Parse(ParseError::MissingStreamDictionary))?
            .clone();
        p += b"stream".len();
        // `stream` is followed by CRLF or LF (never a bare CR) before data.
        if bytes.get(p) == Some(&b'\r') {
            p += 1;
        }
        if bytes.get(p) == Some(&b'\n') {
            p += 1;
        }
        let data_start = p;

        let length = match dict.get(b"Length") {
            Ok(Object::Number(n, true)) => Some(*n as i64),
            Ok(Object::Reference(len_id)) => {
                if already_seen.contains(len_id) {
                    None
                } else {
                    let mut seen = already_seen.clone();
                    reader.get_object(*len_id, &mut seen).ok().and_then(|o| o.as_i64().ok())
                }
            }
            _ => None,
        };

        let data_end = match length {
            Some(len) if len >= 0 && data_start + len as usize <= bytes.len() => {
                let candidate_end = data_start + len as usize;
                // Trust the declared length only if `endstream` follows shortly
                // after (allowing for trailing EOL before the keyword).
                let tail = object_parser::skip_space(bytes, candidate_end);
                if bytes[tail..].starts_with(b"endstream") {
                    candidate_end
                } else {
                    scan_for_endstream(bytes, data_start)
                        .ok_or(Error::Parse(ParseError::TruncatedStream))?
                }
            }
            _ => scan_for_endstream(bytes, data_start).ok_or(Error::Parse(ParseError::TruncatedStream))?,
        };

        let content = bytes[data_start..data_end].to_vec();
        let mut stream = crate::object::Stream::new(dict, content);
        stream.start_position = Some(offset + data_start);
        obj = Object::Stream(stream);
    }

    Ok((id, obj))
}

/// Scan forward from `start` for the literal `endstream` keyword, returning
/// the offset of the byte just before it (trimming one trailing EOL). Used
/// when the declared `/Length` is missing, indirect-and-unresolvable, or
/// simply wrong (§4.1 recovery rule 2).
fn scan_for_endstream(bytes: &[u8], start: usize) -> Option<usize> {
    let needle = b"endstream";
    let pos = bytes[start..].windows(needle.len()).position(|w| w == needle)? + start;
    let mut end = pos;
    if end > start && bytes[end - 1] == b'\n' {
        end -= 1;
        if end > start && bytes[end - 1] == b'\r' {
            end -= 1;
        }
    } else if end > start && bytes[end - 1] == b'\r' {
        end -= 1;
    }
    Some(end)
}
