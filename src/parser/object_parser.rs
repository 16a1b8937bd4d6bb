//! The PDF object grammar (ISO 32000-1 §7.2–§7.3), implemented as a small
//! recursive-descent lexer over a byte slice. Leaf tokens (numbers, bare
//! keywords) are recognized with `nom` combinators; the recursive
//! productions (arrays, dictionaries, strings) are hand-written state
//! machines since PDF's exact whitespace/escape/truncation rules don't map
//! cleanly onto declarative combinator chains without losing the byte
//! offsets recovery needs.

use nom::branch::alt;
use nom::bytes::complete::take_while1;
use nom::character::complete::{char as nom_char, digit0};
use nom::combinator::{opt, recognize};
use nom::sequence::{pair, preceded};
use nom::Parser;

use crate::dictionary::Dictionary;
use crate::object::{Object, StringFormat};

/// Maximum allowed nesting of literal strings, arrays, and dictionaries.
/// Guards against adversarial/malformed input driving unbounded recursion.
pub const MAX_BRACKET: usize = 100;
pub const MAX_CONTAINER_DEPTH: usize = 256;

fn is_whitespace(b: u8) -> bool {
    matches!(b, 0x00 | b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// Skip whitespace and `%`-to-EOL comments, returning the new position.
pub fn skip_space(bytes: &[u8], mut pos: usize) -> usize {
    loop {
        while pos < bytes.len() && is_whitespace(bytes[pos]) {
            pos += 1;
        }
        if pos < bytes.len() && bytes[pos] == b'%' {
            while pos < bytes.len() && bytes[pos] != b'\n' && bytes[pos] != b'\r' {
                pos += 1;
            }
            continue;
        }
        break;
    }
    pos
}

fn starts_with(bytes: &[u8], pos: usize, tag: &[u8]) -> bool {
    bytes[pos..].starts_with(tag)
}

type NomErr<'a> = nom::error::Error<&'a [u8]>;

/// Parse a PDF number: optional sign, digits, optional `.digits`.
/// Scientific notation is not part of PDF grammar (spec §4.1). The token
/// itself is recognized with `nom`; only the float conversion is manual.
fn parse_number(bytes: &[u8], pos: usize) -> Option<(f64, bool, usize)> {
    let input = &bytes[pos..];
    let sign = opt(alt((nom_char::<_, NomErr>('+'), nom_char('-'))));
    let mut number = recognize(pair(sign, pair(digit0::<_, NomErr>, opt(preceded(nom_char('.'), digit0)))));
    let (rest, matched): (&[u8], &[u8]) = number.parse(input).ok()?;
    let digit_count = matched.iter().filter(|b| b.is_ascii_digit()).count();
    if digit_count == 0 {
        return None;
    }
    let is_integer = !matched.contains(&b'.');
    let consumed = input.len() - rest.len();
    let text = std::str::from_utf8(matched).ok()?;
    let value: f64 = text.parse().ok()?;
    Some((value, is_integer, pos + consumed))
}

fn parse_name(bytes: &[u8], pos: usize) -> Option<(Vec<u8>, usize)> {
    if pos >= bytes.len() || bytes[pos] != b'/' {
        return None;
    }
    let body = &bytes[pos + 1..];
    let run_len: usize = take_while1::<_, _, NomErr>(is_regular)(body)
        .map(|(_, matched)| matched.len())
        .unwrap_or(0);
    let run = &body[..run_len];

    let mut out = Vec::with_capacity(run.len());
    let mut i = 0;
    while i < run.len() {
        if run[i] == b'#' && i + 2 < run.len() && run[i + 1].is_ascii_hexdigit() && run[i + 2].is_ascii_hexdigit() {
            let hi = (run[i + 1] as char).to_digit(16).unwrap();
            let lo = (run[i + 2] as char).to_digit(16).unwrap();
            out.push((hi * 16 + lo) as u8);
            i += 3;
        } else {
            out.push(run[i]);
            i += 1;
        }
    }
    Some((out, pos + 1 + run_len))
}

fn parse_literal_string(bytes: &[u8], pos: usize) -> Option<(Vec<u8>, usize)> {
    if pos >= bytes.len() || bytes[pos] != b'(' {
        return None;
    }
    let mut p = pos + 1;
    let mut depth = 1usize;
    let mut out = Vec::new();
    while p < bytes.len() && depth > 0 {
        let b = bytes[p];
        match b {
            b'\\' if p + 1 < bytes.len() => {
                let esc = bytes[p + 1];
                match esc {
                    b'n' => {
                        out.push(b'\n');
                        p += 2;
                    }
                    b'r' => {
                        out.push(b'\r');
                        p += 2;
                    }
                    b't' => {
                        out.push(b'\t');
                        p += 2;
                    }
                    b'b' => {
                        out.push(0x08);
                        p += 2;
                    }
                    b'f' => {
                        out.push(0x0C);
                        p += 2;
                    }
                    b'(' => {
                        out.push(b'(');
                        p += 2;
                    }
                    b')' => {
                        out.push(b')');
                        p += 2;
                    }
                    b'\\' => {
                        out.push(b'\\');
                        p += 2;
                    }
                    b'\r' => {
                        // line continuation; also swallow a following \n (CRLF)
                        p += 2;
                        if p < bytes.len() && bytes[p] == b'\n' {
                            p += 1;
                        }
                    }
                    b'\n' => {
                        p += 2;
                    }
                    b'0'..=b'7' => {
                        let mut val: u32 = 0;
                        let mut n = 0;
                        p += 1;
                        while n < 3 && p < bytes.len() && (b'0'..=b'7').contains(&bytes[p]) {
                            val = val * 8 + (bytes[p] - b'0') as u32;
                            p += 1;
                            n += 1;
                        }
                        out.push((val % 256) as u8);
                    }
                    _ => {
                        // Unknown escape: backslash is ignored, char is kept verbatim.
                        out.push(esc);
                        p += 2;
                    }
                }
            }
            b'(' => {
                depth += 1;
                if depth > MAX_BRACKET {
                    return None;
                }
                out.push(b);
                p += 1;
            }
            b')' => {
                depth -= 1;
                if depth > 0 {
                    out.push(b);
                }
                p += 1;
            }
            b'\r' => {
                // Raw CR (and CRLF) in a literal string is normalized to \n.
                out.push(b'\n');
                p += 1;
                if p < bytes.len() && bytes[p] == b'\n' {
                    p += 1;
                }
            }
            _ => {
                out.push(b);
                p += 1;
            }
        }
    }
    if depth != 0 {
        return None;
    }
    Some((out, p))
}

fn parse_hex_string(bytes: &[u8], pos: usize) -> Option<(Vec<u8>, usize)> {
    if pos >= bytes.len() || bytes[pos] != b'<' {
        return None;
    }
    // `<<` starts a dictionary, not a hex string.
    if pos + 1 < bytes.len() && bytes[pos + 1] == b'<' {
        return None;
    }
    let mut p = pos + 1;
    let mut nibbles = Vec::new();
    while p < bytes.len() && bytes[p] != b'>' {
        let b = bytes[p];
        if is_whitespace(b) {
            p += 1;
            continue;
        }
        let v = (b as char).to_digit(16)?;
        nibbles.push(v as u8);
        p += 1;
    }
    if p >= bytes.len() {
        return None;
    }
    p += 1; // consume '>'
    if nibbles.len() % 2 == 1 {
        nibbles.push(0);
    }
    let out = nibbles.chunks(2).map(|c| (c[0] << 4) | c[1]).collect();
    Some((out, p))
}

fn parse_keyword(bytes: &[u8], pos: usize, kw: &[u8]) -> Option<usize> {
    if starts_with(bytes, pos, kw) {
        let end = pos + kw.len();
        // Ensure the keyword isn't a prefix of a longer regular run.
        if end >= bytes.len() || !is_regular(bytes[end]) {
            return Some(end);
        }
    }
    None
}

/// Try to parse `<int> <int> R` starting at `pos`, with two-token,
/// rewindable lookahead (spec §4.1).
fn try_parse_reference(bytes: &[u8], pos: usize) -> Option<(Object, usize)> {
    let (n1, is_int1, p1) = parse_number(bytes, pos)?;
    if !is_int1 || n1 < 0.0 {
        return None;
    }
    let p1s = skip_space(bytes, p1);
    let (n2, is_int2, p2) = parse_number(bytes, p1s)?;
    if !is_int2 || n2 < 0.0 {
        return None;
    }
    let p2s = skip_space(bytes, p2);
    let p3 = parse_keyword(bytes, p2s, b"R")?;
    Some((Object::Reference((n1 as u32, n2 as u16)), p3))
}

/// Parse one PDF value at `pos`. `depth` bounds array/dictionary recursion.
pub fn parse_value(bytes: &[u8], pos: usize, depth: usize) -> Option<(Object, usize)> {
    let pos = skip_space(bytes, pos);
    if pos >= bytes.len() {
        return None;
    }
    if depth > MAX_CONTAINER_DEPTH {
        return None;
    }

    match bytes[pos] {
        b'/' => {
            let (name, end) = parse_name(bytes, pos)?;
            Some((Object::Name(name), end))
        }
        b'(' => {
            let (s, end) = parse_literal_string(bytes, pos)?;
            Some((Object::String(s, StringFormat::Literal), end))
        }
        b'<' if pos + 1 < bytes.len() && bytes[pos + 1] == b'<' => {
            let (dict, end) = parse_dict(bytes, pos, depth + 1)?;
            Some((Object::Dictionary(dict), end))
        }
        b'<' => {
            let (s, end) = parse_hex_string(bytes, pos)?;
            Some((Object::String(s, StringFormat::Hexadecimal), end))
        }
        b'[' => {
            let (arr, end) = parse_array(bytes, pos, depth + 1)?;
            Some((Object::Array(arr), end))
        }
        b't' => parse_keyword(bytes, pos, b"true").map(|end| (Object::Boolean(true), end)),
        b'f' => parse_keyword(bytes, pos, b"false").map(|end| (Object::Boolean(false), end)),
        b'n' => parse_keyword(bytes, pos, b"null").map(|end| (Object::Null, end)),
        b'+' | b'-' | b'.' | b'0'..=b'9' => {
            if let Some((obj, end)) = try_parse_reference(bytes, pos) {
                Some((obj, end))
            } else {
                let (n, is_int, end) = parse_number(bytes, pos)?;
                Some((Object::Number(n, is_int), end))
            }
        }
        _ => None,
    }
}

fn parse_array(bytes: &[u8], pos: usize, depth: usize) -> Option<(Vec<Object>, usize)> {
    if depth > MAX_CONTAINER_DEPTH {
        return None;
    }
    debug_assert_eq!(bytes[pos], b'[');
    let mut p = pos + 1;
    let mut out = Vec::new();
    loop {
        p = skip_space(bytes, p);
        if p >= bytes.len() {
            return None;
        }
        if bytes[p] == b']' {
            return Some((out, p + 1));
        }
        let (obj, next) = parse_value(bytes, p, depth)?;
        out.push(obj);
        p = next;
    }
}

pub fn parse_dict(bytes: &[u8], pos: usize, depth: usize) -> Option<(Dictionary, usize)> {
    if depth > MAX_CONTAINER_DEPTH {
        return None;
    }
    debug_assert!(starts_with(bytes, pos, b"<<"));
    let mut p = pos + 2;
    let mut dict = Dictionary::new();
    loop {
        p = skip_space(bytes, p);
        if p >= bytes.len() {
            return None;
        }
        if starts_with(bytes, p, b">>") {
            return Some((dict, p + 2));
        }
        let (key, next) = parse_name(bytes, p)?;
        p = skip_space(bytes, next);
        let (value, next) = parse_value(bytes, p, depth)?;
        dict.set(key, value);
        p = next;
    }
}

/// Parse a top-level object that cannot contain a `stream` keyword (used
/// for object-stream members, which ISO 32000-1 §7.5.7 forbids from being
/// streams themselves).
pub fn parse_top_level(bytes: &[u8], pos: usize) -> Option<(Object, usize)> {
    parse_value(bytes, pos, 0)
}
