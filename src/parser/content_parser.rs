//! Tokenizer for content-stream operator sequences (ISO 32000-1 §7.8.2),
//! consumed by [`crate::interpreter`]. Content streams share the PDF object
//! grammar for operands but terminate each operation with a bare keyword
//! (the operator) instead of `obj`/`endobj`.

use crate::object::Object;
use crate::parser::object_parser;

/// One operator invocation: zero or more operands followed by the operator
/// keyword (e.g. `1 0 0 1 10 20 cm` → operands `[1,0,0,1,10,20]`, op `"cm"`).
#[derive(Debug, Clone, PartialEq)]
pub struct ContentOp {
    pub operands: Vec<Object>,
    pub operator: String,
}

/// Inline image data captured verbatim between `ID` and `EI` (§8.9.7); the
/// dictionary entries between `BI` and `ID` are parsed as an ordinary
/// operand-less dictionary, but the binary payload cannot be tokenized with
/// the normal grammar since it is arbitrary bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub dict: crate::dictionary::Dictionary,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentToken {
    Op(ContentOp),
    InlineImage(InlineImage),
}

/// Tokenize an entire decoded content stream into operator invocations.
pub fn tokenize(bytes: &[u8]) -> Vec<ContentToken> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut operands = Vec::new();

    loop {
        pos = object_parser::skip_space(bytes, pos);
        if pos >= bytes.len() {
            break;
        }

        match bytes[pos] {
            b'/' | b'(' | b'<' | b'[' | b'+' | b'-' | b'.' | b'0'..=b'9' => {
                if let Some((obj, next)) = object_parser::parse_value(bytes, pos, 0) {
                    operands.push(obj);
                    pos = next;
                    continue;
                }
                pos += 1;
            }
            _ => {
                let (word, next) = read_keyword(bytes, pos);
                if word.is_empty() {
                    pos = next.max(pos + 1);
                    continue;
                }
                if word == "true" {
                    operands.push(Object::Boolean(true));
                } else if word == "false" {
                    operands.push(Object::Boolean(false));
                } else if word == "null" {
                    operands.push(Object::Null);
                } else if word == "BI" {
                    let (image, after) = parse_inline_image(bytes, next);
                    tokens.push(ContentToken::InlineImage(image));
                    operands.clear();
                    pos = after;
                    continue;
                } else {
                    tokens.push(ContentToken::Op(ContentOp { operands: std::mem::take(&mut operands), operator: word }));
                }
                pos = next;
            }
        }
    }

    tokens
}

fn read_keyword(bytes: &[u8], pos: usize) -> (String, usize) {
    let mut p = pos;
    while p < bytes.len() && is_keyword_byte(bytes[p]) {
        p += 1;
    }
    if p == pos {
        return (String::new(), pos);
    }
    (String::from_utf8_lossy(&bytes[pos..p]).into_owned(), p)
}

fn is_keyword_byte(b: u8) -> bool {
    !matches!(
        b,
        0x00 | b'\t' | b'\n' | 0x0C | b'\r' | b' ' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Parse the `BI <dict> ID <binary> EI` inline-image form.
fn parse_inline_image(bytes: &[u8], pos: usize) -> (InlineImage, usize) {
    let mut dict = crate::dictionary::Dictionary::new();
    let mut p = object_parser::skip_space(bytes, pos);
    loop {
        p = object_parser::skip_space(bytes, p);
        if bytes[p..].starts_with(b"ID") {
            p += 2;
            break;
        }
        let Some((key_obj, next)) = object_parser::parse_value(bytes, p, 0) else { break };
        let Object::Name(key) = key_obj else { break };
        p = object_parser::skip_space(bytes, next);
        let Some((value, next)) = object_parser::parse_value(bytes, p, 0) else { break };
        dict.set(key, value);
        p = next;
    }
    // Exactly one whitespace byte separates ID from the binary data.
    if bytes.get(p).is_some_and(|b| matches!(b, b' ' | b'\n' | b'\r' | b'\t')) {
        p += 1;
    }
    let data_start = p;
    let needle = b"EI";
    let end = bytes[data_start..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|rel| data_start + rel)
        .unwrap_or(bytes.len());
    let mut data_end = end;
    if data_end > data_start && bytes[data_end - 1] == b' ' {
        data_end -= 1;
    }
    let data = bytes[data_start..data_end].to_vec();
    let after = (end + 2).min(bytes.len());
    (InlineImage { dict, data }, after)
}

/// Operators that take operands `'` / `"` combine a text-positioning move
/// with `Tj`; callers (the interpreter) special-case these.
pub const NEXT_LINE_SHOW_TEXT: &str = "'";
pub const SET_SPACING_SHOW_TEXT: &str = "\"";
