//! Content-stream interpreter (ISO 32000-1 §7.8, §9): operator dispatch,
//! the graphics/text state machines, and `Do`-driven Form XObject
//! recursion. Produces positioned [`TextRun`]s and [`ImageObject`]
//! placement records rather than rendering pixels.

use std::collections::HashMap;

use crate::dictionary::Dictionary;
use crate::error::Result;
use crate::geometry::Matrix;
use crate::object::{Object, Stream};
use crate::parser::content_parser::{self, ContentOp, ContentToken};

/// A single positioned run of shown text (§4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub font_name: String,
    pub size: f64,
    pub render_mode: i64,
    pub matrix: Matrix,
    pub raw_bytes: Vec<u8>,
}

/// Placement metadata for a painted Image XObject. Pixel decoding is out of
/// scope; this only records where and how large the image was painted.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageObject {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color_space: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphicsObject {
    Text(TextRun),
    Image(ImageObject),
}

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    pub max_recursion_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions { max_recursion_depth: 16 }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
}

#[derive(Debug, Clone)]
struct TextState {
    tm: Matrix,
    tlm: Matrix,
    char_spacing: f64,
    word_spacing: f64,
    h_scale: f64,
    leading: f64,
    font_name: String,
    font_size: f64,
    rise: f64,
    render_mode: i64,
}

impl Default for TextState {
    fn default() -> Self {
        TextState {
            tm: Matrix::identity(),
            tlm: Matrix::identity(),
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scale: 1.0,
            leading: 0.0,
            font_name: String::new(),
            font_size: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

/// Glyph widths (1/1000 em) for a simple (single-byte-encoded) font.
struct FontWidths {
    first_char: i64,
    widths: Vec<f64>,
    missing_width: f64,
}

impl FontWidths {
    fn width_of(&self, code: u8) -> f64 {
        let idx = code as i64 - self.first_char;
        if idx >= 0 {
            if let Some(w) = self.widths.get(idx as usize) {
                return *w;
            }
        }
        self.missing_width
    }
}

fn load_font_widths(
    resources: &Dictionary, font_name: &str, resolve: &dyn Fn(&Object) -> Result<Object>,
) -> Option<FontWidths> {
    let fonts = resolve(resources.get(b"Font").ok()?).ok()?;
    let fonts = fonts.as_dict().ok()?;
    let font_obj = resolve(fonts.get(font_name.as_bytes()).ok()?).ok()?;
    let font_dict = font_obj.as_dict().ok()?;

    let first_char = font_dict.get(b"FirstChar").and_then(|o| o.as_i64()).unwrap_or(0);
    let missing_width = font_dict
        .get(b"FontDescriptor")
        .ok()
        .and_then(|o| resolve(o).ok())
        .and_then(|d| d.as_dict().ok().and_then(|d| d.get(b"MissingWidth").and_then(|o| o.as_f64()).ok()))
        .unwrap_or(0.0);
    let widths = resolve(font_dict.get(b"Widths").ok()?)
        .ok()?
        .as_array()
        .ok()?
        .iter()
        .map(|o| o.as_f64().unwrap_or(missing_width))
        .collect();
    Some(FontWidths { first_char, widths, missing_width })
}

/// Byte-to-Unicode mapping for a font, resolved from its `/ToUnicode` CMap
/// when present, else from its base `/Encoding` name plus `/Differences`
/// (§4.6, §9.10.3). `two_byte` selects the Type0/CID 2-byte code path.
#[derive(Debug, Default)]
struct FontEncoding {
    two_byte: bool,
    single: HashMap<u8, String>,
    multi: HashMap<u16, String>,
}

impl FontEncoding {
    fn decode(&self, bytes: &[u8]) -> String {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|chunk| {
                    let code =
                        if chunk.len() == 2 { u16::from_be_bytes([chunk[0], chunk[1]]) } else { chunk[0] as u16 };
                    self.multi
                        .get(&code)
                        .cloned()
                        .or_else(|| char::from_u32(code as u32).map(|c| c.to_string()))
                        .unwrap_or_default()
                })
                .collect()
        } else {
            bytes.iter().map(|&b| self.single.get(&b).cloned().unwrap_or_else(|| (b as char).to_string())).collect()
        }
    }
}

fn load_font_encoding(
    resources: &Dictionary, font_name: &str, resolve: &dyn Fn(&Object) -> Result<Object>,
) -> FontEncoding {
    let Some(font_dict) = resources
        .get(b"Font")
        .ok()
        .and_then(|o| resolve(o).ok())
        .and_then(|d| d.as_dict().ok().cloned())
        .and_then(|fonts| fonts.get(font_name.as_bytes()).ok().cloned())
        .and_then(|o| resolve(&o).ok())
        .and_then(|o| o.as_dict().ok().cloned())
    else {
        return FontEncoding::default();
    };

    let is_type0 = font_dict.get(b"Subtype").ok().and_then(|o| o.as_name_str().ok()) == Some("Type0");

    if let Some(map) = font_dict
        .get(b"ToUnicode")
        .ok()
        .and_then(|o| resolve(o).ok())
        .and_then(|o| o.as_stream().ok().and_then(|s| s.decompressed_content().ok()))
        .and_then(|bytes| parse_to_unicode_cmap(&bytes))
    {
        let single = if is_type0 {
            HashMap::new()
        } else {
            map.iter().filter(|&(&k, _)| k <= 0xFF).map(|(&k, v)| (k as u8, v.clone())).collect()
        };
        return FontEncoding { two_byte: is_type0, single, multi: map };
    }

    if is_type0 {
        // Identity-H/V composite font with no ToUnicode: best effort, treat
        // the 2-byte code as its own codepoint.
        return FontEncoding { two_byte: true, single: HashMap::new(), multi: HashMap::new() };
    }

    let encoding_obj = font_dict.get(b"Encoding").ok().and_then(|o| resolve(o).ok());
    let (base_name, differences) = match &encoding_obj {
        Some(Object::Name(name)) => (std::str::from_utf8(name).ok().map(str::to_string), None),
        Some(Object::Dictionary(dict)) => {
            let base = dict.get(b"BaseEncoding").ok().and_then(|o| o.as_name_str().ok()).map(str::to_string);
            let diffs = dict.get(b"Differences").ok().and_then(|o| o.as_array().ok()).map(<[Object]>::to_vec);
            (base, diffs)
        }
        _ => (None, None),
    };

    let mut single = base_encoding_table(base_name.as_deref());

    if let Some(diffs) = differences {
        let mut code = 0u32;
        for item in &diffs {
            if let Ok(code_num) = item.as_i64() {
                code = code_num as u32;
            } else if let Object::Name(name) = item {
                if let Some(ch) = std::str::from_utf8(name).ok().and_then(glyph_name_to_unicode) {
                    if code <= 0xFF {
                        single.insert(code as u8, ch.to_string());
                    }
                }
                code += 1;
            }
        }
    }

    FontEncoding { two_byte: false, single, multi: HashMap::new() }
}

/// WinAnsiEncoding is the default base encoding for non-symbolic simple
/// fonts when `/Encoding` is absent (§9.6.6.2); its 0x20-0x7E and 0xA0-0xFF
/// ranges already match ASCII/Latin-1 codepoints, so only the 0x80-0x9F
/// gap needs an explicit table.
const CP1252_HIGH: &[(u8, u32)] = &[
    (0x80, 0x20AC),
    (0x82, 0x201A),
    (0x83, 0x0192),
    (0x84, 0x201E),
    (0x85, 0x2026),
    (0x86, 0x2020),
    (0x87, 0x2021),
    (0x88, 0x02C6),
    (0x89, 0x2030),
    (0x8A, 0x0160),
    (0x8B, 0x2039),
    (0x8C, 0x0152),
    (0x8E, 0x017D),
    (0x91, 0x2018),
    (0x92, 0x2019),
    (0x93, 0x201C),
    (0x94, 0x201D),
    (0x95, 0x2022),
    (0x96, 0x2013),
    (0x97, 0x2014),
    (0x98, 0x02DC),
    (0x99, 0x2122),
    (0x9A, 0x0161),
    (0x9B, 0x203A),
    (0x9C, 0x0153),
    (0x9E, 0x017E),
    (0x9F, 0x0178),
];

/// MacRomanEncoding's 0x80-0xFF range diverges from Latin-1 entirely, so it
/// needs a full table rather than a handful of exceptions.
const MAC_ROMAN_HIGH: &[(u8, u32)] = &[
    (0x80, 0x00C4), (0x81, 0x00C5), (0x82, 0x00C7), (0x83, 0x00C9), (0x84, 0x00D1),
    (0x85, 0x00D6), (0x86, 0x00DC), (0x87, 0x00E1), (0x88, 0x00E0), (0x89, 0x00E2),
    (0x8A, 0x00E4), (0x8B, 0x00E3), (0x8C, 0x00E5), (0x8D, 0x00E7), (0x8E, 0x00E9),
    (0x8F, 0x00E8), (0x90, 0x00EA), (0x91, 0x00EB), (0x92, 0x00ED), (0x93, 0x00EC),
    (0x94, 0x00EE), (0x95, 0x00EF), (0x96, 0x00F1), (0x97, 0x00F3), (0x98, 0x00F2),
    (0x99, 0x00F4), (0x9A, 0x00F6), (0x9B, 0x00F5), (0x9C, 0x00FA), (0x9D, 0x00F9),
    (0x9E, 0x00FB), (0x9F, 0x00FC), (0xA0, 0x2020), (0xA1, 0x00B0), (0xA2, 0x00A2),
    (0xA3, 0x00A3), (0xA4, 0x00A7), (0xA5, 0x2022), (0xA6, 0x00B6), (0xA7, 0x00DF),
    (0xA8, 0x00AE), (0xA9, 0x00A9), (0xAA, 0x2122), (0xAB, 0x00B4), (0xAC, 0x00A8),
    (0xAD, 0x2260), (0xAE, 0x00C6), (0xAF, 0x00D8), (0xB0, 0x221E), (0xB1, 0x00B1),
    (0xB2, 0x2264), (0xB3, 0x2265), (0xB4, 0x00A5), (0xB5, 0x00B5), (0xB6, 0x2202),
    (0xB7, 0x2211), (0xB8, 0x220F), (0xB9, 0x03C0), (0xBA, 0x222B), (0xBB, 0x00AA),
    (0xBC, 0x00BA), (0xBD, 0x03A9), (0xBE, 0x00E6), (0xBF, 0x00F8), (0xC0, 0x00BF),
    (0xC1, 0x00A1), (0xC2, 0x00AC), (0xC3, 0x221A), (0xC4, 0x0192), (0xC5, 0x2248),
    (0xC6, 0x2206), (0xC7, 0x00AB), (0xC8, 0x00BB), (0xC9, 0x2026), (0xCA, 0x00A0),
    (0xCB, 0x00C0), (0xCC, 0x00C3), (0xCD, 0x00D5), (0xCE, 0x0152), (0xCF, 0x0153),
    (0xD0, 0x2013), (0xD1, 0x2014), (0xD2, 0x201C), (0xD3, 0x201D), (0xD4, 0x2018),
    (0xD5, 0x2019), (0xD6, 0x00F7), (0xD7, 0x25CA), (0xD8, 0x00FF), (0xD9, 0x0178),
    (0xDA, 0x2044), (0xDB, 0x20AC), (0xDC, 0x2039), (0xDD, 0x203A), (0xDE, 0xFB01),
    (0xDF, 0xFB02), (0xE0, 0x2021), (0xE1, 0x00B7), (0xE2, 0x201A), (0xE3, 0x201E),
    (0xE4, 0x2030), (0xE5, 0x00C2), (0xE6, 0x00CA), (0xE7, 0x00C1), (0xE8, 0x00CB),
    (0xE9, 0x00C8), (0xEA, 0x00CD), (0xEB, 0x00CE), (0xEC, 0x00CF), (0xED, 0x00CC),
    (0xEE, 0x00D3), (0xEF, 0x00D4), (0xF0, 0xF8FF), (0xF1, 0x00D2), (0xF2, 0x00DA),
    (0xF3, 0x00DB), (0xF4, 0x00D9), (0xF5, 0x0131), (0xF6, 0x02C6), (0xF7, 0x02DC),
    (0xF8, 0x00AF), (0xF9, 0x02D8), (0xFA, 0x02D9), (0xFB, 0x02DA), (0xFC, 0x00B8),
    (0xFD, 0x02DD), (0xFE, 0x02DB), (0xFF, 0x02C7),
];

/// StandardEncoding's upper range is rarely seen in the wild (WinAnsi and
/// ToUnicode CMaps cover almost everything in practice); this covers the
/// common punctuation/ligature exceptions rather than the full table.
const STANDARD_HIGH: &[(u8, u32)] = &[
    (0x27, 0x2019),
    (0x60, 0x2018),
    (0xA1, 0x00A1),
    (0xA4, 0x2044),
    (0xA6, 0x0192),
    (0xA9, 0x201C),
    (0xAA, 0x00AB),
    (0xAE, 0xFB01),
    (0xAF, 0xFB02),
    (0xB2, 0x2020),
    (0xB3, 0x2021),
    (0xB7, 0x2022),
    (0xB8, 0x201A),
    (0xB9, 0x201E),
    (0xBA, 0x201D),
    (0xBB, 0x00BB),
    (0xBC, 0x2026),
    (0xBF, 0x00BF),
    (0xE1, 0x00C6),
    (0xE9, 0x00D8),
    (0xF1, 0x00E6),
    (0xF9, 0x00F8),
];

fn base_encoding_table(name: Option<&str>) -> HashMap<u8, String> {
    let source: &[(u8, u32)] = match name {
        Some("MacRomanEncoding") => MAC_ROMAN_HIGH,
        Some("StandardEncoding") => STANDARD_HIGH,
        _ => CP1252_HIGH,
    };
    source.iter().filter_map(|&(b, cp)| char::from_u32(cp).map(|c| (b, c.to_string()))).collect()
}

/// Adobe Glyph List subset covering the names that actually show up in
/// `/Differences` arrays: ASCII punctuation/digits plus common typographic
/// and Latin-1 accented glyphs. Single-letter alphabetic names (`A`, `z`)
/// and `uniXXXX` names resolve without consulting this table.
const AGL_TABLE: &[(&str, char)] = &[
    ("space", ' '), ("exclam", '!'), ("quotedbl", '"'), ("numbersign", '#'),
    ("dollar", '$'), ("percent", '%'), ("ampersand", '&'), ("quotesingle", '\''),
    ("parenleft", '('), ("parenright", ')'), ("asterisk", '*'), ("plus", '+'),
    ("comma", ','), ("hyphen", '-'), ("period", '.'), ("slash", '/'),
    ("zero", '0'), ("one", '1'), ("two", '2'), ("three", '3'), ("four", '4'),
    ("five", '5'), ("six", '6'), ("seven", '7'), ("eight", '8'), ("nine", '9'),
    ("colon", ':'), ("semicolon", ';'), ("less", '<'), ("equal", '='),
    ("greater", '>'), ("question", '?'), ("at", '@'),
    ("bracketleft", '['), ("backslash", '\\'), ("bracketright", ']'),
    ("asciicircum", '^'), ("underscore", '_'), ("grave", '`'),
    ("braceleft", '{'), ("bar", '|'), ("braceright", '}'), ("asciitilde", '~'),
    ("quoteleft", '\u{2018}'), ("quoteright", '\u{2019}'),
    ("quotedblleft", '\u{201C}'), ("quotedblright", '\u{201D}'),
    ("bullet", '\u{2022}'), ("endash", '\u{2013}'), ("emdash", '\u{2014}'),
    ("ellipsis", '\u{2026}'), ("fi", '\u{FB01}'), ("fl", '\u{FB02}'),
    ("dagger", '\u{2020}'), ("daggerdbl", '\u{2021}'), ("florin", '\u{0192}'),
    ("guilsinglleft", '\u{2039}'), ("guilsinglright", '\u{203A}'),
    ("perthousand", '\u{2030}'), ("Euro", '\u{20AC}'), ("trademark", '\u{2122}'),
    ("germandbls", '\u{00DF}'), ("dotlessi", '\u{0131}'),
    ("Agrave", 'À'), ("Aacute", 'Á'), ("Acircumflex", 'Â'), ("Atilde", 'Ã'),
    ("Adieresis", 'Ä'), ("Aring", 'Å'), ("AE", 'Æ'), ("Ccedilla", 'Ç'),
    ("Egrave", 'È'), ("Eacute", 'É'), ("Ecircumflex", 'Ê'), ("Edieresis", 'Ë'),
    ("Igrave", 'Ì'), ("Iacute", 'Í'), ("Icircumflex", 'Î'), ("Idieresis", 'Ï'),
    ("Ntilde", 'Ñ'), ("Ograve", 'Ò'), ("Oacute", 'Ó'), ("Ocircumflex", 'Ô'),
    ("Otilde", 'Õ'), ("Odieresis", 'Ö'), ("Oslash", 'Ø'), ("Ugrave", 'Ù'),
    ("Uacute", 'Ú'), ("Ucircumflex", 'Û'), ("Udieresis", 'Ü'), ("Yacute", 'Ý'),
    ("agrave", 'à'), ("aacute", 'á'), ("acircumflex", 'â'), ("atilde", 'ã'),
    ("adieresis", 'ä'), ("aring", 'å'), ("ae", 'æ'), ("ccedilla", 'ç'),
    ("egrave", 'è'), ("eacute", 'é'), ("ecircumflex", 'ê'), ("edieresis", 'ë'),
    ("igrave", 'ì'), ("iacute", 'í'), ("icircumflex", 'î'), ("idieresis", 'ï'),
    ("ntilde", 'ñ'), ("ograve", 'ò'), ("oacute", 'ó'), ("ocircumflex", 'ô'),
    ("otilde", 'õ'), ("odieresis", 'ö'), ("oslash", 'ø'), ("ugrave", 'ù'),
    ("uacute", 'ú'), ("ucircumflex", 'û'), ("udieresis", 'ü'), ("yacute", 'ý'),
    ("ydieresis", 'ÿ'),
];

fn glyph_name_to_unicode(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() == 4 {
            if let Ok(cp) = u32::from_str_radix(hex, 16) {
                return char::from_u32(cp);
            }
        }
    }
    if name.len() == 1 {
        let c = name.chars().next().unwrap();
        if c.is_ascii_alphabetic() {
            return Some(c);
        }
    }
    AGL_TABLE.iter().find(|&&(n, _)| n == name).map(|&(_, c)| c)
}

/// Parse a `/ToUnicode` CMap stream's `beginbfchar`/`beginbfrange` blocks
/// (§9.10.3) into a code -> Unicode-string map. Ignores `usecmap` and other
/// CMap machinery; PDF producers overwhelmingly emit self-contained
/// bfchar/bfrange tables for ToUnicode.
fn parse_to_unicode_cmap(data: &[u8]) -> Option<HashMap<u16, String>> {
    let text = String::from_utf8_lossy(data);
    let mut map = HashMap::new();

    for block in extract_blocks(&text, "beginbfchar", "endbfchar") {
        for pair in hex_tokens(block).chunks(2) {
            let [src, dst] = pair else { continue };
            if let (Some(code), Some(text)) = (hex_to_code(src), hex_to_string(dst)) {
                map.insert(code, text);
            }
        }
    }

    for block in extract_blocks(&text, "beginbfrange", "endbfrange") {
        for triple in hex_tokens(block).chunks(3) {
            let [lo, hi, dst] = triple else { continue };
            if let (Some(lo), Some(hi), Some(base)) = (hex_to_code(lo), hex_to_code(hi), hex_to_code(dst)) {
                for (offset, code) in (lo..=hi).enumerate() {
                    if let Some(ch) = char::from_u32(base as u32 + offset as u32) {
                        map.insert(code, ch.to_string());
                    }
                }
            }
        }
    }

    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

fn extract_blocks<'a>(text: &'a str, start: &str, end: &str) -> Vec<&'a str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(start) {
        let after = &rest[pos + start.len()..];
        let Some(end_pos) = after.find(end) else { break };
        blocks.push(&after[..end_pos]);
        rest = &after[end_pos + end.len()..];
    }
    blocks
}

fn hex_tokens(block: &str) -> Vec<&str> {
    block.split('<').skip(1).filter_map(|s| s.split('>').next()).collect()
}

fn hex_to_code(hex: &str) -> Option<u16> {
    let digits: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    u16::from_str_radix(&digits, 16).ok()
}

fn hex_to_string(hex: &str) -> Option<String> {
    let digits: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }
    let bytes: Vec<u8> =
        (0..digits.len()).step_by(2).filter_map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok()).collect();
    if bytes.len() * 2 != digits.len() {
        return None;
    }
    let units: Vec<u16> = bytes.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
    Some(String::from_utf16_lossy(&units))
}

fn operand_f64(operands: &[Object], i: usize) -> f64 {
    operands.get(i).and_then(|o| o.as_f64().ok()).unwrap_or(0.0)
}

fn operand_i64(operands: &[Object], i: usize) -> i64 {
    operands.get(i).and_then(|o| o.as_i64().ok()).unwrap_or(0)
}

/// Interpret a page's (already-decoded, already-concatenated) content
/// stream, resolving font/XObject resources through `resolve`.
pub fn interpret_content_stream(
    content: &[u8], resources: &Dictionary, resolve: &dyn Fn(&Object) -> Result<Object>, options: &ParseOptions,
) -> Result<Vec<GraphicsObject>> {
    let mut gstate = GraphicsState { ctm: Matrix::identity() };
    let mut out = Vec::new();
    run(content, resources, resolve, options, 0, &mut gstate, &mut out)?;
    Ok(out)
}

fn run(
    content: &[u8], resources: &Dictionary, resolve: &dyn Fn(&Object) -> Result<Object>, options: &ParseOptions,
    depth: usize, gstate: &mut GraphicsState, out: &mut Vec<GraphicsObject>,
) -> Result<()> {
    if depth > options.max_recursion_depth {
        log::warn!("content stream recursion depth {depth} exceeds limit, stopping");
        return Ok(());
    }

    let tokens = content_parser::tokenize(content);
    let mut stack: Vec<Matrix> = Vec::new();
    let mut tstate = TextState::default();

    for token in &tokens {
        match token {
            ContentToken::InlineImage(image) => {
                let dict = crate::filters::inline_image::expand_abbreviated_keys(&image.dict);
                let (w, h) = inline_image_dims(&dict);
                let color_space =
                    dict.get(b"ColorSpace").ok().and_then(|o| o.as_name_str().ok()).unwrap_or("DeviceGray");
                let (x, y) = gstate.ctm.apply_to_point(0.0, 0.0);
                out.push(GraphicsObject::Image(ImageObject {
                    name: "inline".to_string(),
                    x,
                    y,
                    width: w * gstate.ctm.x_scale(),
                    height: h * gstate.ctm.x_scale(),
                    color_space: color_space.to_string(),
                }));
            }
            ContentToken::Op(op) => {
                dispatch(op, resources, resolve, options, depth, gstate, &mut stack, &mut tstate, out)?;
            }
        }
    }

    if !stack.is_empty() {
        log::warn!("content stream ended with {} unbalanced q/Q save(s)", stack.len());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn dispatch(
    op: &ContentOp, resources: &Dictionary, resolve: &dyn Fn(&Object) -> Result<Object>, options: &ParseOptions,
    depth: usize, gstate: &mut GraphicsState, stack: &mut Vec<Matrix>, tstate: &mut TextState,
    out: &mut Vec<GraphicsObject>,
) -> Result<()> {
    let operands = &op.operands;
    match op.operator.as_str() {
        "q" => stack.push(gstate.ctm),
        "Q" => {
            if let Some(ctm) = stack.pop() {
                gstate.ctm = ctm;
            }
        }
        "cm" if operands.len() >= 6 => {
            let m = Matrix::new(
                operand_f64(operands, 0),
                operand_f64(operands, 1),
                operand_f64(operands, 2),
                operand_f64(operands, 3),
                operand_f64(operands, 4),
                operand_f64(operands, 5),
            );
            gstate.ctm = m.concat(&gstate.ctm);
        }
        "BT" => {
            tstate.tm = Matrix::identity();
            tstate.tlm = Matrix::identity();
        }
        "ET" => {}
        "Tc" => tstate.char_spacing = operand_f64(operands, 0),
        "Tw" => tstate.word_spacing = operand_f64(operands, 0),
        "Tz" => tstate.h_scale = operand_f64(operands, 0) / 100.0,
        "TL" => tstate.leading = operand_f64(operands, 0),
        "Ts" => tstate.rise = operand_f64(operands, 0),
        "Tr" => tstate.render_mode = operand_i64(operands, 0),
        "Tf" => {
            if let Some(Object::Name(name)) = operands.first() {
                tstate.font_name = String::from_utf8_lossy(name).into_owned();
            }
            tstate.font_size = operand_f64(operands, 1);
        }
        "Tm" if operands.len() >= 6 => {
            let m = Matrix::new(
                operand_f64(operands, 0),
                operand_f64(operands, 1),
                operand_f64(operands, 2),
                operand_f64(operands, 3),
                operand_f64(operands, 4),
                operand_f64(operands, 5),
            );
            tstate.tm = m;
            tstate.tlm = m;
        }
        "Td" if operands.len() >= 2 => {
            let t = Matrix::translation(operand_f64(operands, 0), operand_f64(operands, 1));
            tstate.tlm = t.concat(&tstate.tlm);
            tstate.tm = tstate.tlm;
        }
        "TD" if operands.len() >= 2 => {
            tstate.leading = -operand_f64(operands, 1);
            let t = Matrix::translation(operand_f64(operands, 0), operand_f64(operands, 1));
            tstate.tlm = t.concat(&tstate.tlm);
            tstate.tm = tstate.tlm;
        }
        "T*" => {
            let t = Matrix::translation(0.0, -tstate.leading);
            tstate.tlm = t.concat(&tstate.tlm);
            tstate.tm = tstate.tlm;
        }
        "Tj" if !operands.is_empty() => {
            show_text(operands.first(), resources, resolve, gstate, tstate, out);
        }
        "'" if !operands.is_empty() => {
            let t = Matrix::translation(0.0, -tstate.leading);
            tstate.tlm = t.concat(&tstate.tlm);
            tstate.tm = tstate.tlm;
            show_text(operands.first(), resources, resolve, gstate, tstate, out);
        }
        "\"" if operands.len() >= 3 => {
            tstate.word_spacing = operand_f64(operands, 0);
            tstate.char_spacing = operand_f64(operands, 1);
            let t = Matrix::translation(0.0, -tstate.leading);
            tstate.tlm = t.concat(&tstate.tlm);
            tstate.tm = tstate.tlm;
            show_text(operands.get(2), resources, resolve, gstate, tstate, out);
        }
        "TJ" if !operands.is_empty() => {
            if let Some(Object::Array(items)) = operands.first() {
                for item in items {
                    match item {
                        Object::String(..) => show_text(Some(item), resources, resolve, gstate, tstate, out),
                        _ => {
                            if let Ok(n) = item.as_f64() {
                                let tx = -(n / 1000.0) * tstate.font_size * tstate.h_scale;
                                let t = Matrix::translation(tx, 0.0);
                                tstate.tm = t.concat(&tstate.tm);
                            }
                        }
                    }
                }
            }
        }
        "Do" if !operands.is_empty() => {
            if let Object::Name(name) = &operands[0] {
                let name = String::from_utf8_lossy(name).into_owned();
                handle_do(&name, resources, resolve, options, depth, gstate, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn show_text(
    operand: Option<&Object>, resources: &Dictionary, resolve: &dyn Fn(&Object) -> Result<Object>,
    gstate: &GraphicsState, tstate: &mut TextState, out: &mut Vec<GraphicsObject>,
) {
    let Some(Object::String(bytes, _)) = operand else { return };
    let widths = load_font_widths(resources, &tstate.font_name, resolve);
    let encoding = load_font_encoding(resources, &tstate.font_name, resolve);
    let text = encoding.decode(bytes);

    let render_matrix =
        Matrix::new(tstate.font_size * tstate.h_scale, 0.0, 0.0, tstate.font_size, 0.0, tstate.rise)
            .concat(&tstate.tm)
            .concat(&gstate.ctm);
    let (x, y) = (render_matrix.e, render_matrix.f);

    let mut advance = 0.0;
    for &b in bytes.iter() {
        let w0 = widths.as_ref().map(|f| f.width_of(b)).unwrap_or(500.0) / 1000.0;
        let space = if b == 0x20 { tstate.word_spacing } else { 0.0 };
        advance += (w0 * tstate.font_size + tstate.char_spacing + space) * tstate.h_scale;
    }

    out.push(GraphicsObject::Text(TextRun {
        text,
        x,
        y,
        width: advance,
        height: tstate.font_size,
        font_name: tstate.font_name.clone(),
        size: tstate.font_size,
        render_mode: tstate.render_mode,
        matrix: tstate.tm,
        raw_bytes: bytes.clone(),
    }));

    let t = Matrix::translation(advance, 0.0);
    tstate.tm = t.concat(&tstate.tm);
}

fn inline_image_dims(dict: &Dictionary) -> (f64, f64) {
    let w = dict
        .get(b"Width")
        .or_else(|_| dict.get(b"W"))
        .and_then(|o| o.as_f64())
        .unwrap_or(1.0);
    let h = dict
        .get(b"Height")
        .or_else(|_| dict.get(b"H"))
        .and_then(|o| o.as_f64())
        .unwrap_or(1.0);
    (w, h)
}

fn handle_do(
    name: &str, resources: &Dictionary, resolve: &dyn Fn(&Object) -> Result<Object>, options: &ParseOptions,
    depth: usize, gstate: &mut GraphicsState, out: &mut Vec<GraphicsObject>,
) -> Result<()> {
    let Some(xobjects) = resources.get(b"XObject").ok().and_then(|o| resolve(o).ok()) else { return Ok(()) };
    let Some(xobjects) = xobjects.as_dict().ok() else { return Ok(()) };
    let Some(xobj) = xobjects.get(name.as_bytes()).ok().and_then(|o| resolve(o).ok()) else { return Ok(()) };
    let Ok(stream) = xobj.as_stream() else { return Ok(()) };

    let subtype = stream.dict.get(b"Subtype").ok().and_then(|o| o.as_name_str().ok()).unwrap_or("");
    match subtype {
        "Form" => {
            let mut form_ctm = gstate.ctm;
            if let Ok(arr) = stream.dict.get(b"Matrix").and_then(|o| o.as_array()) {
                if arr.len() == 6 {
                    let m = Matrix::new(
                        arr[0].as_f64().unwrap_or(1.0),
                        arr[1].as_f64().unwrap_or(0.0),
                        arr[2].as_f64().unwrap_or(0.0),
                        arr[3].as_f64().unwrap_or(1.0),
                        arr[4].as_f64().unwrap_or(0.0),
                        arr[5].as_f64().unwrap_or(0.0),
                    );
                    form_ctm = m.concat(&form_ctm);
                }
            }
            let form_resources = stream
                .dict
                .get(b"Resources")
                .ok()
                .and_then(|o| resolve(o).ok())
                .and_then(|d| d.as_dict().ok().cloned())
                .unwrap_or_else(|| resources.clone());
            let content = stream.decompressed_content()?;
            let mut inner = GraphicsState { ctm: form_ctm };
            run(&content, &form_resources, resolve, options, depth + 1, &mut inner, out)?;
        }
        "Image" => {
            let width = stream.dict.get(b"Width").and_then(|o| o.as_f64()).unwrap_or(1.0);
            let height = stream.dict.get(b"Height").and_then(|o| o.as_f64()).unwrap_or(1.0);
            let color_space = stream
                .dict
                .get(b"ColorSpace")
                .ok()
                .and_then(|o| o.as_name_str().ok())
                .unwrap_or("DeviceGray")
                .to_string();
            let (x, y) = gstate.ctm.apply_to_point(0.0, 0.0);
            out.push(GraphicsObject::Image(ImageObject {
                name: name.to_string(),
                x,
                y,
                width: width * gstate.ctm.x_scale(),
                height: height * gstate.ctm.x_scale(),
                color_space,
            }));
        }
        _ => {}
    }
    Ok(())
}

/// Concatenate all `TextRun`s' decoded text in document order, one newline
/// per underlying content stream boundary the caller already split on.
pub fn collect_text(objects: &[GraphicsObject]) -> String {
    let mut s = String::new();
    for obj in objects {
        if let GraphicsObject::Text(run) = obj {
            s.push_str(&run.text);
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(obj: &Object) -> Result<Object> {
        Ok(obj.clone())
    }

    #[test]
    fn simple_tj_emits_one_run() {
        let content = b"BT /F1 48 Tf 100 700 Td (Hello World!) Tj ET";
        let resources = Dictionary::new();
        let objs = interpret_content_stream(content, &resources, &identity, &ParseOptions::default()).unwrap();
        assert_eq!(objs.len(), 1);
        match &objs[0] {
            GraphicsObject::Text(run) => {
                assert_eq!(run.text, "Hello World!");
                assert_eq!(run.font_name, "F1");
                assert_eq!(run.size, 48.0);
            }
            _ => panic!("expected text run"),
        }
        assert_eq!(collect_text(&objs), "Hello World!");
    }

    #[test]
    fn tj_array_concatenates_text() {
        let content = b"BT /F1 12 Tf [(Hello) -250 (World)] TJ ET";
        let resources = Dictionary::new();
        let objs = interpret_content_stream(content, &resources, &identity, &ParseOptions::default()).unwrap();
        assert_eq!(collect_text(&objs), "HelloWorld");
    }

    #[test]
    fn unbalanced_q_is_tolerated() {
        let content = b"q q 1 0 0 1 5 5 cm BT /F1 10 Tf (x) Tj ET";
        let resources = Dictionary::new();
        let objs = interpret_content_stream(content, &resources, &identity, &ParseOptions::default()).unwrap();
        assert_eq!(objs.len(), 1);
    }

    #[test]
    fn differences_remap_overrides_base_encoding() {
        let mut encoding_dict = Dictionary::new();
        encoding_dict.set("BaseEncoding", Object::name(b"WinAnsiEncoding".to_vec()));
        encoding_dict.set("Differences", Object::Array(vec![Object::integer(65), Object::name(b"bullet".to_vec())]));

        let mut font_dict = Dictionary::new();
        font_dict.set("Subtype", Object::name(b"Type1".to_vec()));
        font_dict.set("Encoding", Object::Dictionary(encoding_dict));

        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Dictionary(font_dict));

        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let content = b"BT /F1 12 Tf (AB) Tj ET";
        let objs = interpret_content_stream(content, &resources, &identity, &ParseOptions::default()).unwrap();
        assert_eq!(collect_text(&objs), "\u{2022}B");
    }

    #[test]
    fn to_unicode_cmap_overrides_decoding() {
        let cmap = Stream::new(Dictionary::new(), b"1 beginbfchar\n<41> <0042>\nendbfchar".to_vec());

        let mut font_dict = Dictionary::new();
        font_dict.set("Subtype", Object::name(b"Type1".to_vec()));
        font_dict.set("ToUnicode", Object::Stream(cmap));

        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Dictionary(font_dict));

        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let content = b"BT /F1 12 Tf (A) Tj ET";
        let objs = interpret_content_stream(content, &resources, &identity, &ParseOptions::default()).unwrap();
        assert_eq!(collect_text(&objs), "B");
    }
}
