//! Group 3/4 fax decompression (ISO 32000-1 §7.4.6, ITU-T T.4/T.6). Original
//! implementation: no file in the reference corpus covers bit-level fax
//! decoding, so this follows the ITU run-length/mode-code tables directly.

use crate::dictionary::Dictionary;
use crate::error::CodecError;
use crate::object::Object;

pub struct CcittParams {
    pub k: i64,
    pub columns: usize,
    pub rows: usize,
    pub black_is_1: bool,
    pub encoded_byte_align: bool,
}

impl Default for CcittParams {
    fn default() -> Self {
        CcittParams { k: 0, columns: 1728, rows: 0, black_is_1: false, encoded_byte_align: false }
    }
}

fn params_from_dict(dict: Option<&Dictionary>) -> CcittParams {
    let mut p = CcittParams::default();
    let Some(dict) = dict else { return p };
    if let Ok(v) = dict.get(b"K").and_then(Object::as_i64) {
        p.k = v;
    }
    if let Ok(v) = dict.get(b"Columns").and_then(Object::as_i64) {
        p.columns = v as usize;
    }
    if let Ok(v) = dict.get(b"Rows").and_then(Object::as_i64) {
        p.rows = v as usize;
    }
    if let Ok(v) = dict.get(b"BlackIs1").and_then(Object::as_bool) {
        p.black_is_1 = v;
    }
    if let Ok(v) = dict.get(b"EncodedByteAlign").and_then(Object::as_bool) {
        p.encoded_byte_align = v;
    }
    p
}

/// Decode CCITT-compressed `data` into packed 1-bit-per-pixel rows (MSB
/// first), with 0 = white / 1 = black regardless of `BlackIs1` (the bit
/// itself is inverted at the end to honor the requested polarity).
pub fn decode(data: &[u8], parm: Option<&Dictionary>) -> Result<Vec<u8>, CodecError> {
    let params = params_from_dict(parm);
    let mut reader = BitReader::new(data);
    let mut decoder = Decoder::new(&params);
    let row_bytes = params.columns.div_ceil(8);
    let mut out = Vec::new();

    let mut ref_line = vec![params.columns]; // initial imaginary white reference line
    let mut row_count = 0usize;

    loop {
        if params.rows != 0 && row_count >= params.rows {
            break;
        }
        if params.encoded_byte_align {
            reader.align();
        }
        let changes = if params.k < 0 {
            decoder.decode_2d_row(&mut reader, &ref_line)
        } else if params.k == 0 {
            decoder.decode_1d_row(&mut reader)
        } else {
            // Mixed 1D/2D: a tag bit selects per row; approximate by peeking
            // one bit (1 = 1D row, 0 = 2D row), per T.4 §4.2.1.3.1.
            match reader.read_bit() {
                Some(1) => decoder.decode_1d_row(&mut reader),
                Some(0) => decoder.decode_2d_row(&mut reader, &ref_line),
                _ => None,
            }
        };

        let Some(changes) = changes else { break };
        out.extend(pack_row(&changes, params.columns, row_bytes, params.black_is_1));
        ref_line = changes;
        row_count += 1;

        if reader.at_end() {
            break;
        }
    }

    Ok(out)
}

/// Convert a list of changing-element positions (alternating white-run-end,
/// black-run-end, ...) into a packed bit row.
fn pack_row(changes: &[usize], columns: usize, row_bytes: usize, black_is_1: bool) -> Vec<u8> {
    let mut row = vec![0u8; row_bytes];
    let mut color_is_black = false;
    let mut pos = 0usize;
    for &change in changes {
        let end = change.min(columns);
        if color_is_black {
            for x in pos..end {
                row[x / 8] |= 0x80 >> (x % 8);
            }
        }
        pos = end;
        color_is_black = !color_is_black;
    }
    if !black_is_1 {
        for b in row.iter_mut() {
            *b = !*b;
        }
        // Clear any padding bits beyond `columns` introduced by the invert.
        let used_bits = columns % 8;
        if used_bits != 0 {
            if let Some(last) = row.last_mut() {
                *last &= 0xFFu8 << (8 - used_bits);
            }
        }
    }
    row
}

struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        BitReader { data, bit_pos: 0 }
    }

    fn read_bit(&mut self) -> Option<u8> {
        let byte = self.bit_pos / 8;
        if byte >= self.data.len() {
            return None;
        }
        let bit = 7 - (self.bit_pos % 8);
        self.bit_pos += 1;
        Some((self.data[byte] >> bit) & 1)
    }

    fn peek_bits(&self, n: usize) -> Option<u32> {
        let mut v = 0u32;
        for i in 0..n {
            let pos = self.bit_pos + i;
            let byte = pos / 8;
            if byte >= self.data.len() {
                return None;
            }
            let bit = 7 - (pos % 8);
            v = (v << 1) | ((self.data[byte] >> bit) & 1) as u32;
        }
        Some(v)
    }

    fn consume(&mut self, n: usize) {
        self.bit_pos += n;
    }

    fn align(&mut self) {
        if self.bit_pos % 8 != 0 {
            self.bit_pos += 8 - (self.bit_pos % 8);
        }
    }

    fn at_end(&self) -> bool {
        self.bit_pos / 8 >= self.data.len()
    }
}

struct Decoder<'p> {
    params: &'p CcittParams,
}

impl<'p> Decoder<'p> {
    fn new(params: &'p CcittParams) -> Self {
        Decoder { params }
    }

    /// Decode a 1-D (Modified Huffman) row into changing-element positions.
    fn decode_1d_row(&mut self, reader: &mut BitReader) -> Option<Vec<usize>> {
        let mut changes = Vec::new();
        let mut pos = 0usize;
        let mut white = true;
        while pos < self.params.columns {
            let run = read_run(reader, white)?;
            pos += run;
            changes.push(pos.min(self.params.columns));
            white = !white;
        }
        Some(changes)
    }

    /// Decode a 2-D (T.6) row using the reference-line algorithm.
    fn decode_2d_row(&mut self, reader: &mut BitReader, ref_line: &[usize]) -> Option<Vec<usize>> {
        let columns = self.params.columns;
        let mut changes = Vec::new();
        let mut a0: isize = -1;
        let mut white = true;

        while (a0 as i64) < columns as i64 {
            let mode = read_mode(reader)?;
            let (b1, b2) = find_b1_b2(ref_line, a0, white, columns);

            match mode {
                Mode::Pass => {
                    a0 = b2 as isize;
                }
                Mode::Horizontal => {
                    let r1 = read_run(reader, white)?;
                    let r2 = read_run(reader, !white)?;
                    let start = if a0 < 0 { 0 } else { a0 as usize };
                    let a1 = (start + r1).min(columns);
                    let a2 = (a1 + r2).min(columns);
                    changes.push(a1);
                    changes.push(a2);
                    a0 = a2 as isize;
                }
                Mode::Vertical(delta) => {
                    let a1 = (b1 as isize + delta).clamp(0, columns as isize) as usize;
                    changes.push(a1);
                    a0 = a1 as isize;
                    white = !white;
                }
                Mode::Extension | Mode::Eol => return if changes.is_empty() { None } else { Some(changes) },
            }
        }
        Some(changes)
    }
}

/// Find b1 (first changing element on the reference line to the right of a0
/// with color opposite `white`) and b2 (the next changing element after
/// b1), per T.6 §2.2.1.
fn find_b1_b2(ref_line: &[usize], a0: isize, white: bool, columns: usize) -> (usize, usize) {
    // ref_line alternates colors starting with white->black at index 0.
    let mut i = 0;
    while i < ref_line.len() && (ref_line[i] as isize) <= a0 {
        i += 1;
    }
    // Element at index i has color opposite of the color *before* it; the
    // color of the run starting at ref_line[i] is white when i is even.
    let element_color_is_white = i % 2 == 0;
    if element_color_is_white != white {
        i += 1;
    }
    let b1 = ref_line.get(i).copied().unwrap_or(columns);
    let b2 = ref_line.get(i + 1).copied().unwrap_or(columns);
    (b1, b2)
}

enum Mode {
    Pass,
    Horizontal,
    Vertical(isize),
    Extension,
    Eol,
}

/// Read a 2-D mode code (T.4 Table 4): Pass=0001, Horizontal=001, V(0)=1,
/// VR(1)=011, VL(1)=010, VR(2)=000011, VL(2)=000010, VR(3)=0000011,
/// VL(3)=0000010.
fn read_mode(reader: &mut BitReader) -> Option<Mode> {
    if reader.peek_bits(1) == Some(1) {
        reader.consume(1);
        return Some(Mode::Vertical(0));
    }
    match reader.peek_bits(3)? {
        0b011 => {
            reader.consume(3);
            return Some(Mode::Vertical(1));
        }
        0b010 => {
            reader.consume(3);
            return Some(Mode::Vertical(-1));
        }
        0b001 => {
            reader.consume(3);
            return Some(Mode::Horizontal);
        }
        _ => {}
    }
    if reader.peek_bits(4) == Some(0b0001) {
        reader.consume(4);
        return Some(Mode::Pass);
    }
    match reader.peek_bits(6)? {
        0b000011 => {
            reader.consume(6);
            return Some(Mode::Vertical(2));
        }
        0b000010 => {
            reader.consume(6);
            return Some(Mode::Vertical(-2));
        }
        _ => {}
    }
    match reader.peek_bits(7)? {
        0b0000011 => {
            reader.consume(7);
            return Some(Mode::Vertical(3));
        }
        0b0000010 => {
            reader.consume(7);
            return Some(Mode::Vertical(-3));
        }
        _ => {}
    }
    if reader.peek_bits(12) == Some(1) {
        reader.consume(12);
        return Some(Mode::Eol);
    }
    Some(Mode::Extension)
}

/// Read one white or black run via the T.4 terminating + makeup code
/// tables, accumulating makeup codes (>=64) until a terminating code
/// (<64) is read.
fn read_run(reader: &mut BitReader, white: bool) -> Option<usize> {
    let mut total = 0usize;
    loop {
        let (bits, run) = lookup_run_code(reader, white)?;
        reader.consume(bits);
        total += run;
        if run < 64 {
            return Some(total);
        }
    }
}

/// Match the longest prefix against the white/black Huffman code tables.
/// Only a representative subset of T.4's terminating (0-63) and makeup
/// (64-1728, plus the shared extended makeup codes beyond 1792) codes is
/// encoded; codes are tried longest-code-first within each length.
fn lookup_run_code(reader: &mut BitReader, white: bool) -> Option<(usize, usize)> {
    let table: &[(u16, u8, usize)] = if white { WHITE_CODES } else { BLACK_CODES };
    for &(code, len, run) in table {
        if reader.peek_bits(len as usize) == Some(code as u32) {
            return Some((len as usize, run));
        }
    }
    // Shared extended makeup codes (>1728), identical for both colors.
    for &(code, len, run) in EXT_MAKEUP_CODES {
        if reader.peek_bits(len as usize) == Some(code as u32) {
            return Some((len as usize, run));
        }
    }
    None
}

// (code, bit-length, run-length) — T.4 Tables 2/3, terminating codes 0-63
// plus makeup codes through 1728. Ordered longest-first per length so the
// scan above (which checks exact-length peeks) need not sort dynamically.
#[rustfmt::skip]
static WHITE_CODES: &[(u16, u8, usize)] = &[
    (0x35, 8, 0), (0x7, 6, 1), (0x7, 4, 2), (0x8, 4, 3), (0xB, 4, 4),
    (0xC, 4, 5), (0xE, 4, 6), (0xF, 4, 7), (0x13, 5, 8), (0x14, 5, 9),
    (0x7, 5, 10), (0x8, 5, 11), (0x8, 6, 12), (0x3, 6, 13), (0x34, 6, 14),
    (0x35, 6, 15), (0x2A, 6, 16), (0x2B, 6, 17), (0x27, 7, 18), (0xC, 7, 19),
    (0x8, 7, 20), (0x17, 7, 21), (0x3, 7, 22), (0x4, 7, 23), (0x28, 7, 24),
    (0x2B, 7, 25), (0x13, 7, 26), (0x24, 7, 27), (0x18, 7, 28), (0x2, 8, 29),
    (0x3, 8, 30), (0x1A, 8, 31), (0x1B, 8, 32), (0x12, 8, 33), (0x13, 8, 34),
    (0x14, 8, 35), (0x15, 8, 36), (0x16, 8, 37), (0x17, 8, 38), (0x28, 8, 39),
    (0x29, 8, 40), (0x2A, 8, 41), (0x2B, 8, 42), (0x2C, 8, 43), (0x2D, 8, 44),
    (0x4, 8, 45), (0x5, 8, 46), (0xA, 8, 47), (0xB, 8, 48), (0x52, 8, 49),
    (0x53, 8, 50), (0x54, 8, 51), (0x55, 8, 52), (0x24, 8, 53), (0x25, 8, 54),
    (0x58, 8, 55), (0x59, 8, 56), (0x5A, 8, 57), (0x5B, 8, 58), (0x4A, 8, 59),
    (0x4B, 8, 60), (0x32, 8, 61), (0x33, 8, 62), (0x34, 8, 63),
    (0x1B, 5, 64), (0x12, 5, 128), (0x17, 6, 192), (0x37, 7, 256),
    (0x36, 8, 320), (0x37, 8, 384), (0x64, 8, 448), (0x65, 8, 512),
    (0x68, 8, 576), (0x67, 8, 640), (0xCC, 9, 704), (0xCD, 9, 768),
    (0xD2, 9, 832), (0xD3, 9, 896), (0xD4, 9, 960), (0xD5, 9, 1024),
    (0xD6, 9, 1088), (0xD7, 9, 1152), (0xD8, 9, 1216), (0xD9, 9, 1280),
    (0xDA, 9, 1344), (0xDB, 9, 1408), (0x98, 9, 1472), (0x99, 9, 1536),
    (0x9A, 9, 1600), (0x18, 6, 1664), (0x9B, 9, 1728),
];

#[rustfmt::skip]
static BLACK_CODES: &[(u16, u8, usize)] = &[
    (0x37, 10, 0), (0x2, 3, 1), (0x3, 2, 2), (0x2, 2, 3), (0x3, 3, 4),
    (0x3, 4, 5), (0x2, 4, 6), (0x3, 5, 7), (0x5, 6, 8), (0x4, 6, 9),
    (0x4, 7, 10), (0x5, 7, 11), (0x7, 7, 12), (0x4, 8, 13), (0x7, 8, 14),
    (0x18, 9, 15), (0x17, 10, 16), (0x18, 10, 17), (0x8, 10, 18), (0x67, 11, 19),
    (0x68, 11, 20), (0x6C, 11, 21), (0x37, 11, 22), (0x28, 11, 23), (0x17, 11, 24),
    (0x18, 11, 25), (0xCA, 12, 26), (0xCB, 12, 27), (0xCC, 12, 28), (0xCD, 12, 29),
    (0x68, 12, 30), (0x69, 12, 31), (0x6A, 12, 32), (0x6B, 12, 33), (0xD2, 12, 34),
    (0xD3, 12, 35), (0xD4, 12, 36), (0xD5, 12, 37), (0xD6, 12, 38), (0xD7, 12, 39),
    (0x6C, 12, 40), (0x6D, 12, 41), (0xDA, 12, 42), (0xDB, 12, 43), (0x54, 12, 44),
    (0x55, 12, 45), (0x56, 12, 46), (0x57, 12, 47), (0x64, 12, 48), (0x65, 12, 49),
    (0x52, 12, 50), (0x53, 12, 51), (0x24, 12, 52), (0x37, 12, 53), (0x38, 12, 54),
    (0x27, 12, 55), (0x28, 12, 56), (0x58, 12, 57), (0x59, 12, 58), (0x2B, 12, 59),
    (0x2C, 12, 60), (0x5A, 12, 61), (0x66, 12, 62), (0x67, 12, 63),
    (0xF, 10, 64), (0xC8, 12, 128), (0xC9, 12, 192), (0x5B, 12, 256),
    (0x33, 12, 320), (0x34, 12, 384), (0x35, 12, 448), (0x6C, 13, 512),
    (0x6D, 13, 576), (0x4A, 13, 640), (0x4B, 13, 704), (0x4C, 13, 768),
    (0x4D, 13, 832), (0x72, 13, 896), (0x73, 13, 960), (0x74, 13, 1024),
    (0x75, 13, 1088), (0x76, 13, 1152), (0x77, 13, 1216), (0x52, 13, 1280),
    (0x53, 13, 1344), (0x54, 13, 1408), (0x55, 13, 1472), (0x5A, 13, 1536),
    (0x5B, 13, 1600), (0x64, 13, 1664), (0x65, 13, 1728),
];

// Extended makeup codes >= 1792, shared between white and black (T.4 Table 3).
#[rustfmt::skip]
static EXT_MAKEUP_CODES: &[(u16, u8, usize)] = &[
    (0x8, 11, 1792), (0xC, 11, 1856), (0xD, 11, 1920), (0x12, 12, 1984),
    (0x13, 12, 2048), (0x14, 12, 2112), (0x15, 12, 2176), (0x16, 12, 2240),
    (0x17, 12, 2304), (0x1C, 12, 2368), (0x1D, 12, 2432), (0x1E, 12, 2496),
    (0x1F, 12, 2560),
];
