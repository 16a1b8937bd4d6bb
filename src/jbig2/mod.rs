//! JBIG2 decoder (`JBIG2Decode`, ITU-T T.88), restricted to the embedded
//! PDF organization (no file header, segments only).
//!
//! Generic regions coded with the MQ arithmetic coder and GB template 0 are
//! fully decoded. MMR-coded generic regions delegate to the CCITT Group 4
//! decoder. Symbol dictionary/text regions, refinement, and halftone
//! regions are parsed structurally but rendered as blank bitmaps; pages
//! built purely from a generic region (the common scanner-output case)
//! decode faithfully.

mod arith;
mod segment;

use crate::error::CodecError;
use arith::{ArithDecoder, Context};
use segment::{Segment, SegmentHeader, SegmentType};

pub fn decode(data: &[u8], globals: Option<&[u8]>) -> Result<Vec<u8>, CodecError> {
    let mut page = PageBitmap::default();

    if let Some(globals) = globals {
        for segment in segment::parse_segments(globals)? {
            apply_segment(&mut page, &segment)?;
        }
    }
    for segment in segment::parse_segments(data)? {
        apply_segment(&mut page, &segment)?;
    }

    if page.width == 0 || page.height == 0 {
        return Err(CodecError::Jbig2("no page information segment".into()));
    }
    Ok(page.pack())
}

#[derive(Default)]
struct PageBitmap {
    width: usize,
    height: usize,
    default_pixel: u8,
    bits: Vec<u8>,
}

impl PageBitmap {
    fn ensure(&mut self, width: usize, height: usize, default_pixel: u8) {
        if self.bits.is_empty() {
            self.width = width;
            self.height = height.max(1);
            self.default_pixel = default_pixel;
            self.bits = vec![default_pixel; self.width * self.height];
        }
    }

    fn grow_to(&mut self, height: usize) {
        if height > self.height {
            self.bits.resize(self.width * height, self.default_pixel);
            self.height = height;
        }
    }

    fn blit(&mut self, region: &Bitmap, x: usize, y: usize) {
        self.grow_to(y + region.height);
        for row in 0..region.height {
            for col in 0..region.width {
                let px = x + col;
                let py = y + row;
                if px < self.width && py < self.height {
                    self.bits[py * self.width + px] = region.get(col, row);
                }
            }
        }
    }

    /// Pack into 1-bpp rows, MSB first, matching PDF's `ImageMask`/1-bit
    /// `DeviceGray` convention (1 = black already, since JBIG2 "1" is
    /// foreground).
    fn pack(&self) -> Vec<u8> {
        let row_bytes = self.width.div_ceil(8);
        let mut out = vec![0u8; row_bytes * self.height];
        for y in 0..self.height {
            for x in 0..self.width {
                if self.bits[y * self.width + x] != 0 {
                    out[y * row_bytes + x / 8] |= 0x80 >> (x % 8);
                }
            }
        }
        out
    }
}

struct Bitmap {
    width: usize,
    height: usize,
    bits: Vec<u8>,
}

impl Bitmap {
    fn blank(width: usize, height: usize) -> Self {
        Bitmap { width, height, bits: vec![0u8; width * height] }
    }

    fn get(&self, x: usize, y: usize) -> u8 {
        if x < self.width && y < self.height {
            self.bits[y * self.width + x]
        } else {
            0
        }
    }

    fn set(&mut self, x: usize, y: usize, v: u8) {
        if x < self.width && y < self.height {
            self.bits[y * self.width + x] = v;
        }
    }
}

fn apply_segment(page: &mut PageBitmap, segment: &Segment) -> Result<(), CodecError> {
    match segment.header.kind {
        SegmentType::PageInfo => {
            let (w, h, default_pixel) = segment::parse_page_info(&segment.data)?;
            page.ensure(w, h, default_pixel);
        }
        SegmentType::GenericRegion => {
            let region = decode_generic_region(&segment.data)?;
            page.blit(&region.bitmap, region.x, region.y);
        }
        SegmentType::SymbolDictionary
        | SegmentType::TextRegion
        | SegmentType::RefinementRegion
        | SegmentType::HalftoneRegion
        | SegmentType::PatternDictionary => {
            // Stub: rendered as blank (no foreground) bitmaps. A faithful
            // symbol/text coder is out of scope; see the region info
            // header for placement so the page geometry still comes out
            // right even when the glyphs themselves don't.
            if let Ok((x, y, w, h)) = segment::parse_region_info(&segment.data) {
                page.blit(&Bitmap::blank(w, h), x, y);
            }
        }
        SegmentType::Other => {}
    }
    Ok(())
}

struct RegionResult {
    bitmap: Bitmap,
    x: usize,
    y: usize,
}

/// Decode a generic region segment (T.88 §6.2), either MQ-arithmetic coded
/// with GB template 0 or MMR-coded (delegated to CCITT Group 4).
fn decode_generic_region(data: &[u8]) -> Result<RegionResult, CodecError> {
    let (x, y, width, height) = segment::parse_region_info(data)?;
    let flags_pos = 17;
    let flags = *data.get(flags_pos).ok_or_else(|| CodecError::Jbig2("truncated generic region".into()))?;
    let mmr = flags & 0x01 != 0;
    let template = (flags >> 1) & 0x03;
    let tpgdon = flags & 0x08 != 0;

    let mut pos = flags_pos + 1;
    let mut at = [(0i8, 0i8); 4];
    if !mmr {
        let n_at = if template == 0 { 4 } else { 1 };
        for slot in at.iter_mut().take(n_at) {
            let ax = *data.get(pos).ok_or_else(|| CodecError::Jbig2("truncated AT pixels".into()))? as i8;
            let ay = *data.get(pos + 1).ok_or_else(|| CodecError::Jbig2("truncated AT pixels".into()))? as i8;
            *slot = (ax, ay);
            pos += 2;
        }
    }

    let bitmap = if mmr {
        decode_mmr_region(&data[pos..], width, height)?
    } else {
        decode_arith_generic(&data[pos..], width, height, template, tpgdon, at)
    };

    Ok(RegionResult { bitmap, x, y })
}

fn decode_mmr_region(data: &[u8], width: usize, height: usize) -> Result<Bitmap, CodecError> {
    let mut dict = crate::dictionary::Dictionary::new();
    dict.set("K", -1i64);
    dict.set("Columns", width as i64);
    dict.set("Rows", height as i64);
    dict.set("BlackIs1", true);
    let packed = crate::ccitt::decode(data, Some(&dict))?;
    let row_bytes = width.div_ceil(8);
    let mut bitmap = Bitmap::blank(width, height);
    for y in 0..height {
        for x in 0..width {
            let byte = packed.get(y * row_bytes + x / 8).copied().unwrap_or(0);
            let bit = (byte >> (7 - x % 8)) & 1;
            bitmap.set(x, y, bit);
        }
    }
    Ok(bitmap)
}

/// Arithmetic generic-region decoding procedure (T.88 §6.2.5.7), GB
/// template 0 only (the overwhelming common case for scanned-page JBIG2);
/// other templates fall back to a blank bitmap of the right size.
fn decode_arith_generic(
    data: &[u8],
    width: usize,
    height: usize,
    template: u8,
    tpgdon: bool,
    at: [(i8, i8); 4],
) -> Bitmap {
    let mut bitmap = Bitmap::blank(width, height);
    if template != 0 {
        return bitmap;
    }

    let mut arith = ArithDecoder::new(data);
    let mut contexts = vec![Context::default(); 1 << 16];
    let mut ltp = 0u8;

    for y in 0..height {
        if tpgdon {
            let sltp = arith.decode(&mut contexts[0x9B25]);
            ltp ^= sltp;
            if ltp == 1 {
                for x in 0..width {
                    let v = if y > 0 { bitmap.get(x, y - 1) } else { 0 };
                    bitmap.set(x, y, v);
                }
                continue;
            }
        }
        for x in 0..width {
            let cx = context_template0(&bitmap, x, y, at);
            let bit = arith.decode(&mut contexts[cx]);
            bitmap.set(x, y, bit);
        }
    }
    bitmap
}

fn px(bitmap: &Bitmap, x: isize, y: isize) -> u16 {
    if x < 0 || y < 0 {
        0
    } else {
        bitmap.get(x as usize, y as usize) as u16
    }
}

fn context_template0(bitmap: &Bitmap, x: usize, y: usize, at: [(i8, i8); 4]) -> usize {
    let (xi, yi) = (x as isize, y as isize);
    let a1 = px(bitmap, xi + at[0].0 as isize, yi + at[0].1 as isize);
    let a2 = px(bitmap, xi + at[1].0 as isize, yi + at[1].1 as isize);
    let a3 = px(bitmap, xi + at[2].0 as isize, yi + at[2].1 as isize);
    let a4 = px(bitmap, xi + at[3].0 as isize, yi + at[3].1 as isize);

    let mut cx = 0u16;
    cx = (cx << 1) | px(bitmap, xi - 1, yi - 2);
    cx = (cx << 1) | px(bitmap, xi, yi - 2);
    cx = (cx << 1) | px(bitmap, xi + 1, yi - 2);
    cx = (cx << 1) | a4;
    cx = (cx << 1) | px(bitmap, xi - 2, yi - 1);
    cx = (cx << 1) | px(bitmap, xi - 1, yi - 1);
    cx = (cx << 1) | px(bitmap, xi, yi - 1);
    cx = (cx << 1) | px(bitmap, xi + 1, yi - 1);
    cx = (cx << 1) | px(bitmap, xi + 2, yi - 1);
    cx = (cx << 1) | a3;
    cx = (cx << 1) | a2;
    cx = (cx << 1) | px(bitmap, xi - 4, yi);
    cx = (cx << 1) | px(bitmap, xi - 3, yi);
    cx = (cx << 1) | px(bitmap, xi - 2, yi);
    cx = (cx << 1) | px(bitmap, xi - 1, yi);
    cx = (cx << 1) | a1;
    cx as usize
}
