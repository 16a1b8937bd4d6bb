//! JBIG2 embedded-stream segment framing (T.88 Annex D, `.2` embedded
//! organization): segments have no file header and no random-access
//! segment list, just headers interleaved with data in sequence.

use crate::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentType {
    SymbolDictionary,
    TextRegion,
    PatternDictionary,
    HalftoneRegion,
    GenericRegion,
    RefinementRegion,
    PageInfo,
    Other,
}

impl SegmentType {
    fn from_flags(kind: u8) -> SegmentType {
        match kind {
            0 => SegmentType::SymbolDictionary,
            4..=7 => SegmentType::TextRegion,
            16 => SegmentType::PatternDictionary,
            20..=23 => SegmentType::HalftoneRegion,
            36..=39 => SegmentType::GenericRegion,
            40..=43 => SegmentType::RefinementRegion,
            48 => SegmentType::PageInfo,
            _ => SegmentType::Other,
        }
    }
}

pub struct SegmentHeader {
    pub kind: SegmentType,
}

pub struct Segment {
    pub header: SegmentHeader,
    pub data: Vec<u8>,
}

pub fn parse_segments(data: &[u8]) -> Result<Vec<Segment>, CodecError> {
    let mut segments = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let (segment, next) = parse_one(data, pos)?;
        segments.push(segment);
        pos = next;
    }
    Ok(segments)
}

fn read_u32(data: &[u8], pos: usize) -> Result<u32, CodecError> {
    let slice = data.get(pos..pos + 4).ok_or_else(|| CodecError::Jbig2("truncated segment header".into()))?;
    Ok(u32::from_be_bytes(slice.try_into().unwrap()))
}

fn parse_one(data: &[u8], start: usize) -> Result<(Segment, usize), CodecError> {
    let mut pos = start;
    let _number = read_u32(data, pos)?;
    pos += 4;

    let flags = *data.get(pos).ok_or_else(|| CodecError::Jbig2("truncated segment flags".into()))?;
    let kind_bits = flags & 0x3F;
    let page_assoc_4byte = flags & 0x40 != 0;
    pos += 1;

    let ref_flags = *data.get(pos).ok_or_else(|| CodecError::Jbig2("truncated referred-to flags".into()))?;
    let count_and_retain = ref_flags >> 5;
    let ref_count;
    if count_and_retain == 7 {
        let long_count = read_u32(data, pos)? & 0x1FFF_FFFF;
        ref_count = long_count as usize;
        pos += 4 + (ref_count + 8) / 8;
    } else {
        ref_count = count_and_retain as usize;
        pos += 1;
    }

    let ref_size = if _number <= 256 {
        1
    } else if _number <= 65536 {
        2
    } else {
        4
    };
    pos += ref_count * ref_size;

    pos += if page_assoc_4byte { 4 } else { 1 };

    let data_len = read_u32(data, pos)? as usize;
    pos += 4;

    if data_len == 0xFFFF_FFFF {
        return Err(CodecError::Jbig2("unknown-length segment data not supported".into()));
    }
    let segment_data = data
        .get(pos..pos + data_len)
        .ok_or_else(|| CodecError::Jbig2("segment data runs past end of stream".into()))?
        .to_vec();
    pos += data_len;

    Ok((Segment { header: SegmentHeader { kind: SegmentType::from_flags(kind_bits) }, data: segment_data }, pos))
}

/// Page info segment body (T.88 §7.4.8): width, height (may be
/// `0xFFFFFFFF` for "unknown, determined by striping"), X/Y resolution,
/// flags (bit 2 is the default pixel value).
pub fn parse_page_info(data: &[u8]) -> Result<(usize, usize, u8), CodecError> {
    if data.len() < 19 {
        return Err(CodecError::Jbig2("truncated page info segment".into()));
    }
    let width = u32::from_be_bytes(data[0..4].try_into().unwrap()) as usize;
    let mut height = u32::from_be_bytes(data[4..8].try_into().unwrap()) as usize;
    if height == 0xFFFF_FFFF {
        height = 0;
    }
    let flags = data[16];
    let default_pixel = (flags >> 2) & 1;
    Ok((width, height, default_pixel))
}

/// Region segment info field (T.88 §7.4.1), common to every region-class
/// segment: width, height, X, Y location, then a combinator-operator byte.
pub fn parse_region_info(data: &[u8]) -> Result<(usize, usize, usize, usize), CodecError> {
    if data.len() < 17 {
        return Err(CodecError::Jbig2("truncated region info".into()));
    }
    let width = u32::from_be_bytes(data[0..4].try_into().unwrap()) as usize;
    let height = u32::from_be_bytes(data[4..8].try_into().unwrap()) as usize;
    let x = u32::from_be_bytes(data[8..12].try_into().unwrap()) as usize;
    let y = u32::from_be_bytes(data[12..16].try_into().unwrap()) as usize;
    Ok((x, y, width, height))
}
