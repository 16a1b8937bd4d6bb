use flate2::read::ZlibDecoder;
use std::io::Read;

use crate::error::{CodecError, Result};

/// Inflate a zlib-wrapped (RFC 1950) stream. Some producers emit raw DEFLATE
/// (RFC 1951) with no zlib header; if the zlib decoder fails on the first
/// byte we retry as raw DEFLATE before giving up, matching the tolerance
/// real-world PDF readers need.
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut zlib = ZlibDecoder::new(data);
    match zlib.read_to_end(&mut out) {
        Ok(_) => Ok(out),
        Err(e) => {
            out.clear();
            let mut raw = flate2::read::DeflateDecoder::new(data);
            raw.read_to_end(&mut out)
                .map(|_| out)
                .map_err(|_| CodecError::Inflate(e.to_string()).into())
        }
    }
}
