//! The stream filter pipeline (ISO 32000-1 §7.4): dispatch from a `/Filter`
//! name plus its `/DecodeParms` to a concrete decoder. Each decoder lives in
//! its own module; this file only wires up the dispatch table and the
//! predictor post-pass shared by `FlateDecode`/`LZWDecode`.

mod ascii;
mod flate;
pub mod inline_image;
mod lzw;
mod predictor;
mod run_length;

use crate::dictionary::Dictionary;
use crate::error::{CodecError, Result};

/// Decode one filter stage. `parm` is that stage's `/DecodeParms` entry, if
/// any. Image-compression filters that PDF treats as opaque to the reader
/// (`DCTDecode`, `JPXDecode`, `CCITTFaxDecode` without predictor handling,
/// `JBIG2Decode`) are each handled fully here since they're terminal leaves
/// of the chain in practice.
pub fn decode(name: &[u8], data: &[u8], parm: Option<&Dictionary>) -> Result<Vec<u8>> {
    let decoded = match name {
        b"FlateDecode" | b"Fl" => flate::decode(data)?,
        b"LZWDecode" | b"LZW" => lzw::decode(data, early_change(parm))?,
        b"ASCIIHexDecode" | b"AHx" => ascii::decode_hex(data)?,
        b"ASCII85Decode" | b"A85" => ascii::decode_85(data)?,
        b"RunLengthDecode" | b"RL" => run_length::decode(data)?,
        b"CCITTFaxDecode" | b"CCF" => {
            return crate::ccitt::decode(data, parm).map_err(|e| e.into());
        }
        b"JBIG2Decode" => {
            let globals = parm
                .and_then(|p| p.get(b"JBIG2Globals").ok())
                .and_then(|o| o.as_stream().ok())
                .map(|s| s.content.as_slice());
            return crate::jbig2::decode(data, globals).map_err(|e| e.into());
        }
        b"DCTDecode" | b"DCT" | b"JPXDecode" => {
            // Image codecs: the compressed payload is the decoded result as
            // far as the stream pipeline is concerned; pixel decompression
            // is the image consumer's job (§4.2 Non-goals).
            return Ok(data.to_vec());
        }
        b"Crypt" => return Ok(data.to_vec()),
        other => {
            return Err(CodecError::UnsupportedFilter(String::from_utf8_lossy(other).into_owned()).into());
        }
    };

    match parm.and_then(predictor::params_from_dict) {
        Some(params) => predictor::apply(&decoded, params),
        None => Ok(decoded),
    }
}

fn early_change(parm: Option<&Dictionary>) -> bool {
    parm.and_then(|p| p.get(b"EarlyChange").ok())
        .and_then(|o| o.as_i64().ok())
        .map(|v| v != 0)
        .unwrap_or(true)
}
