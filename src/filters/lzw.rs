use crate::error::{CodecError, Result};

/// Decode an LZW-compressed stream (ISO 32000-1 §7.4.4). `early_change`
/// toggles the one-code-early width bump PDF inherited from TIFF (default
/// `true`; `/DecodeParms << /EarlyChange 0 >>` disables it).
pub fn decode(data: &[u8], early_change: bool) -> Result<Vec<u8>> {
    // PDF's default EarlyChange=1 matches weezl's standard GIF-style decoder;
    // EarlyChange=0 is the TIFF variant that bumps code width one code late.
    let mut decoder = if early_change {
        weezl::decode::Decoder::new(weezl::BitOrder::Msb, 8)
    } else {
        weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
    };

    let mut out = Vec::new();
    let mut input = data;
    loop {
        let mut chunk = [0u8; 4096];
        let result = decoder.decode_bytes(input, &mut chunk);
        out.extend_from_slice(&chunk[..result.consumed_out]);
        input = &input[result.consumed_in..];
        match result.status {
            Ok(weezl::LzwStatus::Ok) => continue,
            Ok(weezl::LzwStatus::Done) => break,
            Ok(weezl::LzwStatus::NoProgress) => break,
            Err(e) => return Err(CodecError::Lzw(e.to_string()).into()),
        }
    }
    Ok(out)
}
