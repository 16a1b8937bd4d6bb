use crate::error::{CodecError, Result};

/// Decode `RunLengthDecode` (§7.4.5): a length byte `0..=127` means copy the
/// next `len+1` literal bytes; `129..=255` means repeat the following byte
/// `257-len` times; `128` is the EOD marker.
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let len = data[i];
        i += 1;
        match len {
            0..=127 => {
                let count = len as usize + 1;
                let end = i + count;
                if end > data.len() {
                    return Err(CodecError::TruncatedRunLength.into());
                }
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
            128 => break,
            _ => {
                let count = 257 - len as usize;
                let byte = *data.get(i).ok_or(CodecError::TruncatedRunLength)?;
                out.extend(std::iter::repeat(byte).take(count));
                i += 1;
            }
        }
    }
    Ok(out)
}
