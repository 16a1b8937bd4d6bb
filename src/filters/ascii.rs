use crate::error::{CodecError, Result};

/// Decode `ASCIIHexDecode` (§7.4.2): pairs of hex digits, whitespace
/// ignored, terminated by `>`. An odd trailing digit is padded with `0`.
pub fn decode_hex(data: &[u8]) -> Result<Vec<u8>> {
    let mut nibbles = Vec::with_capacity(data.len());
    for &b in data {
        if b == b'>' {
            break;
        }
        if b.is_ascii_whitespace() {
            continue;
        }
        let v = (b as char).to_digit(16).ok_or(CodecError::InvalidAsciiHex)?;
        nibbles.push(v as u8);
    }
    if nibbles.len() % 2 == 1 {
        nibbles.push(0);
    }
    Ok(nibbles.chunks(2).map(|c| (c[0] << 4) | c[1]).collect())
}

/// Decode `ASCII85Decode` (§7.4.3): groups of 5 base-85 characters into 4
/// bytes, `z` shorthand for an all-zero group, terminated by `~>`.
pub fn decode_85(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut group = [0u8; 5];
    let mut n = 0;

    let mut iter = data.iter().copied().peekable();
    // Some producers prefix the stream with `<~`.
    if data.starts_with(b"<~") {
        iter.next();
        iter.next();
    }

    while let Some(b) = iter.next() {
        if b == b'~' {
            break;
        }
        if b.is_ascii_whitespace() {
            continue;
        }
        if b == b'z' && n == 0 {
            out.extend_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        if !(b'!'..=b'u').contains(&b) {
            return Err(CodecError::InvalidAscii85.into());
        }
        group[n] = b - b'!';
        n += 1;
        if n == 5 {
            out.extend_from_slice(&decode_group(&group, 5));
            n = 0;
        }
    }

    if n > 0 {
        // Pad the final partial group with 'u' (84), per spec, then emit
        // n - 1 bytes.
        for slot in group.iter_mut().skip(n) {
            *slot = 84;
        }
        out.extend_from_slice(&decode_group(&group, n));
    }

    Ok(out)
}

fn decode_group(group: &[u8; 5], len: usize) -> Vec<u8> {
    let value = group.iter().fold(0u32, |acc, &d| acc.wrapping_mul(85).wrapping_add(d as u32));
    let bytes = value.to_be_bytes();
    bytes[..len - 1].to_vec()
}
