//! Inline image dictionary key expansion (ISO 32000-1 §8.9.7, Table 93):
//! `BI`/`ID`/`EI` dictionaries use abbreviated key and filter names to keep
//! content streams small. Expanding them up front lets the rest of the
//! pipeline treat an inline image dictionary exactly like an XObject image
//! stream dictionary.

use crate::dictionary::Dictionary;
use crate::object::Object;

fn expand_key(key: &[u8]) -> &[u8] {
    match key {
        b"BPC" => b"BitsPerComponent",
        b"CS" => b"ColorSpace",
        b"D" => b"Decode",
        b"DP" => b"DecodeParms",
        b"F" => b"Filter",
        b"H" => b"Height",
        b"IM" => b"ImageMask",
        // `/I` is always `Interpolate` on an inline image: `/Indexed` is a
        // `ColorSpace` family name, never an abbreviated dictionary key, so
        // there is no actual collision to resolve at dispatch time.
        b"I" => b"Interpolate",
        b"W" => b"Width",
        b"L" => b"Length",
        other => other,
    }
}

fn expand_filter_name(name: &[u8]) -> &[u8] {
    match name {
        b"AHx" => b"ASCIIHexDecode",
        b"A85" => b"ASCII85Decode",
        b"LZW" => b"LZWDecode",
        b"Fl" => b"FlateDecode",
        b"RL" => b"RunLengthDecode",
        b"CCF" => b"CCITTFaxDecode",
        b"DCT" => b"DCTDecode",
        other => other,
    }
}

fn expand_value(value: &Object) -> Object {
    match value {
        Object::Name(n) => Object::Name(expand_filter_name(n).to_vec()),
        Object::Array(items) => Object::Array(items.iter().map(expand_value).collect()),
        other => other.clone(),
    }
}

/// Expand an inline image dictionary's abbreviated keys (and, for `/Filter`,
/// its abbreviated filter names) into their full spellings.
pub fn expand_abbreviated_keys(dict: &Dictionary) -> Dictionary {
    let mut out = Dictionary::new();
    for (key, value) in dict.iter() {
        let full_key = expand_key(key);
        let full_value = if full_key == b"Filter" { expand_value(value) } else { value.clone() };
        out.set(full_key.to_vec(), full_value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_keys_and_filter_abbreviations() {
        let mut dict = Dictionary::new();
        dict.set("W", 10i64);
        dict.set("H", 10i64);
        dict.set("F", Object::Name(b"Fl".to_vec()));
        let expanded = expand_abbreviated_keys(&dict);
        assert!(expanded.has(b"Width"));
        assert!(expanded.has(b"Height"));
        assert_eq!(expanded.get(b"Filter").unwrap().as_name().unwrap(), b"FlateDecode");
    }
}
