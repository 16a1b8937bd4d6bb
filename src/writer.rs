//! PDF serialization (ISO 32000-1 §7.5, §7.5.8): full-document write,
//! incremental-update append, and classical-table/cross-reference-stream
//! xref emission. The object/xref/trailer write split and the
//! `position`-tracked writer are grounded on the retrieved writer-serializer
//! example; the packed binary xref stream layout inverts the `W`/`Index`
//! decode shape from the retrieved xref-stream parser.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;

use crate::dictionary::Dictionary;
use crate::document::Document;
use crate::object::{Object, ObjectId, Stream, StringFormat};
use crate::xref::XrefEntry;
use crate::Result;

/// Controls whether [`write`]/[`write_incremental`] emit a classical xref
/// table or a cross-reference stream. `None` (the default) matches whatever
/// the source document used, so round-tripping a PDF 1.5+ file doesn't
/// silently downgrade its xref representation.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriterOptions {
    pub xref_stream: Option<bool>,
}

fn is_regular_name_byte(b: u8) -> bool {
    !matches!(b, 0x00 | b'\t' | b'\n' | 0x0C | b'\r' | b' ' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
        && b.is_ascii_graphic()
}

/// Streaming serializer tracking the byte offset of everything it writes, so
/// object offsets for the xref table can be recorded as they're emitted.
struct Writer<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> Writer<W> {
    fn new(inner: W) -> Self {
        Writer { inner, position: 0 }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.write_bytes(s.as_bytes())
    }

    fn write_header(&mut self, version: &str, binary_mark: &[u8]) -> io::Result<()> {
        self.write_str(&format!("%PDF-{version}\n"))?;
        let mark = if binary_mark.iter().any(|&b| b >= 128) { binary_mark } else { &[0xE2, 0xE3, 0xCF, 0xD3] };
        self.write_bytes(b"%")?;
        self.write_bytes(mark)?;
        self.write_bytes(b"\n")
    }

    fn write_name(&mut self, name: &[u8]) -> io::Result<()> {
        self.write_bytes(b"/")?;
        for &b in name {
            if is_regular_name_byte(b) {
                self.write_bytes(&[b])?;
            } else {
                self.write_str(&format!("#{b:02X}"))?;
            }
        }
        Ok(())
    }

    fn write_string(&mut self, bytes: &[u8], format: StringFormat) -> io::Result<()> {
        match format {
            StringFormat::Hexadecimal => {
                self.write_bytes(b"<")?;
                for &b in bytes {
                    self.write_str(&format!("{b:02X}"))?;
                }
                self.write_bytes(b">")
            }
            StringFormat::Literal => {
                self.write_bytes(b"(")?;
                for &b in bytes {
                    match b {
                        b'(' | b')' | b'\\' => {
                            self.write_bytes(&[b'\\', b])?;
                        }
                        b'\n' => self.write_bytes(b"\\n")?,
                        b'\r' => self.write_bytes(b"\\r")?,
                        _ => self.write_bytes(&[b])?,
                    }
                }
                self.write_bytes(b")")
            }
        }
    }

    fn write_number(&mut self, n: f64, is_integer: bool) -> io::Result<()> {
        if is_integer {
            self.write_str(&format!("{}", n as i64))
        } else {
            let mut s = format!("{n}");
            if !s.contains('.') {
                s.push_str(".0");
            }
            self.write_str(&s)
        }
    }

    fn write_value(&mut self, obj: &Object) -> io::Result<()> {
        match obj {
            Object::Null => self.write_str("null"),
            Object::Boolean(b) => self.write_str(if *b { "true" } else { "false" }),
            Object::Number(n, is_int) => self.write_number(*n, *is_int),
            Object::String(s, fmt) => self.write_string(s, *fmt),
            Object::Name(n) => self.write_name(n),
            Object::Array(items) => {
                self.write_bytes(b"[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.write_bytes(b" ")?;
                    }
                    self.write_value(item)?;
                }
                self.write_bytes(b"]")
            }
            Object::Dictionary(dict) => self.write_dict(dict),
            Object::Stream(stream) => self.write_dict(&stream.dict),
            Object::Reference((num, generation)) => self.write_str(&format!("{num} {generation} R")),
        }
    }

    fn write_dict(&mut self, dict: &Dictionary) -> io::Result<()> {
        self.write_bytes(b"<< ")?;
        for (key, value) in dict.iter() {
            self.write_name(key)?;
            self.write_bytes(b" ")?;
            self.write_value(value)?;
            self.write_bytes(b" ")?;
        }
        self.write_bytes(b">>")
    }

    /// Writes one indirect object, returning the byte offset it starts at.
    fn write_object(&mut self, id: ObjectId, object: &Object) -> io::Result<u64> {
        let offset = self.position;
        self.write_str(&format!("{} {} obj\n", id.0, id.1))?;
        match object {
            Object::Stream(stream) => self.write_stream(stream)?,
            other => {
                self.write_value(other)?;
                self.write_bytes(b"\n")?;
            }
        }
        self.write_str("endobj\n")?;
        Ok(offset)
    }

    fn write_stream(&mut self, stream: &Stream) -> io::Result<()> {
        let mut dict = stream.dict.clone();
        dict.set("Length", stream.content.len() as i64);
        self.write_dict(&dict)?;
        self.write_str("\nstream\n")?;
        self.write_bytes(&stream.content)?;
        self.write_str("\nendstream\n")
    }

    /// Writes one or more contiguous-run subsections of a classical xref
    /// table. `entries` must be sorted ascending by object number.
    fn write_xref_table(&mut self, entries: &[(u32, XrefEntry)]) -> io::Result<u64> {
        let xref_offset = self.position;
        self.write_str("xref\n")?;

        let mut i = 0;
        while i < entries.len() {
            let start = entries[i].0;
            let mut j = i;
            while j + 1 < entries.len() && entries[j + 1].0 == entries[j].0 + 1 {
                j += 1;
            }
            self.write_str(&format!("{} {}\n", start, j - i + 1))?;
            for (_, entry) in &entries[i..=j] {
                match *entry {
                    XrefEntry::Normal { offset, generation } => {
                        self.write_str(&format!("{offset:010} {generation:05} n \n"))?;
                    }
                    XrefEntry::Free { next } => {
                        self.write_str(&format!("{next:010} 65535 f \n"))?;
                    }
                    XrefEntry::Compressed { .. } | XrefEntry::UnusableFree => {
                        self.write_str(&format!("{:010} {:05} f \n", 0, 65535))?;
                    }
                }
            }
            i = j + 1;
        }
        Ok(xref_offset)
    }

    fn write_trailer(&mut self, dict: &Dictionary) -> io::Result<()> {
        self.write_str("trailer\n")?;
        self.write_dict(dict)?;
        self.write_bytes(b"\n")
    }

    fn write_startxref(&mut self, offset: u64) -> io::Result<()> {
        self.write_str("startxref\n")?;
        self.write_str(&format!("{offset}\n"))?;
        self.write_str("%%EOF\n")
    }
}

/// Links tombstoned object numbers into the free-list `next` chain object 0
/// heads, per ISO 32000-1 §7.5.4. `free` is (object number, next-use
/// generation) pairs.
fn link_free_chain(free: &[(u32, u16)]) -> BTreeMap<u32, XrefEntry> {
    let mut ids: Vec<u32> = free.iter().map(|(id, _)| *id).collect();
    ids.sort_unstable();
    let mut out = BTreeMap::new();
    let mut prev = 0u32;
    for &id in &ids {
        out.insert(prev, XrefEntry::Free { next: id });
        prev = id;
    }
    out.insert(prev, XrefEntry::Free { next: 0 });
    out
}

fn source_used_xref_stream(document: &Document) -> bool {
    document.trailer.has_type(b"XRef")
}

/// Derives a fresh `/ID` entry (§4.8 step 4) from the current time plus
/// randomness, the way every writer that doesn't preserve a source `ID`
/// does it (ISO 32000-1 §14.4 only requires the value be "derived in a
/// way that makes it highly unlikely" to collide with another file's).
fn generate_id() -> Vec<u8> {
    use md5::{Digest, Md5};
    use rand::Rng;

    let mut hasher = Md5::new();
    hasher.update(crate::date::format(&jiff::Zoned::now()).as_bytes());
    let mut entropy = [0u8; 16];
    rand::rng().fill(&mut entropy);
    hasher.update(entropy);
    hasher.finalize().to_vec()
}

/// Full serialization of `document` (§4.8 "Full write"): header, every
/// in-use object in ascending number order, a xref section, and the
/// trailer.
pub fn write(document: &Document, options: &WriterOptions) -> Result<Vec<u8>> {
    let use_xref_stream = options.xref_stream.unwrap_or_else(|| source_used_xref_stream(document));

    let mut w = Writer::new(Vec::new());
    w.write_header(&document.version, &document.binary_mark)?;

    let mut offsets: BTreeMap<u32, XrefEntry> = BTreeMap::new();
    for (&id, object) in &document.objects {
        let offset = w.write_object(id, object)?;
        offsets.insert(id.0, XrefEntry::Normal { offset: offset as u32, generation: id.1 });
    }

    let free: Vec<(u32, u16)> = document
        .free_generations
        .iter()
        .filter(|(num, _)| !document.objects.contains_key(&(**num, 0)))
        .map(|(&num, &generation)| (num, generation))
        .collect();
    for (num, entry) in link_free_chain(&free) {
        offsets.entry(num).or_insert(entry);
    }
    offsets.entry(0).or_insert(XrefEntry::Free { next: 0 });

    let size = document.max_id + 1;
    let mut trailer = document.trailer.clone();
    trailer.set("Size", size as i64);
    if trailer.get(b"ID").is_err() {
        let id = Object::string_literal(generate_id());
        trailer.set("ID", Object::Array(vec![id.clone(), id]));
    }

    if use_xref_stream {
        write_xref_stream_section(&mut w, &offsets, size, &trailer)?;
    } else {
        let entries: Vec<(u32, XrefEntry)> = offsets.into_iter().collect();
        let xref_offset = w.write_xref_table(&entries)?;
        w.write_trailer(&trailer)?;
        w.write_startxref(xref_offset)?;
    }

    Ok(w.inner)
}

/// Emits a cross-reference stream (§4.8 ADDED, ISO 32000-1 §7.5.8) in place
/// of a classical table: one packed `W = [1 4 2]` record per object number,
/// stored as the new highest-numbered object's own stream body.
fn write_xref_stream_section<W: Write>(
    w: &mut Writer<W>, offsets: &BTreeMap<u32, XrefEntry>, size: u32, trailer: &Dictionary,
) -> io::Result<()> {
    let xref_id = (size, 0);
    // The xref stream object describes itself too, at the offset it's about
    // to be written at (self-referential, but the offset is known up front
    // since nothing after this point precedes it).
    let mut offsets = offsets.clone();
    offsets.insert(xref_id.0, XrefEntry::Normal { offset: w.position as u32, generation: 0 });

    let numbers: Vec<u32> = offsets.keys().copied().collect();
    let mut index = Vec::new();
    let mut i = 0;
    while i < numbers.len() {
        let start = numbers[i];
        let mut j = i;
        while j + 1 < numbers.len() && numbers[j + 1] == numbers[j] + 1 {
            j += 1;
        }
        index.push(Object::integer(start as i64));
        index.push(Object::integer((j - i + 1) as i64));
        i = j + 1;
    }

    let mut body = Vec::with_capacity(offsets.len() * 7);
    for entry in offsets.values() {
        match *entry {
            XrefEntry::Free { next } => {
                body.push(0u8);
                body.extend_from_slice(&next.to_be_bytes());
                body.extend_from_slice(&65535u16.to_be_bytes());
            }
            XrefEntry::Normal { offset, generation } => {
                body.push(1u8);
                body.extend_from_slice(&offset.to_be_bytes());
                body.extend_from_slice(&generation.to_be_bytes());
            }
            XrefEntry::Compressed { container, index } => {
                body.push(2u8);
                body.extend_from_slice(&container.to_be_bytes());
                body.extend_from_slice(&(index as u16).to_be_bytes());
            }
            XrefEntry::UnusableFree => {
                body.push(0u8);
                body.extend_from_slice(&0u32.to_be_bytes());
                body.extend_from_slice(&65535u16.to_be_bytes());
            }
        }
    }

    let mut dict = trailer.clone();
    dict.set("Type", Object::name(&b"XRef"[..]));
    dict.set("W", Object::Array(vec![Object::integer(1), Object::integer(4), Object::integer(2)]));
    dict.set("Index", Object::Array(index));
    dict.set("Size", (size + 1) as i64);

    let xref_offset = w.position;
    let stream = Stream::new(dict, body);
    w.write_str(&format!("{} {} obj\n", xref_id.0, xref_id.1))?;
    w.write_stream(&stream)?;
    w.write_str("endobj\n")?;
    w.write_startxref(xref_offset)
}

/// Incremental update (§4.8 "Incremental update"): appends only the objects
/// whose ids are in `document.dirty`, plus a fresh xref section whose
/// `Prev` points at the original file's last xref and whose trailer reuses
/// `ID[0]` unchanged, leaving earlier revisions (and any signatures over
/// them) byte-for-byte intact.
pub fn write_incremental(document: &Document, original_bytes: &[u8], options: &WriterOptions) -> Result<Vec<u8>> {
    let use_xref_stream = options.xref_stream.unwrap_or_else(|| source_used_xref_stream(document));

    let mut w = Writer::new(original_bytes.to_vec());
    w.position = original_bytes.len() as u64;

    let mut offsets: BTreeMap<u32, XrefEntry> = BTreeMap::new();
    let mut dirty_numbers: Vec<u32> = document.dirty.iter().map(|(num, _)| *num).collect();
    dirty_numbers.sort_unstable();
    dirty_numbers.dedup();

    for num in &dirty_numbers {
        if let Some(generation) = document.free_generations.get(num) {
            if !document.objects.contains_key(&(*num, 0)) {
                offsets.insert(*num, XrefEntry::Free { next: *generation as u32 });
                continue;
            }
        }
        let generation = document.objects.keys().find(|id| id.0 == *num).map(|id| id.1).unwrap_or(0);
        if let Some(object) = document.objects.get(&(*num, generation)) {
            let offset = w.write_object((*num, generation), object)?;
            offsets.insert(*num, XrefEntry::Normal { offset: offset as u32, generation });
        }
    }

    let size = document.max_id + 1;
    let mut trailer = document.trailer.clone();
    trailer.set("Size", size as i64);
    trailer.set("Prev", document.xref_start as i64);

    if use_xref_stream {
        write_xref_stream_section(&mut w, &offsets, size, &trailer)?;
    } else {
        let entries: Vec<(u32, XrefEntry)> = offsets.into_iter().collect();
        let xref_offset = w.write_xref_table(&entries)?;
        w.write_trailer(&trailer)?;
        w.write_startxref(xref_offset)?;
    }

    Ok(w.inner)
}

impl Document {
    /// Full serialization to bytes, per `WriterOptions::default()`.
    pub fn save_to_bytes(&self) -> Result<Vec<u8>> {
        write(self, &WriterOptions::default())
    }

    /// Full serialization, written to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.save_to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// A document plus the original bytes it was parsed from, enabling
/// `write_incremental` appends that preserve earlier revisions intact.
pub struct IncrementalDocument {
    original_bytes: Vec<u8>,
    pub document: Document,
}

impl IncrementalDocument {
    pub fn create_from(original_bytes: Vec<u8>, document: Document) -> Self {
        IncrementalDocument { original_bytes, document }
    }

    pub fn save_to_bytes(&self) -> Result<Vec<u8>> {
        write_incremental(&self.document, &self.original_bytes, &WriterOptions::default())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.save_to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Stream;

    fn sample_document() -> Document {
        let mut doc = Document::new();
        doc.version = "1.7".to_string();
        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::name(&b"Catalog"[..]));
        catalog.set("Pages", Object::Reference((2, 0)));
        let catalog_id = (1, 0);
        doc.objects.insert(catalog_id, Object::Dictionary(catalog));

        let mut pages = Dictionary::new();
        pages.set("Type", Object::name(&b"Pages"[..]));
        pages.set("Kids", Object::Array(vec![Object::Reference((3, 0))]));
        pages.set("Count", Object::integer(1));
        doc.objects.insert((2, 0), Object::Dictionary(pages));

        let mut page = Dictionary::new();
        page.set("Type", Object::name(&b"Page"[..]));
        page.set("Parent", Object::Reference((2, 0)));
        page.set("MediaBox", Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]));
        page.set("Contents", Object::Reference((4, 0)));
        doc.objects.insert((3, 0), Object::Dictionary(page));

        doc.objects.insert((4, 0), Object::Stream(Stream::new(Dictionary::new(), b"BT ET".to_vec())));

        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.max_id = 4;
        doc.reference_table.size = 5;
        doc
    }

    #[test]
    fn full_write_round_trips_through_the_parser() {
        let doc = sample_document();
        let bytes = write(&doc, &WriterOptions::default()).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.7\n"));
        assert!(text.contains("1 0 obj"));
        assert!(text.contains("/Type /Catalog"));
        assert!(text.contains("xref\n"));
        assert!(text.contains("trailer\n"));
        assert!(text.ends_with("%%EOF\n"));

        let reparsed = Document::load_mem(&bytes).expect("round-tripped bytes should reparse");
        let catalog = reparsed.get_object((1, 0)).unwrap().as_dict().unwrap();
        assert_eq!(catalog.get_type().unwrap(), b"Catalog");
    }

    #[test]
    fn incremental_write_preserves_original_bytes_and_appends_prev() {
        let mut doc = sample_document();
        let original = write(&doc, &WriterOptions::default()).unwrap();
        let keyword_end = original.windows(9).rposition(|w| w == b"startxref").unwrap() + 10;
        let digits_end = original[keyword_end..].iter().position(|&b| b == b'\n').unwrap() + keyword_end;
        doc.xref_start = std::str::from_utf8(&original[keyword_end..digits_end]).unwrap().parse().unwrap();

        doc.update_object((1, 0), {
            let mut catalog = Dictionary::new();
            catalog.set("Type", Object::name(&b"Catalog"[..]));
            catalog.set("Pages", Object::Reference((2, 0)));
            catalog.set("Lang", Object::string_literal(&b"en"[..]));
            Object::Dictionary(catalog)
        });

        let appended = write_incremental(&doc, &original, &WriterOptions::default()).unwrap();
        assert!(appended.starts_with(&original));
        let tail = String::from_utf8_lossy(&appended[original.len()..]);
        assert!(tail.contains("/Lang"));
        assert!(tail.contains("/Prev"));
    }
}
