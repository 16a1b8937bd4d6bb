//! The in-memory PDF document (§4.5): object store, cross-reference table,
//! trailer, and the mutation/traversal operations everything else in the
//! crate is built around. Grounded on the call-site contracts
//! `reader/mod.rs` and `reader/metadata.rs` already rely on
//! (`get_object`, `dereference`, the page-tree DFS/inheritance walk).

use std::collections::{BTreeMap, HashSet};

use crate::dictionary::Dictionary;
use crate::encryption::{self, EncryptionState};
use crate::error::Error;
use crate::geometry::Rectangle;
use crate::interpreter::{self, GraphicsObject, ParseOptions, TextRun};
use crate::object::{Object, ObjectId, Stream};
use crate::xref::{Xref, XrefEntry};
use crate::Result;

/// Fallback returned by [`Document::dereference`] for a cyclic or dangling
/// reference chain; needed so the borrowed-return signature can still
/// produce a value when nothing in the object store applies.
static NULL_OBJECT: Object = Object::Null;

/// Maximum number of hops [`Document::resolve`] will follow before giving
/// up on a reference chain and returning `Null` (§4.5).
const MAX_RESOLVE_HOPS: usize = 50;

#[derive(Clone, Default)]
pub struct Document {
    pub version: String,
    pub objects: BTreeMap<ObjectId, Object>,
    pub reference_table: Xref,
    pub trailer: Dictionary,
    pub xref_start: usize,
    pub max_id: u32,
    pub binary_mark: Vec<u8>,
    pub encryption_state: Option<EncryptionState>,
    /// (object number, generation-to-reuse) for tombstoned objects, kept so
    /// the writer can link an ISO-accurate free-list `next` chain.
    pub(crate) free_generations: BTreeMap<u32, u16>,
    /// Ids touched since load, by `add_object`/`update_object`/
    /// `remove_object`; consulted by `write_incremental`.
    pub(crate) dirty: HashSet<ObjectId>,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    /// Look up an already-loaded object, following exactly one level of
    /// `IndirectRef` (§4.5: `get_object` does not chase references
    /// recursively; use [`Document::resolve`] for that).
    pub fn get_object(&self, id: ObjectId) -> Result<&Object> {
        let obj = self.objects.get(&id).ok_or(Error::UnresolvedReference(id))?;
        match obj {
            Object::Reference(target) => self.objects.get(target).ok_or(Error::UnresolvedReference(*target)),
            _ => Ok(obj),
        }
    }

    pub fn get_object_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        let target = match self.objects.get(&id) {
            Some(Object::Reference(r)) => Some(*r),
            Some(_) => None,
            None => return Err(Error::UnresolvedReference(id)),
        };
        match target {
            Some(r) => self.objects.get_mut(&r).ok_or(Error::UnresolvedReference(r)),
            None => self.objects.get_mut(&id).ok_or(Error::UnresolvedReference(id)),
        }
    }

    /// Follows `value` through the object store until it lands on a
    /// non-reference, returning the id of the last reference hopped through
    /// (or `(0, 0)` if `value` was never a reference) alongside the final
    /// object. Breaks out early on a dangling or cyclic chain.
    pub fn dereference<'a>(&'a self, value: &'a Object) -> Result<(ObjectId, &'a Object)> {
        let mut current = value;
        let mut id = (0u32, 0u16);
        let mut hops = 0usize;
        let mut seen = HashSet::new();
        while let Object::Reference(target) = current {
            if hops >= MAX_RESOLVE_HOPS || !seen.insert(*target) {
                return Ok((id, &NULL_OBJECT));
            }
            id = *target;
            hops += 1;
            current = match self.objects.get(target) {
                Some(o) => o,
                None => return Ok((id, &NULL_OBJECT)),
            };
        }
        Ok((id, current))
    }

    /// Recursively resolves `value` until it is no longer a reference,
    /// returning `Null` once a chain exceeds `N >= 50` hops or cycles back
    /// on itself (§4.5). Unlike [`Document::dereference`] this returns an
    /// owned value, so it doubles as the `resolve` closure the interpreter
    /// and function evaluator take.
    pub fn resolve(&self, value: &Object) -> Result<Object> {
        let mut current = value.clone();
        let mut hops = 0usize;
        let mut seen = HashSet::new();
        loop {
            match current {
                Object::Reference(id) => {
                    if hops >= MAX_RESOLVE_HOPS || !seen.insert(id) {
                        return Ok(Object::Null);
                    }
                    hops += 1;
                    current = self.objects.get(&id).cloned().unwrap_or(Object::Null);
                }
                other => return Ok(other),
            }
        }
    }

    fn resolver(&self) -> impl Fn(&Object) -> Result<Object> + '_ {
        move |obj: &Object| self.resolve(obj)
    }

    /// Allocates the next free object number at generation 0 and inserts
    /// `object` under it (§4.5).
    pub fn add_object<T: Into<Object>>(&mut self, object: T) -> ObjectId {
        self.max_id += 1;
        let id = (self.max_id, 0);
        self.objects.insert(id, object.into());
        self.reference_table.insert(id.0, XrefEntry::Normal { offset: 0, generation: 0 });
        self.reference_table.size = self.reference_table.size.max(self.max_id + 1);
        self.dirty.insert(id);
        id
    }

    /// Overwrites the object at `id`, rewiring its xref entry to `Normal`
    /// (§4.5). `id`'s generation is whatever the caller supplies; this does
    /// not bump it automatically.
    pub fn update_object<T: Into<Object>>(&mut self, id: ObjectId, object: T) {
        self.objects.insert(id, object.into());
        self.reference_table.insert(id.0, XrefEntry::Normal { offset: 0, generation: id.1 });
        self.free_generations.remove(&id.0);
        self.max_id = self.max_id.max(id.0);
        self.dirty.insert(id);
    }

    /// Tombstones the object at `id`: removed from the store, its xref
    /// entry becomes `Free`, and the generation it should reappear at next
    /// (current + 1) is recorded for the writer's free-list chain.
    pub fn remove_object(&mut self, id: ObjectId) -> Option<Object> {
        let removed = self.objects.remove(&id);
        if removed.is_some() {
            self.reference_table.insert(id.0, XrefEntry::Free { next: 0 });
            self.free_generations.insert(id.0, id.1.wrapping_add(1));
            self.dirty.insert(id);
        }
        removed
    }

    /// Authenticates `password` against the document's `/Encrypt`
    /// dictionary and, on success, primes `encryption_state` for
    /// subsequent decryption. An empty password should be tried first by
    /// callers for documents with no owner protection (§6).
    pub fn authenticate_password(&mut self, password: &str) -> Result<()> {
        let state = encryption::decode(self, password)?;
        self.encryption_state = Some(state);
        Ok(())
    }

    fn catalog(&self) -> Result<&Dictionary> {
        let root_ref = self.trailer.get(b"Root").and_then(Object::as_reference)?;
        self.get_object(root_ref)?.as_dict()
    }

    /// DFS over `Pages.Kids`, returning every leaf `Page` dictionary's id
    /// keyed by its 1-based page number (§4.5).
    pub fn get_pages(&self) -> BTreeMap<u32, ObjectId> {
        let mut pages = BTreeMap::new();
        let Ok(catalog) = self.catalog() else { return pages };
        let Ok(pages_ref) = catalog.get(b"Pages").and_then(Object::as_reference) else { return pages };
        let mut next = 1u32;
        let mut seen = HashSet::new();
        self.collect_pages(pages_ref, &mut next, &mut pages, &mut seen);
        pages
    }

    fn collect_pages(&self, id: ObjectId, next: &mut u32, out: &mut BTreeMap<u32, ObjectId>, seen: &mut HashSet<ObjectId>) {
        if !seen.insert(id) {
            return;
        }
        let Ok(obj) = self.get_object(id) else { return };
        let Ok(dict) = obj.as_dict() else { return };
        if dict.has_type(b"Page") {
            out.insert(*next, id);
            *next += 1;
            return;
        }
        let Ok(kids) = dict.get(b"Kids").and_then(Object::as_array) else { return };
        for kid in kids {
            if let Ok(kid_ref) = kid.as_reference() {
                self.collect_pages(kid_ref, next, out, seen);
            }
        }
    }

    pub fn get_page(&self, page_number: u32) -> Option<ObjectId> {
        self.get_pages().get(&page_number).copied()
    }

    /// Walks `Parent` up from `page_id` looking for the first ancestor
    /// (including `page_id` itself) that carries `key`, implementing the
    /// `MediaBox`/`Resources`/`Rotate` inheritance rule (§3 Invariant 3).
    fn find_inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut current = page_id;
        let mut seen = HashSet::new();
        loop {
            if !seen.insert(current) {
                return None;
            }
            let dict = self.get_object(current).ok()?.as_dict().ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(value.clone());
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
        }
    }

    pub fn get_page_media_box(&self, page_id: ObjectId) -> Option<Rectangle> {
        let value = self.resolve(&self.find_inherited(page_id, b"MediaBox")?).ok()?;
        rectangle_from_array(&value)
    }

    pub fn get_page_crop_box(&self, page_id: ObjectId) -> Option<Rectangle> {
        let value = self.find_inherited(page_id, b"CropBox").and_then(|v| self.resolve(&v).ok());
        value.and_then(|v| rectangle_from_array(&v)).or_else(|| self.get_page_media_box(page_id))
    }

    pub fn get_page_rotation(&self, page_id: ObjectId) -> i64 {
        self.find_inherited(page_id, b"Rotate")
            .and_then(|v| self.resolve(&v).ok())
            .and_then(|v| v.as_i64().ok())
            .unwrap_or(0)
    }

    pub fn get_page_resources(&self, page_id: ObjectId) -> Result<Dictionary> {
        let value = self.find_inherited(page_id, b"Resources").ok_or(Error::DictKey(b"Resources".to_vec()))?;
        self.resolve(&value)?.as_dict().cloned()
    }

    /// Concatenates a page's `Contents` (a single stream or an array of
    /// streams) into one decoded byte sequence, appending a newline after
    /// each stream (§4.5). A content reference that failed to load (e.g. a
    /// malformed stream the parser had to drop) is silently skipped rather
    /// than failing the whole page, matching how the rest of a damaged PDF
    /// is still expected to render.
    pub fn get_page_contents(&self, page_id: ObjectId) -> Result<Vec<u8>> {
        let dict = self.get_object(page_id)?.as_dict()?;
        let contents = dict.get(b"Contents")?;

        let mut out = Vec::new();
        let push_stream = |id: ObjectId, out: &mut Vec<u8>| {
            if let Ok(data) = self.get_object(id).and_then(Object::as_stream).and_then(Stream::decompressed_content) {
                out.extend_from_slice(&data);
                out.push(b'\n');
            }
        };

        match contents {
            Object::Array(items) => {
                for item in items {
                    if let Ok(id) = item.as_reference() {
                        push_stream(id, &mut out);
                    }
                }
            }
            Object::Reference(id) => push_stream(*id, &mut out),
            Object::Stream(stream) => {
                out.extend_from_slice(&stream.decompressed_content()?);
                out.push(b'\n');
            }
            _ => return Err(Error::Type("Stream, Reference or Array for /Contents")),
        }
        Ok(out)
    }

    /// Runs the content interpreter over a page's content stream,
    /// returning every positioned text run and image placement record.
    pub fn interpret_page(&self, page_id: ObjectId) -> Result<Vec<GraphicsObject>> {
        let content = self.get_page_contents(page_id)?;
        let resources = self.get_page_resources(page_id)?;
        interpreter::interpret_content_stream(&content, &resources, &self.resolver(), &ParseOptions::default())
    }

    /// Positioned text runs for a single page (§6 `extract_text(doc, page)`).
    pub fn page_text_runs(&self, page_id: ObjectId) -> Result<Vec<TextRun>> {
        Ok(self
            .interpret_page(page_id)?
            .into_iter()
            .filter_map(|o| match o {
                GraphicsObject::Text(run) => Some(run),
                GraphicsObject::Image(_) => None,
            })
            .collect())
    }

    /// Concatenates a single page's text runs into one string, with no
    /// separator between runs (layout is the caller's concern).
    pub fn extract_page_text(&self, page_id: ObjectId) -> Result<String> {
        Ok(interpreter::collect_text(&self.interpret_page(page_id)?))
    }

    /// Extracts text for a set of 1-based page numbers, newline-terminating
    /// each page so callers can tell pages apart in the concatenated result.
    pub fn extract_text(&self, page_numbers: &[u32]) -> Result<String> {
        let mut text = String::new();
        for &number in page_numbers {
            let page_id = self.get_page(number).ok_or(Error::Type("valid page number"))?;
            text.push_str(&self.extract_page_text(page_id)?);
            text.push('\n');
        }
        Ok(text)
    }
}

fn rectangle_from_array(obj: &Object) -> Option<Rectangle> {
    let items = obj.as_array().ok()?;
    if items.len() != 4 {
        return None;
    }
    let n = |i: usize| items[i].as_f64().ok();
    Some(Rectangle::new(n(0)?, n(1)?, n(2)?, n(3)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Stream;

    fn single_page_document() -> Document {
        let mut doc = Document::new();
        doc.version = "1.7".to_string();

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::name(&b"Catalog"[..]));
        catalog.set("Pages", Object::Reference((2, 0)));
        doc.objects.insert((1, 0), Object::Dictionary(catalog));

        let mut pages = Dictionary::new();
        pages.set("Type", Object::name(&b"Pages"[..]));
        pages.set("Kids", Object::Array(vec![Object::Reference((3, 0))]));
        pages.set("Count", Object::integer(1));
        doc.objects.insert((2, 0), Object::Dictionary(pages));

        let mut page = Dictionary::new();
        page.set("Type", Object::name(&b"Page"[..]));
        page.set("Parent", Object::Reference((2, 0)));
        page.set("MediaBox", Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]));
        page.set("Resources", Object::Dictionary(Dictionary::new()));
        page.set("Contents", Object::Reference((4, 0)));
        doc.objects.insert((3, 0), Object::Dictionary(page));

        doc.objects.insert((4, 0), Object::Stream(Stream::new(Dictionary::new(), b"BT /F1 12 Tf (hi) Tj ET".to_vec())));

        doc.trailer.set("Root", Object::Reference((1, 0)));
        doc.max_id = 4;
        doc.reference_table.size = 5;
        doc
    }

    #[test]
    fn walks_page_tree_and_inherits_media_box() {
        let doc = single_page_document();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = pages[&1];
        let media_box = doc.get_page_media_box(page_id).unwrap();
        assert_eq!(media_box.width(), 612.0);
        assert_eq!(media_box.height(), 792.0);
    }

    #[test]
    fn get_object_follows_exactly_one_reference_hop() {
        let mut doc = Document::new();
        doc.objects.insert((1, 0), Object::Reference((2, 0)));
        doc.objects.insert((2, 0), Object::integer(7));
        assert_eq!(doc.get_object((1, 0)).unwrap().as_i64().unwrap(), 7);
    }

    #[test]
    fn resolve_breaks_self_referential_cycles() {
        let mut doc = Document::new();
        doc.objects.insert((1, 0), Object::Reference((1, 0)));
        assert_eq!(doc.resolve(&Object::Reference((1, 0))).unwrap(), Object::Null);
    }

    #[test]
    fn add_and_remove_object_round_trip_xref_state() {
        let mut doc = Document::new();
        doc.max_id = 0;
        let id = doc.add_object(Object::integer(42));
        assert_eq!(doc.get_object(id).unwrap().as_i64().unwrap(), 42);
        assert!(doc.dirty.contains(&id));

        doc.remove_object(id);
        assert!(doc.get_object(id).is_err());
        assert!(matches!(doc.reference_table.get(id.0), Some(XrefEntry::Free { .. })));
    }

    #[test]
    fn extract_text_reads_the_page_content_stream() {
        let doc = single_page_document();
        let page_id = doc.get_page(1).unwrap();
        let runs = doc.page_text_runs(page_id).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "hi");
    }

    #[test]
    fn extract_text_by_page_number_newline_terminates_each_page() {
        let doc = single_page_document();
        assert_eq!(doc.extract_text(&[1]).unwrap(), "hi\n");
        assert!(doc.extract_text(&[2]).is_err());
    }
}
