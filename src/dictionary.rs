use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::object::Object;

/// An ordered mapping from PDF name to PDF value.
///
/// Order is preserved for stable round-trip but, per ISO 32000-1 §7.3.7,
/// carries no semantic weight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary(IndexMap<Vec<u8>, Object>);

impl Dictionary {
    pub fn new() -> Self {
        Dictionary(IndexMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Result<&Object> {
        self.0.get(key).ok_or_else(|| Error::DictKey(key.to_vec()))
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Result<&mut Object> {
        self.0.get_mut(key).ok_or_else(|| Error::DictKey(key.to_vec()))
    }

    pub fn has(&self, key: &[u8]) -> bool {
        self.0.contains_key(key)
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<Vec<u8>>,
        V: Into<Object>,
    {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Object> {
        self.0.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Object)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Vec<u8>, &mut Object)> {
        self.0.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.0.keys()
    }

    /// Value of the `/Type` entry, if present and a Name.
    pub fn get_type(&self) -> Result<&[u8]> {
        self.get(b"Type").and_then(Object::as_name)
    }

    /// True if `/Type` equals `ty`.
    pub fn has_type(&self, ty: &[u8]) -> bool {
        matches!(self.get_type(), Ok(t) if t == ty)
    }

    /// Value of the `/Subtype` entry, if present and a Name.
    pub fn get_subtype(&self) -> Result<&[u8]> {
        self.get(b"Subtype").and_then(Object::as_name)
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Vec<u8>, &'a Object);
    type IntoIter = indexmap::map::Iter<'a, Vec<u8>, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(Vec<u8>, Object)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (Vec<u8>, Object)>>(iter: T) -> Self {
        Dictionary(IndexMap::from_iter(iter))
    }
}
