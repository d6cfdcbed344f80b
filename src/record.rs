//! The record interface compiled expressions read from.
//!
//! The compiler only needs to know which field names exist and how to build a
//! closure that fetches one; [`DataLayout`] and [`DataMap`] are a minimal
//! name-to-slot implementation of that contract.

use std::collections::HashMap;
use std::sync::Arc;

use crate::datum::Datum;

/// A closure that reads one field out of a record.
pub type Accessor<R> = Arc<dyn Fn(&R) -> Datum + Send + Sync>;

/// Describes the fields available in records of type `Self::Record`.
///
/// Only consulted while compiling; the accessors it hands out must not borrow
/// the schema.
pub trait Schema {
    type Record;

    fn has_name(&self, name: &str) -> bool;

    fn accessor(&self, name: &str) -> Option<Accessor<Self::Record>>;
}

/// A record that knows its own schema.
pub trait Record: Sized {
    type Schema: Schema<Record = Self>;

    fn schema(&self) -> &Self::Schema;
}

/// A name to slot table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataLayout {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl DataLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, returning its slot. Adding an existing name returns the
    /// existing slot.
    pub fn add(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.index.get(name) {
            return slot;
        }
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), self.names.len() - 1);
        self.names.len() - 1
    }

    pub fn slot(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for DataLayout {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut layout = DataLayout::new();
        for name in iter {
            layout.add(name);
        }
        layout
    }
}

impl Schema for DataLayout {
    type Record = DataMap;

    fn has_name(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The accessor reads the slot `name` has in this layout. A record built
    /// from another layout is read by name instead; if that layout lacks the
    /// field, the read is logged and yields the default value.
    fn accessor(&self, name: &str) -> Option<Accessor<DataMap>> {
        let slot = self.slot(name)?;
        let name = name.to_string();
        Some(Arc::new(move |map: &DataMap| {
            if map.layout.names.get(slot) == Some(&name) {
                return map.get_slot(slot);
            }
            match map.layout.slot(&name) {
                Some(other) => map.get_slot(other),
                None => {
                    log::error!("record layout has no field {:?}", name);
                    Datum::default()
                }
            }
        }))
    }
}

/// A record: one value per field of a shared [`DataLayout`].
#[derive(Debug, Clone)]
pub struct DataMap {
    layout: Arc<DataLayout>,
    values: Vec<Datum>,
}

impl DataMap {
    pub fn new(layout: Arc<DataLayout>) -> Self {
        let values = vec![Datum::default(); layout.len()];
        Self { layout, values }
    }

    pub fn layout(&self) -> &Arc<DataLayout> {
        &self.layout
    }

    /// Set a field by name. Returns `false` if the layout has no such field.
    pub fn set(&mut self, name: &str, value: impl Into<Datum>) -> bool {
        match self.layout.slot(name) {
            Some(slot) => {
                self.values[slot] = value.into();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Datum> {
        self.layout.slot(name).map(|slot| &self.values[slot])
    }

    /// The value in `slot`, or the default value if it is out of range.
    pub fn get_slot(&self, slot: usize) -> Datum {
        self.values.get(slot).cloned().unwrap_or_default()
    }
}

impl Record for DataMap {
    type Schema = DataLayout;

    fn schema(&self) -> &DataLayout {
        &self.layout
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn layout_and_map() {
        let layout: Arc<DataLayout> = Arc::new(["x", "y", "x"].into_iter().collect());
        assert_eq!(layout.len(), 2);
        assert!(layout.has_name("y"));
        assert!(!layout.has_name("z"));

        let mut map = DataMap::new(layout.clone());
        assert!(map.set("y", 4.0));
        assert!(!map.set("z", 1.0));
        assert_eq!(map.get("y"), Some(&Datum::from(4.0)));
        assert_eq!(map.get("x"), Some(&Datum::default()));

        let read_y = layout.accessor("y").unwrap();
        assert_eq!(read_y(&map), 4.0);
        assert!(layout.accessor("z").is_none());
    }

    #[test]
    fn accessor_on_another_layout() {
        let layout: DataLayout = ["x", "y"].into_iter().collect();
        let read_x = layout.accessor("x").unwrap();

        let reordered: Arc<DataLayout> = Arc::new(["y", "x"].into_iter().collect());
        let mut map = DataMap::new(reordered);
        map.set("x", 7.0);
        map.set("y", 1.0);
        assert_eq!(read_x(&map), 7.0);

        let mut other = DataMap::new(Arc::new(["y"].into_iter().collect()));
        other.set("y", 1.0);
        assert_eq!(read_x(&other), Datum::default());
    }
}
