//! Addressing of positions inside a bound value.

use std::fmt;

use serde_json::Map;
use serde_json::Value;

/// One step from a parent position to a child position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathKey {
    /// Named sub-field of an object.
    Field(String),
    /// Indexed element of an array.
    Index(usize),
}

impl From<&str> for PathKey {
    fn from(name: &str) -> Self {
        PathKey::Field(name.to_string())
    }
}

impl From<String> for PathKey {
    fn from(name: String) -> Self {
        PathKey::Field(name)
    }
}

impl From<usize> for PathKey {
    fn from(index: usize) -> Self {
        PathKey::Index(index)
    }
}

/// Ordered list of keys leading from the root value to a position.
///
/// The empty path addresses the root itself. Paths render as the
/// dot/bracket names used for error properties, e.g. `items[0].title`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ModelPath(Vec<PathKey>);

impl ModelPath {
    /// Returns the path of the root value.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns `true` if this path addresses the root value.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the keys of this path, outermost first.
    pub fn keys(&self) -> &[PathKey] {
        &self.0
    }

    /// Returns the last key, or `None` for the root.
    pub fn last(&self) -> Option<&PathKey> {
        self.0.last()
    }

    /// Returns the path of the enclosing position, or `None` for the root.
    pub fn parent(&self) -> Option<ModelPath> {
        let (_, init) = self.0.split_last()?;
        Some(Self(init.to_vec()))
    }

    /// Returns the path extended by `key`.
    pub fn child(&self, key: PathKey) -> ModelPath {
        let mut keys = self.0.clone();
        keys.push(key);
        Self(keys)
    }

    /// Looks up the value at this path inside `root`.
    pub fn read<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(root, |value, key| match key {
            PathKey::Field(name) => value.get(name.as_str()),
            PathKey::Index(index) => value.get(*index),
        })
    }

    /// Stores `new_value` at this path inside `root`.
    ///
    /// Missing containers along the way are created: non-objects become
    /// empty objects and arrays are padded with `null` up to the index.
    /// Returns `false`, leaving `root` partially rewritten, if an index
    /// cannot be allocated.
    pub fn write(&self, root: &mut Value, new_value: Value) -> bool {
        let mut slot = root;
        for key in &self.0 {
            match child_slot(slot, key) {
                Some(child) => slot = child,
                None => return false,
            }
        }
        *slot = new_value;
        true
    }
}

fn child_slot<'a>(slot: &'a mut Value, key: &PathKey) -> Option<&'a mut Value> {
    match key {
        PathKey::Field(name) => {
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            let map = slot.as_object_mut()?;
            Some(map.entry(name.clone()).or_insert(Value::Null))
        }
        PathKey::Index(index) => {
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            let items = slot.as_array_mut()?;
            let len = index.checked_add(1)?;
            if items.len() < len {
                items.try_reserve(len - items.len()).ok()?;
                items.resize(len, Value::Null);
            }
            items.get_mut(*index)
        }
    }
}

impl fmt::Display for ModelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, key) in self.0.iter().enumerate() {
            match key {
                PathKey::Field(name) if position == 0 => write!(f, "{}", name)?,
                PathKey::Field(name) => write!(f, ".{}", name)?,
                PathKey::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl FromIterator<PathKey> for ModelPath {
    fn from_iter<I: IntoIterator<Item = PathKey>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
