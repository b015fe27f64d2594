//! Host associative container.
//!
//! Mirrors the host's table: integer and string keys, a border length
//! (`#t`) and an optional `n` field carrying a declared cardinality.

use std::collections::BTreeMap;
use std::fmt;

use super::HostValue;
use crate::status::{CoreError, CoreResult};

/// Field holding an explicit element count
pub const DECLARED_LEN_FIELD: &str = "n";

/// Table key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableKey {
    Index(i64),
    Name(String),
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKey::Index(i) => write!(f, "[{}]", i),
            TableKey::Name(n) => write!(f, "{}", n),
        }
    }
}

impl From<i64> for TableKey {
    fn from(i: i64) -> Self {
        TableKey::Index(i)
    }
}

impl From<&str> for TableKey {
    fn from(s: &str) -> Self {
        TableKey::Name(s.to_string())
    }
}

/// The host's associative container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostTable {
    entries: BTreeMap<TableKey, HostValue>,
}

impl HostTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sequence `{1: v1, 2: v2, ...}`
    pub fn from_sequence<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<HostValue>,
    {
        let mut table = Self::new();
        for (i, v) in values.into_iter().enumerate() {
            table.set_index(i as i64 + 1, v);
        }
        table
    }

    pub fn get(&self, key: &TableKey) -> Option<&HostValue> {
        self.entries.get(key)
    }

    pub fn get_index(&self, index: i64) -> Option<&HostValue> {
        self.entries.get(&TableKey::Index(index))
    }

    pub fn get_field(&self, name: &str) -> Option<&HostValue> {
        self.entries.get(&TableKey::Name(name.to_string()))
    }

    /// Assign a value; assigning nil removes the key, as the host does
    pub fn set(&mut self, key: TableKey, value: impl Into<HostValue>) {
        let value = value.into();
        if value.is_nil() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    pub fn set_index(&mut self, index: i64, value: impl Into<HostValue>) {
        self.set(TableKey::Index(index), value)
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<HostValue>) {
        self.set(TableKey::Name(name.to_string()), value)
    }

    pub fn remove(&mut self, key: &TableKey) -> Option<HostValue> {
        self.entries.remove(key)
    }

    /// Record an explicit cardinality in the `n` field
    pub fn with_declared_len(mut self, n: usize) -> Self {
        self.set_field(DECLARED_LEN_FIELD, n);
        self
    }

    /// Border length: the largest `k` such that keys `1..=k` are all present
    pub fn len(&self) -> usize {
        let mut border = 0i64;
        for key in self.entries.range(TableKey::Index(1)..) {
            match key.0 {
                TableKey::Index(i) if *i == border + 1 => border = *i,
                _ => break,
            }
        }
        border as usize
    }

    /// Declared cardinality: the `n` field when present, else the border
    pub fn declared_len(&self) -> CoreResult<usize> {
        match self.get_field(DECLARED_LEN_FIELD) {
            None => Ok(self.len()),
            Some(v) => v.to_size("table field 'n'").map_err(|e| match e {
                CoreError::RangeError(msg) => CoreError::RangeError(msg),
                _ => CoreError::invalid(format!(
                    "table field 'n' must be an integer, got {}",
                    v.type_name()
                )),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keys of any kind
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TableKey, &HostValue)> {
        self.entries.iter()
    }

    /// Values at `1, 2, ...` up to the first gap
    pub fn sequence(&self) -> impl Iterator<Item = &HostValue> {
        (1..=self.len() as i64).filter_map(move |i| self.get_index(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_border_length() {
        let mut t = HostTable::from_sequence([10i64, 20, 30]);
        assert_eq!(t.len(), 3);

        t.set_index(5, 50i64);
        assert_eq!(t.len(), 3);

        t.set_index(2, HostValue::Nil);
        assert_eq!(t.len(), 1);

        t.set_field("name", "x");
        assert_eq!(t.len(), 1);
        assert_eq!(t.entry_count(), 4);
    }

    #[test]
    fn test_negative_and_zero_keys_ignored_by_border() {
        let mut t = HostTable::new();
        t.set_index(0, 1i64);
        t.set_index(-3, 1i64);
        assert_eq!(t.len(), 0);
        t.set_index(1, 1i64);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_declared_len() {
        let t = HostTable::from_sequence([1i64, 2]);
        assert_eq!(t.declared_len(), Ok(2));

        let t = t.with_declared_len(3);
        assert_eq!(t.declared_len(), Ok(3));

        let mut bad = HostTable::new();
        bad.set_field("n", "three");
        assert!(matches!(bad.declared_len(), Err(CoreError::InvalidArgument(_))));

        let mut negative = HostTable::new();
        negative.set_field("n", -1i64);
        assert!(matches!(negative.declared_len(), Err(CoreError::RangeError(_))));
    }

    #[test]
    fn test_sequence_stops_at_gap() {
        let mut t = HostTable::from_sequence(["a", "b", "c"]);
        t.set_index(2, HostValue::Nil);
        let items: Vec<_> = t.sequence().collect();
        assert_eq!(items, vec![&HostValue::from("a")]);
    }
}
