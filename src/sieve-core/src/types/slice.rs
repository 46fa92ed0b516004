//! Slice: an assignment of values to named columns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Value;

/// An assignment of values to named columns — the unit a filter matches
/// or rejects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
    values: BTreeMap<String, Value>,
}

impl Slice {
    /// Create an empty slice.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion of a column value.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    /// Insert a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    /// Get the value of a column, if present.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Columns present in this slice.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of columns in this slice.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the slice has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
