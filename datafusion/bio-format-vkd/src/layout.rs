//! Sample-column layouts.
//!
//! Each record's FORMAT column is a colon-separated list of field ids giving the order of
//! values in its sample column. A file usually carries only a handful of distinct layouts,
//! so they are interned once and referred to by index.

use crate::rules::MISSING_VALUE;
use std::collections::HashMap;

/// Separator between field ids in a layout and between values in a sample payload.
pub const SAMPLE_DELIMITER: char = ':';

/// One distinct FORMAT layout, e.g. `GT:AD:DP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    key: String,
    ids: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Layout {
    /// Parses a layout string. The missing marker yields a layout with no fields.
    pub fn parse(key: &str) -> Self {
        let ids: Vec<String> = if key == MISSING_VALUE || key.is_empty() {
            Vec::new()
        } else {
            key.split(SAMPLE_DELIMITER).map(|s| s.to_string()).collect()
        };
        // A repeated id resolves to its last position.
        let positions = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        Layout {
            key: key.to_string(),
            ids,
            positions,
        }
    }

    /// The layout string exactly as it appeared in the records.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Field ids in payload order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Position of `id` in the sample payload, if the layout carries it.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }
}

/// The set of distinct layouts seen in a source, in first-appearance order.
#[derive(Debug, Clone, Default)]
pub struct LayoutMap {
    layouts: Vec<Layout>,
    index: HashMap<String, usize>,
}

impl LayoutMap {
    /// Collects the distinct layout strings of a record stream.
    pub fn discover<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut map = LayoutMap::default();
        for key in keys {
            map.register(key);
        }
        map
    }

    /// Interns a layout string and returns its index.
    pub fn register(&mut self, key: &str) -> usize {
        if let Some(&i) = self.index.get(key) {
            return i;
        }
        let i = self.layouts.len();
        self.layouts.push(Layout::parse(key));
        self.index.insert(key.to_string(), i);
        i
    }

    /// Index of an already registered layout string.
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Layout by layout string.
    pub fn get(&self, key: &str) -> Option<&Layout> {
        self.index_of(key).map(|i| &self.layouts[i])
    }

    /// Layout by index.
    pub fn layout(&self, index: usize) -> Option<&Layout> {
        self.layouts.get(index)
    }

    /// All layouts in first-appearance order.
    pub fn layouts(&self) -> &[Layout] {
        &self.layouts
    }

    /// Number of distinct layouts.
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    /// True when no record carried a layout.
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}
