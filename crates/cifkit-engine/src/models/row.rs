use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::models::Category;
use crate::value::{FromItemValue, is_null};

static NEXT_CATEGORY_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of a category instance, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryId(u32);

impl CategoryId {
    pub(crate) fn next() -> Self {
        CategoryId(NEXT_CATEGORY_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(id: u32) -> Self {
        CategoryId(id)
    }
}

/// A handle to a row.
///
/// Handles are checked on every use: the category must be the one that
/// issued the handle and the row must not have been erased since. A stale
/// handle yields [`CifError::StaleRow`](crate::CifError::StaleRow) instead
/// of reaching whatever row now occupies the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId {
    category: CategoryId,
    slot: u32,
    generation: u32,
}

impl RowId {
    pub(crate) fn new(category: CategoryId, slot: u32, generation: u32) -> Self {
        Self {
            category,
            slot,
            generation,
        }
    }

    pub fn category(&self) -> CategoryId {
        self.category
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot as usize
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}/{}", self.slot, self.generation)
    }
}

/// The values of one row, by column position. Empty values are not stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RowData {
    values: Vec<(usize, String)>,
}

impl RowData {
    pub fn get(&self, column: usize) -> Option<&str> {
        self.values
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v.as_str())
    }

    /// Set a value, returning the previous one. An empty value removes it.
    pub fn set(&mut self, column: usize, value: String) -> Option<String> {
        let position = self.values.iter().position(|(c, _)| *c == column);
        match (position, value.is_empty()) {
            (Some(i), true) => Some(self.values.swap_remove(i).1),
            (Some(i), false) => Some(std::mem::replace(&mut self.values[i].1, value)),
            (None, true) => None,
            (None, false) => {
                self.values.push((column, value));
                None
            }
        }
    }
}

/// A borrowed view of one row.
#[derive(Clone, Copy)]
pub struct RowRef<'a> {
    pub(crate) category: &'a Category,
    pub(crate) id: RowId,
    pub(crate) data: &'a RowData,
}

impl<'a> RowRef<'a> {
    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn category(&self) -> &'a Category {
        self.category
    }

    /// The value of `item`. An absent value reads as the dictionary default
    /// when one is declared and as `.` otherwise.
    pub fn get(&self, item: &str) -> &'a str {
        self.category
            .value_at(self.data, self.category.column_index(item))
    }

    /// The value of `item` converted to `T`; `None` for null values and
    /// values that do not convert.
    pub fn get_as<T: FromItemValue>(&self, item: &str) -> Option<T> {
        let value = self.get(item);
        if is_null(value) {
            return None;
        }
        T::from_item_value(value)
    }

    pub fn is_null(&self, item: &str) -> bool {
        is_null(self.get(item))
    }

    /// Whether a value is stored for `item`.
    pub fn has(&self, item: &str) -> bool {
        self.category
            .column_index(item)
            .and_then(|c| self.data.get(c))
            .is_some()
    }

    /// The stored values as `(item, value)` pairs, in column order.
    pub fn items(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let data = self.data;
        self.category
            .columns()
            .iter()
            .enumerate()
            .filter_map(move |(i, column)| data.get(i).map(|v| (column.name(), v)))
    }
}

impl PartialEq for RowRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RowRef<'_> {}

impl fmt::Debug for RowRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.items()).finish()
    }
}
