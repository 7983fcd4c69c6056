//! # Category Index
//!
//! An ordered map from key tuples to rows for categories whose dictionary
//! declares key items. The ordering is the one of the key items' primitive
//! types (see [`PrimitiveType::compare`]), compared item by item, so the
//! in-order traversal is the canonical row order of the category.
//!
//! Keys are kept in a [`BTreeMap`]. Each key carries a shared slice of the
//! comparators so that `Ord` can be implemented on the key itself.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::dictionary::PrimitiveType;
use crate::models::RowId;

/// A tuple of key values together with the way to compare them.
#[derive(Debug, Clone)]
pub struct IndexKey {
    values: Vec<String>,
    types: Arc<[PrimitiveType]>,
}

impl IndexKey {
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.values
            .iter()
            .zip(&other.values)
            .zip(self.types.iter())
            .map(|((a, b), t)| t.compare(a, b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| self.values.len().cmp(&other.values.len()))
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

#[derive(Debug, Clone)]
pub struct CategoryIndex {
    /// Column positions of the key items in the category
    columns: Vec<usize>,
    types: Arc<[PrimitiveType]>,
    map: BTreeMap<IndexKey, RowId>,
}

impl CategoryIndex {
    pub fn new(columns: Vec<usize>, types: Vec<PrimitiveType>) -> Self {
        debug_assert_eq!(columns.len(), types.len());
        Self {
            columns,
            types: types.into(),
            map: BTreeMap::new(),
        }
    }

    /// Column positions of the key items.
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn covers(&self, column: usize) -> bool {
        self.columns.contains(&column)
    }

    pub fn types(&self) -> &[PrimitiveType] {
        &self.types
    }

    pub fn key(&self, values: Vec<String>) -> IndexKey {
        IndexKey {
            values,
            types: Arc::clone(&self.types),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, key: &IndexKey) -> Option<RowId> {
        self.map.get(key).copied()
    }

    /// Insert a key. An equal key already present is left in place and its
    /// row is returned as the error.
    pub fn insert(&mut self, key: IndexKey, row: RowId) -> Result<(), RowId> {
        match self.map.get(&key) {
            Some(&existing) => Err(existing),
            None => {
                self.map.insert(key, row);
                Ok(())
            }
        }
    }

    /// Remove a key, but only when it maps to `row`.
    pub fn remove(&mut self, key: &IndexKey, row: RowId) -> bool {
        if self.map.get(key) == Some(&row) {
            self.map.remove(key);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = RowId> + '_ {
        self.map.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryId;
    use pretty_assertions::assert_eq;

    fn row(slot: u32) -> RowId {
        RowId::new(CategoryId::from_raw(1), slot, 0)
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn numeric_keys_sort_by_value() {
        let mut index = CategoryIndex::new(vec![0], vec![PrimitiveType::Numb]);
        for (slot, id) in ["10", "2", "33", "1"].iter().enumerate() {
            index.insert(index.key(strings(&[id])), row(slot as u32)).unwrap();
        }
        let order: Vec<_> = index.rows().collect();
        assert_eq!(order, vec![row(3), row(1), row(0), row(2)]);
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut index = CategoryIndex::new(vec![0], vec![PrimitiveType::UChar]);
        index.insert(index.key(strings(&["ALA"])), row(0)).unwrap();
        assert_eq!(index.insert(index.key(strings(&["ala"])), row(1)), Err(row(0)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn composite_keys_compare_item_by_item() {
        let mut index = CategoryIndex::new(
            vec![0, 2],
            vec![PrimitiveType::Char, PrimitiveType::Numb],
        );
        index.insert(index.key(strings(&["B", "1"])), row(0)).unwrap();
        index.insert(index.key(strings(&["A", "10"])), row(1)).unwrap();
        index.insert(index.key(strings(&["A", "9"])), row(2)).unwrap();

        assert_eq!(index.rows().collect::<Vec<_>>(), vec![row(2), row(1), row(0)]);
        assert_eq!(index.get(&index.key(strings(&["A", "9.0"]))), Some(row(2)));
        assert!(index.covers(2));
        assert!(!index.covers(1));
    }

    #[test]
    fn remove_checks_the_row() {
        let mut index = CategoryIndex::new(vec![0], vec![PrimitiveType::Char]);
        let key = index.key(strings(&["x"]));
        index.insert(key.clone(), row(0)).unwrap();

        assert!(!index.remove(&key, row(1)));
        assert!(index.remove(&key, row(0)));
        assert!(index.is_empty());
    }
}
