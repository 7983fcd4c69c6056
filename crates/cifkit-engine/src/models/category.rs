use std::collections::HashSet;
use std::sync::Arc;

use crate::condition::{Condition, RowSet};
use crate::dictionary::{CategoryValidator, Dictionary, ItemValidator, PrimitiveType};
use crate::error::CifError;
use crate::index::{CategoryIndex, IndexKey};
use crate::models::row::{CategoryId, RowData, RowId, RowRef};
use crate::validation::{SchemaViolation, ValidationOptions, ViolationSink};
use crate::value::{IntoItemValue, Item};
use crate::writer::unwritable_reason;

/// A column: an item name and, once a dictionary is attached, its validator.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    validator: Option<Arc<ItemValidator>>,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn validator(&self) -> Option<&Arc<ItemValidator>> {
        self.validator.as_ref()
    }

    /// Columns without a validator compare as case sensitive text.
    pub fn primitive(&self) -> PrimitiveType {
        self.validator
            .as_ref()
            .map(|v| v.primitive())
            .unwrap_or_default()
    }

    pub fn default_value(&self) -> Option<&str> {
        self.validator.as_ref().and_then(|v| v.default.as_deref())
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    data: Option<RowData>,
}

/// A table of rows sharing a set of columns.
///
/// Rows live in slots that are reused after an erase; every reuse bumps the
/// slot generation, which is what invalidates old [`RowId`]s. `order` holds
/// the live rows in category order. Columns are only ever appended, so a
/// column position stays valid for the lifetime of the category.
#[derive(Debug)]
pub struct Category {
    id: CategoryId,
    name: String,
    columns: Vec<Column>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    order: Vec<RowId>,
    dictionary: Option<Arc<Dictionary>>,
    validator: Option<Arc<CategoryValidator>>,
    index: Option<CategoryIndex>,
    options: ValidationOptions,
}

impl Category {
    pub fn new(name: &str) -> Self {
        Self {
            id: CategoryId::next(),
            name: name.to_string(),
            columns: Vec::new(),
            slots: Vec::new(),
            free: Vec::new(),
            order: Vec::new(),
            dictionary: None,
            validator: None,
            index: None,
            options: ValidationOptions::default(),
        }
    }

    pub fn id(&self) -> CategoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn options(&self) -> ValidationOptions {
        self.options
    }

    pub(crate) fn set_options(&mut self, options: ValidationOptions) {
        self.options = options;
    }

    pub fn validator(&self) -> Option<&Arc<CategoryValidator>> {
        self.validator.as_ref()
    }

    pub fn index(&self) -> Option<&CategoryIndex> {
        self.index.as_ref()
    }

    // --- columns ---

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Position of the column `name`, compared case insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Position of the column `name`, appending it when it does not exist.
    pub fn add_column(&mut self, name: &str) -> usize {
        if let Some(i) = self.column_index(name) {
            return i;
        }
        let validator = self
            .dictionary
            .as_ref()
            .and_then(|d| d.item(&self.name, name))
            .cloned();
        self.columns.push(Column {
            name: name.to_string(),
            validator,
        });
        self.columns.len() - 1
    }

    /// Rename a column in place. Returns `false` when `from` does not exist,
    /// `to` is already taken or `from` is a key item of the attached
    /// dictionary.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        let Some(i) = self.column_index(from) else {
            return false;
        };
        let same = from.eq_ignore_ascii_case(to);
        if !same && self.column_index(to).is_some() {
            return false;
        }
        if !same && self.validator.as_ref().is_some_and(|v| v.is_key(from)) {
            log::warn!(
                "{}: refusing to rename key item '{from}' to '{to}'",
                self.name
            );
            return false;
        }

        self.columns[i].name = to.to_string();
        self.columns[i].validator = self
            .dictionary
            .as_ref()
            .and_then(|d| d.item(&self.name, to))
            .cloned();

        let rekey = self.index.as_ref().is_some_and(|ix| ix.covers(i))
            || self.validator.as_ref().is_some_and(|v| v.is_key(to));
        if rekey {
            self.rebuild_index(&mut crate::validation::LogSink::default());
        }
        true
    }

    fn dictionary_item(&self, name: &str) -> Option<&Arc<ItemValidator>> {
        self.dictionary.as_ref().and_then(|d| d.item(&self.name, name))
    }

    /// Check that `name` may be added as a column through the public API.
    /// Unknown items are a violation when the category is validated.
    fn check_new_column(&self, name: &str) -> Result<(), CifError> {
        if self.validator.is_some() && self.dictionary_item(name).is_none() {
            self.options.enforce(SchemaViolation::item(
                &self.name,
                name,
                "item is not defined in the dictionary",
            ))?;
        }
        Ok(())
    }

    /// Check a value for the item `name`, which need not be a column yet.
    fn check_value(&self, name: &str, value: &str) -> Result<(), CifError> {
        if let Some(reason) = unwritable_reason(value) {
            return Err(CifError::UnwritableValue {
                category: self.name.clone(),
                item: name.to_string(),
                reason,
            });
        }
        let validator = match self.column_index(name) {
            Some(i) => self.columns[i].validator.as_ref(),
            None => self.dictionary_item(name),
        };
        if let Some(validator) = validator
            && let Err(violation) = validator.validate(value)
        {
            self.options.enforce(violation)?;
        }
        Ok(())
    }

    // --- rows ---

    pub fn rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.order.iter().filter_map(|id| self.row(*id).ok())
    }

    pub fn row_ids(&self) -> &[RowId] {
        &self.order
    }

    pub fn first(&self) -> Option<RowRef<'_>> {
        self.rows().next()
    }

    pub fn row(&self, id: RowId) -> Result<RowRef<'_>, CifError> {
        Ok(RowRef {
            category: self,
            id,
            data: self.data(id)?,
        })
    }

    pub fn contains_row(&self, id: RowId) -> bool {
        self.data(id).is_ok()
    }

    fn stale(&self) -> CifError {
        CifError::StaleRow {
            category: self.name.clone(),
        }
    }

    fn data(&self, id: RowId) -> Result<&RowData, CifError> {
        if id.category() != self.id {
            return Err(self.stale());
        }
        self.slots
            .get(id.slot())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.data.as_ref())
            .ok_or_else(|| self.stale())
    }

    fn data_mut(&mut self, id: RowId) -> Result<&mut RowData, CifError> {
        let valid = id.category() == self.id
            && self
                .slots
                .get(id.slot())
                .is_some_and(|slot| slot.generation == id.generation() && slot.data.is_some());
        if !valid {
            return Err(self.stale());
        }
        self.slots[id.slot()]
            .data
            .as_mut()
            .ok_or_else(|| CifError::StaleRow {
                category: self.name.clone(),
            })
    }

    /// The value read for `column` in a row: the stored text, else the
    /// declared default, else `.`.
    pub(crate) fn value_at<'a>(&'a self, data: &'a RowData, column: Option<usize>) -> &'a str {
        let Some(column) = column else {
            return ".";
        };
        data.get(column)
            .or_else(|| self.columns[column].default_value())
            .unwrap_or(".")
    }

    fn alloc(&mut self, data: RowData) -> RowId {
        let id = match self.free.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.data = Some(data);
                RowId::new(self.id, slot, entry.generation)
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    data: Some(data),
                });
                RowId::new(self.id, slot, 0)
            }
        };
        self.order.push(id);
        id
    }

    fn release(&mut self, id: RowId) {
        let slot = &mut self.slots[id.slot()];
        slot.data = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.slot() as u32);
    }

    fn key_for(&self, index: &CategoryIndex, data: &RowData) -> IndexKey {
        index.key(
            index
                .columns()
                .iter()
                .map(|&c| self.value_at(data, Some(c)).to_string())
                .collect(),
        )
    }

    /// Append a row, or find the row that already has the same key.
    ///
    /// Returns the row and whether it was inserted. Values are checked
    /// against the dictionary first; in strict mode an invalid value fails
    /// the whole call and nothing is inserted. Columns for new items are
    /// only added once the row is actually inserted.
    pub fn emplace<I>(&mut self, items: I) -> Result<(RowId, bool), CifError>
    where
        I: IntoIterator<Item = Item>,
    {
        let mut data = RowData::default();
        let mut added: Vec<String> = Vec::new();
        for item in items {
            let column = match self.column_index(&item.name) {
                Some(i) => i,
                None => match added.iter().position(|n| n.eq_ignore_ascii_case(&item.name)) {
                    Some(k) => self.columns.len() + k,
                    None => {
                        self.check_new_column(&item.name)?;
                        added.push(item.name.clone());
                        self.columns.len() + added.len() - 1
                    }
                },
            };
            self.check_value(&item.name, &item.value)?;
            data.set(column, item.value);
        }

        // key columns always exist, so the key never reads a pending column
        let key = self.index.as_ref().map(|index| self.key_for(index, &data));
        if let (Some(index), Some(key)) = (&self.index, &key)
            && let Some(existing) = index.get(key)
        {
            return Ok((existing, false));
        }

        for name in &added {
            self.add_column(name);
        }
        let id = self.alloc(data);
        if let (Some(index), Some(key)) = (self.index.as_mut(), key) {
            let inserted = index.insert(key, id);
            debug_assert!(inserted.is_ok());
        }
        Ok((id, true))
    }

    /// Append a row; a row with the same key is an error and leaves the
    /// category unchanged.
    pub fn insert<I>(&mut self, items: I) -> Result<RowId, CifError>
    where
        I: IntoIterator<Item = Item>,
    {
        let (id, inserted) = self.emplace(items)?;
        if inserted {
            Ok(id)
        } else {
            Err(CifError::DuplicateKey {
                category: self.name.clone(),
                key: self.key_of(id)?,
            })
        }
    }

    /// Set one value of a row, returning the previous stored value.
    ///
    /// Changing a key item moves the row in the index; if the new key is
    /// taken the row is left unchanged and `DuplicateKey` is returned. This
    /// does not cascade to linked categories, see
    /// [`Datablock::update_value`](crate::models::Datablock::update_value).
    pub fn set_value(
        &mut self,
        id: RowId,
        item: &str,
        value: impl IntoItemValue,
    ) -> Result<Option<String>, CifError> {
        let value = value.into_item_value();
        self.data(id)?;
        let known = self.column_index(item);
        if known.is_none() {
            self.check_new_column(item)?;
        }
        self.check_value(item, &value)?;
        // key columns always exist, so a new column is never indexed
        let column = match known {
            Some(i) => i,
            None => self.add_column(item),
        };

        let Some(index) = self.index.as_ref().filter(|ix| ix.covers(column)) else {
            return Ok(self.data_mut(id)?.set(column, value));
        };

        let data = self.data(id)?;
        let old_key = self.key_for(index, data);
        let mut updated = data.clone();
        updated.set(column, value.clone());
        let new_key = self.key_for(index, &updated);

        if let Some(existing) = index.get(&new_key)
            && existing != id
        {
            return Err(CifError::DuplicateKey {
                category: self.name.clone(),
                key: new_key.into_values(),
            });
        }

        let old = self.data_mut(id)?.set(column, value);
        if let Some(index) = self.index.as_mut() {
            index.remove(&old_key, id);
            let inserted = index.insert(new_key, id);
            debug_assert!(inserted.is_ok());
        }
        Ok(old)
    }

    /// Put back a value replaced by [`set_value`](Self::set_value), without
    /// validation. Used to undo a partly applied cascade.
    pub(crate) fn restore_value(&mut self, id: RowId, item: &str, old: Option<String>) {
        let Some(column) = self.column_index(item) else {
            return;
        };
        let covered = self.index.as_ref().is_some_and(|ix| ix.covers(column));
        if covered {
            self.unindex(id);
        }
        if let Ok(data) = self.data_mut(id) {
            data.set(column, old.unwrap_or_default());
        }
        if !covered {
            return;
        }
        let key = match (&self.index, self.data(id)) {
            (Some(index), Ok(data)) => self.key_for(index, data),
            _ => return,
        };
        if let Some(index) = self.index.as_mut() {
            // the key was free before the cascade started
            let _ = index.insert(key, id);
        }
    }

    fn unindex(&mut self, id: RowId) {
        let key = match (&self.index, self.data(id)) {
            (Some(index), Ok(data)) => self.key_for(index, data),
            _ => return,
        };
        if let Some(index) = self.index.as_mut() {
            index.remove(&key, id);
        }
    }

    /// Erase one row. Linked rows in other categories are not touched, see
    /// [`Datablock::erase_row`](crate::models::Datablock::erase_row).
    pub fn erase_row(&mut self, id: RowId) -> Result<(), CifError> {
        self.data(id)?;
        self.unindex(id);
        self.release(id);
        self.order.retain(|r| *r != id);
        Ok(())
    }

    /// Erase several rows, skipping handles that are no longer valid.
    /// Returns the number of rows erased.
    pub fn erase_rows(&mut self, ids: impl IntoIterator<Item = RowId>) -> usize {
        let mut erased = HashSet::new();
        for id in ids {
            if self.contains_row(id) {
                self.unindex(id);
                self.release(id);
                erased.insert(id);
            }
        }
        if !erased.is_empty() {
            self.order.retain(|r| !erased.contains(r));
        }
        erased.len()
    }

    /// Erase the rows matching `condition`, without cascading.
    pub fn erase_where(&mut self, condition: &Condition) -> usize {
        let rows = self.find(condition);
        self.erase_rows(rows)
    }

    pub fn clear(&mut self) {
        for id in std::mem::take(&mut self.order) {
            self.release(id);
        }
        if let Some(index) = self.index.as_mut() {
            index.clear();
        }
    }

    // --- queries ---

    /// Key item names with their primitive types, in key order.
    fn key_columns(&self) -> Vec<(&str, PrimitiveType)> {
        match &self.index {
            Some(index) => index
                .columns()
                .iter()
                .zip(index.types())
                .map(|(&c, &t)| (self.columns[c].name.as_str(), t))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn key_items(&self) -> Vec<&str> {
        self.key_columns().into_iter().map(|(name, _)| name).collect()
    }

    /// The index, when it holds every row. Rows with a duplicate key that
    /// were read leniently are not in the index, and then lookups by key
    /// have to scan.
    fn complete_index(&self) -> Option<&CategoryIndex> {
        self.index.as_ref().filter(|ix| ix.len() == self.order.len())
    }

    pub fn find(&self, condition: &Condition) -> RowSet {
        if let Some(index) = self.complete_index()
            && let Some(values) = condition.key_values(&self.key_columns())
        {
            return RowSet::new(index.get(&index.key(values)).into_iter().collect());
        }

        let prepared = condition.prepare(self);
        RowSet::new(
            self.rows()
                .filter(|row| prepared.matches(row))
                .map(|row| row.id())
                .collect(),
        )
    }

    pub fn find_first(&self, condition: &Condition) -> Option<RowRef<'_>> {
        if self.complete_index().is_some() && condition.equality_terms().is_some() {
            return self.find(condition).first().and_then(|id| self.row(id).ok());
        }
        let prepared = condition.prepare(self);
        self.rows().find(|row| prepared.matches(row))
    }

    pub fn exists(&self, condition: &Condition) -> bool {
        self.find_first(condition).is_some()
    }

    pub fn count(&self, condition: &Condition) -> usize {
        let prepared = condition.prepare(self);
        self.rows().filter(|row| prepared.matches(row)).count()
    }

    /// Look a row up by its key values, given in key order.
    pub fn find_by_key(&self, values: &[&str]) -> Option<RowRef<'_>> {
        let index = self.index.as_ref()?;
        if values.len() != index.columns().len() {
            return None;
        }
        let key = index.key(values.iter().map(|v| v.to_string()).collect());
        index.get(&key).and_then(|id| self.row(id).ok())
    }

    /// The key values of a row; empty when the category has no key.
    pub fn key_of(&self, id: RowId) -> Result<Vec<String>, CifError> {
        let data = self.data(id)?;
        Ok(match &self.index {
            Some(index) => self.key_for(index, data).into_values(),
            None => Vec::new(),
        })
    }

    // --- ordering ---

    /// Put the rows in key order. Rows not in the index keep their relative
    /// order after the indexed ones.
    pub fn reorder_by_index(&mut self) {
        let Some(index) = &self.index else {
            return;
        };
        let mut order: Vec<RowId> = index.rows().collect();
        let indexed: HashSet<RowId> = order.iter().copied().collect();
        order.extend(self.order.iter().copied().filter(|id| !indexed.contains(id)));
        self.order = order;
    }

    /// Stable sort of the rows on the values of `items`.
    pub fn sort_by(&mut self, items: &[&str]) {
        let mut order = std::mem::take(&mut self.order);
        self.sort_ids(&mut order, items);
        self.order = order;
    }

    pub(crate) fn sort_ids(&self, ids: &mut [RowId], items: &[&str]) {
        let columns: Vec<(Option<usize>, PrimitiveType)> = items
            .iter()
            .map(|item| {
                let c = self.column_index(item);
                (c, c.map(|c| self.columns[c].primitive()).unwrap_or_default())
            })
            .collect();

        ids.sort_by(|a, b| match (self.data(*a), self.data(*b)) {
            (Ok(da), Ok(db)) => columns
                .iter()
                .map(|&(c, t)| t.compare(self.value_at(da, c), self.value_at(db, c)))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal),
            _ => std::cmp::Ordering::Equal,
        });
    }

    /// A key value not yet used in this category: `prefix` followed by a
    /// number. The key item is the single declared key, or `id`.
    pub fn get_unique_id(&self, prefix: &str) -> String {
        let key = match self.validator.as_ref().map(|v| v.keys.as_slice()) {
            Some([key]) => key.as_str(),
            _ => "id",
        };
        let column = self.column_index(key);
        let taken: HashSet<String> = self
            .rows()
            .map(|row| self.value_at(row.data, column).to_ascii_lowercase())
            .collect();

        let mut n = self.len() + 1;
        loop {
            let candidate = format!("{prefix}{n}");
            if !taken.contains(&candidate.to_ascii_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }

    // --- dictionary ---

    /// Bind the category to `dictionary`: attach validators to the columns,
    /// add the key and mandatory columns and rebuild the index. Duplicate
    /// keys found while indexing are reported; the first row with a key
    /// stays indexed.
    pub fn set_dictionary(&mut self, dictionary: &Arc<Dictionary>, sink: &mut dyn ViolationSink) {
        self.dictionary = Some(Arc::clone(dictionary));
        self.validator = dictionary.category(&self.name).cloned();

        for column in &mut self.columns {
            column.validator = dictionary.item(&self.name, &column.name).cloned();
        }

        if let Some(validator) = self.validator.clone() {
            for name in validator.keys.iter().chain(&validator.mandatory) {
                self.add_column(name);
            }
        }

        self.rebuild_index(sink);
    }

    pub fn clear_dictionary(&mut self) {
        self.dictionary = None;
        self.validator = None;
        self.index = None;
        for column in &mut self.columns {
            column.validator = None;
        }
    }

    fn rebuild_index(&mut self, sink: &mut dyn ViolationSink) {
        self.index = None;
        let Some(validator) = &self.validator else {
            return;
        };
        if validator.keys.is_empty() {
            return;
        }

        let Some(columns) = validator
            .keys
            .iter()
            .map(|k| self.column_index(k))
            .collect::<Option<Vec<_>>>()
        else {
            return;
        };

        let mut index = CategoryIndex::new(columns, validator.key_types());
        for &id in &self.order {
            let Ok(data) = self.data(id) else {
                continue;
            };
            let key = self.key_for(&index, data);
            if index.insert(key.clone(), id).is_err() {
                sink.report(SchemaViolation::category(
                    &self.name,
                    format!("duplicate key ({})", key.values().join(", ")),
                ));
            }
        }

        log::debug!(
            "{}: indexed {} of {} rows",
            self.name,
            index.len(),
            self.order.len()
        );
        self.index = Some(index);
    }

    /// Check the category against its dictionary: unknown category or items,
    /// values that fail their type or enumeration, and mandatory items
    /// without a value (reported once per item).
    pub fn validate(&self, sink: &mut dyn ViolationSink) {
        if self.dictionary.is_none() {
            return;
        }
        let Some(validator) = &self.validator else {
            sink.report(SchemaViolation::category(
                &self.name,
                "category is not defined in the dictionary",
            ));
            return;
        };

        for (i, column) in self.columns.iter().enumerate() {
            let Some(item) = &column.validator else {
                sink.report(SchemaViolation::item(
                    &self.name,
                    &column.name,
                    "item is not defined in the dictionary",
                ));
                continue;
            };
            for row in self.rows() {
                if let Some(value) = row.data.get(i)
                    && let Err(violation) = item.validate(value)
                {
                    sink.report(violation);
                }
            }
        }

        for name in &validator.mandatory {
            let column = self.column_index(name);
            let missing = self
                .rows()
                .filter(|row| {
                    column.is_none_or(|c| {
                        row.data.get(c).is_none() && self.columns[c].default_value().is_none()
                    })
                })
                .count();
            if missing > 0 {
                sink.report(SchemaViolation::item(
                    &self.name,
                    name,
                    format!("mandatory item is missing in {missing} row(s)"),
                ));
            }
        }
    }

    // --- parser path ---

    /// Append an empty row without validation or indexing.
    pub(crate) fn push_row_raw(&mut self) -> RowId {
        self.alloc(RowData::default())
    }

    /// Store a parsed value without validation or indexing.
    pub(crate) fn set_raw(&mut self, id: RowId, item: &str, value: String) {
        let column = self.add_column(item);
        if let Ok(data) = self.data_mut(id) {
            data.set(column, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::key;
    use crate::validation::ValidationReport;
    use pretty_assertions::assert_eq;

    const DICT: &str = r#"data_test.dic
_dictionary.title test.dic
loop_
_item_type_list.code
_item_type_list.primitive_code
_item_type_list.construct
code char '[A-Za-z0-9_]+'
int numb '[+-]?[0-9]+'

save_test
_category.id test
_category_key.name '_test.id'
save_

save__test.id
_item.name '_test.id'
_item.category_id test
_item.mandatory_code yes
_item_type.code int
save_

save__test.name
_item.name '_test.name'
_item.category_id test
_item.mandatory_code yes
_item_type.code code
save_

save__test.kind
_item.name '_test.kind'
_item.category_id test
_item.mandatory_code no
_item_type.code code
_item_default.value unknown
save_
"#;

    fn dictionary() -> Arc<Dictionary> {
        Arc::new(Dictionary::parse(DICT).unwrap())
    }

    fn keyed(options: ValidationOptions) -> Category {
        let mut cat = Category::new("test");
        cat.set_options(options);
        let mut report = ValidationReport::new();
        cat.set_dictionary(&dictionary(), &mut report);
        assert!(report.is_valid(), "{report:?}");
        cat
    }

    fn add(cat: &mut Category, id: i32, name: &str) -> RowId {
        cat.insert([Item::new("id", id), Item::new("name", name)]).unwrap()
    }

    fn ids(cat: &Category) -> Vec<String> {
        cat.rows().map(|r| r.get("id").to_string()).collect()
    }

    #[test]
    fn unvalidated_category_accepts_anything() {
        let mut cat = Category::new("free");
        let a = cat.insert([Item::new("x", 1)]).unwrap();
        let b = cat.insert([Item::new("x", 1)]).unwrap();
        assert_ne!(a, b);
        assert_eq!(cat.len(), 2);
        assert_eq!(cat.column_names().collect::<Vec<_>>(), vec!["x"]);
    }

    #[test]
    fn dictionary_adds_key_and_mandatory_columns() {
        let cat = keyed(ValidationOptions::default());
        assert_eq!(cat.column_names().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(cat.key_items(), vec!["id"]);
    }

    #[test]
    fn duplicate_key_is_rejected_and_category_unchanged() {
        let mut cat = keyed(ValidationOptions::default());
        add(&mut cat, 1, "aap");

        let err = cat
            .insert([Item::new("id", "1"), Item::new("name", "other")])
            .unwrap_err();
        assert!(matches!(err, CifError::DuplicateKey { ref key, .. } if key == &["1"]));
        assert_eq!(cat.len(), 1);
    }

    #[test]
    fn emplace_returns_existing_row() {
        let mut cat = keyed(ValidationOptions::default());
        let first = add(&mut cat, 1, "aap");
        let (found, inserted) = cat
            .emplace([Item::new("id", 1), Item::new("name", "noot")])
            .unwrap();
        assert_eq!((found, inserted), (first, false));
        assert_eq!(cat.row(first).unwrap().get("name"), "aap");
    }

    #[test]
    fn numeric_key_comparison() {
        let mut cat = keyed(ValidationOptions::default());
        add(&mut cat, 10, "a");
        add(&mut cat, 2, "b");
        assert!(cat.find_by_key(&["2"]).is_some());
        assert!(cat.find_by_key(&["02"]).is_some());
        assert!(cat.find_by_key(&["3"]).is_none());

        cat.reorder_by_index();
        assert_eq!(ids(&cat), vec!["2", "10"]);
    }

    #[test]
    fn stale_handles_are_detected() {
        let mut cat = keyed(ValidationOptions::default());
        let a = add(&mut cat, 1, "a");
        cat.erase_row(a).unwrap();

        let b = add(&mut cat, 2, "b");
        assert!(matches!(cat.row(a), Err(CifError::StaleRow { .. })));
        assert!(matches!(cat.set_value(a, "name", "x"), Err(CifError::StaleRow { .. })));
        assert_eq!(cat.row(b).unwrap().get("name"), "b");

        let other = Category::new("test");
        assert!(other.row(b).is_err());
    }

    #[test]
    fn set_value_moves_row_in_index() {
        let mut cat = keyed(ValidationOptions::default());
        let a = add(&mut cat, 1, "a");
        add(&mut cat, 2, "b");

        assert_eq!(cat.set_value(a, "id", 3).unwrap(), Some("1".to_string()));
        assert!(cat.find_by_key(&["1"]).is_none());
        assert_eq!(cat.find_by_key(&["3"]).unwrap().id(), a);

        let err = cat.set_value(a, "id", 2).unwrap_err();
        assert!(matches!(err, CifError::DuplicateKey { .. }));
        assert_eq!(cat.row(a).unwrap().get("id"), "3");
        assert_eq!(cat.index().unwrap().len(), cat.len());
    }

    #[test]
    fn strict_mode_rejects_invalid_values() {
        let mut cat = keyed(ValidationOptions::strict());
        let err = cat
            .insert([Item::new("id", "x"), Item::new("name", "a")])
            .unwrap_err();
        assert!(matches!(err, CifError::Schema(ref v) if v.item.as_deref() == Some("id")));
        assert!(cat.is_empty());

        let err = cat
            .insert([Item::new("id", 1), Item::new("bogus", "a")])
            .unwrap_err();
        assert!(matches!(err, CifError::Schema(_)));
    }

    #[test]
    fn lenient_mode_accepts_invalid_values() {
        let mut cat = keyed(ValidationOptions::default());
        let id = cat
            .insert([Item::new("id", "x"), Item::new("name", "two words")])
            .unwrap();
        assert_eq!(cat.row(id).unwrap().get("name"), "two words");

        let mut report = ValidationReport::new();
        cat.validate(&mut report);
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn defaults_and_placeholders() {
        let mut cat = keyed(ValidationOptions::default());
        let id = add(&mut cat, 1, "a");
        let row = cat.row(id).unwrap();
        assert_eq!(row.get("kind"), "unknown");
        assert_eq!(row.get("no_such_item"), ".");
        assert!(!row.has("kind"));
    }

    #[test]
    fn mandatory_items_reported_once() {
        let mut cat = keyed(ValidationOptions::default());
        cat.emplace([Item::new("id", 1)]).unwrap();
        cat.emplace([Item::new("id", 2)]).unwrap();

        let mut report = ValidationReport::new();
        cat.validate(&mut report);
        let messages: Vec<_> = report.iter().map(|v| v.to_string()).collect();
        assert_eq!(messages, vec!["_test.name: mandatory item is missing in 2 row(s)"]);
    }

    #[test]
    fn rebuild_reports_duplicates() {
        let mut cat = Category::new("test");
        for name in ["a", "b"] {
            let row = cat.push_row_raw();
            cat.set_raw(row, "id", "1".into());
            cat.set_raw(row, "name", name.into());
        }

        let mut report = ValidationReport::new();
        cat.set_dictionary(&dictionary(), &mut report);
        assert_eq!(report.len(), 1);
        assert_eq!(report.violations()[0].message, "duplicate key (1)");
        assert_eq!(cat.len(), 2);
        assert_eq!(cat.index().unwrap().len(), 1);
    }

    #[test]
    fn lookups_scan_past_unindexed_duplicates() {
        let mut cat = Category::new("test");
        for name in ["a", "b"] {
            let row = cat.push_row_raw();
            cat.set_raw(row, "id", "1".into());
            cat.set_raw(row, "name", name.into());
        }
        cat.set_dictionary(&dictionary(), &mut ValidationReport::new());

        let condition = key("id").eq(1);
        assert_eq!(cat.find(&condition).len(), 2);
        assert_eq!(cat.count(&condition), 2);
        assert_eq!(cat.find_first(&condition).unwrap().get("name"), "a");

        let second = cat.find(&key("name").eq("b")).first().unwrap();
        cat.erase_row(second).unwrap();
        assert_eq!(cat.index().unwrap().len(), cat.len());
        assert_eq!(cat.find(&condition).len(), 1);
    }

    #[test]
    fn rejected_writes_add_no_columns() {
        let mut cat = keyed(ValidationOptions::strict());
        let row = add(&mut cat, 1, "a");

        assert!(cat.insert([Item::new("id", 2), Item::new("bogus", "x")]).is_err());
        assert!(cat.insert([Item::new("kind", "k"), Item::new("id", "x")]).is_err());
        assert!(cat.set_value(row, "bogus", "x").is_err());
        assert!(matches!(
            cat.insert([Item::new("id", 1), Item::new("name", "b"), Item::new("kind", "k")]),
            Err(CifError::DuplicateKey { .. })
        ));
        assert_eq!(cat.column_names().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(cat.len(), 1);

        cat.set_value(row, "kind", "k").unwrap();
        assert_eq!(cat.column_names().collect::<Vec<_>>(), vec!["id", "name", "kind"]);
    }

    #[test]
    fn key_items_keep_their_name() {
        let mut cat = keyed(ValidationOptions::default());
        let row = add(&mut cat, 1, "a");

        assert!(!cat.rename_column("id", "ident"));
        assert_eq!(cat.key_items(), vec!["id"]);
        assert_eq!(cat.find_by_key(&["1"]).unwrap().id(), row);

        assert!(cat.rename_column("name", "label"));
        assert_eq!(cat.row(row).unwrap().get("label"), "a");
    }

    #[test]
    fn index_lookup_and_scan_agree() {
        let mut cat = keyed(ValidationOptions::default());
        for i in 1..=20 {
            add(&mut cat, i, &format!("n{i}"));
        }
        let by_index = cat.find(&key("id").eq(7));
        let prepared = key("id").eq(7);
        let by_scan = cat.count(&prepared);
        assert_eq!(by_index.len(), 1);
        assert_eq!(by_scan, 1);
        assert_eq!(cat.row(by_index.first().unwrap()).unwrap().get("name"), "n7");
    }

    #[test]
    fn erase_rows_and_clear() {
        let mut cat = keyed(ValidationOptions::default());
        let rows: Vec<_> = (1..=4).map(|i| add(&mut cat, i, "x")).collect();

        assert_eq!(cat.erase_rows([rows[0], rows[2], rows[0]]), 2);
        assert_eq!(ids(&cat), vec!["2", "4"]);
        assert_eq!(cat.index().unwrap().len(), 2);

        assert_eq!(cat.erase_where(&key("id").eq(4)), 1);
        assert_eq!(ids(&cat), vec!["2"]);

        cat.clear();
        assert!(cat.is_empty());
        assert!(cat.index().unwrap().is_empty());
        assert!(cat.row(rows[1]).is_err());
    }

    #[test]
    fn sort_by_items() {
        let mut cat = Category::new("t");
        for (a, b) in [("x", "2"), ("y", "1"), ("x", "1")] {
            cat.insert([Item::new("a", a), Item::new("b", b)]).unwrap();
        }
        cat.sort_by(&["a", "b"]);
        let rows: Vec<_> = cat
            .rows()
            .map(|r| format!("{}{}", r.get("a"), r.get("b")))
            .collect();
        assert_eq!(rows, vec!["x1", "x2", "y1"]);
    }

    #[test]
    fn unique_ids_skip_taken_values() {
        let mut cat = keyed(ValidationOptions::default());
        assert_eq!(cat.get_unique_id(""), "1");
        add(&mut cat, 2, "a");
        assert_eq!(cat.get_unique_id(""), "3");

        let mut free = Category::new("free");
        free.insert([Item::new("id", "A1")]).unwrap();
        assert_eq!(free.get_unique_id("A"), "A2");
    }

    #[test]
    fn rename_column_keeps_values() {
        let mut cat = Category::new("t");
        let id = cat.insert([Item::new("a", 1), Item::new("b", 2)]).unwrap();
        assert!(cat.rename_column("a", "c"));
        assert!(!cat.rename_column("b", "c"));
        assert!(!cat.rename_column("missing", "d"));
        assert_eq!(cat.row(id).unwrap().get("c"), "1");
        assert_eq!(cat.column_names().collect::<Vec<_>>(), vec!["c", "b"]);
    }

    #[test]
    fn row_items_in_column_order() {
        let mut cat = Category::new("t");
        let id = cat
            .insert([Item::new("b", "2"), Item::new("a", "1"), Item::new("c", "")])
            .unwrap();
        let items: Vec<_> = cat.row(id).unwrap().items().collect();
        assert_eq!(items, vec![("b", "2"), ("a", "1")]);
        assert_eq!(cat.row(id).unwrap().get_as::<i32>("a"), Some(1));
    }
}
