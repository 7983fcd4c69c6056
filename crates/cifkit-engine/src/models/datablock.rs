use std::collections::HashSet;
use std::sync::Arc;

use cifkit_syntax::split_tag;

use crate::condition::{Condition, key};
use crate::dictionary::{Dictionary, LinkValidator};
use crate::error::CifError;
use crate::models::{Category, RowId, RowRef};
use crate::validation::{LogSink, SchemaViolation, ValidationOptions, ViolationSink};
use crate::value::{IntoItemValue, Item, is_null};

/// A named block of categories.
///
/// Category names are unique within a block and looked up case
/// insensitively; the block keeps them in insertion order. Operations that
/// follow the links between categories ([`update_value`](Self::update_value),
/// [`erase`](Self::erase)) live here since they touch more than one category.
#[derive(Debug)]
pub struct Datablock {
    name: String,
    categories: Vec<Category>,
    dictionary: Option<Arc<Dictionary>>,
    options: ValidationOptions,
}

impl Datablock {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            categories: Vec::new(),
            dictionary: None,
            options: ValidationOptions::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dictionary(&self) -> Option<&Arc<Dictionary>> {
        self.dictionary.as_ref()
    }

    pub fn options(&self) -> ValidationOptions {
        self.options
    }

    pub fn set_options(&mut self, options: ValidationOptions) {
        self.options = options;
        for category in &mut self.categories {
            category.set_options(options);
        }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn categories_mut(&mut self) -> impl Iterator<Item = &mut Category> {
        self.categories.iter_mut()
    }

    pub fn category_position(&self, name: &str) -> Option<usize> {
        self.categories
            .iter()
            .position(|c| c.name().eq_ignore_ascii_case(name))
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.category_position(name).map(|i| &self.categories[i])
    }

    pub fn category_mut(&mut self, name: &str) -> Option<&mut Category> {
        self.category_position(name)
            .map(move |i| &mut self.categories[i])
    }

    pub(crate) fn category_at_mut(&mut self, position: usize) -> &mut Category {
        &mut self.categories[position]
    }

    /// The category `name`, created (and bound to the dictionary) when it
    /// does not exist yet.
    pub fn category_or_insert(&mut self, name: &str) -> &mut Category {
        let i = match self.category_position(name) {
            Some(i) => i,
            None => {
                let mut category = Category::new(name);
                category.set_options(self.options);
                if let Some(dictionary) = &self.dictionary {
                    category.set_dictionary(dictionary, &mut LogSink::default());
                }
                self.categories.push(category);
                self.categories.len() - 1
            }
        };
        &mut self.categories[i]
    }

    pub fn remove_category(&mut self, name: &str) -> Option<Category> {
        self.category_position(name)
            .map(|i| self.categories.remove(i))
    }

    /// The value of `tag` (`_category.item`) in the first row of its
    /// category.
    pub fn first_value(&self, tag: &str) -> Option<&str> {
        let (category, item) = split_tag(tag);
        self.category(category)?.first().map(|row| row.get(item))
    }

    /// Set `tag` in the first row of its category, creating the category or
    /// the row when needed. Link cascades apply as for
    /// [`update_value`](Self::update_value).
    pub fn set_first_value(&mut self, tag: &str, value: impl IntoItemValue) -> Result<(), CifError> {
        let (category, item) = split_tag(tag);
        let value = value.into_item_value();
        let first = self.category_or_insert(category).first().map(|row| row.id());
        match first {
            Some(row) => self.update_value(category, row, item, value),
            None => self
                .category_or_insert(category)
                .emplace([Item::new(item, value)])
                .map(|_| ()),
        }
    }

    fn category_index_or_err(&self, name: &str) -> Result<usize, CifError> {
        self.category_position(name)
            .ok_or_else(|| CifError::UnknownCategory(name.to_string()))
    }

    /// Child rows linked to `parent` through `link`: each child item equals
    /// the parent value or is null, and at least one of them is set. Null
    /// parent values are skipped; `None` when all of them are null.
    fn link_condition(link: &LinkValidator, parent: &RowRef<'_>) -> Option<Condition> {
        let mut condition = Condition::All;
        let mut any: Option<Condition> = None;
        for (parent_item, child_item) in link.pairs() {
            let value = parent.get(parent_item);
            if is_null(value) {
                continue;
            }
            condition = condition & (key(child_item).eq(value) | key(child_item).is_null());
            let exact = key(child_item).eq(value);
            any = Some(match any {
                Some(any) => any | exact,
                None => exact,
            });
        }
        any.map(|any| condition & any)
    }

    /// Set `item` of `row` in `category` and carry the change over to linked
    /// child rows.
    ///
    /// Child rows follow when `item` is a parent item of a link and the
    /// previous value was not null: every child row whose linked item held
    /// the previous value (and whose other items of the same link group match
    /// the parent row) gets the new value. Affected rows are collected
    /// first, then the parent is updated, then the children. The cascade goes
    /// one level deep.
    ///
    /// When any of the updates fails, the ones already made are undone and
    /// the block is left as it was.
    pub fn update_value(
        &mut self,
        category: &str,
        row: RowId,
        item: &str,
        value: impl IntoItemValue,
    ) -> Result<(), CifError> {
        let value = value.into_item_value();
        let position = self.category_index_or_err(category)?;
        let updates = self.collect_renames(position, row, item, &value)?;

        let mut journal = Vec::new();
        let result = self.apply_renames(position, row, item, &value, updates, &mut journal);
        if let Err(err) = &result {
            log::debug!(
                "{}: update of {category}.{item} failed ({err}), undoing {} change(s)",
                self.name,
                journal.len()
            );
            for (position, id, item, old) in journal.into_iter().rev() {
                self.categories[position].restore_value(id, &item, old);
            }
        }
        result
    }

    /// Apply an update and its renames, recording each replaced value.
    fn apply_renames(
        &mut self,
        position: usize,
        row: RowId,
        item: &str,
        value: &str,
        updates: Vec<(usize, Vec<RowId>, String)>,
        journal: &mut Vec<(usize, RowId, String, Option<String>)>,
    ) -> Result<(), CifError> {
        let old = self.categories[position].set_value(row, item, value)?;
        journal.push((position, row, item.to_string(), old));

        for (child, rows, child_item) in updates {
            log::debug!(
                "{}: renaming {} row(s) of {}.{}",
                self.name,
                rows.len(),
                self.categories[child].name(),
                child_item
            );
            for id in rows {
                let old = self.categories[child].set_value(id, &child_item, value)?;
                journal.push((child, id, child_item.clone(), old));
            }
        }
        Ok(())
    }

    fn collect_renames(
        &self,
        position: usize,
        row: RowId,
        item: &str,
        value: &str,
    ) -> Result<Vec<(usize, Vec<RowId>, String)>, CifError> {
        let parent = &self.categories[position];
        let parent_row = parent.row(row)?;
        let old = parent_row.get(item);

        let Some(dictionary) = &self.dictionary else {
            return Ok(Vec::new());
        };
        if is_null(old) || old == value {
            return Ok(Vec::new());
        }

        let mut updates = Vec::new();
        for link in dictionary.links_from_parent(parent.name()) {
            let Some(child_item) = link.child_key_for(item) else {
                continue;
            };
            let Some(child) = self.category_position(&link.child_category) else {
                continue;
            };

            let mut condition = key(child_item).eq(old);
            for (p, c) in link.pairs() {
                if p.eq_ignore_ascii_case(item) {
                    continue;
                }
                let v = parent_row.get(p);
                if !is_null(v) {
                    condition = condition & (key(c).eq(v) | key(c).is_null());
                }
            }

            let mut rows = self.categories[child].find(&condition).into_vec();
            if child == position {
                rows.retain(|id| *id != row);
            }
            if !rows.is_empty() {
                updates.push((child, rows, child_item.to_string()));
            }
        }
        Ok(updates)
    }

    /// Erase the rows of `category` matching `condition`, together with their
    /// linked child rows. Returns the number of rows erased from `category`.
    pub fn erase(&mut self, category: &str, condition: &Condition) -> Result<usize, CifError> {
        let position = self.category_index_or_err(category)?;
        let rows = self.categories[position].find(condition).into_vec();
        let count = rows.len();

        let mut visited = HashSet::new();
        let mut doomed = Vec::new();
        for row in rows {
            self.collect_erase(position, row, &mut visited, &mut doomed)?;
        }
        self.apply_erase(doomed);
        Ok(count)
    }

    /// Erase one row and, depth first, the child rows linked to it.
    pub fn erase_row(&mut self, category: &str, row: RowId) -> Result<(), CifError> {
        let position = self.category_index_or_err(category)?;
        let mut doomed = Vec::new();
        self.collect_erase(position, row, &mut HashSet::new(), &mut doomed)?;
        self.apply_erase(doomed);
        Ok(())
    }

    /// Post-order walk: children are queued before their parent.
    fn collect_erase(
        &self,
        position: usize,
        row: RowId,
        visited: &mut HashSet<RowId>,
        doomed: &mut Vec<(usize, RowId)>,
    ) -> Result<(), CifError> {
        if !visited.insert(row) {
            return Ok(());
        }

        let category = &self.categories[position];
        let parent_row = category.row(row)?;

        if let Some(dictionary) = &self.dictionary {
            for link in dictionary.links_from_parent(category.name()) {
                let Some(child) = self.category_position(&link.child_category) else {
                    continue;
                };
                let Some(condition) = Self::link_condition(link, &parent_row) else {
                    continue;
                };
                for id in self.categories[child].find(&condition) {
                    self.collect_erase(child, id, visited, doomed)?;
                }
            }
        }

        doomed.push((position, row));
        Ok(())
    }

    /// Erase the collected rows, one pass per category.
    fn apply_erase(&mut self, doomed: Vec<(usize, RowId)>) {
        let mut by_category = vec![Vec::new(); self.categories.len()];
        for (position, row) in doomed {
            by_category[position].push(row);
        }
        for (category, rows) in self.categories.iter_mut().zip(by_category) {
            if !rows.is_empty() {
                let erased = category.erase_rows(rows);
                log::debug!("{}: erased {erased} row(s) of {}", self.name, category.name());
            }
        }
    }

    // --- dictionary ---

    pub fn set_dictionary(&mut self, dictionary: &Arc<Dictionary>, sink: &mut dyn ViolationSink) {
        self.dictionary = Some(Arc::clone(dictionary));
        for category in &mut self.categories {
            category.set_dictionary(dictionary, sink);
        }
    }

    pub fn clear_dictionary(&mut self) {
        self.dictionary = None;
        for category in &mut self.categories {
            category.clear_dictionary();
        }
    }

    /// Validate every category and the links between them.
    pub fn validate(&self, sink: &mut dyn ViolationSink) {
        for category in &self.categories {
            category.validate(sink);
        }
        self.validate_links(sink);
    }

    /// Report child rows whose link items name a parent row that does not
    /// exist. Rows whose link items are all null are not checked.
    pub fn validate_links(&self, sink: &mut dyn ViolationSink) {
        let Some(dictionary) = &self.dictionary else {
            return;
        };

        for link in dictionary.links() {
            let Some(child) = self.category(&link.child_category) else {
                continue;
            };
            let parent = self.category(&link.parent_category);

            for row in child.rows() {
                let mut condition = Condition::All;
                let mut described = Vec::new();
                for (parent_item, child_item) in link.pairs() {
                    let value = row.get(child_item);
                    if is_null(value) {
                        continue;
                    }
                    condition = condition & key(parent_item).eq(value);
                    described.push(format!("{child_item}={value}"));
                }
                if described.is_empty() {
                    continue;
                }

                if !parent.is_some_and(|p| p.exists(&condition)) {
                    sink.report(SchemaViolation::category(
                        child.name(),
                        format!(
                            "no parent row in {} for {}",
                            link.parent_category,
                            described.join(", ")
                        ),
                    ));
                }
            }
        }
    }
}
