//! Projection of a parsed DDL2 dictionary onto validators.
//!
//! The dictionary file is read with save frames enabled into plain
//! [`Datablock`]s, one for the main block and one per frame, and the DDL
//! categories of those blocks are then read back as schema.

use std::collections::BTreeMap;
use std::sync::Arc;

use cifkit_syntax::{ParseOptions, Sink, Value, parse_with_options, split_tag};

use super::{CategoryValidator, Dictionary, ItemValidator, LinkValidator, PrimitiveType, TypeValidator};
use crate::builder::BlockCursor;
use crate::error::CifError;
use crate::models::{Datablock, RowRef};
use crate::value::is_null;

#[derive(Debug, Default)]
struct DictionarySink {
    /// The data block first, then each save frame in file order
    blocks: Vec<Datablock>,
    main: Option<usize>,
    current: Option<usize>,
    cursor: BlockCursor,
}

impl DictionarySink {
    fn open(&mut self, name: &str) -> usize {
        self.blocks.push(Datablock::new(name));
        self.cursor.reset();
        self.blocks.len() - 1
    }
}

impl Sink for DictionarySink {
    fn begin_block(&mut self, name: &str) {
        if self.main.is_some() {
            log::warn!("dictionary has more than one data block, reading data_{name} as well");
        }
        let i = self.open(name);
        self.main = Some(i);
        self.current = Some(i);
    }

    fn begin_category(&mut self, name: &str) {
        if let Some(i) = self.current {
            self.cursor.begin_category(&mut self.blocks[i], name);
        }
    }

    fn begin_row(&mut self) {
        if let Some(i) = self.current {
            self.cursor.begin_row(&mut self.blocks[i]);
        }
    }

    fn item(&mut self, name: &str, value: Value<'_>) {
        if let Some(i) = self.current {
            self.cursor.item(&mut self.blocks[i], name, value);
        }
    }

    fn begin_save_frame(&mut self, name: &str) {
        self.current = Some(self.open(name));
    }

    fn end_save_frame(&mut self) {
        self.current = self.main;
        self.cursor.reset();
    }
}

pub(super) fn read(source: &str) -> Result<Dictionary, CifError> {
    let sink = parse_with_options(source, DictionarySink::default(), ParseOptions::dictionary())?;
    let Some(main) = sink.main else {
        return Err(CifError::Dictionary("no data block".to_string()));
    };

    let reader = Reader {
        blocks: &sink.blocks,
    };
    let main = &sink.blocks[main];

    let types = reader.types();
    let mut categories = reader.categories();
    let mut aliases = BTreeMap::new();
    reader.items(&types, &mut categories, &mut aliases);
    let links = reader.links();

    let name = [main.first_value("_dictionary.title"), main.first_value("_datablock.id")]
        .into_iter()
        .flatten()
        .find(|v| !is_null(v))
        .unwrap_or(main.name())
        .to_string();
    let version = main
        .first_value("_dictionary.version")
        .filter(|v| !is_null(v))
        .map(str::to_string);

    log::debug!(
        "dictionary {name}: {} types, {} categories, {} links",
        types.len(),
        categories.len(),
        links.len()
    );

    Ok(Dictionary {
        name,
        version,
        types,
        categories: categories
            .into_iter()
            .map(|(k, v)| (k, Arc::new(v)))
            .collect(),
        aliases,
        links,
    })
}

/// The value of `item`, `None` when null.
fn value<'a>(row: &RowRef<'a>, item: &str) -> Option<&'a str> {
    Some(row.get(item)).filter(|v| !is_null(v))
}

/// Split `_category.item` into owned parts.
fn tag_parts(tag: &str) -> (String, String) {
    let (category, item) = split_tag(tag);
    (category.to_string(), item.to_string())
}

struct Reader<'a> {
    blocks: &'a [Datablock],
}

impl<'a> Reader<'a> {
    /// Rows of `category` across the main block and all frames.
    fn rows(&self, category: &'a str) -> impl Iterator<Item = RowRef<'a>> + 'a {
        let blocks = self.blocks;
        blocks
            .iter()
            .filter_map(move |b| b.category(category))
            .flat_map(|c| c.rows())
    }

    fn types(&self) -> BTreeMap<String, Arc<TypeValidator>> {
        let mut types = BTreeMap::new();
        for row in self.rows("item_type_list") {
            let Some(code) = value(&row, "code") else {
                continue;
            };
            let primitive = PrimitiveType::from_code(row.get("primitive_code"));
            let validator = TypeValidator::new(code, primitive, value(&row, "construct"));
            types.insert(code.to_ascii_lowercase(), Arc::new(validator));
        }
        types
    }

    fn categories(&self) -> BTreeMap<String, CategoryValidator> {
        let mut categories = BTreeMap::new();
        for block in self.blocks {
            let Some(category) = block.category("category") else {
                continue;
            };
            for row in category.rows() {
                if let Some(id) = value(&row, "id") {
                    categories
                        .entry(id.to_ascii_lowercase())
                        .or_insert_with(|| CategoryValidator::new(id));
                }
            }

            let frame_category = block
                .first_value("_category.id")
                .filter(|v| !is_null(v))
                .map(str::to_ascii_lowercase);

            for row in block.category("category_key").into_iter().flat_map(|c| c.rows()) {
                let Some(tag) = value(&row, "name") else {
                    continue;
                };
                let (category, item) = tag_parts(tag);
                match categories.get_mut(&category.to_ascii_lowercase()) {
                    Some(cv) if !cv.is_key(&item) => cv.keys.push(item),
                    Some(_) => {}
                    None => log::warn!("key {tag} names an undeclared category"),
                }
            }

            for row in block.category("category_group").into_iter().flat_map(|c| c.rows()) {
                let Some(group) = value(&row, "id") else {
                    continue;
                };
                let owner = value(&row, "category_id")
                    .map(str::to_ascii_lowercase)
                    .or_else(|| frame_category.clone());
                if let Some(cv) = owner.and_then(|c| categories.get_mut(&c)) {
                    cv.groups.push(group.to_string());
                }
            }
        }
        categories
    }

    /// Values of `category.item` in `block` that apply to the item `name`:
    /// rows naming the item, or rows without a name inside the item's own
    /// frame.
    fn frame_values(block: &'a Datablock, category: &str, item: &str, name: &str) -> Vec<&'a str> {
        let Some(category) = block.category(category) else {
            return Vec::new();
        };
        category
            .rows()
            .filter(|row| value(row, "name").is_none_or(|n| n.eq_ignore_ascii_case(name)))
            .filter_map(|row| value(&row, item))
            .collect()
    }

    fn items(
        &self,
        types: &BTreeMap<String, Arc<TypeValidator>>,
        categories: &mut BTreeMap<String, CategoryValidator>,
        aliases: &mut BTreeMap<String, (String, String)>,
    ) {
        for block in self.blocks {
            let Some(items) = block.category("item") else {
                continue;
            };
            for row in items.rows() {
                let Some(tag) = value(&row, "name") else {
                    continue;
                };
                let (tag_category, item_name) = tag_parts(tag);
                let category = value(&row, "category_id")
                    .map(str::to_string)
                    .unwrap_or(tag_category);

                let type_validator = Self::frame_values(block, "item_type", "code", tag)
                    .first()
                    .and_then(|code| {
                        let found = types.get(&code.to_ascii_lowercase()).cloned();
                        if found.is_none() {
                            log::warn!("{tag}: undefined type {code}");
                        }
                        found
                    });

                let validator = ItemValidator {
                    category: category.clone(),
                    name: item_name.clone(),
                    mandatory: row.get("mandatory_code").eq_ignore_ascii_case("yes"),
                    type_validator,
                    enumerations: Self::frame_values(block, "item_enumeration", "value", tag)
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                    default: Self::frame_values(block, "item_default", "value", tag)
                        .first()
                        .map(|v| v.to_string()),
                };

                for alias in Self::frame_values(block, "item_aliases", "alias_name", tag) {
                    let alias = alias.strip_prefix('_').unwrap_or(alias).to_ascii_lowercase();
                    aliases.insert(alias, (category.clone(), item_name.clone()));
                }

                categories
                    .entry(category.to_ascii_lowercase())
                    .or_insert_with(|| {
                        log::debug!("{tag}: category {category} is not declared");
                        CategoryValidator::new(&category)
                    })
                    .add_item(validator);
            }
        }
    }

    fn links(&self) -> Vec<LinkValidator> {
        let mut links: Vec<LinkValidator> = Vec::new();
        let mut grouped = Vec::new();

        for row in self.rows("pdbx_item_linked_group_list") {
            let (Some(group), Some(child), Some(parent)) = (
                value(&row, "link_group_id"),
                value(&row, "child_name"),
                value(&row, "parent_name"),
            ) else {
                continue;
            };
            let (parent_category, parent_item) = tag_parts(parent);
            let (child_category, child_item) = tag_parts(child);
            grouped.push((parent.to_ascii_lowercase(), child.to_ascii_lowercase()));

            let existing = links.iter_mut().find(|l| {
                l.group.as_deref() == Some(group)
                    && l.parent_category.eq_ignore_ascii_case(&parent_category)
                    && l.child_category.eq_ignore_ascii_case(&child_category)
            });
            match existing {
                Some(link) => {
                    link.parent_keys.push(parent_item);
                    link.child_keys.push(child_item);
                }
                None => links.push(LinkValidator {
                    group: Some(group.to_string()),
                    parent_category,
                    child_category,
                    parent_keys: vec![parent_item],
                    child_keys: vec![child_item],
                }),
            }
        }

        for row in self.rows("item_linked") {
            let (Some(child), Some(parent)) = (value(&row, "child_name"), value(&row, "parent_name"))
            else {
                continue;
            };
            let pair = (parent.to_ascii_lowercase(), child.to_ascii_lowercase());
            if grouped.contains(&pair) {
                continue;
            }
            let (parent_category, parent_item) = tag_parts(parent);
            let (child_category, child_item) = tag_parts(child);

            let same_categories = |l: &LinkValidator| {
                l.group.is_none()
                    && l.parent_category.eq_ignore_ascii_case(&parent_category)
                    && l.child_category.eq_ignore_ascii_case(&child_category)
            };
            let known = links.iter().any(|l| {
                same_categories(l)
                    && l.pairs().any(|(p, c)| {
                        p.eq_ignore_ascii_case(&parent_item) && c.eq_ignore_ascii_case(&child_item)
                    })
            });
            if known {
                continue;
            }

            // a repeated parent or child item starts a new implicit group
            let open = links.iter().position(|l| {
                same_categories(l)
                    && !l.parent_keys.iter().any(|k| k.eq_ignore_ascii_case(&parent_item))
                    && !l.child_keys.iter().any(|k| k.eq_ignore_ascii_case(&child_item))
            });
            match open {
                Some(i) => {
                    links[i].parent_keys.push(parent_item);
                    links[i].child_keys.push(child_item);
                }
                None => links.push(LinkValidator {
                    group: None,
                    parent_category,
                    child_category,
                    parent_keys: vec![parent_item],
                    child_keys: vec![child_item],
                }),
            }
        }

        links
    }
}
