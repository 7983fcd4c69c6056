//! # Dictionaries
//!
//! A dictionary is the schema of a family of CIF files. It is itself a CIF
//! file (DDL2 flavour, as used for mmCIF) whose save frames describe
//! categories and items; [`Dictionary::parse`] reads one and projects the
//! frames into validator objects:
//!
//! - [`TypeValidator`]: a named value type, its [`PrimitiveType`] and pattern
//! - [`ItemValidator`]: per item type, mandatory flag, default, enumeration
//! - [`CategoryValidator`]: key items, mandatory items and the known items
//! - [`LinkValidator`]: a parent/child relation between two categories
//!
//! Categories bind to their validator when a dictionary is attached to the
//! document; the key items and primitive types drive the category index and
//! the comparisons used by queries and sorting.

mod ddl;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;

use crate::error::CifError;
use crate::validation::SchemaViolation;
use crate::value::{is_null, parse_number};

/// How values of a type compare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    /// Case sensitive text
    #[default]
    Char,
    /// Case insensitive text
    UChar,
    Numb,
}

impl PrimitiveType {
    /// Map a DDL2 `primitive_code`; unknown codes are treated as `char`.
    pub fn from_code(code: &str) -> Self {
        if code.eq_ignore_ascii_case("uchar") {
            PrimitiveType::UChar
        } else if code.eq_ignore_ascii_case("numb") {
            PrimitiveType::Numb
        } else {
            PrimitiveType::Char
        }
    }

    /// Compare two values of this type.
    ///
    /// Text compares with leading and trailing white space ignored and inner
    /// runs of white space collapsed to one space. Numbers compare by value,
    /// ignoring standard uncertainties; values that are not numbers sort
    /// before all numbers.
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            PrimitiveType::Char => collapsed(a, false).cmp(collapsed(b, false)),
            PrimitiveType::UChar => collapsed(a, true).cmp(collapsed(b, true)),
            PrimitiveType::Numb => match (parse_number(a), parse_number(b)) {
                (Some(x), Some(y)) => compare_numbers(x, y),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => collapsed(a, false).cmp(collapsed(b, false)),
            },
        }
    }

    pub fn equals(self, a: &str, b: &str) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

/// Numbers that agree in all but the last three bits of the mantissa are
/// equal. Rounding both sides first keeps the comparison a total order,
/// which the index relies on; a plain distance test would not be
/// transitive.
pub(crate) fn compare_numbers(x: f64, y: f64) -> Ordering {
    round_number(x).total_cmp(&round_number(y))
}

fn round_number(x: f64) -> f64 {
    if x == 0.0 {
        // -0.0 and 0.0
        return 0.0;
    }
    f64::from_bits(x.to_bits() & !0b111)
}

fn collapsed(s: &str, fold: bool) -> impl Iterator<Item = u8> + '_ {
    s.split_ascii_whitespace()
        .enumerate()
        .flat_map(move |(i, word)| {
            let separator = (i > 0).then_some(b' ');
            separator.into_iter().chain(word.bytes().map(move |b| {
                if fold { b.to_ascii_lowercase() } else { b }
            }))
        })
}

/// A named value type from `_item_type_list`.
#[derive(Debug, Clone)]
pub struct TypeValidator {
    pub code: String,
    pub primitive: PrimitiveType,
    pattern: Option<Regex>,
}

impl TypeValidator {
    /// Create a type from its DDL2 construct. A construct that does not
    /// compile leaves the type without a pattern; this is logged.
    pub fn new(code: &str, primitive: PrimitiveType, construct: Option<&str>) -> Self {
        let pattern = construct.and_then(|construct| {
            let anchored = format!("^(?:{})$", construct_to_regex(construct));
            match Regex::new(&anchored) {
                Ok(re) => Some(re),
                Err(err) => {
                    log::warn!("type {code}: construct is not a usable pattern: {err}");
                    None
                }
            }
        });

        Self {
            code: code.to_string(),
            primitive,
            pattern,
        }
    }

    pub fn has_pattern(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn matches(&self, value: &str) -> bool {
        self.pattern.as_ref().is_none_or(|re| re.is_match(value))
    }
}

/// Rewrite a POSIX extended regular expression, as used in DDL2 constructs,
/// into the syntax of the `regex` crate.
///
/// Inside bracket expressions `[` is literal in POSIX but opens a nested
/// class here, and `&&`, `--` and `~~` are set operators here; those
/// characters are escaped. A `]` directly after the opening bracket is a
/// literal in both but is escaped as well for clarity.
pub(crate) fn construct_to_regex(construct: &str) -> String {
    let mut out = String::with_capacity(construct.len() + 8);
    let mut chars = construct.chars().peekable();
    let mut in_class = false;

    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(c);
            if let Some(next) = chars.next() {
                out.push(next);
            }
            continue;
        }

        if !in_class {
            out.push(c);
            if c == '[' {
                in_class = true;
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('^');
                }
                if chars.peek() == Some(&']') {
                    chars.next();
                    out.push_str("\\]");
                }
            }
            continue;
        }

        match c {
            ']' => {
                in_class = false;
                out.push(']');
            }
            '[' if chars.peek() == Some(&':') => {
                // POSIX named class such as [:alpha:], copied through
                out.push('[');
                for named in chars.by_ref() {
                    out.push(named);
                    if named == ']' {
                        break;
                    }
                }
            }
            '[' | '&' | '~' => {
                out.push('\\');
                out.push(c);
            }
            '-' if chars.peek() == Some(&'-') => out.push_str("\\-"),
            _ => out.push(c),
        }
    }

    out
}

/// Rules for one item, `_category.item`.
#[derive(Debug, Clone)]
pub struct ItemValidator {
    pub category: String,
    pub name: String,
    pub mandatory: bool,
    pub type_validator: Option<Arc<TypeValidator>>,
    pub enumerations: Vec<String>,
    pub default: Option<String>,
}

impl ItemValidator {
    pub fn tag(&self) -> String {
        format!("_{}.{}", self.category, self.name)
    }

    pub fn primitive(&self) -> PrimitiveType {
        self.type_validator
            .as_ref()
            .map(|t| t.primitive)
            .unwrap_or_default()
    }

    /// Check a single value. Null values always pass.
    pub fn validate(&self, value: &str) -> Result<(), SchemaViolation> {
        if is_null(value) {
            return Ok(());
        }

        if let Some(t) = &self.type_validator
            && !t.matches(value)
        {
            return Err(SchemaViolation::item(
                &self.category,
                &self.name,
                format!("value '{value}' does not match type {}", t.code),
            ));
        }

        if !self.enumerations.is_empty() {
            let primitive = self.primitive();
            if !self.enumerations.iter().any(|e| primitive.equals(e, value)) {
                return Err(SchemaViolation::item(
                    &self.category,
                    &self.name,
                    format!("value '{value}' is not one of the allowed values"),
                ));
            }
        }

        Ok(())
    }
}

/// Rules for one category.
#[derive(Debug, Clone, Default)]
pub struct CategoryValidator {
    pub name: String,
    /// Item names of the category key, in declaration order
    pub keys: Vec<String>,
    pub groups: Vec<String>,
    /// Item names of the mandatory items
    pub mandatory: Vec<String>,
    items: BTreeMap<String, Arc<ItemValidator>>,
}

impl CategoryValidator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn item(&self, name: &str) -> Option<&Arc<ItemValidator>> {
        self.items.get(&name.to_ascii_lowercase())
    }

    pub fn items(&self) -> impl Iterator<Item = &Arc<ItemValidator>> {
        self.items.values()
    }

    pub fn is_key(&self, item: &str) -> bool {
        self.keys.iter().any(|k| k.eq_ignore_ascii_case(item))
    }

    /// The primitive type of each key item, in key order.
    pub fn key_types(&self) -> Vec<PrimitiveType> {
        self.keys
            .iter()
            .map(|k| self.item(k).map(|iv| iv.primitive()).unwrap_or_default())
            .collect()
    }

    pub(crate) fn add_item(&mut self, item: ItemValidator) {
        if item.mandatory && !self.mandatory.iter().any(|m| m.eq_ignore_ascii_case(&item.name)) {
            self.mandatory.push(item.name.clone());
        }
        self.items
            .insert(item.name.to_ascii_lowercase(), Arc::new(item));
    }
}

/// A parent/child relation: the child items of each child row must match
/// the parent items of some parent row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkValidator {
    /// Link group id as declared in the dictionary, if any
    pub group: Option<String>,
    pub parent_category: String,
    pub child_category: String,
    pub parent_keys: Vec<String>,
    pub child_keys: Vec<String>,
}

impl LinkValidator {
    /// `(parent item, child item)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parent_keys
            .iter()
            .map(String::as_str)
            .zip(self.child_keys.iter().map(String::as_str))
    }

    /// The child item linked to `parent_item`.
    pub fn child_key_for(&self, parent_item: &str) -> Option<&str> {
        self.pairs()
            .find(|(p, _)| p.eq_ignore_ascii_case(parent_item))
            .map(|(_, c)| c)
    }
}

/// A parsed dictionary.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    name: String,
    version: Option<String>,
    types: BTreeMap<String, Arc<TypeValidator>>,
    categories: BTreeMap<String, Arc<CategoryValidator>>,
    /// lowercase alias tag without leading underscore -> (category, item)
    aliases: BTreeMap<String, (String, String)>,
    links: Vec<LinkValidator>,
}

impl Dictionary {
    /// Parse a DDL2 dictionary from source text.
    pub fn parse(source: &str) -> Result<Self, CifError> {
        ddl::read(source)
    }

    pub fn load<R: Read>(mut reader: R) -> Result<Self, CifError> {
        let mut source = String::new();
        reader.read_to_string(&mut source)?;
        Self::parse(&source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn type_validator(&self, code: &str) -> Option<&Arc<TypeValidator>> {
        self.types.get(&code.to_ascii_lowercase())
    }

    pub fn category(&self, name: &str) -> Option<&Arc<CategoryValidator>> {
        self.categories.get(&name.to_ascii_lowercase())
    }

    pub fn categories(&self) -> impl Iterator<Item = &Arc<CategoryValidator>> {
        self.categories.values()
    }

    /// Look up an item, falling back to the declared aliases.
    pub fn item(&self, category: &str, item: &str) -> Option<&Arc<ItemValidator>> {
        if let Some(iv) = self.category(category).and_then(|cv| cv.item(item)) {
            return Some(iv);
        }

        let alias = if category.is_empty() {
            item.to_ascii_lowercase()
        } else {
            format!("{category}.{item}").to_ascii_lowercase()
        };
        let (category, item) = self.aliases.get(&alias)?;
        self.category(category).and_then(|cv| cv.item(item))
    }

    pub fn links(&self) -> &[LinkValidator] {
        &self.links
    }

    /// Links in which `category` is the parent.
    pub fn links_from_parent<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a LinkValidator> + 'a {
        self.links
            .iter()
            .filter(move |l| l.parent_category.eq_ignore_ascii_case(category))
    }

    /// Links in which `category` is the child.
    pub fn links_to_child<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a LinkValidator> + 'a {
        self.links
            .iter()
            .filter(move |l| l.child_category.eq_ignore_ascii_case(category))
    }
}
