//! # Conditions
//!
//! Row predicates used to query and erase rows. A [`Condition`] is built with
//! [`key`] and combined with `&`, `|` and `!`:
//!
//! ```
//! use cifkit_engine::condition::key;
//!
//! let c = key("id").eq(2) | (key("name").eq("mies") & !key("type").is_null());
//! ```
//!
//! Item names are resolved to column positions once per category by
//! [`Condition::prepare`]; the resulting [`Prepared`] condition is then tested
//! against each row. Text comparisons follow the primitive type of the
//! column (case insensitive for `uchar` items), numeric values compare by
//! value.

use std::cmp::Ordering;
use std::ops::{BitAnd, BitOr, Not};

use regex::Regex;

use crate::dictionary::{PrimitiveType, compare_numbers};
use crate::models::{Category, RowId, RowRef};
use crate::value::{is_null, parse_number};

/// The right hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Text(String),
    Number(f64),
}

impl QueryValue {
    fn compare(&self, primitive: PrimitiveType, value: &str) -> Option<Ordering> {
        match self {
            QueryValue::Text(text) => Some(primitive.compare(value, text)),
            QueryValue::Number(n) => parse_number(value).map(|v| compare_numbers(v, *n)),
        }
    }

    fn to_text(&self) -> String {
        match self {
            QueryValue::Text(text) => text.clone(),
            QueryValue::Number(n) => n.to_string(),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Text(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Text(value)
    }
}

impl From<&String> for QueryValue {
    fn from(value: &String) -> Self {
        QueryValue::Text(value.clone())
    }
}

macro_rules! number_query_value {
    ($($t:ty),*) => {
        $(impl From<$t> for QueryValue {
            fn from(value: $t) -> Self {
                QueryValue::Number(value as f64)
            }
        })*
    };
}

number_query_value!(i32, i64, u32, u64, usize, f32, f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl CompareOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Less => ordering.is_lt(),
            CompareOp::LessOrEqual => ordering.is_le(),
            CompareOp::Greater => ordering.is_gt(),
            CompareOp::GreaterOrEqual => ordering.is_ge(),
        }
    }
}

/// A row predicate.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Matches every row
    All,
    Equals { item: String, value: QueryValue },
    NotEquals { item: String, value: QueryValue },
    Compare { item: String, op: CompareOp, value: QueryValue },
    /// The value is empty, `.` or `?`
    IsNull(String),
    Matches { item: String, pattern: Regex },
    /// Some item of the row equals the value
    AnyEquals(QueryValue),
    /// Some item of the row matches the pattern
    AnyMatches(Regex),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

/// Start a condition on `item`.
pub fn key(item: &str) -> Key {
    Key {
        item: item.to_string(),
    }
}

/// Matches every row.
pub fn all() -> Condition {
    Condition::All
}

/// Some item of the row equals `value`.
pub fn any(value: impl Into<QueryValue>) -> Condition {
    Condition::AnyEquals(value.into())
}

/// Some item of the row matches `pattern`.
pub fn any_matches(pattern: Regex) -> Condition {
    Condition::AnyMatches(pattern)
}

/// Builder returned by [`key`].
#[derive(Debug, Clone)]
pub struct Key {
    item: String,
}

impl Key {
    pub fn eq(self, value: impl Into<QueryValue>) -> Condition {
        Condition::Equals {
            item: self.item,
            value: value.into(),
        }
    }

    pub fn ne(self, value: impl Into<QueryValue>) -> Condition {
        Condition::NotEquals {
            item: self.item,
            value: value.into(),
        }
    }

    pub fn lt(self, value: impl Into<QueryValue>) -> Condition {
        self.compare(CompareOp::Less, value)
    }

    pub fn le(self, value: impl Into<QueryValue>) -> Condition {
        self.compare(CompareOp::LessOrEqual, value)
    }

    pub fn gt(self, value: impl Into<QueryValue>) -> Condition {
        self.compare(CompareOp::Greater, value)
    }

    pub fn ge(self, value: impl Into<QueryValue>) -> Condition {
        self.compare(CompareOp::GreaterOrEqual, value)
    }

    pub fn is_null(self) -> Condition {
        Condition::IsNull(self.item)
    }

    pub fn matches(self, pattern: Regex) -> Condition {
        Condition::Matches {
            item: self.item,
            pattern,
        }
    }

    fn compare(self, op: CompareOp, value: impl Into<QueryValue>) -> Condition {
        Condition::Compare {
            item: self.item,
            op,
            value: value.into(),
        }
    }
}

impl BitAnd for Condition {
    type Output = Condition;

    fn bitand(self, rhs: Condition) -> Condition {
        match (self, rhs) {
            (Condition::All, c) | (c, Condition::All) => c,
            (a, b) => Condition::And(Box::new(a), Box::new(b)),
        }
    }
}

impl BitOr for Condition {
    type Output = Condition;

    fn bitor(self, rhs: Condition) -> Condition {
        match (self, rhs) {
            (Condition::All, _) | (_, Condition::All) => Condition::All,
            (a, b) => Condition::Or(Box::new(a), Box::new(b)),
        }
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        match self {
            Condition::Not(inner) => *inner,
            c => Condition::Not(Box::new(c)),
        }
    }
}

impl Condition {
    /// Resolve item names against the columns of `category`.
    pub fn prepare(&self, category: &Category) -> Prepared<'_> {
        Prepared {
            node: Node::build(self, category),
        }
    }

    /// The `(item, value)` pairs of a condition made only of equality tests
    /// joined by `&`; `None` for any other shape.
    pub(crate) fn equality_terms(&self) -> Option<Vec<(&str, &QueryValue)>> {
        fn collect<'c>(c: &'c Condition, terms: &mut Vec<(&'c str, &'c QueryValue)>) -> bool {
            match c {
                Condition::Equals { item, value } => {
                    terms.push((item.as_str(), value));
                    true
                }
                Condition::And(a, b) => collect(a, terms) && collect(b, terms),
                _ => false,
            }
        }

        let mut terms = Vec::new();
        collect(self, &mut terms).then_some(terms)
    }

    /// Key values for an index lookup when the condition is exactly an
    /// equality test on each of `keys`.
    pub(crate) fn key_values(&self, keys: &[(&str, PrimitiveType)]) -> Option<Vec<String>> {
        let terms = self.equality_terms()?;
        if terms.len() != keys.len() {
            return None;
        }

        keys.iter()
            .map(|(name, primitive)| {
                let mut matching = terms.iter().filter(|(item, _)| item.eq_ignore_ascii_case(name));
                let (_, value) = matching.next()?;
                if matching.next().is_some() {
                    return None;
                }
                match value {
                    QueryValue::Number(_) if *primitive != PrimitiveType::Numb => None,
                    v => Some(v.to_text()),
                }
            })
            .collect()
    }
}

/// A condition bound to the columns of one category.
#[derive(Debug)]
pub struct Prepared<'q> {
    node: Node<'q>,
}

impl Prepared<'_> {
    pub fn matches(&self, row: &RowRef<'_>) -> bool {
        self.node.test(row)
    }
}

#[derive(Debug, Clone, Copy)]
struct BoundColumn {
    index: Option<usize>,
    primitive: PrimitiveType,
}

impl BoundColumn {
    fn resolve(category: &Category, item: &str) -> Self {
        let index = category.column_index(item);
        Self {
            index,
            primitive: index
                .map(|i| category.columns()[i].primitive())
                .unwrap_or_default(),
        }
    }

    fn value<'r>(&self, row: &RowRef<'r>) -> &'r str {
        row.category.value_at(row.data, self.index)
    }
}

#[derive(Debug)]
enum Node<'q> {
    All,
    Equals {
        column: BoundColumn,
        value: &'q QueryValue,
        negate: bool,
    },
    Compare {
        column: BoundColumn,
        op: CompareOp,
        value: &'q QueryValue,
    },
    IsNull(BoundColumn),
    Matches {
        column: BoundColumn,
        pattern: &'q Regex,
    },
    AnyEquals {
        columns: Vec<PrimitiveType>,
        value: &'q QueryValue,
    },
    AnyMatches(&'q Regex),
    And(Box<Node<'q>>, Box<Node<'q>>),
    Or(Box<Node<'q>>, Box<Node<'q>>),
    Not(Box<Node<'q>>),
}

impl<'q> Node<'q> {
    fn build(condition: &'q Condition, category: &Category) -> Self {
        match condition {
            Condition::All => Node::All,
            Condition::Equals { item, value } => Node::Equals {
                column: BoundColumn::resolve(category, item),
                value,
                negate: false,
            },
            Condition::NotEquals { item, value } => Node::Equals {
                column: BoundColumn::resolve(category, item),
                value,
                negate: true,
            },
            Condition::Compare { item, op, value } => Node::Compare {
                column: BoundColumn::resolve(category, item),
                op: *op,
                value,
            },
            Condition::IsNull(item) => Node::IsNull(BoundColumn::resolve(category, item)),
            Condition::Matches { item, pattern } => Node::Matches {
                column: BoundColumn::resolve(category, item),
                pattern,
            },
            Condition::AnyEquals(value) => Node::AnyEquals {
                columns: category.columns().iter().map(|c| c.primitive()).collect(),
                value,
            },
            Condition::AnyMatches(pattern) => Node::AnyMatches(pattern),
            Condition::And(a, b) => Node::And(
                Box::new(Node::build(a, category)),
                Box::new(Node::build(b, category)),
            ),
            Condition::Or(a, b) => Node::Or(
                Box::new(Node::build(a, category)),
                Box::new(Node::build(b, category)),
            ),
            Condition::Not(c) => Node::Not(Box::new(Node::build(c, category))),
        }
    }

    fn test(&self, row: &RowRef<'_>) -> bool {
        match self {
            Node::All => true,
            Node::Equals {
                column,
                value,
                negate,
            } => {
                let equal = value
                    .compare(column.primitive, column.value(row))
                    .is_some_and(Ordering::is_eq);
                equal != *negate
            }
            Node::Compare { column, op, value } => value
                .compare(column.primitive, column.value(row))
                .is_some_and(|o| op.accepts(o)),
            Node::IsNull(column) => is_null(column.value(row)),
            Node::Matches { column, pattern } => pattern.is_match(column.value(row)),
            Node::AnyEquals { columns, value } => {
                columns.iter().enumerate().any(|(i, primitive)| {
                    row.data
                        .get(i)
                        .and_then(|v| value.compare(*primitive, v))
                        .is_some_and(Ordering::is_eq)
                })
            }
            Node::AnyMatches(pattern) => row.items().any(|(_, v)| pattern.is_match(v)),
            Node::And(a, b) => a.test(row) && b.test(row),
            Node::Or(a, b) => a.test(row) || b.test(row),
            Node::Not(c) => !c.test(row),
        }
    }
}

/// The rows selected by a query, in category order unless reordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    rows: Vec<RowId>,
}

impl RowSet {
    pub(crate) fn new(rows: Vec<RowId>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<RowId> {
        self.rows.first().copied()
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.rows.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = RowId> + '_ {
        self.rows.iter().copied()
    }

    pub fn into_vec(self) -> Vec<RowId> {
        self.rows
    }

    /// The rows as views into `category`, skipping rows erased since the query.
    pub fn rows<'c>(&'c self, category: &'c Category) -> impl Iterator<Item = RowRef<'c>> + 'c {
        self.rows.iter().filter_map(|id| category.row(*id).ok())
    }

    /// Sort by the values of `items`, compared by their primitive types.
    pub fn order_by(&mut self, category: &Category, items: &[&str]) {
        category.sort_ids(&mut self.rows, items);
    }
}

impl IntoIterator for RowSet {
    type Item = RowId;
    type IntoIter = std::vec::IntoIter<RowId>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Item;
    use pretty_assertions::assert_eq;

    fn sample() -> Category {
        let mut cat = Category::new("test");
        for (id, name, kind) in [(1, "aap", "mammal"), (2, "noot", "."), (3, "mies", "Mammal")] {
            cat.emplace([Item::new("id", id), Item::new("name", name), Item::new("kind", kind)])
                .unwrap();
        }
        cat
    }

    fn names(cat: &Category, condition: &Condition) -> Vec<String> {
        cat.find(condition)
            .rows(cat)
            .map(|r| r.get("name").to_string())
            .collect()
    }

    #[test]
    fn equality_and_inequality() {
        let cat = sample();
        assert_eq!(names(&cat, &key("id").eq(2)), vec!["noot"]);
        assert_eq!(names(&cat, &key("id").eq("2")), vec!["noot"]);
        assert_eq!(cat.count(&key("id").ne(2)), 2);
    }

    #[test]
    fn regex_match() {
        let cat = sample();
        let c = key("name").matches(Regex::new("^m").unwrap());
        assert_eq!(names(&cat, &c), vec!["mies"]);
    }

    #[test]
    fn ordering_comparisons_are_numeric_for_numbers() {
        let mut cat = sample();
        cat.emplace([Item::new("id", 10), Item::new("name", "wim")]).unwrap();

        assert_eq!(names(&cat, &key("id").gt(2)), vec!["mies", "wim"]);
        assert_eq!(names(&cat, &key("id").le(2)), vec!["aap", "noot"]);
        // text comparison: "10" < "2"
        assert_eq!(names(&cat, &key("id").lt("2")), vec!["aap", "wim"]);
    }

    #[test]
    fn null_tests() {
        let cat = sample();
        assert_eq!(names(&cat, &key("kind").is_null()), vec!["noot"]);
        assert_eq!(names(&cat, &key("missing").is_null()).len(), 3);
        assert_eq!(names(&cat, &!key("kind").is_null()), vec!["aap", "mies"]);
    }

    #[test]
    fn combinators() {
        let cat = sample();
        let c = key("id").eq(1) | key("name").eq("mies");
        assert_eq!(names(&cat, &c), vec!["aap", "mies"]);

        let c = key("id").ge(1) & key("kind").eq("mammal");
        assert_eq!(names(&cat, &c), vec!["aap"]);

        assert_eq!(cat.count(&all()), 3);
        assert_eq!(cat.count(&(all() & key("id").eq(3))), 1);
        assert_eq!(cat.count(&(key("id").eq(3) | all())), 3);
    }

    #[test]
    fn any_item() {
        let cat = sample();
        assert_eq!(names(&cat, &any("noot")), vec!["noot"]);
        assert_eq!(names(&cat, &any(3)), vec!["mies"]);
        let c = any_matches(Regex::new("(?i)^mammal$").unwrap());
        assert_eq!(names(&cat, &c), vec!["aap", "mies"]);
    }

    #[test]
    fn double_negation_cancels() {
        let c = !!key("id").eq(1);
        assert!(matches!(c, Condition::Equals { .. }));
    }

    #[test]
    fn equality_terms_only_for_conjunctions_of_equals() {
        let c = key("a").eq(1) & key("b").eq("x");
        let terms = c.equality_terms().unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[1], ("b", &QueryValue::from("x")));

        assert!((key("a").eq(1) | key("b").eq(2)).equality_terms().is_none());
        assert!((key("a").eq(1) & key("b").gt(2)).equality_terms().is_none());
    }

    #[test]
    fn key_values_follow_key_order() {
        let c = key("name").eq("x") & key("id").eq(3);
        let keys = [("id", PrimitiveType::Numb), ("name", PrimitiveType::Char)];
        assert_eq!(c.key_values(&keys), Some(vec!["3".to_string(), "x".to_string()]));

        let keys = [("id", PrimitiveType::Char), ("name", PrimitiveType::Char)];
        assert_eq!(c.key_values(&keys), None);

        assert_eq!(key("id").eq(3).key_values(&[("id", PrimitiveType::Numb), ("x", PrimitiveType::Char)]), None);
    }

    #[test]
    fn row_set_order_by() {
        let cat = sample();
        let mut set = cat.find(&all());
        set.order_by(&cat, &["name"]);
        let ordered: Vec<_> = set.rows(&cat).map(|r| r.get("name")).collect();
        assert_eq!(ordered, vec!["aap", "mies", "noot"]);
    }
}
