//! # Writer
//!
//! Serialises data blocks back to CIF text.
//!
//! Every block starts with its `data_` header and each category is followed
//! by a `#` separator line. A category with one row is written as aligned
//! `tag value` lines; one with more rows as a `loop_` table whose columns are
//! padded to a common width and wrapped at [`WriteOptions::line_width`].
//!
//! Values are written bare when that reads back unchanged, otherwise in
//! single quotes, double quotes or, as a last resort, a `;` text field.
//! Empty categories are skipped.

use std::borrow::Cow;

use cifkit_syntax::charclass::{is_control, is_unquoted_string, is_white};
use serde::{Deserialize, Serialize};

use crate::models::{Category, Datablock};
use crate::value::Item;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Maximum length of a line, text fields excepted
    pub line_width: usize,
    /// Write `entry` and `audit_conform` before the other categories
    pub canonical_order: bool,
    /// Record the attached dictionary in `audit_conform`
    pub audit_conform: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            line_width: 132,
            canonical_order: true,
            audit_conform: true,
        }
    }
}

/// How a single value is written.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Field<'a> {
    Inline(Cow<'a, str>),
    TextField(&'a str),
}

fn quote_blocked(value: &str, quote: u8) -> bool {
    value
        .as_bytes()
        .windows(2)
        .any(|w| w[0] == quote && is_white(w[1]))
}

fn format_value(value: &str, line_width: usize) -> Field<'_> {
    match value {
        "" => return Field::Inline(Cow::Borrowed(".")),
        "." | "?" => return Field::Inline(Cow::Borrowed(value)),
        _ => {}
    }

    if is_unquoted_string(value) && value.len() <= line_width {
        return Field::Inline(Cow::Borrowed(value));
    }

    let single_line = !value.bytes().any(|b| b == b'\n' || b == b'\r' || is_control(b));
    if single_line && value.len() + 2 <= line_width {
        for quote in [b'\'', b'"'] {
            if !quote_blocked(value, quote) {
                let q = quote as char;
                return Field::Inline(Cow::Owned(format!("{q}{value}{q}")));
            }
        }
    }

    Field::TextField(value)
}

/// Why `value` cannot be written so that it reads back unchanged, if it
/// cannot. A text field ends at the first line starting with `;`, drops a
/// carriage return before its closing line and control characters are
/// replaced on reading.
pub(crate) fn unwritable_reason(value: &str) -> Option<&'static str> {
    if value.contains("\n;") {
        Some("a line of the value starts with ';'")
    } else if value.bytes().any(is_control) {
        Some("the value contains control characters")
    } else if value.ends_with('\r') {
        Some("the value ends with a carriage return")
    } else {
        None
    }
}

fn write_text_field(out: &mut String, value: &str) {
    out.push(';');
    if value.starts_with('\n') || value.starts_with("\r\n") {
        out.push('\n');
    }
    out.push_str(value);
    out.push_str("\n;\n");
}

/// The stored values of each row in column order, `.` when absent.
fn raw_values<'a>(category: &'a Category) -> Vec<Vec<&'a str>> {
    let columns = category.columns().len();
    category
        .rows()
        .map(|row| {
            (0..columns)
                .map(|i| row.data.get(i).unwrap_or("."))
                .collect()
        })
        .collect()
}

fn tag(category: &Category, item: &str) -> String {
    if category.name().is_empty() {
        format!("_{item}")
    } else {
        format!("_{}.{item}", category.name())
    }
}

fn write_single(out: &mut String, category: &Category, values: &[&str], options: &WriteOptions) {
    let tags: Vec<String> = category
        .column_names()
        .map(|item| tag(category, item))
        .collect();
    let width = tags.iter().map(String::len).max().unwrap_or(0) + 1;

    for (tag, value) in tags.iter().zip(values) {
        match format_value(value, options.line_width) {
            Field::Inline(text) if width + text.len() <= options.line_width => {
                out.push_str(&format!("{tag:<width$}{text}\n"));
            }
            Field::Inline(text) => {
                out.push_str(&format!("{tag}\n{text}\n"));
            }
            Field::TextField(text) => {
                out.push_str(tag);
                out.push('\n');
                write_text_field(out, text);
            }
        }
    }
}

fn flush(out: &mut String, line: &mut String) {
    let trimmed = line.trim_end();
    if !trimmed.is_empty() {
        out.push_str(trimmed);
        out.push('\n');
    }
    line.clear();
}

fn write_loop(out: &mut String, category: &Category, rows: &[Vec<&str>], options: &WriteOptions) {
    out.push_str("loop_\n");
    for item in category.column_names() {
        out.push_str(&tag(category, item));
        out.push('\n');
    }

    let formatted: Vec<Vec<Field<'_>>> = rows
        .iter()
        .map(|row| row.iter().map(|v| format_value(v, options.line_width)).collect())
        .collect();

    let mut widths = vec![0; category.columns().len()];
    for row in &formatted {
        for (width, field) in widths.iter_mut().zip(row) {
            if let Field::Inline(text) = field {
                *width = (*width).max(text.len());
            }
        }
    }

    let mut line = String::new();
    for row in &formatted {
        for (field, &width) in row.iter().zip(&widths) {
            match field {
                Field::Inline(text) => {
                    if !line.is_empty() && line.len() + 1 + text.len() > options.line_width {
                        flush(out, &mut line);
                    }
                    if !line.is_empty() {
                        line.push(' ');
                    }
                    line.push_str(&format!("{text:<width$}"));
                }
                Field::TextField(text) => {
                    flush(out, &mut line);
                    write_text_field(out, text);
                }
            }
        }
        flush(out, &mut line);
    }
}

pub fn write_category(out: &mut String, category: &Category, options: &WriteOptions) {
    if category.is_empty() || category.columns().is_empty() {
        return;
    }

    let rows = raw_values(category);
    match rows.as_slice() {
        [single] => write_single(out, category, single, options),
        rows => write_loop(out, category, rows, options),
    }
    out.push_str("#\n");
}

/// `audit_conform` naming the block's dictionary, keeping any other items of
/// an existing first row.
fn audit_conform(block: &Datablock) -> Option<Category> {
    let dictionary = block.dictionary()?;

    let mut items: Vec<Item> = block
        .category("audit_conform")
        .and_then(|c| c.first())
        .map(|row| {
            row.items()
                .filter(|(name, _)| {
                    !name.eq_ignore_ascii_case("dict_name")
                        && !name.eq_ignore_ascii_case("dict_version")
                })
                .map(|(name, value)| Item::new(name, value))
                .collect()
        })
        .unwrap_or_default();
    items.insert(0, Item::new("dict_name", dictionary.name()));
    if let Some(version) = dictionary.version() {
        items.insert(1, Item::new("dict_version", version));
    }

    let mut category = Category::new("audit_conform");
    for item in items {
        let row = match category.first().map(|r| r.id()) {
            Some(row) => row,
            None => category.push_row_raw(),
        };
        category.set_raw(row, &item.name, item.value);
    }
    Some(category)
}

fn rank(category: &Category) -> u8 {
    match category.name().to_ascii_lowercase().as_str() {
        "entry" => 0,
        "audit_conform" => 1,
        _ => 2,
    }
}

/// Write one data block.
pub fn write_block(out: &mut String, block: &Datablock, options: &WriteOptions) {
    out.push_str("data_");
    out.push_str(block.name());
    out.push_str("\n#\n");

    let audit = if options.audit_conform {
        audit_conform(block)
    } else {
        None
    };

    let mut categories: Vec<&Category> = block
        .categories()
        .map(|c| match &audit {
            Some(audit) if c.name().eq_ignore_ascii_case("audit_conform") => audit,
            _ => c,
        })
        .collect();

    if let Some(audit) = &audit
        && block.category("audit_conform").is_none()
    {
        let at = categories
            .iter()
            .position(|c| c.name().eq_ignore_ascii_case("entry"))
            .map_or(0, |i| i + 1);
        categories.insert(at, audit);
    }

    if options.canonical_order {
        categories.sort_by_key(|c| rank(c));
    }

    for category in categories {
        write_category(out, category, options);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn write(source: &str, options: &WriteOptions) -> String {
        Document::parse(source).unwrap().to_cif(options)
    }

    #[rstest]
    #[case("abc", "abc")]
    #[case("", ".")]
    #[case(".", ".")]
    #[case("?", "?")]
    #[case("two words", "'two words'")]
    #[case("it's", "it's")]
    #[case("it' s", "\"it' s\"")]
    #[case("_x", "'_x'")]
    #[case("data_x", "'data_x'")]
    #[case("#x", "'#x'")]
    fn inline_values(#[case] value: &str, #[case] expected: &str) {
        assert_eq!(
            format_value(value, 80),
            Field::Inline(Cow::Borrowed(expected))
        );
    }

    #[rstest]
    #[case("line\nbreak")]
    #[case("a' b\" c")]
    fn text_field_values(#[case] value: &str) {
        assert_eq!(format_value(value, 80), Field::TextField(value));
    }

    #[rstest]
    #[case("a\n;b", true)]
    #[case("\n;", true)]
    #[case("bell\u{7}", true)]
    #[case("ends\r", true)]
    #[case(";x", false)]
    #[case("a;\nb", false)]
    #[case("line\r\nbreak", false)]
    #[case("\tindented", false)]
    fn values_that_cannot_be_written(#[case] value: &str, #[case] rejected: bool) {
        assert_eq!(unwritable_reason(value).is_some(), rejected);
    }

    #[test]
    fn long_values_become_text_fields() {
        let value = "x ".repeat(50);
        assert_eq!(format_value(&value, 80), Field::TextField(&value));
    }

    #[test]
    fn single_row_layout() {
        let out = write(
            "data_x\n_cell.length_a 10.5\n_cell.title 'two words'\n_entry.id 1ABC\n",
            &WriteOptions::default(),
        );
        insta::assert_snapshot!(out, @r"
        data_x
        #
        _entry.id 1ABC
        #
        _cell.length_a 10.5
        _cell.title    'two words'
        #
        ");
    }

    #[test]
    fn loop_layout() {
        let source = "data_x\nloop_\n_atom.id\n_atom.name\n_atom.note\n1 N ?\n2 CA 'alpha carbon'\n10 C .\n";
        insta::assert_snapshot!(write(source, &WriteOptions::default()), @r"
        data_x
        #
        loop_
        _atom.id
        _atom.name
        _atom.note
        1  N  ?
        2  CA 'alpha carbon'
        10 C  .
        #
        ");
    }

    #[test]
    fn text_fields_in_loops() {
        let source = "data_x\nloop_\n_t.id\n_t.text\n1\n;first\nsecond\n;\n2 short\n";
        insta::assert_snapshot!(write(source, &WriteOptions::default()), @r"
        data_x
        #
        loop_
        _t.id
        _t.text
        1
        ;first
        second
        ;
        2 short
        #
        ");
    }

    #[test]
    fn loop_rows_wrap_at_line_width() {
        let source = "data_x\nloop_\n_t.a\n_t.b\n_t.c\naaaa bbbb cccc\nd e f\n";
        let options = WriteOptions {
            line_width: 10,
            ..WriteOptions::default()
        };
        insta::assert_snapshot!(write(source, &options), @r"
        data_x
        #
        loop_
        _t.a
        _t.b
        _t.c
        aaaa bbbb
        cccc
        d    e
        f
        #
        ");
    }

    #[test]
    fn loop_lines_stay_within_line_width() {
        let source = "data_x\nloop_\n_t.a\n_t.b\n_t.c\n_t.d\n\
                      x yyyyyy z w\nxxxxx y zzzzzz 'w w'\nxx yy zz ww\n";
        let options = WriteOptions {
            line_width: 14,
            ..WriteOptions::default()
        };
        let out = write(source, &options);
        for line in out.lines() {
            assert!(line.len() <= 14, "{line:?} in\n{out}");
        }
        assert_eq!(write(&out, &options), out);
    }

    #[test]
    fn insertion_order_without_canonical_order() {
        let options = WriteOptions {
            canonical_order: false,
            ..WriteOptions::default()
        };
        let out = write("data_x\n_b.id 1\n_entry.id 2\n", &options);
        assert!(out.find("_b.id").unwrap() < out.find("_entry.id").unwrap());
    }

    #[test]
    fn tags_without_category() {
        let out = write("data_x\n_cell_length_a 5\n", &WriteOptions::default());
        assert!(out.contains("\n_cell_length_a 5\n"), "{out}");
    }
}
