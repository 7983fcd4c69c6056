//! Item-level grammar: `loop_` tables and `tag value` pairs.

use crate::lexer::Token;
use crate::parser::sink::Sink;
use crate::parser::{ParseError, Parser, split_tag};

/// A `tag value` pair outside a loop.
///
/// Consecutive pairs of one category fill a single row; `current` holds the
/// category of that row and is cleared by the caller whenever something other
/// than a pair (a loop, a save frame) intervenes.
pub(super) fn tag_value<S: Sink>(
    p: &mut Parser<'_, S>,
    tag: &str,
    current: &mut Option<String>,
) -> Result<(), ParseError> {
    let (category, item) = split_tag(tag);

    let value = match p.next()? {
        Token::Value(value) => value,
        other => return Err(p.unexpected("a value", &other)),
    };

    let same_row = current
        .as_deref()
        .is_some_and(|c| c.eq_ignore_ascii_case(category));
    if !same_row {
        p.sink().begin_category(category);
        p.sink().begin_row();
        *current = Some(category.to_string());
    }

    p.sink().item(item, value);
    Ok(())
}

/// A loop; the `loop_` keyword has been consumed.
///
/// All tags must belong to one category. Values are assigned to the tags
/// round-robin, and the loop ends at the first token that is not a value.
pub(super) fn loop_<'a, S: Sink>(p: &mut Parser<'a, S>) -> Result<(), ParseError> {
    let mut category: Option<&'a str> = None;
    let mut items: Vec<&'a str> = Vec::new();

    loop {
        match p.next()? {
            Token::Tag(tag) => {
                let (cat, item) = split_tag(tag);
                match category {
                    None => category = Some(cat),
                    Some(c) if c.eq_ignore_ascii_case(cat) => {}
                    Some(c) => {
                        return Err(p.grammar_error(format!(
                            "tag {tag} does not belong to category '{c}' of this loop"
                        )));
                    }
                }
                items.push(item);
            }
            other => {
                p.push_back(other);
                break;
            }
        }
    }

    let Some(category) = category else {
        let token = p.next()?;
        return Err(p.unexpected("a tag after loop_", &token));
    };

    p.sink().begin_category(category);

    let mut column = 0;
    let mut last_line = p.line();
    loop {
        match p.next()? {
            Token::Value(value) => {
                if column == 0 {
                    p.sink().begin_row();
                }
                p.sink().item(items[column], value);
                column = (column + 1) % items.len();
                last_line = p.line();
            }
            other => {
                p.push_back(other);
                break;
            }
        }
    }

    if column != 0 {
        return Err(ParseError::Grammar {
            line: last_line,
            message: format!(
                "loop of category '{category}' ends with {column} of {} values in its last row",
                items.len()
            ),
        });
    }

    Ok(())
}
