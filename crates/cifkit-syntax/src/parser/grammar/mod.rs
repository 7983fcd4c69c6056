//! # Grammar Rules
//!
//! The grammar rules take a `&mut Parser`, pull tokens with `p.next()` and
//! hand back the one token they do not want with `p.push_back()`. Structure
//! is reported to the sink as it is recognised; nothing is buffered beyond
//! the tag list of the loop being read.
//!
//! ## Module Structure
//!
//! - this module: the file, data blocks and save frames
//! - [`items`]: `loop_` tables and single `tag value` pairs
//!
//! ## Errors
//!
//! Unlike a markup grammar, CIF has no useful recovery: a value in the wrong
//! place shifts every following value into the wrong column. Every rule
//! therefore stops at the first problem and returns a [`ParseError`] carrying
//! the line of the offending token.

mod items;

use crate::lexer::Token;
use crate::parser::sink::Sink;
use crate::parser::{ParseError, Parser};

/// Parse a whole file: a sequence of data blocks.
pub fn root<S: Sink>(p: &mut Parser<'_, S>) -> Result<(), ParseError> {
    loop {
        match p.next()? {
            Token::Eof => return Ok(()),
            Token::DataBlock(name) => {
                p.sink().begin_block(name);
                datablock(p)?;
            }
            other => return Err(p.unexpected("a data_ block header", &other)),
        }
    }
}

/// The body of a data block, up to the next header or the end of input.
fn datablock<S: Sink>(p: &mut Parser<'_, S>) -> Result<(), ParseError> {
    let mut current = None;
    loop {
        let token = p.next()?;
        match token {
            Token::Eof | Token::DataBlock(_) => {
                p.push_back(token);
                return Ok(());
            }
            Token::Loop => {
                items::loop_(p)?;
                current = None;
            }
            Token::Tag(tag) => items::tag_value(p, tag, &mut current)?,
            Token::SaveFrame(name) if p.options().save_frames => {
                if name.is_empty() {
                    return Err(p.grammar_error("save_ without an open save frame"));
                }
                save_frame(p, name)?;
                current = None;
            }
            Token::SaveFrame(_) => {
                return Err(p.grammar_error("save frames are only allowed in dictionary files"));
            }
            Token::Global | Token::Stop => {
                return Err(p.grammar_error(format!("{} is not supported", token.describe())));
            }
            Token::Value(_) => return Err(p.unexpected("a tag or loop_", &token)),
        }
    }
}

/// A save frame; the opening `save_NAME` has been consumed.
fn save_frame<S: Sink>(p: &mut Parser<'_, S>, name: &str) -> Result<(), ParseError> {
    p.sink().begin_save_frame(name);

    let mut current = None;
    loop {
        let token = p.next()?;
        match token {
            Token::SaveFrame("") => {
                p.sink().end_save_frame();
                return Ok(());
            }
            Token::SaveFrame(_) => {
                return Err(p.grammar_error(format!("save frame inside save frame '{name}'")));
            }
            Token::Eof | Token::DataBlock(_) => {
                return Err(p.grammar_error(format!("unterminated save frame '{name}'")));
            }
            Token::Loop => {
                items::loop_(p)?;
                current = None;
            }
            Token::Tag(tag) => items::tag_value(p, tag, &mut current)?,
            Token::Global | Token::Stop => {
                return Err(p.grammar_error(format!("{} is not supported", token.describe())));
            }
            Token::Value(_) => return Err(p.unexpected("a tag or loop_", &token)),
        }
    }
}
