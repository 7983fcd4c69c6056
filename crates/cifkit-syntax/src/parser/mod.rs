//! # Parser - Driving the Grammar
//!
//! This module turns the token stream from the [`lexer`](crate::lexer) into
//! calls on a [`Sink`]. The parser keeps no document state of its own: the
//! only things it remembers are the one token of lookahead and, inside the
//! grammar functions, which category the previous tag belonged to.
//!
//! ## Grammar
//!
//! ```text
//! file       := data_block*
//! data_block := data_NAME (loop | tag value | save_frame)*
//! loop       := loop_ tag+ value*          (values consumed round-robin)
//! save_frame := save_NAME (loop | tag value)* save_
//! ```
//!
//! A bare `tag value` pair opens a new row when its category differs from the
//! category of the previous pair, so consecutive pairs of one category form a
//! single row. Save frames are only accepted when
//! [`ParseOptions::save_frames`] is set, which is how dictionaries are read.
//!
//! ## Public API
//!
//! ```
//! use cifkit_syntax::{parse, Event, EventLog, ValueKind};
//!
//! let log = parse("data_x\n_entry.id x\n", EventLog::new()).unwrap();
//! assert_eq!(log.events[0], Event::BeginBlock("x".into()));
//! assert_eq!(log.events[3], Event::item("id", ValueKind::String, "x"));
//! ```

pub mod event;
pub mod sink;

mod grammar;

use thiserror::Error;

use crate::lexer::{LexError, Token, Tokenizer};
use sink::Sink;

/// Everything that can stop a parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("line {line}: expected {expected}, found {found}")]
    Unexpected {
        line: usize,
        expected: String,
        found: String,
    },

    #[error("line {line}: {message}")]
    Grammar { line: usize, message: String },
}

impl ParseError {
    /// The 1-based line the error was detected on.
    pub fn line(&self) -> usize {
        match self {
            ParseError::Lex(err) => err.line,
            ParseError::Unexpected { line, .. } | ParseError::Grammar { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Accept `save_` frames, as used by dictionary files.
    pub save_frames: bool,
}

impl ParseOptions {
    /// Options for reading dictionary files.
    pub fn dictionary() -> Self {
        Self { save_frames: true }
    }
}

/// The parser state: tokenizer, one token of lookahead and the sink.
pub struct Parser<'a, S> {
    tokens: Tokenizer<'a>,
    lookahead: Option<(Token<'a>, usize)>,
    line: usize,
    sink: S,
    options: ParseOptions,
}

impl<'a, S: Sink> Parser<'a, S> {
    pub fn new(source: &'a str, sink: S, options: ParseOptions) -> Self {
        Self {
            tokens: Tokenizer::new(source),
            lookahead: None,
            line: 1,
            sink,
            options,
        }
    }

    /// Parse the whole input and hand the sink back.
    pub fn parse(mut self) -> Result<S, ParseError> {
        grammar::root(&mut self)?;
        Ok(self.sink)
    }

    /// Take the next token.
    pub fn next(&mut self) -> Result<Token<'a>, ParseError> {
        if let Some((token, line)) = self.lookahead.take() {
            self.line = line;
            return Ok(token);
        }
        let token = self.tokens.next_token()?;
        self.line = self.tokens.line();
        Ok(token)
    }

    /// Return a token taken with [`next`](Self::next) so it is seen again.
    pub fn push_back(&mut self, token: Token<'a>) {
        debug_assert!(self.lookahead.is_none(), "only one token of lookahead");
        self.lookahead = Some((token, self.line));
    }

    /// Line of the most recently taken token.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn options(&self) -> ParseOptions {
        self.options
    }

    pub fn sink(&mut self) -> &mut S {
        &mut self.sink
    }

    fn unexpected(&self, expected: &str, found: &Token<'_>) -> ParseError {
        ParseError::Unexpected {
            line: self.line,
            expected: expected.to_string(),
            found: found.describe(),
        }
    }

    fn grammar_error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Grammar {
            line: self.line,
            message: message.into(),
        }
    }
}

/// Split a tag into its category and item names.
///
/// `_atom_site.id` gives `("atom_site", "id")`. A tag without a `.` belongs
/// to the unnamed category: `_cell_length_a` gives `("", "cell_length_a")`.
pub fn split_tag(tag: &str) -> (&str, &str) {
    let tag = tag.strip_prefix('_').unwrap_or(tag);
    match tag.split_once('.') {
        Some((category, item)) => (category, item),
        None => ("", tag),
    }
}

/// Parse data file source into `sink`.
pub fn parse<S: Sink>(source: &str, sink: S) -> Result<S, ParseError> {
    parse_with_options(source, sink, ParseOptions::default())
}

pub fn parse_with_options<S: Sink>(
    source: &str,
    sink: S,
    options: ParseOptions,
) -> Result<S, ParseError> {
    Parser::new(source, sink, options).parse()
}
