//! # Lexer - Tokenizing CIF Source
//!
//! This module provides the first stage of parsing: breaking source text into
//! CIF tokens. It works in two layers.
//!
//! ## 1. Raw tokens ([Logos])
//!
//! [`RawToken`] is a Logos-derived enum that splits the input into coarse,
//! context-free pieces: newlines, comments, the two quote characters, the
//! semicolon and runs of non-blank characters ("words"). Horizontal
//! whitespace is skipped by Logos itself.
//!
//! [Logos]: https://docs.rs/logos
//!
//! ## 2. CIF tokens ([`Tokenizer`])
//!
//! Several CIF rules depend on context a regular lexer cannot see:
//!
//! - a quoted string only ends at a quote that is followed by whitespace,
//!   so `'it's'` is the single value `it's`
//! - a `;` only opens a text field when it is the first character of a line;
//!   anywhere else it is just the first character of a bare value
//! - a word is a tag, a reserved word or a value depending on its prefix
//!
//! The [`Tokenizer`] wraps the Logos lexer and handles these by scanning
//! [`logos::Lexer::remainder`] and extending the current token with
//! [`logos::Lexer::bump`]. It also keeps the 1-based line number used in
//! [`LexError`]s.
//!
//! ## Value classification
//!
//! Values are further classified into a [`ValueKind`]. Numbers are
//! recognised by a small state machine ([`classify_value`]) that tries the
//! most specific reading first and falls back to looser ones: a word that
//! looks numeric up to some point and then turns out not to be is retracted
//! and read as a plain string, without rescanning the source.

use std::borrow::Cow;

use logos::Logos;
use thiserror::Error;

use crate::charclass;

/// A malformed token, always carrying the 1-based line it started on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

/// Coarse token kinds produced by the Logos lexer.
///
/// Spaces, tabs, carriage returns and form feeds are skipped; every other
/// byte of the input starts one of these tokens.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f]+")]
pub enum RawToken {
    #[token("\n")]
    Newline,

    /// `#` up to the end of the line
    #[regex(r"#[^\n]*")]
    Comment,

    #[token("'")]
    SingleQuote,

    #[token("\"")]
    DoubleQuote,

    /// `;`, a text field delimiter at line start and an ordinary character elsewhere
    #[token(";")]
    Semicolon,

    /// A run of non-blank characters not starting with a quote, `#` or `;`
    #[regex(r#"[^ \t\r\f\n#'";][^ \t\r\f\n]*"#)]
    Word,
}

/// The sub-kind of a value token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Float,
    /// An unquoted value that is not a number
    String,
    /// A single or double quoted string
    Quoted,
    /// A multi-line `;` delimited text field
    TextField,
    /// `.`
    Inapplicable,
    /// `?`
    Unknown,
}

/// A value token: its sub-kind and its text with quotes or delimiters removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value<'a> {
    pub kind: ValueKind,
    pub text: Cow<'a, str>,
}

impl<'a> Value<'a> {
    pub fn new(kind: ValueKind, text: impl Into<Cow<'a, str>>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// `.` or `?`
    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, ValueKind::Inapplicable | ValueKind::Unknown)
    }
}

/// A CIF token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// `data_NAME`, holding `NAME`
    DataBlock(&'a str),
    /// `save_NAME`, holding `NAME`; an empty name closes a save frame
    SaveFrame(&'a str),
    Loop,
    Global,
    Stop,
    /// `_category.item`, including the leading underscore
    Tag(&'a str),
    Value(Value<'a>),
    Eof,
}

impl Token<'_> {
    /// A short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::DataBlock(name) => format!("data_{name}"),
            Token::SaveFrame(name) => format!("save_{name}"),
            Token::Loop => "loop_".to_string(),
            Token::Global => "global_".to_string(),
            Token::Stop => "stop_".to_string(),
            Token::Tag(tag) => format!("tag {tag}"),
            Token::Value(value) => format!("value '{}'", value.text),
            Token::Eof => "end of input".to_string(),
        }
    }
}

/// Turns CIF source text into [`Token`]s.
pub struct Tokenizer<'a> {
    source: &'a str,
    lexer: logos::Lexer<'a, RawToken>,
    /// Line of the lexer position
    line: usize,
    /// Line on which the most recent token started
    token_line: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        // A leading byte order mark is not part of the content.
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        Self {
            source,
            lexer: RawToken::lexer(source),
            line: 1,
            token_line: 1,
        }
    }

    /// The 1-based line on which the most recently returned token started.
    pub fn line(&self) -> usize {
        self.token_line
    }

    /// Produce the next token, or [`Token::Eof`] at the end of input.
    pub fn next_token(&mut self) -> Result<Token<'a>, LexError> {
        loop {
            let Some(raw) = self.lexer.next() else {
                self.token_line = self.line;
                return Ok(Token::Eof);
            };

            self.token_line = self.line;
            let start = self.lexer.span().start;

            match raw {
                Ok(RawToken::Newline) => self.line += 1,
                Ok(RawToken::Comment) => {}
                Ok(RawToken::SingleQuote) => return self.quoted(b'\''),
                Ok(RawToken::DoubleQuote) => return self.quoted(b'"'),
                Ok(RawToken::Semicolon) if self.at_line_start(start) => return self.text_field(),
                Ok(RawToken::Semicolon) => {
                    // Mid-line `;` is just the first character of a bare value.
                    let rest = self.lexer.remainder();
                    let len = rest
                        .bytes()
                        .position(charclass::is_white)
                        .unwrap_or(rest.len());
                    self.lexer.bump(len);
                    let text = &self.source[start..self.lexer.span().end];
                    return self.value(text);
                }
                Ok(RawToken::Word) => {
                    let text = self.lexer.slice();
                    return self.word(text);
                }
                Err(()) => {
                    return Err(self.error(format!(
                        "unexpected character {:?}",
                        self.lexer.slice()
                    )));
                }
            }
        }
    }

    fn at_line_start(&self, offset: usize) -> bool {
        offset == 0 || self.source.as_bytes()[offset - 1] == b'\n'
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            line: self.token_line,
            message: message.into(),
        }
    }

    fn word(&mut self, text: &'a str) -> Result<Token<'a>, LexError> {
        if text.starts_with('_') {
            self.check_controls(text)?;
            return Ok(Token::Tag(text));
        }

        if let Some(prefix) = text.get(..5) {
            if prefix.eq_ignore_ascii_case("data_") {
                let name = &text[5..];
                if name.is_empty() {
                    return Err(self.error("data block header without a name"));
                }
                return Ok(Token::DataBlock(name));
            }
            if prefix.eq_ignore_ascii_case("save_") {
                return Ok(Token::SaveFrame(&text[5..]));
            }
        }

        if text.eq_ignore_ascii_case("loop_") {
            Ok(Token::Loop)
        } else if text.eq_ignore_ascii_case("global_") {
            Ok(Token::Global)
        } else if text.eq_ignore_ascii_case("stop_") {
            Ok(Token::Stop)
        } else {
            self.value(text)
        }
    }

    fn value(&self, text: &'a str) -> Result<Token<'a>, LexError> {
        self.check_controls(text)?;
        Ok(Token::Value(Value::new(classify_value(text), text)))
    }

    fn check_controls(&self, text: &str) -> Result<(), LexError> {
        match text.bytes().find(|&b| charclass::is_control(b)) {
            Some(b) => Err(self.error(format!("unexpected control character {b:#04x}"))),
            None => Ok(()),
        }
    }

    /// Scan a quoted string. The opening quote has been consumed; the string
    /// ends at the first matching quote followed by whitespace or end of input
    /// and may not span lines.
    fn quoted(&mut self, quote: u8) -> Result<Token<'a>, LexError> {
        let rest = self.lexer.remainder();
        let bytes = rest.as_bytes();

        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if b == b'\n' {
                break;
            }
            if b == quote && bytes.get(i + 1).is_none_or(|&next| charclass::is_white(next)) {
                let text = &rest[..i];
                self.lexer.bump(i + 1);
                self.check_controls(text)?;
                return Ok(Token::Value(Value::new(ValueKind::Quoted, text)));
            }
            i += 1;
        }

        Err(self.error(format!(
            "unterminated quoted string, missing closing {}",
            quote as char
        )))
    }

    /// Scan a text field. The opening `;` at line start has been consumed; the
    /// field ends at the next line starting with `;`.
    ///
    /// A single line break directly after the opening `;` is not part of the
    /// value. Control characters are replaced and logged rather than rejected,
    /// so that damaged files can still be read.
    fn text_field(&mut self) -> Result<Token<'a>, LexError> {
        let rest = self.lexer.remainder();

        let Some(end) = rest.find("\n;") else {
            return Err(self.error("unterminated text field"));
        };

        self.lexer.bump(end + 2);
        self.line += rest[..end].bytes().filter(|&b| b == b'\n').count() + 1;

        let mut text = &rest[..end];
        text = text.strip_suffix('\r').unwrap_or(text);
        text = text
            .strip_prefix("\r\n")
            .or_else(|| text.strip_prefix('\n'))
            .unwrap_or(text);

        let value = if text.bytes().any(charclass::is_control) {
            log::warn!(
                "line {}: text field contains control characters, replacing them",
                self.token_line
            );
            Cow::Owned(
                text.chars()
                    .map(|c| {
                        if c.is_ascii() && charclass::is_control(c as u8) {
                            char::REPLACEMENT_CHARACTER
                        } else {
                            c
                        }
                    })
                    .collect(),
            )
        } else {
            Cow::Borrowed(text)
        };

        Ok(Token::Value(Value::new(ValueKind::TextField, value)))
    }
}

/// States of the numeric recogniser used by [`classify_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberState {
    Start,
    Sign,
    Integer,
    /// `.` with no digits before it
    LeadingDot,
    /// digits followed by `.`
    IntegerDot,
    Fraction,
    ExponentMark,
    ExponentSign,
    Exponent,
    /// `(` of a standard uncertainty suffix
    UncertaintyOpen,
    UncertaintyDigits,
    UncertaintyClose,
    /// Not a number
    Rejected,
}

impl NumberState {
    fn step(self, c: u8) -> NumberState {
        use NumberState::*;
        match (self, c) {
            (Start, b'+' | b'-') => Sign,
            (Start | Sign, b'0'..=b'9') => Integer,
            (Start | Sign, b'.') => LeadingDot,
            (Integer, b'0'..=b'9') => Integer,
            (Integer, b'.') => IntegerDot,
            (Integer | IntegerDot | Fraction, b'e' | b'E') => ExponentMark,
            (Integer | IntegerDot | Fraction | Exponent, b'(') => UncertaintyOpen,
            (IntegerDot | LeadingDot | Fraction, b'0'..=b'9') => Fraction,
            (ExponentMark, b'+' | b'-') => ExponentSign,
            (ExponentMark | ExponentSign | Exponent, b'0'..=b'9') => Exponent,
            (UncertaintyOpen | UncertaintyDigits, b'0'..=b'9') => UncertaintyDigits,
            (UncertaintyDigits, b')') => UncertaintyClose,
            _ => Rejected,
        }
    }
}

/// Classify the text of an unquoted value.
///
/// The recogniser reads as far as the text still looks like a float; if it
/// ends in a non-accepting state the classification falls back to integer
/// and finally to a plain string.
pub fn classify_value(text: &str) -> ValueKind {
    match text {
        "." => return ValueKind::Inapplicable,
        "?" => return ValueKind::Unknown,
        _ => {}
    }

    let mut state = NumberState::Start;
    for &c in text.as_bytes() {
        state = state.step(c);
        if state == NumberState::Rejected {
            break;
        }
    }

    match state {
        NumberState::Integer => ValueKind::Int,
        NumberState::IntegerDot
        | NumberState::Fraction
        | NumberState::Exponent
        | NumberState::UncertaintyClose => ValueKind::Float,
        _ => ValueKind::String,
    }
}

/// Tokenize the whole input, stopping at the first error.
pub fn lex(source: &str) -> Result<Vec<Token<'_>>, LexError> {
    let mut tokenizer = Tokenizer::new(source);
    let mut tokens = Vec::new();
    loop {
        match tokenizer.next_token()? {
            Token::Eof => return Ok(tokens),
            token => tokens.push(token),
        }
    }
}
