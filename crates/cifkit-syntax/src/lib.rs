//! # cifkit-syntax
//!
//! A streaming tokenizer and parser for CIF 1.1 / STAR files, including the
//! mmCIF data files and DDL2 dictionaries used in structural biology. Built
//! on [Logos] for the raw token layer.
//!
//! [Logos]: https://docs.rs/logos
//!
//! ## Architecture Overview
//!
//! The parsing pipeline has three stages:
//!
//! ```text
//! Source Text → Lexer → Tokens → Parser → Sink calls
//!               (Logos)          (Grammar)  (document store, dictionary reader, ...)
//! ```
//!
//! ### 1. Lexer ([`lexer`] module)
//!
//! The lexer splits input into CIF tokens: block headers, reserved words,
//! tags and values. Values carry a [`ValueKind`] (number, quoted string,
//! text field, `.` or `?`) and their text with delimiters removed.
//!
//! ```text
//! "_cell.length_a 50.0(2)\n" → [Tag("_cell.length_a"), Value(Float, "50.0(2)")]
//! ```
//!
//! ### 2. Parser ([`parser`] module)
//!
//! The parser consumes tokens with one token of lookahead and recognises data
//! blocks, save frames, loops and tag/value pairs. Grammar rules live in
//! `parser::grammar`.
//!
//! ### 3. Sink ([`parser::sink`] module)
//!
//! The parser reports structure as calls on a [`Sink`]. This crate stores
//! nothing; a document store or dictionary reader implements `Sink` to build
//! whatever it needs. [`EventLog`] records the calls as [`Event`]s.
//!
//! ## Module Structure
//!
//! ```text
//! cifkit-syntax/
//! ├── lib.rs           # This file - public API and integration tests
//! ├── charclass.rs     # Character classes of the CIF grammar
//! ├── lexer.rs         # Logos-based tokenizer and value classification
//! └── parser/
//!     ├── mod.rs       # Parser struct, errors, public parse() functions
//!     ├── event.rs     # Event enum
//!     ├── sink.rs      # Sink trait and EventLog
//!     └── grammar/
//!         ├── mod.rs   # Files, data blocks, save frames
//!         └── items.rs # Loops and tag/value pairs
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use cifkit_syntax::{parse, Event, EventLog};
//!
//! let log = parse("data_1ABC\nloop_\n_atom_type.symbol\nC\nN\n", EventLog::new()).unwrap();
//!
//! let rows = log.events.iter().filter(|e| **e == Event::BeginRow).count();
//! assert_eq!(rows, 2);
//! ```

pub mod charclass;
pub mod lexer;
pub mod parser;

pub use lexer::{LexError, Token, Tokenizer, Value, ValueKind, classify_value};
pub use parser::event::Event;
pub use parser::sink::{EventLog, Sink};
pub use parser::{ParseError, ParseOptions, Parser, parse, parse_with_options, split_tag};
