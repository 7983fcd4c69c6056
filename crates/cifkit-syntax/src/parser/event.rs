//! # Parser Events
//!
//! Events are the boundary between parsing and storage. The parser never
//! builds a document itself; it reports what it sees to a
//! [`Sink`](super::sink::Sink), one call per event:
//!
//! ```text
//! data_1ABC                  BeginBlock("1ABC")
//! loop_
//! _atom_type.symbol          BeginCategory("atom_type")
//! C                          BeginRow, Item("symbol", "C")
//! N                          BeginRow, Item("symbol", "N")
//! _entry.id 1ABC             BeginCategory("entry"), BeginRow, Item("id", "1ABC")
//! ```
//!
//! Save frames (dictionary mode only) are bracketed by `BeginSaveFrame` and
//! `EndSaveFrame`; the category events in between belong to the frame.
//!
//! [`Event`] is the owned form of these calls. The parser itself calls the
//! [`Sink`](super::sink::Sink) methods directly; [`EventLog`](super::sink::EventLog)
//! records them as `Event`s, which is what the tests compare against.

use crate::lexer::ValueKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    BeginBlock(String),
    BeginSaveFrame(String),
    EndSaveFrame,
    BeginCategory(String),
    BeginRow,
    Item {
        name: String,
        kind: ValueKind,
        value: String,
    },
}

impl Event {
    /// Create an item event.
    pub fn item(name: &str, kind: ValueKind, value: &str) -> Self {
        Event::Item {
            name: name.to_string(),
            kind,
            value: value.to_string(),
        }
    }
}
