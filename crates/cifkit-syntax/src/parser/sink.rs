//! The callback contract between the parser and whatever stores the data.

use crate::lexer::Value;
use crate::parser::event::Event;

/// Receives the structure of a CIF file as the parser walks it.
///
/// The document store implements this to build data blocks, categories and
/// rows; the dictionary reader implements it to collect schema definitions
/// from save frames. The parser guarantees that `item` is only called after
/// `begin_row`, and `begin_row` only after `begin_category`.
pub trait Sink {
    fn begin_block(&mut self, name: &str);

    /// Open (or reopen) the category `name` in the current block or save frame.
    fn begin_category(&mut self, name: &str);

    /// Start a new, empty row in the current category.
    fn begin_row(&mut self);

    /// Assign `value` to the column `name` of the current row.
    fn item(&mut self, name: &str, value: Value<'_>);

    /// Only called when save frames are enabled in the parse options.
    fn begin_save_frame(&mut self, _name: &str) {}

    fn end_save_frame(&mut self) {}
}

/// A sink that records every call as an [`Event`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventLog {
    pub events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sink for EventLog {
    fn begin_block(&mut self, name: &str) {
        self.events.push(Event::BeginBlock(name.to_string()));
    }

    fn begin_category(&mut self, name: &str) {
        self.events.push(Event::BeginCategory(name.to_string()));
    }

    fn begin_row(&mut self) {
        self.events.push(Event::BeginRow);
    }

    fn item(&mut self, name: &str, value: Value<'_>) {
        self.events.push(Event::item(name, value.kind, &value.text));
    }

    fn begin_save_frame(&mut self, name: &str) {
        self.events.push(Event::BeginSaveFrame(name.to_string()));
    }

    fn end_save_frame(&mut self) {
        self.events.push(Event::EndSaveFrame);
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn begin_block(&mut self, name: &str) {
        (**self).begin_block(name);
    }

    fn begin_category(&mut self, name: &str) {
        (**self).begin_category(name);
    }

    fn begin_row(&mut self) {
        (**self).begin_row();
    }

    fn item(&mut self, name: &str, value: Value<'_>) {
        (**self).item(name, value);
    }

    fn begin_save_frame(&mut self, name: &str) {
        (**self).begin_save_frame(name);
    }

    fn end_save_frame(&mut self) {
        (**self).end_save_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::ValueKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn event_log_records_calls_in_order() {
        let mut log = EventLog::new();
        log.begin_block("x");
        log.begin_category("entry");
        log.begin_row();
        log.item("id", Value::new(ValueKind::String, "x"));

        assert_eq!(
            log.events,
            vec![
                Event::BeginBlock("x".into()),
                Event::BeginCategory("entry".into()),
                Event::BeginRow,
                Event::item("id", ValueKind::String, "x"),
            ]
        );
    }

    #[test]
    fn mutable_reference_forwards() {
        fn drive(mut sink: impl Sink) {
            sink.begin_save_frame("frame");
            sink.end_save_frame();
        }

        let mut log = EventLog::new();
        drive(&mut log);
        assert_eq!(
            log.events,
            vec![Event::BeginSaveFrame("frame".into()), Event::EndSaveFrame]
        );
    }
}
