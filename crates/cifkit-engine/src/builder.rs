//! Sinks that turn parser callbacks into [`Datablock`]s.

use cifkit_syntax::{Sink, Value};

use crate::models::{Datablock, Document, RowId};

/// The open category and row of the block being filled.
#[derive(Debug, Default)]
pub(crate) struct BlockCursor {
    category: Option<usize>,
    row: Option<RowId>,
}

impl BlockCursor {
    pub fn reset(&mut self) {
        self.category = None;
        self.row = None;
    }

    pub fn begin_category(&mut self, block: &mut Datablock, name: &str) {
        block.category_or_insert(name);
        self.category = block.category_position(name);
        self.row = None;
    }

    pub fn begin_row(&mut self, block: &mut Datablock) {
        if let Some(i) = self.category {
            self.row = Some(block.category_at_mut(i).push_row_raw());
        }
    }

    pub fn item(&mut self, block: &mut Datablock, name: &str, value: Value<'_>) {
        if self.row.is_none() {
            self.begin_row(block);
        }
        if let (Some(i), Some(row)) = (self.category, self.row) {
            block
                .category_at_mut(i)
                .set_raw(row, name, value.text.into_owned());
        }
    }
}

/// Builds a [`Document`] from a data file.
#[derive(Debug, Default)]
pub(crate) struct DocumentBuilder {
    pub blocks: Vec<Datablock>,
    cursor: BlockCursor,
}

impl DocumentBuilder {
    pub fn into_document(self) -> Document {
        let mut document = Document::new();
        for block in self.blocks {
            if let Err(err) = document.push_block(block) {
                log::warn!("{err}, later block dropped");
            }
        }
        document
    }
}

impl Sink for DocumentBuilder {
    fn begin_block(&mut self, name: &str) {
        self.blocks.push(Datablock::new(name));
        self.cursor.reset();
    }

    fn begin_category(&mut self, name: &str) {
        if let Some(block) = self.blocks.last_mut() {
            self.cursor.begin_category(block, name);
        }
    }

    fn begin_row(&mut self) {
        if let Some(block) = self.blocks.last_mut() {
            self.cursor.begin_row(block);
        }
    }

    fn item(&mut self, name: &str, value: Value<'_>) {
        if let Some(block) = self.blocks.last_mut() {
            self.cursor.item(block, name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cifkit_syntax::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn builds_blocks_categories_and_rows() {
        let source = "data_a\n_x.id 1\n_x.name aap\nloop_\n_y.id\n_y.v\n1 a\n2 b\ndata_b\n_x.id 9\n";
        let builder = parse(source, DocumentBuilder::default()).unwrap();
        assert_eq!(builder.blocks.len(), 2);

        let a = &builder.blocks[0];
        assert_eq!(a.category("x").unwrap().len(), 1);
        let y: Vec<_> = a
            .category("y")
            .unwrap()
            .rows()
            .map(|r| format!("{}{}", r.get("id"), r.get("v")))
            .collect();
        assert_eq!(y, vec!["1a", "2b"]);
        assert_eq!(builder.blocks[1].first_value("_x.id"), Some("9"));
    }

    #[test]
    fn reopened_category_appends_rows() {
        let source = "data_a\n_x.id 1\n_y.id 2\n_x.id 3\n";
        let builder = parse(source, DocumentBuilder::default()).unwrap();
        assert_eq!(builder.blocks[0].category("x").unwrap().len(), 2);
    }

    #[test]
    fn duplicate_block_names_keep_first() {
        let source = "data_a\n_x.id 1\ndata_A\n_x.id 2\n";
        let document = parse(source, DocumentBuilder::default())
            .unwrap()
            .into_document();
        assert_eq!(document.len(), 1);
        assert_eq!(document.first_block().unwrap().first_value("_x.id"), Some("1"));
    }
}
