use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use crate::builder::DocumentBuilder;
use crate::dictionary::Dictionary;
use crate::error::CifError;
use crate::models::Datablock;
use crate::validation::{ValidationOptions, ValidationReport};
use crate::writer::{self, WriteOptions};

/// A CIF file: an ordered list of uniquely named data blocks.
///
/// ```
/// use cifkit_engine::Document;
///
/// let doc = Document::parse("data_1ABC\n_entry.id 1ABC\n").unwrap();
/// assert_eq!(doc.first_block().unwrap().first_value("_entry.id"), Some("1ABC"));
/// ```
#[derive(Debug, Default)]
pub struct Document {
    blocks: Vec<Datablock>,
    dictionary: Option<Arc<Dictionary>>,
    options: ValidationOptions,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ValidationOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Parse a data file. No dictionary is attached.
    pub fn parse(source: &str) -> Result<Self, CifError> {
        let builder = cifkit_syntax::parse(source, DocumentBuilder::default())?;
        let document = builder.into_document();
        log::debug!("parsed {} data block(s)", document.len());
        Ok(document)
    }

    pub fn load<R: Read>(mut reader: R) -> Result<Self, CifError> {
        let mut source = String::new();
        reader.read_to_string(&mut source)?;
        Self::parse(&source)
    }

    /// Parse a data file and attach `dictionary`.
    ///
    /// In strict mode a document with violations is an error carrying the
    /// report; in lenient mode the report is returned alongside the document.
    pub fn parse_validated(
        source: &str,
        dictionary: Arc<Dictionary>,
        options: ValidationOptions,
    ) -> Result<(Self, ValidationReport), CifError> {
        let mut document = Self::parse(source)?;
        document.set_options(options);
        let report = document.set_dictionary(dictionary);
        if options.is_strict() && !report.is_valid() {
            return Err(CifError::Invalid(report));
        }
        Ok((document, report))
    }

    pub fn options(&self) -> ValidationOptions {
        self.options
    }

    pub fn set_options(&mut self, options: ValidationOptions) {
        self.options = options;
        for block in &mut self.blocks {
            block.set_options(options);
        }
    }

    // --- blocks ---

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Datablock> {
        self.blocks.iter()
    }

    pub fn blocks_mut(&mut self) -> impl Iterator<Item = &mut Datablock> {
        self.blocks.iter_mut()
    }

    fn block_position(&self, name: &str) -> Option<usize> {
        self.blocks
            .iter()
            .position(|b| b.name().eq_ignore_ascii_case(name))
    }

    pub fn block(&self, name: &str) -> Option<&Datablock> {
        self.block_position(name).map(|i| &self.blocks[i])
    }

    pub fn block_mut(&mut self, name: &str) -> Option<&mut Datablock> {
        self.block_position(name).map(move |i| &mut self.blocks[i])
    }

    pub fn first_block(&self) -> Option<&Datablock> {
        self.blocks.first()
    }

    pub fn first_block_mut(&mut self) -> Option<&mut Datablock> {
        self.blocks.first_mut()
    }

    /// Add a block; its name must not be taken yet.
    pub fn push_block(&mut self, mut block: Datablock) -> Result<&mut Datablock, CifError> {
        if self.block_position(block.name()).is_some() {
            return Err(CifError::DuplicateBlock(block.name().to_string()));
        }
        block.set_options(self.options);
        if let Some(dictionary) = &self.dictionary {
            block.set_dictionary(dictionary, &mut ValidationReport::new());
        }
        self.blocks.push(block);
        let last = self.blocks.len() - 1;
        Ok(&mut self.blocks[last])
    }

    /// The block `name`, created empty when it does not exist yet.
    pub fn block_or_insert(&mut self, name: &str) -> &mut Datablock {
        let i = match self.block_position(name) {
            Some(i) => i,
            None => {
                let mut block = Datablock::new(name);
                block.set_options(self.options);
                if let Some(dictionary) = &self.dictionary {
                    block.set_dictionary(dictionary, &mut ValidationReport::new());
                }
                self.blocks.push(block);
                self.blocks.len() - 1
            }
        };
        &mut self.blocks[i]
    }

    pub fn remove_block(&mut self, name: &str) -> Option<Datablock> {
        self.block_position(name).map(|i| self.blocks.remove(i))
    }

    // --- dictionary ---

    pub fn dictionary(&self) -> Option<&Arc<Dictionary>> {
        self.dictionary.as_ref()
    }

    /// Attach `dictionary` to every block, rebuild the category indexes and
    /// validate the document.
    pub fn set_dictionary(&mut self, dictionary: Arc<Dictionary>) -> ValidationReport {
        let mut report = ValidationReport::new();
        for block in &mut self.blocks {
            block.set_dictionary(&dictionary, &mut report);
        }
        self.dictionary = Some(dictionary);
        report.extend(self.validate());

        if !report.is_valid() {
            log::info!("document has {} schema violation(s)", report.len());
        }
        report
    }

    pub fn clear_dictionary(&mut self) {
        self.dictionary = None;
        for block in &mut self.blocks {
            block.clear_dictionary();
        }
    }

    /// Validate all blocks against the attached dictionary. Without a
    /// dictionary the report is empty.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        for block in &self.blocks {
            block.validate(&mut report);
        }
        report
    }

    // --- output ---

    pub fn to_cif(&self, options: &WriteOptions) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            writer::write_block(&mut out, block, options);
        }
        out
    }

    pub fn write<W: Write>(&self, mut out: W, options: &WriteOptions) -> Result<(), CifError> {
        out.write_all(self.to_cif(options).as_bytes())?;
        Ok(())
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cif(&WriteOptions::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationOptions;
    use crate::value::Item;
    use pretty_assertions::assert_eq;

    const DICT: &str = include_str!("../../tests/fixtures/test.dic");

    fn dictionary() -> Arc<Dictionary> {
        Arc::new(Dictionary::parse(DICT).unwrap())
    }

    #[test]
    fn blocks_are_unique() {
        let mut doc = Document::new();
        doc.block_or_insert("one");
        doc.block_or_insert("ONE");
        assert_eq!(doc.len(), 1);
        assert!(matches!(
            doc.push_block(Datablock::new("One")),
            Err(CifError::DuplicateBlock(_))
        ));
        assert!(doc.push_block(Datablock::new("two")).is_ok());
        assert_eq!(doc.blocks().map(|b| b.name()).collect::<Vec<_>>(), vec!["one", "two"]);
    }

    #[test]
    fn load_from_reader() {
        let doc = Document::load("data_x\n_a.b c\n".as_bytes()).unwrap();
        assert_eq!(doc.block("X").unwrap().first_value("_a.b"), Some("c"));
    }

    #[test]
    fn parse_errors_carry_the_line() {
        let err = Document::parse("data_x\n_a.b 'open\n").unwrap_err();
        assert!(matches!(err, CifError::Parse(ref e) if e.line() == 2));
    }

    #[test]
    fn set_dictionary_reports_violations() {
        let mut doc = Document::parse("data_x\n_cat_1.id 1\n_cat_1.name 'two words'\n").unwrap();
        let report = doc.set_dictionary(dictionary());
        let messages: Vec<_> = report.iter().map(|v| v.to_string()).collect();
        assert_eq!(messages, vec!["_cat_1.name: value 'two words' does not match type code"]);
    }

    #[test]
    fn strict_parse_fails_on_violations() {
        let source = "data_x\n_cat_1.id x\n_cat_1.name a\n";
        let err = Document::parse_validated(source, dictionary(), ValidationOptions::strict())
            .unwrap_err();
        assert!(matches!(err, CifError::Invalid(ref r) if r.len() == 1));

        let (doc, report) =
            Document::parse_validated(source, dictionary(), ValidationOptions::default()).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(doc.first_block().unwrap().first_value("_cat_1.id"), Some("x"));
    }

    #[test]
    fn new_blocks_pick_up_the_dictionary() {
        let mut doc = Document::with_options(ValidationOptions::strict());
        doc.set_dictionary(dictionary());
        let block = doc.block_or_insert("x");
        let cat = block.category_or_insert("cat_1");
        assert!(cat.insert([Item::new("id", "x"), Item::new("name", "a")]).is_err());
        assert!(cat.insert([Item::new("id", 1), Item::new("name", "a")]).is_ok());
    }
}
