//! # cifkit-engine
//!
//! In-memory store for CIF and mmCIF files: parse a file into a
//! [`Document`], attach a [`Dictionary`] to validate and index it, query
//! rows with [`Condition`]s, edit it with link-aware cascades and write it
//! back out.
//!
//! ```
//! use cifkit_engine::{Document, Item, key};
//!
//! let mut doc = Document::parse("data_x\nloop_\n_atom.id\n_atom.name\n1 N\n2 CA\n").unwrap();
//! let block = doc.first_block_mut().unwrap();
//! let atoms = block.category_or_insert("atom");
//! atoms.insert([Item::new("id", 3), Item::new("name", "C")]).unwrap();
//!
//! let ca = atoms.find_first(&key("name").eq("CA")).unwrap();
//! assert_eq!(ca.get("id"), "2");
//! assert_eq!(atoms.count(&key("id").gt(1)), 2);
//! ```
//!
//! ## Modules
//!
//! - [`models`]: documents, blocks, categories and row handles
//! - [`dictionary`]: DDL2 dictionaries and the validators built from them
//! - [`index`]: the ordered key index of a category
//! - [`condition`]: row predicates and result sets
//! - [`writer`]: CIF output
//! - [`io`]: file helpers

mod builder;
pub mod condition;
pub mod dictionary;
pub mod error;
pub mod index;
pub mod io;
pub mod models;
pub mod validation;
pub mod value;
pub mod writer;

pub use condition::{Condition, RowSet, all, any, any_matches, key};
pub use dictionary::{
    CategoryValidator, Dictionary, ItemValidator, LinkValidator, PrimitiveType, TypeValidator,
};
pub use error::CifError;
pub use models::{Category, CategoryId, Column, Datablock, Document, RowId, RowRef};
pub use validation::{
    SchemaViolation, ValidationMode, ValidationOptions, ValidationReport, ViolationSink,
};
pub use value::{FromItemValue, IntoItemValue, Item};
pub use writer::WriteOptions;
