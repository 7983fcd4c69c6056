//! The document model: [`Document`] → [`Datablock`] → [`Category`] → rows.
//!
//! Rows are addressed through [`RowId`] handles and read through borrowed
//! [`RowRef`] views. Values are always text.

pub mod category;
pub mod datablock;
pub mod document;
pub mod row;

pub use category::{Category, Column};
pub use datablock::Datablock;
pub use document::Document;
pub use row::{CategoryId, RowId, RowRef};
