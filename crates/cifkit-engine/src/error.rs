use cifkit_syntax::ParseError;

use crate::validation::{SchemaViolation, ValidationReport};

#[derive(Debug, thiserror::Error)]
pub enum CifError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Schema(#[from] SchemaViolation),

    #[error("duplicate key ({}) in category '{category}'", .key.join(", "))]
    DuplicateKey { category: String, key: Vec<String> },

    /// A value that cannot be written as CIF text.
    #[error("value of '_{category}.{item}' cannot be written: {reason}")]
    UnwritableValue {
        category: String,
        item: String,
        reason: &'static str,
    },

    /// A row handle that does not (or no longer) refer to a row of the category.
    #[error("stale row handle for category '{category}'")]
    StaleRow { category: String },

    #[error("category '{0}' does not exist")]
    UnknownCategory(String),

    #[error("data block '{0}' already exists")]
    DuplicateBlock(String),

    #[error("document failed validation with {} violation(s)", .0.len())]
    Invalid(ValidationReport),

    #[error("invalid dictionary: {0}")]
    Dictionary(String),

    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
