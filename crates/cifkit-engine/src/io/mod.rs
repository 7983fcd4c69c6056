//! Reading and writing CIF files on disk.

use std::fs;
use std::path::Path;

use crate::dictionary::Dictionary;
use crate::error::CifError;
use crate::models::Document;
use crate::writer::WriteOptions;

/// Read and parse a data file. No dictionary is attached.
pub fn read_document(path: &Path) -> Result<Document, CifError> {
    let source = fs::read_to_string(path)?;
    Document::parse(&source)
}

/// Write `document` to `path`, creating parent directories as needed.
pub fn write_document(path: &Path, document: &Document, options: &WriteOptions) -> Result<(), CifError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, document.to_cif(options))?;
    Ok(())
}

pub fn read_dictionary(path: &Path) -> Result<Dictionary, CifError> {
    let source = fs::read_to_string(path)?;
    let dictionary = Dictionary::parse(&source)?;
    log::info!("loaded dictionary {} from {}", dictionary.name(), path.display());
    Ok(dictionary)
}
