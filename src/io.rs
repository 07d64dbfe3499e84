//! JSON file helpers shared by the readers and writers.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::error::AnnoguardError;

/// Decodes a JSON file into the generic intermediate structure.
pub fn read_json_file(path: &Path) -> Result<Value, AnnoguardError> {
    let file = File::open(path).map_err(AnnoguardError::Io)?;
    let reader = BufReader::new(file);
    tracing::debug!(path = %path.display(), "reading JSON document");

    serde_json::from_reader(reader).map_err(|source| AnnoguardError::JsonParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes any serializable value as pretty JSON.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), AnnoguardError> {
    let file = File::create(path).map_err(AnnoguardError::Io)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, value).map_err(|source| AnnoguardError::JsonWrite {
        path: path.to_path_buf(),
        source,
    })
}
