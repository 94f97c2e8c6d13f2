use std::fs;

use crate::domain::compare::CompareResult;
use crate::domain::error::ScanError;
use crate::domain::ports::OutputWriter;

use self::{html::HtmlWriter, json::JsonWriter};

pub mod html;
pub mod json;

/// Register available writers. Add a new format by implementing
/// `OutputWriter`, not by touching the CLI.
pub fn all_writers() -> Vec<Box<dyn OutputWriter>> {
    vec![Box::new(JsonWriter), Box::new(HtmlWriter)]
}

pub fn writer_for(format: &str) -> Option<Box<dyn OutputWriter>> {
    match format {
        "json" => Some(Box::new(JsonWriter)),
        "html" => Some(Box::new(HtmlWriter)),
        _ => None,
    }
}

/// Writes a compare result to disk via the chosen writer, named after the
/// two targets being compared.
pub fn write_to_file(writer: &dyn OutputWriter, result: &CompareResult, dir: &str, stem: &str) -> Result<(), ScanError> {
    fs::create_dir_all(dir).map_err(|e| ScanError::Persistence(e.to_string()))?;
    let content = writer.format(result)?;
    let path = format!("{}/{}.{}", dir, stem, writer.extension());
    fs::write(&path, &content).map_err(|e| ScanError::Persistence(e.to_string()))?;
    Ok(())
}
