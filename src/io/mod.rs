use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use serde::Serialize;

use crate::error::{PipelineError, Result};

pub mod processing_log;
pub mod summary;
pub mod table;

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

pub(crate) fn open_maybe_gz(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PipelineError::InputNotFound(path.display().to_string()),
        _ => PipelineError::Io(e),
    })?;
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        let decoder = GzDecoder::new(file);
        Ok(Box::new(decoder))
    } else {
        Ok(Box::new(file))
    }
}

/// Reads a whole text file, transparently decompressing `.gz`.
pub fn read_text(path: &Path) -> Result<String> {
    let mut reader = open_maybe_gz(path)?;
    let mut content = String::new();
    reader.read_to_string(&mut content).map_err(|e| {
        PipelineError::MalformedInput(format!("{}: {}", path.display(), e))
    })?;
    Ok(content)
}
