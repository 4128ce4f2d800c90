//! Input decoding and format detection.
//!
//! Both loaders accept both formats; only their defaults differ. Detection
//! is forced flag first, then file extension, then a peek at the first
//! non-whitespace character.

use std::io::Read;
use std::path::Path;

use claimdock_engine::options::{FormatChoice, LoadOptions};
use claimdock_engine::record::RawRow;

use crate::delimited;
use crate::error::ReadError;
use crate::json;

/// What the detector decided a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Delimited,
    Json,
}

impl InputKind {
    /// Short tag for summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delimited => "csv",
            Self::Json => "json",
        }
    }
}

/// One decoded input file.
pub struct FileRows {
    pub kind: InputKind,
    pub rows: Vec<RawRow>,
}

/// Read a whole file as UTF-8, falling back to Windows-1252 when the bytes
/// do not decode (common for Excel-exported CSVs).
pub fn read_file_as_utf8(path: &Path) -> Result<String, ReadError> {
    if !path.is_file() {
        return Err(ReadError::NotFound(path.to_path_buf()));
    }
    let mut file = std::fs::File::open(path).map_err(|e| ReadError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| ReadError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    // Try UTF-8 first; on failure, recover the buffer from the error.
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

pub fn detect_format(path: &Path, content: &str, choice: FormatChoice) -> InputKind {
    match choice {
        FormatChoice::Delimited => return InputKind::Delimited,
        FormatChoice::Json => return InputKind::Json,
        FormatChoice::Auto => {}
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("csv") | Some("tsv") => return InputKind::Delimited,
        Some("json") | Some("ndjson") => return InputKind::Json,
        _ => {}
    }
    match content.trim_start().chars().next() {
        Some('[') | Some('{') => InputKind::Json,
        _ => InputKind::Delimited,
    }
}

/// Decode one input file into raw rows under the invocation's options.
pub fn load_rows(path: &Path, options: &LoadOptions) -> Result<FileRows, ReadError> {
    let content = read_file_as_utf8(path)?;
    let kind = detect_format(path, &content, options.format);
    let rows = match kind {
        InputKind::Json => json::read_rows(path, &content)?,
        InputKind::Delimited => delimited::read_rows(path, &content, options.delimiter)?,
    };
    Ok(FileRows { kind, rows })
}
