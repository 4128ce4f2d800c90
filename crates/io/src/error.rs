//! Reader errors. All of these surface before any store access, so a bad
//! input file can never leave a half-applied batch behind.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ReadError {
    NotFound(PathBuf),
    Io { path: PathBuf, message: String },
    Delimited { path: PathBuf, message: String },
    /// The JSON document root is not an array of objects.
    JsonRoot { path: PathBuf, message: String },
    /// One NDJSON line failed to parse as an object.
    JsonLine { path: PathBuf, line: usize, message: String },
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "file not found: {}", path.display()),
            Self::Io { path, message } => {
                write!(f, "cannot read {}: {message}", path.display())
            }
            Self::Delimited { path, message } => {
                write!(f, "malformed delimited file {}: {message}", path.display())
            }
            Self::JsonRoot { path, message } => {
                write!(f, "malformed JSON file {}: {message}", path.display())
            }
            Self::JsonLine { path, line, message } => {
                write!(f, "malformed JSON file {} line {line}: {message}", path.display())
            }
        }
    }
}

impl Error for ReadError {}
