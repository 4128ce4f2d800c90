// Claim file readers and the SQLite claim store

pub mod delimited;
pub mod error;
pub mod format;
pub mod json;
pub mod sqlite;

pub use error::ReadError;
pub use format::{detect_format, load_rows, read_file_as_utf8, FileRows, InputKind};
pub use sqlite::{SqliteStore, SqliteTx};
