//! Engine-level errors.

use std::error::Error;
use std::fmt;

use crate::store::StoreError;

/// Why a load run aborted. Coercion never errors (misses become absent
/// fields) and rows without a usable claim id are skipped, not fatal, so
/// the only abort today is the store giving up — at which point the
/// backend rolls the whole batch back.
#[derive(Debug)]
pub enum LoadError {
    Store(StoreError),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for LoadError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}
