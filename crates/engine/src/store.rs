//! Storage seam.
//!
//! The engine mutates claims only through [`ClaimStore`], so the merge logic
//! can be driven against SQLite in production and an in-memory double in
//! tests. Implementations own atomicity: when a backend wraps a run in a
//! transaction, every method call lands inside it.

use std::error::Error;
use std::fmt;

use crate::model::{Claim, Field};

/// Which claims a bulk reset touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetScope {
    /// Every claim in the store.
    All,
    /// Only the claim ids named by the current file, deduplicated, in file
    /// order.
    File(Vec<String>),
}

/// Storage-layer failure. Messages are backend-rendered; the engine only
/// propagates them.
#[derive(Debug)]
pub enum StoreError {
    /// The backend rejected an operation (I/O, constraint, transaction).
    Backend(String),
    /// A value could not be serialized for storage.
    Encode(String),
    /// A stored value could not be read back into the model.
    Decode(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(msg) => write!(f, "store error: {msg}"),
            Self::Encode(msg) => write!(f, "cannot encode value for storage: {msg}"),
            Self::Decode(msg) => write!(f, "corrupt stored value: {msg}"),
        }
    }
}

impl Error for StoreError {}

/// Claim persistence as the merge engine sees it.
pub trait ClaimStore {
    /// Look up one claim by its external id.
    fn find_by_claim_id(&mut self, claim_id: &str) -> Result<Option<Claim>, StoreError>;

    /// Insert a new claim. The store stamps `created_at`/`updated_at`
    /// itself; whatever the caller put there is ignored.
    fn create(&mut self, claim: &Claim) -> Result<(), StoreError>;

    /// Write back exactly the named fields of an existing claim (plus the
    /// store-managed `updated_at`). `changed` is never empty.
    fn update(&mut self, claim: &Claim, changed: &[Field]) -> Result<(), StoreError>;

    /// Clear the review flag on every claim in scope; returns how many
    /// claims actually had it set.
    fn bulk_clear_need_review(&mut self, scope: &ResetScope) -> Result<usize, StoreError>;

    /// Delete the notes of every claim in scope; returns how many notes
    /// went away.
    fn bulk_delete_notes(&mut self, scope: &ResetScope) -> Result<usize, StoreError>;
}
