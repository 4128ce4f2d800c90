//! `claimdock-engine` — Claim batch ingestion and reconciliation engine.
//!
//! Pure engine crate: receives pre-parsed rows, normalizes them into
//! canonical records and reconciles them against a [`store::ClaimStore`]
//! under one of two merge policies (full load or detail merge).
//! No CLI, file or database dependencies.

pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod options;
pub mod record;
pub mod report;
pub mod store;

pub use engine::run_load;
pub use error::LoadError;
pub use model::{Claim, ClaimStatus, DetailMap, Field, Note};
pub use options::{DelimiterChoice, FormatChoice, LoadOptions, LoadPolicy, NoteReset, ReviewReset};
pub use record::{CanonicalRecord, FieldValue, RawRow};
pub use report::LoadReport;
pub use store::{ClaimStore, ResetScope, StoreError};
