//! Run report: counts by row fate, skipped rows, projected diffs.

use serde::Serialize;
use serde_json::Value;

use crate::model::Field;

/// Why a row was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No alias column yielded a non-empty claim id.
    MissingClaimId,
    /// Detail merge without `--create-missing` and no such claim exists.
    TargetNotFound,
}

/// One skipped row. `row` is the 1-based data row number (headers and
/// blank NDJSON lines excluded).
#[derive(Debug, Clone)]
pub struct SkippedRow {
    pub row: usize,
    pub claim_id: Option<String>,
    pub reason: SkipReason,
}

/// One projected field change, rendered as JSON values so the CLI can
/// print it or embed it in the `--json` summary unchanged.
#[derive(Debug, Clone, Serialize)]
pub struct FieldChange {
    pub field: Field,
    pub from: Value,
    pub to: Value,
}

/// Projected changes for one claim (detail-merge dry runs).
#[derive(Debug, Clone, Serialize)]
pub struct ClaimDiff {
    pub claim_id: String,
    pub changes: Vec<FieldChange>,
}

/// What one run did (or, for a dry run, would have done). Every row lands
/// in exactly one of created/updated/skipped.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub rows: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub dry_run: bool,
    /// `None` when no note reset ran (mode `keep`, or a dry run).
    pub notes_deleted: Option<usize>,
    /// `None` when no review reset ran.
    pub need_review_cleared: Option<usize>,
    pub diffs: Vec<ClaimDiff>,
    pub skipped_rows: Vec<SkippedRow>,
}

impl LoadReport {
    pub(crate) fn new(rows: usize, dry_run: bool) -> Self {
        Self {
            rows,
            created: 0,
            updated: 0,
            skipped: 0,
            dry_run,
            notes_deleted: None,
            need_review_cleared: None,
            diffs: Vec::new(),
            skipped_rows: Vec::new(),
        }
    }

    pub(crate) fn skip(&mut self, row: usize, claim_id: Option<String>, reason: SkipReason) {
        self.skipped += 1;
        self.skipped_rows.push(SkippedRow { row, claim_id, reason });
    }

    /// True when the file had rows but none carried a usable claim id —
    /// the whole pass was a no-op and bulk resets did not run.
    pub fn all_rows_missing_id(&self) -> bool {
        self.rows > 0
            && self.skipped_rows.len() == self.rows
            && self
                .skipped_rows
                .iter()
                .all(|s| s.reason == SkipReason::MissingClaimId)
    }
}
