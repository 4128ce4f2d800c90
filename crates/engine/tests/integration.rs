//! End-to-end engine tests: raw rows through the normalizer and `run_load`
//! against an in-memory store double.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use claimdock_engine::model::{Claim, ClaimStatus, Note};
use claimdock_engine::normalize::normalize_rows;
use claimdock_engine::options::{LoadOptions, NoteReset, ReviewReset};
use claimdock_engine::record::RawRow;
use claimdock_engine::report::{LoadReport, SkipReason};
use claimdock_engine::store::{ClaimStore, ResetScope, StoreError};
use claimdock_engine::{run_load, LoadError};

// ---------------------------------------------------------------------------
// Store double
// ---------------------------------------------------------------------------

/// In-memory `ClaimStore` with a deterministic clock, so timestamp
/// assertions (idempotence, skipped no-op writes) are exact.
#[derive(Default)]
struct MemStore {
    claims: BTreeMap<String, Claim>,
    notes: Vec<Note>,
    clock: i64,
    fail_writes: bool,
}

impl MemStore {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        Utc.timestamp_opt(1_700_000_000 + self.clock, 0).unwrap()
    }

    fn seed(&mut self, claim: Claim) {
        let now = self.tick();
        let mut claim = claim;
        claim.created_at = now;
        claim.updated_at = now;
        self.claims.insert(claim.claim_id.clone(), claim);
    }

    fn seed_note(&mut self, claim_id: &str, body: &str) {
        let created_at = self.tick();
        self.notes.push(Note {
            claim_id: claim_id.to_string(),
            body: body.to_string(),
            author_name: "reviewer".to_string(),
            created_at,
        });
    }

    fn claim(&self, claim_id: &str) -> &Claim {
        self.claims
            .get(claim_id)
            .unwrap_or_else(|| panic!("no claim {claim_id}"))
    }

    fn snapshot(&self) -> Vec<Claim> {
        self.claims.values().cloned().collect()
    }
}

impl ClaimStore for MemStore {
    fn find_by_claim_id(&mut self, claim_id: &str) -> Result<Option<Claim>, StoreError> {
        Ok(self.claims.get(claim_id).cloned())
    }

    fn create(&mut self, claim: &Claim) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        if self.claims.contains_key(&claim.claim_id) {
            return Err(StoreError::Backend(format!(
                "duplicate claim_id {}",
                claim.claim_id
            )));
        }
        let now = self.tick();
        let mut stored = claim.clone();
        stored.created_at = now;
        stored.updated_at = now;
        self.claims.insert(stored.claim_id.clone(), stored);
        Ok(())
    }

    fn update(&mut self, claim: &Claim, _changed: &[claimdock_engine::Field]) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        let now = self.tick();
        let stored = self
            .claims
            .get_mut(&claim.claim_id)
            .ok_or_else(|| StoreError::Backend(format!("no claim {}", claim.claim_id)))?;
        let created_at = stored.created_at;
        *stored = claim.clone();
        stored.created_at = created_at;
        stored.updated_at = now;
        Ok(())
    }

    fn bulk_clear_need_review(&mut self, scope: &ResetScope) -> Result<usize, StoreError> {
        let mut cleared = 0;
        for claim in self.claims.values_mut() {
            if claim.need_review && in_scope(&claim.claim_id, scope) {
                claim.need_review = false;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    fn bulk_delete_notes(&mut self, scope: &ResetScope) -> Result<usize, StoreError> {
        let before = self.notes.len();
        self.notes.retain(|note| !in_scope(&note.claim_id, scope));
        Ok(before - self.notes.len())
    }
}

fn in_scope(claim_id: &str, scope: &ResetScope) -> bool {
    match scope {
        ResetScope::All => true,
        ResetScope::File(ids) => ids.iter().any(|id| id == claim_id),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn row(cells: &[(&str, Value)]) -> RawRow {
    let mut row = RawRow::new();
    for (key, value) in cells {
        row.insert(key.to_string(), value.clone());
    }
    row
}

fn run_full(store: &mut MemStore, rows: &[RawRow]) -> LoadReport {
    run_load(store, &normalize_rows(rows), &LoadOptions::full_load()).unwrap()
}

fn run_with(store: &mut MemStore, rows: &[RawRow], options: &LoadOptions) -> LoadReport {
    run_load(store, &normalize_rows(rows), options).unwrap()
}

// ---------------------------------------------------------------------------
// Full load
// ---------------------------------------------------------------------------

#[test]
fn full_load_creates_claims_with_schema_defaults() {
    let mut store = MemStore::default();
    let rows = vec![
        row(&[
            ("claim_id", json!("C-1")),
            ("patient_name", json!("Ada Byron")),
            ("billed_amount", json!("1,500.75")),
            ("status", json!("PAID")),
        ]),
        row(&[("claim_id", json!("C-2"))]),
    ];

    let report = run_full(&mut store, &rows);
    assert_eq!((report.created, report.updated, report.skipped), (2, 0, 0));

    let c1 = store.claim("C-1");
    assert_eq!(c1.patient_name, "Ada Byron");
    assert_eq!(c1.billed_amount, Some(dec("1500.75")));
    assert_eq!(c1.status, ClaimStatus::Paid);

    // A claim_id-only row still creates a stub claim.
    let c2 = store.claim("C-2");
    assert_eq!(c2.status, ClaimStatus::UnderReview);
    assert_eq!(c2.billed_amount, None);
    assert_eq!(c2.patient_name, "");
    assert!(!c2.flagged);
    assert!(c2.detail_info.is_empty());
}

#[test]
fn full_load_leaves_absent_fields_untouched() {
    let mut store = MemStore::default();
    let mut claim = Claim::stub("C-1");
    claim.billed_amount = Some(dec("100"));
    claim.insurer = "Acme Health".to_string();
    store.seed(claim);

    let rows = vec![row(&[("claim_id", json!("C-1")), ("paid", json!("50"))])];
    let report = run_full(&mut store, &rows);

    assert_eq!(report.updated, 1);
    let c1 = store.claim("C-1");
    assert_eq!(c1.billed_amount, Some(dec("100")));
    assert_eq!(c1.insurer, "Acme Health");
    assert_eq!(c1.paid_amount, Some(dec("50")));
}

#[test]
fn full_load_blank_amount_date_status_do_not_clear() {
    let mut store = MemStore::default();
    let mut claim = Claim::stub("C-1");
    claim.billed_amount = Some(dec("100"));
    claim.discharge_date = NaiveDate::from_ymd_opt(2024, 1, 2);
    claim.status = ClaimStatus::Paid;
    store.seed(claim);
    let before = store.claim("C-1").clone();

    let rows = vec![row(&[
        ("claim_id", json!("C-1")),
        ("billed_amount", json!("")),
        ("discharge_date", json!("-")),
        ("status", json!("")),
    ])];
    let report = run_full(&mut store, &rows);

    assert_eq!(report.updated, 1);
    // Nothing changed, so nothing was written.
    assert_eq!(store.claim("C-1"), &before);
}

#[test]
fn full_load_empty_strings_clear_text_and_codes() {
    let mut store = MemStore::default();
    let mut claim = Claim::stub("C-1");
    claim.denial_reason = "code 42".to_string();
    claim.cpt_codes = vec!["99213".to_string()];
    store.seed(claim);

    let rows = vec![row(&[
        ("claim_id", json!("C-1")),
        ("denial_reason", json!("")),
        ("cpt_codes", json!("")),
    ])];
    run_full(&mut store, &rows);

    let c1 = store.claim("C-1");
    assert_eq!(c1.denial_reason, "");
    assert!(c1.cpt_codes.is_empty());
}

#[test]
fn full_load_is_idempotent_including_updated_at() {
    let mut store = MemStore::default();
    let rows = vec![row(&[
        ("claim_id", json!("C-1")),
        ("patient_name", json!("Ada")),
        ("billed", json!("150.00")),
        ("dos", json!("20240309")),
        ("cpt", json!("99213|87070")),
    ])];

    run_full(&mut store, &rows);
    let first = store.snapshot();
    let report = run_full(&mut store, &rows);
    assert_eq!((report.created, report.updated), (0, 1));
    assert_eq!(store.snapshot(), first);
}

#[test]
fn later_rows_win_within_one_file() {
    let mut store = MemStore::default();
    let rows = vec![
        row(&[("claim_id", json!("C-1")), ("patient_name", json!("First"))]),
        row(&[("claim_id", json!("C-1")), ("patient_name", json!("Second"))]),
    ];
    let report = run_full(&mut store, &rows);

    assert_eq!((report.created, report.updated), (1, 1));
    assert_eq!(store.claim("C-1").patient_name, "Second");
}

#[test]
fn rows_without_claim_id_are_skipped() {
    let mut store = MemStore::default();
    let rows = vec![
        row(&[("patient_name", json!("No Key"))]),
        row(&[("claim_id", json!("C-1"))]),
        row(&[("claim_id", json!(""))]),
    ];
    let report = run_full(&mut store, &rows);

    assert_eq!((report.created, report.skipped), (1, 2));
    assert_eq!(report.skipped_rows.len(), 2);
    assert_eq!(report.skipped_rows[0].row, 1);
    assert_eq!(report.skipped_rows[0].reason, SkipReason::MissingClaimId);
    assert_eq!(report.skipped_rows[1].row, 3);
    assert_eq!(store.claims.len(), 1);
}

// ---------------------------------------------------------------------------
// Bulk resets
// ---------------------------------------------------------------------------

#[test]
fn no_usable_ids_means_no_resets_and_all_skipped() {
    let mut store = MemStore::default();
    store.seed(Claim::stub("C-1"));
    store.seed_note("C-1", "keep me");

    let mut options = LoadOptions::full_load();
    options.reset_notes = NoteReset::All;
    options.reset_need_review = Some(ReviewReset::All);

    let rows = vec![row(&[("patient_name", json!("ghost"))])];
    let report = run_with(&mut store, &rows, &options);

    assert!(report.all_rows_missing_id());
    assert_eq!((report.created, report.updated, report.skipped), (0, 0, 1));
    assert_eq!(report.notes_deleted, None);
    assert_eq!(report.need_review_cleared, None);
    assert_eq!(store.notes.len(), 1);
}

#[test]
fn resets_run_before_upserts_in_the_same_pass() {
    let mut store = MemStore::default();
    let mut claim = Claim::stub("C-1");
    claim.need_review = true;
    store.seed(claim);
    store.seed_note("C-1", "stale note");

    let mut options = LoadOptions::full_load();
    options.reset_notes = NoteReset::File;
    options.reset_need_review = Some(ReviewReset::File);

    let rows = vec![
        row(&[("claim_id", json!("C-1")), ("patient_name", json!("Renamed"))]),
        row(&[("claim_id", json!("C-9"))]),
    ];
    let report = run_with(&mut store, &rows, &options);

    // The note went away even though its claim was updated afterwards.
    assert_eq!(report.notes_deleted, Some(1));
    assert_eq!(report.need_review_cleared, Some(1));
    assert!(store.notes.is_empty());
    assert!(!store.claim("C-1").need_review);
    assert_eq!(store.claim("C-1").patient_name, "Renamed");
    assert_eq!(report.created, 1);
}

#[test]
fn file_scope_only_touches_claims_named_by_the_file() {
    let mut store = MemStore::default();
    store.seed(Claim::stub("C-1"));
    store.seed(Claim::stub("C-2"));
    store.seed_note("C-1", "in file");
    store.seed_note("C-2", "not in file");

    let mut options = LoadOptions::full_load();
    options.reset_notes = NoteReset::File;

    let rows = vec![row(&[("claim_id", json!("C-1"))])];
    let report = run_with(&mut store, &rows, &options);

    assert_eq!(report.notes_deleted, Some(1));
    assert_eq!(store.notes.len(), 1);
    assert_eq!(store.notes[0].claim_id, "C-2");
}

#[test]
fn all_scope_deletes_every_note() {
    let mut store = MemStore::default();
    store.seed(Claim::stub("C-1"));
    store.seed(Claim::stub("C-2"));
    store.seed_note("C-1", "a");
    store.seed_note("C-2", "b");

    let mut options = LoadOptions::full_load();
    options.reset_notes = NoteReset::All;

    let rows = vec![row(&[("claim_id", json!("C-1"))])];
    let report = run_with(&mut store, &rows, &options);

    assert_eq!(report.notes_deleted, Some(2));
    assert!(store.notes.is_empty());
}

#[test]
fn review_reset_counts_only_flags_that_were_set() {
    let mut store = MemStore::default();
    let mut flagged = Claim::stub("C-1");
    flagged.need_review = true;
    store.seed(flagged);
    store.seed(Claim::stub("C-2"));

    let mut options = LoadOptions::full_load();
    options.reset_need_review = Some(ReviewReset::File);

    let rows = vec![
        row(&[("claim_id", json!("C-1"))]),
        row(&[("claim_id", json!("C-2"))]),
    ];
    let report = run_with(&mut store, &rows, &options);

    assert_eq!(report.need_review_cleared, Some(1));
}

// ---------------------------------------------------------------------------
// Detail merge
// ---------------------------------------------------------------------------

#[test]
fn detail_merge_skips_missing_targets() {
    let mut store = MemStore::default();
    let rows = vec![row(&[("claim_id", json!("C-404")), ("paid", json!("10"))])];
    let report = run_with(&mut store, &rows, &LoadOptions::detail_merge());

    assert_eq!((report.created, report.updated, report.skipped), (0, 0, 1));
    assert_eq!(report.skipped_rows[0].reason, SkipReason::TargetNotFound);
    assert_eq!(report.skipped_rows[0].claim_id.as_deref(), Some("C-404"));
    assert!(store.claims.is_empty());
}

#[test]
fn detail_merge_create_missing_builds_stub_then_patches() {
    let mut store = MemStore::default();
    let mut options = LoadOptions::detail_merge();
    options.create_missing = true;

    let rows = vec![row(&[
        ("claim_id", json!("C-7")),
        ("paid_amount", json!("12.50")),
        ("referral", json!("R-9")),
    ])];
    let report = run_with(&mut store, &rows, &options);

    assert_eq!(report.created, 1);
    let c7 = store.claim("C-7");
    assert_eq!(c7.status, ClaimStatus::UnderReview);
    assert_eq!(c7.paid_amount, Some(dec("12.50")));
    assert_eq!(c7.detail_info.get("referral"), Some(&json!("R-9")));
}

#[test]
fn detail_merge_blanks_never_clobber_stored_values() {
    let mut store = MemStore::default();
    let mut claim = Claim::stub("C-1");
    claim.billed_amount = Some(dec("100"));
    claim.insurer = "Acme Health".to_string();
    store.seed(claim);

    let rows = vec![row(&[
        ("claim_id", json!("C-1")),
        ("billed_amount", json!("")),
        ("insurer", json!("")),
        ("paid_amount", json!("25.50")),
    ])];
    run_with(&mut store, &rows, &LoadOptions::detail_merge());

    let c1 = store.claim("C-1");
    assert_eq!(c1.billed_amount, Some(dec("100")));
    assert_eq!(c1.insurer, "Acme Health");
    assert_eq!(c1.paid_amount, Some(dec("25.50")));
}

#[test]
fn overwrite_clears_blanks_but_never_status() {
    let mut store = MemStore::default();
    let mut claim = Claim::stub("C-1");
    claim.billed_amount = Some(dec("100"));
    claim.status = ClaimStatus::Paid;
    claim.cpt_codes = vec!["99213".to_string()];
    store.seed(claim);

    let mut options = LoadOptions::detail_merge();
    options.overwrite = true;

    let rows = vec![row(&[
        ("claim_id", json!("C-1")),
        ("billed_amount", json!("")),
        ("status", json!("")),
        ("cpt_codes", json!("")),
    ])];
    run_with(&mut store, &rows, &options);

    let c1 = store.claim("C-1");
    assert_eq!(c1.billed_amount, None);
    assert!(c1.cpt_codes.is_empty());
    assert_eq!(c1.status, ClaimStatus::Paid);
}

#[test]
fn unknown_columns_merge_into_detail_info_key_by_key() {
    let mut store = MemStore::default();
    let mut claim = Claim::stub("C-1");
    claim.detail_info.insert("prior_auth".to_string(), json!("A-991"));
    claim.detail_info.insert("region".to_string(), json!("north"));
    store.seed(claim);

    let rows = vec![row(&[
        ("claim_id", json!("C-1")),
        ("Region", json!("south")),
        ("referral", json!("R-9")),
    ])];
    run_with(&mut store, &rows, &LoadOptions::detail_merge());

    let details = &store.claim("C-1").detail_info;
    assert_eq!(details.get("prior_auth"), Some(&json!("A-991")));
    assert_eq!(details.get("region"), Some(&json!("south")));
    assert_eq!(details.get("referral"), Some(&json!("R-9")));
}

#[test]
fn unrecognized_status_lands_as_slug() {
    let mut store = MemStore::default();
    store.seed(Claim::stub("C-1"));

    let rows = vec![row(&[
        ("claim_id", json!("C-1")),
        ("status", json!("Sent to Physician")),
    ])];
    run_with(&mut store, &rows, &LoadOptions::detail_merge());

    assert_eq!(
        store.claim("C-1").status,
        ClaimStatus::Other("sent_to_physician".to_string())
    );
}

// ---------------------------------------------------------------------------
// Dry runs
// ---------------------------------------------------------------------------

#[test]
fn dry_run_full_load_mutates_nothing() {
    let mut store = MemStore::default();
    store.seed(Claim::stub("C-1"));
    store.seed_note("C-1", "survives");
    let before = store.snapshot();

    let mut options = LoadOptions::full_load();
    options.dry_run = true;
    options.reset_notes = NoteReset::All;

    let rows = vec![
        row(&[("claim_id", json!("C-1")), ("patient_name", json!("Changed"))]),
        row(&[("claim_id", json!("C-2"))]),
    ];
    let report = run_with(&mut store, &rows, &options);

    assert!(report.dry_run);
    assert_eq!((report.created, report.updated), (1, 1));
    assert_eq!(report.notes_deleted, None);
    assert_eq!(store.snapshot(), before);
    assert_eq!(store.notes.len(), 1);
}

#[test]
fn dry_run_counts_second_row_for_a_new_id_as_update() {
    let mut store = MemStore::default();
    let mut options = LoadOptions::full_load();
    options.dry_run = true;

    let rows = vec![
        row(&[("claim_id", json!("C-9")), ("patient_name", json!("a"))]),
        row(&[("claim_id", json!("C-9")), ("patient_name", json!("b"))]),
    ];
    let report = run_with(&mut store, &rows, &options);

    assert_eq!((report.created, report.updated), (1, 1));
    assert!(store.claims.is_empty());
}

#[test]
fn dry_run_detail_merge_reports_projected_diffs() {
    let mut store = MemStore::default();
    let mut claim = Claim::stub("C-1");
    claim.billed_amount = Some(dec("100"));
    store.seed(claim);
    let before = store.snapshot();

    let mut options = LoadOptions::detail_merge();
    options.dry_run = true;

    let rows = vec![row(&[
        ("claim_id", json!("C-1")),
        ("billed_amount", json!("250.00")),
        ("status", json!("PAID")),
    ])];
    let report = run_with(&mut store, &rows, &options);

    assert_eq!(report.updated, 1);
    assert_eq!(report.diffs.len(), 1);
    let diff = &report.diffs[0];
    assert_eq!(diff.claim_id, "C-1");
    assert_eq!(diff.changes[0].from, json!("100"));
    assert_eq!(diff.changes[0].to, json!("250.00"));
    assert_eq!(diff.changes[1].from, json!("under_review"));
    assert_eq!(diff.changes[1].to, json!("paid"));
    assert_eq!(store.snapshot(), before);
}

#[test]
fn dry_run_reports_no_diff_for_a_no_op_row() {
    let mut store = MemStore::default();
    let mut claim = Claim::stub("C-1");
    claim.patient_name = "Ada".to_string();
    store.seed(claim);

    let mut options = LoadOptions::detail_merge();
    options.dry_run = true;

    let rows = vec![row(&[("claim_id", json!("C-1")), ("patient", json!("Ada"))])];
    let report = run_with(&mut store, &rows, &options);

    assert_eq!(report.updated, 1);
    assert!(report.diffs.is_empty());
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[test]
fn store_failure_aborts_the_run() {
    let mut store = MemStore::default();
    store.fail_writes = true;

    let rows = vec![row(&[("claim_id", json!("C-1"))])];
    let err = run_load(
        &mut store,
        &normalize_rows(&rows),
        &LoadOptions::full_load(),
    )
    .unwrap_err();

    assert!(matches!(err, LoadError::Store(StoreError::Backend(_))));
}

#[test]
fn unchanged_rows_count_updated_but_write_nothing() {
    let mut store = MemStore::default();
    let mut claim = Claim::stub("C-1");
    claim.patient_name = "Ada".to_string();
    store.seed(claim);
    let stamp = store.claim("C-1").updated_at;

    let rows = vec![row(&[("claim_id", json!("C-1")), ("patient", json!("Ada"))])];
    let report = run_full(&mut store, &rows);

    assert_eq!(report.updated, 1);
    assert_eq!(store.claim("C-1").updated_at, stamp);
}
