//! The merge engine: one pass over canonical records against a claim store.
//!
//! Both policies share this path. A dry run takes the same branches and
//! computes the same change sets; it only gates the calls that would write.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::LoadError;
use crate::model::{Claim, DetailMap, Field};
use crate::options::{LoadOptions, LoadPolicy, NoteReset, ReviewReset};
use crate::record::{CanonicalRecord, FieldValue};
use crate::report::{ClaimDiff, FieldChange, LoadReport, SkipReason};
use crate::store::{ClaimStore, ResetScope};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Apply `records` to `store` under `options`.
///
/// Order matters: bulk resets run first, inside the same backend
/// transaction as the upserts, so claims touched by this very pass are not
/// immediately reset again. A file with no usable claim id anywhere is a
/// complete no-op — every row is skipped and the resets are not run.
pub fn run_load(
    store: &mut dyn ClaimStore,
    records: &[CanonicalRecord],
    options: &LoadOptions,
) -> Result<LoadReport, LoadError> {
    let mut report = LoadReport::new(records.len(), options.dry_run);

    // Claim ids named by the file, deduplicated, in file order. These drive
    // the `file` reset scope and the no-op guard.
    let mut seen = HashSet::new();
    let mut file_ids: Vec<String> = Vec::new();
    for record in records {
        if let Some(id) = &record.claim_id {
            if seen.insert(id.clone()) {
                file_ids.push(id.clone());
            }
        }
    }

    if file_ids.is_empty() {
        for (idx, record) in records.iter().enumerate() {
            report.skip(idx + 1, record.claim_id.clone(), SkipReason::MissingClaimId);
        }
        return Ok(report);
    }

    if !options.dry_run {
        match options.reset_notes {
            NoteReset::All => {
                report.notes_deleted = Some(store.bulk_delete_notes(&ResetScope::All)?);
            }
            NoteReset::File => {
                let scope = ResetScope::File(file_ids.clone());
                report.notes_deleted = Some(store.bulk_delete_notes(&scope)?);
            }
            NoteReset::Keep => {}
        }
        match options.reset_need_review {
            Some(ReviewReset::All) => {
                report.need_review_cleared = Some(store.bulk_clear_need_review(&ResetScope::All)?);
            }
            Some(ReviewReset::File) => {
                let scope = ResetScope::File(file_ids.clone());
                report.need_review_cleared = Some(store.bulk_clear_need_review(&scope)?);
            }
            None => {}
        }
    }

    // Dry runs cannot observe their own creations through the store, so
    // remember them here: a later row for the same new id counts as an
    // update, exactly as it would in a real pass.
    let mut created_ids: HashSet<String> = HashSet::new();

    for (idx, record) in records.iter().enumerate() {
        let row = idx + 1;
        let claim_id = match record.claim_id.as_deref() {
            Some(id) => id,
            None => {
                report.skip(row, None, SkipReason::MissingClaimId);
                continue;
            }
        };

        let (mut target, creating) = match store.find_by_claim_id(claim_id)? {
            Some(claim) => (claim, false),
            None => {
                let may_create = match options.policy {
                    LoadPolicy::FullLoad => true,
                    LoadPolicy::DetailMerge => options.create_missing,
                };
                if !may_create {
                    report.skip(row, Some(claim_id.to_string()), SkipReason::TargetNotFound);
                    continue;
                }
                // In a dry run a stub "created" by an earlier row is still
                // invisible to the store; treat it as existing.
                let projected = options.dry_run && created_ids.contains(claim_id);
                (Claim::stub(claim_id), !projected)
            }
        };

        let changes = compute_change_set(&target, record, options);

        if options.dry_run {
            if creating {
                created_ids.insert(claim_id.to_string());
                report.created += 1;
            } else {
                report.updated += 1;
            }
            if options.policy == LoadPolicy::DetailMerge && !changes.is_empty() {
                report.diffs.push(changes.to_diff(&target, claim_id));
            }
            continue;
        }

        changes.apply_to(&mut target);
        if creating {
            store.create(&target)?;
            report.created += 1;
        } else {
            // A row whose target needed nothing still counts as updated —
            // counting is by row fate, not by byte churn — but no write is
            // issued, so `updated_at` stays put.
            if !changes.is_empty() {
                store.update(&target, &changes.changed_fields())?;
            }
            report.updated += 1;
        }
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Change sets
// ---------------------------------------------------------------------------

/// The fields a record would actually alter on its target, computed before
/// anything is written. Equal values are dropped here, which is what makes
/// repeated loads idempotent down to `updated_at`.
struct ChangeSet {
    fields: Vec<(Field, FieldValue)>,
    /// The merged detail bag, present only when merging the record's
    /// unknown columns actually changes it.
    details: Option<DetailMap>,
}

fn compute_change_set(target: &Claim, record: &CanonicalRecord, options: &LoadOptions) -> ChangeSet {
    let mut fields = Vec::new();
    for (field, value) in &record.fields {
        if !eligible(options, value) {
            continue;
        }
        if field_differs(target, *field, value) {
            fields.push((*field, value.clone()));
        }
    }

    let details = if record.extras.is_empty() {
        None
    } else {
        let mut merged = target.detail_info.clone();
        for (key, value) in &record.extras {
            merged.insert(key.clone(), value.clone());
        }
        if merged == target.detail_info {
            None
        } else {
            Some(merged)
        }
    };

    ChangeSet { fields, details }
}

impl ChangeSet {
    fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.details.is_none()
    }

    fn changed_fields(&self) -> Vec<Field> {
        let mut out: Vec<Field> = self.fields.iter().map(|(field, _)| *field).collect();
        if self.details.is_some() {
            out.push(Field::DetailInfo);
        }
        out
    }

    fn apply_to(&self, claim: &mut Claim) {
        for (field, value) in &self.fields {
            apply_field(claim, *field, value);
        }
        if let Some(details) = &self.details {
            claim.detail_info = details.clone();
        }
    }

    /// Render against the pre-apply target.
    fn to_diff(&self, target: &Claim, claim_id: &str) -> ClaimDiff {
        let mut changes: Vec<FieldChange> = self
            .fields
            .iter()
            .map(|(field, value)| FieldChange {
                field: *field,
                from: claim_field_json(target, *field),
                to: field_value_json(value),
            })
            .collect();
        if let Some(details) = &self.details {
            changes.push(FieldChange {
                field: Field::DetailInfo,
                from: Value::Object(target.detail_info.clone()),
                to: Value::Object(details.clone()),
            });
        }
        ClaimDiff {
            claim_id: claim_id.to_string(),
            changes,
        }
    }
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// Whether a supplied value may touch its target field under the run's
/// policy. This is the whole blank-versus-absent contract in one place:
///
/// * full load — strings and code lists are authoritative including their
///   empty forms; blank amounts, dates, statuses and null booleans leave
///   the stored value alone;
/// * detail merge — only non-blank values apply;
/// * detail merge with overwrite — blanks clear the stored field, except
///   status and booleans, which have no meaningful empty state.
fn eligible(options: &LoadOptions, value: &FieldValue) -> bool {
    match options.policy {
        LoadPolicy::FullLoad => match value {
            FieldValue::Text(_) | FieldValue::Codes(_) => true,
            other => other.is_provided(),
        },
        LoadPolicy::DetailMerge => {
            if options.overwrite {
                match value {
                    FieldValue::Status(_) | FieldValue::Flag(_) => value.is_provided(),
                    _ => true,
                }
            } else {
                value.is_provided()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Field plumbing
// ---------------------------------------------------------------------------

// Blank status and flag values never pass `eligible`, and the normalizer
// only pairs a field with its own value shape, so the fallthrough arms
// below are inert.

fn field_differs(claim: &Claim, field: Field, value: &FieldValue) -> bool {
    match (field, value) {
        (Field::PatientName, FieldValue::Text(s)) => claim.patient_name != *s,
        (Field::Insurer, FieldValue::Text(s)) => claim.insurer != *s,
        (Field::DenialReason, FieldValue::Text(s)) => claim.denial_reason != *s,
        (Field::BilledAmount, FieldValue::Amount(v)) => claim.billed_amount != *v,
        (Field::PaidAmount, FieldValue::Amount(v)) => claim.paid_amount != *v,
        (Field::DischargeDate, FieldValue::Date(v)) => claim.discharge_date != *v,
        (Field::Status, FieldValue::Status(Some(s))) => claim.status != *s,
        (Field::CptCodes, FieldValue::Codes(v)) => claim.cpt_codes != *v,
        (Field::Flagged, FieldValue::Flag(Some(b))) => claim.flagged != *b,
        _ => false,
    }
}

fn apply_field(claim: &mut Claim, field: Field, value: &FieldValue) {
    match (field, value) {
        (Field::PatientName, FieldValue::Text(s)) => claim.patient_name = s.clone(),
        (Field::Insurer, FieldValue::Text(s)) => claim.insurer = s.clone(),
        (Field::DenialReason, FieldValue::Text(s)) => claim.denial_reason = s.clone(),
        (Field::BilledAmount, FieldValue::Amount(v)) => claim.billed_amount = *v,
        (Field::PaidAmount, FieldValue::Amount(v)) => claim.paid_amount = *v,
        (Field::DischargeDate, FieldValue::Date(v)) => claim.discharge_date = *v,
        (Field::Status, FieldValue::Status(Some(s))) => claim.status = s.clone(),
        (Field::CptCodes, FieldValue::Codes(v)) => claim.cpt_codes = v.clone(),
        (Field::Flagged, FieldValue::Flag(Some(b))) => claim.flagged = *b,
        _ => {}
    }
}

fn claim_field_json(claim: &Claim, field: Field) -> Value {
    match field {
        Field::PatientName => Value::String(claim.patient_name.clone()),
        Field::Insurer => Value::String(claim.insurer.clone()),
        Field::DenialReason => Value::String(claim.denial_reason.clone()),
        Field::BilledAmount => decimal_json(&claim.billed_amount),
        Field::PaidAmount => decimal_json(&claim.paid_amount),
        Field::DischargeDate => match claim.discharge_date {
            Some(d) => Value::String(d.to_string()),
            None => Value::Null,
        },
        Field::Status => Value::String(claim.status.as_str().to_string()),
        Field::CptCodes => codes_json(&claim.cpt_codes),
        Field::Flagged => Value::Bool(claim.flagged),
        Field::DetailInfo => Value::Object(claim.detail_info.clone()),
    }
}

fn field_value_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::Amount(v) => decimal_json(v),
        FieldValue::Date(Some(d)) => Value::String(d.to_string()),
        FieldValue::Date(None) => Value::Null,
        FieldValue::Status(Some(s)) => Value::String(s.as_str().to_string()),
        FieldValue::Status(None) => Value::Null,
        FieldValue::Codes(v) => codes_json(v),
        FieldValue::Flag(Some(b)) => Value::Bool(*b),
        FieldValue::Flag(None) => Value::Null,
    }
}

// Decimals render as strings so exact scale survives the JSON summary.
fn decimal_json(value: &Option<rust_decimal::Decimal>) -> Value {
    match value {
        Some(d) => Value::String(d.to_string()),
        None => Value::Null,
    }
}

fn codes_json(codes: &[String]) -> Value {
    Value::Array(codes.iter().map(|c| Value::String(c.clone())).collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
