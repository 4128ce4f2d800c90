//! Row normalization: column-name alias resolution and per-field coercion.
//!
//! Coercion is total — a value that cannot be parsed makes the field absent
//! from the canonical record, it never fails the row or the batch. The alias
//! and status tables are explicit ordered structures so precedence stays
//! auditable.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::model::{ClaimStatus, Field};
use crate::record::{CanonicalRecord, FieldValue, RawRow};

// ---------------------------------------------------------------------------
// Alias tables
// ---------------------------------------------------------------------------

/// Accepted spellings of the record key, tried against each column after
/// trim + lowercase. The first column with a non-empty value wins.
pub const CLAIM_ID_ALIASES: &[&str] = &["claim_id", "id", "claimid", "claim id"];

/// Canonical-field alias table, ordered canonical-name-first per field.
const ALIAS_TABLE: &[(&str, Field)] = &[
    ("patient_name", Field::PatientName),
    ("patient", Field::PatientName),
    ("patient name", Field::PatientName),
    ("billed_amount", Field::BilledAmount),
    ("billed", Field::BilledAmount),
    ("billed amount", Field::BilledAmount),
    ("paid_amount", Field::PaidAmount),
    ("paid", Field::PaidAmount),
    ("paid amount", Field::PaidAmount),
    ("status", Field::Status),
    ("insurer", Field::Insurer),
    ("insurer_name", Field::Insurer),
    ("payer", Field::Insurer),
    ("company", Field::Insurer),
    ("insurance", Field::Insurer),
    ("discharge_date", Field::DischargeDate),
    ("dos", Field::DischargeDate),
    ("date_of_service", Field::DischargeDate),
    ("discharge date", Field::DischargeDate),
    ("cpt_codes", Field::CptCodes),
    ("cpt", Field::CptCodes),
    ("cpts", Field::CptCodes),
    ("cpt codes", Field::CptCodes),
    ("codes", Field::CptCodes),
    ("denial_reason", Field::DenialReason),
    ("denial", Field::DenialReason),
    ("denialreason", Field::DenialReason),
    ("denial reason", Field::DenialReason),
    ("flagged", Field::Flagged),
];

/// Resolve a trimmed, lowercased column name to its canonical field.
pub fn resolve_field(key: &str) -> Option<Field> {
    ALIAS_TABLE
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, field)| *field)
}

// ---------------------------------------------------------------------------
// Scalar parsers
// ---------------------------------------------------------------------------

/// Case-insensitive true-forms for boolean columns.
const TRUE_FORMS: &[&str] = &["1", "true", "yes", "y", "t"];

/// Date formats tried in order after ISO. US month-first comes before
/// day-first, matching the feeds this engine has historically seen.
const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y"];

fn compact_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").unwrap())
}

fn code_sep_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,;\s]+").unwrap())
}

fn status_sep_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-_\s]+").unwrap())
}

/// Exports commonly mark an empty amount or date with a lone dash.
fn is_blank_marker(s: &str) -> bool {
    s.is_empty() || s == "-"
}

/// Parse an amount string: thousands separators stripped, exact decimal out.
/// `None` means unparseable (not blank — callers handle blanks first).
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let cleaned = s.replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned
        .parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(&cleaned).ok())
}

/// Parse a date: ISO first, then slash variants in fixed order, then the
/// compact 8-digit form. First calendar-valid match wins.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    let caps = compact_date_re().captures(s)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Normalize a status token. Separator runs collapse to single spaces, then
/// substring rules apply in fixed priority; anything unrecognized becomes an
/// underscore-joined slug. Returns `None` only for effectively empty input.
pub fn normalize_status(s: &str) -> Option<ClaimStatus> {
    let collapsed = status_sep_re()
        .replace_all(s.trim().to_lowercase().as_str(), " ")
        .trim()
        .to_string();
    if collapsed.is_empty() {
        return None;
    }
    // "deni" covers denied/denial, which a bare "deny" substring misses.
    let status = if collapsed.contains("deny") || collapsed.contains("deni") {
        ClaimStatus::Denied
    } else if collapsed.contains("paid") || collapsed.contains("pay") {
        ClaimStatus::Paid
    } else if collapsed.contains("review") {
        ClaimStatus::UnderReview
    } else {
        ClaimStatus::Other(collapsed.replace(' ', "_"))
    };
    Some(status)
}

/// Split a code-list string. Pipe takes priority whenever present; otherwise
/// runs of comma/space/semicolon separate codes. Order preserved, duplicates
/// kept, empties dropped.
pub fn split_codes(s: &str) -> Vec<String> {
    let parts: Vec<&str> = if s.contains('|') {
        s.split('|').collect()
    } else {
        code_sep_re().split(s).collect()
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Boolean coercion for text input: membership in the fixed true-set after
/// trim + lowercase; everything else is false.
pub fn parse_flag(s: &str) -> bool {
    TRUE_FORMS.contains(&s.trim().to_lowercase().as_str())
}

/// Render a JSON scalar as a trimmed string. Non-scalars yield `None`.
fn stringify_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

// ---------------------------------------------------------------------------
// Per-field coercion
// ---------------------------------------------------------------------------

/// Coerce one raw value for one canonical field. `None` is a coercion miss:
/// the field stays absent from the record and the row keeps processing.
pub fn coerce_field(field: Field, raw: &Value) -> Option<FieldValue> {
    match field {
        Field::BilledAmount | Field::PaidAmount => coerce_amount(raw).map(FieldValue::Amount),
        Field::DischargeDate => coerce_date(raw).map(FieldValue::Date),
        Field::Status => coerce_status(raw).map(FieldValue::Status),
        Field::PatientName | Field::Insurer | Field::DenialReason => {
            coerce_text(raw).map(FieldValue::Text)
        }
        Field::CptCodes => coerce_codes(raw).map(FieldValue::Codes),
        Field::Flagged => coerce_flag(raw).map(FieldValue::Flag),
        // Not an input column; the bag is merged wholesale by the engine.
        Field::DetailInfo => None,
    }
}

fn coerce_amount(raw: &Value) -> Option<Option<Decimal>> {
    match raw {
        Value::Null => Some(None),
        Value::Number(n) => parse_decimal(&n.to_string()).map(Some),
        Value::String(s) => {
            let t = s.trim();
            if is_blank_marker(t) {
                Some(None)
            } else {
                parse_decimal(t).map(Some)
            }
        }
        _ => None,
    }
}

fn coerce_date(raw: &Value) -> Option<Option<NaiveDate>> {
    match raw {
        Value::Null => Some(None),
        // Compact dates survive being typed as JSON numbers.
        Value::Number(n) => parse_date(&n.to_string()).map(Some),
        Value::String(s) => {
            let t = s.trim();
            if is_blank_marker(t) {
                Some(None)
            } else {
                parse_date(t).map(Some)
            }
        }
        _ => None,
    }
}

fn coerce_status(raw: &Value) -> Option<Option<ClaimStatus>> {
    match raw {
        Value::Null => Some(None),
        Value::String(_) | Value::Number(_) | Value::Bool(_) => {
            let s = stringify_scalar(raw)?;
            Some(normalize_status(&s))
        }
        _ => None,
    }
}

fn coerce_text(raw: &Value) -> Option<String> {
    match raw {
        Value::Null => Some(String::new()),
        Value::String(_) | Value::Number(_) | Value::Bool(_) => stringify_scalar(raw),
        _ => None,
    }
}

fn coerce_codes(raw: &Value) -> Option<Vec<String>> {
    match raw {
        Value::Null => Some(Vec::new()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(stringify_scalar)
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        Value::String(s) => Some(split_codes(s)),
        Value::Number(n) => Some(vec![n.to_string()]),
        _ => None,
    }
}

fn coerce_flag(raw: &Value) -> Option<Option<bool>> {
    match raw {
        Value::Bool(b) => Some(Some(*b)),
        Value::Null => Some(None),
        Value::String(_) | Value::Number(_) => {
            let s = stringify_scalar(raw)?;
            Some(Some(parse_flag(&s)))
        }
        _ => None,
    }
}

/// Unknown-column values are kept verbatim; strings are trimmed like every
/// other input string.
fn clean_extra(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Row → canonical record
// ---------------------------------------------------------------------------

/// Normalize one raw row. Later columns resolving to the same canonical
/// field overwrite earlier ones; the claim id keeps the first non-empty
/// match; unknown columns land in `extras` and are never dropped.
pub fn normalize_row(raw: &RawRow) -> CanonicalRecord {
    let mut record = CanonicalRecord::default();
    for (raw_key, value) in raw {
        let key = raw_key.trim().to_lowercase();
        if CLAIM_ID_ALIASES.contains(&key.as_str()) {
            if record.claim_id.is_none() {
                if let Some(id) = stringify_scalar(value).filter(|s| !s.is_empty()) {
                    record.claim_id = Some(id);
                }
            }
            continue;
        }
        if let Some(field) = resolve_field(&key) {
            if let Some(coerced) = coerce_field(field, value) {
                record.fields.insert(field, coerced);
            }
            // A recognized column never leaks into extras, even on a miss.
            continue;
        }
        record.extras.insert(key, clean_extra(value));
    }
    record
}

pub fn normalize_rows(rows: &[RawRow]) -> Vec<CanonicalRecord> {
    rows.iter().map(normalize_row).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
