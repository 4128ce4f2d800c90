use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::model::{ClaimStatus, DetailMap, Field};

// ---------------------------------------------------------------------------
// Raw input
// ---------------------------------------------------------------------------

/// One raw input row, as read from a delimited or JSON file: column name →
/// raw value in input column order. Delimited readers produce string values;
/// JSON readers keep native scalars/arrays.
pub type RawRow = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Canonical record
// ---------------------------------------------------------------------------

/// A coerced value for one canonical field. Blankness lives *inside* the
/// value (`None`, empty string, empty list): a field holding a blank was
/// supplied by the row with no content, which downstream policies treat
/// differently from a field that was never supplied at all.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// patient_name / insurer / denial_reason; empty string = blank.
    Text(String),
    /// billed_amount / paid_amount; `None` = blank.
    Amount(Option<Decimal>),
    /// discharge_date; `None` = blank.
    Date(Option<NaiveDate>),
    /// status; `None` = blank. Non-blank input always normalizes to
    /// `Some` (the slug fallback absorbs unknown vocabulary).
    Status(Option<ClaimStatus>),
    /// cpt_codes; empty list = blank.
    Codes(Vec<String>),
    /// flagged; `None` = blank (JSON null). Any supplied text coerces to a
    /// boolean, so blanks only arise from null.
    Flag(Option<bool>),
}

impl FieldValue {
    /// Non-blank by field-type rules: decimal/date/status non-null, string
    /// non-empty, list non-empty. The merge policies use this to decide
    /// whether a supplied value carries content.
    pub fn is_provided(&self) -> bool {
        match self {
            Self::Text(s) => !s.is_empty(),
            Self::Amount(v) => v.is_some(),
            Self::Date(v) => v.is_some(),
            Self::Status(v) => v.is_some(),
            Self::Codes(v) => !v.is_empty(),
            Self::Flag(v) => v.is_some(),
        }
    }
}

/// The normalized form of one input row: the atomic unit of merge.
///
/// `fields` holds a key **only** for canonical fields the row actually
/// supplied (post-alias); this absence semantics is what the merge policies
/// key on. `extras` holds every unrecognized column verbatim for the
/// `detail_info` merge.
#[derive(Debug, Clone, Default)]
pub struct CanonicalRecord {
    /// Resolved, trimmed, non-empty key — or `None` when the row supplied no
    /// usable claim id (the record will be counted as skipped).
    pub claim_id: Option<String>,
    pub fields: BTreeMap<Field, FieldValue>,
    pub extras: DetailMap,
}

impl CanonicalRecord {
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    /// True when the row carries nothing beyond (at most) its key.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.extras.is_empty()
    }
}
