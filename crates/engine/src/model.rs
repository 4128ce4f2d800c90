use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Detail bag
// ---------------------------------------------------------------------------

/// Open-ended key→value bag for input columns outside the canonical schema.
/// Insertion-ordered (`serde_json` with `preserve_order`), values verbatim.
pub type DetailMap = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Canonical fields
// ---------------------------------------------------------------------------

/// The canonical claim fields a load can touch. `claim_id` is the record key,
/// not a mergeable field; `need_review` is owned by the review workflow and
/// never set by a load, so neither appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    PatientName,
    BilledAmount,
    PaidAmount,
    Status,
    Insurer,
    DischargeDate,
    CptCodes,
    DenialReason,
    Flagged,
    DetailInfo,
}

impl Field {
    /// Canonical (and SQL column) name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PatientName => "patient_name",
            Self::BilledAmount => "billed_amount",
            Self::PaidAmount => "paid_amount",
            Self::Status => "status",
            Self::Insurer => "insurer",
            Self::DischargeDate => "discharge_date",
            Self::CptCodes => "cpt_codes",
            Self::DenialReason => "denial_reason",
            Self::Flagged => "flagged",
            Self::DetailInfo => "detail_info",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Claim status after normalization: one of the three closed values, or a
/// slugged fallback token for vocabulary the normalizer does not recognize.
/// Unrecognized input degrades to `Other`, never to an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimStatus {
    Denied,
    Paid,
    UnderReview,
    Other(String),
}

impl ClaimStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Denied => "denied",
            Self::Paid => "paid",
            Self::UnderReview => "under_review",
            Self::Other(slug) => slug,
        }
    }

    /// Rebuild from the stored token.
    pub fn from_stored(token: &str) -> Self {
        match token {
            "denied" => Self::Denied,
            "paid" => Self::Paid,
            "under_review" => Self::UnderReview,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ClaimStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

/// The persistent claim entity. Amount fields are exact decimals; `None`
/// means "not on file", which is distinct from zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Claim {
    pub claim_id: String,
    pub patient_name: String,
    pub billed_amount: Option<Decimal>,
    pub paid_amount: Option<Decimal>,
    pub status: ClaimStatus,
    pub insurer: String,
    pub discharge_date: Option<NaiveDate>,
    /// Order-preserving, duplicates kept.
    pub cpt_codes: Vec<String>,
    pub denial_reason: String,
    /// Set by loads.
    pub flagged: bool,
    /// Set by reviewers; loads never write it, bulk reset clears it.
    pub need_review: bool,
    pub detail_info: DetailMap,
    pub created_at: DateTime<Utc>,
    /// Store-managed; bumped on every persisted update.
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    /// A minimal claim carrying only its key and schema defaults. Used for
    /// newly created targets; the store stamps the timestamps on insert.
    pub fn stub(claim_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            claim_id: claim_id.into(),
            patient_name: String::new(),
            billed_amount: None,
            paid_amount: None,
            status: ClaimStatus::UnderReview,
            insurer: String::new(),
            discharge_date: None,
            cpt_codes: Vec::new(),
            denial_reason: String::new(),
            flagged: false,
            need_review: false,
            detail_info: DetailMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Note
// ---------------------------------------------------------------------------

/// Satellite note attached to a claim. Written by the review UI, which is
/// outside this subsystem; loads only delete notes via the bulk reset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub claim_id: String,
    pub body: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}
