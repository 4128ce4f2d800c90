//! SQLite claim store.
//!
//! Storage habits: amounts as exact decimal text, dates as ISO text,
//! code lists and the detail bag as JSON text, booleans as 0/1, timestamps
//! as RFC 3339 text. One ambient transaction wraps each mutating CLI
//! invocation via [`SqliteStore::transaction`]; dry runs read through the
//! plain connection.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql, Transaction};
use rust_decimal::Decimal;

use claimdock_engine::model::{Claim, ClaimStatus, DetailMap, Field, Note};
use claimdock_engine::store::{ClaimStore, ResetScope, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS claims (
    claim_id TEXT PRIMARY KEY,
    patient_name TEXT NOT NULL DEFAULT '',
    billed_amount TEXT,                        -- decimal text, NULL = not on file
    paid_amount TEXT,
    status TEXT NOT NULL DEFAULT 'under_review',
    insurer TEXT NOT NULL DEFAULT '',
    discharge_date TEXT,                       -- ISO date, NULL = not on file
    cpt_codes TEXT NOT NULL DEFAULT '[]',      -- JSON array of strings
    denial_reason TEXT NOT NULL DEFAULT '',
    flagged INTEGER NOT NULL DEFAULT 0,
    need_review INTEGER NOT NULL DEFAULT 0,
    detail_info TEXT NOT NULL DEFAULT '{}',    -- JSON object
    created_at TEXT NOT NULL,                  -- RFC 3339
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notes (
    claim_id TEXT NOT NULL,
    body TEXT NOT NULL,
    author_name TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notes_claim_id ON notes (claim_id);
"#;

const CLAIM_COLUMNS: &str = "claim_id, patient_name, billed_amount, paid_amount, status, \
     insurer, discharge_date, cpt_codes, denial_reason, flagged, need_review, \
     detail_info, created_at, updated_at";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(backend)?;
        conn.execute_batch(SCHEMA).map_err(backend)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        conn.execute_batch(SCHEMA).map_err(backend)?;
        Ok(Self { conn })
    }

    /// Run `f` inside one transaction: commit on `Ok`, roll everything back
    /// on `Err`. All store calls made through the view land in the same
    /// transaction, bulk resets included.
    pub fn transaction<T, E>(
        &mut self,
        f: impl FnOnce(&mut SqliteTx<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let tx = self.conn.transaction().map_err(|e| E::from(backend(e)))?;
        let mut view = SqliteTx { tx };
        // On error the transaction drops here, which rolls it back.
        let out = f(&mut view)?;
        view.tx.commit().map_err(|e| E::from(backend(e)))?;
        Ok(out)
    }

    // -- review-side operations (the loaders only ever bulk-delete these) --

    pub fn insert_note(&self, claim_id: &str, body: &str, author_name: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO notes (claim_id, body, author_name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![claim_id, body, author_name, Utc::now().to_rfc3339()],
            )
            .map_err(backend)?;
        Ok(())
    }

    pub fn mark_need_review(&self, claim_id: &str) -> Result<(), StoreError> {
        let updated = self
            .conn
            .execute(
                "UPDATE claims SET need_review = 1, updated_at = ?1 WHERE claim_id = ?2",
                params![Utc::now().to_rfc3339(), claim_id],
            )
            .map_err(backend)?;
        if updated == 0 {
            return Err(StoreError::Backend(format!("no claim {claim_id}")));
        }
        Ok(())
    }

    // -- read helpers for tooling and tests --

    pub fn all_claims(&self) -> Result<Vec<Claim>, StoreError> {
        let sql = format!("SELECT {CLAIM_COLUMNS} FROM claims ORDER BY claim_id");
        let mut stmt = self.conn.prepare(&sql).map_err(backend)?;
        let raws = stmt
            .query_map([], read_stored_claim)
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        raws.into_iter().map(decode_claim).collect()
    }

    pub fn notes_for(&self, claim_id: &str) -> Result<Vec<Note>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT claim_id, body, author_name, created_at FROM notes WHERE claim_id = ?1 ORDER BY created_at")
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![claim_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(backend)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend)?;
        rows.into_iter()
            .map(|(claim_id, body, author_name, created_at)| {
                Ok(Note {
                    created_at: decode_timestamp(&claim_id, "created_at", &created_at)?,
                    claim_id,
                    body,
                    author_name,
                })
            })
            .collect()
    }

    pub fn count_claims(&self) -> Result<usize, StoreError> {
        count(&self.conn, "SELECT COUNT(*) FROM claims")
    }

    pub fn count_notes(&self) -> Result<usize, StoreError> {
        count(&self.conn, "SELECT COUNT(*) FROM notes")
    }
}

impl ClaimStore for SqliteStore {
    fn find_by_claim_id(&mut self, claim_id: &str) -> Result<Option<Claim>, StoreError> {
        find_claim(&self.conn, claim_id)
    }

    fn create(&mut self, claim: &Claim) -> Result<(), StoreError> {
        insert_claim(&self.conn, claim)
    }

    fn update(&mut self, claim: &Claim, changed: &[Field]) -> Result<(), StoreError> {
        update_claim(&self.conn, claim, changed)
    }

    fn bulk_clear_need_review(&mut self, scope: &ResetScope) -> Result<usize, StoreError> {
        clear_need_review(&self.conn, scope)
    }

    fn bulk_delete_notes(&mut self, scope: &ResetScope) -> Result<usize, StoreError> {
        delete_notes(&self.conn, scope)
    }
}

/// Transaction-scoped view over the same store operations.
pub struct SqliteTx<'a> {
    tx: Transaction<'a>,
}

impl ClaimStore for SqliteTx<'_> {
    fn find_by_claim_id(&mut self, claim_id: &str) -> Result<Option<Claim>, StoreError> {
        find_claim(&self.tx, claim_id)
    }

    fn create(&mut self, claim: &Claim) -> Result<(), StoreError> {
        insert_claim(&self.tx, claim)
    }

    fn update(&mut self, claim: &Claim, changed: &[Field]) -> Result<(), StoreError> {
        update_claim(&self.tx, claim, changed)
    }

    fn bulk_clear_need_review(&mut self, scope: &ResetScope) -> Result<usize, StoreError> {
        clear_need_review(&self.tx, scope)
    }

    fn bulk_delete_notes(&mut self, scope: &ResetScope) -> Result<usize, StoreError> {
        delete_notes(&self.tx, scope)
    }
}

// ---------------------------------------------------------------------------
// SQL plumbing (shared between the plain connection and the tx view)
// ---------------------------------------------------------------------------

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn count(conn: &Connection, sql: &str) -> Result<usize, StoreError> {
    conn.query_row(sql, [], |row| row.get::<_, i64>(0))
        .map(|n| n as usize)
        .map_err(backend)
}

fn find_claim(conn: &Connection, claim_id: &str) -> Result<Option<Claim>, StoreError> {
    let sql = format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE claim_id = ?1");
    let raw = conn
        .query_row(&sql, params![claim_id], read_stored_claim)
        .optional()
        .map_err(backend)?;
    raw.map(decode_claim).transpose()
}

fn insert_claim(conn: &Connection, claim: &Claim) -> Result<(), StoreError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO claims (claim_id, patient_name, billed_amount, paid_amount, status, \
         insurer, discharge_date, cpt_codes, denial_reason, flagged, need_review, \
         detail_info, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            claim.claim_id,
            claim.patient_name,
            claim.billed_amount.map(|d| d.to_string()),
            claim.paid_amount.map(|d| d.to_string()),
            claim.status.as_str(),
            claim.insurer,
            claim.discharge_date.map(|d| d.to_string()),
            encode_json(&claim.claim_id, &claim.cpt_codes)?,
            claim.denial_reason,
            claim.flagged,
            claim.need_review,
            encode_json(&claim.claim_id, &claim.detail_info)?,
            now,
            now,
        ],
    )
    .map_err(backend)?;
    Ok(())
}

/// Dynamic UPDATE over exactly the changed columns, plus `updated_at`.
fn update_claim(conn: &Connection, claim: &Claim, changed: &[Field]) -> Result<(), StoreError> {
    if changed.is_empty() {
        return Ok(());
    }
    let mut assignments: Vec<String> = Vec::with_capacity(changed.len() + 1);
    let mut values: Vec<Box<dyn ToSql>> = Vec::with_capacity(changed.len() + 2);
    for field in changed {
        assignments.push(format!("{} = ?", field.as_str()));
        values.push(field_param(claim, *field)?);
    }
    assignments.push("updated_at = ?".to_string());
    values.push(Box::new(Utc::now().to_rfc3339()));
    values.push(Box::new(claim.claim_id.clone()));

    let sql = format!(
        "UPDATE claims SET {} WHERE claim_id = ?",
        assignments.join(", ")
    );
    let updated = conn
        .execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))
        .map_err(backend)?;
    if updated == 0 {
        return Err(StoreError::Backend(format!(
            "claim {} disappeared mid-update",
            claim.claim_id
        )));
    }
    Ok(())
}

fn field_param(claim: &Claim, field: Field) -> Result<Box<dyn ToSql>, StoreError> {
    Ok(match field {
        Field::PatientName => Box::new(claim.patient_name.clone()),
        Field::Insurer => Box::new(claim.insurer.clone()),
        Field::DenialReason => Box::new(claim.denial_reason.clone()),
        Field::BilledAmount => Box::new(claim.billed_amount.map(|d| d.to_string())),
        Field::PaidAmount => Box::new(claim.paid_amount.map(|d| d.to_string())),
        Field::Status => Box::new(claim.status.as_str().to_string()),
        Field::DischargeDate => Box::new(claim.discharge_date.map(|d| d.to_string())),
        Field::CptCodes => Box::new(encode_json(&claim.claim_id, &claim.cpt_codes)?),
        Field::Flagged => Box::new(claim.flagged),
        Field::DetailInfo => Box::new(encode_json(&claim.claim_id, &claim.detail_info)?),
    })
}

fn clear_need_review(conn: &Connection, scope: &ResetScope) -> Result<usize, StoreError> {
    let now = Utc::now().to_rfc3339();
    match scope {
        ResetScope::All => conn
            .execute(
                "UPDATE claims SET need_review = 0, updated_at = ?1 WHERE need_review = 1",
                params![now],
            )
            .map_err(backend),
        ResetScope::File(ids) => {
            if ids.is_empty() {
                return Ok(0);
            }
            let sql = format!(
                "UPDATE claims SET need_review = 0, updated_at = ? \
                 WHERE need_review = 1 AND claim_id IN ({})",
                placeholders(ids.len())
            );
            let mut values: Vec<&dyn ToSql> = Vec::with_capacity(ids.len() + 1);
            values.push(&now);
            for id in ids {
                values.push(id);
            }
            conn.execute(&sql, params_from_iter(values)).map_err(backend)
        }
    }
}

fn delete_notes(conn: &Connection, scope: &ResetScope) -> Result<usize, StoreError> {
    match scope {
        ResetScope::All => conn.execute("DELETE FROM notes", []).map_err(backend),
        ResetScope::File(ids) => {
            if ids.is_empty() {
                return Ok(0);
            }
            let sql = format!(
                "DELETE FROM notes WHERE claim_id IN ({})",
                placeholders(ids.len())
            );
            conn.execute(&sql, params_from_iter(ids.iter()))
                .map_err(backend)
        }
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

// ---------------------------------------------------------------------------
// Row encoding / decoding
// ---------------------------------------------------------------------------

struct StoredClaim {
    claim_id: String,
    patient_name: String,
    billed_amount: Option<String>,
    paid_amount: Option<String>,
    status: String,
    insurer: String,
    discharge_date: Option<String>,
    cpt_codes: String,
    denial_reason: String,
    flagged: bool,
    need_review: bool,
    detail_info: String,
    created_at: String,
    updated_at: String,
}

fn read_stored_claim(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredClaim> {
    Ok(StoredClaim {
        claim_id: row.get(0)?,
        patient_name: row.get(1)?,
        billed_amount: row.get(2)?,
        paid_amount: row.get(3)?,
        status: row.get(4)?,
        insurer: row.get(5)?,
        discharge_date: row.get(6)?,
        cpt_codes: row.get(7)?,
        denial_reason: row.get(8)?,
        flagged: row.get(9)?,
        need_review: row.get(10)?,
        detail_info: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn decode_claim(raw: StoredClaim) -> Result<Claim, StoreError> {
    let billed_amount = decode_amount(&raw.claim_id, "billed_amount", raw.billed_amount.as_deref())?;
    let paid_amount = decode_amount(&raw.claim_id, "paid_amount", raw.paid_amount.as_deref())?;
    let discharge_date = decode_date(&raw.claim_id, raw.discharge_date.as_deref())?;
    let cpt_codes: Vec<String> = decode_json(&raw.claim_id, "cpt_codes", &raw.cpt_codes)?;
    let detail_info: DetailMap = decode_json(&raw.claim_id, "detail_info", &raw.detail_info)?;
    let created_at = decode_timestamp(&raw.claim_id, "created_at", &raw.created_at)?;
    let updated_at = decode_timestamp(&raw.claim_id, "updated_at", &raw.updated_at)?;
    Ok(Claim {
        status: ClaimStatus::from_stored(&raw.status),
        claim_id: raw.claim_id,
        patient_name: raw.patient_name,
        billed_amount,
        paid_amount,
        insurer: raw.insurer,
        discharge_date,
        cpt_codes,
        denial_reason: raw.denial_reason,
        flagged: raw.flagged,
        need_review: raw.need_review,
        detail_info,
        created_at,
        updated_at,
    })
}

fn encode_json<T: serde::Serialize>(claim_id: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value)
        .map_err(|e| StoreError::Encode(format!("claim {claim_id}: {e}")))
}

fn decode_json<T: serde::de::DeserializeOwned>(
    claim_id: &str,
    column: &str,
    raw: &str,
) -> Result<T, StoreError> {
    serde_json::from_str(raw)
        .map_err(|e| StoreError::Decode(format!("claim {claim_id} {column}: {e}")))
}

fn decode_amount(
    claim_id: &str,
    column: &str,
    raw: Option<&str>,
) -> Result<Option<Decimal>, StoreError> {
    match raw {
        None => Ok(None),
        Some(s) => Decimal::from_str(s)
            .map(Some)
            .map_err(|e| StoreError::Decode(format!("claim {claim_id} {column}: {e}"))),
    }
}

fn decode_date(claim_id: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, StoreError> {
    match raw {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| StoreError::Decode(format!("claim {claim_id} discharge_date: {e}"))),
    }
}

fn decode_timestamp(claim_id: &str, column: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::Decode(format!("claim {claim_id} {column}: {e}")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
