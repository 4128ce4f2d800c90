//! Per-invocation load options.
//!
//! One immutable value threaded from the CLI through the readers and the
//! engine; nothing is read from ambient state. Policy-specific knobs are
//! simply ignored by the other policy (the CLI never sets them there).

use std::fmt;

/// Which merge policy a run applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Authoritative bulk import: the file is the source of truth for every
    /// field it supplies.
    FullLoad,
    /// Incremental enrichment: existing values survive blanks unless
    /// overwrite is enabled.
    DetailMerge,
}

/// Note cleanup before the upsert pass (full load only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteReset {
    All,
    File,
    Keep,
}

impl NoteReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::File => "file",
            Self::Keep => "keep",
        }
    }
}

impl fmt::Display for NoteReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Review-flag cleanup before the upsert pass (full load only). Wrapped in
/// `Option` on [`LoadOptions`]; `None` leaves flags alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewReset {
    All,
    File,
}

impl ReviewReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::File => "file",
        }
    }
}

impl fmt::Display for ReviewReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input format selection for the readers. `Auto` detects by extension,
/// then by peeking the first non-whitespace character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatChoice {
    Auto,
    Delimited,
    Json,
}

/// Delimiter selection for the delimited reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterChoice {
    /// A fixed single-byte delimiter (`--delimiter`, or the per-command
    /// default).
    Fixed(u8),
    /// Sniff by consistency-scoring candidate delimiters over the first
    /// lines; comma when nothing scores.
    Sniff,
}

/// Everything one invocation needs to know.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub policy: LoadPolicy,
    pub format: FormatChoice,
    pub delimiter: DelimiterChoice,
    /// Run the identical eligibility logic but perform no store mutation.
    pub dry_run: bool,
    /// Detail merge only: apply blanks too, explicitly clearing stored
    /// fields (status and booleans excepted — they have no empty state).
    pub overwrite: bool,
    /// Detail merge only: create a minimal stub when the target claim does
    /// not exist, then patch it with the same record.
    pub create_missing: bool,
    /// Full load only.
    pub reset_notes: NoteReset,
    /// Full load only.
    pub reset_need_review: Option<ReviewReset>,
}

impl LoadOptions {
    /// Defaults for `load-full`: pipe-delimited, notes kept, no resets.
    pub fn full_load() -> Self {
        Self {
            policy: LoadPolicy::FullLoad,
            format: FormatChoice::Auto,
            delimiter: DelimiterChoice::Fixed(b'|'),
            dry_run: false,
            overwrite: false,
            create_missing: false,
            reset_notes: NoteReset::Keep,
            reset_need_review: None,
        }
    }

    /// Defaults for `load-details`: sniffed delimiter, non-destructive.
    pub fn detail_merge() -> Self {
        Self {
            policy: LoadPolicy::DetailMerge,
            format: FormatChoice::Auto,
            delimiter: DelimiterChoice::Sniff,
            dry_run: false,
            overwrite: false,
            create_missing: false,
            reset_notes: NoteReset::Keep,
            reset_need_review: None,
        }
    }
}
