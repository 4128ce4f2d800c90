// `cdock load-full` / `cdock load-details` - file-to-store batch loads
//
// Both commands share one pipeline: read the file, normalize rows into
// canonical records, reconcile them against the store. Reader and argument
// failures surface before the store is opened; everything after that runs
// inside a single transaction. Dry runs call the same engine but skip the
// transaction entirely.

use std::path::{Path, PathBuf};

use serde::Serialize;

use claimdock_engine::engine::run_load;
use claimdock_engine::normalize::normalize_rows;
use claimdock_engine::options::{
    DelimiterChoice, FormatChoice, LoadOptions, LoadPolicy, NoteReset, ReviewReset,
};
use claimdock_engine::report::{ClaimDiff, LoadReport, SkipReason};
use claimdock_io::SqliteStore;

use crate::settings;
use crate::{CliError, FormatArg, NoteResetArg, ReviewResetArg};

pub fn cmd_load_full(
    path: PathBuf,
    format: FormatArg,
    delimiter: char,
    reset_notes: NoteResetArg,
    reset_need_review: Option<ReviewResetArg>,
    dry_run: bool,
    db: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let mut options = LoadOptions::full_load();
    options.format = format_choice(format);
    options.delimiter = DelimiterChoice::Fixed(delimiter_byte(delimiter)?);
    options.reset_notes = match reset_notes {
        NoteResetArg::All => NoteReset::All,
        NoteResetArg::File => NoteReset::File,
        NoteResetArg::Keep => NoteReset::Keep,
    };
    options.reset_need_review = reset_need_review.map(|scope| match scope {
        ReviewResetArg::All => ReviewReset::All,
        ReviewResetArg::File => ReviewReset::File,
    });
    options.dry_run = dry_run;

    run_command("load-full", &path, &options, db, json)
}

pub fn cmd_load_details(
    path: PathBuf,
    delimiter: Option<char>,
    overwrite: bool,
    create_missing: bool,
    dry_run: bool,
    db: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let mut options = LoadOptions::detail_merge();
    if let Some(c) = delimiter {
        options.delimiter = DelimiterChoice::Fixed(delimiter_byte(c)?);
    }
    options.overwrite = overwrite;
    options.create_missing = create_missing;
    options.dry_run = dry_run;

    run_command("load-details", &path, &options, db, json)
}

fn format_choice(arg: FormatArg) -> FormatChoice {
    match arg {
        FormatArg::Auto => FormatChoice::Auto,
        FormatArg::Csv => FormatChoice::Delimited,
        FormatArg::Json => FormatChoice::Json,
    }
}

fn delimiter_byte(c: char) -> Result<u8, CliError> {
    if !c.is_ascii() {
        return Err(CliError::args(format!(
            "--delimiter must be a single ASCII character, got {c:?}"
        )));
    }
    Ok(c as u8)
}

fn run_command(
    command: &str,
    path: &Path,
    options: &LoadOptions,
    db: Option<PathBuf>,
    json: bool,
) -> Result<(), CliError> {
    let file = claimdock_io::load_rows(path, options).map_err(CliError::read)?;
    let records = normalize_rows(&file.rows);

    let db_path = settings::resolve_db_path(db);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CliError::runtime(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
    }
    let mut store = SqliteStore::open(&db_path)
        .map_err(|e| CliError::runtime(format!("cannot open {}: {e}", db_path.display())))?;

    let report = if options.dry_run {
        run_load(&mut store, &records, options).map_err(CliError::load)?
    } else {
        store
            .transaction(|tx| run_load(tx, &records, options))
            .map_err(CliError::load)?
    };

    print_warnings(&report, options);
    if json {
        print_json(command, path, file.kind.as_str(), &report, options)?;
    }
    print_summary(command, path, file.kind.as_str(), &report, options);
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_warnings(report: &LoadReport, options: &LoadOptions) {
    for skip in &report.skipped_rows {
        match skip.reason {
            SkipReason::MissingClaimId => {
                eprintln!("warning: row {}: no resolvable claim id, skipped", skip.row);
            }
            SkipReason::TargetNotFound => {
                let id = skip.claim_id.as_deref().unwrap_or("?");
                eprintln!("warning: row {}: claim {id} not found, skipped", skip.row);
            }
        }
    }
    if !options.create_missing
        && report.skipped_rows.iter().any(|s| s.reason == SkipReason::TargetNotFound)
    {
        eprintln!("hint:  pass --create-missing to stub claims the store has never seen");
    }
    if report.all_rows_missing_id() {
        eprintln!("warning: no row carried a usable claim id; the whole pass was a no-op");
    }
}

/// Human summary, always on stderr. Stdout belongs to `--json`.
fn print_summary(
    command: &str,
    path: &Path,
    format: &str,
    report: &LoadReport,
    options: &LoadOptions,
) {
    let tag = if report.dry_run { " (dry run)" } else { "" };
    eprintln!("{command}{tag}: {} ({format}, {} rows)", path.display(), report.rows);

    if report.dry_run {
        eprintln!(
            "  would create {}, update {}, skip {}",
            report.created, report.updated, report.skipped
        );
        // Resets only fire when the file names at least one claim.
        let had_ids = report.rows > 0 && !report.all_rows_missing_id();
        if had_ids {
            if options.reset_notes != NoteReset::Keep {
                eprintln!("  would delete notes ({})", options.reset_notes);
            }
            if let Some(scope) = options.reset_need_review {
                eprintln!("  would clear review flags ({scope})");
            }
        }
        for diff in &report.diffs {
            for change in &diff.changes {
                eprintln!(
                    "  {}: {} {} -> {}",
                    diff.claim_id,
                    change.field.as_str(),
                    change.from,
                    change.to
                );
            }
        }
    } else {
        eprintln!(
            "  created {}, updated {}, skipped {}",
            report.created, report.updated, report.skipped
        );
        if let Some(n) = report.notes_deleted {
            eprintln!("  notes deleted: {n} ({})", options.reset_notes);
        }
        if let (Some(n), Some(scope)) = (report.need_review_cleared, options.reset_need_review) {
            eprintln!("  review flags cleared: {n} ({scope})");
        }
    }
}

#[derive(Serialize)]
struct RunSummary<'a> {
    command: &'a str,
    path: String,
    format: &'a str,
    rows: usize,
    created: usize,
    updated: usize,
    skipped: usize,
    dry_run: bool,
    notes_deleted: Option<usize>,
    need_review_cleared: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    diffs: Option<&'a [ClaimDiff]>,
}

fn print_json(
    command: &str,
    path: &Path,
    format: &str,
    report: &LoadReport,
    options: &LoadOptions,
) -> Result<(), CliError> {
    let diffs = (report.dry_run && options.policy == LoadPolicy::DetailMerge)
        .then_some(report.diffs.as_slice());
    let summary = RunSummary {
        command,
        path: path.display().to_string(),
        format,
        rows: report.rows,
        created: report.created,
        updated: report.updated,
        skipped: report.skipped,
        dry_run: report.dry_run,
        notes_deleted: report.notes_deleted,
        need_review_cleared: report.need_review_cleared,
        diffs,
    };
    let json_str = serde_json::to_string_pretty(&summary)
        .map_err(|e| CliError::runtime(format!("JSON serialization error: {e}")))?;
    println!("{json_str}");
    Ok(())
}
