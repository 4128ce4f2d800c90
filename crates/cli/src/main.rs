// Claimdock CLI - batch claim file loaders

mod exit_codes;
mod load;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "cdock")]
#[command(about = "Batch claim loaders: normalize files and reconcile them into the claim store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authoritative full load: the file is the source of truth for every field it supplies
    #[command(after_help = "\
Examples:
  cdock load-full claims_2024.csv
  cdock load-full claims.txt --delimiter ';' --reset-notes file
  cdock load-full claims.json --reset-need-review all --dry-run
  cdock load-full claims.csv --db ./claims.db --json")]
    LoadFull {
        /// Input file (pipe-delimited text, CSV or JSON)
        path: PathBuf,

        /// Force the input format instead of detecting it
        #[arg(long, value_enum, default_value = "auto")]
        format: FormatArg,

        /// Field delimiter for delimited input
        #[arg(long, default_value = "|")]
        delimiter: char,

        /// Delete notes before the load: every note, or only those of
        /// claims named by the file
        #[arg(long, value_enum, default_value = "keep")]
        reset_notes: NoteResetArg,

        /// Clear review flags before the load
        #[arg(long, value_enum)]
        reset_need_review: Option<ReviewResetArg>,

        /// Compute and report without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Claim database path
        #[arg(long, env = "CLAIMDOCK_DB")]
        db: Option<PathBuf>,

        /// Print a machine-readable JSON summary on stdout
        #[arg(long)]
        json: bool,
    },

    /// Non-destructive detail merge: enrich existing claims, never
    /// clobbering stored values with blanks
    #[command(after_help = "\
Examples:
  cdock load-details remits.csv
  cdock load-details remits.csv --overwrite --dry-run
  cdock load-details details.ndjson --create-missing
  cdock load-details remits.csv --delimiter ';' --json")]
    LoadDetails {
        /// Input file (CSV or JSON; format detected automatically)
        path: PathBuf,

        /// Field delimiter for delimited input (sniffed when omitted)
        #[arg(long)]
        delimiter: Option<char>,

        /// Apply blank values too, explicitly clearing stored fields
        #[arg(long)]
        overwrite: bool,

        /// Create a stub claim when the target does not exist
        #[arg(long)]
        create_missing: bool,

        /// Compute and report without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Claim database path
        #[arg(long, env = "CLAIMDOCK_DB")]
        db: Option<PathBuf>,

        /// Print a machine-readable JSON summary on stdout
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    /// Detect by extension, then by content
    Auto,
    /// Delimited text
    Csv,
    /// JSON array of objects, or NDJSON
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum NoteResetArg {
    All,
    File,
    Keep,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReviewResetArg {
    All,
    File,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::LoadFull {
            path,
            format,
            delimiter,
            reset_notes,
            reset_need_review,
            dry_run,
            db,
            json,
        } => load::cmd_load_full(
            path,
            format,
            delimiter,
            reset_notes,
            reset_need_review,
            dry_run,
            db,
            json,
        ),
        Commands::LoadDetails {
            path,
            delimiter,
            overwrite,
            create_missing,
            dry_run,
            db,
            json,
        } => load::cmd_load_details(
            path,
            delimiter,
            overwrite,
            create_missing,
            dry_run,
            db,
            json,
        ),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Reader failures are usage errors: they surface before any store
    /// access, so nothing was written.
    pub fn read(err: claimdock_io::ReadError) -> Self {
        Self { code: EXIT_USAGE, message: err.to_string(), hint: None }
    }

    /// Engine/store failures abort the batch; the transaction rolled back.
    pub fn load(err: claimdock_engine::LoadError) -> Self {
        Self { code: EXIT_ERROR, message: err.to_string(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
