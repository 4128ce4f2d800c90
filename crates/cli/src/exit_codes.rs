//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract — scripts rely on them.
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Success (a fully skipped pass still succeeds)                  |
//! | 1    | Runtime failure: store/transaction error, the batch rolled back |
//! | 2    | Usage error: bad arguments, unreadable input, malformed JSON   |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Runtime failure after reading the input; no partial batch survives.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing or malformed input file.
pub const EXIT_USAGE: u8 = 2;
