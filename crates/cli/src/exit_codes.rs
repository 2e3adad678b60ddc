//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                                    |
//! |---------|------------------|------------------------------------------------|
//! | 0       | Universal        | Success, including runs with per-row failures  |
//! | 1       | Universal        | General error (unspecified)                    |
//! | 2       | Universal        | CLI usage error (bad args)                     |
//! | 3       | Input            | Input file unreadable or unparseable           |
//! | 10-19   | remote           | API key, auth, upstream and match codes        |
//! | 130     | Signal           | Interrupted before producing output            |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use explorium_engine::retry::RetryFailure;
use explorium_engine::{PipelineError, RemoteError};

// =============================================================================
// Universal (0-3)
// =============================================================================

/// Success. Rows that failed to match or enrich are reported in the output
/// and summary, not through the exit code.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Input file missing, unreadable, or not CSV/JSON rows.
pub const EXIT_INPUT: u8 = 3;

// =============================================================================
// Remote (10-19)
// =============================================================================

/// No API key (neither config file nor EXPLORIUM_API_KEY).
pub const EXIT_MISSING_KEY: u8 = 10;

/// Auth rejected by the API (401/403).
pub const EXIT_AUTH: u8 = 11;

/// Upstream error or network failure after retries, on a call the command
/// cannot continue without (single-entity commands, first search page).
pub const EXIT_REMOTE: u8 = 12;

/// Single-entity command found no match, or only low-confidence ones.
pub const EXIT_NO_MATCH: u8 = 13;

/// Config file unreadable or holding invalid values.
pub const EXIT_CONFIG: u8 = 14;

// =============================================================================
// Signal
// =============================================================================

/// Interrupted (SIGINT/SIGTERM) before any output was written.
pub const EXIT_CANCELLED: u8 = 130;

/// Exit code for a terminal failure of a required remote call.
pub fn remote_exit_code(err: &RemoteError) -> u8 {
    if err.is_auth() {
        EXIT_AUTH
    } else {
        EXIT_REMOTE
    }
}

/// Exit code for a run-fatal pipeline error.
pub fn pipeline_exit_code(err: &PipelineError) -> u8 {
    match err {
        PipelineError::Fatal(_) => EXIT_AUTH,
        PipelineError::Input(_) => EXIT_INPUT,
        PipelineError::InvalidThreshold(_) | PipelineError::InvalidTarget => EXIT_USAGE,
        PipelineError::FirstPage { error, .. } => remote_exit_code(error),
        PipelineError::Cancelled => EXIT_CANCELLED,
    }
}

/// Exit code for a single call that ran out of retries.
pub fn retry_exit_code(failure: &RetryFailure) -> u8 {
    remote_exit_code(&failure.error)
}
