//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unspecified)              |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | ingest           | Report file codes                        |
//! | 10-19   | ledger           | Store and lookup codes                   |
//! | 20-29   | config           | Configuration codes                      |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use spotcheck_store::StoreError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Ingest (3-9)
// =============================================================================

/// Report file unreadable or not valid report JSON.
pub const EXIT_REPORT_PARSE: u8 = 3;

/// Report parsed but cannot be merged (bad key, unknown report id, ...).
pub const EXIT_REPORT_INVALID: u8 = 4;

// =============================================================================
// Ledger (10-19)
// =============================================================================

/// Database could not be opened, read or written.
pub const EXIT_STORE: u8 = 10;

/// No ledger row with the requested mismatch id.
pub const EXIT_NOT_FOUND: u8 = 11;

// =============================================================================
// Config (20-29)
// =============================================================================

/// Config file unreadable, malformed, or failed validation.
pub const EXIT_CONFIG: u8 = 20;

// =============================================================================
// Store Error Types
// =============================================================================

/// Map a StoreError to its exit code.
pub fn store_exit_code(err: &StoreError) -> u8 {
    match err {
        StoreError::NotFound { .. } => EXIT_NOT_FOUND,
        StoreError::InvalidArgument(_) => EXIT_USAGE,
        StoreError::InvalidReport(_) | StoreError::Recon(_) => EXIT_REPORT_INVALID,
        StoreError::Sqlite(_) | StoreError::Serialization(_) | StoreError::LockPoisoned => EXIT_STORE,
    }
}
