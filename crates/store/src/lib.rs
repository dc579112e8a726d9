//! `spotcheck-store`: SQLite ledger for reconciled mismatches.
//!
//! Rows are appended per report and never deleted. Only ignore status and
//! issue ids change after a row is written.

mod bill;
mod codec;
pub mod error;
mod filter;
pub mod locks;
mod schema;
pub mod store;

pub use bill::prior_versions_changed;
pub use error::StoreError;
pub use locks::ScopeLocks;
pub use store::{ReportStore, SaveOutcome};
