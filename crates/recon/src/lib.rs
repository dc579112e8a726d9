//! `spotcheck-recon`: mismatch reconciliation engine.
//!
//! Pure engine crate: merges a report's observations against the open
//! ledger, and folds ledger rows into summaries. No storage or CLI
//! dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod key;
pub mod model;
pub mod query;
pub mod summary;
pub mod window;

pub use config::SpotCheckConfig;
pub use engine::{reconcile, MergedLedger};
pub use error::ReconError;
pub use key::{AgendaKey, BillKey, CalendarKey, ContentKey, KeyMap};
pub use model::{
    DeNormSpotCheckMismatch, MismatchIdentity, MismatchState, SpotCheckContentType, SpotCheckDataSource,
    SpotCheckMismatch, SpotCheckMismatchIgnore, SpotCheckMismatchType, SpotCheckObservation,
    SpotCheckRefType, SpotCheckReferenceId, SpotCheckReport,
};
pub use query::{LimitOffset, MismatchQuery, OrderBy, PaginatedList, SortDirection, SortField};
pub use summary::{ContentTypeSummary, StatusSummary, TypeSummary};
pub use window::{DateTimeRange, MismatchStatus};
