// SQLite-backed mismatch ledger

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, error, info, warn};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::Serialize;

use spotcheck_recon::window::session_window;
use spotcheck_recon::{
    reconcile, ContentKey, ContentTypeSummary, DeNormSpotCheckMismatch, LimitOffset, MismatchQuery,
    MismatchState, MismatchStatus, PaginatedList, ReconError, SpotCheckContentType, SpotCheckDataSource,
    SpotCheckMismatchIgnore, SpotCheckReport, StatusSummary, TypeSummary,
};

use crate::codec::{
    format_ts, insert_mismatch, insert_report_row, issue_ids_from_json, issue_ids_to_json, parse_name,
    row_to_mismatch, RawMismatch, MISMATCH_COLUMNS,
};
use crate::error::StoreError;
use crate::filter::{order_clause, SqlFilter};
use crate::locks::ScopeLocks;
use crate::schema;

/// What `save_report` did with a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaveOutcome {
    /// The comparison never ran; the report was recorded but the ledger is untouched.
    Skipped { report_id: i64 },
    /// The report's rows are already in the ledger; nothing was written.
    AlreadyMerged { report_id: i64 },
    Merged {
        report_id: i64,
        new: usize,
        existing: usize,
        resolved: usize,
    },
}

impl SaveOutcome {
    pub fn report_id(&self) -> i64 {
        match self {
            Self::Skipped { report_id } | Self::AlreadyMerged { report_id } | Self::Merged { report_id, .. } => {
                *report_id
            }
        }
    }
}

/// Append-only ledger of reconciled mismatch rows.
///
/// One connection behind a mutex; merges are additionally serialized per
/// (datasource, content type) scope, and across processes by taking the
/// SQLite write lock up front.
pub struct ReportStore {
    conn: Mutex<Connection>,
    scopes: ScopeLocks,
}

impl ReportStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        debug!("opened ledger at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        schema::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            scopes: ScopeLocks::default(),
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    // -----------------------------------------------------------------------
    // Reports
    // -----------------------------------------------------------------------

    /// Records report metadata and returns the assigned id.
    pub fn insert_report<K: ContentKey>(&self, report: &SpotCheckReport<K>) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        insert_report_row(&conn, report)
    }

    /// Records the report if needed, merges it against the open ledger and
    /// appends the result, all in one transaction.
    ///
    /// On success `report.id` holds the recorded id. On failure nothing is
    /// written and `report.id` is left as it was.
    pub fn save_report<K: ContentKey>(&self, report: &mut SpotCheckReport<K>) -> Result<SaveOutcome, StoreError> {
        let scope = self.scopes.get((report.datasource(), report.content_type()))?;
        let _merging = scope.lock().map_err(|_| StoreError::LockPoisoned)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let report_id = match report.id {
            Some(id) => {
                check_recorded_report(&tx, id, report)?;
                if report_has_rows(&tx, id)? {
                    info!("report {id} already merged, nothing to do");
                    return Ok(SaveOutcome::AlreadyMerged { report_id: id });
                }
                id
            }
            None => insert_report_row(&tx, report)?,
        };

        let previous = report.id.replace(report_id);
        let outcome = merge_report(tx, report, report_id);
        if outcome.is_err() {
            report.id = previous;
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Ledger rows
    // -----------------------------------------------------------------------

    /// Active NEW / EXISTING rows of one scope as of `report_date`.
    pub fn query_open_mismatches<K: ContentKey>(
        &self,
        datasource: SpotCheckDataSource,
        content_type: SpotCheckContentType,
        report_date: NaiveDate,
    ) -> Result<Vec<DeNormSpotCheckMismatch<K>>, StoreError> {
        let conn = self.lock()?;
        open_rows(&conn, datasource, content_type, report_date)
    }

    /// Appends rows in one transaction and returns their new ids in order.
    pub fn batch_insert_mismatches<K: ContentKey>(
        &self,
        rows: &[DeNormSpotCheckMismatch<K>],
    ) -> Result<Vec<i64>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let ids = rows
            .iter()
            .map(|row| insert_mismatch(&tx, row))
            .collect::<Result<Vec<_>, _>>()?;
        tx.commit()?;
        Ok(ids)
    }

    pub fn get_mismatch<K: ContentKey>(&self, mismatch_id: i64) -> Result<DeNormSpotCheckMismatch<K>, StoreError> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {MISMATCH_COLUMNS} FROM spotcheck_mismatch WHERE mismatch_id = ?1"),
                params![mismatch_id],
                RawMismatch::read,
            )
            .optional()?
            .ok_or(StoreError::NotFound { mismatch_id })?;
        row_to_mismatch(raw)
    }

    /// Content type of a row, for callers that must pick a key type first.
    pub fn mismatch_content_type(&self, mismatch_id: i64) -> Result<SpotCheckContentType, StoreError> {
        let conn = self.lock()?;
        let name: String = conn
            .query_row(
                "SELECT content_type FROM spotcheck_mismatch WHERE mismatch_id = ?1",
                params![mismatch_id],
                |r| r.get(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound { mismatch_id })?;
        parse_name("content_type", &name)
    }

    /// Filters, orders and paginates the active rows; `total` counts every
    /// matching row regardless of the page.
    pub fn query_mismatches<K: ContentKey>(
        &self,
        query: &MismatchQuery,
        limit_offset: LimitOffset,
    ) -> Result<PaginatedList<DeNormSpotCheckMismatch<K>>, StoreError> {
        let states = query.states();
        let mut filter = SqlFilter::active(query.datasource, session_window(query.report_date))
            .in_set("content_type", query.content_types.iter().map(|c| c.as_str()))
            .in_set("state", states.iter().map(|s| s.as_str()))
            .not_in("ignore_status", query.ignored_statuses.iter().map(|s| s.as_str()))
            .between("observed_date_time", query.observed_range)
            .between("first_seen_date_time", query.first_seen_range);
        if let Some(types) = &query.mismatch_types {
            filter = filter.in_set("mismatch_type", types.iter().map(|t| t.as_str()));
        }

        let conn = self.lock()?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM spotcheck_mismatch WHERE {}", filter.where_clause()),
            params_from_iter(filter.params()),
            |r| r.get(0),
        )?;

        let limit = limit_offset.limit.map_or(-1, |l| l as i64);
        let sql = format!(
            "SELECT {MISMATCH_COLUMNS} FROM spotcheck_mismatch WHERE {} ORDER BY {} LIMIT {limit} OFFSET {}",
            filter.where_clause(),
            order_clause(query.order_by),
            limit_offset.offset,
        );
        let results = select_rows(&conn, &sql, &filter)?;
        debug!(
            "query {} {:?} {}: {} of {total}",
            query.datasource,
            query.content_types,
            query.status,
            results.len()
        );

        Ok(PaginatedList {
            total: total as usize,
            limit_offset,
            results,
        })
    }

    // -----------------------------------------------------------------------
    // Summaries
    // -----------------------------------------------------------------------

    /// State counts over every active row of the given content types.
    pub fn status_summary(
        &self,
        report_date: NaiveDate,
        datasource: SpotCheckDataSource,
        content_types: &BTreeSet<SpotCheckContentType>,
        ignored_statuses: &BTreeSet<SpotCheckMismatchIgnore>,
    ) -> Result<StatusSummary, StoreError> {
        let filter = SqlFilter::active(datasource, session_window(report_date))
            .in_set("content_type", content_types.iter().map(|c| c.as_str()))
            .not_in("ignore_status", ignored_statuses.iter().map(|s| s.as_str()));
        let conn = self.lock()?;
        let states: Vec<MismatchState> = select_names(&conn, "state", &filter)?;
        Ok(StatusSummary::from_states(states))
    }

    /// Mismatch type counts over the rows a `status` lookup would return.
    pub fn type_summary(
        &self,
        report_date: NaiveDate,
        datasource: SpotCheckDataSource,
        content_type: SpotCheckContentType,
        status: MismatchStatus,
        ignored_statuses: &BTreeSet<SpotCheckMismatchIgnore>,
    ) -> Result<TypeSummary, StoreError> {
        let states = status.states();
        let filter = SqlFilter::active(datasource, session_window(report_date))
            .eq("content_type", content_type.as_str())
            .in_set("state", states.iter().map(|s| s.as_str()))
            .not_in("ignore_status", ignored_statuses.iter().map(|s| s.as_str()))
            .between("observed_date_time", status.observed_range(report_date))
            .between("first_seen_date_time", status.first_seen_range(report_date));
        let conn = self.lock()?;
        let types = select_names(&conn, "mismatch_type", &filter)?;
        Ok(TypeSummary::from_types(content_type, types))
    }

    /// Open row counts per content type.
    pub fn content_type_summary(
        &self,
        report_date: NaiveDate,
        datasource: SpotCheckDataSource,
        ignored_statuses: &BTreeSet<SpotCheckMismatchIgnore>,
    ) -> Result<ContentTypeSummary, StoreError> {
        let open = MismatchStatus::Open.states();
        let filter = SqlFilter::active(datasource, session_window(report_date))
            .in_set("state", open.iter().map(|s| s.as_str()))
            .not_in("ignore_status", ignored_statuses.iter().map(|s| s.as_str()));
        let conn = self.lock()?;
        let content_types: Vec<SpotCheckContentType> = select_names(&conn, "content_type", &filter)?;
        Ok(ContentTypeSummary::from_content_types(content_types))
    }

    // -----------------------------------------------------------------------
    // Annotations
    // -----------------------------------------------------------------------

    pub fn set_ignore_status(
        &self,
        mismatch_id: i64,
        status: Option<SpotCheckMismatchIgnore>,
    ) -> Result<(), StoreError> {
        let status =
            status.ok_or_else(|| StoreError::InvalidArgument("ignore status must be provided".into()))?;
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE spotcheck_mismatch SET ignore_status = ?1 WHERE mismatch_id = ?2",
            params![status.as_str(), mismatch_id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound { mismatch_id });
        }
        debug!("mismatch {mismatch_id} ignore status set to {status}");
        Ok(())
    }

    pub fn add_issue_id(&self, mismatch_id: i64, issue_id: &str) -> Result<(), StoreError> {
        let issue_id = checked_issue_id(issue_id)?;
        self.update_issue_ids(mismatch_id, |ids| {
            ids.insert(issue_id.to_string());
        })
    }

    pub fn delete_issue_id(&self, mismatch_id: i64, issue_id: &str) -> Result<(), StoreError> {
        let issue_id = checked_issue_id(issue_id)?;
        self.update_issue_ids(mismatch_id, |ids| {
            ids.remove(issue_id);
        })
    }

    /// Replaces every linked issue id with `issue_id`.
    pub fn update_issue_id(&self, mismatch_id: i64, issue_id: &str) -> Result<(), StoreError> {
        let issue_id = checked_issue_id(issue_id)?;
        self.update_issue_ids(mismatch_id, |ids| {
            ids.clear();
            ids.insert(issue_id.to_string());
        })
    }

    pub fn clear_issue_ids(&self, mismatch_id: i64) -> Result<(), StoreError> {
        self.update_issue_ids(mismatch_id, BTreeSet::clear)
    }

    fn update_issue_ids(
        &self,
        mismatch_id: i64,
        edit: impl FnOnce(&mut BTreeSet<String>),
    ) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let stored: String = tx
            .query_row(
                "SELECT issue_ids FROM spotcheck_mismatch WHERE mismatch_id = ?1",
                params![mismatch_id],
                |r| r.get(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound { mismatch_id })?;

        let mut ids = issue_ids_from_json(&stored)?;
        edit(&mut ids);
        tx.execute(
            "UPDATE spotcheck_mismatch SET issue_ids = ?1 WHERE mismatch_id = ?2",
            params![issue_ids_to_json(&ids)?, mismatch_id],
        )?;
        tx.commit()?;
        debug!("mismatch {mismatch_id} issue ids now {ids:?}");
        Ok(())
    }
}

/// How long a connection waits on another process's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

// ---------------------------------------------------------------------------
// Helpers (run on a connection or transaction the caller already holds)
// ---------------------------------------------------------------------------

fn merge_report<K: ContentKey>(
    tx: Transaction<'_>,
    report: &SpotCheckReport<K>,
    report_id: i64,
) -> Result<SaveOutcome, StoreError> {
    if report.observations.is_none() {
        warn!(
            "report {report_id} ({}) has no observations; ledger left unchanged",
            report.reference_type
        );
        tx.commit()?;
        return Ok(SaveOutcome::Skipped { report_id });
    }

    let open = open_rows(&tx, report.datasource(), report.content_type(), report.report_date_time.date())?;
    let merged = reconcile(report, &open)?;
    for row in &merged.rows {
        insert_mismatch(&tx, row)?;
    }
    tx.commit()?;

    let outcome = SaveOutcome::Merged {
        report_id,
        new: merged.count(MismatchState::New),
        existing: merged.count(MismatchState::Existing),
        resolved: merged.count(MismatchState::Resolved),
    };
    info!(
        "merged report {report_id} ({}): {} rows against {} open",
        report.reference_type,
        merged.rows.len(),
        open.len()
    );
    Ok(outcome)
}

fn open_rows<K: ContentKey>(
    conn: &Connection,
    datasource: SpotCheckDataSource,
    content_type: SpotCheckContentType,
    report_date: NaiveDate,
) -> Result<Vec<DeNormSpotCheckMismatch<K>>, StoreError> {
    let open = MismatchStatus::Open.states();
    let filter = SqlFilter::active(datasource, session_window(report_date))
        .eq("content_type", content_type.as_str())
        .in_set("state", open.iter().map(|s| s.as_str()));
    let sql = format!(
        "SELECT {MISMATCH_COLUMNS} FROM spotcheck_mismatch WHERE {} ORDER BY mismatch_id",
        filter.where_clause()
    );
    select_rows(conn, &sql, &filter)
}

fn select_rows<K: ContentKey>(
    conn: &Connection,
    sql: &str,
    filter: &SqlFilter,
) -> Result<Vec<DeNormSpotCheckMismatch<K>>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let raws = stmt
        .query_map(params_from_iter(filter.params()), RawMismatch::read)?
        .collect::<Result<Vec<_>, _>>()?;
    raws.into_iter().map(row_to_mismatch).collect()
}

/// Reads one enum-valued column from every matching row.
fn select_names<T: FromStr<Err = ReconError>>(
    conn: &Connection,
    column: &str,
    filter: &SqlFilter,
) -> Result<Vec<T>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {column} FROM spotcheck_mismatch WHERE {}",
        filter.where_clause()
    ))?;
    let names = stmt
        .query_map(params_from_iter(filter.params()), |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    names.iter().map(|n| parse_name(column, n)).collect()
}

/// A pre-assigned id must name a recorded report of the same reference type
/// and report time.
fn check_recorded_report<K: ContentKey>(
    conn: &Connection,
    report_id: i64,
    report: &SpotCheckReport<K>,
) -> Result<(), StoreError> {
    let recorded: Option<(String, String)> = conn
        .query_row(
            "SELECT reference_type, report_date_time FROM spotcheck_report WHERE id = ?1",
            params![report_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((reference_type, report_date_time)) = recorded else {
        error!("report {report_id} ({}) was never recorded", report.reference_type);
        return Err(StoreError::InvalidReport(format!("report {report_id} has not been recorded")));
    };
    if reference_type != report.reference_type.as_str() || report_date_time != format_ts(report.report_date_time) {
        error!(
            "report {report_id} was recorded as {reference_type} at {report_date_time}, not {} at {}",
            report.reference_type, report.report_date_time
        );
        return Err(StoreError::InvalidReport(format!(
            "report {report_id} was recorded as {reference_type} at {report_date_time}"
        )));
    }
    Ok(())
}

fn report_has_rows(conn: &Connection, report_id: i64) -> Result<bool, StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT mismatch_id FROM spotcheck_mismatch WHERE report_id = ?1 LIMIT 1",
            params![report_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn checked_issue_id(issue_id: &str) -> Result<&str, StoreError> {
    let trimmed = issue_id.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidArgument("issue id must not be blank".into()));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use spotcheck_recon::{
        BillKey, CalendarKey, SpotCheckMismatch, SpotCheckMismatchType, SpotCheckObservation, SpotCheckRefType,
    };

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, day).unwrap().and_hms_opt(10, 0, 0).unwrap()
    }

    fn report(day: u32, bills: &[&str]) -> SpotCheckReport<BillKey> {
        let mut r = SpotCheckReport::new(SpotCheckRefType::LbdcDaybreak, at(day), at(day));
        r.mark_checked();
        for print_no in bills {
            let mut ob = SpotCheckObservation::new(BillKey::base(print_no, 2025), r.reference_id(), at(day));
            ob.add_mismatch(SpotCheckMismatch::new(SpotCheckMismatchType::BillTitle, "ref", "obs"));
            r.add_observation(ob);
        }
        r
    }

    #[test]
    fn save_assigns_report_id() {
        let store = ReportStore::open_in_memory().unwrap();
        let mut r = report(1, &["S1"]);
        let outcome = store.save_report(&mut r).unwrap();
        assert_eq!(Some(outcome.report_id()), r.id);
        assert!(matches!(outcome, SaveOutcome::Merged { new: 1, existing: 0, resolved: 0, .. }));
    }

    #[test]
    fn unknown_report_id_is_rejected_without_writing() {
        let store = ReportStore::open_in_memory().unwrap();
        let mut r = report(1, &["S1"]);
        r.id = Some(77);
        assert!(matches!(store.save_report(&mut r), Err(StoreError::InvalidReport(_))));
        assert_eq!(r.id, Some(77));
        let open: Vec<DeNormSpotCheckMismatch<BillKey>> = store
            .query_open_mismatches(SpotCheckDataSource::Lbdc, SpotCheckContentType::Bill, at(1).date())
            .unwrap();
        assert!(open.is_empty());
    }

    #[test]
    fn recorded_id_from_another_scope_is_rejected() {
        let store = ReportStore::open_in_memory().unwrap();
        let calendar: SpotCheckReport<CalendarKey> =
            SpotCheckReport::new(SpotCheckRefType::LbdcCalendarAlert, at(1), at(1));
        let calendar_id = store.insert_report(&calendar).unwrap();

        let mut bills = report(1, &["S1"]);
        bills.id = Some(calendar_id);
        assert!(matches!(store.save_report(&mut bills), Err(StoreError::InvalidReport(_))));
        assert_eq!(bills.id, Some(calendar_id));
        let open: Vec<DeNormSpotCheckMismatch<BillKey>> = store
            .query_open_mismatches(SpotCheckDataSource::Lbdc, SpotCheckContentType::Bill, at(1).date())
            .unwrap();
        assert!(open.is_empty());
    }

    #[test]
    fn recorded_id_with_another_report_time_is_rejected() {
        let store = ReportStore::open_in_memory().unwrap();
        let recorded = store.insert_report(&report(1, &[])).unwrap();

        let mut later = report(2, &["S1"]);
        later.id = Some(recorded);
        assert!(matches!(store.save_report(&mut later), Err(StoreError::InvalidReport(_))));

        let mut same = report(1, &["S1"]);
        same.id = Some(recorded);
        assert!(matches!(
            store.save_report(&mut same).unwrap(),
            SaveOutcome::Merged { new: 1, .. }
        ));
    }

    #[test]
    fn merge_waits_for_another_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        drop(ReportStore::open(&path).unwrap());

        let holder = Connection::open(&path).unwrap();
        holder.execute_batch("BEGIN IMMEDIATE;").unwrap();

        let merge_path = path.clone();
        let merging = std::thread::spawn(move || {
            let store = ReportStore::open(&merge_path).unwrap();
            store.save_report(&mut report(1, &["S1"]))
        });

        std::thread::sleep(std::time::Duration::from_millis(150));
        holder.execute_batch("COMMIT;").unwrap();

        let outcome = merging.join().unwrap().unwrap();
        assert!(matches!(outcome, SaveOutcome::Merged { new: 1, .. }));
    }

    #[test]
    fn content_type_lookup() {
        let store = ReportStore::open_in_memory().unwrap();
        store.save_report(&mut report(1, &["S1"])).unwrap();
        assert_eq!(store.mismatch_content_type(1).unwrap(), SpotCheckContentType::Bill);
        assert!(matches!(
            store.mismatch_content_type(2),
            Err(StoreError::NotFound { mismatch_id: 2 })
        ));
    }

    #[test]
    fn blank_issue_ids_are_rejected() {
        assert!(matches!(checked_issue_id("  "), Err(StoreError::InvalidArgument(_))));
        assert_eq!(checked_issue_id(" 1234 ").unwrap(), "1234");
    }
}
