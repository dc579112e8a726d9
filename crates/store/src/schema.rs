// SQLite schema for the mismatch ledger

use rusqlite::Connection;

pub(crate) const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS spotcheck_report (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference_type TEXT NOT NULL,
    datasource TEXT NOT NULL,
    content_type TEXT NOT NULL,
    report_date_time TEXT NOT NULL,
    reference_date_time TEXT NOT NULL,
    notes TEXT,
    checked INTEGER NOT NULL            -- 0 = comparison never produced results
);

CREATE TABLE IF NOT EXISTS spotcheck_mismatch (
    mismatch_id INTEGER PRIMARY KEY AUTOINCREMENT,
    report_id INTEGER NOT NULL REFERENCES spotcheck_report(id),
    key TEXT NOT NULL,                  -- JSON object of the key map
    mismatch_type TEXT NOT NULL,
    datasource TEXT NOT NULL,
    content_type TEXT NOT NULL,
    reference_type TEXT NOT NULL,
    reference_active_date_time TEXT NOT NULL,
    state TEXT NOT NULL,
    reference_data TEXT NOT NULL,
    observed_data TEXT NOT NULL,
    notes TEXT,
    issue_ids TEXT NOT NULL DEFAULT '[]',   -- JSON array
    ignore_status TEXT NOT NULL,
    report_date_time TEXT NOT NULL,
    observed_date_time TEXT NOT NULL,
    first_seen_date_time TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_mismatch_identity
    ON spotcheck_mismatch (datasource, key, mismatch_type, mismatch_id);

CREATE INDEX IF NOT EXISTS idx_mismatch_report
    ON spotcheck_mismatch (report_id);

CREATE TRIGGER IF NOT EXISTS trg_spotcheck_mismatch_no_delete
BEFORE DELETE ON spotcheck_mismatch
BEGIN
  SELECT RAISE(FAIL, 'spotcheck_mismatch is append-only');
END;

CREATE TRIGGER IF NOT EXISTS trg_spotcheck_mismatch_frozen
BEFORE UPDATE OF mismatch_id, report_id, key, mismatch_type, datasource, content_type,
    reference_type, reference_active_date_time, state, reference_data, observed_data,
    notes, report_date_time, observed_date_time, first_seen_date_time
ON spotcheck_mismatch
BEGIN
  SELECT RAISE(FAIL, 'only ignore_status and issue_ids may change on spotcheck_mismatch');
END;

CREATE TABLE IF NOT EXISTS bill_prior_version (
    bill TEXT NOT NULL,                 -- JSON key map of the base bill
    prior_version TEXT NOT NULL,        -- JSON key map of the prior bill
    PRIMARY KEY (bill, prior_version)
);
"#;

pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}
