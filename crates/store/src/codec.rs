// Column encodings for ledger rows

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};

use spotcheck_recon::{
    ContentKey, DeNormSpotCheckMismatch, KeyMap, ReconError, SpotCheckReferenceId, SpotCheckReport,
};

use crate::error::StoreError;

/// Fixed-width, so text comparison in SQL orders the same as the timestamps.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9f";

pub(crate) const MISMATCH_COLUMNS: &str = "mismatch_id, report_id, key, mismatch_type, datasource, \
     content_type, reference_type, reference_active_date_time, state, reference_data, observed_data, \
     notes, issue_ids, ignore_status, report_date_time, observed_date_time, first_seen_date_time";

pub(crate) fn format_ts(t: NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_ts(column: &str, s: &str) -> Result<NaiveDateTime, StoreError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| StoreError::Serialization(format!("{column} '{s}': {e}")))
}

pub(crate) fn parse_name<T: FromStr<Err = ReconError>>(column: &str, s: &str) -> Result<T, StoreError> {
    s.parse()
        .map_err(|e: ReconError| StoreError::Serialization(format!("{column}: {e}")))
}

/// Key maps are `BTreeMap`s, so equal keys always encode to the same text
/// and can be grouped on directly.
pub(crate) fn key_to_json<K: ContentKey>(key: &K) -> Result<String, StoreError> {
    Ok(serde_json::to_string(&key.to_map())?)
}

pub(crate) fn key_from_json<K: ContentKey>(s: &str) -> Result<K, StoreError> {
    let map: KeyMap = serde_json::from_str(s)?;
    Ok(K::from_map(&map)?)
}

pub(crate) fn issue_ids_to_json(ids: &BTreeSet<String>) -> Result<String, StoreError> {
    Ok(serde_json::to_string(ids)?)
}

pub(crate) fn issue_ids_from_json(s: &str) -> Result<BTreeSet<String>, StoreError> {
    Ok(serde_json::from_str(s)?)
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A `spotcheck_mismatch` row as stored, before decoding.
pub(crate) struct RawMismatch {
    mismatch_id: i64,
    report_id: i64,
    key: String,
    mismatch_type: String,
    datasource: String,
    content_type: String,
    reference_type: String,
    reference_active_date_time: String,
    state: String,
    reference_data: String,
    observed_data: String,
    notes: Option<String>,
    issue_ids: String,
    ignore_status: String,
    report_date_time: String,
    observed_date_time: String,
    first_seen_date_time: String,
}

impl RawMismatch {
    /// Expects the columns in `MISMATCH_COLUMNS` order.
    pub(crate) fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            mismatch_id: row.get(0)?,
            report_id: row.get(1)?,
            key: row.get(2)?,
            mismatch_type: row.get(3)?,
            datasource: row.get(4)?,
            content_type: row.get(5)?,
            reference_type: row.get(6)?,
            reference_active_date_time: row.get(7)?,
            state: row.get(8)?,
            reference_data: row.get(9)?,
            observed_data: row.get(10)?,
            notes: row.get(11)?,
            issue_ids: row.get(12)?,
            ignore_status: row.get(13)?,
            report_date_time: row.get(14)?,
            observed_date_time: row.get(15)?,
            first_seen_date_time: row.get(16)?,
        })
    }
}

pub(crate) fn row_to_mismatch<K: ContentKey>(raw: RawMismatch) -> Result<DeNormSpotCheckMismatch<K>, StoreError> {
    Ok(DeNormSpotCheckMismatch {
        mismatch_id: Some(raw.mismatch_id),
        key: key_from_json(&raw.key)?,
        mismatch_type: parse_name("mismatch_type", &raw.mismatch_type)?,
        datasource: parse_name("datasource", &raw.datasource)?,
        content_type: parse_name("content_type", &raw.content_type)?,
        report_id: raw.report_id,
        reference_id: SpotCheckReferenceId::new(
            parse_name("reference_type", &raw.reference_type)?,
            parse_ts("reference_active_date_time", &raw.reference_active_date_time)?,
        ),
        state: parse_name("state", &raw.state)?,
        reference_data: raw.reference_data,
        observed_data: raw.observed_data,
        notes: raw.notes,
        issue_ids: issue_ids_from_json(&raw.issue_ids)?,
        ignore_status: parse_name("ignore_status", &raw.ignore_status)?,
        report_date_time: parse_ts("report_date_time", &raw.report_date_time)?,
        observed_date_time: parse_ts("observed_date_time", &raw.observed_date_time)?,
        first_seen_date_time: parse_ts("first_seen_date_time", &raw.first_seen_date_time)?,
    })
}

/// Appends one ledger row. Any `mismatch_id` already on the row is ignored;
/// the database assigns a fresh one.
pub(crate) fn insert_mismatch<K: ContentKey>(
    conn: &Connection,
    row: &DeNormSpotCheckMismatch<K>,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO spotcheck_mismatch (report_id, key, mismatch_type, datasource, content_type,
             reference_type, reference_active_date_time, state, reference_data, observed_data, notes,
             issue_ids, ignore_status, report_date_time, observed_date_time, first_seen_date_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            row.report_id,
            key_to_json(&row.key)?,
            row.mismatch_type.as_str(),
            row.datasource.as_str(),
            row.content_type.as_str(),
            row.reference_id.reference_type.as_str(),
            format_ts(row.reference_id.ref_active_date_time),
            row.state.as_str(),
            row.reference_data,
            row.observed_data,
            row.notes,
            issue_ids_to_json(&row.issue_ids)?,
            row.ignore_status.as_str(),
            format_ts(row.report_date_time),
            format_ts(row.observed_date_time),
            format_ts(row.first_seen_date_time),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn insert_report_row<K: ContentKey>(
    conn: &Connection,
    report: &SpotCheckReport<K>,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO spotcheck_report (reference_type, datasource, content_type, report_date_time,
             reference_date_time, notes, checked)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            report.reference_type.as_str(),
            report.datasource().as_str(),
            report.content_type().as_str(),
            format_ts(report.report_date_time),
            format_ts(report.reference_date_time),
            report.notes,
            report.observations.is_some(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use spotcheck_recon::{AgendaKey, SpotCheckMismatchType};

    #[test]
    fn timestamps_sort_as_text() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let a = day.and_hms_opt(9, 59, 59).unwrap();
        let b = day.and_hms_milli_opt(9, 59, 59, 500).unwrap();
        let c = day.and_hms_opt(10, 0, 0).unwrap();
        assert!(format_ts(a) < format_ts(b));
        assert!(format_ts(b) < format_ts(c));
        assert_eq!(parse_ts("t", &format_ts(b)).unwrap(), b);
    }

    #[test]
    fn key_json_is_canonical() {
        let key = AgendaKey { year: 2025, agenda_no: 4, committee: "Finance".into() };
        let json = key_to_json(&key).unwrap();
        assert_eq!(json, r#"{"agenda_no":"4","committee":"Finance","year":"2025"}"#);
        assert_eq!(key_from_json::<AgendaKey>(&json).unwrap(), key);
    }

    #[test]
    fn bad_column_values_are_serialization_errors() {
        assert!(matches!(
            parse_name::<SpotCheckMismatchType>("mismatch_type", "NOPE"),
            Err(StoreError::Serialization(_))
        ));
        assert!(matches!(parse_ts("t", "yesterday"), Err(StoreError::Serialization(_))));
    }
}
