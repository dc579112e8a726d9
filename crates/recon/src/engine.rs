use std::collections::BTreeMap;

use log::{debug, error};

use crate::error::ReconError;
use crate::key::ContentKey;
use crate::model::{
    DeNormSpotCheckMismatch, MismatchIdentity, MismatchState, SpotCheckMismatchIgnore, SpotCheckReport,
};

/// Output of one merge: the rows to append to the ledger for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedLedger<K> {
    pub rows: Vec<DeNormSpotCheckMismatch<K>>,
}

impl<K: ContentKey> MergedLedger<K> {
    pub fn count(&self, state: MismatchState) -> usize {
        self.rows.iter().filter(|r| r.state == state).count()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<DeNormSpotCheckMismatch<K>> {
        self.rows
    }
}

/// Merge a report's observations against the currently open ledger rows of
/// the same `(datasource, content type)` scope.
///
/// The report must already carry its store-assigned id and a present
/// observation map. Pure: the same report and ledger snapshot always yield
/// the same rows in the same order.
pub fn reconcile<K: ContentKey>(
    report: &SpotCheckReport<K>,
    current_open: &[DeNormSpotCheckMismatch<K>],
) -> Result<MergedLedger<K>, ReconError> {
    let Some(report_id) = report.id else {
        error!("reconcile called before report was recorded ({})", report.reference_type);
        return Err(ReconError::InvalidReport(
            "report has no id; it must be recorded before its mismatches are merged".into(),
        ));
    };
    if report.observations.is_none() {
        error!("reconcile called for report {report_id} with absent observations");
        return Err(ReconError::InvalidReport(format!(
            "report {report_id} has no observations; the comparison did not run"
        )));
    }

    if let Err(e) = report.check_observed_times() {
        error!("report {report_id} rejected: {e}");
        return Err(e);
    }

    let candidates = flatten(report, report_id);
    let open = index_open(current_open);

    let mut merged = Vec::with_capacity(candidates.len() + open.len());
    let mut matched = 0usize;

    for (identity, mut row) in candidates.into_iter() {
        if let Some(prior) = open.get(&identity) {
            carry_forward(&mut row, prior);
            matched += 1;
        }
        merged.push(row);
    }

    let candidate_ids: std::collections::BTreeSet<MismatchIdentity<K>> =
        merged.iter().map(|r| r.identity()).collect();

    let mut closed = 0usize;
    for (identity, prior) in &open {
        if candidate_ids.contains(identity) {
            continue;
        }
        merged.push(close(prior, report, report_id));
        closed += 1;
    }

    debug!(
        "report {report_id}: {} candidates ({matched} re-asserted), {closed} closed, {} prior open",
        merged.len() - closed,
        open.len(),
    );

    Ok(MergedLedger { rows: merged })
}

/// One candidate row per `(key, mismatch type)` in the report, keyed and
/// ordered by identity.
fn flatten<K: ContentKey>(
    report: &SpotCheckReport<K>,
    report_id: i64,
) -> BTreeMap<MismatchIdentity<K>, DeNormSpotCheckMismatch<K>> {
    let datasource = report.datasource();
    let content_type = report.content_type();
    let mut rows = BTreeMap::new();

    for ob in report.observations.iter().flat_map(|obs| obs.values()) {
        for m in ob.mismatches.values() {
            let row = DeNormSpotCheckMismatch {
                mismatch_id: None,
                key: ob.key.clone(),
                mismatch_type: m.mismatch_type,
                datasource,
                content_type,
                report_id,
                reference_id: ob.reference_id.clone(),
                state: MismatchState::New,
                reference_data: m.reference_data.clone(),
                observed_data: m.observed_data.clone(),
                notes: m.notes.clone(),
                issue_ids: m.issue_ids.clone(),
                ignore_status: m.ignore_status,
                report_date_time: report.report_date_time,
                observed_date_time: ob.observed_date_time,
                first_seen_date_time: ob.observed_date_time,
            };
            rows.insert(row.identity(), row);
        }
    }
    rows
}

/// Open rows by identity. If the ledger somehow holds several open rows for
/// one identity, the most recently inserted one wins.
fn index_open<K: ContentKey>(
    current_open: &[DeNormSpotCheckMismatch<K>],
) -> BTreeMap<MismatchIdentity<K>, &DeNormSpotCheckMismatch<K>> {
    let mut open: BTreeMap<MismatchIdentity<K>, &DeNormSpotCheckMismatch<K>> = BTreeMap::new();
    for row in current_open.iter().filter(|r| r.state.is_open()) {
        let entry = open.entry(row.identity()).or_insert(row);
        if row.mismatch_id > entry.mismatch_id {
            *entry = row;
        }
    }
    open
}

/// Re-assertion of a previously open mismatch.
fn carry_forward<K: ContentKey>(row: &mut DeNormSpotCheckMismatch<K>, prior: &DeNormSpotCheckMismatch<K>) {
    row.state = MismatchState::Existing;
    row.first_seen_date_time = prior.first_seen_date_time.min(row.observed_date_time);
    row.ignore_status = match prior.ignore_status {
        SpotCheckMismatchIgnore::IgnoreOnce => SpotCheckMismatchIgnore::NotIgnored,
        other => other,
    };
    row.issue_ids.extend(prior.issue_ids.iter().cloned());
}

/// Resolution row for an open mismatch the report no longer asserts.
fn close<K: ContentKey>(
    prior: &DeNormSpotCheckMismatch<K>,
    report: &SpotCheckReport<K>,
    report_id: i64,
) -> DeNormSpotCheckMismatch<K> {
    let observation = report.observations.as_ref().and_then(|obs| obs.get(&prior.key));
    let (reference_id, observed_date_time) = match observation {
        Some(ob) => (ob.reference_id.clone(), ob.observed_date_time),
        None => (prior.reference_id.clone(), report.report_date_time),
    };
    let ignore_status = match prior.ignore_status {
        SpotCheckMismatchIgnore::IgnoreUntilResolved => SpotCheckMismatchIgnore::NotIgnored,
        other => other,
    };

    DeNormSpotCheckMismatch {
        mismatch_id: None,
        report_id,
        reference_id,
        state: MismatchState::Resolved,
        ignore_status,
        report_date_time: report.report_date_time,
        observed_date_time,
        first_seen_date_time: prior.first_seen_date_time.min(observed_date_time),
        ..prior.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::BillKey;
    use crate::model::{
        SpotCheckMismatch, SpotCheckMismatchType, SpotCheckObservation, SpotCheckRefType,
        SpotCheckReferenceId,
    };
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn report(day: u32, entries: &[(&str, SpotCheckMismatchType)]) -> SpotCheckReport<BillKey> {
        let mut r = SpotCheckReport::new(SpotCheckRefType::LbdcDaybreak, at(day), at(day));
        r.id = Some(day as i64);
        r.mark_checked();
        for (print_no, t) in entries {
            let key = BillKey::base(print_no, 2025);
            let existing = r.observations.as_mut().unwrap().remove(&key);
            let mut ob = existing
                .unwrap_or_else(|| SpotCheckObservation::new(key.clone(), r.reference_id(), at(day)));
            ob.add_mismatch(SpotCheckMismatch::new(*t, "ref", "obs"));
            r.add_observation(ob);
        }
        r
    }

    fn with_ids(rows: Vec<DeNormSpotCheckMismatch<BillKey>>, start: i64) -> Vec<DeNormSpotCheckMismatch<BillKey>> {
        rows.into_iter()
            .enumerate()
            .map(|(i, mut r)| {
                r.mismatch_id = Some(start + i as i64);
                r
            })
            .collect()
    }

    #[test]
    fn rejects_unrecorded_report() {
        let mut r = report(1, &[]);
        r.id = None;
        assert!(matches!(reconcile(&r, &[]), Err(ReconError::InvalidReport(_))));
    }

    #[test]
    fn rejects_absent_observations() {
        let mut r = report(1, &[]);
        r.observations = None;
        assert!(matches!(reconcile(&r, &[]), Err(ReconError::InvalidReport(_))));
    }

    #[test]
    fn rejects_observation_after_report_time() {
        let mut r = report(1, &[("S1", SpotCheckMismatchType::BillTitle)]);
        let ob = r.observations.as_mut().unwrap().get_mut(&BillKey::base("S1", 2025)).unwrap();
        ob.observed_date_time = at(3);
        assert!(matches!(reconcile(&r, &[]), Err(ReconError::InvalidReport(_))));
    }

    #[test]
    fn first_report_is_all_new() {
        let r = report(1, &[("S1", SpotCheckMismatchType::BillTitle), ("S2", SpotCheckMismatchType::BillMemo)]);
        let merged = reconcile(&r, &[]).unwrap();
        assert_eq!(merged.count(MismatchState::New), 2);
        assert!(merged.rows.iter().all(|m| m.first_seen_date_time == at(1)));
        assert!(merged.rows.iter().all(|m| m.report_id == 1));
    }

    #[test]
    fn reasserted_row_becomes_existing() {
        let first = with_ids(reconcile(&report(1, &[("S1", SpotCheckMismatchType::BillTitle)]), &[]).unwrap().rows, 1);
        let merged = reconcile(&report(2, &[("S1", SpotCheckMismatchType::BillTitle)]), &first).unwrap();
        assert_eq!(merged.rows.len(), 1);
        assert_eq!(merged.rows[0].state, MismatchState::Existing);
        assert_eq!(merged.rows[0].first_seen_date_time, at(1));
        assert_eq!(merged.rows[0].observed_date_time, at(2));
    }

    #[test]
    fn absent_row_is_closed_with_prior_data() {
        let first = with_ids(reconcile(&report(1, &[("S1", SpotCheckMismatchType::BillTitle)]), &[]).unwrap().rows, 1);
        let merged = reconcile(&report(2, &[]), &first).unwrap();
        assert_eq!(merged.rows.len(), 1);
        let closed = &merged.rows[0];
        assert_eq!(closed.state, MismatchState::Resolved);
        assert_eq!(closed.mismatch_id, None);
        assert_eq!(closed.report_id, 2);
        assert_eq!(closed.report_date_time, at(2));
        assert_eq!(closed.observed_date_time, at(2));
        assert_eq!(closed.reference_data, "ref");
        assert_eq!(closed.first_seen_date_time, at(1));
    }

    #[test]
    fn closure_uses_observation_of_same_key_when_present() {
        let first = with_ids(
            reconcile(&report(1, &[("S1", SpotCheckMismatchType::BillTitle), ("S1", SpotCheckMismatchType::BillMemo)]), &[])
                .unwrap()
                .rows,
            1,
        );
        let mut second = report(3, &[("S1", SpotCheckMismatchType::BillMemo)]);
        let ob = second.observations.as_mut().unwrap().get_mut(&BillKey::base("S1", 2025)).unwrap();
        ob.observed_date_time = at(2);
        let merged = reconcile(&second, &first).unwrap();
        let closed = merged.rows.iter().find(|r| r.state == MismatchState::Resolved).unwrap();
        assert_eq!(closed.mismatch_type, SpotCheckMismatchType::BillTitle);
        assert_eq!(closed.observed_date_time, at(2));
        assert!(closed.has_ordered_timestamps());
    }

    #[test]
    fn ignore_once_is_consumed_and_until_resolved_released() {
        let mut first = with_ids(
            reconcile(&report(1, &[("S1", SpotCheckMismatchType::BillTitle), ("S2", SpotCheckMismatchType::BillTitle)]), &[])
                .unwrap()
                .rows,
            1,
        );
        first[0].ignore_status = SpotCheckMismatchIgnore::IgnoreOnce;
        first[1].ignore_status = SpotCheckMismatchIgnore::IgnoreUntilResolved;

        let merged = reconcile(&report(2, &[("S1", SpotCheckMismatchType::BillTitle)]), &first).unwrap();
        let s1 = merged.rows.iter().find(|r| r.key.print_no == "S1").unwrap();
        let s2 = merged.rows.iter().find(|r| r.key.print_no == "S2").unwrap();
        assert_eq!(s1.ignore_status, SpotCheckMismatchIgnore::NotIgnored);
        assert_eq!(s2.state, MismatchState::Resolved);
        assert_eq!(s2.ignore_status, SpotCheckMismatchIgnore::NotIgnored);
    }

    #[test]
    fn issue_ids_survive_reassertion() {
        let mut first = with_ids(reconcile(&report(1, &[("S1", SpotCheckMismatchType::BillTitle)]), &[]).unwrap().rows, 1);
        first[0].issue_ids.insert("OL-42".into());
        let merged = reconcile(&report(2, &[("S1", SpotCheckMismatchType::BillTitle)]), &first).unwrap();
        assert!(merged.rows[0].issue_ids.contains("OL-42"));
    }

    #[test]
    fn duplicate_open_rows_collapse_to_latest() {
        let rows = reconcile(&report(1, &[("S1", SpotCheckMismatchType::BillTitle)]), &[]).unwrap().rows;
        let mut older = rows[0].clone();
        older.mismatch_id = Some(1);
        older.first_seen_date_time = at(1);
        let mut newer = rows[0].clone();
        newer.mismatch_id = Some(7);
        newer.ignore_status = SpotCheckMismatchIgnore::IgnorePermanently;

        let merged = reconcile(&report(2, &[]), &[newer, older]).unwrap();
        assert_eq!(merged.rows.len(), 1);
        assert_eq!(merged.rows[0].ignore_status, SpotCheckMismatchIgnore::IgnorePermanently);
    }

    #[test]
    fn resolved_rows_in_input_are_not_reclosed() {
        let first = with_ids(reconcile(&report(1, &[("S1", SpotCheckMismatchType::BillTitle)]), &[]).unwrap().rows, 1);
        let closed = with_ids(reconcile(&report(2, &[]), &first).unwrap().rows, 2);
        let merged = reconcile(&report(3, &[]), &closed).unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn reference_id_comes_from_observation() {
        let mut r = report(1, &[("S1", SpotCheckMismatchType::BillTitle)]);
        let ob = r.observations.as_mut().unwrap().get_mut(&BillKey::base("S1", 2025)).unwrap();
        ob.reference_id = SpotCheckReferenceId::new(SpotCheckRefType::LbdcDaybreak, at(1) - chrono::Duration::hours(3));
        let merged = reconcile(&r, &[]).unwrap();
        assert_eq!(merged.rows[0].reference_id.ref_active_date_time, at(1) - chrono::Duration::hours(3));
    }
}
