//! Filter, ordering and pagination for ledger lookups.
//!
//! A `MismatchQuery` is evaluated by the store against *active* rows only
//! (the latest row per identity within the session window). The same
//! semantics are available in memory via [`MismatchQuery::matches`] and
//! [`MismatchQuery::sort`].

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::key::ContentKey;
use crate::model::{
    DeNormSpotCheckMismatch, MismatchState, SpotCheckContentType, SpotCheckDataSource,
    SpotCheckMismatchIgnore, SpotCheckMismatchType,
};
use crate::window::{DateTimeRange, MismatchStatus};

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    ObservedDateTime,
    FirstSeenDateTime,
    MismatchType,
    MismatchId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    pub field: SortField,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(field: SortField) -> Self {
        Self { field, direction: SortDirection::Asc }
    }

    pub fn desc(field: SortField) -> Self {
        Self { field, direction: SortDirection::Desc }
    }

    /// Ties always fall back to ascending `mismatch_id`.
    pub fn compare<K: ContentKey>(&self, a: &DeNormSpotCheckMismatch<K>, b: &DeNormSpotCheckMismatch<K>) -> Ordering {
        let primary = match self.field {
            SortField::ObservedDateTime => a.observed_date_time.cmp(&b.observed_date_time),
            SortField::FirstSeenDateTime => a.first_seen_date_time.cmp(&b.first_seen_date_time),
            SortField::MismatchType => a.mismatch_type.as_str().cmp(b.mismatch_type.as_str()),
            SortField::MismatchId => a.mismatch_id.cmp(&b.mismatch_id),
        };
        let primary = match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| a.mismatch_id.cmp(&b.mismatch_id))
    }
}

impl Default for OrderBy {
    fn default() -> Self {
        Self::desc(SortField::ObservedDateTime)
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitOffset {
    /// `None` returns every row from `offset` on.
    pub limit: Option<usize>,
    pub offset: usize,
}

impl LimitOffset {
    pub const ALL: LimitOffset = LimitOffset { limit: None, offset: 0 };

    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit: Some(limit), offset }
    }

    pub fn apply<T>(&self, rows: Vec<T>) -> Vec<T> {
        let iter = rows.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// One page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginatedList<T> {
    pub total: usize,
    pub limit_offset: LimitOffset,
    pub results: Vec<T>,
}

impl<T> PaginatedList<T> {
    pub fn paginate(all: Vec<T>, limit_offset: LimitOffset) -> Self {
        let total = all.len();
        Self {
            total,
            limit_offset,
            results: limit_offset.apply(all),
        }
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchQuery {
    pub report_date: NaiveDate,
    pub datasource: SpotCheckDataSource,
    pub content_types: BTreeSet<SpotCheckContentType>,
    pub status: MismatchStatus,
    /// `None` matches every type.
    pub mismatch_types: Option<BTreeSet<SpotCheckMismatchType>>,
    /// Rows with one of these ignore statuses are excluded.
    pub ignored_statuses: BTreeSet<SpotCheckMismatchIgnore>,
    pub observed_range: DateTimeRange,
    pub first_seen_range: DateTimeRange,
    pub order_by: OrderBy,
}

impl MismatchQuery {
    pub fn new(
        report_date: NaiveDate,
        datasource: SpotCheckDataSource,
        status: MismatchStatus,
        content_types: impl IntoIterator<Item = SpotCheckContentType>,
    ) -> Self {
        Self {
            report_date,
            datasource,
            content_types: content_types.into_iter().collect(),
            status,
            mismatch_types: None,
            ignored_statuses: BTreeSet::new(),
            observed_range: status.observed_range(report_date),
            first_seen_range: status.first_seen_range(report_date),
            order_by: OrderBy::default(),
        }
    }

    pub fn with_mismatch_types(mut self, types: impl IntoIterator<Item = SpotCheckMismatchType>) -> Self {
        self.mismatch_types = Some(types.into_iter().collect());
        self
    }

    pub fn with_ignored_statuses(mut self, statuses: impl IntoIterator<Item = SpotCheckMismatchIgnore>) -> Self {
        self.ignored_statuses = statuses.into_iter().collect();
        self
    }

    pub fn with_observed_range(mut self, range: DateTimeRange) -> Self {
        self.observed_range = range;
        self
    }

    pub fn with_first_seen_range(mut self, range: DateTimeRange) -> Self {
        self.first_seen_range = range;
        self
    }

    pub fn with_order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn states(&self) -> BTreeSet<MismatchState> {
        self.status.states()
    }

    /// Filter predicate over a single active row. Does not check that the row
    /// is the active one for its identity; that is the caller's job.
    pub fn matches<K: ContentKey>(&self, row: &DeNormSpotCheckMismatch<K>) -> bool {
        row.datasource == self.datasource
            && self.content_types.contains(&row.content_type)
            && self.status.states().contains(&row.state)
            && self
                .mismatch_types
                .as_ref()
                .map_or(true, |types| types.contains(&row.mismatch_type))
            && !self.ignored_statuses.contains(&row.ignore_status)
            && self.observed_range.contains(row.observed_date_time)
            && self.first_seen_range.contains(row.first_seen_date_time)
    }

    pub fn sort<K: ContentKey>(&self, rows: &mut [DeNormSpotCheckMismatch<K>]) {
        rows.sort_by(|a, b| self.order_by.compare(a, b));
    }

    /// Filter, order and paginate an in-memory row set.
    pub fn apply<K: ContentKey>(
        &self,
        rows: &[DeNormSpotCheckMismatch<K>],
        limit_offset: LimitOffset,
    ) -> PaginatedList<DeNormSpotCheckMismatch<K>> {
        let mut hits: Vec<_> = rows.iter().filter(|r| self.matches(r)).cloned().collect();
        self.sort(&mut hits);
        PaginatedList::paginate(hits, limit_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_offset_pages() {
        let rows: Vec<u32> = (0..10).collect();
        assert_eq!(LimitOffset::new(3, 2).apply(rows.clone()), vec![2, 3, 4]);
        assert_eq!(LimitOffset::new(5, 8).apply(rows.clone()), vec![8, 9]);
        assert_eq!(LimitOffset::ALL.apply(rows.clone()).len(), 10);

        let page = PaginatedList::paginate(rows, LimitOffset::new(4, 0));
        assert_eq!(page.total, 10);
        assert_eq!(page.results.len(), 4);
    }

    #[test]
    fn new_query_uses_status_windows() {
        let d = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let q = MismatchQuery::new(d, SpotCheckDataSource::Lbdc, MismatchStatus::New, [SpotCheckContentType::Bill]);
        assert_eq!(q.observed_range, MismatchStatus::New.observed_range(d));
        assert!(q.mismatch_types.is_none());
        assert!(q.ignored_statuses.is_empty());
    }
}
