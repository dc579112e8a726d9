// WHERE-clause builder for active-row lookups

use rusqlite::types::Value;

use spotcheck_recon::{DateTimeRange, OrderBy, SortDirection, SortField, SpotCheckDataSource};

use crate::codec::format_ts;

/// Latest row per identity whose report falls inside a window, scoped to one
/// datasource. Content type is part of the grouping so that two content
/// domains sharing a key type never hide each other's rows.
const ACTIVE_IDS: &str = "mismatch_id IN (
    SELECT MAX(mismatch_id) FROM spotcheck_mismatch
    WHERE datasource = ? AND report_date_time BETWEEN ? AND ?
    GROUP BY key, mismatch_type, content_type)";

#[derive(Debug, Default)]
pub(crate) struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl SqlFilter {
    pub(crate) fn active(datasource: SpotCheckDataSource, window: DateTimeRange) -> Self {
        let mut filter = Self::default();
        filter.clauses.push(ACTIVE_IDS.to_string());
        filter.params.push(Value::Text(datasource.as_str().to_string()));
        filter.params.push(Value::Text(format_ts(window.start)));
        filter.params.push(Value::Text(format_ts(window.end)));
        filter
    }

    pub(crate) fn eq(mut self, column: &str, value: &str) -> Self {
        self.clauses.push(format!("{column} = ?"));
        self.params.push(Value::Text(value.to_string()));
        self
    }

    pub(crate) fn between(mut self, column: &str, range: DateTimeRange) -> Self {
        self.clauses.push(format!("{column} BETWEEN ? AND ?"));
        self.params.push(Value::Text(format_ts(range.start)));
        self.params.push(Value::Text(format_ts(range.end)));
        self
    }

    /// An empty set matches nothing.
    pub(crate) fn in_set<'a>(self, column: &str, values: impl IntoIterator<Item = &'a str>) -> Self {
        self.set_clause(column, "IN", "0", values)
    }

    /// An empty set excludes nothing.
    pub(crate) fn not_in<'a>(self, column: &str, values: impl IntoIterator<Item = &'a str>) -> Self {
        self.set_clause(column, "NOT IN", "1", values)
    }

    fn set_clause<'a>(
        mut self,
        column: &str,
        op: &str,
        when_empty: &str,
        values: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let values: Vec<&str> = values.into_iter().collect();
        if values.is_empty() {
            self.clauses.push(when_empty.to_string());
            return self;
        }
        let marks = vec!["?"; values.len()].join(", ");
        self.clauses.push(format!("{column} {op} ({marks})"));
        self.params
            .extend(values.into_iter().map(|v| Value::Text(v.to_string())));
        self
    }

    pub(crate) fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            "1".to_string()
        } else {
            self.clauses.join(" AND ")
        }
    }

    pub(crate) fn params(&self) -> &[Value] {
        &self.params
    }
}

pub(crate) fn order_clause(order_by: OrderBy) -> String {
    let column = match order_by.field {
        SortField::ObservedDateTime => "observed_date_time",
        SortField::FirstSeenDateTime => "first_seen_date_time",
        SortField::MismatchType => "mismatch_type",
        SortField::MismatchId => "mismatch_id",
    };
    let direction = match order_by.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    format!("{column} {direction}, mismatch_id ASC")
}
