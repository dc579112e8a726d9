//! Content types grouped by the key type their rows are stored under.

use std::collections::BTreeSet;

use spotcheck_recon::SpotCheckContentType;

use crate::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDomain {
    Bill,
    Calendar,
    Agenda,
}

impl KeyDomain {
    pub fn of(content_type: SpotCheckContentType) -> Self {
        match content_type {
            SpotCheckContentType::Bill | SpotCheckContentType::BillAmendment => Self::Bill,
            SpotCheckContentType::Calendar => Self::Calendar,
            SpotCheckContentType::Agenda => Self::Agenda,
        }
    }

    /// One lookup returns rows of a single key type.
    pub fn of_all(content_types: &BTreeSet<SpotCheckContentType>) -> Result<Self, CliError> {
        let mut domains = content_types.iter().map(|c| Self::of(*c));
        let first = domains
            .next()
            .ok_or_else(|| CliError::args("at least one --content-type is required"))?;
        if domains.any(|d| d != first) {
            let names: Vec<&str> = content_types.iter().map(|c| c.as_str()).collect();
            return Err(CliError::args(format!("content types {} use different keys", names.join(", ")))
                .with_hint("query bill, calendar and agenda content types separately"));
        }
        Ok(first)
    }
}

/// Runs `$body` with `$k` bound to the key type of `$domain`.
macro_rules! with_key_type {
    ($domain:expr, $k:ident => $body:expr) => {
        match $domain {
            $crate::domain::KeyDomain::Bill => {
                type $k = spotcheck_recon::BillKey;
                $body
            }
            $crate::domain::KeyDomain::Calendar => {
                type $k = spotcheck_recon::CalendarKey;
                $body
            }
            $crate::domain::KeyDomain::Agenda => {
                type $k = spotcheck_recon::AgendaKey;
                $body
            }
        }
    };
}

pub(crate) use with_key_type;
