//! Content keys: per-domain identities used to correlate observations across
//! reports. Each domain converts its key to and from a flat string map, which
//! is the only form a store ever sees.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::error::ReconError;

pub type KeyMap = BTreeMap<String, String>;

pub trait ContentKey: Clone + Eq + Hash + Ord + Debug + Send + Sync + 'static {
    fn to_map(&self) -> KeyMap;

    fn from_map(map: &KeyMap) -> Result<Self, ReconError>;
}

fn required<'a>(map: &'a KeyMap, field: &str) -> Result<&'a str, ReconError> {
    map.get(field)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ReconError::InvalidKey {
            field: field.to_string(),
            reason: "missing".into(),
        })
}

fn parse_u32(map: &KeyMap, field: &str) -> Result<u32, ReconError> {
    let raw = required(map, field)?;
    raw.parse::<u32>().map_err(|_| ReconError::InvalidKey {
        field: field.to_string(),
        reason: format!("not a number: '{raw}'"),
    })
}

/// Legislative sessions span two years and are named by the odd starting year.
pub fn session_year_of(year: u32) -> u32 {
    if year % 2 == 0 { year.saturating_sub(1) } else { year }
}

// ---------------------------------------------------------------------------
// Bill
// ---------------------------------------------------------------------------

/// A bill print number within a session, optionally pinned to one amendment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BillKey {
    pub print_no: String,
    pub session_year: u32,
    pub version: Option<char>,
}

impl BillKey {
    pub fn new(print_no: &str, session_year: u32, version: Option<char>) -> Self {
        Self {
            print_no: print_no.trim().to_uppercase(),
            session_year: session_year_of(session_year),
            version: version.map(|v| v.to_ascii_uppercase()),
        }
    }

    pub fn base(print_no: &str, session_year: u32) -> Self {
        Self::new(print_no, session_year, None)
    }

    pub fn base_key(&self) -> Self {
        Self { version: None, ..self.clone() }
    }
}

impl ContentKey for BillKey {
    fn to_map(&self) -> KeyMap {
        let mut map = KeyMap::new();
        map.insert("print_no".into(), self.print_no.clone());
        map.insert("session_year".into(), self.session_year.to_string());
        if let Some(v) = self.version {
            map.insert("version".into(), v.to_string());
        }
        map
    }

    fn from_map(map: &KeyMap) -> Result<Self, ReconError> {
        let print_no = required(map, "print_no")?;
        let session_year = parse_u32(map, "session_year")?;
        let version = match map.get("version").map(|v| v.trim()).filter(|v| !v.is_empty()) {
            None => None,
            Some(v) => {
                let mut chars = v.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphabetic() => Some(c),
                    _ => {
                        return Err(ReconError::InvalidKey {
                            field: "version".into(),
                            reason: format!("expected a single letter, got '{v}'"),
                        })
                    }
                }
            }
        };
        Ok(Self::new(print_no, session_year, version))
    }
}

// ---------------------------------------------------------------------------
// Calendar
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CalendarKey {
    pub year: u32,
    pub cal_no: u32,
}

impl ContentKey for CalendarKey {
    fn to_map(&self) -> KeyMap {
        KeyMap::from([
            ("year".to_string(), self.year.to_string()),
            ("cal_no".to_string(), self.cal_no.to_string()),
        ])
    }

    fn from_map(map: &KeyMap) -> Result<Self, ReconError> {
        Ok(Self {
            year: parse_u32(map, "year")?,
            cal_no: parse_u32(map, "cal_no")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Agenda
// ---------------------------------------------------------------------------

/// A committee's slice of a weekly agenda.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgendaKey {
    pub year: u32,
    pub agenda_no: u32,
    pub committee: String,
}

impl ContentKey for AgendaKey {
    fn to_map(&self) -> KeyMap {
        KeyMap::from([
            ("year".to_string(), self.year.to_string()),
            ("agenda_no".to_string(), self.agenda_no.to_string()),
            ("committee".to_string(), self.committee.clone()),
        ])
    }

    fn from_map(map: &KeyMap) -> Result<Self, ReconError> {
        Ok(Self {
            year: parse_u32(map, "year")?,
            agenda_no: parse_u32(map, "agenda_no")?,
            committee: required(map, "committee")?.to_string(),
        })
    }
}
