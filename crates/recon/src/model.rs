use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::key::ContentKey;

/// Declares a closed enumeration with a stable SCREAMING_SNAKE_CASE name per
/// variant. The name is both the persisted form and the JSON form.
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ReconError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ReconError::InvalidArgument(format!(
                        "unknown {}: '{other}'",
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

named_enum! {
    /// The system a reference snapshot was taken from.
    pub enum SpotCheckDataSource {
        Lbdc => "LBDC",
        NySenate => "NYSENATE",
        OpenLeg => "OPENLEG",
    }
}

named_enum! {
    pub enum SpotCheckContentType {
        Bill => "BILL",
        BillAmendment => "BILL_AMENDMENT",
        Calendar => "CALENDAR",
        Agenda => "AGENDA",
    }
}

named_enum! {
    /// Kind of reference snapshot. Determines both datasource and content type.
    pub enum SpotCheckRefType {
        LbdcDaybreak => "LBDC_DAYBREAK",
        LbdcScrapedBill => "LBDC_SCRAPED_BILL",
        LbdcCalendarAlert => "LBDC_CALENDAR_ALERT",
        LbdcAgendaAlert => "LBDC_AGENDA_ALERT",
        SenateSiteBills => "SENATE_SITE_BILLS",
        SenateSiteCalendar => "SENATE_SITE_CALENDAR",
        SenateSiteAgenda => "SENATE_SITE_AGENDA",
        OpenlegBill => "OPENLEG_BILL",
    }
}

impl SpotCheckRefType {
    pub fn datasource(&self) -> SpotCheckDataSource {
        match self {
            Self::LbdcDaybreak
            | Self::LbdcScrapedBill
            | Self::LbdcCalendarAlert
            | Self::LbdcAgendaAlert => SpotCheckDataSource::Lbdc,
            Self::SenateSiteBills | Self::SenateSiteCalendar | Self::SenateSiteAgenda => {
                SpotCheckDataSource::NySenate
            }
            Self::OpenlegBill => SpotCheckDataSource::OpenLeg,
        }
    }

    pub fn content_type(&self) -> SpotCheckContentType {
        match self {
            Self::LbdcDaybreak | Self::OpenlegBill => SpotCheckContentType::Bill,
            Self::LbdcScrapedBill | Self::SenateSiteBills => SpotCheckContentType::BillAmendment,
            Self::LbdcCalendarAlert | Self::SenateSiteCalendar => SpotCheckContentType::Calendar,
            Self::LbdcAgendaAlert | Self::SenateSiteAgenda => SpotCheckContentType::Agenda,
        }
    }
}

named_enum! {
    pub enum SpotCheckMismatchType {
        // Content independent
        ReferenceDataMissing => "REFERENCE_DATA_MISSING",
        ObserveDataMissing => "OBSERVE_DATA_MISSING",
        // Bill
        BillAction => "BILL_ACTION",
        BillActiveAmendment => "BILL_ACTIVE_AMENDMENT",
        BillAmendmentPublish => "BILL_AMENDMENT_PUBLISH",
        BillCosponsor => "BILL_COSPONSOR",
        BillMultisponsor => "BILL_MULTISPONSOR",
        BillFulltextPageCount => "BILL_FULLTEXT_PAGE_COUNT",
        BillLawCode => "BILL_LAW_CODE",
        BillLawSection => "BILL_LAW_SECTION",
        BillMemo => "BILL_MEMO",
        BillPublishDate => "BILL_PUBLISH_DATE",
        BillSponsor => "BILL_SPONSOR",
        BillSummary => "BILL_SUMMARY",
        BillTitle => "BILL_TITLE",
        BillTextContent => "BILL_TEXT_CONTENT",
        BillTextLineOffset => "BILL_TEXT_LINE_OFFSET",
        BillVoteInfo => "BILL_VOTE_INFO",
        BillVoteRoll => "BILL_VOTE_ROLL",
        // Calendar
        CalendarEntryList => "CALENDAR_ENTRY_LIST",
        CalendarFloorEntry => "CALENDAR_FLOOR_ENTRY",
        CalendarActiveListEntry => "CALENDAR_ACTIVE_LIST_ENTRY",
        CalendarSupplemental => "CALENDAR_SUPPLEMENTAL",
        CalendarReleaseDateTime => "CALENDAR_RELEASE_DATE_TIME",
        // Agenda
        AgendaBillListing => "AGENDA_BILL_LISTING",
        AgendaChair => "AGENDA_CHAIR",
        AgendaMeetingTime => "AGENDA_MEETING_TIME",
        AgendaLocation => "AGENDA_LOCATION",
        AgendaNotes => "AGENDA_NOTES",
    }
}

impl SpotCheckMismatchType {
    /// Content types a mismatch of this kind can be reported against.
    pub fn content_types(&self) -> &'static [SpotCheckContentType] {
        use SpotCheckContentType as C;
        match self {
            Self::ReferenceDataMissing | Self::ObserveDataMissing => SpotCheckContentType::ALL,
            Self::CalendarEntryList
            | Self::CalendarFloorEntry
            | Self::CalendarActiveListEntry
            | Self::CalendarSupplemental
            | Self::CalendarReleaseDateTime => &[C::Calendar],
            Self::AgendaBillListing
            | Self::AgendaChair
            | Self::AgendaMeetingTime
            | Self::AgendaLocation
            | Self::AgendaNotes => &[C::Agenda],
            _ => &[C::Bill, C::BillAmendment],
        }
    }

    pub fn applies_to(&self, content_type: SpotCheckContentType) -> bool {
        self.content_types().contains(&content_type)
    }
}

named_enum! {
    pub enum SpotCheckMismatchIgnore {
        NotIgnored => "NOT_IGNORED",
        IgnoreOnce => "IGNORE_ONCE",
        IgnorePermanently => "IGNORE_PERMANENTLY",
        IgnoreUntilResolved => "IGNORE_UNTIL_RESOLVED",
    }
}

impl Default for SpotCheckMismatchIgnore {
    fn default() -> Self {
        Self::NotIgnored
    }
}

named_enum! {
    /// Lifecycle state of a ledger row.
    pub enum MismatchState {
        New => "NEW",
        Existing => "EXISTING",
        Resolved => "RESOLVED",
    }
}

impl MismatchState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::New | Self::Existing)
    }
}

// ---------------------------------------------------------------------------
// Observation batch
// ---------------------------------------------------------------------------

/// Identifies which reference snapshot a comparison was run against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpotCheckReferenceId {
    pub reference_type: SpotCheckRefType,
    pub ref_active_date_time: NaiveDateTime,
}

impl SpotCheckReferenceId {
    pub fn new(reference_type: SpotCheckRefType, ref_active_date_time: NaiveDateTime) -> Self {
        Self { reference_type, ref_active_date_time }
    }
}

/// One discrepancy for one key within one observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotCheckMismatch {
    pub mismatch_type: SpotCheckMismatchType,
    pub reference_data: String,
    pub observed_data: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub issue_ids: BTreeSet<String>,
    #[serde(default)]
    pub ignore_status: SpotCheckMismatchIgnore,
}

impl SpotCheckMismatch {
    pub fn new(
        mismatch_type: SpotCheckMismatchType,
        reference_data: impl Into<String>,
        observed_data: impl Into<String>,
    ) -> Self {
        Self {
            mismatch_type,
            reference_data: reference_data.into(),
            observed_data: observed_data.into(),
            notes: None,
            issue_ids: BTreeSet::new(),
            ignore_status: SpotCheckMismatchIgnore::NotIgnored,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Every mismatch found for one key in one comparison pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotCheckObservation<K> {
    pub key: K,
    pub reference_id: SpotCheckReferenceId,
    pub observed_date_time: NaiveDateTime,
    pub mismatches: BTreeMap<SpotCheckMismatchType, SpotCheckMismatch>,
}

impl<K: ContentKey> SpotCheckObservation<K> {
    pub fn new(key: K, reference_id: SpotCheckReferenceId, observed_date_time: NaiveDateTime) -> Self {
        Self {
            key,
            reference_id,
            observed_date_time,
            mismatches: BTreeMap::new(),
        }
    }

    /// Adds a mismatch, replacing any earlier one of the same type.
    pub fn add_mismatch(&mut self, mismatch: SpotCheckMismatch) {
        self.mismatches.insert(mismatch.mismatch_type, mismatch);
    }

    pub fn has_mismatches(&self) -> bool {
        !self.mismatches.is_empty()
    }

    pub fn mismatch_count(&self) -> usize {
        self.mismatches.len()
    }

    pub fn mismatch_types(&self) -> BTreeSet<SpotCheckMismatchType> {
        self.mismatches.keys().copied().collect()
    }
}

/// One comparison pass.
///
/// `observations == None` means the pass never produced results (it failed
/// upstream). That is not the same as `Some(empty)`, which asserts that
/// nothing is currently wrong and therefore resolves every open mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotCheckReport<K> {
    pub id: Option<i64>,
    pub reference_type: SpotCheckRefType,
    pub report_date_time: NaiveDateTime,
    pub reference_date_time: NaiveDateTime,
    pub notes: Option<String>,
    pub observations: Option<BTreeMap<K, SpotCheckObservation<K>>>,
}

impl<K: ContentKey> SpotCheckReport<K> {
    pub fn new(
        reference_type: SpotCheckRefType,
        report_date_time: NaiveDateTime,
        reference_date_time: NaiveDateTime,
    ) -> Self {
        Self {
            id: None,
            reference_type,
            report_date_time,
            reference_date_time,
            notes: None,
            observations: None,
        }
    }

    pub fn datasource(&self) -> SpotCheckDataSource {
        self.reference_type.datasource()
    }

    pub fn content_type(&self) -> SpotCheckContentType {
        self.reference_type.content_type()
    }

    pub fn reference_id(&self) -> SpotCheckReferenceId {
        SpotCheckReferenceId::new(self.reference_type, self.reference_date_time)
    }

    /// Records that the comparison ran, even if no observation is ever added.
    pub fn mark_checked(&mut self) {
        self.observations.get_or_insert_with(BTreeMap::new);
    }

    pub fn add_observation(&mut self, observation: SpotCheckObservation<K>) {
        self.observations
            .get_or_insert_with(BTreeMap::new)
            .insert(observation.key.clone(), observation);
    }

    pub fn observed_count(&self) -> usize {
        self.observations.as_ref().map_or(0, |obs| obs.len())
    }

    pub fn mismatch_count(&self) -> usize {
        self.observations
            .as_ref()
            .map_or(0, |obs| obs.values().map(|o| o.mismatch_count()).sum())
    }

    /// No observation may postdate the report that carries it.
    pub fn check_observed_times(&self) -> Result<(), ReconError> {
        let late = self
            .observations
            .iter()
            .flat_map(|obs| obs.values())
            .find(|ob| ob.observed_date_time > self.report_date_time);
        match late {
            Some(ob) => Err(ReconError::InvalidReport(format!(
                "observation for {:?} at {} is later than the report time {}",
                ob.key, ob.observed_date_time, self.report_date_time
            ))),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Correlates ledger rows for the same discrepancy across reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MismatchIdentity<K> {
    pub key: K,
    pub mismatch_type: SpotCheckMismatchType,
    pub datasource: SpotCheckDataSource,
}

/// A persisted, time-aware ledger row. Rows are appended per report and never
/// deleted; `mismatch_id` is the only unique identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeNormSpotCheckMismatch<K> {
    pub mismatch_id: Option<i64>,
    pub key: K,
    pub mismatch_type: SpotCheckMismatchType,
    pub datasource: SpotCheckDataSource,
    pub content_type: SpotCheckContentType,
    pub report_id: i64,
    pub reference_id: SpotCheckReferenceId,
    pub state: MismatchState,
    pub reference_data: String,
    pub observed_data: String,
    pub notes: Option<String>,
    pub issue_ids: BTreeSet<String>,
    pub ignore_status: SpotCheckMismatchIgnore,
    pub report_date_time: NaiveDateTime,
    pub observed_date_time: NaiveDateTime,
    pub first_seen_date_time: NaiveDateTime,
}

impl<K: ContentKey> DeNormSpotCheckMismatch<K> {
    pub fn identity(&self) -> MismatchIdentity<K> {
        MismatchIdentity {
            key: self.key.clone(),
            mismatch_type: self.mismatch_type,
            datasource: self.datasource,
        }
    }

    /// `first_seen <= observed <= report`.
    pub fn has_ordered_timestamps(&self) -> bool {
        self.first_seen_date_time <= self.observed_date_time
            && self.observed_date_time <= self.report_date_time
    }
}
