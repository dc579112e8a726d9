//! `spotcheck mismatches`, `spotcheck mismatch` and `spotcheck summary`.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use spotcheck_recon::{
    ContentKey, LimitOffset, MismatchQuery, MismatchStatus, OrderBy, SortField, SpotCheckContentType,
    SpotCheckDataSource, SpotCheckMismatchType,
};
use spotcheck_store::ReportStore;

use crate::domain::{with_key_type, KeyDomain};
use crate::settings::Settings;
use crate::{parse_name, print_json, CliError};

#[derive(Clone, Copy, ValueEnum)]
pub enum SortArg {
    Observed,
    FirstSeen,
    Type,
    Id,
}

impl From<SortArg> for SortField {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Observed => SortField::ObservedDateTime,
            SortArg::FirstSeen => SortField::FirstSeenDateTime,
            SortArg::Type => SortField::MismatchType,
            SortArg::Id => SortField::MismatchId,
        }
    }
}

#[derive(Args)]
pub struct MismatchesArgs {
    /// Reference datasource (LBDC, NYSENATE, OPENLEG)
    #[arg(long, value_parser = parse_name::<SpotCheckDataSource>)]
    pub datasource: SpotCheckDataSource,

    /// Content type to include (repeatable; all must share a key type)
    #[arg(long = "content-type", required = true, value_parser = parse_name::<SpotCheckContentType>)]
    pub content_types: Vec<SpotCheckContentType>,

    /// NEW, EXISTING, RESOLVED or OPEN
    #[arg(long, default_value = "OPEN")]
    pub status: MismatchStatus,

    /// Restrict to these mismatch types (repeatable)
    #[arg(long = "type", value_parser = parse_name::<SpotCheckMismatchType>)]
    pub mismatch_types: Vec<SpotCheckMismatchType>,

    /// Report date the lookup is evaluated as of (default: today)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Sort field (default: observed, newest first)
    #[arg(long, value_enum)]
    pub order_by: Option<SortArg>,

    /// Sort descending
    #[arg(long, requires = "order_by")]
    pub desc: bool,

    /// Page size (default: query.default_limit from config)
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Include rows whose ignore status is normally hidden
    #[arg(long)]
    pub include_ignored: bool,
}

#[derive(Subcommand)]
pub enum SummaryCommands {
    /// Counts per lifecycle state over the active rows
    #[command(after_help = "\
Examples:
  spotcheck summary status --datasource LBDC
  spotcheck summary status --datasource LBDC --content-type BILL --date 2025-04-02")]
    Status {
        #[arg(long, value_parser = parse_name::<SpotCheckDataSource>)]
        datasource: SpotCheckDataSource,

        /// Content type to include (repeatable; default: all)
        #[arg(long = "content-type", value_parser = parse_name::<SpotCheckContentType>)]
        content_types: Vec<SpotCheckContentType>,

        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        include_ignored: bool,
    },

    /// Counts per mismatch type for one content type and status
    #[command(after_help = "\
Examples:
  spotcheck summary types --datasource LBDC --content-type BILL
  spotcheck summary types --datasource LBDC --content-type CALENDAR --status NEW")]
    Types {
        #[arg(long, value_parser = parse_name::<SpotCheckDataSource>)]
        datasource: SpotCheckDataSource,

        #[arg(long = "content-type", value_parser = parse_name::<SpotCheckContentType>)]
        content_type: SpotCheckContentType,

        #[arg(long, default_value = "OPEN")]
        status: MismatchStatus,

        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        include_ignored: bool,
    },

    /// Open row counts per content type
    #[command(after_help = "\
Examples:
  spotcheck summary content-types --datasource NYSENATE")]
    ContentTypes {
        #[arg(long, value_parser = parse_name::<SpotCheckDataSource>)]
        datasource: SpotCheckDataSource,

        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(long)]
        include_ignored: bool,
    },
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

// ============================================================================
// mismatches
// ============================================================================

pub fn cmd_mismatches(settings: &Settings, args: MismatchesArgs) -> Result<(), CliError> {
    let content_types: BTreeSet<SpotCheckContentType> = args.content_types.iter().copied().collect();
    let domain = KeyDomain::of_all(&content_types)?;

    let order_by = match args.order_by {
        None => OrderBy::default(),
        Some(field) if args.desc => OrderBy::desc(field.into()),
        Some(field) => OrderBy::asc(field.into()),
    };
    let mut query = MismatchQuery::new(args.date.unwrap_or_else(today), args.datasource, args.status, content_types)
        .with_ignored_statuses(settings.ignored(args.include_ignored))
        .with_order_by(order_by);
    if !args.mismatch_types.is_empty() {
        query = query.with_mismatch_types(args.mismatch_types);
    }
    let limit_offset = LimitOffset::new(args.limit.unwrap_or(settings.config.query.default_limit), args.offset);

    let store = settings.open_store()?;
    with_key_type!(domain, K => list::<K>(&store, &query, limit_offset))
}

fn list<K: ContentKey + serde::Serialize>(
    store: &ReportStore,
    query: &MismatchQuery,
    limit_offset: LimitOffset,
) -> Result<(), CliError> {
    let page = store.query_mismatches::<K>(query, limit_offset).map_err(CliError::store)?;
    print_json(&page)?;
    eprintln!(
        "{} of {} {} mismatches ({}, as of {})",
        page.results.len(),
        page.total,
        query.status,
        query.datasource,
        query.report_date
    );
    Ok(())
}

// ============================================================================
// mismatch <id>
// ============================================================================

pub fn cmd_mismatch(settings: &Settings, mismatch_id: i64) -> Result<(), CliError> {
    let store = settings.open_store()?;
    let content_type = store.mismatch_content_type(mismatch_id).map_err(CliError::store)?;
    with_key_type!(KeyDomain::of(content_type), K => {
        let row = store.get_mismatch::<K>(mismatch_id).map_err(CliError::store)?;
        print_json(&row)
    })
}

// ============================================================================
// summary
// ============================================================================

pub fn cmd_summary(settings: &Settings, cmd: SummaryCommands) -> Result<(), CliError> {
    let store = settings.open_store()?;
    match cmd {
        SummaryCommands::Status { datasource, content_types, date, include_ignored } => {
            let content_types: BTreeSet<SpotCheckContentType> = if content_types.is_empty() {
                SpotCheckContentType::ALL.iter().copied().collect()
            } else {
                content_types.into_iter().collect()
            };
            let summary = store
                .status_summary(date.unwrap_or_else(today), datasource, &content_types, &settings.ignored(include_ignored))
                .map_err(CliError::store)?;
            print_json(&summary)?;
            eprintln!(
                "{datasource}: {} new, {} existing, {} resolved ({} open)",
                summary.new,
                summary.existing,
                summary.resolved,
                summary.open()
            );
        }
        SummaryCommands::Types { datasource, content_type, status, date, include_ignored } => {
            let summary = store
                .type_summary(
                    date.unwrap_or_else(today),
                    datasource,
                    content_type,
                    status,
                    &settings.ignored(include_ignored),
                )
                .map_err(CliError::store)?;
            print_json(&summary)?;
            eprintln!("{datasource} {content_type} {status}: {} mismatches", summary.total);
        }
        SummaryCommands::ContentTypes { datasource, date, include_ignored } => {
            let summary = store
                .content_type_summary(date.unwrap_or_else(today), datasource, &settings.ignored(include_ignored))
                .map_err(CliError::store)?;
            print_json(&summary)?;
            eprintln!("{datasource}: {} open mismatches", summary.total());
        }
    }
    Ok(())
}
