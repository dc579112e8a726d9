//! `spotcheck ingest`: record a report and merge it into the ledger.

use std::path::Path;

use spotcheck_recon::ContentKey;
use spotcheck_store::{ReportStore, SaveOutcome};

use crate::domain::{with_key_type, KeyDomain};
use crate::report_file::ReportFile;
use crate::settings::Settings;
use crate::{print_json, CliError};

pub fn cmd_ingest(settings: &Settings, path: &Path, json: bool) -> Result<(), CliError> {
    let input = std::fs::read_to_string(path)
        .map_err(|e| CliError::report_parse(format!("cannot read {}: {e}", path.display())))?;
    let file = ReportFile::parse(&input)
        .map_err(|e| CliError::report_parse(format!("{}: {e}", path.display())))?;

    let reference_type = file.reference_type;
    let store = settings.open_store()?;
    let outcome = with_key_type!(KeyDomain::of(reference_type.content_type()), K => save::<K>(&store, file)?);

    if json {
        print_json(&outcome)?;
    }
    match outcome {
        SaveOutcome::Merged { report_id, new, existing, resolved } => eprintln!(
            "report {report_id} ({reference_type}): {new} new, {existing} existing, {resolved} resolved"
        ),
        SaveOutcome::AlreadyMerged { report_id } => {
            eprintln!("report {report_id} ({reference_type}): already merged, nothing written")
        }
        SaveOutcome::Skipped { report_id } => eprintln!(
            "report {report_id} ({reference_type}): comparison did not run, ledger unchanged"
        ),
    }
    Ok(())
}

fn save<K: ContentKey>(store: &ReportStore, file: ReportFile) -> Result<SaveOutcome, CliError> {
    let mut report = file.into_report::<K>().map_err(CliError::report_invalid)?;
    store.save_report(&mut report).map_err(CliError::store)
}
