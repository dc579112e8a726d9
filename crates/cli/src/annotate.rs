//! `spotcheck ignore` and `spotcheck issue`: point updates on ledger rows.

use clap::Subcommand;

use spotcheck_recon::SpotCheckMismatchIgnore;

use crate::settings::Settings;
use crate::CliError;

#[derive(Subcommand)]
pub enum IssueCommands {
    /// Link an issue tracker id to a mismatch
    #[command(after_help = "\
Examples:
  spotcheck issue add 42 OL-1234
  spotcheck issue set 42 OL-1300")]
    Add { id: i64, issue: String },

    /// Replace every linked issue id with one
    Set { id: i64, issue: String },

    /// Unlink one issue id
    Remove { id: i64, issue: String },

    /// Unlink every issue id
    Clear { id: i64 },
}

pub fn cmd_ignore(settings: &Settings, mismatch_id: i64, status: SpotCheckMismatchIgnore) -> Result<(), CliError> {
    let store = settings.open_store()?;
    store
        .set_ignore_status(mismatch_id, Some(status))
        .map_err(CliError::store)?;
    eprintln!("mismatch {mismatch_id}: {status}");
    Ok(())
}

pub fn cmd_issue(settings: &Settings, cmd: IssueCommands) -> Result<(), CliError> {
    let store = settings.open_store()?;
    match cmd {
        IssueCommands::Add { id, issue } => {
            store.add_issue_id(id, &issue).map_err(CliError::store)?;
            eprintln!("mismatch {id}: linked {}", issue.trim());
        }
        IssueCommands::Set { id, issue } => {
            store.update_issue_id(id, &issue).map_err(CliError::store)?;
            eprintln!("mismatch {id}: issue ids now {}", issue.trim());
        }
        IssueCommands::Remove { id, issue } => {
            store.delete_issue_id(id, &issue).map_err(CliError::store)?;
            eprintln!("mismatch {id}: unlinked {}", issue.trim());
        }
        IssueCommands::Clear { id } => {
            store.clear_issue_ids(id).map_err(CliError::store)?;
            eprintln!("mismatch {id}: issue ids cleared");
        }
    }
    Ok(())
}
