// Prior-version links between bills

use std::collections::BTreeSet;

use log::debug;
use rusqlite::{params, Connection};

use spotcheck_recon::BillKey;

use crate::codec::{key_from_json, key_to_json};
use crate::error::StoreError;
use crate::store::ReportStore;

/// A stored link set is replaced only when it differs from the incoming one.
pub fn prior_versions_changed(stored: &BTreeSet<BillKey>, incoming: &BTreeSet<BillKey>) -> bool {
    stored != incoming
}

impl ReportStore {
    /// Prior versions recorded for a bill. Links are held on the base bill,
    /// so any amendment of it finds the same set.
    pub fn prior_versions(&self, bill: &BillKey) -> Result<BTreeSet<BillKey>, StoreError> {
        let conn = self.lock()?;
        stored_prior_versions(&conn, &key_to_json(&bill.base_key())?)
    }

    /// Replaces a bill's prior versions. Returns whether anything changed.
    pub fn replace_prior_versions(
        &self,
        bill: &BillKey,
        incoming: &BTreeSet<BillKey>,
    ) -> Result<bool, StoreError> {
        let bill_json = key_to_json(&bill.base_key())?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let stored = stored_prior_versions(&tx, &bill_json)?;
        if !prior_versions_changed(&stored, incoming) {
            return Ok(false);
        }

        tx.execute("DELETE FROM bill_prior_version WHERE bill = ?1", params![bill_json])?;
        for prior in incoming {
            tx.execute(
                "INSERT INTO bill_prior_version (bill, prior_version) VALUES (?1, ?2)",
                params![bill_json, key_to_json(prior)?],
            )?;
        }
        tx.commit()?;
        debug!(
            "prior versions of {}-{} replaced ({} -> {})",
            bill.print_no,
            bill.session_year,
            stored.len(),
            incoming.len()
        );
        Ok(true)
    }
}

fn stored_prior_versions(conn: &Connection, bill_json: &str) -> Result<BTreeSet<BillKey>, StoreError> {
    let mut stmt = conn.prepare("SELECT prior_version FROM bill_prior_version WHERE bill = ?1")?;
    let encoded = stmt
        .query_map(params![bill_json], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    encoded.iter().map(|s| key_from_json(s)).collect()
}
