use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use spotcheck_recon::{SpotCheckContentType, SpotCheckDataSource};

use crate::error::StoreError;

/// Merges for the same (datasource, content type) scope must not interleave:
/// each one reads the open ledger and appends to it.
pub type Scope = (SpotCheckDataSource, SpotCheckContentType);

/// Registry of per-scope merge locks, created on first use.
#[derive(Debug, Default)]
pub struct ScopeLocks {
    scopes: Mutex<HashMap<Scope, Arc<Mutex<()>>>>,
}

impl ScopeLocks {
    pub fn get(&self, scope: Scope) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut scopes = self.scopes.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(Arc::clone(scopes.entry(scope).or_default()))
    }
}
