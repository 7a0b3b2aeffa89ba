//! In-process bundle cache.

use std::collections::HashMap;
use std::sync::RwLock;

use arxivflat_shared::{ArxivFlatError, Result, SourceBundle, SubmissionId};

use crate::BundleCache;

/// [`BundleCache`] backed by a map. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<SubmissionId, SourceBundle>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BundleCache for MemoryCache {
    fn lookup(&self, id: &SubmissionId) -> Result<Option<SourceBundle>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(id).cloned())
    }

    fn store(&self, id: &SubmissionId, bundle: &SourceBundle) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(id.clone(), bundle.clone());
        Ok(())
    }

    fn purge(&self, id: &SubmissionId) -> Result<bool> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        Ok(entries.remove(id).is_some())
    }
}

fn poisoned() -> ArxivFlatError {
    ArxivFlatError::cache("memory cache lock poisoned")
}
