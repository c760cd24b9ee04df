//! In-memory profile store
//!
//! Stands in for the hosted datastore in tests and the CLI. Upserts merge
//! into the stored record field by field.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use counselor_core::{Error, PartialRecord, ProfileStore, Result};

#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    records: RwLock<HashMap<String, PartialRecord>>,
    upserts: AtomicUsize,
    unavailable: AtomicBool,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current record for a user
    pub fn get(&self, user_id: &str) -> Option<PartialRecord> {
        self.records.read().get(user_id).cloned()
    }

    /// Successful upserts so far
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::Relaxed)
    }

    /// Make every upsert fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn upsert(&self, user_id: &str, record: &PartialRecord) -> Result<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(Error::Persistence("store unavailable".to_string()));
        }

        let mut records = self.records.write();
        let stored = records.entry(user_id.to_string()).or_default();
        stored
            .fields
            .extend(record.fields.iter().map(|(name, value)| (*name, value.clone())));
        self.upserts.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            user_id = %user_id,
            record = %record.to_json(),
            "Profile fields upserted"
        );
        Ok(())
    }
}
