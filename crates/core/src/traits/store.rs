//! Persistence collaborator

use async_trait::async_trait;

use crate::{PartialRecord, Result};

/// Hosted datastore receiving profile and budget fields
///
/// The core only writes; it never reads records back.
#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    /// Upsert the given fields for a user
    async fn upsert(&self, user_id: &str, record: &PartialRecord) -> Result<()>;
}
