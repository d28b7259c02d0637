//! Internal services the sync handlers depend on.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{RemoteGroupMapping, SyncSetting};

/// Per-party sync settings.
#[async_trait]
pub trait SyncSettingStore: Send + Sync {
    /// Returns [`StoreError::NotFound`] when the party never set up sync.
    async fn get_by_party(&self, party_id: i64) -> Result<SyncSetting, StoreError>;
}

/// Local contact groups.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Create a group and return its id.
    async fn add_group(&self, party_id: i64, name: &str) -> Result<i64, StoreError>;

    async fn update_group(&self, group_id: i64, name: &str) -> Result<(), StoreError>;

    async fn delete_group(&self, group_id: i64) -> Result<(), StoreError>;
}

/// Links between remote records and local records.
#[async_trait]
pub trait RemoteDataStore: Send + Sync {
    async fn list_group_mappings(&self, party_id: i64)
        -> Result<Vec<RemoteGroupMapping>, StoreError>;

    async fn upsert_group_mapping(
        &self,
        party_id: i64,
        mapping: &RemoteGroupMapping,
    ) -> Result<(), StoreError>;

    async fn delete_group_mapping(
        &self,
        party_id: i64,
        remote_group_id: &str,
    ) -> Result<(), StoreError>;

    /// Remote contact ids belonging to at least one mapped group.
    async fn contact_ids_in_groups(&self, party_id: i64) -> Result<HashSet<String>, StoreError>;
}

/// Sync progress shared with the status tracker.
#[async_trait]
pub trait SyncProgressStore: Send + Sync {
    /// Record how many contacts this sync will process.
    async fn record_total(&self, party_id: i64, total: u64) -> Result<(), StoreError>;
}
