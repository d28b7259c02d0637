//! Collaborator handles shared by the sync handlers.

use std::sync::Arc;

use crmsync_connector::CredentialRefresher;
use crmsync_worker::OutboundBus;
use tracing::debug;

use crate::error::{StoreError, SyncError, SyncResult};
use crate::models::SyncSetting;
use crate::stores::{GroupStore, RemoteDataStore, SyncProgressStore, SyncSettingStore};

/// Handles to every internal service a sync run talks to.
#[derive(Clone)]
pub struct SyncServices {
    pub settings: Arc<dyn SyncSettingStore>,
    pub groups: Arc<dyn GroupStore>,
    pub remote_data: Arc<dyn RemoteDataStore>,
    pub progress: Arc<dyn SyncProgressStore>,
    pub refresher: Arc<dyn CredentialRefresher>,
    pub bus: Arc<dyn OutboundBus>,
}

impl SyncServices {
    /// Load the party's sync setting and check the integration is one we sync.
    ///
    /// A party without a setting, or integrated with another CRM, yields
    /// [`SyncError::Ignored`] titled `title`.
    pub async fn verify_sync_setting(&self, party_id: i64, title: &str) -> SyncResult<SyncSetting> {
        let setting = match self.settings.get_by_party(party_id).await {
            Ok(setting) => setting,
            Err(StoreError::NotFound) => return Err(SyncError::ignored(title, "Not set up yet")),
            Err(e) => return Err(SyncError::store("Get sync setting")(e)),
        };

        if !setting.integration_type.is_salesforce_family() {
            debug!(party_id, integration_type = ?setting.integration_type, "Skipping party");
            return Err(SyncError::ignored(
                title,
                "IntegrationType is not Salesforce and Practifi",
            ));
        }

        Ok(setting)
    }
}

impl std::fmt::Debug for SyncServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncServices").finish_non_exhaustive()
    }
}
