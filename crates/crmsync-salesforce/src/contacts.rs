//! Contact sync: stream Salesforce contacts into the local contact store.
//!
//! Contacts are read page by page and every page is published as
//! `contact-updater` messages before the next one is requested, so a large
//! org never sits in memory at once.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use crmsync_connector::{PageFetcher, PageSource};
use crmsync_worker::{BoxError, CorrelationContext, Envelope, HandlerOutcome, MessageHandler};
use tracing::{info, instrument};

use crate::config::SalesforceSyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::fields::contact_plan;
use crate::mapper::map_contact;
use crate::messages::{ContactUpdate, ContactsSyncRequest};
use crate::models::{SalesforceContact, SyncSetting};
use crate::services::SyncServices;

const TITLE: &str = "Salesforce Contacts Syncer";

/// Handler for `salesforce-contacts-syncer`.
pub struct ContactsSyncHandler {
    services: SyncServices,
    source: Arc<dyn PageSource<SalesforceContact>>,
    config: SalesforceSyncConfig,
}

impl ContactsSyncHandler {
    pub fn new(
        services: SyncServices,
        source: Arc<dyn PageSource<SalesforceContact>>,
        config: SalesforceSyncConfig,
    ) -> Self {
        Self {
            services,
            source,
            config,
        }
    }

    #[instrument(skip(self), fields(party_id = request.party_id))]
    async fn sync(&self, request: &ContactsSyncRequest) -> SyncResult<()> {
        let party_id = request.party_id;
        let setting = self.services.verify_sync_setting(party_id, TITLE).await?;

        let since = if self.config.force_full_sync {
            None
        } else {
            setting
                .previous_sync_start
                .map(|start| start - self.config.delta_overlap)
        };

        let selected = if setting.remote_group_ids.is_empty() {
            None
        } else {
            let ids = self
                .services
                .remote_data
                .contact_ids_in_groups(party_id)
                .await
                .map_err(SyncError::store("List contacts in groups"))?;
            Some(ids)
        };

        info!(
            full_sync = since.is_none(),
            since = ?since,
            filtered = selected.is_some(),
            "Syncing contacts"
        );

        let plan = contact_plan(since);
        let mut credential = setting.oauth_token.credential();
        let mut fetcher = PageFetcher::new(
            &*self.source,
            &*self.services.refresher,
            &mut credential,
            party_id.to_string(),
        )
        .with_policy(self.config.refresh_policy);

        let mut page = fetcher.first_page(&plan).await?;
        let total = page.total_size.unwrap_or(page.records.len() as u64);
        self.services
            .progress
            .record_total(party_id, total)
            .await
            .map_err(SyncError::store("Record sync total"))?;

        let mut pages = 1usize;
        let mut published = 0usize;
        loop {
            published += self
                .publish_page(&setting, &page.records, selected.as_ref())
                .await?;
            let Some(cursor) = page.next_cursor.take() else {
                break;
            };
            page = fetcher.next_page(&cursor).await?;
            pages += 1;
        }

        info!(total, pages, published, "Contacts synced");
        Ok(())
    }

    /// Publish one page of contacts, skipping those outside the selected groups.
    async fn publish_page(
        &self,
        setting: &SyncSetting,
        contacts: &[SalesforceContact],
        selected: Option<&HashSet<String>>,
    ) -> SyncResult<usize> {
        let envelopes = contacts
            .iter()
            .filter(|contact| selected.map_or(true, |ids| ids.contains(&contact.id)))
            .map(|contact| {
                Envelope::wrap(&ContactUpdate {
                    party_id: setting.party_id,
                    integration_type: setting.integration_type,
                    contact: map_contact(contact),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if envelopes.is_empty() {
            return Ok(0);
        }

        self.services
            .bus
            .publish(&envelopes)
            .await
            .map_err(|e| SyncError::Publish {
                count: envelopes.len(),
                cause: e.to_string(),
            })?;
        Ok(envelopes.len())
    }
}

#[async_trait]
impl MessageHandler for ContactsSyncHandler {
    fn name(&self) -> &str {
        "ContactsSyncer"
    }

    async fn handle(
        &self,
        message: &Envelope,
        _ctx: &CorrelationContext,
    ) -> Result<HandlerOutcome, BoxError> {
        let request: ContactsSyncRequest = message.decode()?;
        match self.sync(&request).await {
            Ok(()) => Ok(HandlerOutcome::done()),
            Err(e) => Ok(e.into_outcome()?),
        }
    }
}
