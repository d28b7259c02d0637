//! Campaign sync: mirror Salesforce campaigns as local contact groups.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use crmsync_connector::{reconcile, PageFetcher, PageSource, ReconcilePlan, TopicMapping};
use crmsync_worker::{BoxError, CorrelationContext, Envelope, HandlerOutcome, MessageHandler};
use futures::future::try_join_all;
use tracing::{info, instrument};

use crate::config::SalesforceSyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::fields::campaign_plan;
use crate::messages::{TopicAssignmentsSyncRequest, TopicsSyncRequest};
use crate::models::{CampaignRecord, RemoteGroupMapping};
use crate::services::SyncServices;

const TITLE: &str = "Salesforce Topics Syncer";

/// Handler for `salesforce-topics-syncer`.
pub struct TopicsSyncHandler {
    services: SyncServices,
    source: Arc<dyn PageSource<CampaignRecord>>,
    config: SalesforceSyncConfig,
}

impl TopicsSyncHandler {
    pub fn new(
        services: SyncServices,
        source: Arc<dyn PageSource<CampaignRecord>>,
        config: SalesforceSyncConfig,
    ) -> Self {
        Self {
            services,
            source,
            config,
        }
    }

    #[instrument(skip(self), fields(party_id = request.party_id))]
    async fn sync(&self, request: &TopicsSyncRequest) -> SyncResult<Vec<Envelope>> {
        let party_id = request.party_id;
        let setting = self.services.verify_sync_setting(party_id, TITLE).await?;

        let plan = campaign_plan(setting.integration_type);
        let mut credential = setting.oauth_token.credential();
        let mut fetcher = PageFetcher::new(
            &*self.source,
            &*self.services.refresher,
            &mut credential,
            party_id.to_string(),
        )
        .with_policy(self.config.refresh_policy);

        let (campaigns, mappings) = futures::try_join!(
            async { fetcher.fetch_all(&plan).await.map_err(SyncError::from) },
            async {
                self.services
                    .remote_data
                    .list_group_mappings(party_id)
                    .await
                    .map_err(SyncError::store("List remote group mappings"))
            },
        )?;

        let source: Vec<TopicMapping> = campaigns.into_iter().map(TopicMapping::from).collect();
        let previous: Vec<TopicMapping> = mappings.iter().map(TopicMapping::from).collect();
        let changes = reconcile(&source, &previous, &setting.remote_group_ids);

        info!(
            campaigns = source.len(),
            inserts = changes.to_insert.len(),
            updates = changes.to_update.len(),
            deletes = changes.to_delete.len(),
            "Reconciled campaigns"
        );

        self.apply(party_id, &changes).await?;

        let follow_up = Envelope::wrap(&TopicAssignmentsSyncRequest { party_id })?;
        Ok(vec![follow_up])
    }

    /// Inserts, then deletes, then updates.
    async fn apply(&self, party_id: i64, changes: &ReconcilePlan) -> SyncResult<()> {
        try_join_all(
            changes
                .to_insert
                .iter()
                .map(|topic| self.insert_group(party_id, topic)),
        )
        .await?;

        self.delete_groups(party_id, &changes.to_delete).await?;
        self.update_groups(party_id, &changes.to_update).await
    }

    async fn insert_group(&self, party_id: i64, topic: &TopicMapping) -> SyncResult<()> {
        let group_id = self
            .services
            .groups
            .add_group(party_id, &topic.name)
            .await
            .map_err(SyncError::store("Add group"))?;

        self.services
            .remote_data
            .upsert_group_mapping(party_id, &group_mapping(group_id, topic))
            .await
            .map_err(SyncError::store("Upsert group mapping"))
    }

    async fn delete_groups(&self, party_id: i64, deleted: &[TopicMapping]) -> SyncResult<()> {
        let mut seen = HashSet::new();
        let group_ids: Vec<i64> = deleted
            .iter()
            .filter_map(|topic| topic.internal_id)
            .filter(|id| seen.insert(*id))
            .collect();

        try_join_all(group_ids.iter().map(|id| async move {
            self.services
                .groups
                .delete_group(*id)
                .await
                .map_err(SyncError::store("Delete group"))
        }))
        .await?;

        let mut seen = HashSet::new();
        try_join_all(
            deleted
                .iter()
                .filter(|topic| seen.insert(topic.external_id.as_str()))
                .map(|topic| async move {
                    self.services
                        .remote_data
                        .delete_group_mapping(party_id, &topic.external_id)
                        .await
                        .map_err(SyncError::store("Delete group mapping"))
                }),
        )
        .await?;
        Ok(())
    }

    async fn update_groups(&self, party_id: i64, updated: &[TopicMapping]) -> SyncResult<()> {
        let existing: Vec<(i64, &TopicMapping)> = updated
            .iter()
            .filter_map(|topic| topic.internal_id.map(|id| (id, topic)))
            .collect();

        try_join_all(existing.iter().map(|(id, topic)| async move {
            self.services
                .groups
                .update_group(*id, &topic.name)
                .await
                .map_err(SyncError::store("Update group"))
        }))
        .await?;

        try_join_all(existing.iter().map(|(id, topic)| async move {
            self.services
                .remote_data
                .upsert_group_mapping(party_id, &group_mapping(*id, topic))
                .await
                .map_err(SyncError::store("Upsert group mapping"))
        }))
        .await?;
        Ok(())
    }
}

fn group_mapping(group_id: i64, topic: &TopicMapping) -> RemoteGroupMapping {
    RemoteGroupMapping {
        group_id,
        remote_group_id: topic.external_id.clone(),
        remote_group_name: topic.name.clone(),
    }
}

#[async_trait]
impl MessageHandler for TopicsSyncHandler {
    fn name(&self) -> &str {
        "TopicsSyncer"
    }

    async fn handle(
        &self,
        message: &Envelope,
        _ctx: &CorrelationContext,
    ) -> Result<HandlerOutcome, BoxError> {
        let request: TopicsSyncRequest = message.decode()?;
        match self.sync(&request).await {
            Ok(follow_ups) => Ok(HandlerOutcome::Completed(follow_ups)),
            Err(e) => Ok(e.into_outcome()?),
        }
    }
}
