//! Message bodies consumed and produced by the sync handlers.

use crmsync_worker::Message;
use serde::{Deserialize, Serialize};

use crate::models::{IntegrationType, MappedContact};

/// Topic of the contact sync request.
pub const CONTACTS_SYNCER_TOPIC: &str = "salesforce-contacts-syncer";
/// Topic of the campaign (group) sync request.
pub const TOPICS_SYNCER_TOPIC: &str = "salesforce-topics-syncer";
/// Topic of the group membership sync that follows a group sync.
pub const TOPIC_ASSIGNMENTS_SYNCER_TOPIC: &str = "salesforce-topic-assignments-syncer";
/// Topic of the per-contact update.
pub const CONTACT_UPDATER_TOPIC: &str = "contact-updater";

/// Sync all contacts of a party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactsSyncRequest {
    pub party_id: i64,
}

impl Message for ContactsSyncRequest {
    const TOPIC: &'static str = CONTACTS_SYNCER_TOPIC;

    fn lock_key(&self) -> Option<String> {
        Some(self.party_id.to_string())
    }
}

/// Sync the campaigns of a party into local groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicsSyncRequest {
    pub party_id: i64,
}

impl Message for TopicsSyncRequest {
    const TOPIC: &'static str = TOPICS_SYNCER_TOPIC;

    fn lock_key(&self) -> Option<String> {
        Some(self.party_id.to_string())
    }
}

/// Sync group memberships after groups changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicAssignmentsSyncRequest {
    pub party_id: i64,
}

impl Message for TopicAssignmentsSyncRequest {
    const TOPIC: &'static str = TOPIC_ASSIGNMENTS_SYNCER_TOPIC;

    fn lock_key(&self) -> Option<String> {
        Some(self.party_id.to_string())
    }
}

/// Upsert one contact into the local contact store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactUpdate {
    pub party_id: i64,
    pub integration_type: IntegrationType,
    pub contact: MappedContact,
}

impl Message for ContactUpdate {
    const TOPIC: &'static str = CONTACT_UPDATER_TOPIC;
}
