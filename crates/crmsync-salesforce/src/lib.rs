//! # crmsync-salesforce
//!
//! Salesforce sync handlers for the crmsync worker.
//!
//! - [`ContactsSyncHandler`] streams contacts page by page into
//!   `contact-updater` messages, using a delta read when a previous sync
//!   exists.
//! - [`TopicsSyncHandler`] mirrors campaigns as local groups and then asks
//!   for a group membership sync.
//!
//! Both handlers lock on the party id and treat a party without a usable
//! Salesforce setup, or whose token cannot be refreshed, as ignored.

pub mod config;
pub mod contacts;
pub mod error;
pub mod fields;
pub mod mapper;
pub mod messages;
pub mod models;
pub mod services;
pub mod stores;
pub mod topics;

pub use config::SalesforceSyncConfig;
pub use contacts::ContactsSyncHandler;
pub use error::{StoreError, SyncError, SyncResult};
pub use messages::{
    ContactUpdate, ContactsSyncRequest, TopicAssignmentsSyncRequest, TopicsSyncRequest,
    CONTACTS_SYNCER_TOPIC, CONTACT_UPDATER_TOPIC, TOPICS_SYNCER_TOPIC,
    TOPIC_ASSIGNMENTS_SYNCER_TOPIC,
};
pub use models::{
    CampaignRecord, IntegrationType, MappedAddress, MappedContact, OAuthToken, RemoteGroupMapping,
    SalesforceContact, SyncSetting,
};
pub use services::SyncServices;
pub use stores::{GroupStore, RemoteDataStore, SyncProgressStore, SyncSettingStore};
pub use topics::TopicsSyncHandler;
