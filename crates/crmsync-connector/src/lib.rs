//! # crmsync-connector
//!
//! Remote CRM access for the integration workers.
//!
//! - **Resilient pagination**: [`PageFetcher`] walks a cursor-based
//!   [`PageSource`], refreshing an expired access token once and falling
//!   back through alternative field sets on the first page.
//! - **Snapshot reconciliation**: [`reconcile`] turns a fresh remote
//!   collection and its persisted copy into insert/update/delete sets.
//! - **Salesforce**: [`SalesforceClient`] runs SOQL queries over REST.

pub mod credential;
pub mod error;
pub mod fetcher;
pub mod page;
pub mod reconcile;
pub mod salesforce;

pub use credential::{Credential, CredentialRefresher, RefreshRequest};
pub use error::{ConnectorError, ConnectorResult, SESSION_EXPIRED_CODE};
pub use fetcher::{PageFetcher, RefreshPolicy};
pub use page::{FieldSet, FieldSetPlan, Page, PageRequest, PageSource};
pub use reconcile::{reconcile, ReconcilePlan, TopicMapping};
pub use salesforce::{SalesforceClient, DEFAULT_API_VERSION};
