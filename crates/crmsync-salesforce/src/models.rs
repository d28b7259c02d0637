//! Domain models for Salesforce sync.

use chrono::{DateTime, NaiveDate, Utc};
use crmsync_connector::{Credential, TopicMapping};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// CRM flavour a party is integrated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrationType {
    Salesforce,
    Practifi,
    #[serde(other)]
    Unsupported,
}

impl IntegrationType {
    /// Returns true for the integrations these handlers sync.
    #[must_use]
    pub fn is_salesforce_family(self) -> bool {
        matches!(self, Self::Salesforce | Self::Practifi)
    }
}

/// Stored OAuth token for a party.
pub struct OAuthToken {
    pub api_endpoint: String,
    pub access_token: SecretString,
}

impl OAuthToken {
    pub fn new(api_endpoint: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            api_endpoint: api_endpoint.into(),
            access_token: SecretString::from(access_token.into()),
        }
    }

    /// A fresh credential for one traversal.
    #[must_use]
    pub fn credential(&self) -> Credential {
        Credential::new(
            self.api_endpoint.clone(),
            self.access_token.expose_secret().to_string(),
        )
    }
}

impl std::fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthToken")
            .field("api_endpoint", &self.api_endpoint)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Per-party sync configuration.
#[derive(Debug)]
pub struct SyncSetting {
    pub party_id: i64,
    pub integration_type: IntegrationType,
    pub oauth_token: OAuthToken,
    /// Remote group ids the user selected; empty means everything.
    pub remote_group_ids: Vec<String>,
    /// Start of the previous successful sync.
    pub previous_sync_start: Option<DateTime<Utc>>,
}

/// Contact row as returned by the Contact query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SalesforceContact {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birthdate: Option<NaiveDate>,
    /// Custom birthdate field some orgs use instead of the standard one.
    #[serde(rename = "BirthDate__c")]
    pub birth_date_c: Option<NaiveDate>,
    pub mailing_street: Option<String>,
    pub mailing_city: Option<String>,
    pub mailing_state: Option<String>,
    pub mailing_postal_code: Option<String>,
}

/// Campaign (or Practifi campaign interaction) row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CampaignRecord {
    pub id: String,
    pub name: String,
}

/// Persisted link between a remote group and a local group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteGroupMapping {
    pub group_id: i64,
    pub remote_group_id: String,
    pub remote_group_name: String,
}

impl From<&RemoteGroupMapping> for TopicMapping {
    fn from(mapping: &RemoteGroupMapping) -> Self {
        TopicMapping {
            external_id: mapping.remote_group_id.clone(),
            name: mapping.remote_group_name.clone(),
            internal_id: Some(mapping.group_id),
        }
    }
}

impl From<CampaignRecord> for TopicMapping {
    fn from(record: CampaignRecord) -> Self {
        TopicMapping::new(record.id, record.name)
    }
}

/// Contact in the local contact model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedContact {
    pub remote_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_address: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<MappedAddress>,
}

/// Postal address in the local contact model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedAddress {
    pub address1: Option<String>,
    pub address2: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}
