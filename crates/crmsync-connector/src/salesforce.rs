//! Salesforce REST query client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::credential::Credential;
use crate::error::{ConnectorError, ConnectorResult};
use crate::page::{Page, PageRequest, PageSource};

/// Default REST API version.
pub const DEFAULT_API_VERSION: &str = "v58.0";

/// Salesforce error response entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesforceApiError {
    pub error_code: String,
    pub message: String,
}

/// Response wrapper for SOQL query results.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse<T> {
    pub total_size: Option<u64>,
    #[serde(default)]
    pub done: bool,
    pub next_records_url: Option<String>,
    pub records: Vec<T>,
}

impl<T> From<QueryResponse<T>> for Page<T> {
    fn from(response: QueryResponse<T>) -> Self {
        Page {
            records: response.records,
            next_cursor: if response.done {
                None
            } else {
                response.next_records_url
            },
            total_size: response.total_size,
        }
    }
}

/// SOQL query client implementing [`PageSource`].
#[derive(Debug, Clone)]
pub struct SalesforceClient {
    http_client: reqwest::Client,
    api_version: String,
}

impl SalesforceClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_version: impl Into<String>) -> ConnectorResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ConnectorError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self::with_http_client(http_client, api_version))
    }

    pub fn with_http_client(http_client: reqwest::Client, api_version: impl Into<String>) -> Self {
        Self {
            http_client,
            api_version: api_version.into(),
        }
    }

    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Query endpoint for `credential`'s instance.
    #[must_use]
    pub fn query_url(&self, credential: &Credential) -> String {
        format!(
            "{}/services/data/{}/query",
            credential.api_endpoint(),
            self.api_version
        )
    }

    async fn get<T: DeserializeOwned>(
        &self,
        credential: &Credential,
        request: reqwest::RequestBuilder,
    ) -> ConnectorResult<Page<T>> {
        let response = request.bearer_auth(credential.access_token()).send().await?;
        let status = response.status();

        if status.is_success() {
            let body: QueryResponse<T> = response.json().await?;
            debug!(
                records = body.records.len(),
                total = body.total_size,
                done = body.done,
                "Query page received"
            );
            return Ok(body.into());
        }

        let error_body = response.text().await?;
        if let Ok(errors) = serde_json::from_str::<Vec<SalesforceApiError>>(&error_body) {
            if let Some(first) = errors.into_iter().next() {
                return Err(ConnectorError::remote(
                    status.as_u16(),
                    Some(&first.error_code),
                    first.message,
                ));
            }
        }

        Err(ConnectorError::remote(status.as_u16(), None, error_body))
    }
}

/// Build the SOQL statement for a first-page request.
#[must_use]
pub fn build_soql(request: &PageRequest) -> String {
    let mut soql = format!(
        "SELECT {} FROM {}",
        request.fields.fields.join(", "),
        request.resource
    );
    if let Some(since) = request.modified_since {
        soql.push_str(" WHERE LastModifiedDate >= ");
        soql.push_str(&soql_datetime(since));
    }
    soql
}

fn soql_datetime(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl<T> PageSource<T> for SalesforceClient
where
    T: DeserializeOwned + Send + 'static,
{
    #[instrument(
        skip(self, credential, request),
        fields(resource = %request.resource, fields = %request.fields.label)
    )]
    async fn first_page(
        &self,
        credential: &Credential,
        request: &PageRequest,
    ) -> ConnectorResult<Page<T>> {
        let soql = build_soql(request);
        debug!(soql = %soql, "Running query");

        let builder = self
            .http_client
            .get(self.query_url(credential))
            .query(&[("q", soql.as_str())]);
        self.get(credential, builder).await
    }

    #[instrument(skip(self, credential))]
    async fn next_page(&self, credential: &Credential, cursor: &str) -> ConnectorResult<Page<T>> {
        let url = if cursor.starts_with("http://") || cursor.starts_with("https://") {
            cursor.to_string()
        } else {
            format!("{}{}", credential.api_endpoint(), cursor)
        };

        let builder = self.http_client.get(url);
        self.get(credential, builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::FieldSet;
    use chrono::TimeZone;

    #[test]
    fn test_build_soql_full() {
        let request = PageRequest {
            resource: "Contact".to_string(),
            fields: FieldSet::new("primary", &["Id", "FirstName", "LastName"]),
            modified_since: None,
        };
        assert_eq!(build_soql(&request), "SELECT Id, FirstName, LastName FROM Contact");
    }

    #[test]
    fn test_build_soql_delta() {
        let request = PageRequest {
            resource: "Contact".to_string(),
            fields: FieldSet::new("primary", &["Id"]),
            modified_since: Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()),
        };
        assert_eq!(
            build_soql(&request),
            "SELECT Id FROM Contact WHERE LastModifiedDate >= 2024-03-01T08:30:00Z"
        );
    }

    #[test]
    fn test_done_page_has_no_cursor() {
        let response: QueryResponse<serde_json::Value> = serde_json::from_value(serde_json::json!({
            "totalSize": 1,
            "done": true,
            "nextRecordsUrl": "/services/data/v58.0/query/01g-2000",
            "records": [{"Id": "003"}]
        }))
        .unwrap();

        let page: Page<serde_json::Value> = response.into();
        assert!(page.is_last());
        assert_eq!(page.total_size, Some(1));
    }
}
