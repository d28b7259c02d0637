//! Paginated traversal that survives an expiring access token.
//!
//! Every request goes through the refresh policy: if the remote rejects the
//! token as expired, the credential is refreshed once through the
//! [`CredentialRefresher`] and the request retried exactly once. The first
//! page additionally falls back through the plan's field sets when the
//! primary query is rejected.

use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::credential::{
    Credential, CredentialRefresher, RefreshRequest, DEFAULT_REFRESH_MAX_RETRIES,
    DEFAULT_REFRESH_RETRY_WAIT,
};
use crate::error::{ConnectorError, ConnectorResult};
use crate::page::{FieldSetPlan, Page, PageRequest, PageSource};

const MAX_PREALLOCATED: u64 = 50_000;

/// How patiently the token service should refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub max_retries: u32,
    pub retry_wait: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_REFRESH_MAX_RETRIES,
            retry_wait: DEFAULT_REFRESH_RETRY_WAIT,
        }
    }
}

/// One traversal over a [`PageSource`].
///
/// Borrows the credential mutably for the duration of the traversal, so a
/// refreshed token is visible to the caller afterwards.
pub struct PageFetcher<'a, T> {
    source: &'a dyn PageSource<T>,
    refresher: &'a dyn CredentialRefresher,
    credential: &'a mut Credential,
    subject: String,
    policy: RefreshPolicy,
}

impl<'a, T: Send> PageFetcher<'a, T> {
    pub fn new(
        source: &'a dyn PageSource<T>,
        refresher: &'a dyn CredentialRefresher,
        credential: &'a mut Credential,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            source,
            refresher,
            credential,
            subject: subject.into(),
            policy: RefreshPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetch the first page of `plan`.
    ///
    /// The primary field set is tried under the refresh policy. If it still
    /// fails, each fallback is tried once in order. A credential refresh
    /// failure is returned as is; otherwise, when every field set fails, the
    /// last failure is returned as [`ConnectorError::RemoteUnavailable`].
    pub async fn first_page(&mut self, plan: &FieldSetPlan) -> ConnectorResult<Page<T>> {
        let primary = plan
            .request(0)
            .ok_or_else(|| ConnectorError::Config("field-set plan has no field sets".to_string()))?;

        let mut last = match self.first_with_refresh(&primary).await {
            Ok(page) => return Ok(page),
            Err(e) if e.is_ignorable() => return Err(e),
            Err(e) => e,
        };

        for index in 1..plan.field_sets().len() {
            let Some(request) = plan.request(index) else {
                break;
            };
            warn!(
                resource = %plan.resource,
                failed = %last,
                fallback = %request.fields.label,
                "First page query failed, trying fallback field set"
            );

            match self.source.first_page(&*self.credential, &request).await {
                Ok(page) => return Ok(page),
                Err(e) => last = e,
            }
        }

        Err(last.into_unavailable())
    }

    /// Fetch the page after `cursor`.
    pub async fn next_page(&mut self, cursor: &str) -> ConnectorResult<Page<T>> {
        let attempt = self.source.next_page(&*self.credential, cursor).await;
        let result = match attempt {
            Err(e) if e.is_session_expired() => {
                self.refresh().await?;
                self.source.next_page(&*self.credential, cursor).await
            }
            other => other,
        };

        result.map_err(ConnectorError::into_unavailable)
    }

    /// Fetch every record, following continuation tokens until exhausted.
    #[instrument(skip_all, fields(resource = %plan.resource, subject = %self.subject))]
    pub async fn fetch_all(&mut self, plan: &FieldSetPlan) -> ConnectorResult<Vec<T>> {
        let mut page = self.first_page(plan).await?;
        let capacity = page
            .total_size
            .map_or(page.records.len(), |total| total.min(MAX_PREALLOCATED) as usize);
        let mut records = Vec::with_capacity(capacity);
        let mut pages = 1usize;

        loop {
            records.append(&mut page.records);
            let Some(cursor) = page.next_cursor.take() else {
                break;
            };
            page = self.next_page(&cursor).await?;
            pages += 1;
        }

        info!(pages, records = records.len(), "Fetched all pages");
        Ok(records)
    }

    async fn first_with_refresh(&mut self, request: &PageRequest) -> ConnectorResult<Page<T>> {
        let attempt = self.source.first_page(&*self.credential, request).await;
        match attempt {
            Err(e) if e.is_session_expired() => {
                self.refresh().await?;
                self.source.first_page(&*self.credential, request).await
            }
            other => other,
        }
    }

    async fn refresh(&mut self) -> ConnectorResult<()> {
        debug!(subject = %self.subject, "Access token expired, refreshing");

        let request = RefreshRequest {
            subject: self.subject.clone(),
            max_retries: self.policy.max_retries,
            retry_wait: self.policy.retry_wait,
        };

        match self.refresher.refresh(&request).await {
            Some(token) => {
                self.credential.replace_access_token(token);
                info!(subject = %self.subject, "Access token refreshed");
                Ok(())
            }
            None => {
                warn!(subject = %self.subject, "Refresh Token Failed.");
                Err(ConnectorError::CredentialRefreshFailed {
                    subject: self.subject.clone(),
                })
            }
        }
    }
}
