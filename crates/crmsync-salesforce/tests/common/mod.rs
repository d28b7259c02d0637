//! Common test utilities for crmsync-salesforce integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmsync_connector::{
    ConnectorError, ConnectorResult, Credential, CredentialRefresher, Page, PageRequest,
    PageSource, RefreshRequest,
};
use crmsync_salesforce::{
    GroupStore, IntegrationType, OAuthToken, RemoteDataStore, RemoteGroupMapping, StoreError,
    SyncProgressStore, SyncServices, SyncSetting, SyncSettingStore,
};
use crmsync_worker::InMemoryBus;
use secrecy::SecretString;

pub const PARTY_ID: i64 = 42;

/// Ordered log of store writes shared by the fakes.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Position of the first entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .position(|e| e.starts_with(prefix))
            .unwrap_or_else(|| panic!("no journal entry starting with {prefix}"))
    }

    /// Position of the last entry starting with `prefix`.
    pub fn last_position(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .rposition(|e| e.starts_with(prefix))
            .unwrap_or_else(|| panic!("no journal entry starting with {prefix}"))
    }
}

/// Shape of the stored sync setting.
#[derive(Debug, Clone)]
pub struct SettingFixture {
    pub integration_type: IntegrationType,
    pub remote_group_ids: Vec<String>,
    pub previous_sync_start: Option<DateTime<Utc>>,
}

impl SettingFixture {
    pub fn salesforce() -> Self {
        Self {
            integration_type: IntegrationType::Salesforce,
            remote_group_ids: Vec::new(),
            previous_sync_start: None,
        }
    }

    pub fn integration(mut self, integration_type: IntegrationType) -> Self {
        self.integration_type = integration_type;
        self
    }

    pub fn groups(mut self, ids: &[&str]) -> Self {
        self.remote_group_ids = ids.iter().map(|id| (*id).to_string()).collect();
        self
    }

    pub fn previous_start(mut self, start: DateTime<Utc>) -> Self {
        self.previous_sync_start = Some(start);
        self
    }
}

pub enum FakeSettings {
    Present(SettingFixture),
    Missing,
    Unavailable,
}

#[async_trait]
impl SyncSettingStore for FakeSettings {
    async fn get_by_party(&self, party_id: i64) -> Result<SyncSetting, StoreError> {
        match self {
            Self::Present(fixture) => Ok(SyncSetting {
                party_id,
                integration_type: fixture.integration_type,
                oauth_token: OAuthToken::new("https://acme.my.salesforce.com", "old-token"),
                remote_group_ids: fixture.remote_group_ids.clone(),
                previous_sync_start: fixture.previous_sync_start,
            }),
            Self::Missing => Err(StoreError::NotFound),
            Self::Unavailable => Err(StoreError::Unavailable("connection refused".to_string())),
        }
    }
}

pub struct FakeGroups {
    journal: Journal,
    next_id: AtomicI64,
}

impl FakeGroups {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            next_id: AtomicI64::new(100),
        }
    }
}

#[async_trait]
impl GroupStore for FakeGroups {
    async fn add_group(&self, _party_id: i64, name: &str) -> Result<i64, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.journal.push(format!("add_group:{name}:{id}"));
        Ok(id)
    }

    async fn update_group(&self, group_id: i64, name: &str) -> Result<(), StoreError> {
        self.journal.push(format!("update_group:{group_id}:{name}"));
        Ok(())
    }

    async fn delete_group(&self, group_id: i64) -> Result<(), StoreError> {
        self.journal.push(format!("delete_group:{group_id}"));
        Ok(())
    }
}

pub struct FakeRemoteData {
    journal: Journal,
    mappings: Vec<RemoteGroupMapping>,
    contact_ids: HashSet<String>,
}

impl FakeRemoteData {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            mappings: Vec::new(),
            contact_ids: HashSet::new(),
        }
    }

    pub fn mapping(mut self, remote_id: &str, name: &str, group_id: i64) -> Self {
        self.mappings.push(RemoteGroupMapping {
            group_id,
            remote_group_id: remote_id.to_string(),
            remote_group_name: name.to_string(),
        });
        self
    }

    pub fn contacts_in_groups(mut self, ids: &[&str]) -> Self {
        self.contact_ids = ids.iter().map(|id| (*id).to_string()).collect();
        self
    }
}

#[async_trait]
impl RemoteDataStore for FakeRemoteData {
    async fn list_group_mappings(
        &self,
        _party_id: i64,
    ) -> Result<Vec<RemoteGroupMapping>, StoreError> {
        Ok(self.mappings.clone())
    }

    async fn upsert_group_mapping(
        &self,
        _party_id: i64,
        mapping: &RemoteGroupMapping,
    ) -> Result<(), StoreError> {
        self.journal.push(format!(
            "upsert_mapping:{}:{}:{}",
            mapping.remote_group_id, mapping.group_id, mapping.remote_group_name
        ));
        Ok(())
    }

    async fn delete_group_mapping(
        &self,
        _party_id: i64,
        remote_group_id: &str,
    ) -> Result<(), StoreError> {
        self.journal.push(format!("delete_mapping:{remote_group_id}"));
        Ok(())
    }

    async fn contact_ids_in_groups(&self, _party_id: i64) -> Result<HashSet<String>, StoreError> {
        Ok(self.contact_ids.clone())
    }
}

#[derive(Default)]
pub struct FakeProgress {
    totals: Mutex<Vec<(i64, u64)>>,
}

impl FakeProgress {
    pub fn totals(&self) -> Vec<(i64, u64)> {
        self.totals.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncProgressStore for FakeProgress {
    async fn record_total(&self, party_id: i64, total: u64) -> Result<(), StoreError> {
        self.totals.lock().unwrap().push((party_id, total));
        Ok(())
    }
}

/// Refresher returning a fixed token, or failing.
pub struct StaticRefresher {
    token: Option<String>,
}

impl StaticRefresher {
    pub fn issuing(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl CredentialRefresher for StaticRefresher {
    async fn refresh(&self, _request: &RefreshRequest) -> Option<SecretString> {
        self.token.clone().map(SecretString::from)
    }
}

/// Page source serving a fixed list of pages, optionally rejecting the
/// first request as an expired session.
pub struct PagedSource<T> {
    pages: HashMap<String, Page<T>>,
    first: Mutex<VecDeque<ConnectorResult<Page<T>>>>,
    requests: Mutex<Vec<PageRequest>>,
    tokens: Mutex<Vec<String>>,
}

impl<T: Clone> PagedSource<T> {
    pub fn new(first: Page<T>) -> Self {
        Self {
            pages: HashMap::new(),
            first: Mutex::new(VecDeque::from([Ok(first)])),
            requests: Mutex::new(Vec::new()),
            tokens: Mutex::new(Vec::new()),
        }
    }

    /// Reject the first request with an expired session before answering.
    pub fn expired_first(self) -> Self {
        self.first.lock().unwrap().push_front(Err(ConnectorError::remote(
            401,
            Some("INVALID_SESSION_ID"),
            "Session expired or invalid",
        )));
        self
    }

    pub fn then(mut self, cursor: &str, page: Page<T>) -> Self {
        self.pages.insert(cursor.to_string(), page);
        self
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> PageSource<T> for PagedSource<T> {
    async fn first_page(
        &self,
        credential: &Credential,
        request: &PageRequest,
    ) -> ConnectorResult<Page<T>> {
        self.requests.lock().unwrap().push(request.clone());
        self.tokens
            .lock()
            .unwrap()
            .push(credential.access_token().to_string());
        self.first
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ConnectorError::remote(500, None, "unscripted first page")))
    }

    async fn next_page(&self, credential: &Credential, cursor: &str) -> ConnectorResult<Page<T>> {
        self.tokens
            .lock()
            .unwrap()
            .push(credential.access_token().to_string());
        self.pages
            .get(cursor)
            .cloned()
            .ok_or_else(|| ConnectorError::remote(500, None, format!("unscripted {cursor}")))
    }
}

pub fn page<T>(records: Vec<T>, next: Option<&str>, total: Option<u64>) -> Page<T> {
    Page {
        records,
        next_cursor: next.map(str::to_string),
        total_size: total,
    }
}

/// Fakes wired into [`SyncServices`], with handles kept for assertions.
pub struct Harness {
    pub services: SyncServices,
    pub journal: Journal,
    pub progress: Arc<FakeProgress>,
    pub bus: Arc<InMemoryBus>,
}

impl Harness {
    pub fn new(
        settings: FakeSettings,
        remote_data: FakeRemoteData,
        refresher: StaticRefresher,
    ) -> Self {
        crmsync_worker::logging::init_test_logging();
        let journal = remote_data.journal.clone();
        let progress = Arc::new(FakeProgress::default());
        let bus = Arc::new(InMemoryBus::new());
        let services = SyncServices {
            settings: Arc::new(settings),
            groups: Arc::new(FakeGroups::new(journal.clone())),
            remote_data: Arc::new(remote_data),
            progress: progress.clone(),
            refresher: Arc::new(refresher),
            bus: bus.clone(),
        };
        Self {
            services,
            journal,
            progress,
            bus,
        }
    }
}
