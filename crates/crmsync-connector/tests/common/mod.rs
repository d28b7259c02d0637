//! Common test utilities for crmsync-connector integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use crmsync_connector::{
    ConnectorError, ConnectorResult, Credential, CredentialRefresher, FieldSet, FieldSetPlan,
    Page, PageRequest, PageSource, RefreshRequest,
};
use secrecy::SecretString;

pub fn page(records: &[&str], next: Option<&str>) -> Page<String> {
    Page {
        records: records.iter().map(|r| (*r).to_string()).collect(),
        next_cursor: next.map(str::to_string),
        total_size: None,
    }
}

pub fn session_expired() -> ConnectorError {
    ConnectorError::remote(401, Some("INVALID_SESSION_ID"), "Session expired or invalid")
}

pub fn invalid_field(field: &str) -> ConnectorError {
    ConnectorError::remote(400, Some("INVALID_FIELD"), format!("No such column '{field}'"))
}

/// Three-level plan: primary, birthdate, minimal.
pub fn contact_plan() -> FieldSetPlan {
    FieldSetPlan::new("Contact", FieldSet::new("primary", &["Id", "Custom_Birthdate__c"]))
        .with_fallback(FieldSet::new("birthdate", &["Id", "Birthdate"]))
        .with_fallback(FieldSet::new("minimal", &["Id"]))
}

pub fn credential() -> Credential {
    Credential::new("https://acme.my.salesforce.com", "old-token")
}

/// A recorded call: field-set label (first page) or cursor, and the token used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub target: String,
    pub token: String,
}

/// Page source answering from per-label and per-cursor queues.
#[derive(Default)]
pub struct ScriptedSource {
    first: Mutex<HashMap<String, VecDeque<ConnectorResult<Page<String>>>>>,
    next: Mutex<HashMap<String, VecDeque<ConnectorResult<Page<String>>>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_first(self, label: &str, result: ConnectorResult<Page<String>>) -> Self {
        self.first
            .lock()
            .unwrap()
            .entry(label.to_string())
            .or_default()
            .push_back(result);
        self
    }

    pub fn on_next(self, cursor: &str, result: ConnectorResult<Page<String>>) -> Self {
        self.next
            .lock()
            .unwrap()
            .entry(cursor.to_string())
            .or_default()
            .push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn targets(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.target).collect()
    }

    fn answer(
        queues: &Mutex<HashMap<String, VecDeque<ConnectorResult<Page<String>>>>>,
        key: &str,
    ) -> ConnectorResult<Page<String>> {
        queues
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(ConnectorError::remote(500, None, format!("unscripted {key}"))))
    }
}

#[async_trait]
impl PageSource<String> for ScriptedSource {
    async fn first_page(
        &self,
        credential: &Credential,
        request: &PageRequest,
    ) -> ConnectorResult<Page<String>> {
        self.calls.lock().unwrap().push(Call {
            target: request.fields.label.clone(),
            token: credential.access_token().to_string(),
        });
        Self::answer(&self.first, &request.fields.label)
    }

    async fn next_page(
        &self,
        credential: &Credential,
        cursor: &str,
    ) -> ConnectorResult<Page<String>> {
        self.calls.lock().unwrap().push(Call {
            target: cursor.to_string(),
            token: credential.access_token().to_string(),
        });
        Self::answer(&self.next, cursor)
    }
}

/// Refresher returning a fixed token, or failing.
pub struct StaticRefresher {
    token: Option<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<RefreshRequest>>,
}

impl StaticRefresher {
    pub fn issuing(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            token: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RefreshRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialRefresher for StaticRefresher {
    async fn refresh(&self, request: &RefreshRequest) -> Option<SecretString> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.token.clone().map(SecretString::from)
    }
}
