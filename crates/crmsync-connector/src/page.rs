//! Paginated sources and field-set plans.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::credential::Credential;
use crate::error::ConnectorResult;

/// One page of a cursor-based traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub records: Vec<T>,
    /// Continuation token; `None` on the last page.
    pub next_cursor: Option<String>,
    /// Total number of records, reported on the first page.
    pub total_size: Option<u64>,
}

impl<T> Page<T> {
    /// Returns true if this is the last page.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// A named list of fields to select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet {
    pub label: String,
    pub fields: Vec<String>,
}

impl FieldSet {
    pub fn new(label: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            label: label.into(),
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
        }
    }
}

/// A single first-page query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Remote object name.
    pub resource: String,
    pub fields: FieldSet,
    /// Only records modified at or after this instant; `None` is a full read.
    pub modified_since: Option<DateTime<Utc>>,
}

/// Primary field set followed by ordered fallbacks.
///
/// Some remote instances lack optional or custom fields. When the primary
/// query is rejected, each fallback is tried in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSetPlan {
    pub resource: String,
    pub modified_since: Option<DateTime<Utc>>,
    field_sets: Vec<FieldSet>,
}

impl FieldSetPlan {
    pub fn new(resource: impl Into<String>, primary: FieldSet) -> Self {
        Self {
            resource: resource.into(),
            modified_since: None,
            field_sets: vec![primary],
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: FieldSet) -> Self {
        self.field_sets.push(fallback);
        self
    }

    #[must_use]
    pub fn modified_since(mut self, since: Option<DateTime<Utc>>) -> Self {
        self.modified_since = since;
        self
    }

    /// Field sets in attempt order, primary first.
    #[must_use]
    pub fn field_sets(&self) -> &[FieldSet] {
        &self.field_sets
    }

    /// Request for the field set at `index`.
    pub(crate) fn request(&self, index: usize) -> Option<PageRequest> {
        self.field_sets.get(index).map(|fields| PageRequest {
            resource: self.resource.clone(),
            fields: fields.clone(),
            modified_since: self.modified_since,
        })
    }
}

/// Cursor-based remote collection.
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn first_page(
        &self,
        credential: &Credential,
        request: &PageRequest,
    ) -> ConnectorResult<Page<T>>;

    async fn next_page(&self, credential: &Credential, cursor: &str) -> ConnectorResult<Page<T>>;
}
