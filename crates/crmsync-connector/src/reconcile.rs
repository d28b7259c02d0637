//! Snapshot reconciliation between a remote collection and its persisted copy.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// A labeled remote entity and its local counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMapping {
    /// Remote identifier; the only identity key.
    pub external_id: String,
    pub name: String,
    /// Local identifier, once the local record exists.
    pub internal_id: Option<i64>,
}

impl TopicMapping {
    pub fn new(external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
            internal_id: None,
        }
    }

    #[must_use]
    pub fn with_internal_id(mut self, id: i64) -> Self {
        self.internal_id = Some(id);
        self
    }
}

/// Changes needed to bring the persisted snapshot in line with the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// In the source but not persisted.
    pub to_insert: Vec<TopicMapping>,
    /// In both; source name with the persisted internal id.
    pub to_update: Vec<TopicMapping>,
    /// Persisted but gone from the source or no longer selected.
    pub to_delete: Vec<TopicMapping>,
}

impl ReconcilePlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Compare `source` against `previous`, optionally restricted to `selection`.
///
/// An empty selection means everything is selected. Outputs follow the
/// order of the input they are drawn from: inserts and updates follow
/// `source`, deletes follow `previous`. Each external id is deleted at most
/// once.
#[must_use]
pub fn reconcile(
    source: &[TopicMapping],
    previous: &[TopicMapping],
    selection: &[String],
) -> ReconcilePlan {
    let source_ids: HashSet<&str> = source.iter().map(|m| m.external_id.as_str()).collect();
    let previous_by_id: HashMap<&str, &TopicMapping> = previous
        .iter()
        .map(|m| (m.external_id.as_str(), m))
        .collect();
    let selected: HashSet<&str> = selection.iter().map(String::as_str).collect();
    let is_selected = |id: &str| selected.is_empty() || selected.contains(id);

    let mut plan = ReconcilePlan::default();

    for mapping in source {
        let id = mapping.external_id.as_str();
        if !is_selected(id) {
            continue;
        }
        match previous_by_id.get(id) {
            Some(existing) => plan.to_update.push(TopicMapping {
                external_id: mapping.external_id.clone(),
                name: mapping.name.clone(),
                internal_id: existing.internal_id,
            }),
            None => plan.to_insert.push(mapping.clone()),
        }
    }

    let mut deleted: HashSet<&str> = HashSet::new();
    for mapping in previous {
        let id = mapping.external_id.as_str();
        let gone = !source_ids.contains(id);
        if (gone || !is_selected(id)) && deleted.insert(id) {
            plan.to_delete.push(mapping.clone());
        }
    }

    plan
}
