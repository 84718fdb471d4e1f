//! Change detection between the stored link records and a fresh extraction.
//!
//! Duplicate labels in one extraction resolve to their last occurrence.
//! Labels missing from the extraction are carried forward, never pruned.

use relink_scanner::LinkRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Label to URL mapping, as persisted in the record store.
pub type LinkMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Updated,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Updated => "updated",
        }
    }
}

/// A single label whose URL differs from the stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub label: String,
    pub kind: ChangeKind,
    pub old_url: Option<String>,
    pub new_url: String,
}

/// Labels partitioned into newly seen and URL-updated. The sets are disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: BTreeSet<String>,
    pub updated: BTreeSet<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.added.contains(label) || self.updated.contains(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    /// Authoritative mapping after this pass.
    pub mapping: LinkMap,
    pub changes: ChangeSet,
    /// One entry per changed label, in order of first appearance on the page.
    pub details: Vec<Change>,
}

pub fn detect(previous: &LinkMap, extracted: &[LinkRecord]) -> Detection {
    let mut order: Vec<&str> = Vec::new();
    let mut latest: HashMap<&str, &str> = HashMap::new();

    for record in extracted {
        if let Some(earlier) = latest.insert(&record.label, &record.url) {
            debug!(
                "Duplicate label '{}': {} replaced by {}",
                record.label, earlier, record.url
            );
        } else {
            order.push(&record.label);
        }
    }

    let mut mapping = previous.clone();
    let mut changes = ChangeSet::default();
    let mut details = Vec::new();

    for label in order {
        let url = latest[label];
        let kind = match previous.get(label) {
            None => ChangeKind::Added,
            Some(known) if known != url => ChangeKind::Updated,
            Some(_) => continue,
        };

        debug!("Label '{}' {}: {}", label, kind.as_str(), url);
        match kind {
            ChangeKind::Added => changes.added.insert(label.to_string()),
            ChangeKind::Updated => changes.updated.insert(label.to_string()),
        };
        details.push(Change {
            label: label.to_string(),
            kind,
            old_url: previous.get(label).cloned(),
            new_url: url.to_string(),
        });
        mapping.insert(label.to_string(), url.to_string());
    }

    Detection {
        mapping,
        changes,
        details,
    }
}
