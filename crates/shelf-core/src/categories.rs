//! Category hierarchy assembly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{require_text, ValidationError};

/// Payload for creating a category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
    pub parent_id: Option<i64>,
    pub description: Option<String>,
}

impl NewCategory {
    /// # Errors
    ///
    /// Returns [`ValidationError`] when `name` is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)
    }
}

/// A flat category record as stored; `parent_id` is `None` for roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    pub id: i64,
    pub name: String,
    #[serde(rename = "parentId")]
    pub parent_id: Option<i64>,
    pub description: Option<String>,
    pub children: Vec<CategoryNode>,
}

/// Attach every record to its parent and return the roots, ordered by name
/// at every level.
///
/// A record whose parent is absent from `records` is promoted to a root so
/// that nothing is silently dropped. Parent cycles cannot be reached from a
/// root and are therefore omitted.
#[must_use]
pub fn build_tree(records: Vec<CategoryRecord>) -> Vec<CategoryNode> {
    let known: std::collections::HashSet<i64> = records.iter().map(|r| r.id).collect();
    let mut by_parent: HashMap<Option<i64>, Vec<CategoryRecord>> = HashMap::new();

    for record in records {
        let parent = record.parent_id.filter(|p| known.contains(p));
        by_parent.entry(parent).or_default().push(record);
    }

    attach(None, &mut by_parent)
}

fn attach(
    parent: Option<i64>,
    by_parent: &mut HashMap<Option<i64>, Vec<CategoryRecord>>,
) -> Vec<CategoryNode> {
    let mut level = by_parent.remove(&parent).unwrap_or_default();
    level.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

    level
        .into_iter()
        .map(|record| CategoryNode {
            children: attach(Some(record.id), by_parent),
            id: record.id,
            name: record.name,
            parent_id: record.parent_id,
            description: record.description,
        })
        .collect()
}
