//! Per-run result summary.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::RunTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Node,
    Relationship,
}

/// How one label or relationship type fared in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TypeStatus {
    Completed,
    /// Its own fetch, write or sweep failed.
    Failed { reason: String },
    /// Not attempted because something it depends on failed.
    Blocked { reason: String },
}

impl TypeStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, TypeStatus::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeStatus::Completed => "completed",
            TypeStatus::Failed { .. } => "failed",
            TypeStatus::Blocked { .. } => "blocked",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeSummary {
    pub kind: TypeKind,
    pub name: String,
    pub status: TypeStatus,
    pub created: usize,
    pub updated: usize,
    pub deleted_nodes: usize,
    pub deleted_relationships: usize,
    pub skipped_orphan_edges: usize,
    /// Records the normalizer rejected.
    pub dropped_records: usize,
    /// Whether cleanup ran for this type.
    pub swept: bool,
}

impl TypeSummary {
    pub fn new(kind: TypeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            status: TypeStatus::Completed,
            created: 0,
            updated: 0,
            deleted_nodes: 0,
            deleted_relationships: 0,
            skipped_orphan_edges: 0,
            dropped_records: 0,
            swept: false,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.status.is_completed()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_tag: RunTag,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub types: Vec<TypeSummary>,
}

impl RunSummary {
    pub fn new(run_tag: RunTag) -> Self {
        Self {
            run_tag,
            started_at: Utc::now(),
            finished_at: None,
            types: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypeSummary> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TypeSummary> {
        self.types.iter_mut().find(|t| t.name == name)
    }

    /// Types that failed or were blocked.
    pub fn failed_types(&self) -> usize {
        self.types.iter().filter(|t| t.is_degraded()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.failed_types() == 0
    }

    pub fn total_created(&self) -> usize {
        self.types.iter().map(|t| t.created).sum()
    }

    pub fn total_deleted_nodes(&self) -> usize {
        self.types.iter().map(|t| t.deleted_nodes).sum()
    }

    pub fn total_deleted_relationships(&self) -> usize {
        self.types.iter().map(|t| t.deleted_relationships).sum()
    }
}
