//! Graph storage seam.
//!
//! The upsert engine and cleanup planner only ever mutate the graph through
//! [`GraphStore`]. `Neo4jStore` is the real backend; `MemoryGraph` backs
//! tests and dry runs.

mod cypher;
mod memory;
mod neo4j;

pub use memory::{MemoryGraph, StoredEdge, StoredNode};
pub use neo4j::Neo4jStore;

use anyhow::Result;
use async_trait::async_trait;

use idgraph_core::{NodeRecord, RelationshipRecord, RelationshipSchema, RunTag};

/// Outcome of merging one batch of nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeMerge {
    pub created: usize,
    pub updated: usize,
}

/// Outcome of merging one batch of relationships.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipMerge {
    pub created: usize,
    pub updated: usize,
    /// `(source_id, target_id)` of edges with a missing endpoint.
    pub orphans: Vec<(String, String)>,
}

/// Outcome of sweeping one label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeSweep {
    pub nodes: usize,
    pub relationships: usize,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create-or-match each record on `(label, id)`. New nodes get
    /// `firstseen`; every node gets its properties and `lastupdated = tag`.
    /// Records must have distinct ids.
    async fn merge_nodes(&self, label: &str, records: &[NodeRecord], tag: RunTag) -> Result<NodeMerge>;

    /// Create-or-match each edge whose endpoints both exist. Never creates
    /// nodes; edges with a missing endpoint come back as orphans.
    async fn merge_relationships(
        &self,
        owner_label: &str,
        schema: &RelationshipSchema,
        records: &[RelationshipRecord],
        tag: RunTag,
    ) -> Result<RelationshipMerge>;

    /// Detach-delete every `label` node not stamped with `tag`.
    async fn delete_stale_nodes(&self, label: &str, tag: RunTag) -> Result<NodeSweep>;

    /// Delete every edge of this schema not stamped with `tag`.
    async fn delete_stale_relationships(
        &self,
        owner_label: &str,
        schema: &RelationshipSchema,
        tag: RunTag,
    ) -> Result<usize>;

    /// Highest `lastupdated` across `labels`, if any node carries one.
    async fn latest_run_tag(&self, labels: &[&str]) -> Result<Option<RunTag>>;
}
