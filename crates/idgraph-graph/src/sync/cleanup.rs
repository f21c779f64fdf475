//! Cleanup Planner: mark-and-sweep of entities not re-stamped this run.
//!
//! Only call these once every sync touching the label/type has finished;
//! the orchestrator enforces that.

use tracing::info;

use idgraph_core::{IdGraphResult, NodeSchema, RelationshipSchema, RunTag};

use crate::store::GraphStore;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepCounts {
    pub nodes_deleted: usize,
    pub relationships_deleted: usize,
}

pub struct CleanupPlanner<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: GraphStore + ?Sized> CleanupPlanner<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Sweep a label and every relationship type it declares.
    pub async fn sweep(&self, schema: &NodeSchema, tag: RunTag) -> IdGraphResult<SweepCounts> {
        let mut counts = SweepCounts::default();
        for rel in &schema.relationships {
            counts.relationships_deleted += self.sweep_relationship(&schema.label, rel, tag).await?;
        }

        let nodes = self.sweep_nodes(&schema.label, tag).await?;
        counts.nodes_deleted += nodes.nodes_deleted;
        counts.relationships_deleted += nodes.relationships_deleted;
        Ok(counts)
    }

    /// Detach-delete stale `label` nodes. Incident edges go regardless of
    /// their own tag.
    pub async fn sweep_nodes(&self, label: &str, tag: RunTag) -> IdGraphResult<SweepCounts> {
        info!(label, run_tag = %tag, "Sweeping stale nodes");
        let swept = self.store.delete_stale_nodes(label, tag).await?;
        info!(
            label,
            nodes_deleted = swept.nodes,
            relationships_deleted = swept.relationships,
            "Node sweep complete"
        );
        Ok(SweepCounts {
            nodes_deleted: swept.nodes,
            relationships_deleted: swept.relationships,
        })
    }

    /// Delete stale edges of one relationship type.
    pub async fn sweep_relationship(
        &self,
        owner_label: &str,
        schema: &RelationshipSchema,
        tag: RunTag,
    ) -> IdGraphResult<usize> {
        info!(
            owner = owner_label,
            rel_type = %schema.rel_type,
            target = %schema.target_label,
            run_tag = %tag,
            "Sweeping stale relationships"
        );
        let deleted = self
            .store
            .delete_stale_relationships(owner_label, schema, tag)
            .await?;
        info!(
            owner = owner_label,
            rel_type = %schema.rel_type,
            target = %schema.target_label,
            relationships_deleted = deleted,
            "Relationship sweep complete"
        );
        Ok(deleted)
    }
}
