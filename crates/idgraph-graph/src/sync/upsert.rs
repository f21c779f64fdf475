//! Upsert Engine: idempotent create-or-update stamped with the run tag.

use std::collections::HashMap;

use tracing::{debug, warn};

use idgraph_core::{IdGraphResult, NodeRecord, NodeSchema, RelationshipRecord, RelationshipSchema, RunTag};

use crate::store::GraphStore;

/// Counts from one `upsert_nodes` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeUpsert {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
}

/// Counts from one `upsert_relationships` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationshipUpsert {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped_orphan_edges: usize,
}

pub struct UpsertEngine<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: GraphStore + ?Sized> UpsertEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Merge every record on `(label, id)` and stamp it with `tag`.
    pub async fn upsert_nodes(
        &self,
        schema: &NodeSchema,
        records: Vec<NodeRecord>,
        tag: RunTag,
    ) -> IdGraphResult<NodeUpsert> {
        let records = dedup_by(records, |r| r.id.clone());
        if records.is_empty() {
            return Ok(NodeUpsert::default());
        }

        let merged = self.store.merge_nodes(&schema.label, &records, tag).await?;
        Ok(NodeUpsert {
            processed: records.len(),
            created: merged.created,
            updated: merged.updated,
        })
    }

    /// Merge every edge whose endpoints exist; count the rest as orphans.
    pub async fn upsert_relationships(
        &self,
        owner: &NodeSchema,
        schema: &RelationshipSchema,
        records: Vec<RelationshipRecord>,
        tag: RunTag,
    ) -> IdGraphResult<RelationshipUpsert> {
        let records = dedup_by(records, |r| (r.source_id.clone(), r.target_id.clone()));
        if records.is_empty() {
            return Ok(RelationshipUpsert::default());
        }

        let merged = self
            .store
            .merge_relationships(&owner.label, schema, &records, tag)
            .await?;

        for (source_id, target_id) in &merged.orphans {
            debug!(
                owner = %owner.label,
                rel_type = %schema.rel_type,
                target = %schema.target_label,
                source_id,
                target_id,
                "Skipped orphan edge"
            );
        }
        if !merged.orphans.is_empty() {
            warn!(
                owner = %owner.label,
                rel_type = %schema.rel_type,
                target = %schema.target_label,
                skipped = merged.orphans.len(),
                "Skipped edges with a missing endpoint"
            );
        }

        Ok(RelationshipUpsert {
            processed: records.len(),
            created: merged.created,
            updated: merged.updated,
            skipped_orphan_edges: merged.orphans.len(),
        })
    }
}

/// Keep the last record per key, in first-seen order.
fn dedup_by<T, K, F>(records: Vec<T>, key: F) -> Vec<T>
where
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::with_capacity(records.len());
    let mut out: Vec<T> = Vec::with_capacity(records.len());

    for record in records {
        match index.get(&key(&record)) {
            Some(&i) => out[i] = record,
            None => {
                index.insert(key(&record), out.len());
                out.push(record);
            }
        }
    }
    out
}
