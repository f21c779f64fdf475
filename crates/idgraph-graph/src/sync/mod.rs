//! Directory to Neo4j synchronization pipeline.
//!
//! One run: issue a tag, sync every node type, then every relationship type,
//! then sweep whatever completed. A type that fails is neither swept nor
//! used as an endpoint for relationship syncs in the same run.

pub mod cleanup;
pub mod upsert;

use std::collections::HashMap;
use std::future::Future;

use chrono::Utc;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use idgraph_core::source::fetch_all;
use idgraph_core::{
    normalize_batch, normalize_relationship, EntitySource, IdGraphError, IdGraphResult, NodeSync,
    RelationshipSync, RunSummary, RunTag, SchemaRegistry, SyncPlan, TypeKind, TypeStatus,
    TypeSummary,
};

use crate::store::GraphStore;
use cleanup::CleanupPlanner;
use upsert::UpsertEngine;

/// Run-level knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Fail the run when any type is failed or blocked.
    pub require_full_success: bool,
    /// Parent entities queried at once during a relationship sync.
    pub relationship_concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            require_full_success: false,
            relationship_concurrency: 8,
        }
    }
}

/// Outcome of one node sync, with the ids it stamped.
struct NodeOutcome {
    summary: TypeSummary,
    ids: Vec<String>,
}

pub struct SyncOrchestrator<'a, S: ?Sized, E: ?Sized> {
    store: &'a S,
    source: &'a E,
    registry: &'a SchemaRegistry,
    plan: &'a SyncPlan,
    options: SyncOptions,
}

impl<'a, S, E> SyncOrchestrator<'a, S, E>
where
    S: GraphStore + ?Sized,
    E: EntitySource + ?Sized,
{
    pub fn new(store: &'a S, source: &'a E, registry: &'a SchemaRegistry, plan: &'a SyncPlan) -> Self {
        Self {
            store,
            source,
            registry,
            plan,
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Run to completion.
    pub async fn run(&self) -> IdGraphResult<RunSummary> {
        self.run_until(std::future::pending()).await
    }

    /// Run until done or until `shutdown` resolves. A cancelled run writes
    /// nothing further and never sweeps.
    pub async fn run_until<F>(&self, shutdown: F) -> IdGraphResult<RunSummary>
    where
        F: Future<Output = ()>,
    {
        self.plan.validate(self.registry)?;

        let labels: Vec<&str> = self.plan.labels().collect();
        let floor = self.store.latest_run_tag(&labels).await?;
        let tag = RunTag::issue(floor);
        let mut summary = RunSummary::new(tag);

        info!(
            run_tag = %tag,
            node_types = self.plan.nodes.len(),
            relationship_types = self.plan.relationships.len(),
            "Starting sync run"
        );

        let types = tokio::select! {
            biased;
            _ = shutdown => {
                warn!(run_tag = %tag, "Sync run cancelled, skipping cleanup");
                return Err(IdGraphError::Cancelled { run_tag: tag.as_millis() });
            }
            types = self.sync_all(tag) => types,
        };
        summary.types = types;

        self.cleanup(&mut summary, tag).await;
        summary.finished_at = Some(Utc::now());

        let failed = summary.failed_types();
        info!(
            run_tag = %tag,
            created = summary.total_created(),
            nodes_deleted = summary.total_deleted_nodes(),
            relationships_deleted = summary.total_deleted_relationships(),
            failed_types = failed,
            "Sync run finished"
        );

        if failed > 0 && self.options.require_full_success {
            return Err(IdGraphError::Incomplete {
                failed,
                summary: Box::new(summary),
            });
        }
        Ok(summary)
    }

    /// Node syncs (concurrently), then relationship syncs.
    async fn sync_all(&self, tag: RunTag) -> Vec<TypeSummary> {
        let outcomes = join_all(self.plan.nodes.iter().map(|sync| self.sync_nodes(sync, tag))).await;

        let mut completed: HashMap<&str, Vec<String>> = HashMap::new();
        let mut types = Vec::with_capacity(outcomes.len() + self.plan.relationships.len());
        for (sync, outcome) in self.plan.nodes.iter().zip(outcomes) {
            if outcome.summary.status.is_completed() {
                completed.insert(sync.label.as_str(), outcome.ids);
            }
            types.push(outcome.summary);
        }

        for sync in &self.plan.relationships {
            types.push(self.sync_relationship(sync, &completed, tag).await);
        }
        types
    }

    async fn sync_nodes(&self, sync: &NodeSync, tag: RunTag) -> NodeOutcome {
        let mut summary = TypeSummary::new(TypeKind::Node, &sync.label);
        info!(label = %sync.label, entity_type = %sync.entity_type, "Syncing nodes");

        match self.try_sync_nodes(sync, tag, &mut summary).await {
            Ok(ids) => {
                info!(
                    label = %sync.label,
                    created = summary.created,
                    updated = summary.updated,
                    dropped = summary.dropped_records,
                    "Nodes synced"
                );
                NodeOutcome { summary, ids }
            }
            Err(e) => {
                error!(label = %sync.label, error = %e, "Node sync failed");
                summary.status = TypeStatus::Failed { reason: e.to_string() };
                NodeOutcome { summary, ids: Vec::new() }
            }
        }
    }

    async fn try_sync_nodes(
        &self,
        sync: &NodeSync,
        tag: RunTag,
        summary: &mut TypeSummary,
    ) -> IdGraphResult<Vec<String>> {
        let schema = self.registry.require_node(&sync.label)?;
        let raws = fetch_all(self.source, &sync.entity_type).await?;

        let (records, dropped) = normalize_batch(schema, &raws);
        summary.dropped_records = dropped;

        let mut ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        ids.sort();
        ids.dedup();

        let upserted = UpsertEngine::new(self.store).upsert_nodes(schema, records, tag).await?;
        summary.created = upserted.created;
        summary.updated = upserted.updated;
        Ok(ids)
    }

    async fn sync_relationship(
        &self,
        sync: &RelationshipSync,
        completed: &HashMap<&str, Vec<String>>,
        tag: RunTag,
    ) -> TypeSummary {
        let name = sync.name();
        let mut summary = TypeSummary::new(TypeKind::Relationship, &name);

        if let Some(label) = sync
            .endpoint_labels()
            .into_iter()
            .find(|label| !completed.contains_key(label))
        {
            warn!(relationship = %name, label, "Relationship sync blocked by failed node sync");
            summary.status = TypeStatus::Blocked {
                reason: format!("node sync for {label} did not complete"),
            };
            return summary;
        }

        let parents = completed
            .get(sync.parent_label())
            .map(Vec::as_slice)
            .unwrap_or_default();
        info!(relationship = %name, relation = %sync.relation, parents = parents.len(), "Syncing relationships");

        match self.try_sync_relationship(sync, parents, tag, &mut summary).await {
            Ok(()) if summary.status.is_completed() => {
                info!(
                    relationship = %name,
                    created = summary.created,
                    updated = summary.updated,
                    skipped_orphans = summary.skipped_orphan_edges,
                    dropped = summary.dropped_records,
                    "Relationships synced"
                );
            }
            Ok(()) => {
                warn!(relationship = %name, created = summary.created, "Relationship sync incomplete");
            }
            Err(e) => {
                error!(relationship = %name, error = %e, "Relationship sync failed");
                summary.status = TypeStatus::Failed { reason: e.to_string() };
            }
        }
        summary
    }

    /// Upserts whatever was fetched; a failed parent fetch marks the type
    /// failed so the partial membership set is never swept against.
    async fn try_sync_relationship(
        &self,
        sync: &RelationshipSync,
        parents: &[String],
        tag: RunTag,
        summary: &mut TypeSummary,
    ) -> IdGraphResult<()> {
        let (owner, schema) =
            self.registry
                .relationship(&sync.owner_label, &sync.rel_type, &sync.target_label)?;

        let source = self.source;
        let relation = sync.relation.as_str();
        let fetched: Vec<_> = stream::iter(parents)
            .map(|parent_id| async move {
                let targets = source.fetch_relationship_targets(parent_id, relation).await;
                (parent_id, targets)
            })
            .buffer_unordered(self.options.relationship_concurrency.max(1))
            .collect()
            .await;

        let mut records = Vec::new();
        let mut failures = 0usize;
        let mut first_failure = None;
        for (parent_id, targets) in fetched {
            let raws = match targets {
                Ok(raws) => raws,
                Err(e) => {
                    warn!(relation, parent_id = %parent_id, error = %e, "Relationship fetch failed");
                    failures += 1;
                    first_failure.get_or_insert_with(|| e.to_string());
                    continue;
                }
            };
            for raw in &raws {
                match normalize_relationship(&owner.label, schema, sync.parent, parent_id, raw) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        warn!(relation, parent_id = %parent_id, error = %e, "Dropping relationship record");
                        summary.dropped_records += 1;
                    }
                }
            }
        }

        let upserted = UpsertEngine::new(self.store)
            .upsert_relationships(owner, schema, records, tag)
            .await?;
        summary.created = upserted.created;
        summary.updated = upserted.updated;
        summary.skipped_orphan_edges = upserted.skipped_orphan_edges;

        if let Some(first) = first_failure {
            summary.status = TypeStatus::Failed {
                reason: format!("{failures} of {} parent fetches failed: {first}", parents.len()),
            };
        }
        Ok(())
    }

    /// Relationship types first, then labels; degraded types are left alone.
    async fn cleanup(&self, summary: &mut RunSummary, tag: RunTag) {
        let planner = CleanupPlanner::new(self.store);

        for sync in &self.plan.relationships {
            let name = sync.name();
            let Some(entry) = summary.get_mut(&name) else { continue };
            if !entry.status.is_completed() {
                info!(relationship = %name, status = entry.status.as_str(), "Skipping relationship cleanup");
                continue;
            }

            let swept = match self
                .registry
                .relationship(&sync.owner_label, &sync.rel_type, &sync.target_label)
            {
                Ok((_, schema)) => planner.sweep_relationship(&sync.owner_label, schema, tag).await,
                Err(e) => Err(e),
            };
            match swept {
                Ok(deleted) => {
                    entry.deleted_relationships = deleted;
                    entry.swept = true;
                }
                Err(e) => {
                    error!(relationship = %name, error = %e, "Relationship cleanup failed");
                    entry.status = TypeStatus::Failed { reason: e.to_string() };
                }
            }
        }

        for sync in &self.plan.nodes {
            let Some(entry) = summary.get_mut(&sync.label) else { continue };
            if !entry.status.is_completed() {
                info!(label = %sync.label, status = entry.status.as_str(), "Skipping node cleanup");
                continue;
            }

            match planner.sweep_nodes(&sync.label, tag).await {
                Ok(counts) => {
                    entry.deleted_nodes = counts.nodes_deleted;
                    entry.deleted_relationships = counts.relationships_deleted;
                    entry.swept = true;
                }
                Err(e) => {
                    error!(label = %sync.label, error = %e, "Node cleanup failed");
                    entry.status = TypeStatus::Failed { reason: e.to_string() };
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing;
