//! In-memory [`GraphStore`] with the same merge and sweep semantics as Neo4j.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use idgraph_core::{Direction, NodeRecord, PropertyValue, RelationshipRecord, RelationshipSchema, RunTag};

use super::{GraphStore, NodeMerge, NodeSweep, RelationshipMerge};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredNode {
    pub properties: BTreeMap<String, PropertyValue>,
    pub firstseen: i64,
    pub lastupdated: RunTag,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredEdge {
    pub properties: BTreeMap<String, PropertyValue>,
    pub firstseen: i64,
    pub lastupdated: RunTag,
}

/// `(label, id)`
type NodeKey = (String, String);

/// `(from, rel_type, to)` in stored arrow orientation.
type EdgeKey = (NodeKey, String, NodeKey);

#[derive(Debug, Default)]
struct State {
    nodes: HashMap<NodeKey, StoredNode>,
    edges: HashMap<EdgeKey, StoredEdge>,
    failing_labels: HashSet<String>,
}

fn apply(properties: &mut BTreeMap<String, PropertyValue>, incoming: &BTreeMap<String, PropertyValue>) {
    for (name, value) in incoming {
        if value.is_null() {
            properties.remove(name);
        } else {
            properties.insert(name.clone(), value.clone());
        }
    }
}

fn edge_key(owner_label: &str, schema: &RelationshipSchema, record: &RelationshipRecord) -> EdgeKey {
    let owner = (owner_label.to_string(), record.source_id.clone());
    let target = (schema.target_label.clone(), record.target_id.clone());
    match schema.direction {
        Direction::Outgoing => (owner, schema.rel_type.clone(), target),
        Direction::Incoming => (target, schema.rel_type.clone(), owner),
    }
}

fn matches_schema(key: &EdgeKey, owner_label: &str, schema: &RelationshipSchema) -> bool {
    let (from, rel_type, to) = key;
    let (from_label, to_label) = match schema.direction {
        Direction::Outgoing => (owner_label, schema.target_label.as_str()),
        Direction::Incoming => (schema.target_label.as_str(), owner_label),
    };
    *rel_type == schema.rel_type && from.0 == from_label && to.0 == to_label
}

/// A process-local graph.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: Mutex<State>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later write to `label` fail.
    pub async fn fail_writes_to(&self, label: &str) {
        self.state.lock().await.failing_labels.insert(label.to_string());
    }

    pub async fn node(&self, label: &str, id: &str) -> Option<StoredNode> {
        let state = self.state.lock().await;
        state.nodes.get(&(label.to_string(), id.to_string())).cloned()
    }

    /// Sorted ids of every `label` node.
    pub async fn node_ids(&self, label: &str) -> Vec<String> {
        let state = self.state.lock().await;
        let mut ids: Vec<String> = state
            .nodes
            .keys()
            .filter(|(l, _)| l == label)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// The edge `(from)-[rel_type]->(to)`, given as `(label, id)` pairs.
    pub async fn edge(&self, from: (&str, &str), rel_type: &str, to: (&str, &str)) -> Option<StoredEdge> {
        let state = self.state.lock().await;
        let key = (
            (from.0.to_string(), from.1.to_string()),
            rel_type.to_string(),
            (to.0.to_string(), to.1.to_string()),
        );
        state.edges.get(&key).cloned()
    }

    /// Sorted `(from_id, to_id)` pairs of every `rel_type` edge.
    pub async fn edges_of(&self, rel_type: &str) -> Vec<(String, String)> {
        let state = self.state.lock().await;
        let mut pairs: Vec<(String, String)> = state
            .edges
            .keys()
            .filter(|(_, t, _)| t == rel_type)
            .map(|(from, _, to)| (from.1.clone(), to.1.clone()))
            .collect();
        pairs.sort();
        pairs
    }

    pub async fn node_count(&self) -> usize {
        self.state.lock().await.nodes.len()
    }

    pub async fn edge_count(&self) -> usize {
        self.state.lock().await.edges.len()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn merge_nodes(&self, label: &str, records: &[NodeRecord], tag: RunTag) -> Result<NodeMerge> {
        let mut state = self.state.lock().await;
        if state.failing_labels.contains(label) {
            anyhow::bail!("write to {label} rejected");
        }

        let mut outcome = NodeMerge::default();
        for record in records {
            let key = (label.to_string(), record.id.clone());
            let node = state.nodes.entry(key).or_insert_with(|| {
                outcome.created += 1;
                StoredNode {
                    properties: BTreeMap::new(),
                    firstseen: tag.as_millis(),
                    lastupdated: tag,
                }
            });
            apply(&mut node.properties, &record.properties);
            node.lastupdated = tag;
        }
        outcome.updated = records.len() - outcome.created;
        Ok(outcome)
    }

    async fn merge_relationships(
        &self,
        owner_label: &str,
        schema: &RelationshipSchema,
        records: &[RelationshipRecord],
        tag: RunTag,
    ) -> Result<RelationshipMerge> {
        let mut state = self.state.lock().await;
        if state.failing_labels.contains(&schema.rel_type) {
            anyhow::bail!("write to {} rejected", schema.rel_type);
        }

        let mut outcome = RelationshipMerge::default();
        for record in records {
            let owner = (owner_label.to_string(), record.source_id.clone());
            let target = (schema.target_label.clone(), record.target_id.clone());
            if !state.nodes.contains_key(&owner) || !state.nodes.contains_key(&target) {
                outcome.orphans.push((record.source_id.clone(), record.target_id.clone()));
                continue;
            }

            let edge = state
                .edges
                .entry(edge_key(owner_label, schema, record))
                .or_insert_with(|| {
                    outcome.created += 1;
                    StoredEdge {
                        properties: BTreeMap::new(),
                        firstseen: tag.as_millis(),
                        lastupdated: tag,
                    }
                });
            apply(&mut edge.properties, &record.properties);
            edge.lastupdated = tag;
        }
        outcome.updated = records.len() - outcome.orphans.len() - outcome.created;
        Ok(outcome)
    }

    async fn delete_stale_nodes(&self, label: &str, tag: RunTag) -> Result<NodeSweep> {
        let mut state = self.state.lock().await;

        let stale: HashSet<NodeKey> = state
            .nodes
            .iter()
            .filter(|((l, _), node)| l == label && node.lastupdated != tag)
            .map(|(key, _)| key.clone())
            .collect();

        let edges_before = state.edges.len();
        state
            .edges
            .retain(|(from, _, to), _| !stale.contains(from) && !stale.contains(to));
        let relationships = edges_before - state.edges.len();

        state.nodes.retain(|key, _| !stale.contains(key));

        Ok(NodeSweep {
            nodes: stale.len(),
            relationships,
        })
    }

    async fn delete_stale_relationships(
        &self,
        owner_label: &str,
        schema: &RelationshipSchema,
        tag: RunTag,
    ) -> Result<usize> {
        let mut state = self.state.lock().await;
        let before = state.edges.len();
        state
            .edges
            .retain(|key, edge| !(matches_schema(key, owner_label, schema) && edge.lastupdated != tag));
        Ok(before - state.edges.len())
    }

    async fn latest_run_tag(&self, labels: &[&str]) -> Result<Option<RunTag>> {
        let state = self.state.lock().await;
        Ok(state
            .nodes
            .iter()
            .filter(|((label, _), _)| labels.contains(&label.as_str()))
            .map(|(_, node)| node.lastupdated)
            .max())
    }
}
