//! Neo4j-backed [`GraphStore`].

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use async_trait::async_trait;
use neo4rs::{BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType, Query};
use tracing::debug;

use idgraph_core::{NodeRecord, PropertyValue, RelationshipRecord, RelationshipSchema, RunTag};

use super::{cypher, GraphStore, NodeMerge, NodeSweep, RelationshipMerge};
use crate::GraphClient;

/// Writes through a [`GraphClient`] in `UNWIND` batches.
#[derive(Clone)]
pub struct Neo4jStore {
    client: GraphClient,
    batch_size: usize,
}

impl Neo4jStore {
    pub fn new(client: GraphClient, batch_size: usize) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
        }
    }
}

fn to_bolt(value: &PropertyValue) -> BoltType {
    match value {
        PropertyValue::Null => BoltType::Null(BoltNull),
        PropertyValue::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        PropertyValue::Int(i) => BoltType::Integer(BoltInteger::new(*i)),
        PropertyValue::Float(f) => BoltType::Float(BoltFloat::new(*f)),
        PropertyValue::String(s) => BoltType::String(BoltString::new(s)),
        PropertyValue::List(items) => BoltType::List(BoltList {
            value: items.iter().map(to_bolt).collect(),
        }),
    }
}

fn bolt_map<'a>(entries: impl IntoIterator<Item = (&'a str, BoltType)>) -> BoltType {
    BoltType::Map(BoltMap {
        value: entries
            .into_iter()
            .map(|(k, v)| (BoltString::new(k), v))
            .collect::<HashMap<_, _>>(),
    })
}

fn props_map<'a>(properties: impl IntoIterator<Item = (&'a String, &'a PropertyValue)>) -> BoltType {
    bolt_map(properties.into_iter().map(|(k, v)| (k.as_str(), to_bolt(v))))
}

fn node_rows(records: &[NodeRecord]) -> BoltType {
    BoltType::List(BoltList {
        value: records
            .iter()
            .map(|r| {
                bolt_map([
                    ("id", BoltType::String(BoltString::new(&r.id))),
                    ("props", props_map(&r.properties)),
                ])
            })
            .collect(),
    })
}

fn relationship_rows(records: &[RelationshipRecord]) -> BoltType {
    BoltType::List(BoltList {
        value: records
            .iter()
            .map(|r| {
                bolt_map([
                    ("source_id", BoltType::String(BoltString::new(&r.source_id))),
                    ("target_id", BoltType::String(BoltString::new(&r.target_id))),
                    ("props", props_map(&r.properties)),
                ])
            })
            .collect(),
    })
}

fn get_i64(row: &neo4rs::Row, field: &str) -> Result<i64> {
    row.get::<i64>(field)
        .map_err(|e| anyhow::anyhow!("Failed to get field '{}': {:?}", field, e))
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn merge_nodes(&self, label: &str, records: &[NodeRecord], tag: RunTag) -> Result<NodeMerge> {
        let cypher = cypher::merge_nodes(label);
        let mut outcome = NodeMerge::default();

        for chunk in records.chunks(self.batch_size) {
            let query = Query::new(cypher.clone())
                .param("rows", node_rows(chunk))
                .param("firstseen", tag.as_millis())
                .param("tag", tag.as_millis());

            let rows = self
                .client
                .query(query)
                .await
                .with_context(|| format!("Failed to merge {} batch", label))?;

            if let Some(row) = rows.first() {
                let total = get_i64(row, "total")? as usize;
                let created = get_i64(row, "created")? as usize;
                outcome.created += created;
                outcome.updated += total.saturating_sub(created);
            }
            debug!(label, batch = chunk.len(), "Merged node batch");
        }

        Ok(outcome)
    }

    async fn merge_relationships(
        &self,
        owner_label: &str,
        schema: &RelationshipSchema,
        records: &[RelationshipRecord],
        tag: RunTag,
    ) -> Result<RelationshipMerge> {
        let cypher = cypher::merge_relationships(owner_label, schema);
        let mut outcome = RelationshipMerge::default();

        for chunk in records.chunks(self.batch_size) {
            let query = Query::new(cypher.clone())
                .param("rows", relationship_rows(chunk))
                .param("firstseen", tag.as_millis())
                .param("tag", tag.as_millis());

            let rows = self
                .client
                .query(query)
                .await
                .with_context(|| format!("Failed to merge {} batch", schema.rel_type))?;

            let mut anchored = HashSet::new();
            for row in &rows {
                let source_id: String = row
                    .get("source_id")
                    .map_err(|e| anyhow::anyhow!("Failed to get field 'source_id': {:?}", e))?;
                let target_id: String = row
                    .get("target_id")
                    .map_err(|e| anyhow::anyhow!("Failed to get field 'target_id': {:?}", e))?;
                let created: bool = row
                    .get("created")
                    .map_err(|e| anyhow::anyhow!("Failed to get field 'created': {:?}", e))?;

                if anchored.insert((source_id, target_id)) {
                    if created {
                        outcome.created += 1;
                    } else {
                        outcome.updated += 1;
                    }
                }
            }

            outcome.orphans.extend(
                chunk
                    .iter()
                    .filter(|r| !anchored.contains(&(r.source_id.clone(), r.target_id.clone())))
                    .map(|r| (r.source_id.clone(), r.target_id.clone())),
            );
            debug!(rel_type = %schema.rel_type, batch = chunk.len(), "Merged relationship batch");
        }

        Ok(outcome)
    }

    async fn delete_stale_nodes(&self, label: &str, tag: RunTag) -> Result<NodeSweep> {
        let query = Query::new(cypher::delete_stale_nodes(label)).param("tag", tag.as_millis());
        let rows = self
            .client
            .query(query)
            .await
            .with_context(|| format!("Failed to sweep {}", label))?;

        match rows.first() {
            Some(row) => Ok(NodeSweep {
                nodes: get_i64(row, "nodes")? as usize,
                relationships: get_i64(row, "relationships")? as usize,
            }),
            None => Ok(NodeSweep::default()),
        }
    }

    async fn delete_stale_relationships(
        &self,
        owner_label: &str,
        schema: &RelationshipSchema,
        tag: RunTag,
    ) -> Result<usize> {
        let query = Query::new(cypher::delete_stale_relationships(owner_label, schema))
            .param("tag", tag.as_millis());
        let deleted: Option<i64> = self
            .client
            .query_scalar(query, "deleted")
            .await
            .with_context(|| format!("Failed to sweep {}", schema.rel_type))?;
        Ok(deleted.unwrap_or(0) as usize)
    }

    async fn latest_run_tag(&self, labels: &[&str]) -> Result<Option<RunTag>> {
        let mut latest: Option<i64> = None;
        for label in labels {
            let query = Query::new(cypher::latest_run_tag(label));
            let tag: Option<Option<i64>> = self.client.query_scalar(query, "tag").await?;
            if let Some(Some(tag)) = tag {
                latest = Some(latest.map_or(tag, |l| l.max(tag)));
            }
        }
        Ok(latest.map(RunTag::from_millis))
    }
}
