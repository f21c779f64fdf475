//! What one run syncs and where each piece comes from.

use std::collections::HashSet;

use serde::Serialize;

use crate::{IdGraphError, IdGraphResult, SchemaRegistry};

/// Sync every entity of one label from one collaborator entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSync {
    pub label: String,
    pub entity_type: String,
}

impl NodeSync {
    pub fn new(label: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entity_type: entity_type.into(),
        }
    }
}

/// Which endpoint's nodes are enumerated when discovering a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParentEndpoint {
    /// Ask the source, per owner node, for its targets (device -> owners).
    Owner,
    /// Ask the source, per target node, for its owners (group -> members).
    Target,
}

/// Sync one relationship type by asking the source about each parent entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipSync {
    pub owner_label: String,
    pub rel_type: String,
    pub target_label: String,
    pub parent: ParentEndpoint,
    /// Collaborator-facing relation name, e.g. `group_members`.
    pub relation: String,
}

impl RelationshipSync {
    pub fn new(
        owner_label: impl Into<String>,
        rel_type: impl Into<String>,
        target_label: impl Into<String>,
        parent: ParentEndpoint,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            owner_label: owner_label.into(),
            rel_type: rel_type.into(),
            target_label: target_label.into(),
            parent,
            relation: relation.into(),
        }
    }

    /// Label whose node ids are enumerated as parents.
    pub fn parent_label(&self) -> &str {
        match self.parent {
            ParentEndpoint::Owner => &self.owner_label,
            ParentEndpoint::Target => &self.target_label,
        }
    }

    /// Both endpoint labels; node sync of each must complete first.
    pub fn endpoint_labels(&self) -> [&str; 2] {
        [&self.owner_label, &self.target_label]
    }

    /// Display name used in logs and summaries.
    pub fn name(&self) -> String {
        format!("({})-[:{}]-({})", self.owner_label, self.rel_type, self.target_label)
    }
}

/// The full set of node and relationship syncs for a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncPlan {
    pub nodes: Vec<NodeSync>,
    pub relationships: Vec<RelationshipSync>,
}

impl SyncPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, sync: NodeSync) -> Self {
        self.nodes.push(sync);
        self
    }

    pub fn relationship(mut self, sync: RelationshipSync) -> Self {
        self.relationships.push(sync);
        self
    }

    /// Every referenced schema must be registered and each label synced once.
    pub fn validate(&self, registry: &SchemaRegistry) -> IdGraphResult<()> {
        let mut labels = HashSet::new();
        for sync in &self.nodes {
            registry.require_node(&sync.label)?;
            if !labels.insert(sync.label.as_str()) {
                return Err(IdGraphError::InvalidPlan(format!(
                    "label '{}' synced more than once",
                    sync.label
                )));
            }
        }

        let mut rels = HashSet::new();
        for sync in &self.relationships {
            registry.relationship(&sync.owner_label, &sync.rel_type, &sync.target_label)?;
            for label in sync.endpoint_labels() {
                if !labels.contains(label) {
                    return Err(IdGraphError::InvalidPlan(format!(
                        "{} depends on '{}' which this plan does not sync",
                        sync.name(),
                        label
                    )));
                }
            }
            if !rels.insert((&sync.owner_label, &sync.rel_type, &sync.target_label)) {
                return Err(IdGraphError::InvalidPlan(format!(
                    "{} synced more than once",
                    sync.name()
                )));
            }
        }
        Ok(())
    }

    /// Labels this plan manages, in plan order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{NodeSchema, PropertyRef, RelationshipSchema};

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .register_node_schema(
                NodeSchema::new("User")
                    .with_property(PropertyRef::required("id"))
                    .with_relationship(RelationshipSchema::outgoing("MEMBER_OF", "Group")),
            )
            .unwrap();
        registry
            .register_node_schema(NodeSchema::new("Group").with_property(PropertyRef::required("id")))
            .unwrap();
        registry
    }

    fn member_of() -> RelationshipSync {
        RelationshipSync::new("User", "MEMBER_OF", "Group", ParentEndpoint::Target, "group_members")
    }

    #[test]
    fn test_valid_plan() {
        let plan = SyncPlan::new()
            .node(NodeSync::new("User", "users"))
            .node(NodeSync::new("Group", "groups"))
            .relationship(member_of());
        assert!(plan.validate(&registry()).is_ok());
        assert_eq!(plan.relationships[0].parent_label(), "Group");
        assert_eq!(plan.relationships[0].name(), "(User)-[:MEMBER_OF]-(Group)");
    }

    #[test]
    fn test_label_synced_twice() {
        let plan = SyncPlan::new()
            .node(NodeSync::new("User", "users"))
            .node(NodeSync::new("User", "more_users"));
        assert!(matches!(plan.validate(&registry()), Err(IdGraphError::InvalidPlan(_))));
    }

    #[test]
    fn test_relationship_needs_both_endpoints_synced() {
        let plan = SyncPlan::new().node(NodeSync::new("User", "users")).relationship(member_of());
        assert!(matches!(plan.validate(&registry()), Err(IdGraphError::InvalidPlan(_))));
    }

    #[test]
    fn test_unknown_relationship() {
        let plan = SyncPlan::new()
            .node(NodeSync::new("User", "users"))
            .node(NodeSync::new("Group", "groups"))
            .relationship(RelationshipSync::new("Group", "OWNS", "User", ParentEndpoint::Owner, "owners"));
        assert!(matches!(
            plan.validate(&registry()),
            Err(IdGraphError::UnknownRelationship { .. })
        ));
    }
}
