//! Registry of node schemas, keyed by label.

use std::collections::HashMap;

use super::{NodeSchema, RelationshipSchema};
use crate::{IdGraphError, IdGraphResult};

/// Every schema a sync may touch. Built once at startup, read-only after.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: Vec<NodeSchema>,
    by_label: HashMap<String, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node schema. Labels are globally unique.
    pub fn register_node_schema(&mut self, schema: NodeSchema) -> IdGraphResult<()> {
        schema.validate()?;

        if self.by_label.contains_key(&schema.label) {
            return Err(IdGraphError::DuplicateLabel(schema.label));
        }

        self.by_label.insert(schema.label.clone(), self.schemas.len());
        self.schemas.push(schema);
        Ok(())
    }

    /// Attach a relationship schema to an already registered label.
    pub fn register_relationship_schema(
        &mut self,
        parent_label: &str,
        schema: RelationshipSchema,
    ) -> IdGraphResult<()> {
        schema.validate()?;

        let idx = *self
            .by_label
            .get(parent_label)
            .ok_or_else(|| IdGraphError::UnknownLabel(parent_label.to_string()))?;

        let parent = &mut self.schemas[idx];
        if parent.relationship(&schema.rel_type, &schema.target_label).is_some() {
            return Err(IdGraphError::InvalidPlan(format!(
                "relationship ({})-[:{}]-({}) registered twice",
                parent_label, schema.rel_type, schema.target_label
            )));
        }

        parent.relationships.push(schema);
        Ok(())
    }

    /// Check that every relationship points at a registered label.
    pub fn validate(&self) -> IdGraphResult<()> {
        for schema in &self.schemas {
            for rel in &schema.relationships {
                if !self.by_label.contains_key(&rel.target_label) {
                    return Err(IdGraphError::UnknownLabel(rel.target_label.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn node(&self, label: &str) -> Option<&NodeSchema> {
        self.by_label.get(label).map(|&idx| &self.schemas[idx])
    }

    /// Resolve a node schema or fail with `UnknownLabel`.
    pub fn require_node(&self, label: &str) -> IdGraphResult<&NodeSchema> {
        self.node(label)
            .ok_or_else(|| IdGraphError::UnknownLabel(label.to_string()))
    }

    /// Resolve a relationship schema declared by `owner_label`.
    pub fn relationship(
        &self,
        owner_label: &str,
        rel_type: &str,
        target_label: &str,
    ) -> IdGraphResult<(&NodeSchema, &RelationshipSchema)> {
        let owner = self.require_node(owner_label)?;
        let rel = owner.relationship(rel_type, target_label).ok_or_else(|| {
            IdGraphError::UnknownRelationship {
                owner: owner_label.to_string(),
                rel_type: rel_type.to_string(),
                target: target_label.to_string(),
            }
        })?;
        Ok((owner, rel))
    }

    /// Labels in registration order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().map(|s| s.label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeSchema> {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PropertyRef;

    fn user() -> NodeSchema {
        NodeSchema::new("User").with_property(PropertyRef::required("id"))
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register_node_schema(user()).unwrap();

        let err = registry.register_node_schema(user()).unwrap_err();
        assert!(matches!(err, IdGraphError::DuplicateLabel(label) if label == "User"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_relationship_on_unknown_parent() {
        let mut registry = SchemaRegistry::new();
        let err = registry
            .register_relationship_schema("Nobody", RelationshipSchema::outgoing("MEMBER_OF", "Group"))
            .unwrap_err();
        assert!(matches!(err, IdGraphError::UnknownLabel(_)));
    }

    #[test]
    fn test_validate_catches_dangling_target() {
        let mut registry = SchemaRegistry::new();
        registry.register_node_schema(user()).unwrap();
        registry
            .register_relationship_schema("User", RelationshipSchema::outgoing("MEMBER_OF", "Group"))
            .unwrap();
        assert!(matches!(registry.validate(), Err(IdGraphError::UnknownLabel(l)) if l == "Group"));

        registry
            .register_node_schema(NodeSchema::new("Group").with_property(PropertyRef::required("id")))
            .unwrap();
        assert!(registry.validate().is_ok());

        let (owner, rel) = registry.relationship("User", "MEMBER_OF", "Group").unwrap();
        assert_eq!(owner.label, "User");
        assert_eq!(rel.rel_type, "MEMBER_OF");
    }

    #[test]
    fn test_labels_keep_registration_order() {
        let mut registry = SchemaRegistry::new();
        for label in ["B", "A", "C"] {
            registry
                .register_node_schema(NodeSchema::new(label).with_property(PropertyRef::required("id")))
                .unwrap();
        }
        assert_eq!(registry.labels().collect::<Vec<_>>(), vec!["B", "A", "C"]);
    }
}
