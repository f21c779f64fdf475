//! Declarative node and relationship schemas.
//!
//! A schema is pure data: which graph properties a label carries, which
//! source field feeds each property, and which relationships hang off the
//! label. Schemas are immutable once registered and shared by every run.
//!
//! ```text
//! (:Msft365User {id, displayName, ...})-[:MEMBER_OF {firstseen, lastupdated}]->(:Msft365Group)
//! ```

mod registry;

pub use registry::SchemaRegistry;

use serde::Serialize;

use crate::{IdGraphError, IdGraphResult};

/// Property every node schema must declare; the natural key within a label.
pub const ID_PROPERTY: &str = "id";

/// Stamped on first creation, never overwritten.
pub const FIRSTSEEN_PROPERTY: &str = "firstseen";

/// Stamped with the run tag on every create or re-confirm.
pub const LASTUPDATED_PROPERTY: &str = "lastupdated";

/// Maps one graph property to one source field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyRef {
    pub name: String,
    pub source_field: String,
    pub optional: bool,
}

impl PropertyRef {
    /// Required property whose source field has the same name.
    pub fn required(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            source_field: name.clone(),
            name,
            optional: false,
        }
    }

    /// Optional property whose source field has the same name.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            optional: true,
            ..Self::required(name)
        }
    }

    /// Read the value from a differently named source field.
    pub fn from_field(mut self, source_field: impl Into<String>) -> Self {
        self.source_field = source_field.into();
        self
    }
}

/// Orientation of a relationship relative to the label that declares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// `(owner)-[TYPE]->(target)`
    Outgoing,
    /// `(owner)<-[TYPE]-(target)`
    Incoming,
}

/// A relationship type declared by a node schema.
///
/// `firstseen` and `lastupdated` are implicit and not listed in `properties`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipSchema {
    pub target_label: String,
    pub rel_type: String,
    pub direction: Direction,
    pub properties: Vec<PropertyRef>,
}

impl RelationshipSchema {
    pub fn new(rel_type: impl Into<String>, target_label: impl Into<String>, direction: Direction) -> Self {
        Self {
            target_label: target_label.into(),
            rel_type: rel_type.into(),
            direction,
            properties: Vec::new(),
        }
    }

    pub fn outgoing(rel_type: impl Into<String>, target_label: impl Into<String>) -> Self {
        Self::new(rel_type, target_label, Direction::Outgoing)
    }

    pub fn incoming(rel_type: impl Into<String>, target_label: impl Into<String>) -> Self {
        Self::new(rel_type, target_label, Direction::Incoming)
    }

    pub fn with_property(mut self, property: PropertyRef) -> Self {
        self.properties.push(property);
        self
    }

    /// True when this schema is the `(rel_type, target_label)` pair.
    pub fn is(&self, rel_type: &str, target_label: &str) -> bool {
        self.rel_type == rel_type && self.target_label == target_label
    }

    pub(crate) fn validate(&self) -> IdGraphResult<()> {
        validate_identifier(&self.rel_type)?;
        validate_identifier(&self.target_label)?;
        for prop in &self.properties {
            validate_property_name(&prop.name)?;
        }
        Ok(())
    }
}

/// Declarative description of one node label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSchema {
    pub label: String,
    pub properties: Vec<PropertyRef>,
    pub relationships: Vec<RelationshipSchema>,
}

impl NodeSchema {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            properties: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn with_property(mut self, property: PropertyRef) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_relationship(mut self, relationship: RelationshipSchema) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// The `id` property mapping.
    pub fn id_property(&self) -> Option<&PropertyRef> {
        self.properties.iter().find(|p| p.name == ID_PROPERTY)
    }

    /// Look up a declared relationship by type and target label.
    pub fn relationship(&self, rel_type: &str, target_label: &str) -> Option<&RelationshipSchema> {
        self.relationships.iter().find(|r| r.is(rel_type, target_label))
    }

    pub(crate) fn validate(&self) -> IdGraphResult<()> {
        validate_identifier(&self.label)?;

        match self.id_property() {
            Some(id) if !id.optional => {}
            _ => return Err(IdGraphError::MissingIdProperty(self.label.clone())),
        }

        for prop in &self.properties {
            validate_property_name(&prop.name)?;
        }
        for rel in &self.relationships {
            rel.validate()?;
        }
        Ok(())
    }
}

/// Labels, relationship types and property names end up inside Cypher text.
pub fn validate_identifier(name: &str) -> IdGraphResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(IdGraphError::InvalidIdentifier(name.to_string()))
    }
}

fn validate_property_name(name: &str) -> IdGraphResult<()> {
    if name == FIRSTSEEN_PROPERTY || name == LASTUPDATED_PROPERTY {
        return Err(IdGraphError::InvalidIdentifier(format!(
            "{name} (reserved for sync bookkeeping)"
        )));
    }
    validate_identifier(name)
}
