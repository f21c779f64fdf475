//! Record Normalizer: raw source entities to flat, schema-shaped records.
//!
//! Pure functions. Unknown source fields are dropped, absent optional fields
//! become `Null`, absent required fields fail the record.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use crate::plan::ParentEndpoint;
use crate::record::{NodeRecord, PropertyValue, RawEntity, RelationshipRecord};
use crate::schema::{NodeSchema, PropertyRef, RelationshipSchema, ID_PROPERTY};
use crate::{IdGraphError, IdGraphResult};

/// Convert one raw entity into a node record.
pub fn normalize(schema: &NodeSchema, raw: &RawEntity) -> IdGraphResult<NodeRecord> {
    let mut id = None;
    let mut properties = BTreeMap::new();

    for prop in &schema.properties {
        let value = read_field(&schema.label, prop, raw)?;
        if prop.name == ID_PROPERTY {
            id = Some(natural_key(&schema.label, value)?);
        } else {
            properties.insert(prop.name.clone(), value);
        }
    }

    let id = id.ok_or_else(|| IdGraphError::MissingIdProperty(schema.label.clone()))?;
    Ok(NodeRecord { id, properties })
}

/// Normalize a batch, dropping (and logging) records that fail.
///
/// Returns the surviving records and the number dropped.
pub fn normalize_batch(schema: &NodeSchema, raws: &[RawEntity]) -> (Vec<NodeRecord>, usize) {
    let mut records = Vec::with_capacity(raws.len());
    let mut dropped = 0;

    for raw in raws {
        match normalize(schema, raw) {
            Ok(record) => records.push(record),
            Err(e) => {
                dropped += 1;
                warn!(label = %schema.label, error = %e, "Dropping record");
            }
        }
    }

    (records, dropped)
}

/// Build an edge record from one entity discovered under a parent.
///
/// `parent` says which endpoint `parent_id` names; the discovered entity is
/// the other endpoint and must carry an `id`. Relationship properties are
/// read from the discovered entity.
pub fn normalize_relationship(
    owner_label: &str,
    schema: &RelationshipSchema,
    parent: ParentEndpoint,
    parent_id: &str,
    discovered: &RawEntity,
) -> IdGraphResult<RelationshipRecord> {
    let discovered_label = match parent {
        ParentEndpoint::Owner => schema.target_label.as_str(),
        ParentEndpoint::Target => owner_label,
    };
    let id_ref = PropertyRef::required(ID_PROPERTY);
    let discovered_id = natural_key(
        discovered_label,
        read_field(discovered_label, &id_ref, discovered)?,
    )?;

    let (source_id, target_id) = match parent {
        ParentEndpoint::Owner => (parent_id.to_string(), discovered_id),
        ParentEndpoint::Target => (discovered_id, parent_id.to_string()),
    };

    let mut properties = BTreeMap::new();
    for prop in &schema.properties {
        let value = read_field(&schema.rel_type, prop, discovered)?;
        properties.insert(prop.name.clone(), value);
    }

    Ok(RelationshipRecord {
        source_id,
        target_id,
        properties,
    })
}

fn read_field(label: &str, prop: &PropertyRef, raw: &RawEntity) -> IdGraphResult<PropertyValue> {
    match raw.get(&prop.source_field) {
        None | Some(Value::Null) if prop.optional => Ok(PropertyValue::Null),
        None | Some(Value::Null) => Err(IdGraphError::missing_field(label, &prop.name)),
        Some(value) => Ok(to_property_value(value)),
    }
}

fn natural_key(label: &str, value: PropertyValue) -> IdGraphResult<String> {
    match value {
        PropertyValue::String(s) if !s.is_empty() => Ok(s),
        PropertyValue::Int(i) => Ok(i.to_string()),
        _ => Err(IdGraphError::missing_field(label, ID_PROPERTY)),
    }
}

/// Nested objects and arrays of non-scalars are stored as JSON text.
fn to_property_value(value: &Value) -> PropertyValue {
    match value {
        Value::Null => PropertyValue::Null,
        Value::Bool(b) => PropertyValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => PropertyValue::Int(i),
            None => PropertyValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => PropertyValue::String(s.clone()),
        Value::Array(items) if items.iter().all(is_scalar) => {
            PropertyValue::List(items.iter().map(to_property_value).collect())
        }
        other => PropertyValue::String(other.to_string()),
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}
