//! Microsoft 365 / Entra directory model.
//!
//! - (:Msft365User)-[:MEMBER_OF]->(:Msft365Group)
//! - (:Msft365OrganizationalUnit)-[:CONTAINS]->(:Msft365User)
//! - (:Msft365OrganizationalUnit)-[:CONTAINS]->(:Msft365Group)
//! - (:Msft365Device)-[:OWNED_BY]->(:Msft365User)

use crate::plan::{NodeSync, ParentEndpoint, RelationshipSync, SyncPlan};
use crate::schema::{NodeSchema, PropertyRef, RelationshipSchema, SchemaRegistry};
use crate::IdGraphResult;

pub const USER_LABEL: &str = "Msft365User";
pub const GROUP_LABEL: &str = "Msft365Group";
pub const OU_LABEL: &str = "Msft365OrganizationalUnit";
pub const DEVICE_LABEL: &str = "Msft365Device";

pub const MEMBER_OF: &str = "MEMBER_OF";
pub const CONTAINS: &str = "CONTAINS";
pub const OWNED_BY: &str = "OWNED_BY";

/// Collaborator entity types.
pub const USERS: &str = "users";
pub const GROUPS: &str = "groups";
pub const ADMINISTRATIVE_UNITS: &str = "administrativeUnits";
pub const DEVICES: &str = "devices";

/// Collaborator relation names.
pub const GROUP_MEMBERS: &str = "group_members";
pub const UNIT_USER_MEMBERS: &str = "administrative_unit_users";
pub const UNIT_GROUP_MEMBERS: &str = "administrative_unit_groups";
pub const DEVICE_OWNERS: &str = "device_owners";

pub fn user_schema() -> NodeSchema {
    NodeSchema::new(USER_LABEL)
        .with_property(PropertyRef::required("id"))
        .with_property(PropertyRef::optional("displayName"))
        .with_property(PropertyRef::required("userPrincipalName"))
        .with_property(PropertyRef::optional("mail"))
        .with_property(PropertyRef::optional("jobTitle"))
        .with_property(PropertyRef::optional("department"))
        .with_relationship(RelationshipSchema::outgoing(MEMBER_OF, GROUP_LABEL))
}

pub fn group_schema() -> NodeSchema {
    NodeSchema::new(GROUP_LABEL)
        .with_property(PropertyRef::required("id"))
        .with_property(PropertyRef::optional("displayName"))
        .with_property(PropertyRef::optional("description"))
        .with_property(PropertyRef::optional("mail"))
}

pub fn organizational_unit_schema() -> NodeSchema {
    NodeSchema::new(OU_LABEL)
        .with_property(PropertyRef::required("id"))
        .with_property(PropertyRef::optional("displayName"))
        .with_property(PropertyRef::optional("description"))
        .with_relationship(RelationshipSchema::outgoing(CONTAINS, USER_LABEL))
        .with_relationship(RelationshipSchema::outgoing(CONTAINS, GROUP_LABEL))
}

pub fn device_schema() -> NodeSchema {
    NodeSchema::new(DEVICE_LABEL)
        .with_property(PropertyRef::required("id"))
        .with_property(PropertyRef::optional("displayName"))
        .with_property(PropertyRef::optional("operatingSystem"))
        .with_property(PropertyRef::optional("deviceOwnership"))
        .with_property(PropertyRef::optional("approximateLastSignInDateTime"))
        .with_property(PropertyRef::optional("isCompliant"))
        .with_relationship(RelationshipSchema::outgoing(OWNED_BY, USER_LABEL))
}

/// Registry holding the four directory labels.
pub fn registry() -> IdGraphResult<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();
    registry.register_node_schema(user_schema())?;
    registry.register_node_schema(group_schema())?;
    registry.register_node_schema(organizational_unit_schema())?;
    registry.register_node_schema(device_schema())?;
    registry.validate()?;
    Ok(registry)
}

/// Full-directory plan: all four labels and their relationships.
pub fn plan() -> SyncPlan {
    SyncPlan::new()
        .node(NodeSync::new(USER_LABEL, USERS))
        .node(NodeSync::new(GROUP_LABEL, GROUPS))
        .node(NodeSync::new(OU_LABEL, ADMINISTRATIVE_UNITS))
        .node(NodeSync::new(DEVICE_LABEL, DEVICES))
        .relationship(RelationshipSync::new(
            USER_LABEL,
            MEMBER_OF,
            GROUP_LABEL,
            ParentEndpoint::Target,
            GROUP_MEMBERS,
        ))
        .relationship(RelationshipSync::new(
            OU_LABEL,
            CONTAINS,
            USER_LABEL,
            ParentEndpoint::Owner,
            UNIT_USER_MEMBERS,
        ))
        .relationship(RelationshipSync::new(
            OU_LABEL,
            CONTAINS,
            GROUP_LABEL,
            ParentEndpoint::Owner,
            UNIT_GROUP_MEMBERS,
        ))
        .relationship(RelationshipSync::new(
            DEVICE_LABEL,
            OWNED_BY,
            USER_LABEL,
            ParentEndpoint::Owner,
            DEVICE_OWNERS,
        ))
}
