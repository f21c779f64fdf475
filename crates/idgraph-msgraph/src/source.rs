//! [`EntitySource`] over Microsoft Graph directory endpoints.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use idgraph_core::models::msft365;
use idgraph_core::{EntitySource, IdGraphError, IdGraphResult, Page, RawEntity};

use crate::{MsGraphClient, MsGraphConfig, MsGraphError, MsGraphResult};

const ODATA_TYPE: &str = "@odata.type";
const USER_TYPE: &str = "#microsoft.graph.user";
const GROUP_TYPE: &str = "#microsoft.graph.group";

/// Collection path and `$select` for an entity type.
struct Collection {
    path: &'static str,
    select: &'static str,
    /// Tenants without administrative units answer 404.
    optional: bool,
}

fn collection(entity_type: &str) -> Option<Collection> {
    let (path, select, optional) = match entity_type {
        msft365::USERS => (
            "users",
            "id,displayName,userPrincipalName,mail,jobTitle,department",
            false,
        ),
        msft365::GROUPS => ("groups", "id,displayName,description,mail", false),
        msft365::ADMINISTRATIVE_UNITS => (
            "directory/administrativeUnits",
            "id,displayName,description",
            true,
        ),
        msft365::DEVICES => (
            "devices",
            "id,displayName,operatingSystem,deviceOwnership,approximateLastSignInDateTime,isCompliant",
            false,
        ),
        _ => return None,
    };
    Some(Collection { path, select, optional })
}

/// Navigation path under a parent and the member type it yields.
fn relation(relation: &str, parent_id: &str) -> Option<(String, &'static str)> {
    let (path, wanted) = match relation {
        msft365::GROUP_MEMBERS => (format!("groups/{parent_id}/members"), USER_TYPE),
        msft365::UNIT_USER_MEMBERS => {
            (format!("directory/administrativeUnits/{parent_id}/members"), USER_TYPE)
        }
        msft365::UNIT_GROUP_MEMBERS => {
            (format!("directory/administrativeUnits/{parent_id}/members"), GROUP_TYPE)
        }
        msft365::DEVICE_OWNERS => (format!("devices/{parent_id}/registeredOwners"), USER_TYPE),
        _ => return None,
    };
    Some((path, wanted))
}

/// Members of polymorphic collections carry `@odata.type`; entries without
/// one are assumed to be the requested type.
fn is_of_type(entity: &RawEntity, wanted: &str) -> bool {
    match entity.get(ODATA_TYPE) {
        Some(Value::String(t)) => t == wanted,
        _ => true,
    }
}

pub struct MsGraphSource {
    client: MsGraphClient,
    page_size: u32,
}

impl MsGraphSource {
    pub fn new(config: &MsGraphConfig) -> MsGraphResult<Self> {
        Ok(Self {
            client: MsGraphClient::new(config)?,
            page_size: config.page_size,
        })
    }

    fn first_page_url(&self, collection: &Collection) -> String {
        format!(
            "{}/{}?$select={}&$top={}",
            self.client.graph_base(),
            collection.path,
            collection.select,
            self.page_size
        )
    }

    /// Only follow links back to the configured Graph endpoint, since the
    /// bearer token goes with them.
    fn check_cursor(&self, entity_type: &str, cursor: &str) -> IdGraphResult<()> {
        if self.client.is_trusted(cursor) {
            Ok(())
        } else {
            Err(IdGraphError::source_fetch(
                entity_type,
                format!("refusing to follow cursor outside {}", self.client.graph_base()),
            ))
        }
    }
}

#[async_trait]
impl EntitySource for MsGraphSource {
    async fn fetch_entities(&self, entity_type: &str, cursor: Option<&str>) -> IdGraphResult<Page> {
        let collection = collection(entity_type).ok_or_else(|| {
            MsGraphError::Unsupported {
                kind: "entity type",
                name: entity_type.to_string(),
            }
            .into_source_error(entity_type)
        })?;

        let url = match cursor {
            Some(cursor) => {
                self.check_cursor(entity_type, cursor)?;
                cursor.to_string()
            }
            None => self.first_page_url(&collection),
        };

        match self.client.get_page(&url).await {
            Ok(page) => Ok(Page {
                records: page.value,
                next_cursor: page.next_link,
            }),
            Err(e) if e.is_not_found() && collection.optional && cursor.is_none() => {
                warn!(entity_type, "Collection not available in this tenant, treating as empty");
                Ok(Page::default())
            }
            Err(e) => Err(e.into_source_error(entity_type)),
        }
    }

    async fn fetch_relationship_targets(
        &self,
        parent_id: &str,
        relation_name: &str,
    ) -> IdGraphResult<Vec<RawEntity>> {
        let (path, wanted) = relation(relation_name, parent_id).ok_or_else(|| {
            MsGraphError::Unsupported {
                kind: "relation",
                name: relation_name.to_string(),
            }
            .into_source_error(relation_name)
        })?;

        let url = format!(
            "{}/{}?$select=id&$top={}",
            self.client.graph_base(),
            path,
            self.page_size
        );
        // A parent deleted since it was enumerated answers 404 on its first
        // page; it has no members left to report.
        let members = match self.client.get_all(&url).await {
            Ok(members) => members,
            Err(MsGraphError::NotFound(missing)) if missing == url => {
                warn!(relation = relation_name, parent_id, "Parent no longer exists, treating as empty");
                Vec::new()
            }
            Err(e) => return Err(e.into_source_error(relation_name)),
        };

        let total = members.len();
        let matching: Vec<RawEntity> = members.into_iter().filter(|m| is_of_type(m, wanted)).collect();
        debug!(
            relation = relation_name,
            parent_id,
            total,
            kept = matching.len(),
            "Fetched relationship targets"
        );
        Ok(matching)
    }
}
