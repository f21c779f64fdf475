//! Cypher text for the Neo4j store.
//!
//! Labels and relationship types are interpolated (Cypher has no parameters
//! for them); the schema registry only admits plain identifiers.

use idgraph_core::{Direction, RelationshipSchema};

fn arrow(direction: Direction, var: &str, rel_type: &str) -> String {
    match direction {
        Direction::Outgoing => format!("-[{var}:`{rel_type}`]->"),
        Direction::Incoming => format!("<-[{var}:`{rel_type}`]-"),
    }
}

pub(crate) fn merge_nodes(label: &str) -> String {
    format!(
        "UNWIND $rows AS row
         OPTIONAL MATCH (existing:`{label}` {{id: row.id}})
         WITH row, count(existing) = 0 AS created
         MERGE (n:`{label}` {{id: row.id}})
         ON CREATE SET n.firstseen = $firstseen
         SET n += row.props, n.lastupdated = $tag
         RETURN count(n) AS total, sum(CASE WHEN created THEN 1 ELSE 0 END) AS created"
    )
}

pub(crate) fn merge_relationships(owner_label: &str, schema: &RelationshipSchema) -> String {
    let target_label = &schema.target_label;
    let existing = arrow(schema.direction, "existing", &schema.rel_type);
    let merged = arrow(schema.direction, "r", &schema.rel_type);
    format!(
        "UNWIND $rows AS row
         MATCH (s:`{owner_label}` {{id: row.source_id}})
         MATCH (t:`{target_label}` {{id: row.target_id}})
         OPTIONAL MATCH (s){existing}(t)
         WITH row, s, t, count(existing) = 0 AS created
         MERGE (s){merged}(t)
         ON CREATE SET r.firstseen = $firstseen
         SET r += row.props, r.lastupdated = $tag
         RETURN row.source_id AS source_id, row.target_id AS target_id, created"
    )
}

pub(crate) fn delete_stale_nodes(label: &str) -> String {
    format!(
        "MATCH (n:`{label}`)
         WHERE n.lastupdated IS NULL OR n.lastupdated <> $tag
         OPTIONAL MATCH (n)-[r]-()
         WITH collect(DISTINCT n) AS nodes, collect(DISTINCT r) AS rels
         FOREACH (r IN rels | DELETE r)
         FOREACH (n IN nodes | DELETE n)
         RETURN size(nodes) AS nodes, size(rels) AS relationships"
    )
}

pub(crate) fn delete_stale_relationships(owner_label: &str, schema: &RelationshipSchema) -> String {
    let target_label = &schema.target_label;
    let rel = arrow(schema.direction, "r", &schema.rel_type);
    format!(
        "MATCH (:`{owner_label}`){rel}(:`{target_label}`)
         WHERE r.lastupdated IS NULL OR r.lastupdated <> $tag
         DELETE r
         RETURN count(r) AS deleted"
    )
}

pub(crate) fn latest_run_tag(label: &str) -> String {
    format!("MATCH (n:`{label}`) RETURN max(n.lastupdated) AS tag")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_nodes_sets_firstseen_only_on_create() {
        let cypher = merge_nodes("Msft365User");
        assert!(cypher.contains("MERGE (n:`Msft365User` {id: row.id})"));
        assert!(cypher.contains("ON CREATE SET n.firstseen = $firstseen"));
        assert!(cypher.contains("SET n += row.props, n.lastupdated = $tag"));
    }

    #[test]
    fn test_merge_relationships_matches_never_creates_endpoints() {
        let schema = RelationshipSchema::outgoing("MEMBER_OF", "Msft365Group");
        let cypher = merge_relationships("Msft365User", &schema);
        assert!(cypher.contains("MATCH (s:`Msft365User` {id: row.source_id})"));
        assert!(cypher.contains("MATCH (t:`Msft365Group` {id: row.target_id})"));
        assert!(cypher.contains("MERGE (s)-[r:`MEMBER_OF`]->(t)"));
        assert!(!cypher.contains("MERGE (s:"));
        assert!(!cypher.contains("MERGE (t:"));
    }

    #[test]
    fn test_incoming_direction_reverses_arrow() {
        let schema = RelationshipSchema::incoming("MANAGES", "Msft365User");
        assert!(merge_relationships("Msft365User", &schema).contains("MERGE (s)<-[r:`MANAGES`]-(t)"));
        assert!(delete_stale_relationships("Msft365User", &schema)
            .contains("MATCH (:`Msft365User`)<-[r:`MANAGES`]-(:`Msft365User`)"));
    }

    #[test]
    fn test_sweep_detaches_every_incident_edge() {
        let cypher = delete_stale_nodes("Msft365Group");
        assert!(cypher.contains("OPTIONAL MATCH (n)-[r]-()"));
        assert!(cypher.contains("FOREACH (r IN rels | DELETE r)"));
    }
}
