//! Neo4j schema initialization (constraints and indexes).

use anyhow::Result;
use neo4rs::Query;
use tracing::info;

use idgraph_core::SchemaRegistry;

use crate::GraphClient;

/// Cypher statements for every registered label.
///
/// The `id` uniqueness constraint is what makes `MERGE` on `(label, id)`
/// atomic per entity; the `lastupdated` index keeps sweeps cheap.
pub fn schema_statements(registry: &SchemaRegistry) -> Vec<String> {
    let mut statements = Vec::new();
    for label in registry.labels() {
        let slug = label.to_lowercase();
        statements.push(format!(
            "CREATE CONSTRAINT {slug}_id IF NOT EXISTS FOR (n:`{label}`) REQUIRE n.id IS UNIQUE"
        ));
        statements.push(format!(
            "CREATE INDEX {slug}_lastupdated IF NOT EXISTS FOR (n:`{label}`) ON (n.lastupdated)"
        ));
    }
    statements
}

/// Initialize Neo4j schema with constraints and indexes.
///
/// Safe to run multiple times - uses IF NOT EXISTS clauses.
pub async fn initialize_schema(client: &GraphClient, registry: &SchemaRegistry) -> Result<()> {
    info!("Initializing Neo4j schema...");

    let statements = schema_statements(registry);
    for statement in &statements {
        client.execute(Query::new(statement.clone())).await?;
    }

    info!("Neo4j schema initialized ({} statements)", statements.len());
    Ok(())
}
