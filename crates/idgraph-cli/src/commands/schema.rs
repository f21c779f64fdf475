//! `idgraph init-schema`

use anyhow::Result;
use colored::Colorize;

use idgraph_core::models::msft365;
use idgraph_graph::schema::{initialize_schema, schema_statements};
use idgraph_graph::GraphClient;

use crate::config::AppConfig;

pub async fn execute(config: &AppConfig) -> Result<()> {
    let registry = msft365::registry()?;
    let client = GraphClient::connect(&config.neo4j).await?;

    initialize_schema(&client, &registry).await?;

    for statement in schema_statements(&registry) {
        println!("  {} {}", "✓".green(), statement.dimmed());
    }
    println!("{}", "Schema initialized.".green().bold());
    Ok(())
}
