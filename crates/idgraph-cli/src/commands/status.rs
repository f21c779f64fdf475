//! `idgraph status`

use anyhow::Result;
use colored::Colorize;

use idgraph_core::models::msft365;
use idgraph_core::Direction;
use idgraph_graph::{GraphClient, GraphStore, Neo4jStore};

use crate::config::AppConfig;

pub async fn execute(config: &AppConfig) -> Result<()> {
    let registry = msft365::registry()?;
    let plan = msft365::plan();
    let client = GraphClient::connect(&config.neo4j).await?;

    println!("{} {}", "Graph Status".bold(), config.neo4j.uri.dimmed());
    println!("{}", "─".repeat(60));

    println!("{}", "Nodes".bold());
    for label in registry.labels() {
        let count = client.count_label(label).await?;
        println!("  {:<44} {:>8}", label, count.to_string().cyan());
    }

    println!("{}", "Relationships".bold());
    for sync in &plan.relationships {
        let (_, schema) = registry.relationship(&sync.owner_label, &sync.rel_type, &sync.target_label)?;
        let (from, to) = match schema.direction {
            Direction::Outgoing => (sync.owner_label.as_str(), sync.target_label.as_str()),
            Direction::Incoming => (sync.target_label.as_str(), sync.owner_label.as_str()),
        };
        let count = client.count_relationships(from, &sync.rel_type, to).await?;
        println!("  {:<44} {:>8}", sync.name(), count.to_string().cyan());
    }

    let totals = client.get_counts().await?;
    println!(
        "\n  Whole graph: {} nodes, {} relationships",
        totals.nodes.to_string().cyan(),
        totals.relationships.to_string().cyan()
    );

    let labels: Vec<&str> = registry.labels().collect();
    let store = Neo4jStore::new(client, config.neo4j.batch_size);
    match store.latest_run_tag(&labels).await? {
        Some(tag) => println!(
            "  Latest run:  {} ({})",
            tag.to_string().green(),
            tag.timestamp().map(|t| t.to_rfc3339()).unwrap_or_default()
        ),
        None => println!("  Latest run:  {}", "never".yellow()),
    }
    println!("{}", "─".repeat(60));

    Ok(())
}
