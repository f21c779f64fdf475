//! `idgraph sync`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::{info, warn};

use idgraph_core::models::msft365;
use idgraph_core::{IdGraphError, IdGraphResult, RunSummary, SchemaRegistry, SyncPlan};
use idgraph_graph::schema::initialize_schema;
use idgraph_graph::{GraphClient, GraphStore, MemoryGraph, Neo4jStore, SyncOptions, SyncOrchestrator};
use idgraph_msgraph::MsGraphSource;

use crate::config::AppConfig;
use crate::output;

#[derive(Args)]
pub struct SyncArgs {
    /// Run against an empty in-memory graph instead of Neo4j
    #[arg(long)]
    pub dry_run: bool,

    /// Fail when any type is failed or blocked
    #[arg(long)]
    pub strict: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: SyncArgs, config: AppConfig) -> Result<()> {
    let mut options = config.sync.clone();
    if args.strict {
        options.require_full_success = true;
    }

    let registry = msft365::registry()?;
    let plan = msft365::plan();
    let source = MsGraphSource::new(&config.msgraph).context("Invalid Microsoft Graph configuration")?;

    if !args.json {
        let target = if args.dry_run { "in-memory graph (dry run)" } else { config.neo4j.uri.as_str() };
        println!("{} {}", "Syncing directory into".bold(), target.cyan());
    }

    let result = if args.dry_run {
        let graph = MemoryGraph::new();
        run(&graph, &source, &registry, &plan, options).await
    } else {
        let client = GraphClient::connect(&config.neo4j).await?;
        initialize_schema(&client, &registry).await?;
        let store = Neo4jStore::new(client, config.neo4j.batch_size);
        run(&store, &source, &registry, &plan, options).await
    };

    match result {
        Ok(summary) => report(&summary, args.json),
        Err(IdGraphError::Incomplete { failed, summary }) => {
            report(&summary, args.json)?;
            anyhow::bail!("{failed} type(s) failed and --strict is set")
        }
        Err(e) => Err(e.into()),
    }
}

async fn run<S: GraphStore>(
    store: &S,
    source: &MsGraphSource,
    registry: &SchemaRegistry,
    plan: &SyncPlan,
    options: SyncOptions,
) -> IdGraphResult<RunSummary> {
    SyncOrchestrator::new(store, source, registry, plan)
        .with_options(options)
        .run_until(shutdown_signal())
        .await
}

/// Resolves on Ctrl-C. If the handler cannot be installed the run simply
/// cannot be interrupted.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupt received, cancelling run"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}

fn report(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        output::print_summary_json(summary)
    } else {
        output::print_summary(summary);
        Ok(())
    }
}
