//! Terminal output formatting.

use colored::{ColoredString, Colorize};

use idgraph_core::{RunSummary, TypeStatus, TypeSummary};

fn status_colored(status: &TypeStatus) -> ColoredString {
    match status {
        TypeStatus::Completed => "completed".green(),
        TypeStatus::Failed { .. } => "failed".red(),
        TypeStatus::Blocked { .. } => "blocked".yellow(),
    }
}

/// Print a run summary as a table, followed by the reason for each
/// degraded type.
pub fn print_summary(summary: &RunSummary) {
    println!("{} {}", "Run".bold(), summary.run_tag.to_string().cyan());
    println!(
        "{:<48} {:<10} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "Type", "Status", "Created", "Updated", "Deleted", "Edges-", "Orphans", "Dropped"
    );
    println!("{}", "─".repeat(114));

    for entry in &summary.types {
        println!(
            "{:<48} {:<10} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
            truncate(&entry.name, 46),
            status_colored(&entry.status),
            entry.created,
            entry.updated,
            entry.deleted_nodes,
            entry.deleted_relationships,
            entry.skipped_orphan_edges,
            entry.dropped_records
        );
    }

    let degraded: Vec<&TypeSummary> = summary.types.iter().filter(|t| t.is_degraded()).collect();
    if degraded.is_empty() {
        println!("\n{}", "Sync complete.".green().bold());
        return;
    }

    println!(
        "\n{} {}",
        degraded.len().to_string().red().bold(),
        "type(s) were not swept this run:".bold()
    );
    for entry in degraded {
        let reason = match &entry.status {
            TypeStatus::Failed { reason } | TypeStatus::Blocked { reason } => reason.as_str(),
            TypeStatus::Completed => "",
        };
        println!("  {} {} {}", "•".dimmed(), entry.name.yellow(), reason.dimmed());
    }
}

pub fn print_summary_json(summary: &RunSummary) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

/// Truncate to `max` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
