//! Results command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use sensattend_core::{HistoryAggregator, LabeledGroup, MatchingService};

use crate::Output;

/// Execute the results command.
pub async fn execute(
    service: Arc<dyn MatchingService>,
    local_time: bool,
    output: Output,
) -> Result<()> {
    let mut aggregator = HistoryAggregator::new(service);
    let history = aggregator
        .fetch_history()
        .await
        .context("Failed to load results")?;

    let groups: Vec<LabeledGroup<'_>> = if local_time {
        history.groups_in(&chrono::Local).collect()
    } else {
        history.groups().collect()
    };

    if output.quiet {
        return Ok(());
    }
    if output.json {
        let json = serde_json::to_string_pretty(&groups).context("Failed to serialize results")?;
        println!("{json}");
        return Ok(());
    }
    if groups.is_empty() {
        println!("{}", "No results yet".yellow());
        return Ok(());
    }

    for group in &groups {
        println!("{}", group.label.bold());
        if group.matched_roll_numbers.is_empty() {
            println!("   {}", "No students recognized".dimmed());
        } else {
            let rolls: Vec<&str> = group
                .matched_roll_numbers
                .iter()
                .map(|r| r.as_str())
                .collect();
            println!("   {} {}", "Present:".dimmed(), rolls.join(", "));
        }
    }
    Ok(())
}
