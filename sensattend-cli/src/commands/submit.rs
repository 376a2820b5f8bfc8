//! Analyse and upload command implementation.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use sensattend_core::{
    AttendanceError, Failure, FailureKind, ImageUpload, MatchResult, MatchingService,
    SubmissionController, SubmissionStatus, SubmitMode,
};
use tracing::info;

use crate::Output;

/// Turn a terminal failure back into an error for exit-code mapping.
fn failure_error(failure: Failure) -> AttendanceError {
    match failure.kind {
        FailureKind::Server { status } => AttendanceError::Server {
            status,
            message: failure.message,
        },
        FailureKind::Transport => AttendanceError::Transport(failure.message),
    }
}

/// Execute the analyse or upload command.
pub async fn execute(
    service: Arc<dyn MatchingService>,
    image: ImageUpload,
    mode: SubmitMode,
    output: Output,
) -> Result<()> {
    let controller = SubmissionController::new(service, mode);
    controller.select_image(image);
    controller.submit().await.context("Submission not sent")?;

    match controller.current_status() {
        SubmissionStatus::Succeeded(result) => {
            info!(matched = result.matched_roll_numbers.len(), "Submission succeeded");
            print_result(&result, mode, output)
        }
        SubmissionStatus::Failed(failure) => Err(failure_error(failure).into()),
        other => bail!("Submission ended while {}", other.name()),
    }
}

fn print_result(result: &MatchResult, mode: SubmitMode, output: Output) -> Result<()> {
    if output.quiet {
        return Ok(());
    }
    if output.json {
        let json = serde_json::to_string_pretty(result).context("Failed to serialize result")?;
        println!("{json}");
        return Ok(());
    }

    let headline = match mode {
        SubmitMode::Analyse => "Image analysed!",
        SubmitMode::Persist => "Attendance recorded!",
    };
    println!();
    println!("{}", headline.green().bold());
    println!();
    if result.matched_roll_numbers.is_empty() {
        println!("   {}", "No students recognized".yellow());
    } else {
        println!(
            "   {} {}",
            "Present:".dimmed(),
            result.roll_numbers().collect::<Vec<_>>().join(", ")
        );
        println!(
            "   {} {}",
            "Count:".dimmed(),
            result.matched_roll_numbers.len()
        );
    }
    if let Some(message) = &result.message {
        println!("   {} {}", "Service:".dimmed(), message);
    }
    Ok(())
}
