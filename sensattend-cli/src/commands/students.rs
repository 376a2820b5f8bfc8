//! Roster command implementations.

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use sensattend_core::{
    DeleteOutcome, HttpMatchingService, ImageUpload, RollNumber, RosterManager, StudentForm,
};
use serde_json::json;

use crate::utils;
use crate::Output;

fn roster_for(service: &Arc<HttpMatchingService>) -> RosterManager {
    RosterManager::with_policy(service.clone(), service.config().reconcile)
}

/// Execute `students list`.
pub async fn list(service: Arc<HttpMatchingService>, output: Output) -> Result<()> {
    let mut roster = roster_for(&service);
    let students = roster.list_students().await.context("Failed to list students")?;

    if output.quiet {
        return Ok(());
    }
    if output.json {
        let json = serde_json::to_string_pretty(students).context("Failed to serialize roster")?;
        println!("{json}");
        return Ok(());
    }
    if students.is_empty() {
        println!("{}", "No students found".yellow());
        return Ok(());
    }

    let base = &service.config().server_url;
    for student in students {
        let link = student
            .image_link(base)
            .map(|url| url.to_string())
            .unwrap_or_default();
        println!(
            "{:<12} {:<24} {}",
            student.display_roll_number().bold(),
            student.display_name(),
            link.dimmed()
        );
    }
    println!();
    println!("   {} {}", "Total:".dimmed(), students.len());
    Ok(())
}

/// Execute `students add`.
pub async fn add(
    service: Arc<HttpMatchingService>,
    name: String,
    roll: String,
    image: Option<ImageUpload>,
    output: Output,
) -> Result<()> {
    let mut roster = roster_for(&service);
    let message = roster
        .add_student(StudentForm {
            name,
            roll_number: roll.clone(),
            image,
        })
        .await?;

    if output.quiet {
        return Ok(());
    }
    if output.json {
        println!("{}", json!({ "roll_number": roll.trim(), "message": message }));
        return Ok(());
    }
    println!("{}", "Student registered!".green().bold());
    println!("   {} {}", "Roll number:".dimmed(), roll.trim());
    println!("   {} {}", "Service:".dimmed(), message);
    Ok(())
}

/// Execute `students delete`, asking for confirmation unless `yes` is set.
pub async fn delete(
    service: Arc<HttpMatchingService>,
    roll: String,
    yes: bool,
    output: Output,
) -> Result<()> {
    let mut roster = roster_for(&service);
    let roll_number = RollNumber::new(roll.trim());

    let confirm = |roll_number: &RollNumber| {
        yes || utils::confirm_or_decline(
            &format!("Delete student with roll number {roll_number}?"),
            &mut std::io::stdin().lock(),
        )
    };
    let outcome = roster.delete_student(&roll_number, &confirm).await?;

    if output.quiet {
        return Ok(());
    }
    match outcome {
        DeleteOutcome::Deleted(message) => {
            if output.json {
                println!(
                    "{}",
                    json!({ "roll_number": roll_number, "deleted": true, "message": message })
                );
            } else {
                println!("{}", "Student deleted.".green().bold());
                println!("   {} {}", "Service:".dimmed(), message);
            }
        }
        DeleteOutcome::Cancelled => {
            if output.json {
                println!("{}", json!({ "roll_number": roll_number, "deleted": false }));
            } else {
                println!("{}", "Deletion cancelled.".yellow());
            }
        }
    }
    Ok(())
}
