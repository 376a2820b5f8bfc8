//! Example demonstrating the attendance workflow with tracing output.
//!
//! Runs against the in-memory mock service unless `SENSATTEND_SERVER_URL`
//! is set, in which case the real service at that address is used.
//!
//! Run with: cargo run -p sensattend-core --example attendance_tracing

use std::sync::Arc;

use sensattend_core::{
    HistoryAggregator, HttpMatchingService, ImageUpload, MatchingService, MockMatchingService,
    RosterManager, StudentForm, SubmissionController, SubmissionStatus, SubmitMode,
};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::new("sensattend_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== SensAttend Tracing Demo ===\n");

    let service: Arc<dyn MatchingService> = if std::env::var("SENSATTEND_SERVER_URL").is_ok() {
        match HttpMatchingService::from_env() {
            Ok(service) => Arc::new(service),
            Err(e) => {
                eprintln!("Failed to create client: {}", e);
                return;
            }
        }
    } else {
        Arc::new(MockMatchingService::new())
    };
    println!("Service: {}\n", service.describe());

    let mut roster = RosterManager::new(service.clone());
    for (name, roll) in [("Asha", "101"), ("Ravi", "102")] {
        let form = StudentForm {
            name: name.to_string(),
            roll_number: roll.to_string(),
            image: Some(ImageUpload::new(format!("face of {name}").into_bytes())),
        };
        match roster.add_student(form).await {
            Ok(message) => println!("✅ {}: {}", roll, message),
            Err(e) => println!("❌ {}: {}", roll, e),
        }
    }

    println!("\nSubmitting classroom image...\n");

    let controller = SubmissionController::new(service.clone(), SubmitMode::Persist);
    controller.select_image(ImageUpload::new(b"classroom".to_vec()).with_file_name("class.jpg"));
    if let Err(e) = controller.submit().await {
        println!("❌ Not submitted: {}", e);
        return;
    }

    match controller.current_status() {
        SubmissionStatus::Succeeded(result) => {
            println!("\n✅ Present: {}", result.roll_numbers().collect::<Vec<_>>().join(", "));
        }
        SubmissionStatus::Failed(failure) => println!("\n❌ Failed: {}", failure.message),
        other => println!("\nUnexpected state: {}", other.name()),
    }

    let mut aggregator = HistoryAggregator::new(service);
    match aggregator.fetch_history().await {
        Ok(history) => {
            println!("\nHistory ({} entries):", history.len());
            for group in history.groups() {
                println!("   {}  {:?}", group.label, group.matched_roll_numbers);
            }
        }
        Err(e) => println!("\n❌ History unavailable: {}", e),
    }
}
