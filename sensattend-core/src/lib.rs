//! SensAttend Core - attendance capture against a face-matching service
//!
//! This crate implements the client side of SensAttend: an operator registers
//! students with a reference photo, submits a classroom image, and the remote
//! matching service answers with the roll numbers it recognized.
//!
//! # Components
//!
//! - [`RosterManager`] - list, register and delete students
//! - [`SubmissionController`] - one image through upload to a terminal outcome,
//!   discarding late answers to superseded submissions
//! - [`HistoryAggregator`] - past outcomes ordered newest-first with
//!   human-readable labels
//!
//! The pure parts (data model, wire decoding, history ordering and labels)
//! build without the `network` feature and are shared with the Wasm bindings.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sensattend_core::{HttpMatchingService, ImageUpload, SubmissionController, SubmitMode};
//!
//! # async fn example() -> sensattend_core::Result<()> {
//! let service = Arc::new(HttpMatchingService::from_env()?);
//! let controller = SubmissionController::new(service, SubmitMode::Analyse);
//!
//! controller.select_image(ImageUpload::new(std::fs::read("class.jpg").unwrap_or_default()));
//! controller.submit().await?;
//! println!("{:?}", controller.current_status());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod history;
pub mod label;
pub mod model;
pub mod wire;

#[cfg(feature = "network")]
pub mod roster;
#[cfg(feature = "network")]
pub mod service;
#[cfg(feature = "network")]
pub mod submission;

// Re-export main types for convenience
pub use config::{ClientConfig, ReconcilePolicy};
pub use error::{AttendanceError, Result, TRANSPORT_FAILURE_MESSAGE};
pub use history::{parse_timestamp, HistoryEntry, LabeledGroup, ResultHistory};
pub use label::{format_label, ordinal_suffix};
pub use model::{
    ImageUpload, MatchResult, NewStudent, RollNumber, Student, StudentForm, NO_ROLL_NUMBER,
    UNNAMED,
};

// Network-dependent exports (not available in Wasm)
#[cfg(feature = "network")]
pub use history::HistoryAggregator;
#[cfg(feature = "network")]
pub use roster::{ConfirmDelete, DeleteOutcome, RosterManager};
#[cfg(feature = "network")]
pub use service::{HttpMatchingService, MatchingService, MockMatchingService, MockReply, SubmitMode};
#[cfg(feature = "network")]
pub use submission::{
    Failure, FailureKind, Settlement, Submission, SubmissionController, SubmissionStatus,
};
