//! The matching service contract.
//!
//! Everything the workflow needs from the remote face-matching service goes
//! through [`MatchingService`]:
//!
//! - [`HttpMatchingService`] - the real service over HTTP
//! - [`MockMatchingService`] - scriptable in-memory service for tests and demos

mod http;
mod mock;

pub use http::{is_transient_error, is_transient_status, HttpMatchingService};
pub use mock::{MockCall, MockMatchingService, MockReply};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ImageUpload, MatchResult, NewStudent, RollNumber, Student};
use crate::wire::HistoryRecord;

/// Which endpoint a submission is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitMode {
    /// Match and answer immediately (`/analyse`).
    #[default]
    Analyse,
    /// Match and store the outcome in the history (`/upload_for_analyse`).
    Persist,
}

impl SubmitMode {
    pub fn path(self) -> &'static str {
        match self {
            Self::Analyse => "analyse",
            Self::Persist => "upload_for_analyse",
        }
    }
}

/// Remote face-matching service.
///
/// Implementations must be thread-safe (`Send + Sync`). Server-reported
/// failures come back as [`AttendanceError::Server`](crate::AttendanceError::Server);
/// anything that prevented a usable answer is a transport-class error.
#[async_trait]
pub trait MatchingService: Send + Sync {
    /// Upload one image and return the roll numbers recognized in it.
    async fn analyse(&self, image: &ImageUpload, mode: SubmitMode) -> Result<MatchResult>;

    /// Fetch the full roster.
    async fn list_students(&self) -> Result<Vec<Student>>;

    /// Register a student; returns the service's acknowledgement message.
    async fn add_student(&self, student: &NewStudent) -> Result<String>;

    /// Delete a student by roll number; returns the acknowledgement message.
    async fn delete_student(&self, roll_number: &RollNumber) -> Result<String>;

    /// Fetch every stored submission outcome, in server order.
    async fn fetch_results(&self) -> Result<Vec<HistoryRecord>>;

    /// Human-readable identity of the service, for logs.
    fn describe(&self) -> String;
}
