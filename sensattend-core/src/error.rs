use thiserror::Error;

/// Generic message shown when the matching service could not be reached or
/// answered with something unreadable.
pub const TRANSPORT_FAILURE_MESSAGE: &str = "Failed to reach the matching service";

#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("No image selected")]
    NoImageSelected,

    #[error("A submission is already in flight")]
    SubmissionInFlight,

    #[error("This image has already been submitted; select an image to submit again")]
    AlreadySettled,

    #[error("Please fill all fields (missing: {})", missing.join(", "))]
    IncompleteSubmission { missing: Vec<&'static str> },

    /// Non-2xx answer from the service; `message` is its `error` field verbatim.
    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AttendanceError {
    /// Caught before any network call.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::NoImageSelected
                | Self::SubmissionInFlight
                | Self::AlreadySettled
                | Self::IncompleteSubmission { .. }
        )
    }

    /// No usable answer came back from the service.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::MalformedResponse(_) | Self::InvalidTimestamp(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AttendanceError>;
