//! Exit codes following sysexits.h conventions.
//!
//! These codes give scripts a way to tell a missing image from a rejected
//! request from an unreachable service.

use sensattend_core::AttendanceError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Missing or invalid input, caught before any request.
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// The matching service answered with an error.
/// Maps to EX_DATAERR from sysexits.h.
pub const REJECTED: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Matching service unreachable or unreadable.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify error by inspecting the chain
        let code = match err
            .chain()
            .find_map(|e| e.downcast_ref::<AttendanceError>())
        {
            Some(e) if e.is_local() => USAGE_ERROR,
            Some(AttendanceError::InvalidConfig(_)) => USAGE_ERROR,
            Some(AttendanceError::Server { .. }) => REJECTED,
            Some(e) if e.is_transport() => NETWORK_ERROR,
            Some(_) => GENERAL_ERROR,
            None if err
                .chain()
                .any(|e| e.downcast_ref::<std::io::Error>().is_some()) =>
            {
                INPUT_ERROR
            }
            None => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }
}
