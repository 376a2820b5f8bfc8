//! Response bodies of the matching service and their tagged decoding.
//!
//! A body is decoded by status class: 2xx is read as the success shape of the
//! endpoint, anything else as `{ "error": ... }`. Field presence never decides
//! success or failure.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AttendanceError, Result};
use crate::model::{MatchResult, RollNumber, Student};

/// Decoded answer of one service call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    Success(T),
    Failure { status: u16, error: String },
}

impl<T: DeserializeOwned> Reply<T> {
    /// Decode a body according to its HTTP status.
    ///
    /// A success body that does not match the expected shape is a malformed
    /// response; an error body without a readable `error` field gets a
    /// generic message naming the status.
    pub fn decode(status: u16, body: &[u8]) -> Result<Self> {
        if (200..300).contains(&status) {
            serde_json::from_slice(body)
                .map(Reply::Success)
                .map_err(|e| AttendanceError::MalformedResponse(e.to_string()))
        } else {
            let error = serde_json::from_slice::<ErrorBody>(body)
                .ok()
                .and_then(|b| b.error)
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| format!("service returned status {status}"));
            Ok(Reply::Failure { status, error })
        }
    }
}

impl<T> Reply<T> {
    pub fn into_result(self) -> Result<T> {
        match self {
            Reply::Success(data) => Ok(data),
            Reply::Failure { status, error } => Err(AttendanceError::Server {
                status,
                message: error,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Success body of `/analyse`. The match list is mandatory.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalyseBody {
    pub matched_roll_numbers: Vec<RollNumber>,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<AnalyseBody> for MatchResult {
    fn from(body: AnalyseBody) -> Self {
        Self {
            matched_roll_numbers: body.matched_roll_numbers,
            message: body.message,
        }
    }
}

/// Success body of `/upload_for_analyse`: an acknowledgement that may carry
/// the matches.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PersistBody {
    #[serde(default)]
    pub matched_roll_numbers: Vec<RollNumber>,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<PersistBody> for MatchResult {
    fn from(body: PersistBody) -> Self {
        Self {
            matched_roll_numbers: body.matched_roll_numbers,
            message: body.message,
        }
    }
}

/// `{ "message": ... }` acknowledgement of a roster mutation.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Roster listing; deployments answer either wrapped or as a bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StudentsBody {
    Wrapped { students: Vec<Student> },
    Bare(Vec<Student>),
}

impl StudentsBody {
    pub fn into_students(self) -> Vec<Student> {
        match self {
            StudentsBody::Wrapped { students } | StudentsBody::Bare(students) => students,
        }
    }
}

/// One stored submission outcome as sent by `/results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "timeStamp")]
    pub time_stamp: String,
    #[serde(default)]
    pub matched_roll_numbers: Vec<RollNumber>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsBody {
    pub data: Vec<HistoryRecord>,
}
