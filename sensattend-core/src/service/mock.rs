//! In-memory matching service for tests and demos.
//!
//! Holds a roster and a result history, records every call, and lets tests
//! script analyse answers, inject failures, and hold an answer back until
//! released to exercise late responses.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tokio::sync::oneshot;

use super::{MatchingService, SubmitMode};
use crate::error::{AttendanceError, Result, TRANSPORT_FAILURE_MESSAGE};
use crate::model::{ImageUpload, MatchResult, NewStudent, RollNumber, Student};
use crate::wire::HistoryRecord;

/// Scripted answer to one analyse call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    Matched {
        roll_numbers: Vec<RollNumber>,
        message: Option<String>,
    },
    ServerError {
        status: u16,
        error: String,
    },
    Transport,
}

impl MockReply {
    pub fn matched(roll_numbers: &[&str]) -> Self {
        Self::Matched {
            roll_numbers: roll_numbers.iter().map(|r| RollNumber::from(*r)).collect(),
            message: None,
        }
    }

    pub fn server_error(status: u16, error: impl Into<String>) -> Self {
        Self::ServerError {
            status,
            error: error.into(),
        }
    }

    pub fn transport() -> Self {
        Self::Transport
    }

    fn into_result(self) -> Result<MatchResult> {
        match self {
            Self::Matched {
                roll_numbers,
                message,
            } => Ok(MatchResult {
                matched_roll_numbers: roll_numbers,
                message,
            }),
            Self::ServerError { status, error } => Err(AttendanceError::Server {
                status,
                message: error,
            }),
            Self::Transport => Err(AttendanceError::Transport(
                TRANSPORT_FAILURE_MESSAGE.to_string(),
            )),
        }
    }
}

/// A call received by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Analyse { mode: SubmitMode, image: ImageUpload },
    ListStudents,
    AddStudent(RollNumber),
    DeleteStudent(RollNumber),
    FetchResults,
}

struct Scripted {
    reply: MockReply,
    gate: Option<oneshot::Receiver<()>>,
}

#[derive(Default)]
struct MockState {
    students: Vec<Student>,
    records: Vec<HistoryRecord>,
    analyse_script: VecDeque<Scripted>,
    list_failures: VecDeque<AttendanceError>,
    add_failures: VecDeque<AttendanceError>,
    delete_failures: VecDeque<AttendanceError>,
    results_failures: VecDeque<AttendanceError>,
    calls: Vec<MockCall>,
}

/// Scriptable in-memory [`MatchingService`].
///
/// Unscripted analyse calls recognize every registered student. Persisted
/// submissions are appended to the history with the current time.
#[derive(Default)]
pub struct MockMatchingService {
    state: Mutex<MockState>,
}

impl MockMatchingService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a student to the roster directly, bypassing validation.
    pub fn register(&self, name: &str, roll_number: &str) {
        self.state().students.push(Student {
            name: Some(name.to_string()),
            roll_number: Some(RollNumber::from(roll_number)),
            image_url: Some(format!("/students/{roll_number}/image")),
        });
    }

    /// Append a stored outcome to the history.
    pub fn push_record(&self, time_stamp: &str, roll_numbers: &[&str]) {
        self.state().records.push(HistoryRecord {
            time_stamp: time_stamp.to_string(),
            matched_roll_numbers: roll_numbers.iter().map(|r| RollNumber::from(*r)).collect(),
        });
    }

    /// Answer the next unscripted analyse call with `reply`.
    pub fn script_analyse(&self, reply: MockReply) {
        self.state().analyse_script.push_back(Scripted { reply, gate: None });
    }

    /// Like [`script_analyse`](Self::script_analyse), but the answer is held
    /// back until the returned sender fires (or is dropped).
    pub fn script_analyse_gated(&self, reply: MockReply) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.state().analyse_script.push_back(Scripted {
            reply,
            gate: Some(gate),
        });
        release
    }

    pub fn fail_next_list(&self, error: AttendanceError) {
        self.state().list_failures.push_back(error);
    }

    pub fn fail_next_add(&self, error: AttendanceError) {
        self.state().add_failures.push_back(error);
    }

    pub fn fail_next_delete(&self, error: AttendanceError) {
        self.state().delete_failures.push_back(error);
    }

    pub fn fail_next_results(&self, error: AttendanceError) {
        self.state().results_failures.push_back(error);
    }

    pub fn students(&self) -> Vec<Student> {
        self.state().students.clone()
    }

    pub fn records(&self) -> Vec<HistoryRecord> {
        self.state().records.clone()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    fn next_scripted(&self, call: MockCall) -> Option<Scripted> {
        let mut state = self.state();
        state.calls.push(call);
        state.analyse_script.pop_front()
    }

    fn registered_roll_numbers(&self) -> Vec<RollNumber> {
        self.state()
            .students
            .iter()
            .filter_map(|s| s.roll_number.clone())
            .collect()
    }

    /// Images received by analyse calls, in arrival order.
    pub fn uploaded_images(&self) -> Vec<ImageUpload> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Analyse { image, .. } => Some(image.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MatchingService for MockMatchingService {
    async fn analyse(&self, image: &ImageUpload, mode: SubmitMode) -> Result<MatchResult> {
        let scripted = self.next_scripted(MockCall::Analyse {
            mode,
            image: image.clone(),
        });

        let reply = match scripted {
            Some(Scripted { reply, gate }) => {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                reply
            }
            None => MockReply::Matched {
                roll_numbers: self.registered_roll_numbers(),
                message: None,
            },
        };

        let result = reply.into_result()?;
        if mode == SubmitMode::Persist {
            let time_stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
            self.state().records.push(HistoryRecord {
                time_stamp,
                matched_roll_numbers: result.matched_roll_numbers.clone(),
            });
        }
        Ok(result)
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        let mut state = self.state();
        state.calls.push(MockCall::ListStudents);
        match state.list_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(state.students.clone()),
        }
    }

    async fn add_student(&self, student: &NewStudent) -> Result<String> {
        let mut state = self.state();
        state
            .calls
            .push(MockCall::AddStudent(student.roll_number.clone()));
        if let Some(err) = state.add_failures.pop_front() {
            return Err(err);
        }
        if state
            .students
            .iter()
            .any(|s| s.has_roll_number(&student.roll_number))
        {
            return Err(AttendanceError::Server {
                status: 400,
                message: format!(
                    "Student with roll number {} already exists",
                    student.roll_number
                ),
            });
        }
        state.students.push(Student {
            name: Some(student.name.clone()),
            roll_number: Some(student.roll_number.clone()),
            image_url: Some(format!("/students/{}/image", student.roll_number)),
        });
        Ok("Student registered successfully".to_string())
    }

    async fn delete_student(&self, roll_number: &RollNumber) -> Result<String> {
        let mut state = self.state();
        state.calls.push(MockCall::DeleteStudent(roll_number.clone()));
        if let Some(err) = state.delete_failures.pop_front() {
            return Err(err);
        }
        state.students.retain(|s| !s.has_roll_number(roll_number));
        Ok("Student deleted successfully".to_string())
    }

    async fn fetch_results(&self) -> Result<Vec<HistoryRecord>> {
        let mut state = self.state();
        state.calls.push(MockCall::FetchResults);
        match state.results_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(state.records.clone()),
        }
    }

    fn describe(&self) -> String {
        "mock matching service".to_string()
    }
}
