//! Roster management: the registered students, keyed by roll number.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::ReconcilePolicy;
use crate::error::Result;
use crate::model::{RollNumber, Student, StudentForm};
use crate::service::MatchingService;

/// Asks the operator whether a student really should be deleted.
pub trait ConfirmDelete {
    fn confirm_delete(&self, roll_number: &RollNumber) -> bool;
}

impl<F> ConfirmDelete for F
where
    F: Fn(&RollNumber) -> bool,
{
    fn confirm_delete(&self, roll_number: &RollNumber) -> bool {
        self(roll_number)
    }
}

/// Result of a delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The service deleted the student; carries its confirmation message.
    Deleted(String),
    /// The operator declined; nothing was sent.
    Cancelled,
}

/// Local view of the roster, kept in step with the matching service.
pub struct RosterManager {
    service: Arc<dyn MatchingService>,
    policy: ReconcilePolicy,
    students: Vec<Student>,
}

impl RosterManager {
    pub fn new(service: Arc<dyn MatchingService>) -> Self {
        Self::with_policy(service, ReconcilePolicy::default())
    }

    pub fn with_policy(service: Arc<dyn MatchingService>, policy: ReconcilePolicy) -> Self {
        Self {
            service,
            policy,
            students: Vec::new(),
        }
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    /// Students as last fetched or reconciled, in service order.
    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    /// Fetch the full roster and replace the local view.
    #[instrument(level = "debug", skip(self))]
    pub async fn list_students(&mut self) -> Result<&[Student]> {
        let students = self.service.list_students().await.map_err(|e| {
            warn!(error = %e, "Failed to fetch roster");
            e
        })?;
        debug!(students = students.len(), "Roster fetched");
        self.students = students;
        Ok(&self.students)
    }

    /// Register a student from raw form input.
    ///
    /// Incomplete forms are rejected before any request is made. Returns the
    /// service's confirmation message.
    #[instrument(level = "info", skip_all, fields(roll_number = %form.roll_number.trim()))]
    pub async fn add_student(&mut self, form: StudentForm) -> Result<String> {
        let student = form.validate()?;

        let message = self.service.add_student(&student).await.map_err(|e| {
            warn!(error = %e, "Failed to register student");
            e
        })?;
        info!("Student registered");

        match self.policy {
            ReconcilePolicy::Optimistic => self.students.push(Student {
                name: Some(student.name),
                roll_number: Some(student.roll_number),
                image_url: None,
            }),
            ReconcilePolicy::Refetch => self.reconcile().await,
        }
        Ok(message)
    }

    /// Delete the student with `roll_number` once the operator confirms.
    ///
    /// A declined confirmation sends nothing. On success only the matching
    /// entry leaves the local view; the rest keep their order.
    #[instrument(level = "info", skip(self, confirm), fields(roll_number = %roll_number))]
    pub async fn delete_student(
        &mut self,
        roll_number: &RollNumber,
        confirm: &dyn ConfirmDelete,
    ) -> Result<DeleteOutcome> {
        if !confirm.confirm_delete(roll_number) {
            debug!("Delete declined");
            return Ok(DeleteOutcome::Cancelled);
        }

        let message = self
            .service
            .delete_student(roll_number)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to delete student");
                e
            })?;
        info!("Student deleted");

        self.students.retain(|s| !s.has_roll_number(roll_number));
        if self.policy == ReconcilePolicy::Refetch {
            self.reconcile().await;
        }
        Ok(DeleteOutcome::Deleted(message))
    }

    /// Re-fetch after a mutation. A failed re-fetch keeps the local view.
    async fn reconcile(&mut self) {
        match self.service.list_students().await {
            Ok(students) => {
                debug!(students = students.len(), "Roster reconciled");
                self.students = students;
            }
            Err(e) => warn!(error = %e, "Roster re-fetch failed, keeping local view"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AttendanceError;
    use crate::model::ImageUpload;
    use crate::service::{MockCall, MockMatchingService};

    fn form(name: &str, roll_number: &str, image: Option<&[u8]>) -> StudentForm {
        StudentForm {
            name: name.to_string(),
            roll_number: roll_number.to_string(),
            image: image.map(|b| ImageUpload::new(b.to_vec())),
        }
    }

    fn rolls(roster: &RosterManager) -> Vec<&str> {
        roster
            .students()
            .iter()
            .map(|s| s.display_roll_number())
            .collect()
    }

    fn yes(_: &RollNumber) -> bool {
        true
    }

    fn no(_: &RollNumber) -> bool {
        false
    }

    async fn seeded(policy: ReconcilePolicy) -> (Arc<MockMatchingService>, RosterManager) {
        let mock = Arc::new(MockMatchingService::new());
        mock.register("Asha", "1");
        mock.register("Ravi", "2");
        mock.register("Meera", "3");
        let mut roster = RosterManager::with_policy(mock.clone(), policy);
        roster.list_students().await.unwrap();
        (mock, roster)
    }

    #[tokio::test]
    async fn test_empty_roster_is_valid() {
        let mock = Arc::new(MockMatchingService::new());
        let mut roster = RosterManager::new(mock);
        assert!(roster.list_students().await.unwrap().is_empty());
        assert!(roster.is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_form_makes_no_call() {
        let mock = Arc::new(MockMatchingService::new());
        let mut roster = RosterManager::new(mock.clone());

        let err = roster.add_student(form("  ", "7", None)).await.unwrap_err();
        match err {
            AttendanceError::IncompleteSubmission { missing } => {
                assert_eq!(missing, vec!["name", "image"])
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_add_student_optimistic() {
        let (mock, mut roster) = seeded(ReconcilePolicy::Optimistic).await;

        let message = roster
            .add_student(form("Kiran", " 4 ", Some(b"face")))
            .await
            .unwrap();
        assert_eq!(message, "Student registered successfully");
        assert_eq!(rolls(&roster), vec!["1", "2", "3", "4"]);
        assert_eq!(mock.students().len(), 4);
    }

    #[tokio::test]
    async fn test_duplicate_roll_number_surfaces_verbatim() {
        let (_mock, mut roster) = seeded(ReconcilePolicy::Optimistic).await;

        let err = roster
            .add_student(form("Copy", "2", Some(b"face")))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Student with roll number 2 already exists");
        assert_eq!(rolls(&roster), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_failed_add_leaves_roster_identical() {
        let (mock, mut roster) = seeded(ReconcilePolicy::Refetch).await;
        let before = roster.students().to_vec();
        mock.fail_next_add(AttendanceError::Transport("connection reset".into()));

        let err = roster
            .add_student(form("Kiran", "4", Some(b"face")))
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(roster.students(), before.as_slice());
        assert_eq!(mock.students().len(), 3);
        assert_eq!(mock.calls().last(), Some(&MockCall::AddStudent("4".into())));
    }

    #[tokio::test]
    async fn test_declined_delete_makes_no_call() {
        let (mock, mut roster) = seeded(ReconcilePolicy::Optimistic).await;
        let calls_before = mock.calls().len();

        let outcome = roster
            .delete_student(&RollNumber::from("2"), &no)
            .await
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::Cancelled);
        assert_eq!(mock.calls().len(), calls_before);
        assert_eq!(rolls(&roster), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_delete_removes_only_matching_entry() {
        let (mock, mut roster) = seeded(ReconcilePolicy::Optimistic).await;

        let outcome = roster
            .delete_student(&RollNumber::from("2"), &yes)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DeleteOutcome::Deleted("Student deleted successfully".into())
        );
        assert_eq!(rolls(&roster), vec!["1", "3"]);
        assert_eq!(mock.calls().last(), Some(&MockCall::DeleteStudent("2".into())));
    }

    #[tokio::test]
    async fn test_failed_delete_leaves_roster_identical() {
        let (mock, mut roster) = seeded(ReconcilePolicy::Optimistic).await;
        let before = roster.students().to_vec();

        mock.fail_next_delete(AttendanceError::Server {
            status: 404,
            message: "Student not found".into(),
        });
        let err = roster
            .delete_student(&RollNumber::from("2"), &yes)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Student not found");
        assert_eq!(roster.students(), before.as_slice());
    }

    #[tokio::test]
    async fn test_failed_list_keeps_previous_view() {
        let (mock, mut roster) = seeded(ReconcilePolicy::Optimistic).await;
        mock.fail_next_list(AttendanceError::Transport("timeout".into()));

        assert!(roster.list_students().await.is_err());
        assert_eq!(rolls(&roster), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_refetch_policy_reconciles_after_mutation() {
        let (mock, mut roster) = seeded(ReconcilePolicy::Refetch).await;

        roster
            .add_student(form("Kiran", "4", Some(b"face")))
            .await
            .unwrap();
        assert_eq!(
            roster.students()[3].image_url.as_deref(),
            Some("/students/4/image")
        );
        assert_eq!(mock.calls().last(), Some(&MockCall::ListStudents));
    }

    #[tokio::test]
    async fn test_refetch_failure_still_reports_success() {
        let (mock, mut roster) = seeded(ReconcilePolicy::Refetch).await;
        mock.fail_next_list(AttendanceError::Transport("connection reset".into()));

        let outcome = roster
            .delete_student(&RollNumber::from("1"), &yes)
            .await
            .unwrap();
        assert!(matches!(outcome, DeleteOutcome::Deleted(_)));
        assert_eq!(rolls(&roster), vec!["2", "3"]);
    }
}
