//! Submission lifecycle: one selected image through upload to an outcome.
//!
//! [`Submission`] is the explicit state object and performs no I/O.
//! [`SubmissionController`] drives it against a [`MatchingService`].
//!
//! Every selection and every submit advances a generation counter. A submit
//! holds a [`SubmitTicket`] stamped with the generation it started at, and
//! its response is applied only if that generation is still current, so a
//! late answer to a superseded submit can never overwrite a newer outcome.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, instrument, warn};

use crate::error::{AttendanceError, Result, TRANSPORT_FAILURE_MESSAGE};
use crate::model::{ImageUpload, MatchResult};
use crate::service::{MatchingService, SubmitMode};

/// Where a failed submission broke down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The service answered with a non-success status.
    Server { status: u16 },
    /// No usable answer arrived.
    Transport,
}

/// Terminal failure of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Server { status },
            message: message.into(),
        }
    }

    /// Generic failure; transport details only go to the log.
    pub fn transport() -> Self {
        Self {
            kind: FailureKind::Transport,
            message: TRANSPORT_FAILURE_MESSAGE.to_string(),
        }
    }

    pub fn is_server(&self) -> bool {
        matches!(self.kind, FailureKind::Server { .. })
    }
}

impl From<&AttendanceError> for Failure {
    fn from(err: &AttendanceError) -> Self {
        match err {
            AttendanceError::Server { status, message } => Self::server(*status, message.clone()),
            _ => Self::transport(),
        }
    }
}

/// Observable state of the submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionStatus {
    #[default]
    Idle,
    Uploading,
    Succeeded(MatchResult),
    Failed(Failure),
}

impl SubmissionStatus {
    pub fn is_uploading(&self) -> bool {
        matches!(self, Self::Uploading)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

/// Proof that an upload was started at a given generation.
#[derive(Debug)]
pub struct SubmitTicket {
    generation: u64,
    image: ImageUpload,
}

impl SubmitTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn image(&self) -> &ImageUpload {
        &self.image
    }
}

/// The one submission a client works on.
#[derive(Debug, Default)]
pub struct Submission {
    image: Option<ImageUpload>,
    status: SubmissionStatus,
    generation: u64,
}

impl Submission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection, return to `Idle` and drop any prior outcome.
    ///
    /// Any upload still in flight is superseded.
    pub fn select_image(&mut self, image: ImageUpload) {
        self.generation += 1;
        self.image = Some(image);
        self.status = SubmissionStatus::Idle;
    }

    /// Start uploading the current selection.
    ///
    /// Rejected while an upload is in flight, and once an outcome is
    /// settled until the next selection.
    pub fn begin(&mut self) -> Result<SubmitTicket> {
        if self.status.is_uploading() {
            return Err(AttendanceError::SubmissionInFlight);
        }
        if self.status.is_terminal() {
            return Err(AttendanceError::AlreadySettled);
        }
        let image = self
            .image
            .clone()
            .ok_or(AttendanceError::NoImageSelected)?;

        self.generation += 1;
        self.status = SubmissionStatus::Uploading;
        Ok(SubmitTicket {
            generation: self.generation,
            image,
        })
    }

    /// Apply the outcome of `ticket`'s upload.
    ///
    /// Returns `false`, leaving the state untouched, when the ticket has been
    /// superseded by a later selection or submit.
    pub fn settle(
        &mut self,
        ticket: SubmitTicket,
        outcome: std::result::Result<MatchResult, Failure>,
    ) -> bool {
        if ticket.generation != self.generation || !self.status.is_uploading() {
            return false;
        }
        self.status = match outcome {
            Ok(result) => SubmissionStatus::Succeeded(result),
            Err(failure) => SubmissionStatus::Failed(failure),
        };
        true
    }

    pub fn status(&self) -> &SubmissionStatus {
        &self.status
    }

    pub fn selected_image(&self) -> Option<&ImageUpload> {
        self.image.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What became of one submit call's response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The response set the terminal state shown here.
    Applied(SubmissionStatus),
    /// A newer selection or submit took over; the response was discarded.
    Superseded,
}

/// Drives a [`Submission`] against the matching service.
pub struct SubmissionController {
    service: Arc<dyn MatchingService>,
    mode: SubmitMode,
    submission: Mutex<Submission>,
}

impl SubmissionController {
    pub fn new(service: Arc<dyn MatchingService>, mode: SubmitMode) -> Self {
        Self {
            service,
            mode,
            submission: Mutex::new(Submission::new()),
        }
    }

    pub fn mode(&self) -> SubmitMode {
        self.mode
    }

    fn lock(&self) -> MutexGuard<'_, Submission> {
        self.submission
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn select_image(&self, image: ImageUpload) {
        let mut submission = self.lock();
        submission.select_image(image);
        debug!(
            generation = submission.generation(),
            bytes = submission.selected_image().map_or(0, ImageUpload::len),
            "Image selected"
        );
    }

    pub fn has_image(&self) -> bool {
        self.lock().selected_image().is_some()
    }

    /// Current state, including the terminal result or failure.
    pub fn current_status(&self) -> SubmissionStatus {
        self.lock().status().clone()
    }

    /// Upload the latest selection and wait for its outcome.
    ///
    /// Local validation failures (`NoImageSelected`, `SubmissionInFlight`,
    /// `AlreadySettled`) are returned as errors without any network call.
    /// Service and transport failures end in [`SubmissionStatus::Failed`].
    #[instrument(level = "info", skip(self), fields(mode = ?self.mode))]
    pub async fn submit(&self) -> Result<Settlement> {
        let ticket = self.lock().begin()?;
        let generation = ticket.generation();
        let image = ticket.image().clone();
        let in_flight = InFlight {
            submission: &self.submission,
            ticket: Some(ticket),
        };

        info!(
            generation,
            bytes = image.len(),
            service = %self.service.describe(),
            "Submitting image"
        );

        let outcome = self
            .service
            .analyse(&image, self.mode)
            .await
            .map_err(|e| {
                warn!(error = %e, generation, "Submission failed");
                Failure::from(&e)
            });

        let settlement = in_flight.settle(outcome);
        match &settlement {
            Settlement::Applied(status) => {
                info!(generation, status = status.name(), "Submission settled")
            }
            Settlement::Superseded => {
                info!(generation, "Discarding response of superseded submission")
            }
        }
        Ok(settlement)
    }
}

/// Settles its ticket exactly once, even if the submitting future is dropped.
struct InFlight<'a> {
    submission: &'a Mutex<Submission>,
    ticket: Option<SubmitTicket>,
}

impl InFlight<'_> {
    fn lock(&self) -> MutexGuard<'_, Submission> {
        self.submission
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(mut self, outcome: std::result::Result<MatchResult, Failure>) -> Settlement {
        let Some(ticket) = self.ticket.take() else {
            return Settlement::Superseded;
        };
        let mut submission = self.lock();
        if submission.settle(ticket, outcome) {
            Settlement::Applied(submission.status().clone())
        } else {
            Settlement::Superseded
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            let generation = ticket.generation();
            if self.lock().settle(ticket, Err(Failure::transport())) {
                warn!(generation, "Submission abandoned before a response arrived");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{MockCall, MockMatchingService, MockReply};
    use std::time::Duration;

    fn image(bytes: &[u8]) -> ImageUpload {
        ImageUpload::new(bytes.to_vec())
    }

    fn controller(mock: &Arc<MockMatchingService>) -> Arc<SubmissionController> {
        Arc::new(SubmissionController::new(mock.clone(), SubmitMode::Analyse))
    }

    async fn wait_until_uploading(controller: &SubmissionController) {
        while !controller.current_status().is_uploading() {
            tokio::task::yield_now().await;
        }
    }

    fn matched(status: &SubmissionStatus) -> Vec<&str> {
        match status {
            SubmissionStatus::Succeeded(result) => result.roll_numbers().collect(),
            other => panic!("expected success, got {other:?}"),
        }
    }

    // ---- state object ----

    #[test]
    fn test_begin_without_image() {
        let mut submission = Submission::new();
        assert!(matches!(
            submission.begin(),
            Err(AttendanceError::NoImageSelected)
        ));
        assert_eq!(submission.status(), &SubmissionStatus::Idle);
    }

    #[test]
    fn test_begin_rejected_while_uploading() {
        let mut submission = Submission::new();
        submission.select_image(image(b"a"));
        let _ticket = submission.begin().unwrap();
        assert!(matches!(
            submission.begin(),
            Err(AttendanceError::SubmissionInFlight)
        ));
    }

    #[test]
    fn test_settle_applies_current_ticket_once() {
        let mut submission = Submission::new();
        submission.select_image(image(b"a"));
        let ticket = submission.begin().unwrap();
        assert!(submission.settle(ticket, Ok(MatchResult::default())));
        assert!(submission.status().is_terminal());
    }

    #[test]
    fn test_selection_supersedes_ticket_and_clears_result() {
        let mut submission = Submission::new();
        submission.select_image(image(b"a"));
        let ticket = submission.begin().unwrap();

        submission.select_image(image(b"b"));
        assert_eq!(submission.status(), &SubmissionStatus::Idle);
        assert!(!submission.settle(ticket, Err(Failure::transport())));
        assert_eq!(submission.status(), &SubmissionStatus::Idle);
        assert_eq!(submission.selected_image().unwrap().bytes(), b"b");
    }

    #[test]
    fn test_terminal_state_holds_until_next_selection() {
        let mut submission = Submission::new();
        submission.select_image(image(b"a"));
        let first = submission.begin().unwrap();
        submission.settle(first, Err(Failure::transport()));

        assert!(matches!(
            submission.begin(),
            Err(AttendanceError::AlreadySettled)
        ));
        assert_eq!(
            submission.status(),
            &SubmissionStatus::Failed(Failure::transport())
        );

        submission.select_image(image(b"a"));
        let second = submission.begin().unwrap();
        assert_eq!(second.image().bytes(), b"a");
        assert!(submission.status().is_uploading());
    }

    #[test]
    fn test_failure_from_error() {
        let server = Failure::from(&AttendanceError::Server {
            status: 422,
            message: "no face".into(),
        });
        assert_eq!(server, Failure::server(422, "no face"));
        assert!(server.is_server());

        let transport = Failure::from(&AttendanceError::MalformedResponse("eof".into()));
        assert_eq!(transport, Failure::transport());
        assert_ne!(transport.message, "eof");
    }

    // ---- controller ----

    #[tokio::test]
    async fn test_submit_without_image_makes_no_call() {
        let mock = Arc::new(MockMatchingService::new());
        let controller = controller(&mock);
        assert!(!controller.has_image());

        let err = controller.submit().await.unwrap_err();
        assert!(matches!(err, AttendanceError::NoImageSelected));
        assert!(mock.calls().is_empty());
        assert_eq!(controller.current_status(), SubmissionStatus::Idle);
    }

    #[tokio::test]
    async fn test_submit_success_preserves_order() {
        let mock = Arc::new(MockMatchingService::new());
        mock.script_analyse(MockReply::matched(&["101", "102"]));
        let controller = controller(&mock);

        controller.select_image(image(b"class"));
        let settlement = controller.submit().await.unwrap();

        let status = controller.current_status();
        assert_eq!(settlement, Settlement::Applied(status.clone()));
        assert_eq!(matched(&status), vec!["101", "102"]);
    }

    #[tokio::test]
    async fn test_server_error_is_kept_verbatim() {
        let mock = Arc::new(MockMatchingService::new());
        mock.script_analyse(MockReply::server_error(500, "bad image"));
        let controller = controller(&mock);

        controller.select_image(image(b"blurry"));
        controller.submit().await.unwrap();

        assert_eq!(
            controller.current_status(),
            SubmissionStatus::Failed(Failure::server(500, "bad image"))
        );
    }

    #[tokio::test]
    async fn test_transport_error_is_generic() {
        let mock = Arc::new(MockMatchingService::new());
        mock.script_analyse(MockReply::transport());
        let controller = controller(&mock);

        controller.select_image(image(b"class"));
        controller.submit().await.unwrap();

        match controller.current_status() {
            SubmissionStatus::Failed(failure) => {
                assert_eq!(failure.kind, FailureKind::Transport);
                assert_eq!(failure.message, TRANSPORT_FAILURE_MESSAGE);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_latest_selection_is_submitted() {
        let mock = Arc::new(MockMatchingService::new());
        let controller = controller(&mock);

        controller.select_image(image(b"first"));
        controller.select_image(image(b"second"));
        controller.select_image(image(b"third"));
        controller.submit().await.unwrap();

        let uploads = mock.uploaded_images();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].bytes(), b"third");
    }

    #[tokio::test]
    async fn test_settled_outcome_is_not_overwritten_by_resubmit() {
        let mock = Arc::new(MockMatchingService::new());
        mock.script_analyse(MockReply::matched(&["101"]));
        mock.script_analyse(MockReply::server_error(500, "later"));
        let controller = controller(&mock);

        controller.select_image(image(b"class"));
        assert!(controller.has_image());
        controller.submit().await.unwrap();

        let err = controller.submit().await.unwrap_err();
        assert!(matches!(err, AttendanceError::AlreadySettled));
        assert!(err.is_local());
        assert_eq!(mock.uploaded_images().len(), 1);
        assert_eq!(matched(&controller.current_status()), vec!["101"]);
    }

    #[tokio::test]
    async fn test_selection_resets_terminal_state() {
        let mock = Arc::new(MockMatchingService::new());
        mock.script_analyse(MockReply::matched(&["1"]));
        let controller = controller(&mock);

        controller.select_image(image(b"a"));
        controller.submit().await.unwrap();
        assert!(controller.current_status().is_terminal());

        controller.select_image(image(b"b"));
        assert_eq!(controller.current_status(), SubmissionStatus::Idle);
    }

    #[tokio::test]
    async fn test_submit_rejected_while_uploading() {
        let mock = Arc::new(MockMatchingService::new());
        let release = mock.script_analyse_gated(MockReply::matched(&["1"]));
        let controller = controller(&mock);
        controller.select_image(image(b"a"));

        let pending = tokio::spawn({
            let controller = controller.clone();
            async move { controller.submit().await }
        });
        wait_until_uploading(&controller).await;

        assert!(matches!(
            controller.submit().await,
            Err(AttendanceError::SubmissionInFlight)
        ));
        assert_eq!(mock.uploaded_images().len(), 1);

        release.send(()).unwrap();
        let settlement = pending.await.unwrap().unwrap();
        assert!(matches!(settlement, Settlement::Applied(SubmissionStatus::Succeeded(_))));
    }

    #[tokio::test]
    async fn test_late_response_of_superseded_submit_is_discarded() {
        let mock = Arc::new(MockMatchingService::new());
        let release_old = mock.script_analyse_gated(MockReply::matched(&["old"]));
        mock.script_analyse(MockReply::matched(&["new"]));
        let controller = controller(&mock);

        controller.select_image(image(b"old"));
        let old = tokio::spawn({
            let controller = controller.clone();
            async move { controller.submit().await }
        });
        wait_until_uploading(&controller).await;

        controller.select_image(image(b"new"));
        let newer = controller.submit().await.unwrap();
        assert!(matches!(newer, Settlement::Applied(_)));

        release_old.send(()).unwrap();
        assert_eq!(old.await.unwrap().unwrap(), Settlement::Superseded);
        assert_eq!(matched(&controller.current_status()), vec!["new"]);
    }

    #[tokio::test]
    async fn test_stale_response_while_newer_upload_pending() {
        let mock = Arc::new(MockMatchingService::new());
        let release_old = mock.script_analyse_gated(MockReply::server_error(500, "stale"));
        let release_new = mock.script_analyse_gated(MockReply::matched(&["7"]));
        let controller = controller(&mock);

        controller.select_image(image(b"old"));
        let old = tokio::spawn({
            let controller = controller.clone();
            async move { controller.submit().await }
        });
        wait_until_uploading(&controller).await;

        controller.select_image(image(b"new"));
        let newer = tokio::spawn({
            let controller = controller.clone();
            async move { controller.submit().await }
        });
        wait_until_uploading(&controller).await;
        while mock.uploaded_images().len() < 2 {
            tokio::task::yield_now().await;
        }

        release_old.send(()).unwrap();
        assert_eq!(old.await.unwrap().unwrap(), Settlement::Superseded);
        assert!(controller.current_status().is_uploading());

        release_new.send(()).unwrap();
        newer.await.unwrap().unwrap();
        assert_eq!(matched(&controller.current_status()), vec!["7"]);
    }

    #[tokio::test]
    async fn test_dropped_submit_does_not_stay_uploading() {
        let mock = Arc::new(MockMatchingService::new());
        let _release = mock.script_analyse_gated(MockReply::matched(&["1"]));
        let controller = controller(&mock);
        controller.select_image(image(b"a"));

        let timed_out = tokio::time::timeout(Duration::from_millis(20), controller.submit()).await;
        assert!(timed_out.is_err());

        assert_eq!(
            controller.current_status(),
            SubmissionStatus::Failed(Failure::transport())
        );
    }

    #[tokio::test]
    async fn test_persist_mode_targets_upload_endpoint() {
        let mock = Arc::new(MockMatchingService::new());
        let controller = SubmissionController::new(mock.clone(), SubmitMode::Persist);
        controller.select_image(image(b"a"));
        controller.submit().await.unwrap();

        assert!(matches!(
            mock.calls().first(),
            Some(MockCall::Analyse {
                mode: SubmitMode::Persist,
                ..
            })
        ));
        assert_eq!(mock.records().len(), 1);
        assert!(mock.records()[0].matched_roll_numbers.is_empty());
    }
}
