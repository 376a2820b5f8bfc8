//! HTTP client for the matching service.
//!
//! ## Features
//!
//! - Multipart uploads for submissions and roster registrations
//! - Tagged decoding of every answer (see [`Reply`](crate::wire::Reply))
//! - Automatic retry with exponential backoff for idempotent reads only;
//!   submissions and roster mutations are sent exactly once
//! - Full observability with tracing instrumentation

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{MatchingService, SubmitMode};
use crate::config::{
    ClientConfig, INITIAL_RETRY_INTERVAL, MAX_RETRY_INTERVAL, READ_RETRY_BUDGET, REQUEST_TIMEOUT,
};
use crate::error::{AttendanceError, Result};
use crate::model::{ImageUpload, MatchResult, NewStudent, RollNumber, Student};
use crate::wire::{
    AnalyseBody, HistoryRecord, MessageBody, PersistBody, Reply, ResultsBody, StudentsBody,
};

/// File name sent when the selection carries none.
const DEFAULT_FILE_NAME: &str = "image";

/// Matching service reached over HTTP.
pub struct HttpMatchingService {
    client: Client,
    config: ClientConfig,
}

impl HttpMatchingService {
    /// Create a client for the service described by `config`.
    #[instrument(level = "debug", skip_all, fields(
        server_url = %config.server_url,
        api_prefix = %config.api_prefix,
        timeout_ms = REQUEST_TIMEOUT.as_millis() as u64
    ))]
    pub fn new(config: ClientConfig) -> Result<Self> {
        debug!("Creating matching service client");

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                warn!(error = %e, "Failed to create HTTP client");
                AttendanceError::Transport(format!("Failed to create HTTP client: {e}"))
            })?;

        info!("Matching service client created");
        Ok(Self { client, config })
    }

    /// Create a client configured from the environment.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: INITIAL_RETRY_INTERVAL,
            max_interval: MAX_RETRY_INTERVAL,
            max_elapsed_time: Some(READ_RETRY_BUDGET),
            ..Default::default()
        }
    }

    /// GET a JSON document, retrying transient failures.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        retry_notify(
            self.build_backoff(),
            || async { self.get_once(&url).await },
            |err: AttendanceError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &Url,
    ) -> std::result::Result<T, backoff::Error<AttendanceError>> {
        let start = Instant::now();

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if is_transient_error(&e) {
                warn!(error = %e, latency_ms, "Transient error, will retry");
                backoff::Error::transient(AttendanceError::Transport(e.to_string()))
            } else {
                warn!(error = %e, latency_ms, "Permanent error, aborting");
                backoff::Error::permanent(AttendanceError::Transport(e.to_string()))
            }
        })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        let body = response.bytes().await.map_err(|e| {
            warn!(error = %e, "Failed to read response body");
            backoff::Error::permanent(AttendanceError::Transport(e.to_string()))
        })?;

        let result = Reply::decode(status.as_u16(), &body).and_then(Reply::into_result);
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(data) => {
                debug!(latency_ms, "Request completed successfully");
                Ok(data)
            }
            Err(err) if is_transient_status(status) => {
                warn!(status = %status, latency_ms, "Transient HTTP status, will retry");
                Err(backoff::Error::transient(err))
            }
            Err(err) => {
                warn!(status = %status, latency_ms, error = %err, "Request failed");
                Err(backoff::Error::permanent(err))
            }
        }
    }

    /// Send a non-idempotent request exactly once and decode its answer.
    async fn send_once<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let start = Instant::now();

        let response = request.send().await.map_err(|e| {
            warn!(
                error = %e,
                latency_ms = start.elapsed().as_millis() as u64,
                "Request failed before a response arrived"
            );
            AttendanceError::Transport(e.to_string())
        })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        let body = response.bytes().await.map_err(|e| {
            warn!(error = %e, "Failed to read response body");
            AttendanceError::Transport(e.to_string())
        })?;

        let result = Reply::decode(status.as_u16(), &body).and_then(Reply::into_result);
        let latency_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(latency_ms, "Request completed successfully"),
            Err(e) => warn!(status = %status, latency_ms, error = %e, "Request failed"),
        }
        result
    }
}

/// Multipart part carrying the image bytes as-is.
fn image_part(image: &ImageUpload) -> Part {
    let file_name = image.file_name().unwrap_or(DEFAULT_FILE_NAME).to_string();
    let part = || Part::bytes(image.bytes().to_vec()).file_name(file_name.clone());

    match image.content_type() {
        Some(content_type) => part().mime_str(content_type).unwrap_or_else(|e| {
            warn!(content_type, error = %e, "Ignoring unparseable content type");
            part()
        }),
        None => part(),
    }
}

#[async_trait]
impl MatchingService for HttpMatchingService {
    #[instrument(level = "info", skip(self, image), fields(
        endpoint = mode.path(),
        bytes = image.len()
    ))]
    async fn analyse(&self, image: &ImageUpload, mode: SubmitMode) -> Result<MatchResult> {
        let url = self.config.endpoint(&[mode.path()])?;
        let form = Form::new().part("image", image_part(image));

        let request = self.client.post(url).multipart(form);
        let result = match mode {
            SubmitMode::Analyse => MatchResult::from(self.send_once::<AnalyseBody>(request).await?),
            SubmitMode::Persist => MatchResult::from(self.send_once::<PersistBody>(request).await?),
        };

        info!(matched = result.matched_roll_numbers.len(), "Image analysed");
        Ok(result)
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_students(&self) -> Result<Vec<Student>> {
        let url = self.config.endpoint(&["students"])?;
        let body: StudentsBody = self.get_json(url).await?;
        Ok(body.into_students())
    }

    #[instrument(level = "info", skip(self, student), fields(roll_number = %student.roll_number))]
    async fn add_student(&self, student: &NewStudent) -> Result<String> {
        let url = self.config.endpoint(&["students"])?;
        let form = Form::new()
            .text("name", student.name.clone())
            .text("roll_number", student.roll_number.to_string())
            .part("image", image_part(&student.image));

        let body: MessageBody = self.send_once(self.client.post(url).multipart(form)).await?;
        Ok(body
            .message
            .unwrap_or_else(|| "Student registered successfully".to_string()))
    }

    #[instrument(level = "info", skip(self), fields(roll_number = %roll_number))]
    async fn delete_student(&self, roll_number: &RollNumber) -> Result<String> {
        let url = self.config.endpoint(&["students", roll_number.as_str()])?;
        let body: MessageBody = self.send_once(self.client.delete(url)).await?;
        Ok(body
            .message
            .unwrap_or_else(|| "Student deleted successfully".to_string()))
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_results(&self) -> Result<Vec<HistoryRecord>> {
        let url = self.config.endpoint(&["results"])?;
        let body: ResultsBody = self.get_json(url).await?;
        Ok(body.data)
    }

    fn describe(&self) -> String {
        self.config.server_url.to_string()
    }
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
