use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use survey_spec::{ResponseData, ResponseProperties};

use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::now_epoch_ms;
use crate::offline::{OfflineQueue, OfflineResponse, SyncReport, SyncStatus};
use crate::retry::{RetryPolicy, wait};
use crate::transport::{ApiRequest, HttpTransport, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    #[default]
    Complete,
    Incomplete,
    Partial,
}

/// Wire body of `POST /surveys/{survey_id}/responses`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionEnvelope {
    pub org_id: i64,
    pub survey_id: String,
    pub response_json: ResponseData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_properties: Option<ResponseProperties>,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Outcome of a submission. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: i64,
}

impl SubmissionResult {
    pub fn succeeded(response_id: Option<String>, timestamp: i64) -> Self {
        Self {
            success: true,
            response_id,
            error: None,
            timestamp,
        }
    }

    pub fn failed(error: impl Into<String>, timestamp: i64) -> Self {
        Self {
            success: false,
            response_id: None,
            error: Some(error.into()),
            timestamp,
        }
    }
}

/// A response ready to be submitted for one survey.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub survey_id: String,
    pub org_id: String,
    pub responses: ResponseData,
    pub properties: Option<ResponseProperties>,
    pub session_id: Option<String>,
    pub status: ResponseStatus,
}

impl Submission {
    pub fn new(
        survey_id: impl Into<String>,
        org_id: impl Into<String>,
        responses: ResponseData,
    ) -> Self {
        Self {
            survey_id: survey_id.into(),
            org_id: org_id.into(),
            responses,
            properties: None,
            session_id: None,
            status: ResponseStatus::Complete,
        }
    }

    pub fn with_properties(mut self, properties: ResponseProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_status(mut self, status: ResponseStatus) -> Self {
        self.status = status;
        self
    }

    /// Shapes the wire envelope; fails when the org id is not an integer.
    pub fn envelope(&self) -> Result<SubmissionEnvelope, String> {
        let org_id = self
            .org_id
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("invalid organization id: {:?}", self.org_id))?;
        Ok(SubmissionEnvelope {
            org_id,
            survey_id: self.survey_id.clone(),
            response_json: self.responses.clone(),
            response_properties: self.properties.clone(),
            status: self.status,
            session_id: self.session_id.clone(),
        })
    }
}

/// One entry of [`ResponseService::submit_batch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchItem {
    pub data: ResponseData,
    pub properties: Option<ResponseProperties>,
    pub session_id: Option<String>,
}

impl BatchItem {
    pub fn new(data: ResponseData) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }
}

/// Where a session delivers its completed response.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn submit_response(
        &self,
        submission: Submission,
        cancel: &CancellationToken,
    ) -> SubmissionResult;
}

/// Submits responses with bounded exponential-backoff retry.
#[derive(Clone)]
pub struct ResponseService {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl ResponseService {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(Arc::new(HttpTransport::new(config))).with_retry_policy(config.retry_policy())
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn set_retry_policy(&mut self, retry: RetryPolicy) {
        self.retry = retry;
    }

    pub async fn submit(
        &self,
        submission: &Submission,
        cancel: &CancellationToken,
    ) -> SubmissionResult {
        let envelope = match submission.envelope() {
            Ok(envelope) => envelope,
            Err(message) => {
                warn!(survey_id = %submission.survey_id, %message, "submission rejected");
                return SubmissionResult::failed(message, now_epoch_ms());
            }
        };
        let body = match serde_json::to_value(&envelope) {
            Ok(body) => body,
            Err(err) => return SubmissionResult::failed(err.to_string(), now_epoch_ms()),
        };
        let endpoint = format!("/surveys/{}/responses", submission.survey_id);

        let mut attempt = 1;
        loop {
            let request = ApiRequest::post(endpoint.clone(), body.clone());
            let err = match self.transport.request(request, cancel).await {
                Ok(success) => {
                    let response_id = response_id(&success.data);
                    info!(
                        survey_id = %submission.survey_id,
                        attempt,
                        response_id = response_id.as_deref().unwrap_or("-"),
                        "response submitted"
                    );
                    return SubmissionResult::succeeded(response_id, now_epoch_ms());
                }
                // Accepted by the server; resubmitting would duplicate the response.
                Err(TransportError::Decode { status, message }) => {
                    warn!(status, %message, "submission accepted with unreadable body");
                    return SubmissionResult::succeeded(None, now_epoch_ms());
                }
                Err(err) => err,
            };

            if err == TransportError::Cancelled {
                return SubmissionResult::failed(err.to_string(), now_epoch_ms());
            }
            let status = err.status();
            if attempt >= self.retry.max_attempts || !self.retry.should_retry(status) {
                warn!(
                    survey_id = %submission.survey_id,
                    attempt,
                    status,
                    error = %err,
                    "submission failed"
                );
                return SubmissionResult::failed(err.to_string(), now_epoch_ms());
            }

            let delay = self.retry.delay_after(attempt);
            warn!(
                attempt,
                status,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "submission failed, retrying"
            );
            if !wait(delay, cancel).await {
                return SubmissionResult::failed(
                    TransportError::Cancelled.to_string(),
                    now_epoch_ms(),
                );
            }
            attempt += 1;
        }
    }

    /// Submits each item in order; one failure does not stop the rest.
    pub async fn submit_batch(
        &self,
        survey_id: &str,
        org_id: &str,
        items: Vec<BatchItem>,
        cancel: &CancellationToken,
    ) -> Vec<SubmissionResult> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let mut submission = Submission::new(survey_id, org_id, item.data);
            submission.properties = item.properties;
            submission.session_id = item.session_id;
            results.push(self.submit(&submission, cancel).await);
        }
        results
    }

    /// Delivers queued responses in order, updating their sync bookkeeping.
    pub async fn sync_offline(
        &self,
        items: &mut [OfflineResponse],
        cancel: &CancellationToken,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        for item in items.iter_mut() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let previous = item.sync_status;
            item.sync_status = SyncStatus::Syncing;
            let result = self.submit(&item.to_submission(), cancel).await;
            if interrupted(&result, cancel) {
                item.sync_status = previous;
                report.cancelled = true;
                break;
            }
            item.record_attempt(&result, now_epoch_ms());
            report.record(result);
        }
        debug!(
            successful = report.successful,
            failed = report.failed,
            "offline sync finished"
        );
        report
    }

    /// Replays every pending entry of `queue`, writing each outcome back.
    pub async fn sync_queue(
        &self,
        queue: &dyn OfflineQueue,
        cancel: &CancellationToken,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        for mut entry in queue.pending() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let previous = entry.sync_status;
            entry.sync_status = SyncStatus::Syncing;
            queue.update(entry.clone());
            let result = self.submit(&entry.to_submission(), cancel).await;
            if interrupted(&result, cancel) {
                entry.sync_status = previous;
                queue.update(entry);
                report.cancelled = true;
                break;
            }
            entry.record_attempt(&result, now_epoch_ms());
            queue.update(entry);
            report.record(result);
        }
        if report.cancelled {
            debug!(
                successful = report.successful,
                failed = report.failed,
                "queue sync cancelled"
            );
        }
        report
    }
}

#[async_trait]
impl ResponseSink for ResponseService {
    async fn submit_response(
        &self,
        submission: Submission,
        cancel: &CancellationToken,
    ) -> SubmissionResult {
        self.submit(&submission, cancel).await
    }
}

/// A failed attempt cut short by cancellation is not a delivery attempt.
fn interrupted(result: &SubmissionResult, cancel: &CancellationToken) -> bool {
    !result.success && cancel.is_cancelled()
}

/// Server-assigned id from `id`, then `response_id`.
fn response_id(data: &Value) -> Option<String> {
    ["id", "response_id"]
        .iter()
        .find_map(|key| match data.get(*key)? {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_parses_org_id() {
        let responses: ResponseData = [("satisfaction", 8_i64)].into_iter().collect();
        let envelope = Submission::new("1447", "4145", responses)
            .with_session_id("session-1")
            .envelope()
            .expect("envelope");
        let body = serde_json::to_value(envelope).expect("json");
        assert_eq!(
            body,
            json!({
                "org_id": 4145,
                "survey_id": "1447",
                "response_json": { "satisfaction": 8 },
                "status": "COMPLETE",
                "session_id": "session-1"
            })
        );
    }

    #[test]
    fn non_numeric_org_id_is_rejected() {
        let err = Submission::new("1", "acme", ResponseData::new())
            .envelope()
            .unwrap_err();
        assert!(err.contains("acme"));
    }

    #[test]
    fn response_id_prefers_id() {
        assert_eq!(
            response_id(&json!({ "id": "r1", "response_id": "r2" })),
            Some("r1".into())
        );
        assert_eq!(response_id(&json!({ "response_id": 77 })), Some("77".into()));
        assert_eq!(
            response_id(&json!({ "id": "", "response_id": "r2" })),
            Some("r2".into())
        );
        assert_eq!(response_id(&Value::Null), None);
    }

    #[test]
    fn result_serializes_camel_case() {
        let json = serde_json::to_value(SubmissionResult::succeeded(Some("r".into()), 5))
            .expect("json");
        assert_eq!(json, json!({ "success": true, "responseId": "r", "timestamp": 5 }));
    }
}
