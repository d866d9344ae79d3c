use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use survey_spec::{ResponseData, ResponseProperties};

use crate::responses::{ResponseStatus, Submission, SubmissionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Pending,
    Syncing,
    Failed,
    Synced,
}

/// A completed response waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineResponse {
    pub id: String,
    pub survey_id: String,
    pub org_id: String,
    pub response_json: ResponseData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_properties: Option<ResponseProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_retry_at: Option<i64>,
    #[serde(default)]
    pub sync_status: SyncStatus,
}

impl OfflineResponse {
    pub fn new(
        id: impl Into<String>,
        survey_id: impl Into<String>,
        org_id: impl Into<String>,
        response_json: ResponseData,
    ) -> Self {
        Self {
            id: id.into(),
            survey_id: survey_id.into(),
            org_id: org_id.into(),
            response_json,
            response_properties: None,
            session_id: None,
            status: ResponseStatus::default(),
            timestamp: None,
            retry_count: 0,
            last_retry_at: None,
            sync_status: SyncStatus::Pending,
        }
    }

    /// Entries that still need a delivery attempt.
    pub fn needs_sync(&self) -> bool {
        matches!(self.sync_status, SyncStatus::Pending | SyncStatus::Failed)
    }

    pub fn to_submission(&self) -> Submission {
        let mut submission = Submission::new(
            self.survey_id.clone(),
            self.org_id.clone(),
            self.response_json.clone(),
        )
        .with_status(self.status);
        if let Some(properties) = &self.response_properties {
            submission = submission.with_properties(properties.clone());
        }
        if let Some(session_id) = &self.session_id {
            submission = submission.with_session_id(session_id.clone());
        }
        submission
    }

    /// Records the outcome of one delivery attempt made at `at` (epoch ms).
    pub fn record_attempt(&mut self, result: &SubmissionResult, at: i64) {
        self.retry_count += 1;
        self.last_retry_at = Some(at);
        self.sync_status = if result.success {
            SyncStatus::Synced
        } else {
            SyncStatus::Failed
        };
    }
}

/// Tally of an offline sync run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<SubmissionResult>,
    /// Set when cancellation stopped the run before every entry was tried.
    #[serde(default)]
    pub cancelled: bool,
}

impl SyncReport {
    pub fn record(&mut self, result: SubmissionResult) {
        if result.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(result);
    }
}

/// Storage for responses awaiting delivery. Persistence strategy is up to the host.
pub trait OfflineQueue: Send + Sync {
    /// Snapshot of the entries that still need syncing.
    fn pending(&self) -> Vec<OfflineResponse>;
    /// Replaces the stored entry with the same id.
    fn update(&self, entry: OfflineResponse);
}

#[derive(Debug, Default)]
pub struct MemoryQueue {
    entries: Mutex<Vec<OfflineResponse>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<OfflineResponse>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn push(&self, entry: OfflineResponse) {
        self.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<OfflineResponse> {
        self.lock().clone()
    }

    /// Drops delivered entries, returning how many were removed.
    pub fn remove_synced(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|entry| entry.sync_status != SyncStatus::Synced);
        before - entries.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<OfflineResponse>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OfflineQueue for MemoryQueue {
    fn pending(&self) -> Vec<OfflineResponse> {
        self.lock()
            .iter()
            .filter(|entry| entry.needs_sync())
            .cloned()
            .collect()
    }

    fn update(&self, entry: OfflineResponse) {
        let mut entries = self.lock();
        match entries.iter_mut().find(|existing| existing.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }
}
