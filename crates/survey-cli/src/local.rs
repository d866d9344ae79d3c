//! File-backed stand-ins for the survey backend.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use survey_client::{
    CancellationToken, FetchError, OfflineResponse, ResponseSink, Submission, SubmissionResult,
    SurveySource, normalize_survey, now_epoch_ms,
};
use survey_spec::Survey;
use tracing::debug;

/// Serves a survey read from a local JSON file in place of the backend.
pub struct FileSource {
    path: PathBuf,
    raw: Value,
}

impl FileSource {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let raw: Value = serde_json::from_str(&contents)?;
        Ok(Self {
            path: path.to_path_buf(),
            raw,
        })
    }

    /// The file contents normalized like a fetched survey.
    pub fn survey(&self, org_id: &str, survey_id: &str) -> Result<Survey, FetchError> {
        if !self.raw.is_object() {
            return Err(FetchError::InvalidPayload {
                status: 0,
                message: format!("{} does not contain a survey object", self.path.display()),
            });
        }
        Ok(normalize_survey(&self.raw, org_id, survey_id))
    }
}

#[async_trait]
impl SurveySource for FileSource {
    async fn fetch_survey(
        &self,
        org_id: &str,
        survey_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Survey, FetchError> {
        debug!(path = %self.path.display(), "loading survey from file");
        self.survey(org_id, survey_id)
    }
}

/// Prints the submission envelope instead of sending it.
pub struct DryRunSink;

#[async_trait]
impl ResponseSink for DryRunSink {
    async fn submit_response(
        &self,
        submission: Submission,
        _cancel: &CancellationToken,
    ) -> SubmissionResult {
        let envelope = match submission.envelope() {
            Ok(envelope) => envelope,
            Err(message) => return SubmissionResult::failed(message, now_epoch_ms()),
        };
        match serde_json::to_string_pretty(&envelope) {
            Ok(pretty) => {
                println!("Dry run: POST /surveys/{}/responses", submission.survey_id);
                println!("{pretty}");
                SubmissionResult::succeeded(None, now_epoch_ms())
            }
            Err(err) => SubmissionResult::failed(err.to_string(), now_epoch_ms()),
        }
    }
}

/// Reads an offline queue file; a missing file is an empty queue.
pub fn read_queue(path: &Path) -> Result<Vec<OfflineResponse>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&contents)?)
}

pub fn write_queue(
    path: &Path,
    entries: &[OfflineResponse],
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(entries)?)?;
    Ok(())
}

/// Appends a response that could not be delivered so `sync` can replay it.
pub fn enqueue(
    path: &Path,
    submission: &Submission,
) -> Result<OfflineResponse, Box<dyn std::error::Error>> {
    let mut entries = read_queue(path)?;
    let now = now_epoch_ms();
    let mut entry = OfflineResponse::new(
        format!("offline-{now}-{}", entries.len() + 1),
        submission.survey_id.clone(),
        submission.org_id.clone(),
        submission.responses.clone(),
    );
    entry.response_properties = submission.properties.clone();
    entry.session_id = submission.session_id.clone();
    entry.status = submission.status;
    entry.timestamp = Some(now);
    entries.push(entry.clone());
    write_queue(path, &entries)?;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_client::SyncStatus;
    use tempfile::TempDir;

    #[test]
    fn queue_file_round_trips_pending_entries() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("queue").join("pending.json");
        assert!(read_queue(&path).expect("missing queue").is_empty());

        let submission = Submission::new(
            "1447",
            "4145",
            [("satisfaction", 9_i64)].into_iter().collect(),
        )
        .with_session_id("session-1");
        let first = enqueue(&path, &submission).expect("enqueue");
        enqueue(&path, &submission).expect("enqueue");

        let entries = read_queue(&path).expect("queue");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], first);
        assert_eq!(entries[0].sync_status, SyncStatus::Pending);
        assert_eq!(entries[0].session_id.as_deref(), Some("session-1"));
        assert_ne!(entries[0].id, entries[1].id);
    }

    #[test]
    fn file_source_rejects_non_object_payloads() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("survey.json");
        fs::write(&path, "[]").expect("write");
        let source = FileSource::load(&path).expect("load");
        assert!(matches!(
            source.survey("4145", "1447"),
            Err(FetchError::InvalidPayload { status: 0, .. })
        ));
    }
}
