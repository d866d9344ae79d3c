#![allow(missing_docs)]

use std::time::{SystemTime, UNIX_EPOCH};

pub mod config;
pub mod error;
pub mod normalize;
pub mod offline;
pub mod responses;
pub mod retry;
pub mod surveys;
pub mod transport;

pub use config::ClientConfig;
pub use error::{ConfigError, FetchError, TransportError};
pub use normalize::{normalize_definition, normalize_survey, normalize_survey_list};
pub use offline::{MemoryQueue, OfflineQueue, OfflineResponse, SyncReport, SyncStatus};
pub use responses::{
    BatchItem, ResponseService, ResponseSink, ResponseStatus, Submission, SubmissionEnvelope,
    SubmissionResult,
};
pub use retry::{RetryPolicy, is_retriable_status};
pub use surveys::{CannedSurvey, SurveyFallback, SurveyService, SurveySource};
pub use tokio_util::sync::CancellationToken;
pub use transport::{
    ApiRequest, ApiSuccess, ConfigUpdate, HttpTransport, Method, Transport, TransportResult,
};

/// Milliseconds since the Unix epoch; 0 if the clock is before it.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
