use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use survey_client::{
    CancellationToken, FetchError, ResponseSink, Submission, SubmissionResult, SurveySource,
    now_epoch_ms,
};
use survey_spec::{
    AnswerValue, Page, ResponseData, ResponseProperties, Survey, VisibilityMode, required_names,
    validate_required, visible_pages,
};

use crate::observer::{NoopObserver, SessionObserver};
use crate::state::{Phase, SessionState};
use crate::transitions;
use crate::view::{PageView, build_page_view};

const SUBMIT_FAILED_MESSAGE: &str = "Failed to submit response";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a load or submission is already in progress")]
    Busy,
    #[error("the survey has already been submitted")]
    Completed,
    #[error("the survey is not loaded")]
    NotLoaded,
    #[error("the survey has no visible pages")]
    NoPages,
    #[error("the session was cancelled")]
    Cancelled,
    #[error("{} required question(s) unanswered", .errors.len())]
    Validation { errors: BTreeMap<String, String> },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{0}")]
    Submission(String),
}

/// Result of a successful [`SurveySession::next_page`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextOutcome {
    Advanced,
    /// The last page was submitted.
    Submitted(SubmissionResult),
}

impl NextOutcome {
    pub fn advanced(&self) -> bool {
        matches!(self, NextOutcome::Advanced)
    }
}

/// Drives one respondent through a survey: load, page, validate, submit.
pub struct SurveySession {
    org_id: String,
    survey_id: String,
    source: Arc<dyn SurveySource>,
    sink: Arc<dyn ResponseSink>,
    observer: Arc<dyn SessionObserver>,
    visibility: VisibilityMode,
    properties: Option<ResponseProperties>,
    survey: Option<Survey>,
    pages: Vec<Page>,
    state: SessionState,
    cancel: CancellationToken,
}

impl SurveySession {
    pub fn new(
        org_id: impl Into<String>,
        survey_id: impl Into<String>,
        source: Arc<dyn SurveySource>,
        sink: Arc<dyn ResponseSink>,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            survey_id: survey_id.into(),
            source,
            sink,
            observer: Arc::new(NoopObserver),
            visibility: VisibilityMode::default(),
            properties: None,
            survey: None,
            pages: Vec::new(),
            state: SessionState::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_initial_responses(mut self, responses: ResponseData) -> Self {
        self.state = SessionState::new(responses);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_properties(mut self, properties: ResponseProperties) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_visibility(mut self, visibility: VisibilityMode) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn survey(&self) -> Option<&Survey> {
        self.survey.as_ref()
    }

    pub fn responses(&self) -> &ResponseData {
        &self.state.responses
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.state.errors
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.pages.get(self.state.current_page_index)
    }

    /// Percentage through the visible pages, counting the current one.
    pub fn progress(&self) -> u8 {
        self.state.progress()
    }

    pub fn page_view(&self) -> PageView {
        build_page_view(
            self.survey.as_ref(),
            self.current_page(),
            &self.state,
            self.visibility,
        )
    }

    /// Token observed by in-flight fetches, submissions and retry waits.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Tears the session down; later results are discarded.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.state = transitions::abandon(&self.state);
    }

    /// Loads the survey and moves to the first visible page.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.ensure_idle()?;
        if self.cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }

        self.state = transitions::begin_loading(&self.state);
        debug!(org_id = %self.org_id, survey_id = %self.survey_id, "loading survey");
        let fetched = self
            .source
            .fetch_survey(&self.org_id, &self.survey_id, &self.cancel)
            .await;
        if self.cancel.is_cancelled() {
            self.state = transitions::abandon(&self.state);
            return Err(SessionError::Cancelled);
        }

        match fetched {
            Ok(survey) => {
                let responses = &self.state.responses;
                self.pages = visible_pages(&survey.definition, responses, self.visibility)
                    .into_iter()
                    .cloned()
                    .collect();
                self.state = transitions::loaded(&self.state, self.pages.len(), now_epoch_ms());
                info!(
                    survey_id = %survey.id,
                    total_pages = self.pages.len(),
                    "survey ready"
                );
                self.survey = Some(survey);
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                warn!(survey_id = %self.survey_id, error = %message, "survey failed to load");
                self.survey = None;
                self.pages.clear();
                self.state = transitions::load_failed(&self.state, &message);
                self.observer.on_error(&message);
                Err(err.into())
            }
        }
    }

    /// Reloads the survey, keeping answers already entered.
    pub async fn retry(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
            self.state = transitions::abandon(&self.state);
        }
        self.start().await
    }

    /// Records an answer and clears its error. Ignored once the survey is submitted.
    pub fn set_response(&mut self, name: &str, value: impl Into<AnswerValue>) {
        if self.state.completed {
            debug!(question = name, "ignoring edit on a completed session");
            return;
        }
        self.state = transitions::set_response(&self.state, name, value.into());
    }

    /// Checks the required questions of the current page, storing errors on failure.
    pub fn validate_current_page(&mut self) -> bool {
        let Some(page) = self.current_page() else {
            return false;
        };
        let required = required_names(page, &self.state.responses, self.visibility);
        let validation = validate_required(&self.state.responses, &required);
        if !validation.is_valid {
            debug!(
                page = self.state.current_page_index,
                missing = validation.errors.len(),
                "page validation failed"
            );
            self.state = transitions::with_errors(&self.state, validation.errors);
            return false;
        }
        true
    }

    /// Moves forward one page, or submits when already on the last page.
    pub async fn next_page(&mut self) -> Result<NextOutcome, SessionError> {
        self.ensure_open()?;
        self.ensure_idle()?;
        self.ensure_loaded()?;
        self.ensure_page_valid()?;

        if self.state.is_last_page() {
            return self.submit_validated().await.map(NextOutcome::Submitted);
        }
        self.state = transitions::advance(&self.state);
        debug!(page = self.state.current_page_index, "advanced");
        Ok(NextOutcome::Advanced)
    }

    /// Steps back one page without validation; a no-op on the first page.
    pub fn previous_page(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.ensure_idle()?;
        self.state = transitions::retreat(&self.state);
        Ok(())
    }

    /// Validates the current page and submits every collected answer.
    pub async fn submit(&mut self) -> Result<SubmissionResult, SessionError> {
        self.ensure_open()?;
        self.ensure_idle()?;
        self.ensure_loaded()?;
        self.ensure_page_valid()?;
        self.submit_validated().await
    }

    async fn submit_validated(&mut self) -> Result<SubmissionResult, SessionError> {
        self.state = transitions::begin_submitting(&self.state);
        let mut submission = Submission::new(
            self.survey_id.clone(),
            self.org_id.clone(),
            self.state.responses.clone(),
        )
        .with_session_id(format!("session-{}", now_epoch_ms()));
        if let Some(properties) = &self.properties {
            submission = submission.with_properties(properties.clone());
        }

        let result = self.sink.submit_response(submission, &self.cancel).await;
        if self.cancel.is_cancelled() {
            self.state = transitions::abandon(&self.state);
            return Err(SessionError::Cancelled);
        }

        if result.success {
            self.state = transitions::submitted(&self.state, now_epoch_ms());
            info!(
                survey_id = %self.survey_id,
                response_id = result.response_id.as_deref().unwrap_or("-"),
                "survey completed"
            );
            self.observer.on_complete(&self.state.responses);
            Ok(result)
        } else {
            let message = result
                .error
                .clone()
                .unwrap_or_else(|| SUBMIT_FAILED_MESSAGE.to_string());
            warn!(survey_id = %self.survey_id, error = %message, "submission failed");
            self.state = transitions::submit_failed(&self.state, &message);
            self.observer.on_error(&message);
            Err(SessionError::Submission(message))
        }
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.state.completed {
            Err(SessionError::Completed)
        } else {
            Ok(())
        }
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.state.is_busy() {
            Err(SessionError::Busy)
        } else {
            Ok(())
        }
    }

    fn ensure_loaded(&self) -> Result<(), SessionError> {
        if self.survey.is_none() {
            Err(SessionError::NotLoaded)
        } else if self.pages.is_empty() {
            Err(SessionError::NoPages)
        } else {
            Ok(())
        }
    }

    fn ensure_page_valid(&mut self) -> Result<(), SessionError> {
        if self.validate_current_page() {
            Ok(())
        } else {
            Err(SessionError::Validation {
                errors: self.state.errors.clone(),
            })
        }
    }
}
