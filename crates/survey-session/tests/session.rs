use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use survey_client::{
    CancellationToken, FetchError, ResponseSink, Submission, SubmissionResult, SurveySource,
    TransportError,
};
use survey_session::{
    Callbacks, NextOutcome, Phase, SessionError, SurveySession, render_json_ui, render_text,
};
use survey_spec::{ResponseData, Survey, VisibilityMode};

const FEEDBACK_SURVEY: &str = include_str!("../../survey-spec/tests/fixtures/feedback_survey.json");

/// Two pages, one required question on each.
fn two_page_survey() -> Survey {
    serde_json::from_value(json!({
        "id": "1447",
        "orgId": "4145",
        "surveyName": "Checkout",
        "surveyJson": {
            "pages": [
                { "questions": [
                    { "type": "rating", "name": "satisfaction", "title": "How satisfied?",
                      "isRequired": true, "rateMin": 0, "rateMax": 10 }
                ] },
                { "questions": [
                    { "type": "radiogroup", "name": "recommend", "title": "Recommend us?",
                      "isRequired": true,
                      "choices": [
                          { "value": "yes", "text": "Yes" },
                          { "value": "no", "text": "No" }
                      ] }
                ] }
            ]
        }
    }))
    .expect("survey")
}

/// Serves queued surveys; `None` entries fail like an unreachable server.
struct StubSource {
    surveys: Mutex<VecDeque<Option<Survey>>>,
}

impl StubSource {
    fn new(surveys: Vec<Option<Survey>>) -> Arc<Self> {
        Arc::new(Self {
            surveys: Mutex::new(surveys.into()),
        })
    }
}

#[async_trait]
impl SurveySource for StubSource {
    async fn fetch_survey(
        &self,
        _org_id: &str,
        _survey_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<Survey, FetchError> {
        self.surveys
            .lock()
            .expect("surveys")
            .pop_front()
            .flatten()
            .ok_or_else(|| TransportError::Network("connection refused".into()).into())
    }
}

#[derive(Default)]
struct StubSink {
    results: Mutex<VecDeque<SubmissionResult>>,
    submissions: Mutex<Vec<Submission>>,
    cancel_on_submit: Mutex<Option<CancellationToken>>,
    hang: bool,
}

impl StubSink {
    fn new(results: Vec<SubmissionResult>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            ..Self::default()
        })
    }

    fn hanging() -> Arc<Self> {
        Arc::new(Self {
            hang: true,
            ..Self::default()
        })
    }

    fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().expect("submissions").clone()
    }
}

#[async_trait]
impl ResponseSink for StubSink {
    async fn submit_response(
        &self,
        submission: Submission,
        _cancel: &CancellationToken,
    ) -> SubmissionResult {
        self.submissions.lock().expect("submissions").push(submission);
        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(token) = self.cancel_on_submit.lock().expect("token").take() {
            token.cancel();
        }
        self.results
            .lock()
            .expect("results")
            .pop_front()
            .unwrap_or_else(|| SubmissionResult::failed("no scripted result", 0))
    }
}

#[derive(Default)]
struct Recorded {
    completed: Mutex<Vec<ResponseData>>,
    errors: Mutex<Vec<String>>,
}

fn recording_observer(recorded: &Arc<Recorded>) -> Arc<Callbacks> {
    let on_complete = recorded.clone();
    let on_error = recorded.clone();
    Arc::new(
        Callbacks::new()
            .with_on_complete(move |responses| {
                on_complete
                    .completed
                    .lock()
                    .expect("completed")
                    .push(responses.clone());
            })
            .with_on_error(move |message| {
                on_error
                    .errors
                    .lock()
                    .expect("errors")
                    .push(message.to_string());
            }),
    )
}

#[tokio::test]
async fn end_to_end_two_page_flow() {
    let sink = StubSink::new(vec![SubmissionResult::succeeded(Some("r-1".into()), 1)]);
    let recorded = Arc::new(Recorded::default());
    let mut session = SurveySession::new(
        "4145",
        "1447",
        StubSource::new(vec![Some(two_page_survey())]),
        sink.clone(),
    )
    .with_observer(recording_observer(&recorded));
    assert_eq!(session.phase(), Phase::Idle);

    session.start().await.expect("start");
    assert_eq!(session.phase(), Phase::Ready);
    assert_eq!(session.state().total_pages, 2);
    assert_eq!(session.state().current_page_index, 0);
    assert_eq!(session.progress(), 50);

    session.set_response("satisfaction", 9_i64);
    let outcome = session.next_page().await.expect("advance");
    assert!(outcome.advanced());
    assert_eq!(session.state().current_page_index, 1);
    assert_eq!(session.progress(), 100);

    let err = session.submit().await.unwrap_err();
    assert!(matches!(err, SessionError::Validation { .. }));
    assert_eq!(session.state().current_page_index, 1);
    assert!(!session.state().submitting);
    assert_eq!(
        session.errors().get("recommend").map(String::as_str),
        Some("This field is required")
    );
    assert!(sink.submissions().is_empty());

    session.set_response("recommend", "yes");
    assert!(session.errors().is_empty());
    let result = session.submit().await.expect("submit");
    assert_eq!(result.response_id.as_deref(), Some("r-1"));
    assert_eq!(session.phase(), Phase::Completed);
    assert!(session.state().end_time.is_some());

    let completed = recorded.completed.lock().expect("completed");
    assert_eq!(completed.len(), 1);
    assert!(completed[0].contains("satisfaction"));
    assert!(completed[0].contains("recommend"));

    let submission = &sink.submissions()[0];
    assert_eq!(submission.org_id, "4145");
    assert_eq!(submission.survey_id, "1447");
    assert!(
        submission
            .session_id
            .as_deref()
            .is_some_and(|id| id.starts_with("session-"))
    );
}

#[tokio::test]
async fn next_page_blocks_on_missing_required_answer() {
    let mut session = SurveySession::new(
        "4145",
        "1447",
        StubSource::new(vec![Some(two_page_survey())]),
        StubSink::new(vec![]),
    );
    session.start().await.expect("start");

    let err = session.next_page().await.unwrap_err();
    let SessionError::Validation { errors } = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(session.state().current_page_index, 0);
    assert!(!session.validate_current_page());
}

#[tokio::test]
async fn next_page_on_last_page_submits() {
    let sink = StubSink::new(vec![SubmissionResult::succeeded(None, 1)]);
    let mut session = SurveySession::new(
        "4145",
        "1447",
        StubSource::new(vec![Some(two_page_survey())]),
        sink.clone(),
    )
    .with_initial_responses(
        [("satisfaction", "7"), ("recommend", "no")]
            .into_iter()
            .collect(),
    );
    session.start().await.expect("start");

    assert_eq!(session.next_page().await.expect("advance"), NextOutcome::Advanced);
    let outcome = session.next_page().await.expect("submit");
    assert!(matches!(outcome, NextOutcome::Submitted(ref result) if result.success));
    assert!(!outcome.advanced());
    assert_eq!(sink.submissions().len(), 1);

    assert!(matches!(
        session.next_page().await,
        Err(SessionError::Completed)
    ));
    assert!(matches!(session.previous_page(), Err(SessionError::Completed)));
    session.set_response("recommend", "yes");
    assert_eq!(
        session.responses().get("recommend").and_then(|value| value.as_str()),
        Some("no")
    );
}

#[tokio::test]
async fn previous_page_is_idempotent_at_first_page() {
    let mut session = SurveySession::new(
        "4145",
        "1447",
        StubSource::new(vec![Some(two_page_survey())]),
        StubSink::new(vec![]),
    );
    session.start().await.expect("start");
    session.previous_page().expect("back");
    assert_eq!(session.state().current_page_index, 0);

    session.set_response("satisfaction", 3_i64);
    session.next_page().await.expect("advance");
    session.submit().await.unwrap_err();
    assert!(!session.errors().is_empty());
    session.previous_page().expect("back");
    assert_eq!(session.state().current_page_index, 0);
    assert!(session.errors().is_empty());
}

#[tokio::test]
async fn failed_load_reports_and_retry_keeps_answers() {
    let recorded = Arc::new(Recorded::default());
    let mut session = SurveySession::new(
        "4145",
        "1447",
        StubSource::new(vec![None, Some(two_page_survey())]),
        StubSink::new(vec![]),
    )
    .with_observer(recording_observer(&recorded))
    .with_initial_responses([("satisfaction", 5_i64)].into_iter().collect());

    let err = session.start().await.unwrap_err();
    assert!(matches!(err, SessionError::Fetch(_)));
    assert_eq!(session.phase(), Phase::Failed);
    assert!(session.survey().is_none());
    assert!(!session.state().loading);
    assert_eq!(
        *recorded.errors.lock().expect("errors"),
        vec!["connection refused".to_string()]
    );
    assert!(matches!(
        session.next_page().await,
        Err(SessionError::NotLoaded)
    ));

    session.retry().await.expect("retry");
    assert_eq!(session.phase(), Phase::Ready);
    assert!(session.responses().contains("satisfaction"));
    assert!(session.next_page().await.expect("advance").advanced());
}

#[tokio::test]
async fn failed_submission_stays_retriable() {
    let recorded = Arc::new(Recorded::default());
    let sink = StubSink::new(vec![
        SubmissionResult::failed("HTTP error! status: 503", 1),
        SubmissionResult::succeeded(Some("r-2".into()), 2),
    ]);
    let mut session = SurveySession::new(
        "4145",
        "1447",
        StubSource::new(vec![Some(two_page_survey())]),
        sink.clone(),
    )
    .with_observer(recording_observer(&recorded))
    .with_initial_responses(
        [("satisfaction", "8"), ("recommend", "yes")]
            .into_iter()
            .collect(),
    );
    session.start().await.expect("start");
    session.next_page().await.expect("advance");

    let err = session.submit().await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP error! status: 503");
    assert_eq!(session.phase(), Phase::Ready);
    assert_eq!(
        session.state().last_error.as_deref(),
        Some("HTTP error! status: 503")
    );
    assert_eq!(recorded.errors.lock().expect("errors").len(), 1);

    session.submit().await.expect("resubmit");
    assert_eq!(session.phase(), Phase::Completed);
    assert_eq!(sink.submissions().len(), 2);
}

#[tokio::test]
async fn cancelled_submission_discards_result() {
    let recorded = Arc::new(Recorded::default());
    let sink = StubSink::new(vec![SubmissionResult::succeeded(Some("late".into()), 1)]);
    let mut session = SurveySession::new(
        "4145",
        "1447",
        StubSource::new(vec![Some(two_page_survey())]),
        sink.clone(),
    )
    .with_observer(recording_observer(&recorded))
    .with_initial_responses(
        [("satisfaction", "8"), ("recommend", "yes")]
            .into_iter()
            .collect(),
    );
    session.start().await.expect("start");
    session.next_page().await.expect("advance");
    *sink.cancel_on_submit.lock().expect("token") = Some(session.cancellation_token());

    let err = session.submit().await.unwrap_err();
    assert!(matches!(err, SessionError::Cancelled));
    assert!(!session.state().completed);
    assert!(!session.state().submitting);
    assert!(recorded.completed.lock().expect("completed").is_empty());
    assert!(recorded.errors.lock().expect("errors").is_empty());
    assert!(matches!(session.start().await, Err(SessionError::Cancelled)));
}

#[tokio::test(start_paused = true)]
async fn abandoned_submission_leaves_session_busy_until_cancelled() {
    let mut session = SurveySession::new(
        "4145",
        "1447",
        StubSource::new(vec![Some(two_page_survey()), Some(two_page_survey())]),
        StubSink::hanging(),
    )
    .with_initial_responses(
        [("satisfaction", "8"), ("recommend", "yes")]
            .into_iter()
            .collect(),
    );
    session.start().await.expect("start");
    session.next_page().await.expect("advance");

    let pending = tokio::time::timeout(Duration::from_secs(5), session.submit()).await;
    assert!(pending.is_err());
    assert_eq!(session.phase(), Phase::Submitting);
    assert!(matches!(session.submit().await, Err(SessionError::Busy)));
    assert!(matches!(session.next_page().await, Err(SessionError::Busy)));
    assert!(matches!(session.start().await, Err(SessionError::Busy)));

    session.cancel();
    assert_eq!(session.phase(), Phase::Ready);
    session.retry().await.expect("retry");
    assert_eq!(session.phase(), Phase::Ready);
    assert_eq!(session.state().current_page_index, 0);
}

#[tokio::test]
async fn hidden_mode_skips_conditional_pages() {
    let mut survey: Survey = serde_json::from_str(FEEDBACK_SURVEY).expect("fixture");
    survey.definition.pages[1].visible_if = Some("{satisfaction} < 5".into());
    let mut session = SurveySession::new(
        "4145",
        "1447",
        StubSource::new(vec![Some(survey)]),
        StubSink::new(vec![]),
    )
    .with_visibility(VisibilityMode::Hidden);

    session.start().await.expect("start");
    assert_eq!(session.state().total_pages, 1);
    assert_eq!(session.progress(), 100);
}

#[tokio::test]
async fn survey_without_visible_pages_reports_no_pages() {
    let mut survey = two_page_survey();
    for page in &mut survey.definition.pages {
        page.visible_if = Some("{consent} = true".into());
    }
    let sink = StubSink::new(vec![]);
    let mut session = SurveySession::new(
        "4145",
        "1447",
        StubSource::new(vec![Some(survey)]),
        sink.clone(),
    )
    .with_visibility(VisibilityMode::Hidden);

    session.start().await.expect("start");
    assert_eq!(session.phase(), Phase::Ready);
    assert_eq!(session.state().total_pages, 0);
    assert!(matches!(
        session.next_page().await,
        Err(SessionError::NoPages)
    ));
    assert!(matches!(session.submit().await, Err(SessionError::NoPages)));
    assert!(sink.submissions().is_empty());
}

#[tokio::test]
async fn page_view_reflects_state() {
    let survey: Survey = serde_json::from_str(FEEDBACK_SURVEY).expect("fixture");
    let mut session = SurveySession::new(
        "4145",
        "1447",
        StubSource::new(vec![Some(survey)]),
        StubSink::new(vec![SubmissionResult::succeeded(None, 1)]),
    );
    session.start().await.expect("start");
    session.next_page().await.unwrap_err();

    let view = session.page_view();
    assert_eq!(view.survey_title, "Product Feedback Survey");
    assert_eq!(view.page_title.as_deref(), Some("Product Experience"));
    assert_eq!(view.questions.len(), 2);
    assert_eq!(view.questions[0].scale.len(), 11);
    assert_eq!(
        view.questions[0].error.as_deref(),
        Some("This field is required")
    );
    assert!(view.navigation.can_go_next);
    assert!(!view.navigation.can_go_previous);
    assert!(!view.navigation.can_submit);

    let text = render_text(&view);
    assert!(text.contains("Page 1 of 2 (50%)"));
    assert!(text.contains("How satisfied are you with our product? *"));
    assert!(text.contains("! This field is required"));

    session.set_response("satisfaction", 10_i64);
    session.next_page().await.expect("advance");
    session.set_response("recommend", "maybe");
    let json = render_json_ui(&session.page_view());
    assert_eq!(json["status"], "ready");
    assert_eq!(json["page"]["index"], 1);
    assert_eq!(json["navigation"]["can_submit"], true);
    assert_eq!(json["questions"][0]["type"], "radiogroup");
    assert_eq!(json["questions"][0]["current_value"], "maybe");
    assert_eq!(json["questions"][1]["hint"], "select up to 2");

    session.submit().await.expect("submit");
    let text = render_text(&session.page_view());
    assert!(text.contains("Thank you for your feedback!"));
}
