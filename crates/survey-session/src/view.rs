use serde::Serialize;
use serde_json::{Map, Value, json};

use survey_spec::{AnswerValue, Choice, Page, QuestionKind, Survey, VisibilityMode, page_questions};

use crate::state::{Phase, SessionState};

const DEFAULT_COMPLETION_MESSAGE: &str = "Your response has been submitted successfully.";

/// Which navigation controls the host should enable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NavigationState {
    pub can_go_next: bool,
    pub can_go_previous: bool,
    pub can_submit: bool,
}

impl NavigationState {
    pub fn for_state(state: &SessionState) -> Self {
        if state.phase() != Phase::Ready || state.total_pages == 0 {
            return Self::default();
        }
        Self {
            can_go_next: !state.is_last_page(),
            can_go_previous: !state.is_first_page(),
            can_submit: state.is_last_page(),
        }
    }
}

/// A question as the host should present it right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionView {
    pub name: String,
    pub title: String,
    pub description: Option<String>,
    pub kind: &'static str,
    pub required: bool,
    pub choices: Vec<Choice>,
    pub scale: Vec<f64>,
    pub hint: Option<String>,
    pub current_value: Option<AnswerValue>,
    pub error: Option<String>,
}

/// Render-neutral description of the current page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub survey_id: String,
    pub survey_title: String,
    pub phase: Phase,
    pub page_index: usize,
    pub total_pages: usize,
    pub page_title: Option<String>,
    pub page_description: Option<String>,
    pub progress: u8,
    pub questions: Vec<QuestionView>,
    pub navigation: NavigationState,
    pub completion_message: Option<String>,
    pub error: Option<String>,
}

pub fn build_page_view(
    survey: Option<&Survey>,
    page: Option<&Page>,
    state: &SessionState,
    mode: VisibilityMode,
) -> PageView {
    let questions = page
        .map(|page| {
            page_questions(page, &state.responses, mode)
                .into_iter()
                .map(|question| QuestionView {
                    name: question.name.clone(),
                    title: question.title.clone(),
                    description: question.description.clone(),
                    kind: question.kind.label(),
                    required: question.is_required,
                    choices: question.kind.choices().to_vec(),
                    scale: match &question.kind {
                        QuestionKind::Rating(rating) => rating.scale(),
                        _ => Vec::new(),
                    },
                    hint: question_hint(&question.kind),
                    current_value: state.responses.get(&question.name).cloned(),
                    error: state.errors.get(&question.name).cloned(),
                })
                .collect()
        })
        .unwrap_or_default();

    let completion_message = state.completed.then(|| {
        survey
            .and_then(|survey| survey.definition.completed_html.clone())
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| DEFAULT_COMPLETION_MESSAGE.to_string())
    });

    PageView {
        survey_id: survey.map(|survey| survey.id.clone()).unwrap_or_default(),
        survey_title: survey
            .map(|survey| survey.display_title().to_string())
            .unwrap_or_default(),
        phase: state.phase(),
        page_index: state.current_page_index,
        total_pages: state.total_pages,
        page_title: page.and_then(|page| page.title.clone()),
        page_description: page.and_then(|page| page.description.clone()),
        progress: state.progress(),
        questions,
        navigation: NavigationState::for_state(state),
        completion_message,
        error: state.last_error.clone(),
    }
}

fn question_hint(kind: &QuestionKind) -> Option<String> {
    match kind {
        QuestionKind::Text(text) => text.place_holder.clone(),
        QuestionKind::Comment(comment) => comment.place_holder.clone(),
        QuestionKind::SingleChoice(choice) if choice.has_other => Some(
            choice
                .other_text
                .clone()
                .unwrap_or_else(|| "Other (describe)".to_string()),
        ),
        QuestionKind::MultiChoice(choice) => match (choice.min_select, choice.max_select) {
            (Some(min), Some(max)) => Some(format!("select {min} to {max}")),
            (Some(min), None) => Some(format!("select at least {min}")),
            (None, Some(max)) => Some(format!("select up to {max}")),
            (None, None) => None,
        },
        QuestionKind::Rating(rating) => {
            match (&rating.min_rate_description, &rating.max_rate_description) {
                (Some(min), Some(max)) => Some(format!("{min} .. {max}")),
                (Some(label), None) | (None, Some(label)) => Some(label.clone()),
                (None, None) => None,
            }
        }
        _ => None,
    }
}

/// Structured JSON for hosts that draw their own widgets.
pub fn render_json_ui(view: &PageView) -> Value {
    let questions = view
        .questions
        .iter()
        .map(|question| {
            let mut map = Map::new();
            map.insert("name".into(), Value::String(question.name.clone()));
            map.insert("title".into(), Value::String(question.title.clone()));
            map.insert(
                "description".into(),
                question
                    .description
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            );
            map.insert("type".into(), Value::String(question.kind.to_string()));
            map.insert("required".into(), Value::Bool(question.required));
            if !question.choices.is_empty() {
                map.insert("choices".into(), json!(question.choices));
            }
            if !question.scale.is_empty() {
                map.insert("scale".into(), json!(question.scale));
            }
            if let Some(hint) = &question.hint {
                map.insert("hint".into(), Value::String(hint.clone()));
            }
            if let Some(value) = &question.current_value {
                map.insert("current_value".into(), json!(value));
            }
            if let Some(error) = &question.error {
                map.insert("error".into(), Value::String(error.clone()));
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    json!({
        "survey_id": view.survey_id,
        "survey_title": view.survey_title,
        "status": view.phase.as_str(),
        "page": {
            "index": view.page_index,
            "total": view.total_pages,
            "title": view.page_title,
            "description": view.page_description,
        },
        "progress": view.progress,
        "questions": questions,
        "navigation": view.navigation,
        "completion_message": view.completion_message,
        "error": view.error,
    })
}

/// Plain text rendering for terminal hosts.
pub fn render_text(view: &PageView) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Survey: {} ({})", view.survey_title, view.survey_id));

    if let Some(message) = &view.completion_message {
        lines.push("Thank you!".to_string());
        lines.push(message.clone());
        return lines.join("\n");
    }
    if view.phase == Phase::Failed {
        if let Some(error) = &view.error {
            lines.push(format!("Error: {error}"));
        }
        return lines.join("\n");
    }

    lines.push(format!(
        "Page {} of {} ({}%)",
        view.page_index + 1,
        view.total_pages,
        view.progress
    ));
    if let Some(title) = &view.page_title {
        lines.push(title.clone());
    }
    if let Some(description) = &view.page_description {
        lines.push(description.clone());
    }

    for (position, question) in view.questions.iter().enumerate() {
        let mut entry = format!("{}. {}", position + 1, question.title);
        if question.required {
            entry.push_str(" *");
        }
        lines.push(entry);
        if let Some(description) = &question.description {
            lines.push(format!("   {description}"));
        }
        for (index, choice) in question.choices.iter().enumerate() {
            lines.push(format!("   [{}] {}", index + 1, choice.text));
        }
        if let (Some(min), Some(max)) = (question.scale.first(), question.scale.last()) {
            lines.push(format!("   scale: {min} - {max}"));
        }
        if let Some(hint) = &question.hint {
            lines.push(format!("   ({hint})"));
        }
        if let Some(value) = &question.current_value {
            lines.push(format!("   = {}", value.display()));
        }
        if let Some(error) = &question.error {
            lines.push(format!("   ! {error}"));
        }
    }

    if let Some(error) = &view.error {
        lines.push(format!("Last error: {error}"));
    }
    lines.join("\n")
}
