use std::collections::BTreeMap;

use serde_json::Value;
use survey_client::SubmissionResult;
use survey_session::{PageView, QuestionView, render_json_ui, render_text};
use survey_spec::{AnswerValue, Choice, ResponseData};

/// Controls which bits of state the host prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: page header and question prompts only.
    Clean,
    /// Verbose output: the full page rendering before prompting.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum RenderMode {
    Text,
    Json,
}

/// Prints pages, prompts and outcomes for the `take` command.
pub struct TakePresenter {
    verbosity: Verbosity,
    format: RenderMode,
    header_printed: bool,
    show_answers_json: bool,
}

impl TakePresenter {
    pub fn new(verbosity: Verbosity, format: RenderMode, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            format,
            header_printed: false,
            show_answers_json,
        }
    }

    pub fn show_page(&mut self, view: &PageView) {
        if self.format == RenderMode::Json {
            match serde_json::to_string_pretty(&render_json_ui(view)) {
                Ok(pretty) => println!("{pretty}"),
                Err(err) => eprintln!("Failed to render page as JSON: {err}"),
            }
            return;
        }
        if self.verbosity.is_verbose() {
            println!("{}", render_text(view));
            self.header_printed = true;
            return;
        }
        if !self.header_printed {
            println!("Survey: {}", view.survey_title);
            self.header_printed = true;
        }
        let mut header = format!(
            "Page {} of {} ({}%)",
            view.page_index + 1,
            view.total_pages,
            view.progress
        );
        if let Some(title) = &view.page_title {
            header.push_str(" - ");
            header.push_str(title);
        }
        println!("{header}");
        if view.questions.is_empty() {
            println!("This page has no visible questions.");
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = format!("{}/{} {}", prompt.index, prompt.total, prompt.title);
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        println!("{line}");
        if let Some(description) = &prompt.description {
            println!("{description}");
        }
        for (index, choice) in prompt.choices.iter().enumerate() {
            println!("  [{}] {}", index + 1, choice.text);
        }
        if let Some(current) = &prompt.current {
            println!("  (enter to keep: {current})");
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {debug}");
        }
    }

    pub fn show_validation(&self, errors: &BTreeMap<String, String>) {
        eprintln!("Please fix the following before continuing:");
        for (question, message) in errors {
            eprintln!("  {question} - {message}");
        }
    }

    pub fn show_completion(
        &self,
        view: &PageView,
        result: &SubmissionResult,
        responses: &ResponseData,
    ) {
        println!("Done ✅");
        if let Some(message) = &view.completion_message {
            println!("{message}");
        }
        if let Some(response_id) = &result.response_id {
            println!("Response id: {response_id}");
        }
        if self.show_answers_json {
            match serde_json::to_string_pretty(responses) {
                Ok(pretty) => println!("{pretty}"),
                Err(err) => eprintln!("Failed to serialize answers to JSON: {err}"),
            }
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub title: String,
    pub description: Option<String>,
    pub required: bool,
    pub hint: Option<String>,
    pub choices: Vec<Choice>,
    pub current: Option<String>,
}

impl PromptContext {
    pub fn new(question: &QuestionView, index: usize, total: usize) -> Self {
        let expected = match question.kind {
            "radiogroup" => Some("(number or value)".to_string()),
            "checkbox" => Some("(comma separated)".to_string()),
            "rating" => match (question.scale.first(), question.scale.last()) {
                (Some(min), Some(max)) => Some(format!("({min}-{max})")),
                _ => Some("(number)".to_string()),
            },
            _ => None,
        };
        let hint = match (expected, &question.hint) {
            (Some(expected), Some(hint)) => Some(format!("{expected} {hint}")),
            (Some(expected), None) => Some(expected),
            (None, Some(hint)) => Some(format!("({hint})")),
            (None, None) => None,
        };
        Self {
            index: index.max(1),
            total,
            title: question.title.clone(),
            description: question.description.clone(),
            required: question.required,
            hint,
            choices: question.choices.clone(),
            current: question
                .current_value
                .as_ref()
                .map(AnswerValue::display)
                .filter(|current| !current.is_empty()),
        }
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Parses raw input for a question. Empty input leaves the answer unchanged;
/// required checks belong to the session.
pub fn parse_answer(
    question: &QuestionView,
    raw: &str,
) -> Result<Option<AnswerValue>, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value = match question.kind {
        "radiogroup" => AnswerValue::Text(parse_choice(&question.choices, raw)?),
        "checkbox" => parse_choices(&question.choices, raw)?,
        "rating" => parse_rating(&question.scale, raw)?,
        _ => AnswerValue::Text(raw.to_string()),
    };
    Ok(Some(value))
}

fn parse_choice(choices: &[Choice], raw: &str) -> Result<String, AnswerParseError> {
    if let Ok(position) = raw.parse::<usize>()
        && let Some(choice) = position.checked_sub(1).and_then(|index| choices.get(index))
    {
        return Ok(choice.value.clone());
    }
    choices
        .iter()
        .find(|choice| {
            choice.value.eq_ignore_ascii_case(raw) || choice.text.eq_ignore_ascii_case(raw)
        })
        .map(|choice| choice.value.clone())
        .ok_or_else(|| {
            let allowed = choices
                .iter()
                .map(|choice| choice.value.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            AnswerParseError::new(
                format!("Choose one of: {allowed}."),
                Some(format!("a number from 1 to {} or one of: {allowed}", choices.len())),
            )
        })
}

fn parse_choices(choices: &[Choice], raw: &str) -> Result<AnswerValue, AnswerParseError> {
    let mut selected: Vec<String> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let value = parse_choice(choices, part)?;
        if !selected.contains(&value) {
            selected.push(value);
        }
    }
    Ok(AnswerValue::Choices(selected))
}

fn parse_rating(scale: &[f64], raw: &str) -> Result<AnswerValue, AnswerParseError> {
    let value = raw.parse::<f64>().map_err(|_| {
        AnswerParseError::new("Please enter a number.", Some("expected number".to_string()))
    })?;
    if !value.is_finite() {
        return Err(AnswerParseError::new(
            "Please enter a finite number.",
            Some("number must be finite".to_string()),
        ));
    }
    if let (Some(min), Some(max)) = (scale.first(), scale.last())
        && !scale.contains(&value)
    {
        return Err(AnswerParseError::new(
            format!("Please choose a rating from {min} to {max}."),
            Some(format!("one of {scale:?}")),
        ));
    }
    if value.fract() == 0.0 {
        Ok(AnswerValue::from(value as i64))
    } else {
        Ok(AnswerValue::from(value))
    }
}

/// Reads a survey answers file: a JSON object keyed by question name.
pub fn parse_answers_file(contents: &str) -> Result<ResponseData, String> {
    let value: Value = serde_json::from_str(contents).map_err(|err| err.to_string())?;
    if !value.is_object() {
        return Err("answers file must contain a JSON object".to_string());
    }
    serde_json::from_value(value).map_err(|err| err.to_string())
}
