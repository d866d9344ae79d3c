use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::answers::{AnswerIssue, AnswerReport, AnswerValue, ResponseData, ResponseValidation};
use crate::spec::question::{Choice, InputType, Question, QuestionKind};
use crate::spec::survey::SurveyDefinition;
use crate::visibility::{VisibilityMode, page_questions, visible_pages};

pub const REQUIRED_MESSAGE: &str = "This field is required";

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";
const TEL_PATTERN: &str = r"^\+?[0-9 ().\-]{3,}$";

static EMAIL_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(EMAIL_PATTERN).ok());
static TEL_REGEX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(TEL_PATTERN).ok());

/// Checks that every name in `required` has a non-blank answer.
pub fn validate_required<S: AsRef<str>>(
    responses: &ResponseData,
    required: &[S],
) -> ResponseValidation {
    let errors: std::collections::BTreeMap<String, String> = required
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !responses.is_answered(name))
        .map(|name| (name.to_string(), REQUIRED_MESSAGE.to_string()))
        .collect();

    ResponseValidation {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Checks answers against the shape and constraints of every visible
/// question in `definition`.
pub fn validate_answers(definition: &SurveyDefinition, responses: &ResponseData) -> AnswerReport {
    let mut errors = Vec::new();
    let mut missing_required = Vec::new();

    for page in visible_pages(definition, responses, VisibilityMode::Visible) {
        for question in page_questions(page, responses, VisibilityMode::Visible) {
            match responses.get(&question.name) {
                Some(value) if !value.is_blank() => {
                    if let Some(error) = validate_value(question, value) {
                        errors.push(error);
                    }
                }
                _ => {
                    if question.is_required {
                        missing_required.push(question.name.clone());
                    }
                }
            }
        }
    }

    let all_names: BTreeSet<&str> = definition
        .questions()
        .map(|question| question.name.as_str())
        .collect();
    let unknown_fields: Vec<String> = responses
        .names()
        .filter(|name| !all_names.contains(name))
        .map(str::to_string)
        .collect();

    AnswerReport {
        valid: errors.is_empty() && missing_required.is_empty() && unknown_fields.is_empty(),
        errors,
        missing_required,
        unknown_fields,
    }
}

fn validate_value(question: &Question, value: &AnswerValue) -> Option<AnswerIssue> {
    match (&question.kind, value) {
        (QuestionKind::Text(text), AnswerValue::Text(answer)) => {
            check_max_length(question, answer, text.max_length)
                .or_else(|| check_input_type(question, answer, text.input_type))
        }
        (QuestionKind::Comment(comment), AnswerValue::Text(answer)) => {
            check_max_length(question, answer, comment.max_length)
        }
        (QuestionKind::SingleChoice(choice), AnswerValue::Text(answer)) => {
            if !choice.has_other && !is_choice(&choice.choices, answer) {
                return Some(issue(question, "invalid choice", "choice_mismatch"));
            }
            None
        }
        (QuestionKind::MultiChoice(choice), AnswerValue::Choices(answers)) => {
            if !choice.has_other
                && answers
                    .iter()
                    .any(|answer| !is_choice(&choice.choices, answer))
            {
                return Some(issue(question, "invalid choice", "choice_mismatch"));
            }
            if let Some(min) = choice.min_select
                && answers.len() < min
            {
                return Some(issue(question, "too few selections", "min_select"));
            }
            if let Some(max) = choice.max_select
                && answers.len() > max
            {
                return Some(issue(question, "too many selections", "max_select"));
            }
            None
        }
        (QuestionKind::Rating(rating), AnswerValue::Number(number)) => {
            if let Some((min, max)) = rating.bounds()
                && let Some(score) = number.as_f64()
                && (score < min || score > max)
            {
                return Some(issue(question, "rating outside of scale", "rating_range"));
            }
            None
        }
        _ => Some(issue(
            question,
            &format!(
                "expected {} answer, got {}",
                expected_shape(&question.kind),
                value.kind_label()
            ),
            "type_mismatch",
        )),
    }
}

fn expected_shape(kind: &QuestionKind) -> &'static str {
    match kind {
        QuestionKind::Text(_) | QuestionKind::Comment(_) | QuestionKind::SingleChoice(_) => {
            "string"
        }
        QuestionKind::MultiChoice(_) => "string list",
        QuestionKind::Rating(_) => "number",
    }
}

fn is_choice(choices: &[Choice], answer: &str) -> bool {
    choices.iter().any(|choice| choice.value == answer)
}

fn check_max_length(
    question: &Question,
    answer: &str,
    max_length: Option<usize>,
) -> Option<AnswerIssue> {
    match max_length {
        Some(max) if answer.chars().count() > max => Some(issue(
            question,
            "string longer than max length",
            "max_length",
        )),
        _ => None,
    }
}

fn check_input_type(
    question: &Question,
    answer: &str,
    input_type: Option<InputType>,
) -> Option<AnswerIssue> {
    match input_type.unwrap_or_default() {
        InputType::Text => None,
        InputType::Number => {
            if answer.trim().parse::<f64>().is_err() {
                return Some(issue(question, "value is not a number", "number_format"));
            }
            None
        }
        InputType::Email => {
            if let Some(regex) = EMAIL_REGEX.as_ref()
                && !regex.is_match(answer.trim())
            {
                return Some(issue(
                    question,
                    "value is not an email address",
                    "email_format",
                ));
            }
            None
        }
        InputType::Tel => {
            if let Some(regex) = TEL_REGEX.as_ref()
                && !regex.is_match(answer.trim())
            {
                return Some(issue(question, "value is not a phone number", "tel_format"));
            }
            None
        }
    }
}

fn issue(question: &Question, message: &str, code: &str) -> AnswerIssue {
    AnswerIssue {
        question: question.name.clone(),
        message: message.into(),
        code: code.into(),
    }
}
