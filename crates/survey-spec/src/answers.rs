use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// A single answer. The expected variant depends on the question kind:
/// text for text/comment/single choice, choices for multi choice and
/// a number for ratings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Null,
    Number(Number),
    Text(String),
    Choices(Vec<String>),
}

impl AnswerValue {
    /// Absent-equivalent for required checks: `null` or an empty string.
    /// An empty choice list is deliberately not considered blank.
    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Null => true,
            AnswerValue::Text(text) => text.is_empty(),
            AnswerValue::Number(_) | AnswerValue::Choices(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(number) => number.as_f64(),
            _ => None,
        }
    }

    pub fn as_choices(&self) -> Option<&[String]> {
        match self {
            AnswerValue::Choices(choices) => Some(choices),
            _ => None,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            AnswerValue::Null => "null",
            AnswerValue::Number(_) => "number",
            AnswerValue::Text(_) => "string",
            AnswerValue::Choices(_) => "string list",
        }
    }

    /// Plain text rendering used by text hosts.
    pub fn display(&self) -> String {
        match self {
            AnswerValue::Null => String::new(),
            AnswerValue::Number(number) => number.to_string(),
            AnswerValue::Text(text) => text.clone(),
            AnswerValue::Choices(choices) => choices.join(", "),
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::Text(value)
    }
}

impl From<Vec<String>> for AnswerValue {
    fn from(value: Vec<String>) -> Self {
        AnswerValue::Choices(value)
    }
}

impl From<Vec<&str>> for AnswerValue {
    fn from(value: Vec<&str>) -> Self {
        AnswerValue::Choices(value.into_iter().map(str::to_string).collect())
    }
}

impl From<i64> for AnswerValue {
    fn from(value: i64) -> Self {
        AnswerValue::Number(Number::from(value))
    }
}

impl From<f64> for AnswerValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value)
            .map(AnswerValue::Number)
            .unwrap_or(AnswerValue::Null)
    }
}

/// Answers keyed by question name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseData(BTreeMap<String, AnswerValue>);

impl ResponseData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&AnswerValue> {
        self.0.get(name)
    }

    /// Stores an answer, returning the previous one.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<AnswerValue>,
    ) -> Option<AnswerValue> {
        self.0.insert(name.into(), value.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// True when the answer exists and is not blank.
    pub fn is_answered(&self, name: &str) -> bool {
        self.get(name).is_some_and(|value| !value.is_blank())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnswerValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

impl<K: Into<String>, V: Into<AnswerValue>> FromIterator<(K, V)> for ResponseData {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// Respondent metadata attached to a submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Outcome of a required-field check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseValidation {
    pub is_valid: bool,
    pub errors: BTreeMap<String, String>,
}

/// A single problem found while checking answers against a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerIssue {
    pub question: String,
    pub message: String,
    pub code: String,
}

/// Full answer check over a survey definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerReport {
    pub valid: bool,
    pub errors: Vec<AnswerIssue>,
    pub missing_required: Vec<String>,
    pub unknown_fields: Vec<String>,
}
