use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const MAX_SCALE_STEPS: usize = 101;

/// A selectable option of a choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Choice {
    pub value: String,
    pub text: String,
}

impl Choice {
    pub fn new(value: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            text: text.into(),
        }
    }
}

/// Input hint for single-line text questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Email,
    Number,
    Tel,
}

/// Well-known rating scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RatingType {
    Nps,
    Csat,
    Ces,
}

impl RatingType {
    /// Default scale for the rating type.
    pub fn scale(self) -> Vec<f64> {
        let (min, max) = match self {
            RatingType::Nps => (0, 10),
            RatingType::Csat => (1, 5),
            RatingType::Ces => (1, 7),
        };
        (min..=max).map(f64::from).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct TextQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_holder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<InputType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommentQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_holder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct SingleChoiceQuestion {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub has_other: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct MultiChoiceQuestion {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub has_other: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_text: Option<String>,
    #[serde(default)]
    pub select_all: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_select: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_select: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct RatingQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_type: Option<RatingType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rate_values: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rate_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rate_description: Option<String>,
}

impl RatingQuestion {
    /// Selectable values, preferring explicit `rate_values`, then the
    /// `rate_min..=rate_max` range, then the rating type's scale.
    pub fn scale(&self) -> Vec<f64> {
        if !self.rate_values.is_empty() {
            return self.rate_values.clone();
        }
        let fallback = self.rating_type.map(RatingType::scale).unwrap_or_else(|| {
            (1..=5).map(f64::from).collect()
        });
        match (self.rate_min, self.rate_max) {
            (None, None) => fallback,
            (min, max) => {
                let min = min.or_else(|| fallback.first().copied()).unwrap_or(1.0);
                let max = max.or_else(|| fallback.last().copied()).unwrap_or(5.0);
                let mut values = Vec::new();
                let mut current = min;
                while current <= max && values.len() < MAX_SCALE_STEPS {
                    values.push(current);
                    current += 1.0;
                }
                values
            }
        }
    }

    /// Inclusive lower and upper bound of the scale.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        let scale = self.scale();
        let min = scale.iter().copied().reduce(f64::min)?;
        let max = scale.iter().copied().reduce(f64::max)?;
        Some((min, max))
    }
}

/// Variant-specific part of a question, tagged by the wire `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum QuestionKind {
    #[serde(rename = "text")]
    Text(TextQuestion),
    #[serde(rename = "comment")]
    Comment(CommentQuestion),
    #[serde(rename = "radiogroup")]
    SingleChoice(SingleChoiceQuestion),
    #[serde(rename = "checkbox")]
    MultiChoice(MultiChoiceQuestion),
    #[serde(rename = "rating")]
    Rating(RatingQuestion),
}

impl QuestionKind {
    /// Wire tags accepted by [`QuestionKind`].
    pub const TAGS: [&'static str; 5] = ["text", "comment", "radiogroup", "checkbox", "rating"];

    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::Text(_) => "text",
            QuestionKind::Comment(_) => "comment",
            QuestionKind::SingleChoice(_) => "radiogroup",
            QuestionKind::MultiChoice(_) => "checkbox",
            QuestionKind::Rating(_) => "rating",
        }
    }

    pub fn choices(&self) -> &[Choice] {
        match self {
            QuestionKind::SingleChoice(question) => &question.choices,
            QuestionKind::MultiChoice(question) => &question.choices,
            _ => &[],
        }
    }
}

/// A single question as it appears on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_if: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_if: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    pub fn new(name: impl Into<String>, title: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: None,
            is_required: false,
            visible_if: None,
            enable_if: None,
            visible: None,
            order: None,
            kind,
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }
}
