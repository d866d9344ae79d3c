use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::page::Page;
use crate::spec::question::Question;

/// Publication status of a survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SurveyStatus {
    Draft,
    #[default]
    Active,
    Inactive,
    Deleted,
}

impl SurveyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyStatus::Draft => "DRAFT",
            SurveyStatus::Active => "ACTIVE",
            SurveyStatus::Inactive => "INACTIVE",
            SurveyStatus::Deleted => "DELETED",
        }
    }

    /// Case-insensitive parse of the wire label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Some(SurveyStatus::Draft),
            "ACTIVE" => Some(SurveyStatus::Active),
            "INACTIVE" => Some(SurveyStatus::Inactive),
            "DELETED" => Some(SurveyStatus::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    Manual,
    Automatic,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TriggerFrequency {
    Once,
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum TriggerOperator {
    Equals,
    Contains,
    GreaterThan,
    LessThan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TriggerCondition {
    pub field: String,
    pub operator: TriggerOperator,
    pub value: Value,
}

/// When and how often the host should present the survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct TriggerConfiguration {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TriggerType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<TriggerCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<TriggerFrequency>,
}

/// The page graph of a survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct SurveyDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_html: Option<String>,
}

impl SurveyDefinition {
    /// Every question across all pages, in page order.
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.pages.iter().flat_map(|page| page.questions.iter())
    }

    pub fn question(&self, name: &str) -> Option<&Question> {
        self.questions().find(|question| question.name == name)
    }
}

/// A survey as fetched for one organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Survey {
    pub id: String,
    #[serde(rename = "orgId")]
    pub org_id: String,
    #[serde(rename = "surveyName", default)]
    pub name: String,
    #[serde(
        rename = "surveyDescription",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(rename = "surveyJson", default)]
    pub definition: SurveyDefinition,
    #[serde(rename = "themeJSON", default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Value>,
    #[serde(default)]
    pub status: SurveyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(
        rename = "triggerConfiguration",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub trigger: Option<TriggerConfiguration>,
}

impl Survey {
    /// Title shown to respondents, falling back to the survey name.
    pub fn display_title(&self) -> &str {
        self.definition
            .title
            .as_deref()
            .filter(|title| !title.is_empty())
            .unwrap_or(&self.name)
    }
}
