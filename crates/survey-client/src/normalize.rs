//! Maps loosely-shaped survey payloads onto the strict survey model.
//!
//! Malformed parts are defaulted or dropped, never reported as errors.

use serde_json::{Map, Value};
use tracing::warn;

use survey_spec::{Page, Question, QuestionKind, Survey, SurveyDefinition, SurveyStatus};

pub fn normalize_survey(raw: &Value, org_id: &str, survey_id: &str) -> Survey {
    let empty = Map::new();
    let object = raw.as_object().unwrap_or(&empty);

    let id = string_field(object, &["surveyId", "id"]).unwrap_or_else(|| survey_id.to_string());
    let status = object
        .get("status")
        .and_then(Value::as_str)
        .and_then(SurveyStatus::from_label)
        .unwrap_or_default();
    let trigger = object
        .get("triggerConfiguration")
        .filter(|value| !value.is_null())
        .and_then(|value| match serde_json::from_value(value.clone()) {
            Ok(trigger) => Some(trigger),
            Err(err) => {
                warn!(survey_id = %id, error = %err, "dropping malformed trigger configuration");
                None
            }
        });

    Survey {
        org_id: string_field(object, &["orgId"]).unwrap_or_else(|| org_id.to_string()),
        name: string_field(object, &["surveyName", "name"]).unwrap_or_default(),
        description: string_field(object, &["surveyDescription", "description"]),
        definition: normalize_definition(object.get("surveyJson")),
        theme: object.get("themeJSON").filter(|value| !value.is_null()).cloned(),
        status,
        created: object.get("created").and_then(Value::as_i64),
        trigger,
        id,
    }
}

/// Normalizes every entry of a survey list; non-array payloads yield nothing.
pub fn normalize_survey_list(raw: &Value, org_id: &str) -> Vec<Survey> {
    raw.as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| normalize_survey(item, org_id, ""))
                .collect()
        })
        .unwrap_or_default()
}

pub fn normalize_definition(raw: Option<&Value>) -> SurveyDefinition {
    // Some backends ship the definition as an encoded JSON string.
    let decoded = match raw {
        Some(Value::String(encoded)) => serde_json::from_str::<Value>(encoded).ok(),
        Some(value) => Some(value.clone()),
        None => None,
    };
    let Some(Value::Object(object)) = decoded else {
        return SurveyDefinition::default();
    };

    let pages = object
        .get("pages")
        .and_then(Value::as_array)
        .map(|pages| pages.iter().filter_map(normalize_page).collect())
        .unwrap_or_default();

    SurveyDefinition {
        title: string_field(&object, &["title"]),
        description: string_field(&object, &["description"]),
        pages,
        completed_html: string_field(&object, &["completedHtml"]),
    }
}

fn normalize_page(raw: &Value) -> Option<Page> {
    let object = raw.as_object()?;
    let questions = object
        .get("questions")
        .and_then(Value::as_array)
        .or_else(|| object.get("elements").and_then(Value::as_array))
        .map(|questions| questions.iter().filter_map(normalize_question).collect())
        .unwrap_or_default();

    Some(Page {
        name: string_field(object, &["name"]),
        title: string_field(object, &["title"]),
        description: string_field(object, &["description"]),
        questions,
        visible_if: string_field(object, &["visibleIf"]),
        enable_if: string_field(object, &["enableIf"]),
    })
}

fn normalize_question(raw: &Value) -> Option<Question> {
    let mut object = raw.as_object()?.clone();
    let Some(name) = string_field(&object, &["name"]) else {
        warn!("dropping question without a name");
        return None;
    };
    let kind = object.get("type").and_then(Value::as_str).unwrap_or_default();
    if !QuestionKind::TAGS.iter().any(|tag| *tag == kind) {
        warn!(question = %name, kind, "dropping question of unsupported type");
        return None;
    }

    object.insert("name".into(), Value::String(name.clone()));
    if string_field(&object, &["title"]).is_none() {
        object.insert("title".into(), Value::String(name.clone()));
    }
    match object.get("choices") {
        Some(Value::Array(choices)) => {
            let choices = choices.iter().filter_map(normalize_choice).collect();
            object.insert("choices".into(), Value::Array(choices));
        }
        Some(_) => {
            object.remove("choices");
        }
        None => {}
    }
    if let Some(values) = object.get("rateValues") {
        let values = match values {
            Value::Array(values) => values.iter().filter_map(rate_value).collect(),
            _ => Vec::new(),
        };
        object.insert("rateValues".into(), Value::Array(values));
    }
    coerce_fields(&mut object, &name, INTEGER_FIELDS, integer_value);
    coerce_fields(&mut object, &name, NUMBER_FIELDS, number_value);
    coerce_fields(&mut object, &name, BOOL_FIELDS, bool_value);
    coerce_fields(&mut object, &name, STRING_FIELDS, |value| {
        value.as_str().map(|_| value.clone())
    });

    // Anything still rejected loses its optional extras, never the question.
    match serde_json::from_value(Value::Object(object.clone())) {
        Ok(question) => Some(question),
        Err(err) => {
            warn!(question = %name, error = %err, "keeping only core fields of question");
            object.retain(|key, _| CORE_FIELDS.contains(&key.as_str()));
            serde_json::from_value(Value::Object(object)).ok()
        }
    }
}

const INTEGER_FIELDS: &[&str] = &["order", "maxLength", "rows", "minSelect", "maxSelect"];
const NUMBER_FIELDS: &[&str] = &["rateMin", "rateMax"];
const BOOL_FIELDS: &[&str] = &["isRequired", "visible", "hasOther", "selectAll"];
const STRING_FIELDS: &[&str] = &[
    "description",
    "visibleIf",
    "enableIf",
    "placeHolder",
    "otherText",
    "minRateDescription",
    "maxRateDescription",
];
const CORE_FIELDS: &[&str] = &[
    "type",
    "name",
    "title",
    "description",
    "isRequired",
    "visibleIf",
    "enableIf",
    "visible",
    "order",
    "choices",
    "rateValues",
    "rateMin",
    "rateMax",
];

/// Rewrites each present field with `coerce`, removing what cannot be read.
fn coerce_fields(
    object: &mut Map<String, Value>,
    question: &str,
    keys: &[&str],
    coerce: impl Fn(&Value) -> Option<Value>,
) {
    for key in keys {
        let Some(raw) = object.get(*key) else {
            continue;
        };
        if raw.is_null() {
            object.remove(*key);
            continue;
        }
        match coerce(raw) {
            Some(value) => {
                object.insert((*key).to_string(), value);
            }
            None => {
                warn!(question, field = *key, "ignoring malformed question field");
                object.remove(*key);
            }
        }
    }
}

fn number_value(raw: &Value) -> Option<Value> {
    let number = match raw {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    serde_json::Number::from_f64(number).map(Value::Number)
}

fn integer_value(raw: &Value) -> Option<Value> {
    let number = number_value(raw)?.as_f64()?;
    (number.fract() == 0.0 && number >= f64::from(i32::MIN) && number <= f64::from(i32::MAX))
        .then(|| Value::from(number as i64))
}

fn bool_value(raw: &Value) -> Option<Value> {
    match raw {
        Value::Bool(_) => Some(raw.clone()),
        Value::String(text) => match text.trim() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Rating values may be bare numbers, numeric strings or `{ value, text }` items.
fn rate_value(raw: &Value) -> Option<Value> {
    match raw {
        Value::Object(item) => number_value(item.get("value")?),
        other => number_value(other),
    }
}

/// Accepts `"value"` shorthand and numeric values for choices.
fn normalize_choice(raw: &Value) -> Option<Value> {
    let (value, text) = match raw {
        Value::String(value) => (value.clone(), None),
        Value::Number(number) => (number.to_string(), None),
        Value::Object(object) => (
            string_field(object, &["value"])?,
            string_field(object, &["text"]),
        ),
        _ => return None,
    };
    let text = text.unwrap_or_else(|| value.clone());
    Some(serde_json::json!({ "value": value, "text": text }))
}

/// First non-empty string (or number, stringified) among `keys`.
fn string_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match object.get(*key)? {
        Value::String(value) if !value.is_empty() => Some(value.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use survey_spec::{ResponseData, VisibilityMode, required_names};

    #[test]
    fn elements_replace_missing_questions() {
        let raw = json!({
            "surveyJson": {
                "pages": [
                    {
                        "name": "p1",
                        "elements": [ { "type": "text", "name": "q1", "title": "Q1" } ]
                    },
                    { "name": "p2" }
                ]
            }
        });
        let survey = normalize_survey(&raw, "7", "42");
        assert_eq!(survey.definition.pages.len(), 2);
        assert_eq!(survey.definition.pages[0].questions[0].name, "q1");
        assert!(survey.definition.pages[1].questions.is_empty());
    }

    #[test]
    fn missing_fields_fall_back_to_request() {
        let survey = normalize_survey(&json!({}), "7", "42");
        assert_eq!(survey.id, "42");
        assert_eq!(survey.org_id, "7");
        assert_eq!(survey.name, "");
        assert_eq!(survey.status, SurveyStatus::Active);
        assert!(survey.definition.pages.is_empty());
        assert!(survey.theme.is_none());
        assert!(survey.trigger.is_none());
        assert!(survey.description.is_none());
    }

    #[test]
    fn numeric_org_and_lowercase_status_are_accepted() {
        let survey = normalize_survey(
            &json!({ "surveyId": 1447, "orgId": 4145, "status": "draft" }),
            "x",
            "y",
        );
        assert_eq!(survey.id, "1447");
        assert_eq!(survey.org_id, "4145");
        assert_eq!(survey.status, SurveyStatus::Draft);
    }

    #[test]
    fn unsupported_and_nameless_questions_are_dropped() {
        let definition = normalize_definition(Some(&json!({
            "pages": [{
                "questions": [
                    { "type": "matrix", "name": "grid" },
                    { "type": "text", "title": "No name" },
                    { "type": "rating", "name": "score" }
                ]
            }]
        })));
        let questions = &definition.pages[0].questions;
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].name, "score");
        assert_eq!(questions[0].title, "score");
    }

    #[test]
    fn malformed_fields_keep_required_questions() {
        let definition = normalize_definition(Some(&json!({
            "pages": [{
                "questions": [
                    {
                        "type": "rating",
                        "name": "score",
                        "isRequired": true,
                        "rateValues": [
                            { "value": 1, "text": "Poor" },
                            { "value": "2", "text": "Fine" },
                            { "text": "No value" },
                            3
                        ]
                    },
                    { "type": "text", "name": "why", "isRequired": "true", "order": "2" },
                    {
                        "type": "comment",
                        "name": "notes",
                        "isRequired": true,
                        "rows": "many",
                        "maxLength": -5,
                        "description": { "html": "x" }
                    }
                ]
            }]
        })));
        let questions = &definition.pages[0].questions;
        assert_eq!(questions.len(), 3);
        assert!(questions.iter().all(|question| question.is_required));

        let QuestionKind::Rating(rating) = &questions[0].kind else {
            panic!("expected rating, got {:?}", questions[0].kind);
        };
        assert_eq!(rating.scale(), vec![1.0, 2.0, 3.0]);
        assert_eq!(questions[1].order, Some(2));
        assert!(questions[2].description.is_none());

        let page = Page {
            questions: questions.clone(),
            ..Page::default()
        };
        let names = required_names(&page, &ResponseData::new(), VisibilityMode::Visible);
        assert_eq!(names, vec!["score", "why", "notes"]);
    }

    #[test]
    fn string_choices_are_expanded() {
        let definition = normalize_definition(Some(&json!({
            "pages": [{
                "questions": [
                    { "type": "radiogroup", "name": "pick", "choices": ["a", { "value": 2 }] }
                ]
            }]
        })));
        let choices = definition.pages[0].questions[0].kind.choices();
        assert_eq!(choices[0].value, "a");
        assert_eq!(choices[0].text, "a");
        assert_eq!(choices[1].value, "2");
    }

    #[test]
    fn encoded_definition_is_decoded() {
        let encoded = json!({ "pages": [ { "questions": [] } ] }).to_string();
        let definition = normalize_definition(Some(&Value::String(encoded)));
        assert_eq!(definition.pages.len(), 1);
    }

    #[test]
    fn list_normalizes_each_entry() {
        let surveys = normalize_survey_list(
            &json!([
                { "id": "1", "name": "First" },
                { "surveyId": "2", "surveyName": "Second", "description": "d" }
            ]),
            "9",
        );
        assert_eq!(surveys.len(), 2);
        assert_eq!(surveys[0].name, "First");
        assert_eq!(surveys[1].id, "2");
        assert_eq!(surveys[1].org_id, "9");
        assert_eq!(surveys[1].description.as_deref(), Some("d"));
        assert!(normalize_survey_list(&json!({}), "9").is_empty());
    }
}
