use serde_json::json;

use survey_spec::spec::question::{MultiChoiceQuestion, TextQuestion};
use survey_spec::{
    AnswerValue, Page, Question, QuestionKind, REQUIRED_MESSAGE, ResponseData, Survey,
    SurveyDefinition, VisibilityMode, page_questions, required_names, validate_answers,
    validate_required, visible_pages,
};

fn fixture() -> Survey {
    serde_json::from_str(include_str!("fixtures/feedback_survey.json")).expect("deserialize")
}

fn answers(value: serde_json::Value) -> ResponseData {
    serde_json::from_value(value).expect("answers")
}

#[test]
fn required_reports_absent_null_and_empty_fields() {
    let responses = answers(json!({
        "name": "",
        "age": null,
        "city": "Lisbon"
    }));
    let result = validate_required(&responses, &["name", "age", "city", "country"]);

    assert!(!result.is_valid);
    assert_eq!(
        result.errors.keys().collect::<Vec<_>>(),
        vec!["age", "country", "name"]
    );
    assert!(
        result
            .errors
            .values()
            .all(|message| message == REQUIRED_MESSAGE)
    );
}

#[test]
fn required_passes_when_every_field_is_answered() {
    let responses = answers(json!({ "score": 0, "pick": "a" }));
    let result = validate_required(&responses, &["score", "pick"]);
    assert!(result.is_valid);
    assert!(result.errors.is_empty());
}

#[test]
fn required_accepts_empty_choice_list() {
    let responses = answers(json!({ "features": [] }));
    let result = validate_required(&responses, &["features"]);
    assert!(result.is_valid);
}

#[test]
fn required_with_no_names_is_valid() {
    let result = validate_required::<&str>(&ResponseData::new(), &[]);
    assert!(result.is_valid);
}

#[test]
fn fixture_exposes_required_questions_per_page() {
    let survey = fixture();
    let responses = ResponseData::new();
    let pages = visible_pages(&survey.definition, &responses, VisibilityMode::Visible);
    assert_eq!(pages.len(), 2);
    assert_eq!(
        required_names(pages[0], &responses, VisibilityMode::Visible),
        vec!["satisfaction"]
    );
    assert_eq!(
        required_names(pages[1], &responses, VisibilityMode::Visible),
        vec!["recommend"]
    );
}

#[test]
fn hidden_questions_are_not_required() {
    let mut hidden = Question::new("secret", "Secret", QuestionKind::Text(TextQuestion::default()))
        .required();
    hidden.visible = Some(false);
    let mut conditional = Question::new(
        "conditional",
        "Conditional",
        QuestionKind::Text(TextQuestion::default()),
    )
    .required();
    conditional.visible_if = Some("{secret} = 'yes'".into());
    let page = Page {
        questions: vec![hidden, conditional],
        ..Page::default()
    };
    let responses = ResponseData::new();

    assert_eq!(
        required_names(&page, &responses, VisibilityMode::Visible),
        vec!["conditional"]
    );
    assert!(required_names(&page, &responses, VisibilityMode::Hidden).is_empty());
    assert_eq!(page_questions(&page, &responses, VisibilityMode::Visible).len(), 1);
}

#[test]
fn conditional_pages_follow_visibility_mode() {
    let definition = SurveyDefinition {
        pages: vec![
            Page::default(),
            Page {
                visible_if: Some("{age} > 18".into()),
                ..Page::default()
            },
        ],
        ..SurveyDefinition::default()
    };
    let responses = ResponseData::new();
    assert_eq!(
        visible_pages(&definition, &responses, VisibilityMode::Visible).len(),
        2
    );
    assert_eq!(
        visible_pages(&definition, &responses, VisibilityMode::Hidden).len(),
        1
    );
}

#[test]
fn answer_report_accepts_well_formed_answers() {
    let survey = fixture();
    let responses = answers(json!({
        "satisfaction": 9,
        "email": "ana@example.com",
        "recommend": "yes",
        "features": ["feature1"],
        "suggestions": "More colors"
    }));
    let report = validate_answers(&survey.definition, &responses);
    assert!(report.valid, "{report:?}");
}

#[test]
fn answer_report_flags_shape_and_constraint_errors() {
    let survey = fixture();
    let responses = answers(json!({
        "satisfaction": 11,
        "email": "not-an-email",
        "recommend": ["yes"],
        "features": ["feature1", "feature2", "feature3"],
        "extra": "value"
    }));
    let report = validate_answers(&survey.definition, &responses);

    assert!(!report.valid);
    let codes: Vec<(&str, &str)> = report
        .errors
        .iter()
        .map(|issue| (issue.question.as_str(), issue.code.as_str()))
        .collect();
    assert_eq!(
        codes,
        vec![
            ("satisfaction", "rating_range"),
            ("email", "email_format"),
            ("recommend", "type_mismatch"),
            ("features", "max_select"),
        ]
    );
    assert_eq!(report.unknown_fields, vec!["extra"]);
    assert!(report.missing_required.is_empty());
}

#[test]
fn answer_report_lists_missing_required() {
    let survey = fixture();
    let report = validate_answers(&survey.definition, &answers(json!({ "satisfaction": "" })));
    assert_eq!(report.missing_required, vec!["satisfaction", "recommend"]);
}

#[test]
fn answer_report_rejects_unknown_choice_unless_other_allowed() {
    let mut question = MultiChoiceQuestion {
        choices: vec![survey_spec::Choice::new("a", "A")],
        ..MultiChoiceQuestion::default()
    };
    let definition = |question: MultiChoiceQuestion| SurveyDefinition {
        pages: vec![Page {
            questions: vec![Question::new("pick", "Pick", QuestionKind::MultiChoice(question))],
            ..Page::default()
        }],
        ..SurveyDefinition::default()
    };
    let mut responses = ResponseData::new();
    responses.insert("pick", AnswerValue::from(vec!["b"]));

    let report = validate_answers(&definition(question.clone()), &responses);
    assert_eq!(report.errors[0].code, "choice_mismatch");

    question.has_other = true;
    let report = validate_answers(&definition(question), &responses);
    assert!(report.valid);
}
