use std::collections::BTreeMap;

use crate::answers::ResponseData;
use crate::spec::{Page, Question, SurveyDefinition};

pub type VisibilityMap = BTreeMap<String, bool>;

/// How a `visibleIf` condition resolves. Conditions are carried on the
/// model but not evaluated, so the mode alone decides the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisibilityMode {
    #[default]
    Visible,
    Hidden,
}

impl VisibilityMode {
    fn resolve(self, condition: Option<&str>) -> bool {
        match condition {
            None => true,
            Some(_) => matches!(self, VisibilityMode::Visible),
        }
    }
}

pub fn is_page_visible(page: &Page, _answers: &ResponseData, mode: VisibilityMode) -> bool {
    mode.resolve(page.visible_if.as_deref())
}

/// An explicit `visible: false` always hides the question.
pub fn is_question_visible(
    question: &Question,
    _answers: &ResponseData,
    mode: VisibilityMode,
) -> bool {
    if question.visible == Some(false) {
        return false;
    }
    mode.resolve(question.visible_if.as_deref())
}

pub fn visible_pages<'a>(
    definition: &'a SurveyDefinition,
    answers: &ResponseData,
    mode: VisibilityMode,
) -> Vec<&'a Page> {
    definition
        .pages
        .iter()
        .filter(|page| is_page_visible(page, answers, mode))
        .collect()
}

pub fn page_questions<'a>(
    page: &'a Page,
    answers: &ResponseData,
    mode: VisibilityMode,
) -> Vec<&'a Question> {
    page.questions
        .iter()
        .filter(|question| is_question_visible(question, answers, mode))
        .collect()
}

pub fn resolve_visibility(
    page: &Page,
    answers: &ResponseData,
    mode: VisibilityMode,
) -> VisibilityMap {
    page.questions
        .iter()
        .map(|question| {
            (
                question.name.clone(),
                is_question_visible(question, answers, mode),
            )
        })
        .collect()
}

/// Names of the required questions currently visible on `page`.
pub fn required_names(page: &Page, answers: &ResponseData, mode: VisibilityMode) -> Vec<String> {
    page_questions(page, answers, mode)
        .into_iter()
        .filter(|question| question.is_required)
        .map(|question| question.name.clone())
        .collect()
}
