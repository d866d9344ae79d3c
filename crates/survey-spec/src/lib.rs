#![allow(missing_docs)]

pub mod answers;
pub mod progress;
pub mod spec;
pub mod validate;
pub mod visibility;

pub use answers::{
    AnswerIssue, AnswerReport, AnswerValue, ResponseData, ResponseProperties, ResponseValidation,
};
pub use progress::{calculate_progress, response_duration_secs};
pub use spec::{
    Choice, Page, Question, QuestionKind, Survey, SurveyDefinition, SurveyStatus,
};
pub use validate::{REQUIRED_MESSAGE, validate_answers, validate_required};
pub use visibility::{
    VisibilityMap, VisibilityMode, is_page_visible, is_question_visible, page_questions,
    required_names, resolve_visibility, visible_pages,
};
