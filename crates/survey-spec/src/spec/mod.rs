pub mod page;
pub mod question;
pub mod survey;

pub use page::Page;
pub use question::{
    Choice, CommentQuestion, InputType, MultiChoiceQuestion, Question, QuestionKind,
    RatingQuestion, RatingType, SingleChoiceQuestion, TextQuestion,
};
pub use survey::{
    Survey, SurveyDefinition, SurveyStatus, TriggerCondition, TriggerConfiguration,
    TriggerFrequency, TriggerOperator, TriggerType,
};
