#![allow(missing_docs)]

pub mod observer;
pub mod session;
pub mod state;
pub mod transitions;
pub mod view;

pub use observer::{Callbacks, NoopObserver, SessionObserver};
pub use session::{NextOutcome, SessionError, SurveySession};
pub use state::{Phase, SessionState};
pub use view::{
    NavigationState, PageView, QuestionView, build_page_view, render_json_ui, render_text,
};
