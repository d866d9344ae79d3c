//! Pure state transitions. Each takes the previous snapshot and returns the next.

use std::collections::BTreeMap;

use survey_spec::AnswerValue;

use crate::state::SessionState;

pub fn begin_loading(state: &SessionState) -> SessionState {
    SessionState {
        loading: true,
        errors: BTreeMap::new(),
        last_error: None,
        ..state.clone()
    }
}

/// Survey fetched: ready at the first page, answers kept.
pub fn loaded(state: &SessionState, total_pages: usize, now: i64) -> SessionState {
    SessionState {
        current_page_index: 0,
        total_pages,
        loading: false,
        start_time: Some(now),
        end_time: None,
        last_error: None,
        ..state.clone()
    }
}

/// Fetch failed: no survey, loading cleared, answers kept.
pub fn load_failed(state: &SessionState, message: &str) -> SessionState {
    SessionState {
        current_page_index: 0,
        total_pages: 0,
        loading: false,
        start_time: None,
        last_error: Some(message.to_string()),
        ..state.clone()
    }
}

pub fn set_response(state: &SessionState, name: &str, value: AnswerValue) -> SessionState {
    let mut next = state.clone();
    next.responses.insert(name, value);
    next.errors.remove(name);
    next
}

pub fn with_errors(state: &SessionState, errors: BTreeMap<String, String>) -> SessionState {
    SessionState {
        errors,
        ..state.clone()
    }
}

pub fn advance(state: &SessionState) -> SessionState {
    let last = state.total_pages.saturating_sub(1);
    SessionState {
        current_page_index: (state.current_page_index + 1).min(last),
        errors: BTreeMap::new(),
        ..state.clone()
    }
}

/// One page back; a no-op on the first page.
pub fn retreat(state: &SessionState) -> SessionState {
    if state.current_page_index == 0 {
        return state.clone();
    }
    SessionState {
        current_page_index: state.current_page_index - 1,
        errors: BTreeMap::new(),
        ..state.clone()
    }
}

pub fn begin_submitting(state: &SessionState) -> SessionState {
    SessionState {
        submitting: true,
        last_error: None,
        ..state.clone()
    }
}

pub fn submitted(state: &SessionState, now: i64) -> SessionState {
    SessionState {
        submitting: false,
        completed: true,
        end_time: Some(now),
        ..state.clone()
    }
}

/// Submission failed; the session stays on the last page and may resubmit.
pub fn submit_failed(state: &SessionState, message: &str) -> SessionState {
    SessionState {
        submitting: false,
        last_error: Some(message.to_string()),
        ..state.clone()
    }
}

/// Drops in-flight flags after cancellation without applying any result.
pub fn abandon(state: &SessionState) -> SessionState {
    SessionState {
        loading: false,
        submitting: false,
        ..state.clone()
    }
}
