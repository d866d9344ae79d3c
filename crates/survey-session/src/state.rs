use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use survey_spec::{ResponseData, calculate_progress, response_duration_secs};

/// Coarse lifecycle position derived from the state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Not started yet.
    Idle,
    Loading,
    Ready,
    Submitting,
    Completed,
    /// The survey could not be loaded; only a retry leaves this phase.
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Loading => "loading",
            Phase::Ready => "ready",
            Phase::Submitting => "submitting",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        }
    }
}

/// Snapshot of one respondent's progress through a survey.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub current_page_index: usize,
    pub total_pages: usize,
    pub responses: ResponseData,
    pub errors: BTreeMap<String, String>,
    pub loading: bool,
    pub submitting: bool,
    pub completed: bool,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn new(responses: ResponseData) -> Self {
        Self {
            responses,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> Phase {
        if self.completed {
            Phase::Completed
        } else if self.submitting {
            Phase::Submitting
        } else if self.loading {
            Phase::Loading
        } else if self.start_time.is_some() {
            Phase::Ready
        } else if self.last_error.is_some() {
            Phase::Failed
        } else {
            Phase::Idle
        }
    }

    pub fn is_busy(&self) -> bool {
        self.loading || self.submitting
    }

    pub fn progress(&self) -> u8 {
        calculate_progress(self.current_page_index, self.total_pages)
    }

    pub fn is_first_page(&self) -> bool {
        self.current_page_index == 0
    }

    pub fn is_last_page(&self) -> bool {
        self.current_page_index + 1 >= self.total_pages
    }

    /// Whole seconds from load to completion.
    pub fn duration_secs(&self) -> Option<i64> {
        response_duration_secs(self.start_time, self.end_time)
    }
}
