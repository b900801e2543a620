use std::time::Duration;

/// Save status of one open document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutosaveState {
    Clean,
    Dirty,
    /// First save attempt failed; one retry is pending
    RetryScheduled { error: String },
    /// Retry failed too; stays here until a save succeeds
    Failed { error: String },
}

/// What the caller should do after reporting a save failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutosaveAction {
    ScheduleRetry(Duration),
    SurfaceError(String),
}

/// Tracks autosave outcomes: one timed retry, then a persistent error state
#[derive(Debug, Clone)]
pub struct Autosave {
    state: AutosaveState,
    retry_delay: Duration,
}

impl Autosave {
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            state: AutosaveState::Clean,
            retry_delay,
        }
    }

    pub fn state(&self) -> &AutosaveState {
        &self.state
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !matches!(self.state, AutosaveState::Clean)
    }

    /// Record an edit. A pending retry or error state is kept.
    pub fn mark_dirty(&mut self) {
        if self.state == AutosaveState::Clean {
            self.state = AutosaveState::Dirty;
        }
    }

    pub fn record_success(&mut self) {
        self.state = AutosaveState::Clean;
    }

    pub fn record_failure(&mut self, error: impl std::fmt::Display) -> AutosaveAction {
        let error = error.to_string();
        match self.state {
            AutosaveState::Clean | AutosaveState::Dirty => {
                log::warn!("Autosave failed, retrying in {:?}: {error}", self.retry_delay);
                self.state = AutosaveState::RetryScheduled {
                    error: error.clone(),
                };
                AutosaveAction::ScheduleRetry(self.retry_delay)
            }
            AutosaveState::RetryScheduled { .. } | AutosaveState::Failed { .. } => {
                log::warn!("Autosave failed again: {error}");
                self.state = AutosaveState::Failed {
                    error: error.clone(),
                };
                AutosaveAction::SurfaceError(error)
            }
        }
    }
}
