use crate::error::PlayerError;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Loading,
    Ready {
        index: usize,
        elapsed_secs: f64,
        playing: bool,
    },
    /// Every lecture finished; playback stopped.
    Completed,
    /// The course has no lectures. Terminal, not an error.
    Empty,
    /// Catalog load failed. The view offers a retry.
    Failed { error: PlayerError },
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::Ready { .. } => "ready",
            SessionState::Completed => "completed",
            SessionState::Empty => "empty",
            SessionState::Failed { .. } => "failed",
        }
    }
}

/// What an event did to the session, so the caller knows what to tell the
/// video surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Unchanged,
    Progressed { elapsed_secs: f64 },
    /// A lecture became current: on start or on an accepted selection.
    Loaded { index: usize, resume_at: f64 },
    /// `completed` finished and playback moved on to `index`.
    Advanced { completed: usize, index: usize },
    Rejected { requested: usize },
    Finished,
    Empty,
    Failed(PlayerError),
}
