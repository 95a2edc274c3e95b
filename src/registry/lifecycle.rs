//! Session lifecycle transition table

use crate::data::Session;

/// Lifecycle state of a session id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Absent,
    Active,
    Ended,
}

impl SessionState {
    pub fn of(session: Option<&Session>) -> Self {
        match session {
            None => Self::Absent,
            Some(s) if s.is_active => Self::Active,
            Some(_) => Self::Ended,
        }
    }
}

/// Lifecycle signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Start,
    End,
    Timeout,
}

/// What the registry must do for a (state, signal) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// absent -> active: insert a new record
    Create,
    /// active/ended -> active: overwrite the existing record (resume)
    Reactivate,
    /// active/ended -> ended: stamp end time and reason
    End,
    /// active -> ended with a synthetic end time
    TimeOut,
    /// Signal has no effect in this state
    Ignore,
    /// Signal requires a record that does not exist
    NotFound,
}

pub fn transition(state: SessionState, signal: Signal) -> Transition {
    use SessionState::*;
    use Signal::*;

    match (state, signal) {
        (Absent, Start) => Transition::Create,
        (Active | Ended, Start) => Transition::Reactivate,
        (Active | Ended, End) => Transition::End,
        (Active, Timeout) => Transition::TimeOut,
        (Ended, Timeout) => Transition::Ignore,
        (Absent, End | Timeout) => Transition::NotFound,
    }
}
