use std::fmt;

use serde::{Deserialize, Serialize};

use super::WorkerError;

/// Per-instance worker state. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    #[default]
    Parsed,
    Installing,
    /// Installed and waiting for the previous version to let go.
    Installed,
    Activating,
    /// Controlling pages.
    Activated,
    /// Install failed or superseded. Terminal.
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }

    pub fn can_transition_to(&self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Parsed, Installing)
                | (Installing, Installed)
                | (Installing, Redundant)
                | (Installed, Activating)
                | (Activating, Activated)
                | (Installed, Redundant)
                | (Activated, Redundant)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State machine plus the skip-waiting flag.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    state: WorkerState,
    skip_waiting: bool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a state recorded by the host.
    pub fn resume(state: WorkerState) -> Self {
        Self {
            state,
            skip_waiting: false,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn transition(&mut self, next: WorkerState) -> Result<(), WorkerError> {
        if self.state.can_transition_to(next) {
            self.state = next;
            Ok(())
        } else {
            Err(WorkerError::InvalidTransition {
                from: self.state,
                to: next,
            })
        }
    }

    pub fn set_skip_waiting(&mut self) {
        self.skip_waiting = true;
    }

    pub fn skip_waiting(&self) -> bool {
        self.skip_waiting
    }

    pub fn is_controlling(&self) -> bool {
        self.state == WorkerState::Activated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut lc = Lifecycle::new();
        for next in [
            WorkerState::Installing,
            WorkerState::Installed,
            WorkerState::Activating,
            WorkerState::Activated,
        ] {
            lc.transition(next).unwrap();
        }
        assert!(lc.is_controlling());
    }

    #[test]
    fn test_activate_requires_installed() {
        let mut lc = Lifecycle::new();
        let err = lc.transition(WorkerState::Activating).unwrap_err();
        assert!(matches!(
            err,
            WorkerError::InvalidTransition {
                from: WorkerState::Parsed,
                to: WorkerState::Activating
            }
        ));
    }

    #[test]
    fn test_redundant_is_terminal() {
        let mut lc = Lifecycle::new();
        lc.transition(WorkerState::Installing).unwrap();
        lc.transition(WorkerState::Redundant).unwrap();
        assert!(lc.transition(WorkerState::Installing).is_err());
        assert!(lc.transition(WorkerState::Installed).is_err());
    }

    #[test]
    fn test_no_transition_back() {
        let mut lc = Lifecycle::resume(WorkerState::Activated);
        assert!(lc.transition(WorkerState::Installed).is_err());
        assert!(lc.transition(WorkerState::Activating).is_err());
    }

    #[test]
    fn test_skip_waiting_flag() {
        let mut lc = Lifecycle::new();
        assert!(!lc.skip_waiting());
        lc.set_skip_waiting();
        assert!(lc.skip_waiting());
    }
}
