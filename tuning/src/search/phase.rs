//! Search phases: explicit states and legal transition guards.
//!
//! Every search starts in `Bracketing`, moves to `Refining` exactly once and
//! ends in `Done`. The log of transitions is kept with the step count at which
//! each happened so a report can show where the breadth-first phase stopped.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The phases of one interval search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    /// Breadth-first bisection over a FIFO queue of intervals
    Bracketing,
    /// Binary refinement of the bracket found while bracketing
    Refining,
    /// Search finished, terminal
    Done,
}

impl SearchPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bracketing => write!(f, "Bracketing"),
            Self::Refining => write!(f, "Refining"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// ```text
/// Bracketing → Refining → Done
/// ```
fn is_legal_transition(from: SearchPhase, to: SearchPhase) -> bool {
    use SearchPhase::*;
    matches!((from, to), (Bracketing, Refining) | (Refining, Done))
}

/// A single recorded phase transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: SearchPhase,
    pub to: SearchPhase,
    /// Measurements issued before the transition
    pub step: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: SearchPhase,
    pub to: SearchPhase,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal search transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Current phase plus the transition log
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    current: SearchPhase,
    transitions: Vec<PhaseTransition>,
}

impl PhaseMachine {
    /// Start in `Bracketing`
    pub fn new() -> Self {
        Self {
            current: SearchPhase::Bracketing,
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> SearchPhase {
        self.current
    }

    pub fn advance(
        &mut self,
        to: SearchPhase,
        step: usize,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        tracing::debug!(
            from = %self.current,
            to = %to,
            step,
            reason = reason.unwrap_or(""),
            "Search phase transition"
        );

        self.transitions.push(PhaseTransition {
            from: self.current,
            to,
            step,
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<PhaseTransition> {
        self.transitions
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_phase() {
        let pm = PhaseMachine::new();
        assert_eq!(pm.current(), SearchPhase::Bracketing);
        assert!(!pm.is_terminal());
        assert!(pm.transitions().is_empty());
    }

    #[test]
    fn test_full_path() {
        let mut pm = PhaseMachine::new();
        pm.advance(SearchPhase::Refining, 1, Some("error below threshold"))
            .unwrap();
        pm.advance(SearchPhase::Done, 5, None).unwrap();

        assert!(pm.is_terminal());
        let log = pm.transitions();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].step, 1);
        assert_eq!(log[0].reason.as_deref(), Some("error below threshold"));
        assert_eq!(log[1].to, SearchPhase::Done);
    }

    #[test]
    fn test_cannot_skip_refining() {
        let mut pm = PhaseMachine::new();
        let err = pm.advance(SearchPhase::Done, 0, None).unwrap_err();
        assert_eq!(err.from, SearchPhase::Bracketing);
        assert_eq!(err.to, SearchPhase::Done);
        assert_eq!(pm.current(), SearchPhase::Bracketing);
    }

    #[test]
    fn test_no_transition_out_of_done() {
        let mut pm = PhaseMachine::new();
        pm.advance(SearchPhase::Refining, 0, None).unwrap();
        pm.advance(SearchPhase::Done, 0, None).unwrap();
        assert!(pm.advance(SearchPhase::Bracketing, 0, None).is_err());
        assert!(pm.advance(SearchPhase::Refining, 0, None).is_err());
    }

    #[test]
    fn test_display() {
        let err = IllegalTransition {
            from: SearchPhase::Refining,
            to: SearchPhase::Bracketing,
        };
        assert_eq!(
            err.to_string(),
            "Illegal search transition: Refining → Bracketing"
        );
    }
}
