//! Two-phase search for the minimal sufficient fractional bit-width

pub mod engine;
pub mod phase;

pub use engine::{Bracket, Sample, SearchEngine, SearchOutcome};
pub use phase::{IllegalTransition, PhaseMachine, PhaseTransition, SearchPhase};
