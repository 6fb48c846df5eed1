//! Interval search for the minimal sufficient fractional bit-width.
//!
//! Assumes error does not grow with more fractional bits, but tolerates local
//! spikes. Two phases:
//!
//! 1. **Bracketing** walks the bisection tree of `(-1, total_bits)` breadth
//!    first. Every interval of width ≥ 2 is split at its floor midpoint, both
//!    halves are queued, and the midpoint is measured. The phase stops at the
//!    first error below threshold, or when only unit intervals are left, in
//!    which case every bit-width has been measured.
//! 2. **Refining** starts from the smallest acceptable bit-width bracketing
//!    measured as `rwall` and the largest rejected one below it as `lwall`.
//!    `lwall` is never sufficient, `rwall` always is. An acceptable midpoint
//!    moves `rwall` left and becomes the new best, otherwise `lwall` moves
//!    right. It stops at width 1.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::phase::{PhaseMachine, PhaseTransition, SearchPhase};
use crate::config::DEFAULT_THRESHOLD;
use crate::error::TuneResult;
use crate::pipeline::{Configuration, Measure, PrecisionMode};

/// An open interval of fractional bit counts `(lwall, rwall)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    pub lwall: i32,
    pub rwall: i32,
}

impl Bracket {
    pub fn new(lwall: i32, rwall: i32) -> Self {
        Self { lwall, rwall }
    }

    pub fn width(&self) -> i32 {
        self.rwall - self.lwall
    }

    /// Floor of the midpoint
    pub fn center(&self) -> i32 {
        (self.lwall + self.rwall).div_euclid(2)
    }

    /// `(lwall, center)` and `(center, rwall)`
    pub fn split(&self) -> (Bracket, Bracket) {
        let center = self.center();
        (
            Bracket::new(self.lwall, center),
            Bracket::new(center, self.rwall),
        )
    }
}

/// One measurement issued by the engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub fractional_bits: i32,
    pub error: f64,
    pub phase: SearchPhase,
}

/// Result of one search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub benchmark: String,
    pub total_bits: u32,
    pub precision: PrecisionMode,
    pub threshold: f64,
    /// Minimal sufficient fractional bits, or the best effort when unsatisfied
    pub fractional_bits: i32,
    /// Error measured at `fractional_bits`
    pub error: f64,
    /// Smallest error seen across the whole search
    pub minimum: f64,
    /// Measurements issued, cached repeats included
    pub steps: usize,
    /// Whether `error` is within the threshold
    pub satisfied: bool,
    pub samples: Vec<Sample>,
    pub transitions: Vec<PhaseTransition>,
}

/// The two-phase interval search
#[derive(Debug, Clone, Copy)]
pub struct SearchEngine {
    threshold: f64,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl SearchEngine {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Find the smallest fractional bit count whose error is within threshold.
    ///
    /// Never fails for numeric reasons: when nothing qualifies the outcome is
    /// the lowest-error bit-width with `satisfied == false`. Errors only come
    /// from the measurement itself (interrupt, unreadable output, ...).
    pub async fn find_minimum_fractional_bits<M: Measure + ?Sized>(
        &self,
        oracle: &mut M,
        benchmark: &str,
        total_bits: u32,
        precision: PrecisionMode,
    ) -> TuneResult<SearchOutcome> {
        let base = Configuration::new(benchmark, -1, total_bits, precision);
        let mut run = Run {
            oracle,
            base: &base,
            samples: Vec::new(),
        };
        let mut phases = PhaseMachine::new();

        // Phase 1: breadth-first bracketing
        let mut queue = VecDeque::from([Bracket::new(-1, total_bits as i32)]);
        let mut qualified = false;
        while let Some(interval) = queue.pop_front() {
            if interval.width() <= 1 {
                continue;
            }
            let (left, right) = interval.split();
            queue.push_back(left);
            queue.push_back(right);

            let sample = run.sample(interval.center(), SearchPhase::Bracketing).await?;
            if sample.error < self.threshold {
                qualified = true;
                break;
            }
        }

        let reason = if qualified {
            "error below threshold"
        } else {
            "queue exhausted"
        };
        phases.advance(SearchPhase::Refining, run.steps(), Some(reason))?;
        let (mut bracket, mut best) = run.seed_bracket(self.threshold, total_bits as i32);
        debug!(benchmark, lwall = bracket.lwall, rwall = bracket.rwall, "Refining");

        // Phase 2: binary refinement
        while bracket.width() > 1 {
            let sample = run.sample(bracket.center(), SearchPhase::Refining).await?;
            if sample.error <= self.threshold {
                bracket.rwall = sample.fractional_bits;
                best = Some(sample);
            } else {
                bracket.lwall = sample.fractional_bits;
            }
        }
        phases.advance(SearchPhase::Done, run.steps(), None)?;

        let satisfied = best.is_some();
        let chosen = best.or_else(|| run.lowest_error());
        let minimum = run
            .samples
            .iter()
            .map(|s| s.error)
            .fold(f64::INFINITY, f64::min);

        let outcome = SearchOutcome {
            benchmark: benchmark.to_string(),
            total_bits,
            precision,
            threshold: self.threshold,
            fractional_bits: chosen.map_or(bracket.lwall, |s| s.fractional_bits),
            error: chosen.map_or(f64::INFINITY, |s| s.error),
            minimum,
            steps: run.steps(),
            satisfied,
            samples: run.samples,
            transitions: phases.into_transitions(),
        };
        info!(
            benchmark,
            frac = outcome.fractional_bits,
            error = outcome.error,
            steps = outcome.steps,
            satisfied,
            "Search finished"
        );
        Ok(outcome)
    }
}

/// Measurement bookkeeping for one search
struct Run<'a, M: ?Sized> {
    oracle: &'a mut M,
    base: &'a Configuration,
    samples: Vec<Sample>,
}

impl<M: Measure + ?Sized> Run<'_, M> {
    async fn sample(&mut self, fractional_bits: i32, phase: SearchPhase) -> TuneResult<Sample> {
        let config = self.base.with_fractional_bits(fractional_bits);
        let error = self.oracle.measure(&config).await?;
        let sample = Sample {
            fractional_bits,
            error,
            phase,
        };
        self.samples.push(sample);
        Ok(sample)
    }

    fn steps(&self) -> usize {
        self.samples.len()
    }

    fn smallest_acceptable(&self, threshold: f64) -> Option<Sample> {
        self.samples
            .iter()
            .filter(|s| s.error <= threshold)
            .min_by_key(|s| s.fractional_bits)
            .copied()
    }

    /// Refinement bracket from what bracketing measured.
    ///
    /// `rwall` is the smallest acceptable bit-width seen (or `upper`), `lwall`
    /// the largest rejected one below it (or -1). Samples at exactly the
    /// threshold count as acceptable even though they do not end bracketing.
    fn seed_bracket(&self, threshold: f64, upper: i32) -> (Bracket, Option<Sample>) {
        let best = self.smallest_acceptable(threshold);
        let rwall = best.map_or(upper, |s| s.fractional_bits);
        let lwall = self
            .samples
            .iter()
            .filter(|s| s.error > threshold && s.fractional_bits < rwall)
            .map(|s| s.fractional_bits)
            .max()
            .unwrap_or(-1);
        (Bracket::new(lwall, rwall), best)
    }

    /// Lowest error, fewest bits on ties
    fn lowest_error(&self) -> Option<Sample> {
        self.samples.iter().copied().reduce(|a, b| {
            if b.error < a.error || (b.error == a.error && b.fractional_bits < a.fractional_bits) {
                b
            } else {
                a
            }
        })
    }
}
