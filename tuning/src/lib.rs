//! Fixed-Point Bit-Width Tuning Library
//!
//! Finds the smallest number of fractional bits a fixed-point build of a
//! numeric benchmark needs to stay within an error bound of its floating-point
//! reference.
//!
//! # Components
//!
//! ## Core
//! - [`search`]: two-phase interval search (breadth-first bracketing, then
//!   binary refinement) over fractional bit counts
//! - [`pipeline`]: memoizing build/execute/compare oracle behind the
//!   [`Measure`] trait
//! - [`metric`]: normalized max-absolute-difference error score
//!
//! ## Plumbing
//! - [`exec`]: shell command runner with stack limit, stderr redirection
//!   and interrupt detection
//! - [`values`]: lazy whitespace-separated float reader
//! - [`config`]: TOML + `AUTOTUNE_*` environment configuration
//!
//! ## Reporting
//! - [`report`]: search summaries, JSON reports, text and SVG error curves
//! - [`resultdiff`]: overflow-aware result file comparison
//! - [`inststat`]: instruction mix tables
//!
//! # Usage
//!
//! ```bash
//! # Search the minimal fractional bits of two benchmarks
//! autotune gemm atax
//!
//! # Plot the error curve of one benchmark against a double reference
//! autotune --plot --dbl --svg gemm.svg gemm
//! ```

pub mod config;
pub mod error;
pub mod exec;
pub mod inststat;
pub mod metric;
pub mod pipeline;
pub mod report;
pub mod resultdiff;
pub mod search;
pub mod values;

pub use config::{render_template, TemplateVars, TunerConfig};
pub use error::{TuneError, TuneResult};
pub use exec::{CommandRunner, CommandSpec, InterruptLatch, OutputSink, ShellRunner};
pub use metric::{score, FAILURE_SENTINEL};
pub use pipeline::{Configuration, Measure, MeasureCache, MeasurePipeline, PipelineStats, PrecisionMode};
pub use report::{ErrorCurve, SearchReport};
pub use search::{SearchEngine, SearchOutcome, SearchPhase};
