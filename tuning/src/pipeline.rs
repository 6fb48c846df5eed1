//! Build/execute/measure pipeline
//!
//! Turns one [`Configuration`] into one error score:
//!
//! ```text
//! cache hit? ──yes──────────────────────────────────────────────→ score
//!     │no
//!     ↓
//! build (stderr >> build log)
//!     ↓
//! reference cached? ──no──→ run reference → parse → cache by benchmark
//!     ↓
//! run candidate ──status ≠ 0──→ empty sequence
//!     ↓
//! metric::score → cache by configuration → score
//! ```
//!
//! Both caches live as long as the pipeline and are never invalidated, so
//! repeated queries cost nothing and the reference runs once per benchmark.
//! Build failures are not detected here: a failed build leaves a stale or
//! missing candidate binary, which shows up as a failing candidate run.

use crate::config::{render_template, TemplateVars, TunerConfig};
use crate::error::{TuneError, TuneResult};
use crate::exec::{CommandRunner, CommandSpec};
use crate::metric;
use crate::values;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, trace, warn};

/// Precision of the floating-point reference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecisionMode {
    #[default]
    Single,
    Double,
}

impl fmt::Display for PrecisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Double => write!(f, "double"),
        }
    }
}

/// One point of the search space; the score cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Configuration {
    pub benchmark: String,
    /// In `[-1, total_bits]`; the ends only ever appear as bracket walls
    pub fractional_bits: i32,
    pub total_bits: u32,
    pub precision: PrecisionMode,
}

impl Configuration {
    pub fn new(
        benchmark: impl Into<String>,
        fractional_bits: i32,
        total_bits: u32,
        precision: PrecisionMode,
    ) -> Self {
        Self {
            benchmark: benchmark.into(),
            fractional_bits,
            total_bits,
            precision,
        }
    }

    /// Same benchmark, width and precision at another fractional bit count
    pub fn with_fractional_bits(&self, fractional_bits: i32) -> Self {
        Self {
            fractional_bits,
            ..self.clone()
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frac={} tot={} {}",
            self.benchmark, self.fractional_bits, self.total_bits, self.precision
        )
    }
}

/// Anything that can score a configuration.
///
/// The search engine only depends on this; [`MeasurePipeline`] is the real
/// implementation and tests use synthetic error curves.
#[async_trait]
pub trait Measure: Send {
    async fn measure(&mut self, config: &Configuration) -> TuneResult<f64>;
}

/// Memoized scores and reference sequences
#[derive(Debug, Default)]
pub struct MeasureCache {
    scores: HashMap<Configuration, f64>,
    references: HashMap<String, Vec<f64>>,
}

impl MeasureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self, config: &Configuration) -> Option<f64> {
        self.scores.get(config).copied()
    }

    pub fn insert_score(&mut self, config: Configuration, score: f64) {
        self.scores.insert(config, score);
    }

    pub fn reference(&self, benchmark: &str) -> Option<&[f64]> {
        self.references.get(benchmark).map(Vec::as_slice)
    }

    pub fn insert_reference(&mut self, benchmark: impl Into<String>, values: Vec<f64>) {
        self.references.insert(benchmark.into(), values);
    }

    /// Number of memoized scores
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Number of benchmarks with a cached reference
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }
}

/// Counters of external work done by the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub builds: usize,
    pub reference_runs: usize,
    pub candidate_runs: usize,
    pub cache_hits: usize,
}

impl PipelineStats {
    /// Work done since an earlier snapshot
    pub fn since(&self, earlier: PipelineStats) -> Self {
        Self {
            builds: self.builds.saturating_sub(earlier.builds),
            reference_runs: self.reference_runs.saturating_sub(earlier.reference_runs),
            candidate_runs: self.candidate_runs.saturating_sub(earlier.candidate_runs),
            cache_hits: self.cache_hits.saturating_sub(earlier.cache_hits),
        }
    }
}

/// The memoizing build/execute/measure pipeline
pub struct MeasurePipeline<R: CommandRunner> {
    runner: R,
    config: TunerConfig,
    cache: MeasureCache,
    stats: PipelineStats,
}

impl<R: CommandRunner> MeasurePipeline<R> {
    pub fn new(runner: R, config: TunerConfig) -> Self {
        Self {
            runner,
            config,
            cache: MeasureCache::new(),
            stats: PipelineStats::default(),
        }
    }

    pub fn cache(&self) -> &MeasureCache {
        &self.cache
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Render a command template with the benchmark name shell-quoted
    fn command(&self, template: &str, config: &Configuration) -> TuneResult<String> {
        let quoted = quote_benchmark(&config.benchmark)?;
        Ok(render_template(template, &self.vars(&quoted, config)))
    }

    /// Render a result path template, resolved against the working directory
    fn output_path(&self, template: &str, config: &Configuration) -> PathBuf {
        let rendered = render_template(template, &self.vars(&config.benchmark, config));
        self.config.working_dir.join(rendered)
    }

    fn vars<'a>(&'a self, bench: &'a str, config: &Configuration) -> TemplateVars<'a> {
        TemplateVars {
            bench,
            frac: config.fractional_bits,
            tot: config.total_bits,
            dbl: match config.precision {
                PrecisionMode::Single => "",
                PrecisionMode::Double => &self.config.double_flag,
            },
        }
    }

    async fn build(&mut self, config: &Configuration) -> TuneResult<()> {
        let command = self.command(&self.config.build_command, config)?;
        let log = self.config.working_dir.join(&self.config.build_log);
        debug!(%config, "Building");

        let status = self
            .runner
            .run(&CommandSpec::new(command).stderr_append(log))
            .await?;
        self.stats.builds += 1;
        if status != 0 {
            // Surfaces later as a failing candidate run
            debug!(%config, status, "Build exited with failure");
        }
        Ok(())
    }

    /// Run the reference once per benchmark and cache its values
    async fn ensure_reference(&mut self, config: &Configuration) -> TuneResult<()> {
        if self.cache.reference(&config.benchmark).is_some() {
            return Ok(());
        }

        let command = self.command(&self.config.reference_command, config)?;
        let output = self.output_path(&self.config.reference_output, config);
        let status = self
            .runner
            .run(&CommandSpec::new(command).stderr_to(&output))
            .await?;
        self.stats.reference_runs += 1;

        if status != 0 {
            return Err(TuneError::ReferenceFailed {
                benchmark: config.benchmark.clone(),
                status,
            });
        }

        let reference = values::read_values(&output)?;
        debug!(
            benchmark = %config.benchmark,
            values = reference.len(),
            "Reference cached"
        );
        self.cache.insert_reference(config.benchmark.clone(), reference);
        Ok(())
    }

    /// Run the candidate; a failing run yields no values at all
    async fn candidate_values(&mut self, config: &Configuration) -> TuneResult<Vec<f64>> {
        let command = self.command(&self.config.candidate_command, config)?;
        let output = self.output_path(&self.config.candidate_output, config);
        let status = self
            .runner
            .run(&CommandSpec::new(command).stderr_to(&output))
            .await?;
        self.stats.candidate_runs += 1;

        if status != 0 {
            warn!(%config, status, "Candidate run failed");
            return Ok(Vec::new());
        }
        values::read_values(&output)
    }
}

#[async_trait]
impl<R: CommandRunner> Measure for MeasurePipeline<R> {
    async fn measure(&mut self, config: &Configuration) -> TuneResult<f64> {
        if let Some(score) = self.cache.score(config) {
            self.stats.cache_hits += 1;
            trace!(%config, score, "Cache hit");
            return Ok(score);
        }

        self.build(config).await?;
        self.ensure_reference(config).await?;
        let candidate = self.candidate_values(config).await?;

        let reference = self.cache.reference(&config.benchmark).unwrap_or(&[]);
        let score = metric::score(reference, &candidate);
        info!(
            benchmark = %config.benchmark,
            frac = config.fractional_bits,
            error = score,
            "Measured"
        );

        self.cache.insert_score(config.clone(), score);
        Ok(score)
    }
}

/// Quote a benchmark name for interpolation into a shell command
pub fn quote_benchmark(name: &str) -> TuneResult<String> {
    if name.is_empty() {
        return Err(TuneError::UnsafeName(name.to_string()));
    }
    shlex::try_quote(name)
        .map(|quoted| quoted.into_owned())
        .map_err(|_| TuneError::UnsafeName(name.to_string()))
}
