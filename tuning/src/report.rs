//! Run reports: search summaries and error curves.
//!
//! Both serialize to JSON for `--json`. Error curves also render as a text
//! chart on a log10 scale and, optionally, as an SVG line chart.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TuneError, TuneResult};
use crate::pipeline::{Configuration, Measure, PipelineStats, PrecisionMode};
use crate::search::SearchOutcome;

/// Width of the longest text bar
const BAR_WIDTH: usize = 50;

/// Search outcome stamped with when it was produced and what it cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: SearchOutcome,
    pub pipeline: PipelineStats,
}

impl SearchReport {
    pub fn new(outcome: SearchOutcome, pipeline: PipelineStats) -> Self {
        Self {
            timestamp: Utc::now(),
            outcome,
            pipeline,
        }
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        let o = &self.outcome;
        let mut line = format!(
            "{}: {} fractional bits (error {:.3e}, {} steps)",
            o.benchmark, o.fractional_bits, o.error, o.steps
        );
        if !o.satisfied {
            line.push_str(" [threshold not met]");
        }
        line
    }
}

/// Error measured at every fractional bit count of one benchmark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorCurve {
    pub timestamp: DateTime<Utc>,
    pub benchmark: String,
    pub total_bits: u32,
    pub precision: PrecisionMode,
    /// `(fractional_bits, error)` for `0..total_bits`
    pub points: Vec<(i32, f64)>,
}

impl ErrorCurve {
    /// Measure every fractional bit count in `0..total_bits`
    pub async fn sweep<M: Measure + ?Sized>(
        oracle: &mut M,
        benchmark: &str,
        total_bits: u32,
        precision: PrecisionMode,
    ) -> TuneResult<Self> {
        let base = Configuration::new(benchmark, 0, total_bits, precision);
        let mut points = Vec::with_capacity(total_bits as usize);
        for frac in 0..total_bits as i32 {
            let error = oracle.measure(&base.with_fractional_bits(frac)).await?;
            debug!(benchmark, frac, error, "Curve point");
            points.push((frac, error));
        }
        Ok(Self {
            timestamp: Utc::now(),
            benchmark: benchmark.to_string(),
            total_bits,
            precision,
            points,
        })
    }

    /// Points that can be placed on a log axis
    fn plottable(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.points
            .iter()
            .copied()
            .filter(|(_, e)| e.is_finite() && *e > 0.0)
    }

    /// log10 span of the plottable errors
    fn log_span(&self) -> Option<(f64, f64)> {
        self.plottable()
            .map(|(_, e)| e.log10())
            .fold(None, |span, v| match span {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Text chart, one line per fractional bit count.
    ///
    /// Bars grow with log10(error) across the curve's span. Zero error has no
    /// bar, non-finite error gets a full one.
    pub fn render_text(&self) -> String {
        let span = self.log_span();
        let mut out = format!("{} ({} total bits, {})\n", self.benchmark, self.total_bits, self.precision);
        for &(frac, error) in &self.points {
            let bar = bar_length(error, span);
            let _ = writeln!(out, "{frac:>3}  {error:>10.3e}  {}", "#".repeat(bar));
        }
        out
    }

    /// Write a log-y line chart to `path`
    pub fn render_svg(&self, path: &Path, threshold: Option<f64>) -> TuneResult<()> {
        let (lo, hi) = self
            .log_span()
            .ok_or_else(|| TuneError::Plot(format!("{}: no positive finite errors", self.benchmark)))?;
        let y_range = 10f64.powf(lo - 0.5)..10f64.powf(hi + 0.5);
        let x_range = -1..self.total_bits as i32;

        let root = SVGBackend::new(path, (1000, 600)).into_drawing_area();
        root.fill(&WHITE).map_err(plot_error)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!("{} error vs fractional bits", self.benchmark),
                ("sans-serif", 20),
            )
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(x_range, y_range.log_scale())
            .map_err(plot_error)?;

        chart
            .configure_mesh()
            .x_desc("fractional bits")
            .y_desc("error")
            .y_label_formatter(&|v| format!("{v:.0e}"))
            .draw()
            .map_err(plot_error)?;

        chart
            .draw_series(LineSeries::new(self.plottable(), &BLUE))
            .map_err(plot_error)?;
        chart
            .draw_series(self.plottable().map(|p| Circle::new(p, 3, BLUE.filled())))
            .map_err(plot_error)?;

        if let Some(t) = threshold.filter(|t| *t > 0.0) {
            chart
                .draw_series(std::iter::once(PathElement::new(
                    vec![(-1, t), (self.total_bits as i32 - 1, t)],
                    RED.mix(0.6),
                )))
                .map_err(plot_error)?;
        }

        root.present().map_err(plot_error)?;
        debug!(benchmark = %self.benchmark, path = %path.display(), "Wrote SVG curve");
        Ok(())
    }
}

fn bar_length(error: f64, span: Option<(f64, f64)>) -> usize {
    if error == 0.0 {
        return 0;
    }
    if !error.is_finite() {
        return BAR_WIDTH;
    }
    match span {
        Some((lo, hi)) if hi > lo => {
            let t = (error.log10() - lo) / (hi - lo);
            1 + (t * (BAR_WIDTH - 1) as f64).round() as usize
        }
        _ => BAR_WIDTH,
    }
}

fn plot_error(e: impl std::fmt::Display) -> TuneError {
    TuneError::Plot(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{SearchPhase, Sample};
    use async_trait::async_trait;

    fn outcome(satisfied: bool) -> SearchOutcome {
        SearchOutcome {
            benchmark: "gemm".to_string(),
            total_bits: 32,
            precision: PrecisionMode::Single,
            threshold: 0.1,
            fractional_bits: 12,
            error: 0.0123,
            minimum: 0.001,
            steps: 7,
            satisfied,
            samples: vec![Sample {
                fractional_bits: 15,
                error: 0.001,
                phase: SearchPhase::Bracketing,
            }],
            transitions: Vec::new(),
        }
    }

    struct Halving;

    #[async_trait]
    impl Measure for Halving {
        async fn measure(&mut self, config: &Configuration) -> TuneResult<f64> {
            Ok(if config.fractional_bits == 3 {
                0.0
            } else {
                1.0 / 2f64.powi(config.fractional_bits)
            })
        }
    }

    #[test]
    fn test_summary_format() {
        let report = SearchReport::new(outcome(true), PipelineStats::default());
        assert_eq!(
            report.summary(),
            "gemm: 12 fractional bits (error 1.230e-2, 7 steps)"
        );

        let report = SearchReport::new(outcome(false), PipelineStats::default());
        assert!(report.summary().ends_with(" [threshold not met]"));
    }

    #[test]
    fn test_report_json_is_flat() {
        let report = SearchReport::new(outcome(true), PipelineStats::default());
        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["benchmark"], "gemm");
        assert_eq!(json["fractional_bits"], 12);
        assert_eq!(json["satisfied"], true);
        assert_eq!(json["samples"][0]["phase"], "bracketing");
        assert!(json["timestamp"].is_string());
        assert_eq!(json["pipeline"]["builds"], 0);
    }

    #[tokio::test]
    async fn test_sweep_covers_every_bit_count() {
        let curve = ErrorCurve::sweep(&mut Halving, "gemm", 8, PrecisionMode::Single)
            .await
            .unwrap();
        let fracs: Vec<i32> = curve.points.iter().map(|(f, _)| *f).collect();
        assert_eq!(fracs, (0..8).collect::<Vec<_>>());
        assert_eq!(curve.points[0].1, 1.0);
    }

    #[tokio::test]
    async fn test_render_text_bars_follow_log_error() {
        let curve = ErrorCurve::sweep(&mut Halving, "gemm", 6, PrecisionMode::Single)
            .await
            .unwrap();
        let text = curve.render_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with("gemm (6 total bits, single)"));

        let bars: Vec<usize> = lines[1..].iter().map(|l| l.matches('#').count()).collect();
        assert_eq!(bars[0], BAR_WIDTH);
        assert_eq!(bars[3], 0);
        assert_eq!(bars[5], 1);
        assert!(bars[1] > bars[2] && bars[2] > bars[4]);
    }

    #[test]
    fn test_bar_length_edges() {
        assert_eq!(bar_length(f64::INFINITY, Some((-2.0, 0.0))), BAR_WIDTH);
        assert_eq!(bar_length(0.5, Some((-0.3, -0.3))), BAR_WIDTH);
        assert_eq!(bar_length(0.01, Some((-2.0, 0.0))), 1);
        assert_eq!(bar_length(1.0, Some((-2.0, 0.0))), BAR_WIDTH);
    }

    #[tokio::test]
    async fn test_render_svg_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gemm.svg");
        let curve = ErrorCurve::sweep(&mut Halving, "gemm", 8, PrecisionMode::Single)
            .await
            .unwrap();

        curve.render_svg(&path, Some(0.1)).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_render_svg_needs_positive_errors() {
        let dir = tempfile::tempdir().unwrap();
        let curve = ErrorCurve {
            timestamp: Utc::now(),
            benchmark: "zero".to_string(),
            total_bits: 4,
            precision: PrecisionMode::Single,
            points: vec![(0, 0.0), (1, 0.0)],
        };
        let err = curve
            .render_svg(&dir.path().join("zero.svg"), None)
            .unwrap_err();
        assert!(matches!(err, TuneError::Plot(_)));
    }
}
