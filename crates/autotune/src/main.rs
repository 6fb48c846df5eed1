//! Fixed-point bit-width autotuner
//!
//! Searches, per benchmark, the smallest number of fractional bits whose
//! fixed-point build stays within the error threshold of the float reference.
//!
//! # Usage
//!
//! ```bash
//! # Search mode
//! autotune gemm atax
//!
//! # Every benchmark the build driver knows about, 16-bit words, JSON reports
//! autotune --all --tot 16 --json
//!
//! # Plot mode against a double reference
//! autotune --plot --dbl --svg curves/{bench}.svg gemm
//!
//! # Custom configuration
//! AUTOTUNE_WORKING_DIR=../polybench autotune --config tune.toml -vv gemm
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tuning::{
    ErrorCurve, InterruptLatch, MeasurePipeline, PrecisionMode, SearchEngine, SearchReport,
    ShellRunner, TunerConfig,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Benchmarks to tune
    benches: Vec<String>,

    /// Tune every benchmark listed by the build driver instead
    #[arg(long, default_value_t = false)]
    all: bool,

    /// Sweep every fractional bit count and show the error curve instead of searching
    #[arg(long, default_value_t = false)]
    plot: bool,

    /// Total fixed-point width in bits (overrides the config file)
    #[arg(long)]
    tot: Option<u32>,

    /// Compare against a double-precision reference
    #[arg(long, default_value_t = false)]
    dbl: bool,

    /// Maximum acceptable error (overrides the config file)
    #[arg(long)]
    threshold: Option<f64>,

    /// TOML config file (default: ./autotune.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print one JSON object per benchmark
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Also render plot mode curves as SVG; `{bench}` expands to the benchmark name
    #[arg(long, requires = "plot")]
    svg: Option<PathBuf>,

    /// More logging on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn precision(&self) -> PrecisionMode {
        if self.dbl {
            PrecisionMode::Double
        } else {
            PrecisionMode::Single
        }
    }

    /// Config file, env, then flags
    fn tuner_config(&self) -> Result<TunerConfig> {
        let mut config = TunerConfig::load(self.config.as_deref())?;
        if let Some(tot) = self.tot {
            config.total_bits = tot;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    autotune::init_tracing(cli.verbose);

    let config = cli.tuner_config().context("loading configuration")?;
    let runner = ShellRunner::new(&config.working_dir, config.stack_limit())
        .with_interrupt(InterruptLatch::ctrl_c());

    let benches = if cli.all {
        match autotune::discover_benchmarks(&runner, &config.bench_list_command).await {
            Ok(benches) => benches,
            Err(e) if e.is_interrupt() => {
                warn!("Interrupted while listing benchmarks");
                eprintln!("interrupted");
                std::process::exit(autotune::INTERRUPTED_EXIT);
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        cli.benches.clone()
    };
    if benches.is_empty() {
        bail!("no benchmarks given (pass names or --all)");
    }

    let mode = if cli.plot { "plot" } else { "search" };
    info!(
        count = benches.len(),
        tot = config.total_bits,
        threshold = config.threshold,
        precision = %cli.precision(),
        mode,
        "Autotune starting"
    );

    let mut pipeline = MeasurePipeline::new(runner, config);
    let mut failed = 0usize;
    for bench in &benches {
        match run_benchmark(&cli, &mut pipeline, bench, benches.len() > 1).await {
            Ok(()) => {}
            Err(e) if autotune::is_interrupt(&e) => {
                warn!(benchmark = %bench, "Interrupted");
                eprintln!("interrupted");
                std::process::exit(autotune::INTERRUPTED_EXIT);
            }
            Err(e) => {
                error!(benchmark = %bench, "{e:#}");
                eprintln!("{bench}: {e:#}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} benchmarks failed", benches.len());
    }
    Ok(())
}

async fn run_benchmark(
    cli: &Cli,
    pipeline: &mut MeasurePipeline<ShellRunner>,
    bench: &str,
    several: bool,
) -> Result<()> {
    let total_bits = pipeline.config().total_bits;
    let threshold = pipeline.config().threshold;

    if cli.plot {
        let curve = ErrorCurve::sweep(pipeline, bench, total_bits, cli.precision()).await?;
        if cli.json {
            println!("{}", serde_json::to_string(&curve)?);
        } else {
            print!("{}", curve.render_text());
        }
        if let Some(template) = &cli.svg {
            let path = autotune::svg_path(template, bench, several);
            curve
                .render_svg(&path, Some(threshold))
                .with_context(|| format!("rendering {}", path.display()))?;
            info!(benchmark = bench, path = %path.display(), "SVG written");
        }
        return Ok(());
    }

    let before = pipeline.stats();
    let outcome = SearchEngine::new(threshold)
        .find_minimum_fractional_bits(pipeline, bench, total_bits, cli.precision())
        .await?;
    let report = SearchReport::new(outcome, pipeline.stats().since(before));
    if cli.json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("{}", report.summary());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["autotune", "gemm", "atax"]).unwrap();
        assert_eq!(cli.benches, vec!["gemm", "atax"]);
        assert!(!cli.plot && !cli.dbl && !cli.all && !cli.json);
        assert_eq!(cli.tot, None);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.precision(), PrecisionMode::Single);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "autotune", "--plot", "--tot", "16", "--dbl", "-vv", "--threshold", "0.05", "--svg",
            "out.svg", "gemm",
        ])
        .unwrap();
        assert!(cli.plot);
        assert_eq!(cli.tot, Some(16));
        assert_eq!(cli.threshold, Some(0.05));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.precision(), PrecisionMode::Double);
        assert_eq!(cli.svg, Some(PathBuf::from("out.svg")));
    }

    #[test]
    fn test_svg_requires_plot() {
        assert!(Cli::try_parse_from(["autotune", "--svg", "out.svg", "gemm"]).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tune.toml");
        std::fs::write(&path, "total_bits = 24\nthreshold = 0.2\n").unwrap();

        let path = path.to_str().unwrap();

        let cli =
            Cli::try_parse_from(["autotune", "--config", path, "--tot", "16", "gemm"]).unwrap();
        let config = cli.tuner_config().unwrap();
        assert_eq!(config.total_bits, 16);
        assert_eq!(config.threshold, 0.2);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let cli = Cli::try_parse_from(["autotune", "--tot", "1", "gemm"]).unwrap();
        assert!(cli.tuner_config().is_err());

        let cli = Cli::try_parse_from(["autotune", "--tot", "4000000000", "gemm"]).unwrap();
        assert!(cli.tuner_config().is_err());
    }
}
