//! Tabulate instruction mixes of fixed-point and float builds
//!
//! Reads `{stats_dir}/{bench}_out_ic_fix.txt` and `..._ic_float.txt` for each
//! benchmark and prints the share of each instruction kind in percent.
//!
//! ```bash
//! # Every benchmark the build driver lists
//! inststat
//!
//! # Selected benchmarks, dumps in another directory
//! inststat --stats-dir ./stats-O2 gemm atax
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tuning::inststat::StatTable;
use tuning::{InterruptLatch, ShellRunner, TunerConfig};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Benchmarks to include (default: the build driver's benchmark list)
    benches: Vec<String>,

    /// Directory of instruction count dumps (overrides the config file)
    #[arg(long)]
    stats_dir: Option<PathBuf>,

    /// TOML config file (default: ./autotune.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// More logging on stderr
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    autotune::init_tracing(args.verbose);

    let config = TunerConfig::load(args.config.as_deref()).context("loading configuration")?;
    let benches = if args.benches.is_empty() {
        let runner = ShellRunner::new(&config.working_dir, config.stack_limit())
            .with_interrupt(InterruptLatch::ctrl_c());
        match autotune::discover_benchmarks(&runner, &config.bench_list_command).await {
            Ok(benches) => benches,
            Err(e) if e.is_interrupt() => {
                eprintln!("interrupted");
                std::process::exit(autotune::INTERRUPTED_EXIT);
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        args.benches.clone()
    };
    if benches.is_empty() {
        bail!("no benchmarks to tabulate");
    }

    let stats_dir = config
        .working_dir
        .join(args.stats_dir.as_ref().unwrap_or(&config.stats_dir));
    info!(count = benches.len(), dir = %stats_dir.display(), "Loading instruction stats");

    let table = StatTable::load(&stats_dir, &benches)?;
    print!("{}", table.render());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_to_discovery() {
        let args = Args::try_parse_from(["inststat"]).unwrap();
        assert!(args.benches.is_empty());
        assert_eq!(args.stats_dir, None);

        let args = Args::try_parse_from(["inststat", "--stats-dir", "s", "gemm"]).unwrap();
        assert_eq!(args.benches, vec!["gemm"]);
        assert_eq!(args.stats_dir, Some(PathBuf::from("s")));
    }
}
