//! Compare a fixed-point result file against its floating-point counterpart
//!
//! Prints `fix_overflows flo_overflows rel% mean_abs_error`; the last two are
//! `-` when nothing could be accumulated.
//!
//! ```bash
//! resultdiff output-data-32/gemm_out.output.csv output-data-32/gemm_out_not_opt.output.csv
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Result file of the fixed-point build
    fix: PathBuf,

    /// Result file of the floating-point build
    flo: PathBuf,

    /// More logging on stderr
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    autotune::init_tracing(args.verbose);

    let stats = tuning::resultdiff::compare(&args.fix, &args.flo)?;
    debug!(n = stats.n, acc_err = stats.acc_err, acc_val = stats.acc_val, "Compared");
    println!("{stats}");
    Ok(())
}
