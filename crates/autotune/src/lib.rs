//! Shared plumbing for the `autotune`, `resultdiff` and `inststat` binaries

use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;
use tuning::{CommandRunner, TuneError, TuneResult};

/// Exit status after Ctrl-C, as a shell would report it
pub const INTERRUPTED_EXIT: i32 = 130;

/// Whether `err`, or anything it wraps, is a Ctrl-C
pub fn is_interrupt(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<TuneError>().is_some_and(TuneError::is_interrupt))
}

/// Log level for a `-v` count
pub fn level_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over the `-v` count.
pub fn init_tracing(verbose: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| level_for(verbose).into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Benchmark names printed by `command`; empty when it fails
pub async fn discover_benchmarks<R: CommandRunner>(
    runner: &R,
    command: &str,
) -> TuneResult<Vec<String>> {
    let listing = runner.capture(command).await?;
    Ok(listing.split_whitespace().map(str::to_string).collect())
}

/// Where the SVG of `benchmark` goes.
///
/// A `{bench}` placeholder is substituted. Without one, a run over several
/// benchmarks suffixes the file stem so curves do not overwrite each other.
pub fn svg_path(template: &Path, benchmark: &str, several: bool) -> PathBuf {
    let text = template.to_string_lossy();
    if text.contains("{bench}") {
        return PathBuf::from(text.replace("{bench}", benchmark));
    }
    if !several {
        return template.to_path_buf();
    }

    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match template.extension() {
        Some(ext) => format!("{stem}-{benchmark}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{benchmark}"),
    };
    template.with_file_name(name)
}
