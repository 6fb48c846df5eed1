//! Tuner configuration
//!
//! Defaults match the polybench layout: a `compile_everything.sh` driver at the
//! repository root, binaries in `./build`, results in `./output-data-<tot>`.
//! Layering, lowest to highest: defaults, TOML file, `AUTOTUNE_*` variables,
//! then whatever the CLI overrides on the returned value.
//!
//! Command and path templates use `{bench}`, `{frac}`, `{tot}` and `{dbl}`
//! placeholders, see [`render_template`].

use crate::error::{TuneError, TuneResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the current directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "autotune.toml";

/// Threshold used when nothing overrides it
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Total fixed-point width used when nothing overrides it
pub const DEFAULT_TOTAL_BITS: u32 = 32;

/// Widest fixed-point word the build driver can produce
pub const MAX_TOTAL_BITS: u32 = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Directory commands run in and relative paths resolve against
    pub working_dir: PathBuf,
    /// Rebuilds one benchmark for one configuration
    pub build_command: String,
    /// Substituted for `{dbl}` when the reference is double precision
    pub double_flag: String,
    /// Runs the floating-point reference binary
    pub reference_command: String,
    /// Runs the fixed-point candidate binary
    pub candidate_command: String,
    /// Result file the reference writes its values to
    pub reference_output: String,
    /// Result file the candidate writes its values to
    pub candidate_output: String,
    /// Build stderr is appended here
    pub build_log: PathBuf,
    /// Argument to `ulimit -s`; `none` leaves the limit untouched
    pub stack_limit: String,
    /// Maximum acceptable error score
    pub threshold: f64,
    /// Fixed-point width of the run
    pub total_bits: u32,
    /// Prints the benchmark list on stdout
    pub bench_list_command: String,
    /// Directory holding instruction count dumps
    pub stats_dir: PathBuf,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            build_command: "./compile_everything.sh --only={bench} --frac={frac} --tot={tot}{dbl}"
                .to_string(),
            double_flag: " --dbl".to_string(),
            reference_command: "./build/{bench}_out_not_opt".to_string(),
            candidate_command: "./build/{bench}_out".to_string(),
            reference_output: "output-data-{tot}/{bench}_out_not_opt.output.csv".to_string(),
            candidate_output: "output-data-{tot}/{bench}_out.output.csv".to_string(),
            build_log: PathBuf::from("build.log"),
            stack_limit: crate::exec::default_stack_limit().unwrap_or_else(|| "none".to_string()),
            threshold: DEFAULT_THRESHOLD,
            total_bits: DEFAULT_TOTAL_BITS,
            bench_list_command: "./compile_everything.sh --dump-bench-list".to_string(),
            stats_dir: PathBuf::from("stats"),
        }
    }
}

impl TunerConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(text: &str) -> TuneResult<Self> {
        toml::from_str(text).map_err(|e| TuneError::InvalidConfig(e.to_string()))
    }

    /// Read a TOML config file
    pub fn from_file(path: &Path) -> TuneResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| TuneError::io(path, e))?;
        Self::from_toml(&text)
    }

    /// Load the explicit file, else `autotune.toml` if present, else defaults,
    /// then apply environment overrides
    pub fn load(path: Option<&Path>) -> TuneResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Apply `AUTOTUNE_*` environment variables
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any variable source. Unparsable numbers are ignored.
    pub fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("AUTOTUNE_WORKING_DIR") {
            self.working_dir = PathBuf::from(dir);
        }
        if let Some(cmd) = var("AUTOTUNE_BUILD_COMMAND") {
            self.build_command = cmd;
        }
        if let Some(path) = var("AUTOTUNE_BUILD_LOG") {
            self.build_log = PathBuf::from(path);
        }
        if let Some(limit) = var("AUTOTUNE_STACK_LIMIT") {
            self.stack_limit = limit;
        }
        if let Some(threshold) = var("AUTOTUNE_THRESHOLD") {
            if let Ok(t) = threshold.parse() {
                self.threshold = t;
            }
        }
        if let Some(bits) = var("AUTOTUNE_TOTAL_BITS") {
            if let Ok(n) = bits.parse() {
                self.total_bits = n;
            }
        }
        if let Some(dir) = var("AUTOTUNE_STATS_DIR") {
            self.stats_dir = PathBuf::from(dir);
        }
    }

    /// `ulimit -s` argument, `None` when disabled
    pub fn stack_limit(&self) -> Option<String> {
        match self.stack_limit.trim() {
            "" | "none" => None,
            limit => Some(limit.to_string()),
        }
    }

    /// Reject settings the search cannot work with
    pub fn validate(&self) -> TuneResult<()> {
        if !(2..=MAX_TOTAL_BITS).contains(&self.total_bits) {
            return Err(TuneError::InvalidConfig(format!(
                "total_bits must be between 2 and {MAX_TOTAL_BITS}, got {}",
                self.total_bits
            )));
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(TuneError::InvalidConfig(format!(
                "threshold must be a non-negative number, got {}",
                self.threshold
            )));
        }
        for (name, template) in [
            ("build_command", &self.build_command),
            ("reference_command", &self.reference_command),
            ("candidate_command", &self.candidate_command),
            ("reference_output", &self.reference_output),
            ("candidate_output", &self.candidate_output),
        ] {
            if !template.contains("{bench}") {
                return Err(TuneError::InvalidConfig(format!(
                    "{name} must contain {{bench}}: {template:?}"
                )));
            }
        }
        Ok(())
    }
}

/// Values substituted into command and path templates
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    /// Benchmark name, shell-quoted when rendering commands
    pub bench: &'a str,
    pub frac: i32,
    pub tot: u32,
    /// Double-precision flag, or empty
    pub dbl: &'a str,
}

/// Substitute `{bench}`, `{frac}`, `{tot}` and `{dbl}` in a template
pub fn render_template(template: &str, vars: &TemplateVars<'_>) -> String {
    template
        .replace("{bench}", vars.bench)
        .replace("{frac}", &vars.frac.to_string())
        .replace("{tot}", &vars.tot.to_string())
        .replace("{dbl}", vars.dbl)
}
