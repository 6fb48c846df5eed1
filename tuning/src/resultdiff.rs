//! Overflow-aware comparison of a fixed-point result file against its
//! floating-point counterpart.
//!
//! Pairs where the fixed-point value obviously wrapped around (sign flip,
//! or a large float value missed by more than twice its magnitude) are counted
//! as overflows instead of polluting the error averages.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TuneError, TuneResult};
use crate::values::{open_tokens, parse_value};

/// Float values at or below this magnitude are never treated as overflowed
const OVERFLOW_FLOOR: f64 = 0.01;

/// Accumulated comparison of two result files
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffStats {
    /// Pairs where the fixed-point value is unusable
    pub fix_overflows: u64,
    /// Pairs where the float reference itself is NaN
    pub flo_overflows: u64,
    /// Pairs that contributed to the error sums
    pub n: u64,
    /// Sum of `|flo - fix|` over accumulated pairs
    pub acc_err: f64,
    /// Sum of `flo` over accumulated pairs
    pub acc_val: f64,
}

impl DiffStats {
    /// Classify one `(fixed, float)` pair
    pub fn push(&mut self, fix: f64, flo: f64) {
        if fix.is_nan() {
            self.fix_overflows += 1;
        } else if flo.is_nan() {
            self.flo_overflows += 1;
            self.fix_overflows += 1;
        } else if flo.abs() > OVERFLOW_FLOOR
            && ((flo + fix).abs() != flo.abs() + fix.abs()
                || (flo > 1.0 && (flo - fix).abs() > flo.abs() * 2.0))
        {
            self.fix_overflows += 1;
        } else {
            self.n += 1;
            self.acc_err += (flo - fix).abs();
            self.acc_val += flo;
        }
    }

    /// Accumulated error relative to accumulated value, in percent
    pub fn relative_percent(&self) -> Option<f64> {
        (self.acc_val > 0.0 && self.n > 0).then(|| self.acc_err / self.acc_val * 100.0)
    }

    /// Mean absolute error over accumulated pairs
    pub fn mean_abs(&self) -> Option<f64> {
        (self.n > 0).then(|| self.acc_err / self.n as f64)
    }
}

impl fmt::Display for DiffStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.fix_overflows, self.flo_overflows)?;
        match self.relative_percent() {
            Some(rel) => write!(f, "{rel:.5}")?,
            None => write!(f, "-")?,
        }
        match self.mean_abs() {
            Some(mean) => write!(f, " {}", c_exp(mean, 5)),
            None => write!(f, " -"),
        }
    }
}

/// Compare two result files pair by pair, stopping at the shorter one
pub fn compare(fix_path: &Path, flo_path: &Path) -> TuneResult<DiffStats> {
    let mut stats = DiffStats::default();
    for (fix, flo) in open_tokens(fix_path)?.zip(open_tokens(flo_path)?) {
        let fix = value(fix_path, fix)?;
        let flo = value(flo_path, flo)?;
        stats.push(fix, flo);
    }
    Ok(stats)
}

fn value(path: &Path, token: std::io::Result<String>) -> TuneResult<f64> {
    let token = token.map_err(|e| TuneError::io(path, e))?;
    parse_value(&token).ok_or_else(|| TuneError::Parse {
        path: path.to_path_buf(),
        token,
    })
}

/// `printf("%.*e")` layout: signed exponent with at least two digits
fn c_exp(value: f64, precision: usize) -> String {
    let s = format!("{value:.precision$e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_accumulates_close_values() {
        let mut stats = DiffStats::default();
        stats.push(1.1, 1.0);
        stats.push(2.0, 2.0);

        assert_eq!(stats.n, 2);
        assert_eq!(stats.fix_overflows, 0);
        assert!((stats.acc_err - 0.1).abs() < 1e-12);
        assert!((stats.relative_percent().unwrap() - 10.0 / 3.0).abs() < 1e-9);
        assert!((stats.mean_abs().unwrap() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_nan_classification() {
        let mut stats = DiffStats::default();
        stats.push(f64::NAN, 1.0);
        assert_eq!((stats.fix_overflows, stats.flo_overflows), (1, 0));

        stats.push(1.0, f64::NAN);
        assert_eq!((stats.fix_overflows, stats.flo_overflows), (2, 1));
        assert_eq!(stats.n, 0);
    }

    #[test]
    fn test_sign_flip_is_overflow() {
        let mut stats = DiffStats::default();
        stats.push(-3.0, 5.0);
        assert_eq!(stats.fix_overflows, 1);

        // Below the floor a sign flip is just noise
        stats.push(-0.001, 0.005);
        assert_eq!(stats.fix_overflows, 1);
        assert_eq!(stats.n, 1);
    }

    #[test]
    fn test_large_miss_is_overflow() {
        let mut stats = DiffStats::default();
        stats.push(40.0, 10.0);
        assert_eq!(stats.fix_overflows, 1);

        // Same ratio, but float value not above 1
        stats.push(3.5, 0.9);
        assert_eq!(stats.fix_overflows, 1);
        assert_eq!(stats.n, 1);
    }

    #[test]
    fn test_display_dashes_when_empty() {
        assert_eq!(DiffStats::default().to_string(), "0 0 - -");

        // Negative accumulated value hides the relative error only
        let mut stats = DiffStats::default();
        stats.push(-1.5, -1.0);
        assert_eq!(stats.to_string(), "0 0 - 5.00000e-01");
    }

    #[test]
    fn test_c_exp_layout() {
        assert_eq!(c_exp(0.0123, 5), "1.23000e-02");
        assert_eq!(c_exp(12345.0, 2), "1.23e+04");
        assert_eq!(c_exp(0.0, 5), "0.00000e+00");
        assert_eq!(c_exp(1e-120, 1), "1.0e-120");
    }

    #[test]
    fn test_compare_files_zip_to_shorter() {
        let dir = tempfile::tempdir().unwrap();
        let fix = write_file(dir.path(), "fix.txt", "1.1 2.0\n-3.0\n9.0 9.0\n");
        let flo = write_file(dir.path(), "flo.txt", "1.0\n2.0 5.0\n");

        let stats = compare(&fix, &flo).unwrap();
        assert_eq!(stats.n, 2);
        assert_eq!(stats.fix_overflows, 1);
        assert_eq!(stats.to_string(), "1 0 3.33333 5.00000e-02");
    }

    #[test]
    fn test_compare_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let fix = write_file(dir.path(), "fix.txt", "1.0 oops\n");
        let flo = write_file(dir.path(), "flo.txt", "1.0 2.0\n");

        let err = compare(&fix, &flo).unwrap_err();
        assert!(matches!(err, TuneError::Parse { ref token, .. } if token == "oops"));
    }

    #[test]
    fn test_compare_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let flo = write_file(dir.path(), "flo.txt", "1.0\n");
        let err = compare(&dir.path().join("absent.txt"), &flo).unwrap_err();
        assert!(matches!(err, TuneError::Io { .. }));
    }
}
