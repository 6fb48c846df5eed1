//! Error metric
//!
//! Worst-case relative deviation of a fixed-point run from its float
//! reference: the largest absolute sample difference divided by the largest
//! reference magnitude. One overflowed sample is enough to fail a bit-width.

/// Score reported when the candidate produced no usable output
pub const FAILURE_SENTINEL: f64 = 2.0;

/// Reduce a reference and a candidate sequence to one error score.
///
/// Degenerate inputs never panic:
/// - empty candidate, length mismatch or a NaN difference → [`FAILURE_SENTINEL`]
/// - all-zero reference → `0.0` when the candidate matches exactly, otherwise the sentinel
pub fn score(reference: &[f64], candidate: &[f64]) -> f64 {
    if candidate.is_empty() || candidate.len() != reference.len() {
        return FAILURE_SENTINEL;
    }

    let max_ref = reference.iter().fold(0.0_f64, |acc, r| acc.max(r.abs()));

    let mut max_abs_diff = 0.0_f64;
    for (r, c) in reference.iter().zip(candidate) {
        let diff = (c - r).abs();
        if diff.is_nan() {
            return FAILURE_SENTINEL;
        }
        max_abs_diff = max_abs_diff.max(diff);
    }

    if max_ref == 0.0 {
        return if max_abs_diff == 0.0 {
            0.0
        } else {
            FAILURE_SENTINEL
        };
    }

    max_abs_diff / max_ref
}

/// Whether a score means the candidate did not run to completion
pub fn is_failure(score: f64) -> bool {
    score == FAILURE_SENTINEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_relative_to_largest_reference() {
        let s = score(&[1.0, 2.0, 4.0], &[1.0, 2.0, 4.4]);
        assert!((s - 0.1).abs() < 1e-12, "got {s}");
    }

    #[test]
    fn test_score_uses_magnitudes() {
        // Largest magnitude is |-8|, largest diff is 0.8
        let s = score(&[-8.0, 1.0], &[-7.2, 1.0]);
        assert!((s - 0.1).abs() < 1e-12, "got {s}");
    }

    #[test]
    fn test_exact_match_is_zero() {
        assert_eq!(score(&[3.0, -1.0, 0.5], &[3.0, -1.0, 0.5]), 0.0);
    }

    #[test]
    fn test_empty_candidate_is_sentinel() {
        assert_eq!(score(&[1.0, 2.0], &[]), FAILURE_SENTINEL);
        assert_eq!(score(&[], &[]), FAILURE_SENTINEL);
        assert!(is_failure(score(&[1.0], &[])));
    }

    #[test]
    fn test_length_mismatch_is_sentinel() {
        assert_eq!(score(&[1.0, 2.0, 4.0], &[1.0, 2.0]), FAILURE_SENTINEL);
        assert_eq!(score(&[1.0], &[1.0, 2.0]), FAILURE_SENTINEL);
    }

    #[test]
    fn test_zero_reference() {
        assert_eq!(score(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(score(&[0.0, 0.0], &[0.0, 1e-9]), FAILURE_SENTINEL);
    }

    #[test]
    fn test_nan_candidate_is_sentinel() {
        assert_eq!(score(&[1.0, 2.0], &[1.0, f64::NAN]), FAILURE_SENTINEL);
    }

    #[test]
    fn test_infinite_candidate_is_infinite_score() {
        assert_eq!(score(&[1.0, 2.0], &[1.0, f64::INFINITY]), f64::INFINITY);
    }

    #[test]
    fn test_large_error_is_not_failure() {
        let s = score(&[1.0], &[4.0]);
        assert_eq!(s, 3.0);
        assert!(!is_failure(s));
    }
}
