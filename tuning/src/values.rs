//! Value stream reader
//!
//! Benchmarks dump their results as whitespace-separated float literals with
//! no fixed layout: one per line, a row per line, or anything in between.
//! [`ValueTokens`] yields the literals lazily in file order, one line buffered
//! at a time, so line breaks only matter as separators.

use crate::error::{TuneError, TuneResult};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Lazy iterator over the whitespace-separated tokens of a text stream
pub struct ValueTokens<R> {
    reader: R,
    line: String,
    pending: VecDeque<String>,
    finished: bool,
}

impl<R: BufRead> ValueTokens<R> {
    /// Tokenize `reader` from its current position to end-of-stream
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }
}

impl<R: BufRead> Iterator for ValueTokens<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(Ok(token));
            }
            if self.finished {
                return None;
            }

            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => self.finished = true,
                Ok(_) => self
                    .pending
                    .extend(self.line.split_whitespace().map(str::to_string)),
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Open a result file and tokenize it. Each call starts a fresh pass.
pub fn open_tokens(path: &Path) -> TuneResult<ValueTokens<BufReader<File>>> {
    let file = File::open(path).map_err(|e| TuneError::io(path, e))?;
    Ok(ValueTokens::new(BufReader::new(file)))
}

/// Parse one float literal. Accepts `nan`/`inf` spellings as produced by printf.
pub fn parse_value(token: &str) -> Option<f64> {
    token.parse::<f64>().ok()
}

/// Read every value of a result file, failing on the first non-numeric token
pub fn read_values(path: &Path) -> TuneResult<Vec<f64>> {
    let mut values = Vec::new();
    for token in open_tokens(path)? {
        let token = token.map_err(|e| TuneError::io(path, e))?;
        let value = parse_value(&token).ok_or_else(|| TuneError::Parse {
            path: path.to_path_buf(),
            token: token.clone(),
        })?;
        values.push(value);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(text: &str) -> Vec<String> {
        ValueTokens::new(Cursor::new(text))
            .collect::<io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_tokens_ignore_line_structure() {
        let tokens = collect("1.0 2.0\n3.0\n\n  4.0\t5.0  \n6.0");
        assert_eq!(tokens, vec!["1.0", "2.0", "3.0", "4.0", "5.0", "6.0"]);
    }

    #[test]
    fn test_tokens_empty_stream() {
        assert!(collect("").is_empty());
        assert!(collect("\n \n\t\n").is_empty());
    }

    #[test]
    fn test_tokens_crlf() {
        assert_eq!(collect("1 2\r\n3\r\n"), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_parse_value_special_literals() {
        assert_eq!(parse_value("1.5e-3"), Some(1.5e-3));
        assert_eq!(parse_value("-2"), Some(-2.0));
        assert!(parse_value("nan").unwrap().is_nan());
        assert_eq!(parse_value("-inf"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_value("1,5"), None);
    }

    #[test]
    fn test_read_values_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "0.25 0.5\n1.0\n").unwrap();

        assert_eq!(read_values(&path).unwrap(), vec![0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_read_values_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        std::fs::write(&path, "0.25 oops 1.0\n").unwrap();

        match read_values(&path) {
            Err(TuneError::Parse { token, .. }) => assert_eq!(token, "oops"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_values_missing_file() {
        let err = read_values(Path::new("/nonexistent/out.csv")).unwrap_err();
        assert!(matches!(err, TuneError::Io { .. }));
    }
}
