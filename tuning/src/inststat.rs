//! Instruction mix tables.
//!
//! Instrumented builds dump one `name count` line per instruction kind plus a
//! `*` line carrying the total. This module turns the fixed-point and float
//! dumps of each benchmark into a table of percentages, one column per
//! instruction kind.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{TuneError, TuneResult};

/// Key of the total count line
pub const TOTAL_KEY: &str = "*";

/// Instruction name to fraction of the total
pub type InstructionMix = BTreeMap<String, f64>;

/// Parse a stat dump, normalizing every count by the `*` total
pub fn parse_stat_file(path: &Path) -> TuneResult<InstructionMix> {
    let text = std::fs::read_to_string(path).map_err(|e| TuneError::io(path, e))?;
    parse_stats(&text).map_err(|message| TuneError::StatFile {
        path: path.to_path_buf(),
        message,
    })
}

fn parse_stats(text: &str) -> Result<InstructionMix, String> {
    let mut counts = BTreeMap::new();
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let (Some(name), Some(count)) = (fields.next(), fields.next()) else {
            continue;
        };
        let count: u64 = count
            .parse()
            .map_err(|_| format!("bad count {count:?} for {name}"))?;
        counts.insert(name.to_string(), count);
    }

    let total = match counts.get(TOTAL_KEY) {
        Some(&0) => return Err("total count is zero".to_string()),
        Some(&total) => total as f64,
        None => return Err("missing `*` total line".to_string()),
    };
    Ok(counts
        .into_iter()
        .map(|(name, count)| (name, count as f64 / total))
        .collect())
}

/// Stat dumps of one benchmark: `{bench}_out_ic_fix.txt` and `{bench}_out_ic_float.txt`
pub fn stat_paths(stats_dir: &Path, benchmark: &str) -> (PathBuf, PathBuf) {
    (
        stats_dir.join(format!("{benchmark}_out_ic_fix.txt")),
        stats_dir.join(format!("{benchmark}_out_ic_float.txt")),
    )
}

/// Rows of the instruction mix table, keyed by row label
#[derive(Debug, Default)]
pub struct StatTable {
    rows: BTreeMap<String, InstructionMix>,
}

impl StatTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, mix: InstructionMix) {
        self.rows.insert(label.into(), mix);
    }

    /// Load the `_fix` and `_flo` rows of every benchmark
    pub fn load(stats_dir: &Path, benchmarks: &[String]) -> TuneResult<Self> {
        let mut table = Self::new();
        for bench in benchmarks {
            let (fix, flo) = stat_paths(stats_dir, bench);
            debug!(bench = %bench, fix = %fix.display(), flo = %flo.display(), "Loading stats");
            table.insert(format!("{bench}_fix"), parse_stat_file(&fix)?);
            table.insert(format!("{bench}_flo"), parse_stat_file(&flo)?);
        }
        Ok(table)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sorted instruction names across all rows, total excluded
    pub fn instructions(&self) -> Vec<&str> {
        let names: BTreeSet<&str> = self
            .rows
            .values()
            .flat_map(|mix| mix.keys().map(String::as_str))
            .filter(|name| *name != TOTAL_KEY)
            .collect();
        names.into_iter().collect()
    }

    /// Header row followed by one row per label, percentages to one decimal
    pub fn cells(&self) -> Vec<Vec<String>> {
        let instructions = self.instructions();
        let mut header = vec![String::new()];
        header.extend(instructions.iter().map(|s| s.to_string()));

        let mut cells = vec![header];
        for (label, mix) in &self.rows {
            let mut row = vec![label.clone()];
            row.extend(instructions.iter().map(|inst| match mix.get(*inst) {
                Some(fraction) => format!("{:.1}", fraction * 100.0),
                None => "0.0".to_string(),
            }));
            cells.push(row);
        }
        cells
    }

    pub fn render(&self) -> String {
        materialize(&self.cells())
    }
}

/// Right-justify every column to its widest cell, joining columns with two spaces
pub fn materialize<S: AsRef<str>>(rows: &[Vec<S>]) -> String {
    let mut widths: Vec<usize> = Vec::new();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.as_ref().chars().count();
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(len),
                None => widths.push(len),
            }
        }
    }

    let mut out = String::new();
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:>width$}", cell.as_ref()))
            .collect();
        out.push_str(&line.join("  "));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_by_total() {
        let mix = parse_stats("add 30\nmul 10\n\nstray\n* 40\n").unwrap();
        assert_eq!(mix["add"], 0.75);
        assert_eq!(mix["mul"], 0.25);
        assert_eq!(mix[TOTAL_KEY], 1.0);
        assert!(!mix.contains_key("stray"));
    }

    #[test]
    fn test_parse_requires_total() {
        let err = parse_stats("add 30\n").unwrap_err();
        assert!(err.contains("total"));
        assert!(parse_stats("* 0\n").is_err());
        assert!(parse_stats("add many\n* 4\n").is_err());
    }

    #[test]
    fn test_materialize_right_justifies() {
        let rows = vec![vec!["", "add", "fmul"], vec!["a_fix", "75.0", "0.0"]];
        assert_eq!(
            materialize(&rows),
            "        add  fmul\na_fix  75.0   0.0\n"
        );
    }

    #[test]
    fn test_table_cells_fill_missing_with_zero() {
        let mut table = StatTable::new();
        table.insert("gemm_fix", parse_stats("add 3\nshl 1\n* 4\n").unwrap());
        table.insert("gemm_flo", parse_stats("fadd 1\n* 2\n").unwrap());

        assert_eq!(table.instructions(), vec!["add", "fadd", "shl"]);
        let cells = table.cells();
        assert_eq!(cells[0], vec!["", "add", "fadd", "shl"]);
        assert_eq!(cells[1], vec!["gemm_fix", "75.0", "0.0", "25.0"]);
        assert_eq!(cells[2], vec!["gemm_flo", "0.0", "50.0", "0.0"]);
    }

    #[test]
    fn test_load_reads_both_dumps() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("atax_out_ic_fix.txt"), "add 1\n* 1\n").unwrap();
        std::fs::write(dir.path().join("atax_out_ic_float.txt"), "fadd 1\n* 1\n").unwrap();

        let table = StatTable::load(dir.path(), &["atax".to_string()]).unwrap();
        let rendered = table.render();
        assert_eq!(rendered.lines().count(), 3);
        assert!(rendered.lines().nth(1).unwrap().starts_with("atax_fix"));
    }

    #[test]
    fn test_load_missing_dump_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = StatTable::load(dir.path(), &["atax".to_string()]).unwrap_err();
        assert!(matches!(err, TuneError::Io { .. }));
    }
}
