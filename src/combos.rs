//! Threshold combinations produced by DEG filtering.
//!
//! DEG filtering writes one directory per (fold-change, p-value) pair,
//! labelled `FC<fc>_p<pval>`, plus an index CSV with a `combo` column.
//! Labels are formatted from floats, so matching is approximate.

use crate::error::{GatewayError, Result};
use anyhow::Context;
use std::path::Path;
use tracing::debug;

/// Name of the index file listing every combination label.
pub const INDEX_FILE: &str = "combo_names.csv";

/// Relative tolerance for threshold comparison.
pub const RELATIVE_TOLERANCE: f64 = 1e-3;

const ABSOLUTE_FLOOR: f64 = 1e-12;

/// A parsed combination label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Combination {
    pub fc: f64,
    pub pval: f64,
}

impl Combination {
    /// Parse `FC<fc>_p<pval>`; anything else yields `None`.
    pub fn parse(label: &str) -> Option<Self> {
        let (fc_part, p_part) = label.trim().split_once('_')?;
        let fc = fc_part.strip_prefix("FC")?.parse::<f64>().ok()?;
        let pval = p_part.strip_prefix('p')?.parse::<f64>().ok()?;
        if !fc.is_finite() || !pval.is_finite() {
            return None;
        }
        Some(Self { fc, pval })
    }

    /// Label in the form DEG filtering writes.
    pub fn label(&self) -> String {
        format!("FC{}_p{}", self.fc, self.pval)
    }

    pub fn matches(&self, fc: f64, pval: f64) -> bool {
        approx_eq(self.fc, fc) && approx_eq(self.pval, pval)
    }
}

/// Relative-tolerance float comparison.
pub fn approx_eq(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs());
    (a - b).abs() <= (RELATIVE_TOLERANCE * scale).max(ABSOLUTE_FLOOR)
}

/// Read the `combo` column of an index CSV.
pub fn read_index(path: &Path) -> Result<Vec<String>> {
    if !path.is_file() {
        return Err(GatewayError::NotFound(format!(
            "{} not found",
            path.display()
        )));
    }

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .clone();
    let column = headers
        .iter()
        .position(|h| h.trim() == "combo")
        .ok_or_else(|| {
            GatewayError::bad_input(format!("{} has no 'combo' column", path.display()))
        })?;

    let mut labels = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Failed to parse {}", path.display()))?;
        if let Some(label) = record.get(column) {
            let label = label.trim();
            if !label.is_empty() {
                labels.push(label.to_string());
            }
        }
    }

    debug!("Read {} combinations from {}", labels.len(), path.display());
    Ok(labels)
}

/// Keep labels whose encoded thresholds match the request.
pub fn select<'a>(labels: &'a [String], fc: f64, pval: f64) -> Vec<&'a str> {
    labels
        .iter()
        .filter(|label| Combination::parse(label).is_some_and(|c| c.matches(fc, pval)))
        .map(String::as_str)
        .collect()
}

/// Load the index under `combo_root` and select matching combinations.
///
/// An empty selection is an input error, never an empty success.
pub fn select_from_index(combo_root: &Path, fc: f64, pval: f64) -> Result<Vec<String>> {
    let labels = read_index(&combo_root.join(INDEX_FILE))?;
    let selected: Vec<String> = select(&labels, fc, pval)
        .into_iter()
        .map(String::from)
        .collect();

    if selected.is_empty() {
        return Err(GatewayError::bad_input(format!(
            "No matching combos found for {} in {}",
            Combination { fc, pval }.label(),
            combo_root.join(INDEX_FILE).display()
        )));
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_label() {
        assert_eq!(
            Combination::parse("FC2.0_p0.05"),
            Some(Combination { fc: 2.0, pval: 0.05 })
        );
        assert_eq!(
            Combination::parse("FC1_p0.001"),
            Some(Combination { fc: 1.0, pval: 0.001 })
        );
        assert_eq!(Combination::parse("FC2"), None);
        assert_eq!(Combination::parse("XX2_p0.05"), None);
        assert_eq!(Combination::parse("FC2_q0.05"), None);
        assert_eq!(Combination::parse("FCabc_p0.05"), None);
    }

    #[test]
    fn test_label_round_trips_r_formatting() {
        assert_eq!(Combination { fc: 1.0, pval: 0.05 }.label(), "FC1_p0.05");
        assert_eq!(Combination { fc: 1.5, pval: 0.01 }.label(), "FC1.5_p0.01");
    }

    #[test]
    fn test_tolerant_matching() {
        let c = Combination::parse("FC2.0_p0.05").unwrap();
        assert!(c.matches(2.0000001, 0.05));
        assert!(c.matches(2.0, 0.05000001));
        assert!(!c.matches(2.1, 0.05));
        assert!(!c.matches(2.0, 0.01));
    }

    #[test]
    fn test_approx_eq_near_zero() {
        assert!(approx_eq(0.0, 0.0));
        assert!(!approx_eq(0.0, 1e-6));
        assert!(approx_eq(1000.0, 1000.5));
    }

    #[test]
    fn test_select_skips_unparseable_labels() {
        let labels = vec![
            "FC1_p0.05".to_string(),
            "FC2_p0.05".to_string(),
            "junk".to_string(),
            "FC2_p0.01".to_string(),
        ];
        assert_eq!(select(&labels, 2.0, 0.05), vec!["FC2_p0.05"]);
        assert!(select(&labels, 3.0, 0.05).is_empty());
    }

    #[test]
    fn test_read_index_handles_r_quoting() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(INDEX_FILE),
            "\"combo\"\n\"FC1_p0.05\"\n\"FC2_p0.05\"\n",
        )
        .unwrap();

        let labels = read_index(&dir.path().join(INDEX_FILE)).unwrap();
        assert_eq!(labels, vec!["FC1_p0.05", "FC2_p0.05"]);
    }

    #[test]
    fn test_missing_index_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = select_from_index(dir.path(), 1.0, 0.05).unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[test]
    fn test_no_match_is_bad_input() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(INDEX_FILE), "combo\nFC1_p0.05\n").unwrap();

        let err = select_from_index(dir.path(), 4.0, 0.05).unwrap_err();
        assert!(matches!(err, GatewayError::BadInput(_)));

        let ok = select_from_index(dir.path(), 1.0000001, 0.05).unwrap();
        assert_eq!(ok, vec!["FC1_p0.05"]);
    }
}
