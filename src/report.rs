//! Discrepancy and result types produced by the differ.

use crate::differ::Key;
use recon_core::Row;
use serde::Serialize;
use std::collections::BTreeSet;

/// Per-kind cap on the discrepancy samples kept in a
/// [`ReconciliationResult`], so reports stay small over huge datasets.
pub const SAMPLE_LIMIT: usize = 100;

/// Classification of a detected discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiscrepancyKind {
    Missing,
    Extra,
    Mismatch,
}

/// A key present on both sides whose rows differ in at least one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub key: Key,
    pub source_row: Row,
    pub target_row: Row,
    /// Fields that differ after normalization, sorted by name.
    pub differing_fields: Vec<String>,
}

/// A detected difference between the source and target copies of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Discrepancy {
    /// Key present in the source, absent from the target.
    Missing { key: Key, row: Row },

    /// Key present in the target, absent from the source.
    Extra { key: Key, row: Row },

    /// Key present on both sides with differing fields.
    Mismatch(Mismatch),
}

impl Discrepancy {
    pub fn kind(&self) -> DiscrepancyKind {
        match self {
            Discrepancy::Missing { .. } => DiscrepancyKind::Missing,
            Discrepancy::Extra { .. } => DiscrepancyKind::Extra,
            Discrepancy::Mismatch(_) => DiscrepancyKind::Mismatch,
        }
    }

    pub fn key(&self) -> &Key {
        match self {
            Discrepancy::Missing { key, .. } => key,
            Discrepancy::Extra { key, .. } => key,
            Discrepancy::Mismatch(mismatch) => &mismatch.key,
        }
    }
}

/// Processing statistics for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub source_rows_scanned: usize,
    pub target_rows_scanned: usize,
    pub batches_processed: usize,
}

/// Aggregate outcome of a discrepancy scan.
///
/// Counts are exact; the per-kind sample lists are capped at
/// [`SAMPLE_LIMIT`] entries each.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationResult {
    pub missing_count: usize,
    pub extra_count: usize,
    pub mismatch_count: usize,
    /// Keys present on both sides whose rows compared equal.
    pub matched_count: usize,
    pub missing_samples: Vec<Discrepancy>,
    pub extra_samples: Vec<Discrepancy>,
    pub mismatch_samples: Vec<Discrepancy>,
    pub stats: ScanStats,
}

impl ReconciliationResult {
    pub fn total_discrepancies(&self) -> usize {
        self.missing_count + self.extra_count + self.mismatch_count
    }

    /// Check if the two datasets are in sync.
    pub fn is_consistent(&self) -> bool {
        self.total_discrepancies() == 0
    }

    /// Percentage of source rows present and matching in the target,
    /// rounded to two decimal places. 100.0 for an empty source.
    pub fn match_percentage(&self) -> f64 {
        let source_rows = self.stats.source_rows_scanned;
        if source_rows == 0 {
            return 100.0;
        }
        let issues = self.missing_count + self.mismatch_count;
        let matching = source_rows.saturating_sub(issues);
        let percentage = (matching as f64 / source_rows as f64) * 100.0;
        (percentage * 100.0).round() / 100.0
    }

    /// Get a summary string.
    pub fn summary(&self) -> String {
        if self.is_consistent() {
            format!(
                "Reconciliation PASSED: {} matched, {} source / {} target rows scanned",
                self.matched_count,
                self.stats.source_rows_scanned,
                self.stats.target_rows_scanned
            )
        } else {
            format!(
                "Reconciliation FAILED: {} missing, {} extra, {} mismatched",
                self.missing_count, self.extra_count, self.mismatch_count
            )
        }
    }

    /// Count a discrepancy and retain it as a sample while the per-kind
    /// cap allows.
    pub(crate) fn record(&mut self, discrepancy: Discrepancy) {
        let samples = match discrepancy.kind() {
            DiscrepancyKind::Missing => {
                self.missing_count += 1;
                &mut self.missing_samples
            }
            DiscrepancyKind::Extra => {
                self.extra_count += 1;
                &mut self.extra_samples
            }
            DiscrepancyKind::Mismatch => {
                self.mismatch_count += 1;
                &mut self.mismatch_samples
            }
        };
        if samples.len() < SAMPLE_LIMIT {
            samples.push(discrepancy);
        }
    }
}

/// Field-name differences between the two datasets' schemas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaDiff {
    pub only_in_source: BTreeSet<String>,
    pub only_in_target: BTreeSet<String>,
    pub common_fields: BTreeSet<String>,
}

/// A key that occurs more than once within one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    pub key: Key,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_consistency() {
        let mut result = ReconciliationResult::default();
        assert!(result.is_consistent());

        result.record(Discrepancy::Missing {
            key: Key::Single("1".to_string()),
            row: Row::new(),
        });
        assert!(!result.is_consistent());
        assert_eq!(result.total_discrepancies(), 1);
        assert_eq!(result.missing_samples.len(), 1);
    }

    #[test]
    fn test_sample_cap() {
        let mut result = ReconciliationResult::default();
        for i in 0..(SAMPLE_LIMIT + 50) {
            result.record(Discrepancy::Extra {
                key: Key::Single(i.to_string()),
                row: Row::new(),
            });
        }
        assert_eq!(result.extra_count, SAMPLE_LIMIT + 50);
        assert_eq!(result.extra_samples.len(), SAMPLE_LIMIT);
    }

    #[test]
    fn test_match_percentage() {
        let result = ReconciliationResult {
            missing_count: 1,
            mismatch_count: 1,
            stats: ScanStats {
                source_rows_scanned: 3,
                target_rows_scanned: 3,
                batches_processed: 1,
            },
            ..Default::default()
        };
        assert_eq!(result.match_percentage(), 33.33);

        let empty = ReconciliationResult::default();
        assert_eq!(empty.match_percentage(), 100.0);
    }

    #[test]
    fn test_summary() {
        let ok = ReconciliationResult {
            matched_count: 5,
            stats: ScanStats {
                source_rows_scanned: 5,
                target_rows_scanned: 5,
                batches_processed: 1,
            },
            ..Default::default()
        };
        assert!(ok.summary().contains("PASSED"));

        let bad = ReconciliationResult {
            extra_count: 2,
            ..Default::default()
        };
        assert!(bad.summary().contains("FAILED"));
    }
}
