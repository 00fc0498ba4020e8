//! Per-run data quality report
//!
//! Row-level problems never abort a stage. They are counted here and surfaced
//! in the run summary.

use crate::store::Dataset;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityKind {
    /// Rows were removed
    DataQualityWarning,
    /// Values were nulled because no lookup entry or bin matched
    EncodingGapWarning,
}

impl fmt::Display for QualityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityKind::DataQualityWarning => f.write_str("DataQualityWarning"),
            QualityKind::EncodingGapWarning => f.write_str("EncodingGapWarning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityEvent {
    pub stage: String,
    pub dataset: Dataset,
    pub kind: QualityKind,
    pub rule: String,
    pub column: Option<String>,
    pub rows_affected: usize,
}

/// Observation produced by a transform, before it is attributed to a stage
#[derive(Debug, Clone, PartialEq)]
pub struct QualityNote {
    pub kind: QualityKind,
    pub rule: String,
    pub column: Option<String>,
    pub rows_affected: usize,
}

impl QualityNote {
    pub fn rows_removed(rule: impl Into<String>, column: Option<&str>, rows: usize) -> Self {
        Self {
            kind: QualityKind::DataQualityWarning,
            rule: rule.into(),
            column: column.map(str::to_string),
            rows_affected: rows,
        }
    }

    pub fn encoding_gap(rule: impl Into<String>, column: &str, rows: usize) -> Self {
        Self {
            kind: QualityKind::EncodingGapWarning,
            rule: rule.into(),
            column: Some(column.to_string()),
            rows_affected: rows,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    events: Vec<QualityEvent>,
}

impl QualityReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record transform notes for a stage, skipping the ones that affected no rows
    pub fn extend(&mut self, stage: &str, dataset: Dataset, notes: Vec<QualityNote>) {
        for note in notes {
            if note.rows_affected == 0 {
                continue;
            }
            tracing::warn!(
                stage,
                dataset = %dataset,
                kind = %note.kind,
                rule = %note.rule,
                column = note.column.as_deref().unwrap_or("-"),
                rows = note.rows_affected,
                "Data quality issue"
            );
            self.events.push(QualityEvent {
                stage: stage.to_string(),
                dataset,
                kind: note.kind,
                rule: note.rule,
                column: note.column,
                rows_affected: note.rows_affected,
            });
        }
    }

    pub fn events(&self) -> &[QualityEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn count(&self, kind: QualityKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Total rows affected by events of `kind`
    pub fn rows_affected(&self, kind: QualityKind) -> usize {
        self.events
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.rows_affected)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_row_notes_are_skipped() {
        let mut report = QualityReport::new();
        report.extend(
            "clean",
            Dataset::CustomerInfo,
            vec![
                QualityNote::rows_removed("unknown_value", Some("job_type"), 0),
                QualityNote::rows_removed("outlier", Some("age"), 2),
            ],
        );
        assert_eq!(report.events().len(), 1);
        assert_eq!(report.events()[0].stage, "clean");
    }

    #[test]
    fn test_counts_by_kind() {
        let mut report = QualityReport::new();
        report.extend(
            "derive",
            Dataset::CustomerLoanInfo,
            vec![
                QualityNote::encoding_gap("bin", "age", 3),
                QualityNote::encoding_gap("bin", "avg_yearly_balance", 1),
                QualityNote::rows_removed("join_unmatched", None, 5),
            ],
        );
        assert_eq!(report.count(QualityKind::EncodingGapWarning), 2);
        assert_eq!(report.rows_affected(QualityKind::EncodingGapWarning), 4);
        assert_eq!(report.rows_affected(QualityKind::DataQualityWarning), 5);
    }
}
