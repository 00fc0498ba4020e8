use super::ValidationOutcome;
use crate::arrival::ArrivalKey;
use crate::error::LakeResult;
use crate::store::codec;
use crate::table::{Column, Table};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Path of a dataset's report for one run
pub fn report_path(reports_dir: &Path, key: &ArrivalKey, outcome: &ValidationOutcome) -> PathBuf {
    reports_dir
        .join(key.as_str())
        .join(format!("{}_validation_report.csv", outcome.dataset))
}

/// Failed expectations as a table, one row per failure
pub fn to_table(outcome: &ValidationOutcome) -> Table {
    let failures = &outcome.failures;
    let columns = vec![
        Column::text(
            "expectation",
            failures.iter().map(|f| Some(f.expectation.clone())).collect(),
        ),
        Column::text("column", failures.iter().map(|f| f.column.clone()).collect()),
        Column::text(
            "severity",
            failures.iter().map(|f| Some(f.severity.to_string())).collect(),
        ),
        Column::text("observed", failures.iter().map(|f| Some(f.observed.clone())).collect()),
    ];
    // Columns are built with equal lengths and distinct names
    Table::new(columns).unwrap_or_default()
}

/// Write the report CSV; a header-only file means nothing failed
pub fn write_report(
    reports_dir: &Path,
    key: &ArrivalKey,
    outcome: &ValidationOutcome,
) -> LakeResult<PathBuf> {
    let path = report_path(reports_dir, key, outcome);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut writer = BufWriter::new(File::create(&path)?);
    codec::write_csv(&mut writer, &to_table(outcome))?;
    writer.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Dataset;
    use crate::validation::{FailedExpectation, Severity};
    use tempfile::TempDir;

    fn outcome(failures: Vec<FailedExpectation>) -> ValidationOutcome {
        ValidationOutcome {
            dataset: Dataset::LoanInfo,
            rule_set: "loan_info_raw".to_string(),
            evaluated: 3,
            failures,
        }
    }

    #[test]
    fn test_report_lands_under_arrival_key() {
        let dir = TempDir::new().unwrap();
        let key = ArrivalKey::parse("20250823").unwrap();
        let path = write_report(
            dir.path(),
            &key,
            &outcome(vec![FailedExpectation {
                expectation: "expect_column_values_to_be_in_set".to_string(),
                column: Some("poutcome".to_string()),
                severity: Severity::Warning,
                observed: "2 unexpected value(s): [other, unknown]".to_string(),
            }]),
        )
        .unwrap();

        assert_eq!(
            path,
            dir.path().join("20250823").join("loan_info_validation_report.csv")
        );
        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("expectation,column,severity,observed"));
        assert!(lines.next().unwrap().contains("poutcome"));
    }

    #[test]
    fn test_empty_outcome_writes_header_only() {
        let dir = TempDir::new().unwrap();
        let key = ArrivalKey::parse("20250823").unwrap();
        let path = write_report(dir.path(), &key, &outcome(Vec::new())).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), "expectation,column,severity,observed");
    }
}
