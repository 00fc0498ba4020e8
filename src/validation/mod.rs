//! Data validation
//!
//! A [`RuleSet`] is a list of expectations over one table. The [`Validator`]
//! evaluates all of them and reports the ones that failed together with what
//! was observed. Failures are data, not errors: whether a failure blocks the
//! pipeline is decided by its [`Severity`] at the cleaning gate.

pub mod report;
pub mod rules;

use crate::error::LakeResult;
use crate::store::Dataset;
use crate::table::{ColumnData, DataType, Table};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Distinct unexpected values kept as evidence
const MAX_UNEXPECTED: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Blocks cleaning
    Required,
    /// Reported only
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Required => f.write_str("required"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expectation {
    ColumnsMatchOrderedList(Vec<String>),
    ColumnType { column: String, data_type: DataType },
    ValuesInSet { column: String, values: Vec<String> },
    ValuesBetween {
        column: String,
        min: Option<f64>,
        max: Option<f64>,
    },
    Unique { column: String },
    NotNull { column: String },
}

impl Expectation {
    /// Stable name used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            Expectation::ColumnsMatchOrderedList(_) => "expect_table_columns_to_match_ordered_list",
            Expectation::ColumnType { .. } => "expect_column_values_to_be_of_type",
            Expectation::ValuesInSet { .. } => "expect_column_values_to_be_in_set",
            Expectation::ValuesBetween { .. } => "expect_column_values_to_be_between",
            Expectation::Unique { .. } => "expect_column_values_to_be_unique",
            Expectation::NotNull { .. } => "expect_column_values_to_not_be_null",
        }
    }

    pub fn column(&self) -> Option<&str> {
        match self {
            Expectation::ColumnsMatchOrderedList(_) => None,
            Expectation::ColumnType { column, .. }
            | Expectation::ValuesInSet { column, .. }
            | Expectation::ValuesBetween { column, .. }
            | Expectation::Unique { column }
            | Expectation::NotNull { column } => Some(column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub expectation: Expectation,
    pub severity: Severity,
}

impl Rule {
    pub fn required(expectation: Expectation) -> Self {
        Self {
            expectation,
            severity: Severity::Required,
        }
    }

    pub fn warning(expectation: Expectation) -> Self {
        Self {
            expectation,
            severity: Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    pub dataset: Dataset,
    pub rules: Vec<Rule>,
}

/// One failed expectation and its evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedExpectation {
    pub expectation: String,
    pub column: Option<String>,
    pub severity: Severity,
    pub observed: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub dataset: Dataset,
    pub rule_set: String,
    pub evaluated: usize,
    pub failures: Vec<FailedExpectation>,
}

impl ValidationOutcome {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn required_failures(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.severity == Severity::Required)
            .count()
    }

    pub fn warning_failures(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .count()
    }
}

/// Evaluates rule sets against tables
pub trait Validator: Send + Sync {
    fn validate(&self, table: &Table, rules: &RuleSet) -> LakeResult<ValidationOutcome>;
}

/// In-process implementation of [`Validator`]
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleEngine;

impl Validator for RuleEngine {
    fn validate(&self, table: &Table, rules: &RuleSet) -> LakeResult<ValidationOutcome> {
        let failures = rules
            .rules
            .iter()
            .filter_map(|rule| {
                check(table, &rule.expectation).map(|observed| FailedExpectation {
                    expectation: rule.expectation.kind().to_string(),
                    column: rule.expectation.column().map(str::to_string),
                    severity: rule.severity,
                    observed,
                })
            })
            .collect();

        Ok(ValidationOutcome {
            dataset: rules.dataset,
            rule_set: rules.name.clone(),
            evaluated: rules.rules.len(),
            failures,
        })
    }
}

/// Evaluate one expectation; `Some(observed)` when it fails
fn check(table: &Table, expectation: &Expectation) -> Option<String> {
    if let Expectation::ColumnsMatchOrderedList(expected) = expectation {
        let actual = table.column_names();
        return if actual == expected.iter().map(String::as_str).collect::<Vec<_>>() {
            None
        } else {
            Some(format!("columns [{}]", actual.join(", ")))
        };
    }

    let name = expectation.column()?;
    let column = match table.column(name) {
        Ok(column) => &column.data,
        Err(_) => return Some("column not found".to_string()),
    };

    match expectation {
        Expectation::ColumnsMatchOrderedList(_) => None,
        Expectation::ColumnType { data_type, .. } => {
            (column.data_type() != *data_type).then(|| format!("type {}", column.data_type()))
        }
        Expectation::ValuesInSet { values, .. } => {
            let unexpected = unexpected_values(column, |v| values.iter().any(|x| x == v));
            summarize_unexpected(unexpected)
        }
        Expectation::ValuesBetween { min, max, .. } => {
            let Some(numbers) = column.to_f64() else {
                return Some(format!("non-numeric column of type {}", column.data_type()));
            };
            let out_of_range: Vec<f64> = numbers
                .into_iter()
                .flatten()
                .filter(|v| min.is_some_and(|m| *v < m) || max.is_some_and(|m| *v > m))
                .collect();
            if out_of_range.is_empty() {
                return None;
            }
            let distinct: BTreeSet<String> = out_of_range.iter().map(|v| v.to_string()).collect();
            Some(format!(
                "{} value(s) out of range, e.g. [{}]",
                out_of_range.len(),
                distinct.into_iter().take(MAX_UNEXPECTED).collect::<Vec<_>>().join(", ")
            ))
        }
        Expectation::Unique { .. } => {
            let mut counts: HashMap<String, usize> = HashMap::new();
            for i in 0..column.len() {
                let value = column.get(i);
                if !value.is_null() {
                    *counts.entry(value.to_string()).or_default() += 1;
                }
            }
            let duplicated: BTreeSet<&String> = counts
                .iter()
                .filter(|(_, n)| **n > 1)
                .map(|(v, _)| v)
                .collect();
            if duplicated.is_empty() {
                None
            } else {
                Some(format!(
                    "{} duplicated value(s), e.g. [{}]",
                    duplicated.len(),
                    duplicated
                        .into_iter()
                        .take(MAX_UNEXPECTED)
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            }
        }
        Expectation::NotNull { .. } => {
            let nulls = column.null_count();
            (nulls > 0).then(|| format!("{} null value(s)", nulls))
        }
    }
}

/// Non-null values rejected by `accept`, rendered as strings
fn unexpected_values(column: &ColumnData, accept: impl Fn(&str) -> bool) -> Vec<String> {
    (0..column.len())
        .map(|i| column.get(i))
        .filter(|v| !v.is_null())
        .map(|v| v.to_string())
        .filter(|v| !accept(v))
        .collect()
}

fn summarize_unexpected(unexpected: Vec<String>) -> Option<String> {
    if unexpected.is_empty() {
        return None;
    }
    let count = unexpected.len();
    let distinct: BTreeSet<String> = unexpected.into_iter().collect();
    Some(format!(
        "{} unexpected value(s): [{}]",
        count,
        distinct.into_iter().take(MAX_UNEXPECTED).collect::<Vec<_>>().join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    fn table() -> Table {
        Table::new(vec![
            Column::int("id", vec![Some(1), Some(2), Some(2), None]),
            Column::text("y", vec![Some("yes"), Some("no"), Some("maybe"), Some("yes")]),
            Column::int("day", vec![Some(1), Some(15), Some(40), Some(31)]),
        ])
        .unwrap()
    }

    fn run(rules: Vec<Rule>) -> ValidationOutcome {
        let set = RuleSet {
            name: "test".to_string(),
            dataset: Dataset::LoanInfo,
            rules,
        };
        RuleEngine.validate(&table(), &set).unwrap()
    }

    #[test]
    fn test_all_rules_pass() {
        let outcome = run(vec![
            Rule::required(Expectation::ColumnsMatchOrderedList(vec![
                "id".into(),
                "y".into(),
                "day".into(),
            ])),
            Rule::required(Expectation::ColumnType {
                column: "id".into(),
                data_type: DataType::Int64,
            }),
        ]);
        assert!(outcome.passed());
        assert_eq!(outcome.evaluated, 2);
    }

    #[test]
    fn test_failures_carry_evidence() {
        let outcome = run(vec![
            Rule::warning(Expectation::ValuesInSet {
                column: "y".into(),
                values: vec!["yes".into(), "no".into()],
            }),
            Rule::warning(Expectation::ValuesBetween {
                column: "day".into(),
                min: Some(1.0),
                max: Some(31.0),
            }),
            Rule::required(Expectation::Unique { column: "id".into() }),
            Rule::required(Expectation::NotNull { column: "id".into() }),
        ]);

        assert_eq!(outcome.failures.len(), 4);
        assert_eq!(outcome.required_failures(), 2);
        assert_eq!(outcome.warning_failures(), 2);
        assert!(outcome.failures[0].observed.contains("maybe"));
        assert!(outcome.failures[1].observed.contains("40"));
        assert!(outcome.failures[2].observed.contains('2'));
        assert_eq!(outcome.failures[3].observed, "1 null value(s)");
    }

    #[test]
    fn test_missing_column_fails() {
        let outcome = run(vec![Rule::required(Expectation::NotNull {
            column: "absent".into(),
        })]);
        assert_eq!(outcome.failures[0].observed, "column not found");
        assert_eq!(outcome.failures[0].column.as_deref(), Some("absent"));
    }

    #[test]
    fn test_type_mismatch_reports_observed_type() {
        let outcome = run(vec![Rule::warning(Expectation::ColumnType {
            column: "y".into(),
            data_type: DataType::Int64,
        })]);
        assert_eq!(outcome.failures[0].observed, "type utf8");
        assert_eq!(outcome.required_failures(), 0);
    }

    #[test]
    fn test_between_on_text_column_fails() {
        let outcome = run(vec![Rule::warning(Expectation::ValuesBetween {
            column: "y".into(),
            min: Some(0.0),
            max: None,
        })]);
        assert!(outcome.failures[0].observed.starts_with("non-numeric"));
    }
}
