//! Data contracts of the raw datasets
//!
//! Names here are the source column names; renaming happens during cleaning.

use super::{Expectation, Rule, RuleSet};
use crate::store::Dataset;
use crate::table::DataType;

fn in_set(column: &str, values: &[&str]) -> Expectation {
    Expectation::ValuesInSet {
        column: column.to_string(),
        values: values.iter().map(|v| v.to_string()).collect(),
    }
}

fn between(column: &str, min: Option<f64>, max: Option<f64>) -> Expectation {
    Expectation::ValuesBetween {
        column: column.to_string(),
        min,
        max,
    }
}

fn of_type(column: &str, data_type: DataType) -> Expectation {
    Expectation::ColumnType {
        column: column.to_string(),
        data_type,
    }
}

/// Rules for the raw loan file
pub fn loan_info_rules() -> RuleSet {
    let mut rules = vec![
        Rule::required(Expectation::ColumnsMatchOrderedList(
            [
                "id", "default", "balance", "housing", "loan", "contact", "day", "month",
                "duration", "campaign", "pdays", "previous", "poutcome", "y",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        )),
        Rule::required(of_type("id", DataType::Int64)),
    ];

    for column in ["balance", "day", "duration", "campaign", "pdays", "previous"] {
        rules.push(Rule::warning(of_type(column, DataType::Int64)));
    }

    for column in ["default", "housing", "loan"] {
        rules.push(Rule::warning(in_set(column, &["yes", "no"])));
    }
    rules.push(Rule::warning(in_set("contact", &["cellular", "telephone"])));
    rules.push(Rule::warning(in_set(
        "month",
        &[
            "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
        ],
    )));
    rules.push(Rule::warning(in_set("poutcome", &["failure", "success"])));
    rules.push(Rule::warning(in_set("y", &["yes", "no"])));

    rules.push(Rule::warning(between("balance", Some(0.0), None)));
    rules.push(Rule::warning(between("day", Some(1.0), Some(31.0))));
    for column in ["duration", "campaign", "pdays", "previous"] {
        rules.push(Rule::warning(between(column, Some(0.0), None)));
    }

    rules.push(Rule::required(Expectation::Unique {
        column: "id".to_string(),
    }));
    rules.push(Rule::required(Expectation::NotNull {
        column: "id".to_string(),
    }));
    rules.push(Rule::required(Expectation::NotNull {
        column: "y".to_string(),
    }));

    RuleSet {
        name: "loan_info_raw".to_string(),
        dataset: Dataset::LoanInfo,
        rules,
    }
}

/// Rules for the raw customer snapshot
pub fn customer_info_rules() -> RuleSet {
    let rules = vec![
        Rule::required(Expectation::ColumnsMatchOrderedList(
            ["id", "age", "job", "marital", "education"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        )),
        Rule::required(of_type("id", DataType::Int64)),
        Rule::warning(of_type("age", DataType::Int64)),
        Rule::warning(in_set(
            "job",
            &[
                "admin",
                "blue-collar",
                "entrepreneur",
                "housemaid",
                "management",
                "retired",
                "self-employed",
                "services",
                "student",
                "technician",
                "unemployed",
            ],
        )),
        Rule::warning(in_set("marital", &["single", "married", "divorced"])),
        Rule::warning(in_set("education", &["primary", "secondary", "tertiary"])),
        Rule::warning(between("id", Some(0.0), None)),
        Rule::warning(between("age", Some(0.0), Some(100.0))),
        Rule::required(Expectation::Unique {
            column: "id".to_string(),
        }),
        Rule::required(Expectation::NotNull {
            column: "id".to_string(),
        }),
    ];

    RuleSet {
        name: "customer_info_raw".to_string(),
        dataset: Dataset::CustomerInfo,
        rules,
    }
}

/// Rule set for a raw dataset
pub fn rules_for(dataset: Dataset) -> Option<RuleSet> {
    match dataset {
        Dataset::LoanInfo => Some(loan_info_rules()),
        Dataset::CustomerInfo => Some(customer_info_rules()),
        Dataset::CustomerLoanInfo => None,
    }
}
