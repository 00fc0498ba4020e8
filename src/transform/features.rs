//! Feature derivation
//!
//! Turns the cleaned customer and loan tables into the joined, model-ready
//! `customer_loan_info` table.

use crate::arrival::ArrivalKey;
use crate::config::{BinSpec, FeatureConfig, SumFeature};
use crate::error::{LakeError, LakeResult};
use crate::quality::QualityNote;
use crate::table::{Column, ColumnData, DataType, Table};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Min/max of one column at fit time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

/// Parameters of every scaled column, keyed by column name
pub type ScalingParams = HashMap<String, MinMax>;

/// Output of [`derive_features`]
#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub table: Table,
    pub scaling: ScalingParams,
    pub notes: Vec<QualityNote>,
}

/// Output of [`inner_join`]
#[derive(Debug, Clone, PartialEq)]
pub struct Joined {
    pub table: Table,
    pub unmatched_left: usize,
    pub unmatched_right: usize,
}

fn numeric(table: &Table, column: &str) -> LakeResult<Vec<Option<f64>>> {
    let data = &table.column(column)?.data;
    data.to_f64().ok_or_else(|| {
        LakeError::SchemaMismatch(format!(
            "column '{}' is {}, expected numeric",
            column,
            data.data_type()
        ))
    })
}

/// Row-wise sum of the source columns; null when any source is null
pub fn sum_columns(table: &Table, feature: &SumFeature) -> LakeResult<Table> {
    let mut all_int = true;
    for source in &feature.sources {
        all_int &= table.column(source)?.data_type() == DataType::Int64;
    }

    let rows = table.num_rows();
    let mut sums: Vec<Option<f64>> = vec![Some(0.0); rows];
    for source in &feature.sources {
        for (sum, value) in sums.iter_mut().zip(numeric(table, source)?) {
            *sum = match (*sum, value) {
                (Some(s), Some(v)) => Some(s + v),
                _ => None,
            };
        }
    }

    let data = if all_int {
        ColumnData::Int64(sums.iter().map(|s| s.map(|v| v as i64)).collect())
    } else {
        ColumnData::Float64(sums)
    };

    let mut out = table.clone();
    out.push_column(Column::new(feature.name.clone(), data))?;
    if feature.drop_sources {
        out.drop_columns(&feature.sources)?;
    }
    Ok(out)
}

/// Midpoint of the right-closed interval `(e_i, e_i+1]` holding `value`
pub fn bin_midpoint(edges: &[f64], value: f64) -> Option<f64> {
    edges
        .windows(2)
        .find(|w| value > w[0] && value <= w[1])
        .map(|w| (w[0] + w[1]) / 2.0)
}

/// Add `<column>_binned` holding interval midpoints
///
/// Values outside every interval, and nulls, are binned to null and counted.
pub fn bin_column(table: &Table, spec: &BinSpec) -> LakeResult<(Table, usize)> {
    let values = numeric(table, &spec.column)?;
    let binned: Vec<Option<f64>> = values
        .iter()
        .map(|v| v.and_then(|v| bin_midpoint(&spec.edges, v)))
        .collect();
    let gaps = binned.iter().filter(|v| v.is_none()).count();

    let mut out = table.clone();
    out.push_column(Column::float(format!("{}_binned", spec.column), binned))?;
    Ok((out, gaps))
}

/// Min and max of a column's non-null values
pub fn fit_min_max(table: &Table, column: &str) -> LakeResult<Option<MinMax>> {
    let values = numeric(table, column)?;
    let mut present = values.into_iter().flatten().peekable();
    if present.peek().is_none() {
        return Ok(None);
    }
    let (min, max) = present.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    Ok(Some(MinMax { min, max }))
}

/// Replace `column` with `(v − min) / (max − min)`; a zero range maps to 0.0
pub fn apply_min_max(table: &Table, column: &str, params: MinMax) -> LakeResult<Table> {
    let range = params.max - params.min;
    let scaled: Vec<Option<f64>> = numeric(table, column)?
        .into_iter()
        .map(|v| {
            v.map(|v| {
                if range == 0.0 {
                    0.0
                } else {
                    (v - params.min) / range
                }
            })
        })
        .collect();

    let mut out = table.clone();
    out.replace_column(column, ColumnData::Float64(scaled))?;
    Ok(out)
}

/// Inner join on `key`, keeping left row order
///
/// Every pairing of duplicate keys is emitted. Non-key columns present on both
/// sides get `_x` (left) and `_y` (right) suffixes. Null keys never match.
pub fn inner_join(left: &Table, right: &Table, key: &str) -> LakeResult<Joined> {
    let left_key = &left.column(key)?.data;
    let right_key = &right.column(key)?.data;

    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for i in 0..right_key.len() {
        let value = right_key.get(i);
        if !value.is_null() {
            index.entry(value.to_string()).or_default().push(i);
        }
    }

    let mut left_rows = Vec::new();
    let mut right_rows = Vec::new();
    let mut right_matched = vec![false; right_key.len()];
    let mut unmatched_left = 0;
    for i in 0..left_key.len() {
        let value = left_key.get(i);
        let matches = if value.is_null() {
            None
        } else {
            index.get(&value.to_string())
        };
        match matches {
            Some(rows) => {
                for &j in rows {
                    left_rows.push(i);
                    right_rows.push(j);
                    right_matched[j] = true;
                }
            }
            None => unmatched_left += 1,
        }
    }
    let unmatched_right = right_matched.iter().filter(|m| !**m).count();

    let left_taken = left.take(&left_rows);
    let right_taken = right.take(&right_rows);
    let collides = |name: &str| name != key && left.has_column(name) && right.has_column(name);

    let mut columns = Vec::with_capacity(left.num_columns() + right.num_columns());
    for column in left_taken.into_columns() {
        let name = if collides(column.name.as_str()) {
            format!("{}_x", column.name)
        } else {
            column.name
        };
        columns.push(Column::new(name, column.data));
    }
    for column in right_taken.into_columns() {
        if column.name == key {
            continue;
        }
        let name = if collides(column.name.as_str()) {
            format!("{}_y", column.name)
        } else {
            column.name
        };
        columns.push(Column::new(name, column.data));
    }

    Ok(Joined {
        table: Table::new(columns)?,
        unmatched_left,
        unmatched_right,
    })
}

/// Attach a constant timestamp column
pub fn attach_timestamp(table: &Table, column: &str, ts: NaiveDateTime) -> LakeResult<Table> {
    let mut out = table.clone();
    out.push_column(Column::timestamp(column, vec![Some(ts); table.num_rows()]))?;
    Ok(out)
}

/// Build the joined feature table of one run
///
/// `reuse` carries scaling parameters recorded by an earlier derivation of the
/// same arrival key; columns missing from it are fitted on this data.
pub fn derive_features(
    customer: &Table,
    loan: &Table,
    config: &FeatureConfig,
    key: &ArrivalKey,
    reuse: Option<&ScalingParams>,
) -> LakeResult<Derived> {
    let mut notes = Vec::new();
    let mut customer = customer.clone();
    let mut loan = loan.clone();

    for feature in &config.loan_sums {
        loan = sum_columns(&loan, feature)?;
    }

    for spec in &config.customer_bins {
        let (binned, gaps) = bin_column(&customer, spec)?;
        notes.push(QualityNote::encoding_gap("binning", &spec.column, gaps));
        customer = binned;
    }
    for spec in &config.loan_bins {
        let (binned, gaps) = bin_column(&loan, spec)?;
        notes.push(QualityNote::encoding_gap("binning", &spec.column, gaps));
        loan = binned;
    }

    let mut scaling = ScalingParams::new();
    for column in &config.scaled_columns {
        let params = match reuse.and_then(|r| r.get(column)) {
            Some(params) => Some(*params),
            None => fit_min_max(&loan, column)?,
        };
        if let Some(params) = params {
            loan = apply_min_max(&loan, column, params)?;
            scaling.insert(column.clone(), params);
        }
    }

    let joined = inner_join(&customer, &loan, &config.join_key)?;
    notes.push(QualityNote::rows_removed(
        "join_unmatched_customer",
        Some(config.join_key.as_str()),
        joined.unmatched_left,
    ));
    notes.push(QualityNote::rows_removed(
        "join_unmatched_loan",
        Some(config.join_key.as_str()),
        joined.unmatched_right,
    ));

    let table = attach_timestamp(&joined.table, &config.event_timestamp_column, key.timestamp())?;
    Ok(Derived {
        table,
        scaling,
        notes,
    })
}
