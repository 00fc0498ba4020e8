//! Cleaning operations
//!
//! Each step takes a table and returns a new one together with what it had to
//! drop or null. [`clean_dataset`] chains them in the configured order.

use crate::config::{DatasetCleaning, LabelEncoding, ValueRewrite};
use crate::error::{LakeError, LakeResult};
use crate::quality::QualityNote;
use crate::table::{Column, ColumnData, Table, Value};

/// Result of a step that may drop or null rows
#[derive(Debug, Clone, PartialEq)]
pub struct Cleaned {
    pub table: Table,
    pub affected: usize,
}

/// Rename every column by position
pub fn normalize_schema<S: AsRef<str>>(table: &Table, names: &[S]) -> LakeResult<Table> {
    let mut renamed = table.clone();
    renamed.rename_all(names)?;
    Ok(renamed)
}

/// Drop rows whose `column` equals `sentinel`
pub fn filter_sentinel(table: &Table, column: &str, sentinel: &str) -> LakeResult<Cleaned> {
    let data = &table.column(column)?.data;
    let mask: Vec<bool> = (0..data.len())
        .map(|i| data.get(i).to_string() != sentinel)
        .collect();
    let removed = mask.iter().filter(|keep| !**keep).count();
    Ok(Cleaned {
        table: table.filter(&mask),
        affected: removed,
    })
}

/// Apply exact-match value rewrites to text columns
pub fn canonicalize(table: &Table, rewrites: &[ValueRewrite]) -> LakeResult<Table> {
    let mut out = table.clone();
    for rewrite in rewrites {
        let data = match &out.column(&rewrite.column)?.data {
            ColumnData::Utf8(values) => ColumnData::Utf8(
                values
                    .iter()
                    .map(|v| match v {
                        Some(s) if *s == rewrite.from => Some(rewrite.to.clone()),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            // Rewrites target categorical text only
            other => other.clone(),
        };
        out.replace_column(&rewrite.column, data)?;
    }
    Ok(out)
}

/// Drop a fixed list of columns; every listed column must exist
pub fn prune_columns<S: AsRef<str>>(table: &Table, columns: &[S]) -> LakeResult<Table> {
    let mut out = table.clone();
    out.drop_columns(columns)?;
    Ok(out)
}

/// Mean and sample standard deviation of the non-null values
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return Some((mean, 0.0));
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, variance.sqrt()))
}

/// Inclusive bounds `[μ − kσ, μ + kσ]`
///
/// Identical values (including a single value) give bounds equal to that
/// value, so nothing is dropped.
pub fn outlier_bounds(values: &[f64], sigmas: f64) -> Option<(f64, f64)> {
    let (mean, std) = mean_std(values)?;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return Some((min, max));
    }
    Some((mean - sigmas * std, mean + sigmas * std))
}

/// Drop rows outside the `sigmas` band of `column`
///
/// Null cells cannot be compared and are dropped with the outliers. An empty
/// table passes through unchanged.
pub fn remove_outliers(table: &Table, column: &str, sigmas: f64) -> LakeResult<Cleaned> {
    let data = &table.column(column)?.data;
    let values = data.to_f64().ok_or_else(|| {
        LakeError::SchemaMismatch(format!(
            "outlier column '{}' is {}, expected numeric",
            column,
            data.data_type()
        ))
    })?;
    if values.is_empty() {
        return Ok(Cleaned {
            table: table.clone(),
            affected: 0,
        });
    }

    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let mask: Vec<bool> = match outlier_bounds(&present, sigmas) {
        Some((lower, upper)) => values
            .iter()
            .map(|v| v.is_some_and(|v| v >= lower && v <= upper))
            .collect(),
        None => vec![false; values.len()],
    };
    let removed = mask.iter().filter(|keep| !**keep).count();
    Ok(Cleaned {
        table: table.filter(&mask),
        affected: removed,
    })
}

/// Replace `yes`/`no` with 1/0; anything else becomes null
pub fn binary_encode(table: &Table, column: &str) -> LakeResult<Cleaned> {
    let data = &table.column(column)?.data;
    let mut gaps = 0;
    let encoded: Vec<Option<i64>> = (0..data.len())
        .map(|i| match data.get(i) {
            Value::Null => None,
            value => match value.to_string().as_str() {
                "yes" => Some(1),
                "no" => Some(0),
                _ => {
                    gaps += 1;
                    None
                }
            },
        })
        .collect();

    let mut out = table.clone();
    out.replace_column(column, ColumnData::Int64(encoded))?;
    Ok(Cleaned {
        table: out,
        affected: gaps,
    })
}

/// Add `<column>_encoded` from a fixed lookup; unknown categories become null
pub fn label_encode(table: &Table, encoding: &LabelEncoding) -> LakeResult<Cleaned> {
    let data = &table.column(&encoding.column)?.data;
    let mut gaps = 0;
    let encoded: Vec<Option<i64>> = (0..data.len())
        .map(|i| match data.get(i) {
            Value::Null => None,
            value => {
                let code = encoding.codes.get(&value.to_string()).copied();
                if code.is_none() {
                    gaps += 1;
                }
                code
            }
        })
        .collect();

    let mut out = table.clone();
    out.push_column(Column::int(format!("{}_encoded", encoding.column), encoded))?;
    Ok(Cleaned {
        table: out,
        affected: gaps,
    })
}

/// Run every configured cleaning step on one dataset
pub fn clean_dataset(
    table: &Table,
    config: &DatasetCleaning,
) -> LakeResult<(Table, Vec<QualityNote>)> {
    let mut notes = Vec::new();
    let mut current = normalize_schema(table, &config.columns)?;

    for column in &config.unknown_filter_columns {
        let step = filter_sentinel(&current, column, &config.unknown_sentinel)?;
        notes.push(QualityNote::rows_removed(
            "unknown_value",
            Some(column.as_str()),
            step.affected,
        ));
        current = step.table;
    }

    current = canonicalize(&current, &config.rewrites)?;
    current = prune_columns(&current, &config.drop_columns)?;

    for column in &config.outlier_columns {
        let before = current.num_rows();
        let step = remove_outliers(&current, column, config.outlier_sigmas)?;
        tracing::debug!(column = %column, before, after = step.table.num_rows(), "Outliers removed");
        notes.push(QualityNote::rows_removed("outlier_3std", Some(column.as_str()), step.affected));
        current = step.table;
    }

    for column in &config.binary_columns {
        let step = binary_encode(&current, column)?;
        notes.push(QualityNote::encoding_gap("binary_encoding", column, step.affected));
        current = step.table;
    }

    for encoding in &config.label_encodings {
        let step = label_encode(&current, encoding)?;
        notes.push(QualityNote::encoding_gap(
            "label_encoding",
            &encoding.column,
            step.affected,
        ));
        current = step.table;
    }

    Ok((current, notes))
}
