//! Reconciles the engine's textual result sets with the shadow model.
//!
//! The sink holds `|`-delimited lines: a header naming the columns, then one
//! line per row. Separator lines made of `+` and `-` are ignored and a line
//! reading `failure` is the engine's error marker.

use std::collections::BTreeSet;

use itertools::Itertools;
use sql_generation::model::table::{Column, Row, SimValue, Table};

/// Absolute tolerance for float columns; the engine stores floats in single
/// precision and prints six decimals.
pub const FLOAT_EPSILON: f64 = 1e-4;

const FAILURE_MARKER: &str = "failure";
const TABLES_HEADER: &str = "Tables";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Mismatch {
    #[error("output is empty, expected a header line")]
    MissingHeader,
    #[error("header {actual:?} does not match columns {expected:?}")]
    Header {
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error("engine reported a failure at output line {line}")]
    EngineFailure { line: usize },
    #[error("expected {expected} rows, engine returned {actual}")]
    RowCount { expected: usize, actual: usize },
    #[error("expected {expected} result sets, engine returned {actual}")]
    ResultSetCount { expected: usize, actual: usize },
    #[error("row {row} has {actual} fields, expected {expected}")]
    FieldCount {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("row {row}, column {column} ({name}): expected {expected}, got {actual}")]
    Value {
        row: usize,
        column: usize,
        name: String,
        expected: String,
        actual: String,
    },
    #[error("table list differs, missing {missing:?}, unexpected {unexpected:?}")]
    TableList {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    #[error("table {name} listed {actual} times, expected {expected}")]
    TableCount {
        name: String,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Line {
    Separator,
    Failure,
    Fields(Vec<String>),
}

fn classify(line: &str) -> Line {
    let line = line.trim();
    if line.is_empty() || line.chars().all(|c| c == '+' || c == '-') {
        return Line::Separator;
    }
    if line == FAILURE_MARKER {
        return Line::Failure;
    }
    Line::Fields(
        line.trim_matches('|')
            .split('|')
            .map(|field| field.trim().to_string())
            .collect(),
    )
}

/// The field lines of an output, failing on the first engine failure marker.
fn field_lines(lines: &[String]) -> Result<Vec<Vec<String>>, Mismatch> {
    let mut fields = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        match classify(line) {
            Line::Separator => {}
            Line::Failure => return Err(Mismatch::EngineFailure { line: index }),
            Line::Fields(f) => fields.push(f),
        }
    }
    Ok(fields)
}

/// Fails if the engine wrote its error marker anywhere in `lines`.
pub fn check_no_failure(lines: &[String]) -> Result<(), Mismatch> {
    field_lines(lines).map(|_| ())
}

pub fn compare_value(expected: &SimValue, actual: &str) -> bool {
    match expected {
        SimValue::Int(i) => i.to_string() == actual,
        SimValue::Float(f) => actual
            .parse::<f64>()
            .is_ok_and(|a| (a - f).abs() < FLOAT_EPSILON),
        SimValue::Char(s) => s == actual,
    }
}

/// Compares one engine row with the expected one, column by column.
pub fn compare_row(
    row: usize,
    expected: &Row,
    actual: &[String],
    columns: &[Column],
) -> Result<(), Mismatch> {
    if actual.len() != expected.len() {
        return Err(Mismatch::FieldCount {
            row,
            expected: expected.len(),
            actual: actual.len(),
        });
    }
    for (column, (value, field)) in expected.iter().zip(actual).enumerate() {
        if !compare_value(value, field) {
            return Err(Mismatch::Value {
                row,
                column,
                name: columns
                    .get(column)
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                expected: value.to_output_string(),
                actual: field.clone(),
            });
        }
    }
    Ok(())
}

fn compare_header(header: &[String], columns: &[Column]) -> Result<(), Mismatch> {
    let expected = columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
    if header != expected.as_slice() {
        return Err(Mismatch::Header {
            expected,
            actual: header.to_vec(),
        });
    }
    Ok(())
}

/// Compares a `SELECT *` output with the rows the shadow model expects, in
/// order.
pub fn compare_result_set(
    expected: &[Row],
    lines: &[String],
    columns: &[Column],
) -> Result<(), Mismatch> {
    let fields = field_lines(lines)?;
    let (header, rows) = fields.split_first().ok_or(Mismatch::MissingHeader)?;
    compare_header(header, columns)?;

    if rows.len() != expected.len() {
        return Err(Mismatch::RowCount {
            expected: expected.len(),
            actual: rows.len(),
        });
    }
    for (index, (expected, actual)) in expected.iter().zip(rows).enumerate() {
        compare_row(index, expected, actual, columns)?;
    }
    Ok(())
}

/// Compares a `SHOW TABLES` output with the expected names, ignoring order.
pub fn compare_table_list(expected: &[String], lines: &[String]) -> Result<(), Mismatch> {
    let fields = field_lines(lines)?;
    let (header, rows) = fields.split_first().ok_or(Mismatch::MissingHeader)?;
    if header.len() != 1 || header[0] != TABLES_HEADER {
        return Err(Mismatch::Header {
            expected: vec![TABLES_HEADER.to_string()],
            actual: header.clone(),
        });
    }

    let mut actual = Vec::with_capacity(rows.len());
    for (row, fields) in rows.iter().enumerate() {
        match fields.as_slice() {
            [name] => actual.push(name.clone()),
            _ => {
                return Err(Mismatch::FieldCount {
                    row,
                    expected: 1,
                    actual: fields.len(),
                })
            }
        }
    }

    let expected_sorted = expected.iter().sorted().collect::<Vec<_>>();
    let actual_sorted = actual.iter().sorted().collect::<Vec<_>>();
    if expected_sorted == actual_sorted {
        return Ok(());
    }
    let expected_names = expected.iter().cloned().collect::<BTreeSet<_>>();
    let actual_names = actual.iter().cloned().collect::<BTreeSet<_>>();
    if expected_names == actual_names {
        // same names, different multiplicities
        let expected_counts = expected.iter().counts();
        let actual_counts = actual.iter().counts();
        if let Some(name) = expected_names
            .iter()
            .find(|name| expected_counts.get(name) != actual_counts.get(name))
        {
            return Err(Mismatch::TableCount {
                name: name.clone(),
                expected: expected_counts.get(name).copied().unwrap_or_default(),
                actual: actual_counts.get(name).copied().unwrap_or_default(),
            });
        }
    }
    Err(Mismatch::TableList {
        missing: expected_names.difference(&actual_names).cloned().collect(),
        unexpected: actual_names.difference(&expected_names).cloned().collect(),
    })
}

/// Compares the output of one `SELECT *` per table, all tables empty: a header
/// line each, in the order the selects were issued.
pub fn compare_headers(tables: &[Table], lines: &[String]) -> Result<(), Mismatch> {
    let fields = field_lines(lines)?;
    if fields.len() != tables.len() {
        return Err(Mismatch::ResultSetCount {
            expected: tables.len(),
            actual: fields.len(),
        });
    }
    for (table, header) in tables.iter().zip(&fields) {
        compare_header(header, &table.columns)?;
    }
    Ok(())
}
