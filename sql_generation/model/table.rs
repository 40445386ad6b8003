use std::{fmt::Display, num::NonZeroU32};

use serde::{Deserialize, Serialize};

use super::ShadowError;

/// A row is aligned positionally with the columns of its table.
pub type Row = Vec<SimValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    /// Rows in the order the engine is expected to emit them for `SELECT *`.
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// A table whose columns are all floats has no column usable in a
    /// WHERE-equality clause.
    pub fn is_all_float(&self) -> bool {
        self.columns
            .iter()
            .all(|c| matches!(c.column_type, ColumnType::Float))
    }

    /// Returns true if `rows[row][column]` appears exactly once in `column`.
    pub fn is_unique_at(&self, row: usize, column: usize) -> bool {
        let Some(value) = self.rows.get(row).and_then(|r| r.get(column)) else {
            return false;
        };
        self.rows.iter().filter(|r| &r[column] == value).count() == 1
    }

    pub fn insert(&mut self, row: Row) -> Result<(), ShadowError> {
        self.check_arity(&row)?;
        self.rows.push(row);
        Ok(())
    }

    /// Replaces the content of the first row whose `pivot` column equals
    /// `value`, keeping its position. Returns the position of the replaced row.
    pub fn update_by_pivot(
        &mut self,
        pivot: usize,
        value: &SimValue,
        new_row: Row,
    ) -> Result<Option<usize>, ShadowError> {
        self.check_arity(&new_row)?;
        let position = self.rows.iter().position(|r| &r[pivot] == value);
        if let Some(position) = position {
            self.rows[position] = new_row;
        }
        Ok(position)
    }

    /// Removes the first row whose `pivot` column equals `value`; later rows
    /// shift up by one position.
    pub fn delete_by_pivot(&mut self, pivot: usize, value: &SimValue) -> Option<Row> {
        let position = self.rows.iter().position(|r| &r[pivot] == value)?;
        Some(self.rows.remove(position))
    }

    pub fn rows_matching<'a>(
        &'a self,
        pivot: usize,
        value: &'a SimValue,
    ) -> impl Iterator<Item = &'a Row> + 'a {
        self.rows.iter().filter(move |r| &r[pivot] == value)
    }

    fn check_arity(&self, row: &Row) -> Result<(), ShadowError> {
        if row.len() != self.columns.len() {
            return Err(ShadowError::RowArity {
                table: self.name.clone(),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    /// Column names are `<type initial><ordinal>`, so they never collide
    /// inside one table.
    pub fn new(ordinal: usize, column_type: ColumnType) -> Self {
        Self {
            name: format!("{}{ordinal}", column_type.initial()),
            column_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Int,
    Float,
    Char(NonZeroU32),
}

impl ColumnType {
    pub fn char(max_len: u32) -> Option<Self> {
        NonZeroU32::new(max_len).map(Self::Char)
    }

    pub fn initial(&self) -> char {
        match self {
            Self::Int => 'i',
            Self::Float => 'f',
            Self::Char(_) => 'c',
        }
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int => write!(f, "INT"),
            Self::Float => write!(f, "FLOAT"),
            Self::Char(len) => write!(f, "CHAR({len})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum SimValue {
    Int(i64),
    Float(f64),
    Char(String),
}

impl SimValue {
    pub fn column_type_matches(&self, column_type: &ColumnType) -> bool {
        match (self, column_type) {
            (SimValue::Int(_), ColumnType::Int) | (SimValue::Float(_), ColumnType::Float) => true,
            (SimValue::Char(s), ColumnType::Char(len)) => {
                !s.is_empty() && s.chars().count() <= len.get() as usize
            }
            _ => false,
        }
    }

    /// The value as the engine prints it in the output sink.
    pub fn to_output_string(&self) -> String {
        match self {
            SimValue::Int(i) => i.to_string(),
            SimValue::Float(fl) => format_float(*fl),
            SimValue::Char(s) => s.clone(),
        }
    }
}

/// Floats are written in plain decimal notation with a fractional part, since
/// the engine grammar has no exponent form.
fn format_float(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

impl Display for SimValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimValue::Int(i) => write!(f, "{i}"),
            SimValue::Float(fl) => write!(f, "{}", format_float(*fl)),
            SimValue::Char(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl From<i64> for SimValue {
    fn from(value: i64) -> Self {
        SimValue::Int(value)
    }
}

impl From<f64> for SimValue {
    fn from(value: f64) -> Self {
        SimValue::Float(value)
    }
}

impl From<&str> for SimValue {
    fn from(value: &str) -> Self {
        SimValue::Char(value.to_string())
    }
}
