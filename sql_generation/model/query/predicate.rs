use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::model::{
    table::{SimValue, Table},
    ShadowError,
};

/// Equality on a single pivot column, `<column> = <value>`. Pivot columns are
/// never floats, so the comparison is exact on both sides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub column: String,
    pub value: SimValue,
}

impl Predicate {
    pub fn eq(column: impl Into<String>, value: SimValue) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }

    /// Resolves the predicate column to its position in `table`.
    pub fn pivot_index(&self, table: &Table) -> Result<usize, ShadowError> {
        table
            .column_index(&self.column)
            .ok_or_else(|| ShadowError::NoSuchColumn {
                table: table.name.clone(),
                column: self.column.clone(),
            })
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.column, self.value)
    }
}
