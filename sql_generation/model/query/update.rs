use std::fmt::Display;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::model::{
    table::{Row, SimValue, Table},
    Shadow, ShadowError, ShadowResult,
};

use super::{find_table, Predicate};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub table: String,
    pub set_values: Vec<(String, SimValue)>, // Pair of value for set expressions => SET name=value
    pub predicate: Predicate,
}

impl Update {
    /// Sets every column of `row` to the values of `new_row`, targeting it
    /// through the pre-update value of its `pivot` column.
    pub fn by_pivot(table: &Table, row: &Row, pivot: usize, new_row: &Row) -> Self {
        Self {
            table: table.name.clone(),
            set_values: table
                .columns
                .iter()
                .zip(new_row)
                .map(|(c, v)| (c.name.clone(), v.clone()))
                .collect(),
            predicate: Predicate::eq(table.columns[pivot].name.clone(), row[pivot].clone()),
        }
    }
}

impl Shadow for Update {
    type Result = ShadowResult;

    fn shadow(&self, tables: &mut Vec<Table>) -> Self::Result {
        let table = find_table(tables, &self.table)?;
        let pivot = self.predicate.pivot_index(table)?;

        let Some(mut new_row) = table
            .rows_matching(pivot, &self.predicate.value)
            .next()
            .cloned()
        else {
            return Ok(vec![]);
        };
        for (column, value) in &self.set_values {
            let index = table
                .column_index(column)
                .ok_or_else(|| ShadowError::NoSuchColumn {
                    table: table.name.clone(),
                    column: column.clone(),
                })?;
            new_row[index] = value.clone();
        }

        table.update_by_pivot(pivot, &self.predicate.value, new_row)?;
        Ok(vec![])
    }
}

impl Display for Update {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "UPDATE {} SET {} WHERE {}",
            self.table,
            self.set_values
                .iter()
                .map(|(name, value)| format!("{name} = {value}"))
                .join(", "),
            self.predicate
        )
    }
}
