use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::model::{
    table::{Row, Table},
    Shadow, ShadowResult,
};

use super::{find_table, Predicate};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub table: String,
    pub predicate: Predicate,
}

impl Delete {
    pub fn by_pivot(table: &Table, row: &Row, pivot: usize) -> Self {
        Self {
            table: table.name.clone(),
            predicate: Predicate::eq(table.columns[pivot].name.clone(), row[pivot].clone()),
        }
    }
}

impl Shadow for Delete {
    type Result = ShadowResult;

    fn shadow(&self, tables: &mut Vec<Table>) -> Self::Result {
        let table = find_table(tables, &self.table)?;
        let pivot = self.predicate.pivot_index(table)?;
        table.delete_by_pivot(pivot, &self.predicate.value);
        Ok(vec![])
    }
}

impl Display for Delete {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DELETE FROM {} WHERE {}", self.table, self.predicate)
    }
}
