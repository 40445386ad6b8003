use std::fmt::Display;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::model::{table::Table, Shadow, ShadowError, ShadowResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Create {
    pub table: Table,
}

impl Shadow for Create {
    type Result = ShadowResult;

    fn shadow(&self, tables: &mut Vec<Table>) -> Self::Result {
        if tables.iter().any(|t| t.name == self.table.name) {
            return Err(ShadowError::TableExists(self.table.name.clone()));
        }
        let mut table = self.table.clone();
        table.rows.clear();
        tables.push(table);
        Ok(vec![])
    }
}

impl Display for Create {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CREATE TABLE {} ({})",
            self.table.name,
            self.table
                .columns
                .iter()
                .map(|c| format!("{} {}", c.name, c.column_type))
                .join(", ")
        )
    }
}
