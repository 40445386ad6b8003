use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::model::{table::Table, Shadow, ShadowResult};

use super::{find_table, Predicate};

/// `SELECT * FROM <table> [WHERE <predicate>]`. No ORDER BY: rows come back in
/// physical insertion order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub table: String,
    pub predicate: Option<Predicate>,
}

impl Select {
    pub fn all(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            predicate: None,
        }
    }

    pub fn filtered(table: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            table: table.into(),
            predicate: Some(predicate),
        }
    }
}

impl Shadow for Select {
    type Result = ShadowResult;

    fn shadow(&self, tables: &mut Vec<Table>) -> Self::Result {
        let table = find_table(tables, &self.table)?;
        match &self.predicate {
            None => Ok(table.rows.clone()),
            Some(predicate) => {
                let pivot = predicate.pivot_index(table)?;
                Ok(table
                    .rows_matching(pivot, &predicate.value)
                    .cloned()
                    .collect())
            }
        }
    }
}

impl Display for Select {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SELECT * FROM {}", self.table)?;
        if let Some(predicate) = &self.predicate {
            write!(f, " WHERE {predicate}")?;
        }
        Ok(())
    }
}
