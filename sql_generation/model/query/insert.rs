use std::fmt::Display;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::model::{
    table::{Row, Table},
    Shadow, ShadowResult,
};

use super::find_table;

/// `INSERT INTO <table> VALUES (...)`, one row per statement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    pub table: String,
    pub values: Row,
}

impl Shadow for Insert {
    type Result = ShadowResult;

    fn shadow(&self, tables: &mut Vec<Table>) -> Self::Result {
        let table = find_table(tables, &self.table)?;
        table.insert(self.values.clone())?;
        Ok(vec![])
    }
}

impl Display for Insert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "INSERT INTO {} VALUES ({})",
            self.table,
            self.values.iter().join(", ")
        )
    }
}
