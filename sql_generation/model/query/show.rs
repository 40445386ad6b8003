use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::model::{
    table::{SimValue, Table},
    Shadow, ShadowResult,
};

/// `SHOW TABLES`. The engine lists tables in catalog order, so the shadow
/// result is sorted and callers compare it as a set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowTables;

impl Shadow for ShowTables {
    type Result = ShadowResult;

    fn shadow(&self, tables: &mut Vec<Table>) -> Self::Result {
        let mut names = tables.iter().map(|t| t.name.clone()).collect::<Vec<_>>();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| vec![SimValue::Char(name)])
            .collect())
    }
}

impl Display for ShowTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SHOW TABLES")
    }
}
