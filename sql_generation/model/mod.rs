pub mod query;
pub mod table;

use table::{Row, Table};

/// Shadow trait for statements that can be "shadowed" in the reference model.
/// Shadowing applies to the in-memory tables the transformation the engine is
/// expected to apply when it executes the statement. The result is the list of
/// rows a correct engine emits for the statement, empty for statements that
/// produce no result set.
pub trait Shadow {
    type Result;
    fn shadow(&self, tables: &mut Vec<Table>) -> Self::Result;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShadowError {
    #[error("table {0} does not exist")]
    NoSuchTable(String),
    #[error("table {0} already exists")]
    TableExists(String),
    #[error("column {column} does not exist in table {table}")]
    NoSuchColumn { table: String, column: String },
    #[error("row for table {table} has {actual} values, expected {expected}")]
    RowArity {
        table: String,
        expected: usize,
        actual: usize,
    },
}

pub type ShadowResult = Result<Vec<Row>, ShadowError>;
