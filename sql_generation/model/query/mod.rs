use std::fmt::Display;

pub use create::Create;
pub use delete::Delete;
pub use insert::Insert;
pub use predicate::Predicate;
pub use select::Select;
pub use show::ShowTables;
pub use update::Update;

use serde::{Deserialize, Serialize};

use super::{table::Table, Shadow, ShadowResult};

pub mod create;
pub mod delete;
pub mod insert;
pub mod predicate;
pub mod select;
pub mod show;
pub mod update;

/// Statements the simulator sends to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Create(Create),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Select(Select),
    ShowTables(ShowTables),
}

impl Query {
    /// Whether the engine writes a result set to the output sink for this
    /// statement.
    pub fn produces_output(&self) -> bool {
        matches!(self, Query::Select(_) | Query::ShowTables(_))
    }

    pub fn table(&self) -> Option<&str> {
        match self {
            Query::Create(Create { table }) => Some(&table.name),
            Query::Insert(Insert { table, .. })
            | Query::Update(Update { table, .. })
            | Query::Delete(Delete { table, .. })
            | Query::Select(Select { table, .. }) => Some(table),
            Query::ShowTables(_) => None,
        }
    }
}

impl Shadow for Query {
    type Result = ShadowResult;

    fn shadow(&self, tables: &mut Vec<Table>) -> Self::Result {
        match self {
            Query::Create(create) => create.shadow(tables),
            Query::Insert(insert) => insert.shadow(tables),
            Query::Update(update) => update.shadow(tables),
            Query::Delete(delete) => delete.shadow(tables),
            Query::Select(select) => select.shadow(tables),
            Query::ShowTables(show) => show.shadow(tables),
        }
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create(create) => write!(f, "{create}"),
            Self::Insert(insert) => write!(f, "{insert}"),
            Self::Update(update) => write!(f, "{update}"),
            Self::Delete(delete) => write!(f, "{delete}"),
            Self::Select(select) => write!(f, "{select}"),
            Self::ShowTables(show) => write!(f, "{show}"),
        }
    }
}

fn find_table<'a>(
    tables: &'a mut [Table],
    name: &str,
) -> Result<&'a mut Table, super::ShadowError> {
    tables
        .iter_mut()
        .find(|t| t.name == name)
        .ok_or_else(|| super::ShadowError::NoSuchTable(name.to_string()))
}

#[cfg(test)]
mod tests {
    use crate::model::{
        table::{Column, ColumnType, Row, SimValue, Table},
        Shadow, ShadowError,
    };

    use super::*;

    fn row(i: i64, s: &str) -> Row {
        vec![SimValue::Int(i), SimValue::from(s)]
    }

    fn schema() -> Table {
        Table::new(
            "t",
            vec![
                Column::new(0, ColumnType::Int),
                Column::new(1, ColumnType::char(8).unwrap()),
            ],
        )
    }

    fn apply(tables: &mut Vec<Table>, queries: &[Query]) {
        for query in queries {
            query.shadow(tables).unwrap();
        }
    }

    fn insert(values: Row) -> Query {
        Query::Insert(Insert {
            table: "t".to_string(),
            values,
        })
    }

    #[test]
    fn statements_render_in_the_engine_grammar() {
        let table = schema();
        let create = Query::Create(Create {
            table: table.clone(),
        });
        assert_eq!(create.to_string(), "CREATE TABLE t (i0 INT, c1 CHAR(8))");
        assert_eq!(
            insert(row(1, "abc")).to_string(),
            "INSERT INTO t VALUES (1, 'abc')"
        );
        assert_eq!(
            Update::by_pivot(&table, &row(1, "abc"), 0, &row(7, "zzz")).to_string(),
            "UPDATE t SET i0 = 7, c1 = 'zzz' WHERE i0 = 1"
        );
        assert_eq!(
            Delete::by_pivot(&table, &row(1, "abc"), 1).to_string(),
            "DELETE FROM t WHERE c1 = 'abc'"
        );
        assert_eq!(Select::all("t").to_string(), "SELECT * FROM t");
        assert_eq!(
            Select::filtered("t", Predicate::eq("i0", SimValue::Int(2))).to_string(),
            "SELECT * FROM t WHERE i0 = 2"
        );
        assert_eq!(ShowTables.to_string(), "SHOW TABLES");
    }

    #[test]
    fn update_through_pivot_keeps_row_order() {
        let table = schema();
        let mut tables = vec![];
        apply(
            &mut tables,
            &[
                Query::Create(Create {
                    table: table.clone(),
                }),
                insert(row(1, "abc")),
                insert(row(2, "de")),
                Query::Update(Update::by_pivot(&table, &row(1, "abc"), 0, &row(1, "zzz"))),
            ],
        );

        let rows = Select::all("t").shadow(&mut tables).unwrap();
        assert_eq!(rows, vec![row(1, "zzz"), row(2, "de")]);
    }

    #[test]
    fn delete_through_pivot_preserves_survivor_order() {
        let table = schema();
        let mut tables = vec![];
        apply(
            &mut tables,
            &[
                Query::Create(Create {
                    table: table.clone(),
                }),
                insert(row(1, "a")),
                insert(row(2, "b")),
                insert(row(3, "c")),
            ],
        );
        assert_eq!(Select::all("t").shadow(&mut tables).unwrap().len(), 3);

        Query::Delete(Delete::by_pivot(&table, &row(2, "b"), 0))
            .shadow(&mut tables)
            .unwrap();

        let rows = Select::all("t").shadow(&mut tables).unwrap();
        assert_eq!(rows, vec![row(1, "a"), row(3, "c")]);
    }

    #[test]
    fn filtered_select_returns_every_match() {
        let mut tables = vec![];
        apply(
            &mut tables,
            &[
                Query::Create(Create { table: schema() }),
                insert(row(1, "a")),
                insert(row(2, "b")),
                insert(row(1, "c")),
            ],
        );

        let rows = Select::filtered("t", Predicate::eq("i0", SimValue::Int(1)))
            .shadow(&mut tables)
            .unwrap();
        assert_eq!(rows, vec![row(1, "a"), row(1, "c")]);
    }

    #[test]
    fn show_tables_lists_sorted_names() {
        let mut tables = vec![Table::new("b", vec![]), Table::new("a", vec![])];
        let rows = ShowTables.shadow(&mut tables).unwrap();
        assert_eq!(
            rows,
            vec![vec![SimValue::from("a")], vec![SimValue::from("b")]]
        );
    }

    #[test]
    fn statements_on_unknown_tables_are_rejected() {
        let mut tables = vec![schema()];
        assert_eq!(
            insert(row(1, "a")).shadow(&mut vec![]),
            Err(ShadowError::NoSuchTable("t".to_string()))
        );
        assert_eq!(
            Query::Create(Create { table: schema() }).shadow(&mut tables),
            Err(ShadowError::TableExists("t".to_string()))
        );
        assert_eq!(
            Select::filtered("t", Predicate::eq("x9", SimValue::Int(1))).shadow(&mut tables),
            Err(ShadowError::NoSuchColumn {
                table: "t".to_string(),
                column: "x9".to_string()
            })
        );
    }
}
