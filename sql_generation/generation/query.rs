use rand::Rng;

use crate::generation::{
    pick, pick_index, table::pick_pivot_column, ArbitraryFrom, ArbitraryFromMaybe,
    GenerationContext,
};
use crate::model::query::{Delete, Insert, Predicate, Query, Select, Update};
use crate::model::table::{Row, Table};

impl ArbitraryFrom<&Table> for Insert {
    fn arbitrary_from<R: Rng, C: GenerationContext>(
        rng: &mut R,
        context: &C,
        table: &Table,
    ) -> Self {
        Insert {
            table: table.name.clone(),
            values: Row::arbitrary_from(rng, context, table),
        }
    }
}

/// Picks a `(row, pivot)` pair whose pivot value appears in no other row, so
/// that the engine, which touches every matching row, and the shadow model,
/// which touches the first one, agree. Gives up after
/// `mutation.pivot_attempts` draws.
pub fn pick_mutation_target<R: Rng, C: GenerationContext>(
    rng: &mut R,
    context: &C,
    table: &Table,
) -> Option<(usize, usize)> {
    if table.rows.is_empty() {
        return None;
    }
    let attempts = context.opts().mutation.pivot_attempts;
    for _ in 0..attempts {
        let row = pick_index(table.rows.len(), rng);
        let pivot = pick_pivot_column(table, rng).ok()?;
        if table.is_unique_at(row, pivot) {
            return Some((row, pivot));
        }
    }
    tracing::debug!(table = %table.name, attempts, "no row with a unique pivot value");
    None
}

impl ArbitraryFromMaybe<&Table> for Update {
    fn arbitrary_from_maybe<R: Rng, C: GenerationContext>(
        rng: &mut R,
        context: &C,
        table: &Table,
    ) -> Option<Self> {
        let (row, pivot) = pick_mutation_target(rng, context, table)?;
        let new_row = Row::arbitrary_from(rng, context, table);
        Some(Update::by_pivot(table, &table.rows[row], pivot, &new_row))
    }
}

impl ArbitraryFromMaybe<&Table> for Delete {
    fn arbitrary_from_maybe<R: Rng, C: GenerationContext>(
        rng: &mut R,
        context: &C,
        table: &Table,
    ) -> Option<Self> {
        // the last row is never deleted
        if table.rows.len() <= 1 {
            return None;
        }
        let (row, pivot) = pick_mutation_target(rng, context, table)?;
        Some(Delete::by_pivot(table, &table.rows[row], pivot))
    }
}

/// `SELECT * FROM t WHERE pivot = v` with `v` taken from a sampled row, so the
/// result holds at least that row. `None` on an empty table.
pub fn conditional_select<R: Rng>(rng: &mut R, table: &Table) -> Option<Select> {
    if table.rows.is_empty() {
        return None;
    }
    let row = pick(&table.rows, rng);
    let pivot = pick_pivot_column(table, rng).ok()?;
    Some(Select::filtered(
        table.name.clone(),
        Predicate::eq(table.columns[pivot].name.clone(), row[pivot].clone()),
    ))
}

impl ArbitraryFrom<&Table> for Select {
    fn arbitrary_from<R: Rng, C: GenerationContext>(
        rng: &mut R,
        _context: &C,
        table: &Table,
    ) -> Self {
        if rng.random_bool(0.5) {
            if let Some(select) = conditional_select(rng, table) {
                return select;
            }
        }
        Select::all(table.name.clone())
    }
}

/// One mutation against `table`: a delete with probability
/// `mutation.delete_probability` when `allow_delete` is set, an update
/// otherwise. A refused delete falls back to an update. `None` means no row
/// could be targeted unambiguously.
pub fn random_mutation<R: Rng, C: GenerationContext>(
    rng: &mut R,
    context: &C,
    table: &Table,
    allow_delete: bool,
) -> Option<Query> {
    if allow_delete && rng.random_bool(context.opts().mutation.delete_probability) {
        if let Some(delete) = Delete::arbitrary_from_maybe(rng, context, table) {
            return Some(Query::Delete(delete));
        }
    }
    Update::arbitrary_from_maybe(rng, context, table).map(Query::Update)
}
