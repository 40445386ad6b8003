use rand::Rng;
use strum::VariantArray;

use crate::generation::{
    gen_alphanumeric, pick, pick_index, Arbitrary, ArbitraryFrom, ArbitrarySized,
    ArbitrarySizedFrom, GenerationContext, GenerationError,
};
use crate::model::table::{Column, ColumnType, Row, SimValue, Table};

#[derive(Debug, Clone, Copy, VariantArray)]
enum ColumnKind {
    Int,
    Float,
    Char,
}

impl Arbitrary for ColumnType {
    fn arbitrary<R: Rng, C: GenerationContext>(rng: &mut R, context: &C) -> Self {
        match pick(ColumnKind::VARIANTS, rng) {
            ColumnKind::Int => Self::Int,
            ColumnKind::Float => Self::Float,
            ColumnKind::Char => {
                let len = rng.random_range(context.opts().table.char_len_range.clone());
                Self::char(len).unwrap_or(Self::Int)
            }
        }
    }
}

/// A schema of exactly `size` columns. A schema made only of floats is
/// redrawn: mutations need a non-float pivot column to target a row.
impl ArbitrarySized for Vec<Column> {
    fn arbitrary_sized<R: Rng, C: GenerationContext>(
        rng: &mut R,
        context: &C,
        size: usize,
    ) -> Self {
        let size = size.max(1);
        loop {
            let columns = (0..size)
                .map(|ordinal| Column::new(ordinal, ColumnType::arbitrary(rng, context)))
                .collect::<Vec<_>>();
            if columns
                .iter()
                .any(|c| !matches!(c.column_type, ColumnType::Float))
            {
                return columns;
            }
            tracing::trace!(size, "redrawing all-float schema");
        }
    }
}

impl ArbitrarySizedFrom<&str> for Table {
    fn arbitrary_sized_from<R: Rng, C: GenerationContext>(
        rng: &mut R,
        context: &C,
        name: &str,
        size: usize,
    ) -> Self {
        Table::new(name, Vec::<Column>::arbitrary_sized(rng, context, size))
    }
}

impl ArbitraryFrom<&str> for Table {
    fn arbitrary_from<R: Rng, C: GenerationContext>(rng: &mut R, context: &C, name: &str) -> Self {
        let size = rng.random_range(context.opts().table.column_range.clone()) as usize;
        Self::arbitrary_sized_from(rng, context, name, size)
    }
}

impl ArbitraryFrom<&ColumnType> for SimValue {
    fn arbitrary_from<R: Rng, C: GenerationContext>(
        rng: &mut R,
        context: &C,
        column_type: &ColumnType,
    ) -> Self {
        let opts = &context.opts().value;
        match column_type {
            ColumnType::Int => SimValue::Int(rng.random_range(opts.int_min..=opts.int_max)),
            ColumnType::Float => SimValue::Float(rng.random_range(opts.float_range.clone())),
            ColumnType::Char(max_len) => {
                let len = rng.random_range(1..=max_len.get()) as usize;
                SimValue::Char(gen_alphanumeric(rng, len))
            }
        }
    }
}

impl ArbitraryFrom<&Table> for Row {
    fn arbitrary_from<R: Rng, C: GenerationContext>(
        rng: &mut R,
        context: &C,
        table: &Table,
    ) -> Self {
        table
            .columns
            .iter()
            .map(|column| SimValue::arbitrary_from(rng, context, &column.column_type))
            .collect()
    }
}

/// Uniformly resamples a column index until it does not point at a float
/// column, so WHERE-equality clauses never compare floats.
pub fn pick_pivot_column<R: Rng>(table: &Table, rng: &mut R) -> Result<usize, GenerationError> {
    if table.is_all_float() {
        return Err(GenerationError::NoPivotColumn(table.name.clone()));
    }
    loop {
        let index = pick_index(table.columns.len(), rng);
        if !matches!(table.columns[index].column_type, ColumnType::Float) {
            return Ok(index);
        }
    }
}
