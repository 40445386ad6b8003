use std::{fmt::Display, ops::Range};

use garde::Validate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Trait used to provide context to generation functions
pub trait GenerationContext {
    fn opts(&self) -> &Opts;
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields, default)]
pub struct Opts {
    #[garde(dive)]
    pub table: TableOpts,
    #[garde(dive)]
    pub value: ValueOpts,
    #[garde(dive)]
    pub insert: InsertOpts,
    #[garde(dive)]
    pub mutation: MutationOpts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields, default)]
pub struct TableOpts {
    /// Range of numbers of columns to generate
    #[garde(custom(range_struct_min(1)))]
    pub column_range: Range<u32>,
    /// Range of declared `CHAR(n)` lengths
    #[garde(custom(range_struct_min(1)))]
    pub char_len_range: Range<u32>,
}

impl Default for TableOpts {
    fn default() -> Self {
        Self {
            // 1 to 10 columns
            column_range: 1..11,
            // CHAR(1) to CHAR(100)
            char_len_range: 1..101,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields, default)]
pub struct ValueOpts {
    /// Smallest generated integer, inclusive
    #[garde(custom(not_greater_than(&self.int_max)))]
    pub int_min: i64,
    /// Largest generated integer, inclusive
    #[garde(skip)]
    pub int_max: i64,
    /// Range of generated floats
    #[garde(custom(non_empty_float_range))]
    pub float_range: Range<f64>,
}

impl Default for ValueOpts {
    fn default() -> Self {
        Self {
            int_min: -(1 << 31) - 1,
            int_max: 1 << 31,
            float_range: 0.0..60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields, default)]
pub struct InsertOpts {
    /// Range of numbers of rows inserted when populating a table
    #[garde(custom(range_struct_min(1)))]
    pub row_range: Range<u32>,
}

impl Default for InsertOpts {
    fn default() -> Self {
        Self { row_range: 1..101 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields, default)]
pub struct MutationOpts {
    /// Number of mutation statements issued by a mutating scenario
    #[garde(skip)]
    pub count: u32,
    /// Chance that a mutation is a delete rather than an update, for
    /// scenarios that issue deletes at all
    #[garde(range(min = 0.0, max = 1.0))]
    pub delete_probability: f64,
    /// How many (row, pivot) pairs are tried before a mutation is skipped
    /// because no row can be targeted unambiguously.
    #[garde(range(min = 1))]
    pub pivot_attempts: u32,
}

impl Default for MutationOpts {
    fn default() -> Self {
        Self {
            count: 50,
            delete_probability: 0.3,
            pivot_attempts: 32,
        }
    }
}

fn range_struct_min<T: PartialOrd + Display>(
    min: T,
) -> impl FnOnce(&Range<T>, &()) -> garde::Result {
    move |value, _| {
        if value.start < min {
            return Err(garde::Error::new(format!(
                "range start `{}` is smaller than {min}",
                value.start
            )));
        } else if value.end <= value.start {
            return Err(garde::Error::new(format!(
                "range `{}..{}` is empty",
                value.start, value.end
            )));
        }
        Ok(())
    }
}

fn non_empty_float_range(value: &Range<f64>, _: &()) -> garde::Result {
    if !value.start.is_finite() || !value.end.is_finite() || value.start >= value.end {
        return Err(garde::Error::new(format!(
            "range `{}..{}` is empty or not finite",
            value.start, value.end
        )));
    }
    Ok(())
}

/// Value of field must not exceed another field in the struct
fn not_greater_than<T: PartialOrd + Display>(
    max: &T,
) -> impl FnOnce(&T, &()) -> garde::Result + '_ {
    move |value, _| {
        if value > max {
            return Err(garde::Error::new(format!(
                "`{value}` is bigger than `{max}`"
            )));
        }
        Ok(())
    }
}
