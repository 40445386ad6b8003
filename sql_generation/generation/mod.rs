use rand::{distr::Alphanumeric, Rng};

pub mod opts;
pub mod query;
pub mod table;

pub use opts::*;

/// Arbitrary trait for generating random values
/// An implementation of arbitrary is assumed to be a uniform sampling of
/// the possible values of the type.
pub trait Arbitrary {
    fn arbitrary<R: Rng, C: GenerationContext>(rng: &mut R, context: &C) -> Self;
}

/// ArbitrarySized trait for generating random values of a specific size
/// An implementation of arbitrary_sized is assumed to be a uniform sampling of
/// the possible values of the type, with the additional constraint that the
/// generated value must have the given size, such as the number of columns of
/// a schema.
pub trait ArbitrarySized {
    fn arbitrary_sized<R: Rng, C: GenerationContext>(rng: &mut R, context: &C, size: usize)
        -> Self;
}

/// ArbitraryFrom trait for generating random values from a given value
/// ArbitraryFrom allows for constructing relations, where the generated
/// value is dependent on the given value. These relations could be constraints
/// such as generating a value that fits in a column, or a row that fits in a
/// table.
pub trait ArbitraryFrom<T> {
    fn arbitrary_from<R: Rng, C: GenerationContext>(rng: &mut R, context: &C, t: T) -> Self;
}

/// ArbitrarySizedFrom trait for generating random values from a given value
/// and a size constraint, e.g. a table with a given name and column count.
pub trait ArbitrarySizedFrom<T> {
    fn arbitrary_sized_from<R: Rng, C: GenerationContext>(
        rng: &mut R,
        context: &C,
        t: T,
        size: usize,
    ) -> Self;
}

/// ArbitraryFromMaybe trait for fallibally generating random values from a given value
pub trait ArbitraryFromMaybe<T> {
    fn arbitrary_from_maybe<R: Rng, C: GenerationContext>(
        rng: &mut R,
        context: &C,
        t: T,
    ) -> Option<Self>
    where
        Self: Sized;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("table {0} has no non-float column to use as a pivot")]
    NoPivotColumn(String),
}

/// pick is a helper function for uniformly picking a random element from a slice
pub fn pick<'a, T, R: Rng>(choices: &'a [T], rng: &mut R) -> &'a T {
    let index = rng.random_range(0..choices.len());
    &choices[index]
}

/// pick_index is typically used for picking an index from a slice to later refer to the element
/// at that index.
pub fn pick_index<R: Rng>(choices: usize, rng: &mut R) -> usize {
    rng.random_range(0..choices)
}

/// gen_alphanumeric draws `len` characters from `[0-9A-Za-z]`, the alphabet
/// every string literal is built from, so literals never need escaping.
pub fn gen_alphanumeric<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| char::from(rng.sample(Alphanumeric))).collect()
}
