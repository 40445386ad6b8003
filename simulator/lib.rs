//! Shadow-state differential testing of the rmdb SQL engine.
//!
//! A scenario generates a schema and rows that respect the engine grammar,
//! mirrors every statement into an in-memory shadow model, drives the engine
//! through its line protocol and compares the result sets the engine writes
//! to its output sink with what the model predicts.

pub mod profiles;
pub mod runner;
