pub mod artifacts;
pub mod cli;
pub mod compare;
pub mod env;
pub mod process;
pub mod scenario;
pub mod sink;
