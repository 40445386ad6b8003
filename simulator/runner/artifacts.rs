use std::{
    io::{BufWriter, Write},
    path::Path,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sql_generation::model::query::Query;

use crate::profiles::{Profile, ScenarioKind};

use super::{env::Paths, scenario::ScenarioStats};

/// What is kept of a failed run to reproduce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub seed: u64,
    pub scenario: ScenarioKind,
    pub error: String,
    /// Timestamp of the run.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    pub stats: ScenarioStats,
    pub profile: Profile,
}

/// Writes the statement log as an executable script, one statement per line.
pub fn write_plan(paths: &Paths, statements: &[Query]) -> std::io::Result<()> {
    std::fs::create_dir_all(&paths.base)?;
    let mut f = BufWriter::new(std::fs::File::create(&paths.plan)?);
    for statement in statements {
        writeln!(f, "{statement};")?;
    }
    f.flush()
}

/// Writes `plan.sql` and `failure.json` under the run directory.
pub fn write_failure(
    paths: &Paths,
    report: &FailureReport,
    statements: &[Query],
) -> std::io::Result<()> {
    write_plan(paths, statements)?;
    let f = BufWriter::new(std::fs::File::create(&paths.failure)?);
    serde_json::to_writer_pretty(f, report)?;
    tracing::info!(
        plan = %paths.plan.display(),
        report = %paths.failure.display(),
        "wrote failure artifacts"
    );
    Ok(())
}

/// Reads a failure report, given either the `failure.json` file or the run
/// directory holding it.
pub fn load_failure(path: &Path) -> std::io::Result<FailureReport> {
    let path = if path.is_dir() {
        Paths::failure_in(path)
    } else {
        path.to_path_buf()
    };
    let f = std::fs::File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(f))?)
}
