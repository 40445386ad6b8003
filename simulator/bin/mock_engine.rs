//! A stand-in for the rmdb server and client, backed by SQLite.
//!
//! `mock-rmdb server <db>` creates the database directory, records its pid in
//! `server.pid`, drops a `.ready` marker and idles until killed. `mock-rmdb client <db>` executes the
//! `;`-terminated statements read from stdin and appends result sets to
//! `<db>/output.txt` the way rmdb prints them: a `| c1 | c2 |` header, one
//! line per row, floats in single precision with six decimals and `failure`
//! for a rejected statement.
//!
//! `MOCK_RMDB_FAULT` injects engine bugs:
//! `drop-last-row`, `float-drift` and `ignore-updates` corrupt results,
//! `never-ready` and `exit-early` break server startup.

use std::{
    fs::OpenOptions,
    io::{BufRead, Write},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{bail, Context};
use clap::Parser;
use rusqlite::{types::ValueRef, Connection};
use tracing_subscriber::EnvFilter;

const READY_MARKER: &str = ".ready";
const PID_FILE: &str = "server.pid";
const OUTPUT_FILE: &str = "output.txt";
const DATABASE_FILE: &str = "mock.sqlite3";
const FAULT_VAR: &str = "MOCK_RMDB_FAULT";
const FAILURE_MARKER: &str = "failure";
const FLOAT_DRIFT: f64 = 0.01;

#[derive(Parser, Debug)]
#[command(name = "mock-rmdb", about = "SQLite-backed stand-in for the rmdb server and client")]
enum MockCommand {
    /// Create the database directory, signal readiness and idle until killed
    Server { db: PathBuf },
    /// Execute the statements read from stdin against the database
    Client { db: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
enum Fault {
    DropLastRow,
    FloatDrift,
    IgnoreUpdates,
    NeverReady,
    ExitEarly,
}

impl Fault {
    fn from_env() -> anyhow::Result<Option<Self>> {
        match std::env::var(FAULT_VAR) {
            Ok(value) if value.is_empty() => Ok(None),
            Ok(value) => Fault::from_str(&value)
                .map(Some)
                .with_context(|| format!("unknown {FAULT_VAR} `{value}`")),
            Err(_) => Ok(None),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .without_time()
        .init();

    let fault = Fault::from_env()?;
    match MockCommand::parse() {
        MockCommand::Server { db } => serve(&db, fault),
        MockCommand::Client { db } => run_client(&db, fault),
    }
}

fn serve(db: &Path, fault: Option<Fault>) -> anyhow::Result<()> {
    if fault == Some(Fault::ExitEarly) {
        bail!("exiting before becoming ready");
    }
    std::fs::create_dir_all(db)
        .with_context(|| format!("failed to create database directory {}", db.display()))?;
    std::fs::write(db.join(PID_FILE), std::process::id().to_string())?;
    Connection::open(db.join(DATABASE_FILE))?;
    if fault != Some(Fault::NeverReady) {
        std::fs::write(db.join(READY_MARKER), b"")?;
    }
    tracing::info!(db = %db.display(), "serving");
    loop {
        std::thread::sleep(Duration::from_secs(60));
    }
}

fn run_client(db: &Path, fault: Option<Fault>) -> anyhow::Result<()> {
    let conn = Connection::open(db.join(DATABASE_FILE))?;
    let mut output = OpenOptions::new()
        .create(true)
        .append(true)
        .open(db.join(OUTPUT_FILE))?;

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let statement = line.trim().trim_end_matches(';').trim();
        if statement.is_empty() {
            continue;
        }
        if let Err(err) = execute(&conn, statement, fault, &mut output) {
            tracing::warn!(%err, "`{statement}` failed");
            writeln!(output, "{FAILURE_MARKER}")?;
        }
    }
    output.flush()?;
    Ok(())
}

fn execute(
    conn: &Connection,
    statement: &str,
    fault: Option<Fault>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let keyword = statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    match keyword.as_str() {
        "SELECT" => select(conn, statement, fault, out),
        "SHOW" => select(
            conn,
            "SELECT name AS Tables FROM sqlite_master WHERE type = 'table' ORDER BY name",
            None,
            out,
        ),
        "UPDATE" if fault == Some(Fault::IgnoreUpdates) => Ok(()),
        _ => {
            conn.execute(statement, [])?;
            Ok(())
        }
    }
}

fn select(
    conn: &Connection,
    sql: &str,
    fault: Option<Fault>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut stmt = conn.prepare(sql)?;
    let names = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut lines = vec![format_record(&names)];

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let fields = (0..names.len())
            .map(|i| row.get_ref(i).map(|value| format_value(value, fault)))
            .collect::<Result<Vec<_>, _>>()?;
        lines.push(format_record(&fields));
    }
    if fault == Some(Fault::DropLastRow) && lines.len() > 1 {
        lines.pop();
    }

    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn format_record(fields: &[String]) -> String {
    format!("| {} |", fields.join(" | "))
}

fn format_value(value: ValueRef<'_>, fault: Option<Fault>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => {
            let drift = if fault == Some(Fault::FloatDrift) {
                FLOAT_DRIFT
            } else {
                0.0
            };
            format!("{:.6}", f64::from(f as f32) + drift)
        }
        ValueRef::Text(text) | ValueRef::Blob(text) => String::from_utf8_lossy(text).into_owned(),
    }
}
