//! End-to-end scenarios against the SQLite-backed `mock-rmdb` engine.

use std::path::Path;

use rmdb_simulator::{
    profiles::{CommandSpec, Profile, Readiness, ScenarioKind, Timeouts},
    runner::{
        compare::{compare_result_set, Mismatch},
        env::{Paths, SimulatorEnv},
        process::{DriverError, Server},
        scenario::{Scenario, ScenarioError, ScenarioState},
        sink::OutputSink,
    },
};
use sql_generation::model::{
    query::{Create, Insert, Query, Select},
    table::{Column, ColumnType, SimValue, Table},
    Shadow,
};

const MOCK: &str = env!("CARGO_BIN_EXE_mock-rmdb");

fn mock_profile(kind: ScenarioKind) -> Profile {
    let mut profile = Profile::default();
    profile.scenario.kind = kind;
    profile.engine.server = CommandSpec::new(MOCK).arg("server").arg("{db}");
    profile.engine.client = CommandSpec::new(MOCK).arg("client").arg("{db}");
    profile.engine.readiness = Readiness::MarkerFile {
        path: ".ready".to_string(),
    };
    profile.engine.timeouts = Timeouts {
        poll_interval_ms: 10,
        startup_timeout_ms: 5_000,
        client_timeout_ms: 10_000,
        sink_timeout_ms: 500,
        sink_quiet_ms: 20,
    };
    profile
}

fn with_fault(mut profile: Profile, fault: &str) -> Profile {
    profile.engine.client = profile.engine.client.env("MOCK_RMDB_FAULT", fault);
    profile.engine.server = profile.engine.server.env("MOCK_RMDB_FAULT", fault);
    profile
}

/// Asserts the mock server of `seed` is no longer running.
#[cfg(unix)]
fn assert_server_terminated(workdir: &Path, seed: u64) {
    let db = Paths::new(workdir, seed).db;
    let pid = std::fs::read_to_string(db.join("server.pid")).unwrap();
    let alive = std::process::Command::new("kill")
        .args(["-0", pid.trim()])
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap()
        .success();
    assert!(!alive, "server {} outlived its scenario", pid.trim());
}

fn run(profile: Profile, seed: u64, workdir: &Path) -> (Scenario, Result<(), ScenarioError>) {
    let mut env = SimulatorEnv::new(seed, profile.validated().unwrap(), workdir);
    let mut scenario = Scenario::new(env.profile.scenario.kind);
    let result = scenario.run(&mut env).map(|_| ());
    (scenario, result)
}

#[test]
fn populated_tables_round_trip() {
    let workdir = tempfile::tempdir().unwrap();
    for seed in 0..50 {
        let (scenario, result) = run(mock_profile(ScenarioKind::Populate), seed, workdir.path());
        if let Err(err) = result {
            panic!("seed {seed}: {err}");
        }
        assert_eq!(scenario.state(), ScenarioState::Done);
        assert_eq!(scenario.stats().updates + scenario.stats().deletes, 0);
        assert_eq!(scenario.stats().verifications, 1);
    }
}

#[test]
fn updates_match_the_shadow_model() {
    let workdir = tempfile::tempdir().unwrap();
    for seed in 0..10 {
        let (scenario, result) = run(mock_profile(ScenarioKind::Update), seed, workdir.path());
        if let Err(err) = result {
            panic!("seed {seed}: {err}");
        }
        let stats = scenario.stats();
        assert_eq!(stats.updates + stats.skipped_mutations, 50, "seed {seed}");
        assert_eq!(stats.deletes, 0);
    }
}

#[test]
fn updates_and_deletes_match_the_shadow_model() {
    let workdir = tempfile::tempdir().unwrap();
    for seed in 0..10 {
        let mut profile = mock_profile(ScenarioKind::UpdateDelete);
        profile.scenario.conditional_selects = 3;
        let (scenario, result) = run(profile, seed, workdir.path());
        if let Err(err) = result {
            panic!("seed {seed}: {err}");
        }
        assert!(!scenario.tables()[0].rows.is_empty());
        assert_eq!(scenario.stats().verifications, 4, "seed {seed}");
    }
}

#[test]
fn catalog_lists_every_table() {
    let workdir = tempfile::tempdir().unwrap();
    let (scenario, result) = run(mock_profile(ScenarioKind::Catalog), 7, workdir.path());
    if let Err(err) = result {
        panic!("{err}");
    }
    assert_eq!(scenario.tables().len(), 100);
    assert_eq!(scenario.tables()[0].name, "test_table00000");
    assert_eq!(scenario.tables()[99].name, "test_table00099");
    assert_eq!(scenario.stats().verifications, 2);
}

#[test]
fn dropped_rows_are_detected() {
    let workdir = tempfile::tempdir().unwrap();
    let profile = with_fault(mock_profile(ScenarioKind::Populate), "drop-last-row");
    let (scenario, result) = run(profile, 1, workdir.path());
    assert!(
        matches!(
            result,
            Err(ScenarioError::Mismatch {
                mismatch: Mismatch::RowCount { .. },
                ..
            })
        ),
        "{result:?}"
    );
    assert_eq!(scenario.state(), ScenarioState::Failed);
}

#[test]
fn ignored_updates_are_detected() {
    let workdir = tempfile::tempdir().unwrap();
    let profile = with_fault(mock_profile(ScenarioKind::Update), "ignore-updates");
    let (scenario, result) = run(profile, 3, workdir.path());
    assert!(scenario.stats().updates > 0);
    assert!(
        matches!(
            result,
            Err(ScenarioError::Mismatch {
                mismatch: Mismatch::Value { .. },
                ..
            })
        ),
        "{result:?}"
    );
}

#[test]
fn float_drift_is_detected() {
    let workdir = tempfile::tempdir().unwrap();
    let profile = with_fault(mock_profile(ScenarioKind::Populate), "float-drift");
    let timeouts = profile.engine.timeouts.clone();
    let db = workdir.path().join("db");
    let server = Server::start(&profile.engine, &db).unwrap();
    let sink = OutputSink::new(server.db_path(), "output.txt");

    let table = Table::new(
        "t",
        vec![
            Column::new(0, ColumnType::Int),
            Column::new(1, ColumnType::Float),
        ],
    );
    let mut tables = vec![];
    let statements = vec![
        Query::Create(Create {
            table: table.clone(),
        }),
        Query::Insert(Insert {
            table: "t".to_string(),
            values: vec![SimValue::Int(1), SimValue::Float(3.0)],
        }),
    ];
    let mut client = server.new_client().unwrap();
    for statement in &statements {
        statement.shadow(&mut tables).unwrap();
        client.send(&statement.to_string()).unwrap();
    }
    client.close_and_flush().unwrap();

    sink.truncate().unwrap();
    let select = Select::all("t");
    let expected = select.shadow(&mut tables).unwrap();
    let mut client = server.new_client().unwrap();
    client.send(&select.to_string()).unwrap();
    client.close_and_flush().unwrap();
    let lines = sink.wait_for_lines(2, &timeouts).unwrap();

    assert_eq!(lines, vec!["| i0 | f1 |", "| 1 | 3.010000 |"]);
    assert_eq!(
        compare_result_set(&expected, &lines, &table.columns),
        Err(Mismatch::Value {
            row: 0,
            column: 1,
            name: "f1".to_string(),
            expected: "3.0".to_string(),
            actual: "3.010000".to_string(),
        })
    );
    server.stop();
}

#[test]
fn server_that_never_becomes_ready_fails_loudly() {
    let workdir = tempfile::tempdir().unwrap();
    let mut profile = with_fault(mock_profile(ScenarioKind::Populate), "never-ready");
    profile.engine.timeouts.startup_timeout_ms = 200;
    let (scenario, result) = run(profile, 0, workdir.path());
    assert!(
        matches!(
            result,
            Err(ScenarioError::Driver(DriverError::StartupTimeout { .. }))
        ),
        "{result:?}"
    );
    assert_eq!(scenario.state(), ScenarioState::Failed);
    assert!(scenario.statements().is_empty());
}

#[test]
fn server_exiting_at_startup_is_reported() {
    let workdir = tempfile::tempdir().unwrap();
    let profile = with_fault(mock_profile(ScenarioKind::Populate), "exit-early");
    let (_, result) = run(profile, 0, workdir.path());
    assert!(
        matches!(
            result,
            Err(ScenarioError::Driver(DriverError::ServerExited { .. }))
        ),
        "{result:?}"
    );
}

#[cfg(unix)]
#[test]
fn server_is_terminated_after_a_mismatch() {
    let workdir = tempfile::tempdir().unwrap();
    let profile = with_fault(mock_profile(ScenarioKind::Populate), "drop-last-row");
    let (_, result) = run(profile, 11, workdir.path());
    assert!(matches!(result, Err(ScenarioError::Mismatch { .. })), "{result:?}");
    assert_server_terminated(workdir.path(), 11);
}

#[cfg(unix)]
#[test]
fn server_is_terminated_when_setup_fails() {
    let workdir = tempfile::tempdir().unwrap();
    let mut profile = mock_profile(ScenarioKind::Populate);
    profile.engine.client = CommandSpec::new("/nonexistent/rmdb_client");
    let (scenario, result) = run(profile, 12, workdir.path());
    assert!(
        matches!(result, Err(ScenarioError::Driver(DriverError::Spawn { .. }))),
        "{result:?}"
    );
    assert_eq!(scenario.state(), ScenarioState::Failed);
    assert_server_terminated(workdir.path(), 12);
}

#[cfg(unix)]
#[test]
fn server_is_terminated_after_a_startup_timeout() {
    let workdir = tempfile::tempdir().unwrap();
    let mut profile = with_fault(mock_profile(ScenarioKind::Populate), "never-ready");
    profile.engine.timeouts.startup_timeout_ms = 1_000;
    let (_, result) = run(profile, 13, workdir.path());
    assert!(result.is_err());
    assert_server_terminated(workdir.path(), 13);
}
