use std::fmt::Display;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sql_generation::{
    generation::{
        query::{conditional_select, random_mutation},
        ArbitraryFrom,
    },
    model::{
        query::{Create, Insert, Query, Select, ShowTables},
        table::{Row, SimValue, Table},
        Shadow, ShadowError,
    },
};

use crate::profiles::{Profile, ScenarioKind};

use super::{
    compare::{
        check_no_failure, compare_headers, compare_result_set, compare_table_list, Mismatch,
    },
    env::SimulatorEnv,
    process::{Client, DriverError, Server},
    sink::OutputSink,
};

/// Name of the single table of the update, update-delete and populate
/// scenarios.
pub const SCENARIO_TABLE: &str = "sim_table";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioState {
    Init,
    SchemaCreated,
    Populated,
    Mutating,
    Verified,
    Done,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Shadow(#[from] ShadowError),
    #[error("{context}: {mismatch}")]
    Mismatch { context: String, mismatch: Mismatch },
}

impl ScenarioError {
    fn mismatch(context: impl Into<String>) -> impl FnOnce(Mismatch) -> Self {
        let context = context.into();
        move |mismatch| ScenarioError::Mismatch { context, mismatch }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioStats {
    pub create_tables: usize,
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
    pub selects: usize,
    pub show_tables: usize,
    /// Mutations dropped because no row could be targeted unambiguously
    pub skipped_mutations: usize,
    pub verifications: usize,
}

impl ScenarioStats {
    fn record(&mut self, query: &Query) {
        match query {
            Query::Create(_) => self.create_tables += 1,
            Query::Insert(_) => self.inserts += 1,
            Query::Update(_) => self.updates += 1,
            Query::Delete(_) => self.deletes += 1,
            Query::Select(_) => self.selects += 1,
            Query::ShowTables(_) => self.show_tables += 1,
        }
    }
}

impl Display for ScenarioStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} create table, {} insert, {} update, {} delete, {} select, {} show tables, \
             {} skipped mutations, {} verifications",
            self.create_tables,
            self.inserts,
            self.updates,
            self.deletes,
            self.selects,
            self.show_tables,
            self.skipped_mutations,
            self.verifications
        )
    }
}

/// One end-to-end check against a freshly started engine.
///
/// Every statement is applied to the shadow model before it is sent, so the
/// model always reflects what a correct engine holds. The server lives for
/// the duration of [`Scenario::run`] and is killed on every exit path.
pub struct Scenario {
    kind: ScenarioKind,
    state: ScenarioState,
    tables: Vec<Table>,
    statements: Vec<Query>,
    stats: ScenarioStats,
}

impl Scenario {
    pub fn new(kind: ScenarioKind) -> Self {
        Scenario {
            kind,
            state: ScenarioState::Init,
            tables: Vec::new(),
            statements: Vec::new(),
            stats: ScenarioStats::default(),
        }
    }

    pub fn kind(&self) -> ScenarioKind {
        self.kind
    }

    pub fn state(&self) -> ScenarioState {
        self.state
    }

    /// Statements issued so far, in order.
    pub fn statements(&self) -> &[Query] {
        &self.statements
    }

    pub fn stats(&self) -> &ScenarioStats {
        &self.stats
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn run(&mut self, env: &mut SimulatorEnv) -> Result<ScenarioStats, ScenarioError> {
        let _span = tracing::info_span!("scenario", seed = env.seed, kind = %self.kind).entered();
        let result = match self.kind {
            ScenarioKind::Catalog => self.run_catalog(env),
            ScenarioKind::Update | ScenarioKind::UpdateDelete | ScenarioKind::Populate => {
                self.run_single_table(env)
            }
        };
        match &result {
            Ok(()) => {
                self.transition(ScenarioState::Done);
                tracing::info!("scenario passed: {}", self.stats);
            }
            Err(err) => {
                self.transition(ScenarioState::Failed);
                tracing::error!("scenario failed: {err}");
            }
        }
        result.map(|()| self.stats.clone())
    }

    fn run_single_table(&mut self, env: &mut SimulatorEnv) -> Result<(), ScenarioError> {
        let profile = &env.profile;
        let rng = &mut env.rng;

        let server = Server::start(&profile.engine, &env.paths.db)?;
        let sink = OutputSink::new(server.db_path(), &profile.engine.output_file);
        let mut client = server.new_client()?;

        let table = Table::arbitrary_from(rng, profile, SCENARIO_TABLE);
        self.issue(&mut client, Query::Create(Create { table }))?;
        self.transition(ScenarioState::SchemaCreated);

        let rows = rng.random_range(profile.generation.insert.row_range.clone());
        for _ in 0..rows {
            let insert = Insert::arbitrary_from(rng, profile, self.table(SCENARIO_TABLE)?);
            self.issue(&mut client, Query::Insert(insert))?;
        }
        self.transition(ScenarioState::Populated);

        if self.kind.mutates() {
            self.transition(ScenarioState::Mutating);
            for _ in 0..profile.generation.mutation.count {
                let table = self.table(SCENARIO_TABLE)?;
                match random_mutation(rng, profile, table, self.kind.allows_delete()) {
                    Some(query) => {
                        self.issue(&mut client, query)?;
                    }
                    None => {
                        self.stats.skipped_mutations += 1;
                        tracing::debug!("skipped a mutation, no row with a unique pivot value");
                    }
                }
            }
        }

        client.close_and_flush()?;
        // statements without a result set only ever write the failure marker
        check_no_failure(&sink.read_lines()?).map_err(ScenarioError::mismatch("setup"))?;

        self.verify_select(&server, &sink, profile, Select::all(SCENARIO_TABLE))?;
        for _ in 0..profile.scenario.conditional_selects {
            let select = conditional_select(rng, self.table(SCENARIO_TABLE)?);
            if let Some(select) = select {
                self.verify_select(&server, &sink, profile, select)?;
            }
        }
        self.transition(ScenarioState::Verified);

        server.stop();
        Ok(())
    }

    fn run_catalog(&mut self, env: &mut SimulatorEnv) -> Result<(), ScenarioError> {
        let profile = &env.profile;
        let rng = &mut env.rng;
        let timeouts = &profile.engine.timeouts;

        let server = Server::start(&profile.engine, &env.paths.db)?;
        let sink = OutputSink::new(server.db_path(), &profile.engine.output_file);

        let mut client = server.new_client()?;
        for i in 0..profile.scenario.catalog_tables {
            let table = Table::arbitrary_from(rng, profile, format!("test_table{i:05}").as_str());
            self.issue(&mut client, Query::Create(Create { table }))?;
        }
        client.close_and_flush()?;
        check_no_failure(&sink.read_lines()?).map_err(ScenarioError::mismatch("setup"))?;
        self.transition(ScenarioState::SchemaCreated);

        sink.truncate()?;
        let mut client = server.new_client()?;
        let expected = self.issue(&mut client, Query::ShowTables(ShowTables))?;
        client.close_and_flush()?;
        let lines = sink.wait_for_lines(expected.len() + 1, timeouts)?;
        let names = expected
            .iter()
            .filter_map(|row| match row.first() {
                Some(SimValue::Char(name)) => Some(name.clone()),
                _ => None,
            })
            .collect::<Vec<_>>();
        compare_table_list(&names, &lines).map_err(ScenarioError::mismatch(ShowTables.to_string()))?;
        self.stats.verifications += 1;
        tracing::info!(tables = names.len(), "verified table list");

        sink.truncate()?;
        let mut client = server.new_client()?;
        let selects = self
            .tables
            .iter()
            .map(|table| Select::all(table.name.clone()))
            .collect::<Vec<_>>();
        for select in selects {
            self.issue(&mut client, Query::Select(select))?;
        }
        client.close_and_flush()?;
        let lines = sink.wait_for_lines(self.tables.len(), timeouts)?;
        compare_headers(&self.tables, &lines).map_err(ScenarioError::mismatch("table headers"))?;
        self.stats.verifications += 1;
        tracing::info!(tables = self.tables.len(), "verified table headers");
        self.transition(ScenarioState::Verified);

        server.stop();
        Ok(())
    }

    /// Runs `select` on a new client against an empty sink and compares the
    /// engine output with the shadow result.
    fn verify_select(
        &mut self,
        server: &Server,
        sink: &OutputSink,
        profile: &Profile,
        select: Select,
    ) -> Result<(), ScenarioError> {
        let columns = self.table(&select.table)?.columns.clone();
        let statement = select.to_string();

        sink.truncate()?;
        let mut client = server.new_client()?;
        let expected = self.issue(&mut client, Query::Select(select))?;
        client.close_and_flush()?;

        let lines = sink.wait_for_lines(expected.len() + 1, &profile.engine.timeouts)?;
        compare_result_set(&expected, &lines, &columns)
            .map_err(ScenarioError::mismatch(statement.clone()))?;
        self.stats.verifications += 1;
        tracing::info!(rows = expected.len(), "verified `{statement}`");
        Ok(())
    }

    /// Applies `query` to the shadow model, then sends it. Returns the rows a
    /// correct engine answers with.
    fn issue(&mut self, client: &mut Client, query: Query) -> Result<Vec<Row>, ScenarioError> {
        let rows = query.shadow(&mut self.tables)?;
        let statement = query.to_string();
        tracing::trace!("{statement}");
        client.send(&statement)?;
        self.stats.record(&query);
        self.statements.push(query);
        Ok(rows)
    }

    fn table(&self, name: &str) -> Result<&Table, ShadowError> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ShadowError::NoSuchTable(name.to_string()))
    }

    fn transition(&mut self, next: ScenarioState) {
        tracing::info!(from = %self.state, to = %next, "scenario transition");
        self.state = next;
    }
}
