use std::{collections::BTreeMap, path::Path, process::Command, time::Duration};

use garde::Validate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::min_dependent;

/// Placeholder replaced by the database directory of the running scenario.
pub const DB_PLACEHOLDER: &str = "{db}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields, default)]
pub struct EngineProfile {
    #[garde(dive)]
    pub server: CommandSpec,
    #[garde(dive)]
    pub client: CommandSpec,
    #[garde(skip)]
    pub readiness: Readiness,
    #[garde(dive)]
    pub timeouts: Timeouts,
    /// Result sink file, relative to the database directory
    #[garde(length(min = 1))]
    pub output_file: String,
}

impl Default for EngineProfile {
    fn default() -> Self {
        Self {
            server: CommandSpec::new("./rmdb").arg(DB_PLACEHOLDER),
            client: CommandSpec::new("./rmdb_client"),
            readiness: Readiness::Tcp {
                address: "127.0.0.1:8765".to_string(),
            },
            timeouts: Timeouts::default(),
            output_file: "output.txt".to_string(),
        }
    }
}

/// A program to launch, with its arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields)]
pub struct CommandSpec {
    #[garde(length(min = 1))]
    pub program: String,
    #[serde(default)]
    #[garde(skip)]
    pub args: Vec<String>,
    #[serde(default)]
    #[garde(skip)]
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Parses a whitespace separated command line such as `./rmdb {db}`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let program = words.next()?;
        Some(words.fold(Self::new(program), |spec, word| spec.arg(word)))
    }

    /// Builds the command for a scenario whose database lives at `db`.
    pub fn command(&self, db: &Path) -> Command {
        let db = db.display().to_string();
        let mut command = Command::new(&self.program);
        command.args(self.args.iter().map(|arg| arg.replace(DB_PLACEHOLDER, &db)));
        command.envs(
            self.env
                .iter()
                .map(|(key, value)| (key, value.replace(DB_PLACEHOLDER, &db))),
        );
        command
    }
}

/// How the driver decides that a freshly started server accepts clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "probe", rename_all = "snake_case", deny_unknown_fields)]
pub enum Readiness {
    /// A TCP connect to `address` succeeds
    Tcp { address: String },
    /// `path`, relative to the database directory, exists
    MarkerFile { path: String },
}

impl Readiness {
    pub fn probe(&self, db: &Path) -> bool {
        match self {
            Readiness::Tcp { address } => std::net::TcpStream::connect(address.as_str()).is_ok(),
            Readiness::MarkerFile { path } => db.join(path).exists(),
        }
    }
}

impl std::fmt::Display for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Readiness::Tcp { address } => write!(f, "tcp connect to {address}"),
            Readiness::MarkerFile { path } => write!(f, "marker file {path}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields, default)]
pub struct Timeouts {
    /// Delay between two readiness or sink probes
    #[garde(range(min = 1))]
    pub poll_interval_ms: u64,
    /// Upper bound on server startup
    #[garde(custom(min_dependent(&self.poll_interval_ms)))]
    pub startup_timeout_ms: u64,
    /// Upper bound on a client draining its statements and exiting
    #[garde(custom(min_dependent(&self.poll_interval_ms)))]
    pub client_timeout_ms: u64,
    /// Upper bound on the result sink reaching the expected line count
    #[garde(custom(min_dependent(&self.sink_quiet_ms)))]
    pub sink_timeout_ms: u64,
    /// How long the sink must stay unchanged before it is read
    #[garde(skip)]
    pub sink_quiet_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            startup_timeout_ms: 10_000,
            client_timeout_ms: 30_000,
            sink_timeout_ms: 5_000,
            sink_quiet_ms: 100,
        }
    }
}

impl Timeouts {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_millis(self.client_timeout_ms)
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_millis(self.sink_timeout_ms)
    }

    pub fn sink_quiet(&self) -> Duration {
        Duration::from_millis(self.sink_quiet_ms)
    }
}
