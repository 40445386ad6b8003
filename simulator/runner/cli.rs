use std::path::PathBuf;

use clap::{command, Parser};

use crate::profiles::{CommandSpec, Profile, ScenarioKind};

#[derive(Parser, Debug, Clone)]
#[command(name = "rmdb-simulator")]
#[command(author, version, about, long_about = None)]
pub struct SimulatorCLI {
    #[clap(short, long, help = "set seed for reproducible runs", default_value = None)]
    pub seed: Option<u64>,
    #[clap(long, value_enum, help = "scenario to play, overriding the profile")]
    pub scenario: Option<ScenarioKind>,
    #[clap(short, long, help = "load the profile from a .toml or .json file")]
    pub profile: Option<PathBuf>,
    #[clap(
        long,
        help = "server command line, `{db}` is replaced by the database directory"
    )]
    pub server: Option<String>,
    #[clap(
        long,
        help = "client command line, `{db}` is replaced by the database directory"
    )]
    pub client: Option<String>,
    #[clap(
        short,
        long,
        help = "directory holding one sub-directory per seed",
        default_value = "simulator-runs"
    )]
    pub workdir: PathBuf,
    #[clap(short, long, help = "keep the run directory of passing runs")]
    pub keep: bool,
    #[clap(subcommand)]
    pub subcommand: Option<SimulatorCommand>,
}

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub enum SimulatorCommand {
    #[clap(about = "run the simulator in a loop")]
    Loop {
        #[clap(
            short = 'n',
            long,
            help = "number of iterations to run the simulator",
            default_value_t = 5
        )]
        n: usize,
        #[clap(
            short = 'j',
            long,
            help = "number of scenarios running at the same time, each with its own engine",
            default_value_t = 1
        )]
        jobs: usize,
        #[clap(
            short = 's',
            long,
            help = "short circuit the simulator, stop on the first failure",
            default_value_t = false
        )]
        short_circuit: bool,
    },
    #[clap(about = "replay a failed run from its failure.json")]
    Replay {
        #[clap(help = "failure.json, or the run directory holding it")]
        path: PathBuf,
    },
    #[clap(about = "print the JSON schema of the profile file")]
    PrintSchema,
}

impl SimulatorCLI {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(SimulatorCommand::Loop { n, jobs, .. }) = &self.subcommand {
            if *n < 1 {
                return Err("loop needs at least one iteration".to_string());
            }
            if *jobs < 1 {
                return Err("loop needs at least one job".to_string());
            }
        }
        if self.seed.is_some() && matches!(self.subcommand, Some(SimulatorCommand::Replay { .. })) {
            return Err("cannot set a seed when replaying a recorded failure".to_string());
        }
        for (flag, line) in [("--server", &self.server), ("--client", &self.client)] {
            if line.as_deref().is_some_and(|line| line.trim().is_empty()) {
                return Err(format!("{flag} must not be empty"));
            }
        }
        Ok(())
    }

    /// Loads the profile named on the command line, or the default one, and
    /// applies the command line overrides.
    pub fn profile(&self) -> anyhow::Result<Profile> {
        let profile = match &self.profile {
            Some(path) => Profile::load(path)?,
            None => Profile::default(),
        };
        self.apply_overrides(profile)
    }

    /// Applies the command line overrides to `profile` and validates the result.
    pub fn apply_overrides(&self, mut profile: Profile) -> anyhow::Result<Profile> {
        if let Some(kind) = self.scenario {
            profile.scenario.kind = kind;
        }
        if let Some(server) = self.server.as_deref().and_then(CommandSpec::parse) {
            profile.engine.server = server;
        }
        if let Some(client) = self.client.as_deref().and_then(CommandSpec::parse) {
            profile.engine.client = client;
        }
        Ok(profile.validated()?)
    }
}
