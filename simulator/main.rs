use std::fs::OpenOptions;
use std::io::IsTerminal;

use anyhow::{anyhow, Context};
use clap::Parser;
use rand::Rng;
use rmdb_simulator::profiles::{Profile, Readiness};
use rmdb_simulator::runner::artifacts::{load_failure, write_failure, write_plan, FailureReport};
use rmdb_simulator::runner::cli::{SimulatorCLI, SimulatorCommand};
use rmdb_simulator::runner::env::SimulatorEnv;
use rmdb_simulator::runner::scenario::Scenario;
use tracing_subscriber::field::MakeExt;
use tracing_subscriber::fmt::format;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    let cli_opts = SimulatorCLI::parse();
    cli_opts.validate().map_err(|err| anyhow!(err))?;

    if let Some(SimulatorCommand::PrintSchema) = cli_opts.subcommand {
        let schema = schemars::schema_for!(Profile);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }
    init_logger()?;

    match cli_opts.subcommand.clone() {
        Some(SimulatorCommand::PrintSchema) => Ok(()),
        Some(SimulatorCommand::Replay { path }) => {
            let report = load_failure(&path)
                .with_context(|| format!("failed to load failure report {}", path.display()))?;
            tracing::info!(
                seed = report.seed,
                scenario = %report.scenario,
                error = %report.error,
                "replaying failed run"
            );
            let profile = cli_opts.apply_overrides(report.profile)?;
            // a replay that passes must not wipe the recorded failure
            let cli_opts = SimulatorCLI {
                keep: true,
                ..cli_opts.clone()
            };
            let result = testing_main(&cli_opts, &profile, report.seed);
            if result.is_ok() {
                println!("failure of seed {} did not reproduce", report.seed);
            }
            result
        }
        Some(SimulatorCommand::Loop {
            n,
            jobs,
            short_circuit,
        }) => {
            let profile = cli_opts.profile()?;
            let seed = cli_opts.seed.unwrap_or_else(|| rand::rng().random());
            if jobs > 1 && matches!(profile.engine.readiness, Readiness::Tcp { .. }) {
                tracing::warn!(
                    jobs,
                    "parallel scenarios probe readiness over one TCP address, \
                     the engines must not share it"
                );
            }
            run_loop(&cli_opts, &profile, seed, n, jobs, short_circuit)
        }
        None => {
            let profile = cli_opts.profile()?;
            let seed = cli_opts.seed.unwrap_or_else(|| rand::rng().random());
            testing_main(&cli_opts, &profile, seed)
        }
    }
}

/// Runs `n` scenarios with seeds `seed`, `seed + 1`, ..., `jobs` at a time.
fn run_loop(
    cli_opts: &SimulatorCLI,
    profile: &Profile,
    seed: u64,
    n: usize,
    jobs: usize,
    short_circuit: bool,
) -> anyhow::Result<()> {
    let mut failed = Vec::new();
    for start in (0..n).step_by(jobs) {
        let seeds = (start..(start + jobs).min(n))
            .map(|i| seed.wrapping_add(i as u64))
            .collect::<Vec<_>>();
        let results = std::thread::scope(|s| {
            let handles = seeds
                .iter()
                .map(|&seed| s.spawn(move || testing_main(cli_opts, profile, seed)))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(anyhow!("scenario thread panicked")))
                })
                .collect::<Vec<_>>()
        });

        for (seed, result) in seeds.iter().zip(results) {
            match result {
                Ok(()) => println!("iteration with seed {seed} succeeded"),
                Err(err) => {
                    println!("iteration with seed {seed} failed: {err}");
                    failed.push(*seed);
                }
            }
        }
        if short_circuit && !failed.is_empty() {
            println!("short circuiting after {} iterations", start + seeds.len());
            break;
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} of {n} iterations failed, seeds: {failed:?}",
            failed.len()
        ))
    }
}

fn testing_main(cli_opts: &SimulatorCLI, profile: &Profile, seed: u64) -> anyhow::Result<()> {
    let mut env = SimulatorEnv::new(seed, profile.clone(), &cli_opts.workdir);
    let mut scenario = Scenario::new(profile.scenario.kind);
    tracing::info!(seed, scenario = %scenario.kind(), "starting simulation");

    let result = scenario.run(&mut env);

    // Print the seed and the run directory at the end again for easily accessing them.
    println!("seed: {seed}");
    println!("path: {}", env.paths.base.display());

    match result {
        Ok(stats) => {
            println!("simulation succeeded: {stats}");
            if cli_opts.keep {
                write_plan(&env.paths, scenario.statements())?;
            } else {
                env.paths.delete_all_files();
            }
            Ok(())
        }
        Err(err) => {
            let report = FailureReport {
                seed,
                scenario: scenario.kind(),
                error: err.to_string(),
                timestamp: chrono::Utc::now(),
                stats: scenario.stats().clone(),
                profile: profile.clone(),
            };
            write_failure(&env.paths, &report, scenario.statements())?;
            Err(anyhow!("failed with error: '{err}'"))
        }
    }
}

fn init_logger() -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("simulator.log")?;

    let requires_ansi = std::io::stdout().is_terminal();

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(requires_ansi)
                .with_line_number(true)
                .without_time()
                .with_thread_ids(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            #[allow(deprecated)]
            tracing_subscriber::fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .fmt_fields(format::PrettyFields::new().with_ansi(false))
                .with_line_number(true)
                .without_time()
                .with_thread_ids(false)
                .map_fmt_fields(|f| f.debug_alt()),
        )
        .try_init();
    Ok(())
}
