use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::profiles::Profile;

/// Files belonging to one run, all under `<workdir>/<seed>/`.
#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
    /// Database directory handed to the engine
    pub db: PathBuf,
    /// Every statement issued, one per line
    pub plan: PathBuf,
    /// Seed, scenario, error and statistics of a failed run
    pub failure: PathBuf,
}

impl Paths {
    pub fn new(workdir: &Path, seed: u64) -> Self {
        let base = workdir.join(seed.to_string());
        Paths {
            db: base.join("db"),
            plan: base.join("plan.sql"),
            failure: Self::failure_in(&base),
            base,
        }
    }

    pub fn failure_in(base: &Path) -> PathBuf {
        base.join("failure.json")
    }

    pub fn delete_all_files(&self) {
        if self.base.exists() {
            if let Err(err) = std::fs::remove_dir_all(&self.base) {
                tracing::warn!(path = %self.base.display(), %err, "failed to remove run directory");
            }
        }
    }
}

pub struct SimulatorEnv {
    pub seed: u64,
    pub profile: Profile,
    pub paths: Paths,
    pub rng: ChaCha8Rng,
}

impl SimulatorEnv {
    pub fn new(seed: u64, profile: Profile, workdir: &Path) -> Self {
        SimulatorEnv {
            seed,
            profile,
            paths: Paths::new(workdir, seed),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

