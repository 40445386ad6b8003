use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use garde::Validate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sql_generation::generation::{GenerationContext, Opts};

pub use engine::{CommandSpec, EngineProfile, Readiness, Timeouts};
pub use scenario::{ScenarioKind, ScenarioProfile};

mod engine;
mod scenario;

/// Everything a run needs besides its seed: how statements are generated,
/// which scenario is played and how the engine is driven.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields, default)]
pub struct Profile {
    #[garde(dive)]
    pub generation: Opts,
    #[garde(dive)]
    pub scenario: ScenarioProfile,
    #[garde(dive)]
    pub engine: EngineProfile,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("failed to read profile {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML profile: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to parse JSON profile: {0}")]
    Json(#[from] serde_json::Error),
    #[error("profile {0} must have a .toml or .json extension")]
    UnsupportedExtension(PathBuf),
    #[error("invalid profile:\n{0}")]
    Invalid(garde::Report),
}

impl Profile {
    /// Loads a profile, picking the format from the file extension.
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let profile: Profile = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => return Err(ProfileError::UnsupportedExtension(path.to_path_buf())),
        };
        tracing::debug!(path = %path.display(), "loaded profile");
        Ok(profile)
    }

    pub fn validated(self) -> Result<Self, ProfileError> {
        self.validate().map_err(ProfileError::Invalid)?;
        Ok(self)
    }
}

impl GenerationContext for Profile {
    fn opts(&self) -> &Opts {
        &self.generation
    }
}

/// Minimum value of field is dependent on another field in the struct
fn min_dependent<T: PartialOrd + Display>(min: &T) -> impl FnOnce(&T, &()) -> garde::Result + '_ {
    move |value, _| {
        if value < min {
            return Err(garde::Error::new(format!(
                "`{value}` is smaller than `{min}`"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_profile(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn default_profile_is_valid() {
        Profile::default().validated().unwrap();
    }

    #[test]
    fn toml_profile_overrides_defaults() {
        let file = write_profile(
            ".toml",
            r#"
[generation.mutation]
count = 7

[scenario]
kind = "update-delete"
conditional_selects = 3

[engine.server]
program = "./rmdb"
args = ["{db}"]

[engine.readiness]
probe = "marker_file"
path = ".ready"
"#,
        );
        let profile = Profile::load(file.path()).unwrap().validated().unwrap();
        assert_eq!(profile.generation.mutation.count, 7);
        assert_eq!(profile.generation.mutation.pivot_attempts, 32);
        assert_eq!(profile.scenario.kind, ScenarioKind::UpdateDelete);
        assert_eq!(profile.scenario.conditional_selects, 3);
        assert_eq!(
            profile.engine.readiness,
            Readiness::MarkerFile {
                path: ".ready".to_string()
            }
        );
    }

    #[test]
    fn json_profile_is_accepted() {
        let file = write_profile(".json", r#"{ "scenario": { "kind": "catalog" } }"#);
        let profile = Profile::load(file.path()).unwrap();
        assert_eq!(profile.scenario.kind, ScenarioKind::Catalog);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let file = write_profile(".toml", "[scenario]\nrounds = 3\n");
        assert!(matches!(
            Profile::load(file.path()),
            Err(ProfileError::Toml(_))
        ));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let file = write_profile(".yaml", "scenario: {}\n");
        assert!(matches!(
            Profile::load(file.path()),
            Err(ProfileError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn invalid_timeouts_are_reported() {
        let mut profile = Profile::default();
        profile.engine.timeouts.startup_timeout_ms = 1;
        profile.engine.timeouts.poll_interval_ms = 100;
        assert!(matches!(profile.validated(), Err(ProfileError::Invalid(_))));
    }
}
