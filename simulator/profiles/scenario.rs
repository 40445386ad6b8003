use garde::Validate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The kinds of end-to-end checks a run can play against the engine.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    clap::ValueEnum,
    strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ScenarioKind {
    /// Create, populate, apply random updates, verify
    #[default]
    Update,
    /// As `update`, with deletes mixed in
    UpdateDelete,
    /// Create many tables, verify `SHOW TABLES` and every header
    Catalog,
    /// Create and populate only
    Populate,
}

impl ScenarioKind {
    pub fn allows_delete(&self) -> bool {
        matches!(self, ScenarioKind::UpdateDelete)
    }

    pub fn mutates(&self) -> bool {
        matches!(self, ScenarioKind::Update | ScenarioKind::UpdateDelete)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(deny_unknown_fields, default)]
pub struct ScenarioProfile {
    #[garde(skip)]
    pub kind: ScenarioKind,
    /// Extra `SELECT * ... WHERE pivot = v` rounds after the full-table check,
    /// each on its own client
    #[garde(skip)]
    pub conditional_selects: u32,
    /// Number of tables created by the catalog scenario
    #[garde(range(min = 1, max = 99999))]
    pub catalog_tables: u32,
}

impl Default for ScenarioProfile {
    fn default() -> Self {
        Self {
            kind: ScenarioKind::default(),
            conditional_selects: 0,
            catalog_tables: 100,
        }
    }
}
