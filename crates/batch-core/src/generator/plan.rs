use super::{DimensionSpec, GenerationRequest, NameDimension};
use crate::config::SettingSource;
use crate::domain::{BatchError, BatchResult};
use crate::schema::SchemaRegistry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One variable dimension as written in a plan file: a variable alias or a
/// list of alternative groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableSource {
    Alias(String),
    Variants(Vec<Vec<SettingSource>>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameSource {
    Alias(String),
    Names(Vec<String>),
}

/// A generation request in JSON form.
///
/// ```json
/// {
///   "root": "scan",
///   "variables": ["xc", [["kpoints_mp_grid : 2 2 2"], ["kpoints_mp_grid : 4 4 4"]]],
///   "names": ["xc", ["k2", "k4"]],
///   "globals": ["@spin", "iprint : 1"],
///   "fillDefaults": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPlan {
    #[serde(default)]
    pub root: Option<PathBuf>,
    pub variables: Vec<VariableSource>,
    #[serde(default)]
    pub names: Option<Vec<NameSource>>,
    #[serde(default)]
    pub globals: Vec<SettingSource>,
    #[serde(default = "default_fill_defaults")]
    pub fill_defaults: bool,
}

fn default_fill_defaults() -> bool {
    true
}

impl GenerationPlan {
    pub fn from_json(source: &str) -> BatchResult<Self> {
        serde_json::from_str(source).map_err(|source| {
            BatchError::validation(
                "VALIDATION.PLAN_PARSE",
                format!("failed to parse generation plan: {}", source),
            )
        })
    }

    pub fn load(path: &Path) -> BatchResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            BatchError::filesystem(
                "IO.PLAN_READ",
                format!("failed to read plan '{}': {}", path.display(), source),
            )
        })?;
        Self::from_json(&content).map_err(|error| error.context(path.display()))
    }

    pub fn to_request(&self, registry: &SchemaRegistry) -> BatchResult<GenerationRequest> {
        let variables = self
            .variables
            .iter()
            .map(|source| match source {
                VariableSource::Alias(alias) => Ok(DimensionSpec::Alias(alias.clone())),
                VariableSource::Variants(groups) => groups
                    .iter()
                    .map(|group| {
                        group
                            .iter()
                            .map(|source| source.to_token(registry))
                            .collect::<BatchResult<Vec<_>>>()
                    })
                    .collect::<BatchResult<Vec<_>>>()
                    .map(DimensionSpec::Variants),
            })
            .collect::<BatchResult<Vec<_>>>()?;

        let names = self.names.as_ref().map(|names| {
            names
                .iter()
                .map(|source| match source {
                    NameSource::Alias(alias) => NameDimension::Alias(alias.clone()),
                    NameSource::Names(names) => NameDimension::Names(names.clone()),
                })
                .collect()
        });

        let globals = self
            .globals
            .iter()
            .map(|source| source.to_token(registry))
            .collect::<BatchResult<Vec<_>>>()?;

        Ok(GenerationRequest {
            variables,
            names,
            globals,
            fill_defaults: self.fill_defaults,
            root: self.root.clone(),
        })
    }
}
