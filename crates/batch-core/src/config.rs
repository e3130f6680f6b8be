//! Tool configuration, read from an optional JSON file.
//!
//! Every field has a default, so an empty object (or no file at all) gives
//! the conventional CASTEP file names.

use crate::domain::{BatchError, BatchResult};
use crate::schema::SchemaRegistry;
use crate::serialization::parse_keyword_line;
use crate::setting::Setting;
use crate::shortcuts::{SettingToken, Shortcut, ShortcutTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileLayout {
    pub cell_extension: String,
    pub param_extension: String,
    pub output_extension: String,
    pub error_extension: String,
    pub submission_extension: String,
    pub index_width: usize,
}

impl Default for FileLayout {
    fn default() -> Self {
        Self {
            cell_extension: "cell".to_owned(),
            param_extension: "param".to_owned(),
            output_extension: "castep".to_owned(),
            error_extension: "err".to_owned(),
            submission_extension: "sub".to_owned(),
            index_width: 3,
        }
    }
}

impl FileLayout {
    pub fn file_name(&self, stem: &str, extension: &str) -> String {
        format!("{}.{}", stem, extension)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub command: String,
    pub queue_file: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: "castep.serial".to_owned(),
            queue_file: PathBuf::from("queue.txt"),
        }
    }
}

/// A setting written in a plan or configuration file: either one keyword
/// line in the input-file grammar or a block with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingSource {
    Line(String),
    Block { block: String, lines: Vec<String> },
}

impl SettingSource {
    pub fn to_setting(&self, registry: &SchemaRegistry) -> BatchResult<Setting> {
        match self {
            Self::Line(line) => parse_keyword_line(line, registry),
            Self::Block { block, lines } => Setting::block(registry, block, lines.iter().cloned()),
        }
    }

    /// Strings starting with `@` name an alias; everything else is a setting.
    pub fn to_token(&self, registry: &SchemaRegistry) -> BatchResult<SettingToken> {
        if let Self::Line(line) = self
            && let Some(alias) = line.trim().strip_prefix('@')
        {
            return Ok(SettingToken::Alias(alias.trim().to_owned()));
        }
        self.to_setting(registry).map(SettingToken::Setting)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutConfig {
    pub fixed: BTreeMap<String, Vec<SettingSource>>,
    pub variable: BTreeMap<String, Vec<Vec<SettingSource>>>,
    pub names: BTreeMap<String, Vec<String>>,
}

impl ShortcutConfig {
    pub fn to_table(&self, registry: &SchemaRegistry) -> BatchResult<ShortcutTable> {
        let mut table = ShortcutTable::new();

        for (alias, sources) in &self.fixed {
            let settings = sources
                .iter()
                .map(|source| source.to_setting(registry))
                .collect::<BatchResult<Vec<_>>>()
                .map_err(|error| error.context(format!("shortcut '{}'", alias)))?;
            table.insert(alias, Shortcut::Sequence(settings));
        }

        for (alias, groups) in &self.variable {
            let alternatives = groups
                .iter()
                .map(|group| {
                    group
                        .iter()
                        .map(|source| source.to_token(registry))
                        .collect::<BatchResult<Vec<_>>>()
                })
                .collect::<BatchResult<Vec<_>>>()
                .map_err(|error| error.context(format!("shortcut '{}'", alias)))?;
            table.insert(alias, Shortcut::Alternatives(alternatives));
        }

        for (alias, names) in &self.names {
            table.insert_names(alias, names.iter().cloned());
        }

        Ok(table)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub layout: FileLayout,
    pub engine: EngineConfig,
    pub shortcuts: ShortcutConfig,
}

impl BatchConfig {
    pub fn from_json(source: &str) -> BatchResult<Self> {
        serde_json::from_str(source).map_err(|source| {
            BatchError::validation(
                "VALIDATION.CONFIG_PARSE",
                format!("failed to parse configuration: {}", source),
            )
        })
    }

    pub fn load(path: &Path) -> BatchResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            BatchError::filesystem(
                "IO.CONFIG_READ",
                format!("failed to read configuration '{}': {}", path.display(), source),
            )
        })?;
        Self::from_json(&content).map_err(|error| error.context(path.display()))
    }

    /// Built-in shortcuts with the configured ones layered on top.
    pub fn shortcut_table(&self, registry: &SchemaRegistry) -> BatchResult<ShortcutTable> {
        let mut table = ShortcutTable::builtin(registry)?;
        table.merge(self.shortcuts.to_table(registry)?);
        Ok(table)
    }
}
