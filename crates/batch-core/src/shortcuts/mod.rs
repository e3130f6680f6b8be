//! Named aliases for settings.
//!
//! A fixed alias expands to one setting or a fixed sequence of settings. A
//! variable alias expands to several mutually exclusive groups, one per
//! variant of a generator dimension. Directory-name aliases give the path
//! fragments that go with a variable alias.

mod builtin;

use crate::domain::{BatchError, BatchResult};
use crate::setting::Setting;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Alias holding the settings the generator falls back to.
pub const DEFAULTS_ALIAS: &str = "defaults";

#[derive(Debug, Clone, PartialEq)]
pub enum SettingToken {
    Setting(Setting),
    Alias(String),
}

impl From<Setting> for SettingToken {
    fn from(setting: Setting) -> Self {
        Self::Setting(setting)
    }
}

impl From<&str> for SettingToken {
    fn from(alias: &str) -> Self {
        Self::Alias(alias.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shortcut {
    Single(Setting),
    Sequence(Vec<Setting>),
    Alternatives(Vec<Vec<SettingToken>>),
}

impl Shortcut {
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Alternatives(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShortcutTable {
    shortcuts: BTreeMap<String, Shortcut>,
    names: BTreeMap<String, Vec<String>>,
}

impl ShortcutTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: &str, shortcut: Shortcut) -> Option<Shortcut> {
        self.shortcuts.insert(normalize_alias(alias), shortcut)
    }

    pub fn insert_names<I, S>(&mut self, alias: &str, names: I) -> Option<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.insert(
            normalize_alias(alias),
            names.into_iter().map(Into::into).collect(),
        )
    }

    /// Entries of `other` replace entries with the same alias.
    pub fn merge(&mut self, other: ShortcutTable) {
        self.shortcuts.extend(other.shortcuts);
        self.names.extend(other.names);
    }

    pub fn get(&self, alias: &str) -> Option<&Shortcut> {
        self.shortcuts.get(&normalize_alias(alias))
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.shortcuts.keys().map(String::as_str)
    }

    /// Expands literal settings and fixed aliases, in order.
    ///
    /// Every alias must be known, non-empty and requested at most once.
    pub fn resolve_fixed(&self, tokens: &[SettingToken]) -> BatchResult<Vec<Setting>> {
        let mut requested = BTreeSet::new();
        let mut settings = Vec::new();

        for token in tokens {
            let alias = match token {
                SettingToken::Setting(setting) => {
                    settings.push(setting.clone());
                    continue;
                }
                SettingToken::Alias(alias) => alias,
            };

            let normalized = normalize_alias(alias);
            if !requested.insert(normalized.clone()) {
                return Err(BatchError::validation(
                    "VALIDATION.DUPLICATE_ALIAS",
                    format!("alias '{}' is requested more than once", alias),
                ));
            }

            match self.lookup(&normalized)? {
                Shortcut::Single(setting) => settings.push(setting.clone()),
                Shortcut::Sequence(sequence) if sequence.is_empty() => {
                    return Err(BatchError::validation(
                        "VALIDATION.EMPTY_ALIAS",
                        format!("alias '{}' expands to no settings", alias),
                    ));
                }
                Shortcut::Sequence(sequence) => settings.extend(sequence.iter().cloned()),
                Shortcut::Alternatives(_) => {
                    return Err(BatchError::validation(
                        "VALIDATION.VARIABLE_ALIAS",
                        format!(
                            "alias '{}' has alternatives and cannot be used as a fixed expansion",
                            alias
                        ),
                    ));
                }
            }
        }

        Ok(settings)
    }

    /// Expands a variable alias into its alternative setting groups.
    pub fn resolve_variable(&self, alias: &str) -> BatchResult<Vec<Vec<Setting>>> {
        let Shortcut::Alternatives(alternatives) = self.lookup(alias)? else {
            return Err(BatchError::validation(
                "VALIDATION.FIXED_ALIAS",
                format!("alias '{}' has no alternatives to vary over", alias),
            ));
        };

        let groups = self.resolve_groups(alternatives)?;
        debug!(alias, variants = groups.len(), "resolved variable alias");
        Ok(groups)
    }

    /// Normalizes explicit alternatives, each a list of tokens, into setting
    /// groups.
    pub fn resolve_groups(&self, alternatives: &[Vec<SettingToken>]) -> BatchResult<Vec<Vec<Setting>>> {
        alternatives
            .iter()
            .map(|group| self.resolve_fixed(group))
            .collect()
    }

    pub fn resolve_names(&self, alias: &str) -> BatchResult<Vec<String>> {
        self.names
            .get(&normalize_alias(alias))
            .cloned()
            .ok_or_else(|| {
                BatchError::schema(
                    "SCHEMA.UNKNOWN_NAME_ALIAS",
                    format!("no directory names are registered for alias '{}'", alias),
                )
            })
    }

    fn lookup(&self, alias: &str) -> BatchResult<&Shortcut> {
        self.get(alias).ok_or_else(|| {
            BatchError::schema(
                "SCHEMA.UNKNOWN_ALIAS",
                format!("unknown shortcut alias '{}'", alias),
            )
        })
    }
}

fn normalize_alias(alias: &str) -> String {
    alias.trim().to_ascii_lowercase()
}
