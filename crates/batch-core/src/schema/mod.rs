//! Setting schema: which keys exist, which file they belong to, what values
//! they accept and in which order they are written.
//!
//! The tables are plain data ([`tables`]); [`SchemaRegistry`] indexes them once
//! and is passed by reference to whatever needs to validate settings.

mod tables;

use crate::domain::{BatchError, BatchResult, Category};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

pub use tables::{CELL_DEFINITIONS, PARAM_DEFINITIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Boolean,
    Integer,
    Float,
    Choice,
    IntVector,
    FloatVector,
    Block,
}

impl ValueKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Choice => "string",
            Self::IntVector => "integer vector",
            Self::FloatVector => "float vector",
            Self::Block => "block",
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitFamily {
    Energy,
    Length,
    InverseLength,
    Time,
    Temperature,
    Force,
    Pressure,
    Mass,
}

impl UnitFamily {
    pub const fn units(self) -> &'static [&'static str] {
        match self {
            Self::Energy => &[
                "ev", "mev", "ha", "hartree", "ry", "j", "erg", "kcal/mol", "kj/mol",
            ],
            Self::Length => &["ang", "bohr", "a0", "nm", "cm", "m"],
            Self::InverseLength => &["1/ang", "1/bohr", "1/nm", "1/m"],
            Self::Time => &["fs", "ps", "ns", "aut", "s"],
            Self::Temperature => &["k"],
            Self::Force => &["ev/ang", "ha/bohr", "n"],
            Self::Pressure => &["gpa", "mpa", "pa", "atm", "bar", "ev/ang**3"],
            Self::Mass => &["amu", "me", "g", "kg"],
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Energy => "energy",
            Self::Length => "length",
            Self::InverseLength => "inverse length",
            Self::Time => "time",
            Self::Temperature => "temperature",
            Self::Force => "force",
            Self::Pressure => "pressure",
            Self::Mass => "mass",
        }
    }

    pub fn contains(self, unit: &str) -> bool {
        self.units()
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(unit))
    }
}

/// One row of the schema.
///
/// `minimum`/`maximum` are inclusive and only consulted for numeric and
/// vector kinds; `choices` only for [`ValueKind::Choice`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyDefinition {
    pub key: &'static str,
    pub category: Category,
    pub kind: ValueKind,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub choices: &'static [&'static str],
    pub unit: Option<UnitFamily>,
    pub priority: f64,
}

impl KeyDefinition {
    pub const fn new(
        key: &'static str,
        category: Category,
        kind: ValueKind,
        priority: f64,
    ) -> Self {
        Self {
            key,
            category,
            kind,
            minimum: None,
            maximum: None,
            choices: &[],
            unit: None,
            priority,
        }
    }

    pub const fn range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    pub const fn choices(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = choices;
        self
    }

    pub const fn unit(mut self, unit: UnitFamily) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn accepts_unit(&self, unit: &str) -> bool {
        self.unit.is_some_and(|family| family.contains(unit))
    }
}

#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    definitions: BTreeMap<&'static str, KeyDefinition>,
}

impl SchemaRegistry {
    /// Registry over the built-in cell and param tables.
    pub fn builtin() -> BatchResult<Self> {
        Self::from_tables(CELL_DEFINITIONS, PARAM_DEFINITIONS)
    }

    pub fn from_tables(cell: &[KeyDefinition], param: &[KeyDefinition]) -> BatchResult<Self> {
        let mut definitions = BTreeMap::new();
        let tables = [(Category::Cell, cell), (Category::Param, param)];

        for (category, table) in tables {
            for definition in table {
                if definition.category != category {
                    return Err(BatchError::schema(
                        "SCHEMA.CATEGORY_MISMATCH",
                        format!(
                            "key '{}' is declared as {} inside the {} table",
                            definition.key, definition.category, category
                        ),
                    ));
                }
                if let Some(existing) = definitions.insert(definition.key, *definition) {
                    return Err(BatchError::schema(
                        "SCHEMA.AMBIGUOUS_KEY",
                        format!(
                            "key '{}' is registered in both {} and {}",
                            definition.key, existing.category, definition.category
                        ),
                    ));
                }
            }
        }

        Ok(Self { definitions })
    }

    pub fn lookup(&self, key: &str) -> BatchResult<&KeyDefinition> {
        let normalized = key.trim().to_ascii_lowercase();
        self.definitions.get(normalized.as_str()).ok_or_else(|| {
            BatchError::schema(
                "SCHEMA.UNKNOWN_KEY",
                format!("unknown setting key '{}'", key.trim()),
            )
        })
    }

    pub fn lookup_or<'a>(&'a self, key: &str, fallback: &'a KeyDefinition) -> &'a KeyDefinition {
        self.lookup(key).unwrap_or(fallback)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_ok()
    }

    pub fn keys(&self, category: Category) -> impl Iterator<Item = &'static str> + '_ {
        self.definitions
            .values()
            .filter(move |definition| definition.category == category)
            .map(|definition| definition.key)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyDefinition, SchemaRegistry, UnitFamily, ValueKind};
    use crate::domain::{BatchErrorCategory, Category};

    #[test]
    fn builtin_tables_assign_every_key_to_one_category() {
        let registry = SchemaRegistry::builtin().expect("builtin schema should be consistent");
        let cell_keys: Vec<_> = registry.keys(Category::Cell).collect();
        let param_keys: Vec<_> = registry.keys(Category::Param).collect();

        assert!(!cell_keys.is_empty());
        assert!(!param_keys.is_empty());
        assert!(cell_keys.iter().all(|key| !param_keys.contains(key)));
        assert_eq!(registry.len(), cell_keys.len() + param_keys.len());
    }

    #[test]
    fn lookup_is_case_insensitive_and_strict() {
        let registry = SchemaRegistry::builtin().expect("builtin schema");
        let definition = registry
            .lookup("CUT_OFF_ENERGY")
            .expect("cut_off_energy should be registered");
        assert_eq!(definition.category, Category::Param);
        assert_eq!(definition.kind, ValueKind::Float);
        assert_eq!(definition.unit, Some(UnitFamily::Energy));

        let error = registry
            .lookup("not_a_key")
            .expect_err("unknown key should fail");
        assert_eq!(error.category(), BatchErrorCategory::Schema);
        assert_eq!(error.placeholder(), "SCHEMA.UNKNOWN_KEY");
    }

    #[test]
    fn permissive_lookup_returns_fallback() {
        let registry = SchemaRegistry::builtin().expect("builtin schema");
        let fallback = KeyDefinition::new("unknown", Category::Param, ValueKind::Block, 99.0);
        assert_eq!(registry.lookup_or("mystery", &fallback).priority, 99.0);
        assert_eq!(registry.lookup_or("task", &fallback).key, "task");
    }

    #[test]
    fn free_form_block_exists_only_for_param() {
        let registry = SchemaRegistry::builtin().expect("builtin schema");
        let devel = registry.lookup("devel_code").expect("devel_code registered");
        assert_eq!(devel.category, Category::Param);
        assert_eq!(devel.kind, ValueKind::Block);
        assert!(registry.keys(Category::Cell).all(|key| key != "devel_code"));
    }

    #[test]
    fn key_in_both_tables_is_rejected() {
        let cell = [KeyDefinition::new("shared", Category::Cell, ValueKind::Boolean, 1.0)];
        let param = [KeyDefinition::new("shared", Category::Param, ValueKind::Boolean, 1.0)];

        let error = SchemaRegistry::from_tables(&cell, &param).expect_err("ambiguous key");
        assert_eq!(error.placeholder(), "SCHEMA.AMBIGUOUS_KEY");
    }

    #[test]
    fn definition_in_wrong_table_is_rejected() {
        let cell = [KeyDefinition::new("task", Category::Param, ValueKind::Choice, 1.0)];

        let error = SchemaRegistry::from_tables(&cell, &[]).expect_err("misfiled key");
        assert_eq!(error.placeholder(), "SCHEMA.CATEGORY_MISMATCH");
    }

    #[test]
    fn unit_families_match_case_insensitively() {
        assert!(UnitFamily::Energy.contains("eV"));
        assert!(UnitFamily::InverseLength.contains("1/ANG"));
        assert!(!UnitFamily::Length.contains("ev"));
    }
}
