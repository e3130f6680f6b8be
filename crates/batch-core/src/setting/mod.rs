mod value;

pub use value::SettingValue;

use crate::domain::{BatchError, BatchResult, Category};
use crate::schema::{KeyDefinition, SchemaRegistry, ValueKind};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingPayload {
    Keyword {
        value: SettingValue,
        unit: Option<String>,
    },
    Block {
        lines: Vec<String>,
    },
}

/// A validated key/value pair bound for one of the two input files.
///
/// Settings can only be obtained through [`Setting::keyword`] and
/// [`Setting::block`], which check the value against the schema; there is no
/// way to mutate one afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    key: String,
    category: Category,
    priority: f64,
    payload: SettingPayload,
}

impl Setting {
    pub fn keyword(
        registry: &SchemaRegistry,
        key: &str,
        value: impl Into<SettingValue>,
        unit: Option<&str>,
    ) -> BatchResult<Self> {
        let definition = registry.lookup(key)?;
        if definition.kind == ValueKind::Block {
            return Err(BatchError::validation(
                "VALIDATION.BLOCK_EXPECTED",
                format!("key '{}' is a block and cannot take a scalar value", definition.key),
            ));
        }

        let value = coerce_value(definition, value.into())?;
        let unit = unit.map(|unit| validate_unit(definition, unit)).transpose()?;

        Ok(Self {
            key: definition.key.to_owned(),
            category: definition.category,
            priority: definition.priority,
            payload: SettingPayload::Keyword { value, unit },
        })
    }

    /// Shorthand for a boolean keyword set to `true`.
    pub fn flag(registry: &SchemaRegistry, key: &str) -> BatchResult<Self> {
        Self::keyword(registry, key, true, None)
    }

    pub fn block<I, S>(registry: &SchemaRegistry, key: &str, lines: I) -> BatchResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let definition = registry.lookup(key)?;
        if definition.kind != ValueKind::Block {
            return Err(BatchError::validation(
                "VALIDATION.SCALAR_EXPECTED",
                format!(
                    "key '{}' expects a {} value, not a block",
                    definition.key, definition.kind
                ),
            ));
        }

        Ok(Self {
            key: definition.key.to_owned(),
            category: definition.category,
            priority: definition.priority,
            payload: SettingPayload::Block {
                lines: lines.into_iter().map(Into::into).collect(),
            },
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub const fn category(&self) -> Category {
        self.category
    }

    pub const fn priority(&self) -> f64 {
        self.priority
    }

    /// Integer part of the priority, used to group lines in the param file.
    pub fn priority_bucket(&self) -> i64 {
        self.priority.floor() as i64
    }

    pub const fn payload(&self) -> &SettingPayload {
        &self.payload
    }

    pub fn value(&self) -> Option<&SettingValue> {
        match &self.payload {
            SettingPayload::Keyword { value, .. } => Some(value),
            SettingPayload::Block { .. } => None,
        }
    }

    pub fn unit(&self) -> Option<&str> {
        match &self.payload {
            SettingPayload::Keyword { unit, .. } => unit.as_deref(),
            SettingPayload::Block { .. } => None,
        }
    }

    pub fn block_lines(&self) -> Option<&[String]> {
        match &self.payload {
            SettingPayload::Keyword { .. } => None,
            SettingPayload::Block { lines } => Some(lines),
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self.payload, SettingPayload::Block { .. })
    }

    /// File order: category, then priority, then key.
    pub fn file_order(&self, other: &Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then(self.priority.total_cmp(&other.priority))
            .then_with(|| self.key.cmp(&other.key))
    }

    /// The value as a single string: fixed-format scalars, block lines joined
    /// by `; `.
    pub fn value_string(&self) -> String {
        match &self.payload {
            SettingPayload::Keyword { value, .. } => value.to_string(),
            SettingPayload::Block { lines } => lines.join("; "),
        }
    }

    /// Lines as they appear in an input file, keyword keys padded to
    /// `key_width`. Values are written losslessly, unlike [`Self::value_string`].
    pub fn render_lines(&self, key_width: usize) -> Vec<String> {
        match &self.payload {
            SettingPayload::Keyword { value, unit } => {
                let mut line = format!(
                    "{:<width$} : {}",
                    self.key,
                    value.file_token(),
                    width = key_width
                );
                if let Some(unit) = unit {
                    line.push(' ');
                    line.push_str(unit);
                }
                vec![line.trim_end().to_owned()]
            }
            SettingPayload::Block { lines } => {
                let mut rendered = Vec::with_capacity(lines.len() + 2);
                rendered.push(format!("%block {}", self.key));
                rendered.extend(lines.iter().cloned());
                rendered.push(format!("%endblock {}", self.key));
                rendered
            }
        }
    }
}

impl Display for Setting {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.key, self.value_string().trim_end())?;
        if let Some(unit) = self.unit() {
            write!(f, " {}", unit)?;
        }
        Ok(())
    }
}

fn coerce_value(definition: &KeyDefinition, value: SettingValue) -> BatchResult<SettingValue> {
    let coerced = match (definition.kind, value) {
        (ValueKind::Boolean, value @ SettingValue::Bool(_)) => value,
        (ValueKind::Boolean, other) => {
            return Err(BatchError::validation(
                "VALIDATION.BOOLEAN_LITERAL",
                format!(
                    "key '{}' expects literal true or false, got {} '{}'",
                    definition.key,
                    other.type_name(),
                    other.to_string().trim_end()
                ),
            ));
        }
        (ValueKind::Integer, value @ SettingValue::Int(_)) => value,
        (ValueKind::Float, SettingValue::Int(value)) => SettingValue::Float(value as f64),
        (ValueKind::Float, value @ SettingValue::Float(_)) => value,
        (ValueKind::IntVector, value @ SettingValue::IntVector(_)) => value,
        (ValueKind::FloatVector, SettingValue::IntVector(values)) => {
            SettingValue::FloatVector(values.map(|value| value as f64))
        }
        (ValueKind::FloatVector, value @ SettingValue::FloatVector(_)) => value,
        (ValueKind::Choice, SettingValue::Text(text)) => {
            let normalized = text.trim().to_ascii_lowercase();
            if !definition.choices.contains(&normalized.as_str()) {
                return Err(BatchError::validation(
                    "VALIDATION.DISALLOWED_VALUE",
                    format!(
                        "key '{}' does not allow '{}'; expected one of {}",
                        definition.key,
                        text.trim(),
                        definition.choices.join(", ")
                    ),
                ));
            }
            SettingValue::Text(normalized)
        }
        (kind, other) => {
            return Err(BatchError::validation(
                "VALIDATION.TYPE_MISMATCH",
                format!(
                    "key '{}' expects a {} value, got {}",
                    definition.key,
                    kind,
                    other.type_name()
                ),
            ));
        }
    };

    check_range(definition, &coerced)?;
    Ok(coerced)
}

fn check_range(definition: &KeyDefinition, value: &SettingValue) -> BatchResult<()> {
    for component in value.numeric_components() {
        if !component.is_finite() {
            return Err(BatchError::validation(
                "VALIDATION.NOT_FINITE",
                format!("key '{}' value {} is not finite", definition.key, component),
            ));
        }
        if let Some(minimum) = definition.minimum
            && component < minimum
        {
            return Err(BatchError::validation(
                "VALIDATION.OUT_OF_RANGE",
                format!(
                    "key '{}' value {} is below minimum {}",
                    definition.key, component, minimum
                ),
            ));
        }
        if let Some(maximum) = definition.maximum
            && component > maximum
        {
            return Err(BatchError::validation(
                "VALIDATION.OUT_OF_RANGE",
                format!(
                    "key '{}' value {} is above maximum {}",
                    definition.key, component, maximum
                ),
            ));
        }
    }
    Ok(())
}

fn validate_unit(definition: &KeyDefinition, unit: &str) -> BatchResult<String> {
    let Some(family) = definition.unit else {
        return Err(BatchError::validation(
            "VALIDATION.UNIT_NOT_ALLOWED",
            format!("key '{}' does not take a unit, got '{}'", definition.key, unit),
        ));
    };

    if !definition.accepts_unit(unit) {
        return Err(BatchError::validation(
            "VALIDATION.BAD_UNIT",
            format!(
                "unit '{}' is not a {} unit accepted by key '{}'",
                unit,
                family.as_str(),
                definition.key
            ),
        ));
    }

    Ok(unit.trim().to_ascii_lowercase())
}
