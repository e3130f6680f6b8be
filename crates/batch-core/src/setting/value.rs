use crate::domain::{BatchError, BatchResult};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub(crate) const INTEGER_WIDTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    IntVector([i64; 3]),
    FloatVector([f64; 3]),
}

impl SettingValue {
    /// Guesses the type of a single scalar token the way the input files are
    /// written: literal booleans, then integers, then finite floats, else text.
    pub fn detect(token: &str) -> Self {
        let trimmed = token.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return Self::Int(value);
        }
        match parse_finite_float(trimmed) {
            Some(value) => Self::Float(value),
            None => Self::Text(trimmed.to_owned()),
        }
    }

    pub fn detect_vector(tokens: [&str; 3]) -> BatchResult<Self> {
        if let [Ok(x), Ok(y), Ok(z)] = tokens.map(|token| token.trim().parse::<i64>()) {
            return Ok(Self::IntVector([x, y, z]));
        }
        if let [Some(x), Some(y), Some(z)] = tokens.map(parse_finite_float) {
            return Ok(Self::FloatVector([x, y, z]));
        }
        Err(BatchError::validation(
            "VALIDATION.MALFORMED_VECTOR",
            format!(
                "vector components '{} {} {}' are not all numeric",
                tokens[0], tokens[1], tokens[2]
            ),
        ))
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
            Self::IntVector(_) => "integer vector",
            Self::FloatVector(_) => "float vector",
        }
    }

    /// Numeric components used for range checks; empty for non-numeric values.
    pub(crate) fn numeric_components(&self) -> Vec<f64> {
        match self {
            Self::Int(value) => vec![*value as f64],
            Self::Float(value) => vec![*value],
            Self::IntVector(values) => values.iter().map(|value| *value as f64).collect(),
            Self::FloatVector(values) => values.to_vec(),
            Self::Bool(_) | Self::Text(_) => Vec::new(),
        }
    }

    /// Input-file form. Floats use the shortest text that parses back to the
    /// same `f64`, switching to exponent notation below `1e-4`.
    pub fn file_token(&self) -> String {
        match self {
            Self::Int(value) => value.to_string(),
            Self::Float(value) => format!("{:?}", value),
            Self::FloatVector([x, y, z]) => format!("{:?} {:?} {:?}", x, y, z),
            Self::Bool(_) | Self::Text(_) | Self::IntVector(_) => self.to_string(),
        }
    }
}

impl Display for SettingValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{}", value),
            Self::Int(value) => write!(f, "{:<width$}", value, width = INTEGER_WIDTH),
            Self::Float(value) => write!(f, "{:.4}", value),
            Self::Text(value) => f.write_str(value),
            Self::IntVector([x, y, z]) => write!(f, "{} {} {}", x, y, z),
            Self::FloatVector([x, y, z]) => write!(f, "{:.4} {:.4} {:.4}", x, y, z),
        }
    }
}

fn parse_finite_float(token: &str) -> Option<f64> {
    token
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<[i64; 3]> for SettingValue {
    fn from(value: [i64; 3]) -> Self {
        Self::IntVector(value)
    }
}

impl From<[f64; 3]> for SettingValue {
    fn from(value: [f64; 3]) -> Self {
        Self::FloatVector(value)
    }
}

#[cfg(test)]
mod tests {
    use super::SettingValue;

    #[test]
    fn scalar_tokens_are_detected_by_content() {
        assert_eq!(SettingValue::detect("TRUE"), SettingValue::Bool(true));
        assert_eq!(SettingValue::detect("false"), SettingValue::Bool(false));
        assert_eq!(SettingValue::detect("42"), SettingValue::Int(42));
        assert_eq!(SettingValue::detect("-1.5e-3"), SettingValue::Float(-1.5e-3));
        assert_eq!(SettingValue::detect("PBE"), SettingValue::Text("PBE".into()));
        assert_eq!(SettingValue::detect("nan"), SettingValue::Text("nan".into()));
    }

    #[test]
    fn vectors_prefer_integers_and_reject_text() {
        assert_eq!(
            SettingValue::detect_vector(["4", "4", "2"]).expect("int vector"),
            SettingValue::IntVector([4, 4, 2])
        );
        assert_eq!(
            SettingValue::detect_vector(["0.25", "0", "0"]).expect("float vector"),
            SettingValue::FloatVector([0.25, 0.0, 0.0])
        );
        let error = SettingValue::detect_vector(["1", "two", "3"]).expect_err("malformed");
        assert_eq!(error.placeholder(), "VALIDATION.MALFORMED_VECTOR");
    }

    #[test]
    fn rendering_uses_fixed_formats() {
        assert_eq!(SettingValue::Float(500.0).to_string(), "500.0000");
        assert_eq!(SettingValue::Int(12).to_string(), "12      ");
        assert_eq!(SettingValue::IntVector([4, 4, 2]).to_string(), "4 4 2");
        assert_eq!(
            SettingValue::FloatVector([0.5, 0.0, 0.25]).to_string(),
            "0.5000 0.0000 0.2500"
        );
    }

    #[test]
    fn file_tokens_keep_full_precision() {
        assert_eq!(SettingValue::Float(500.0).file_token(), "500.0");
        assert_eq!(SettingValue::Float(1.0e-4).file_token(), "0.0001");
        assert_eq!(SettingValue::Float(1.0e-6).file_token(), "1e-6");
        assert_eq!(SettingValue::Int(12).file_token(), "12");
        assert_eq!(
            SettingValue::FloatVector([0.125, 0.0, 1.23456789]).file_token(),
            "0.125 0.0 1.23456789"
        );

        for value in [1.0e-6, 2.5e-7, 1.23456789, 6.02214076e23, -0.0000375] {
            let token = SettingValue::Float(value).file_token();
            assert_eq!(SettingValue::detect(&token), SettingValue::Float(value), "{}", token);
        }
    }
}
