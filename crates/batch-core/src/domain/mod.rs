pub mod errors;

pub use errors::{BatchError, BatchErrorCategory, BatchResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The two configuration files a job directory carries. Every setting key
/// belongs to exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Cell,
    Param,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Cell, Category::Param];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cell => "cell",
            Self::Param => "param",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CalculationStatus {
    NoDirectory,
    #[serde(rename = "not-yet-created")]
    NotCreated,
    Created,
    Submitted,
    Running,
    Completed,
    Errored,
}

impl CalculationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoDirectory => "no-directory",
            Self::NotCreated => "not-yet-created",
            Self::Created => "created",
            Self::Submitted => "submitted",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Errored => "errored",
        }
    }

    pub const ALL: [CalculationStatus; 7] = [
        Self::NoDirectory,
        Self::NotCreated,
        Self::Created,
        Self::Submitted,
        Self::Running,
        Self::Completed,
        Self::Errored,
    ];

    /// Jobs the engine has accepted but not yet finished.
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Submitted | Self::Running)
    }
}

impl FromStr for CalculationStatus {
    type Err = BatchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| {
                BatchError::validation(
                    "VALIDATION.UNKNOWN_STATUS",
                    format!("'{}' is not a calculation status", value),
                )
            })
    }
}

impl Display for CalculationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// How a fleet-wide operation reacts to a failing member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BulkMode {
    #[default]
    Strict,
    Permissive,
}

/// Policy for writing a job directory that may already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CreateMode {
    pub force: bool,
    pub passive: bool,
}

impl CreateMode {
    pub const fn forced() -> Self {
        Self {
            force: true,
            passive: false,
        }
    }

    pub const fn passive() -> Self {
        Self {
            force: false,
            passive: true,
        }
    }
}
