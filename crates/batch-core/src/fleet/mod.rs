//! Operations over an ordered collection of calculations.
//!
//! Bulk operations run in two modes. [`BulkMode::Strict`] checks every
//! member before touching anything and aborts on the first problem;
//! [`BulkMode::Permissive`] logs a warning for each failing member and
//! carries on with the rest.

mod eta;
mod snapshot;

pub use eta::{EtaEstimate, PendingJob, schedule_lanes};

use crate::calculation::{Calculation, JobEnvironment};
use crate::domain::{BatchError, BatchResult, BulkMode, CalculationStatus, CreateMode};
use crate::engine::EngineLauncher;
use crate::generator::Generation;
use crate::setting::Setting;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fleet {
    calculations: Vec<Calculation>,
}

/// Number of calculations per status; failed status checks count as
/// `unknown`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub counts: BTreeMap<CalculationStatus, usize>,
    pub unknown: usize,
}

impl StatusSummary {
    pub fn count(&self, status: CalculationStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum::<usize>() + self.unknown
    }
}

impl From<Generation> for Fleet {
    fn from(generation: Generation) -> Self {
        Self::new(generation.calculations)
    }
}

impl Fleet {
    pub fn new(calculations: Vec<Calculation>) -> Self {
        Self { calculations }
    }

    pub fn push(&mut self, calculation: Calculation) {
        self.calculations.push(calculation);
    }

    pub fn len(&self) -> usize {
        self.calculations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculations.is_empty()
    }

    pub fn calculations(&self) -> &[Calculation] {
        &self.calculations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Calculation> {
        self.calculations.iter()
    }

    /// Status of every member; `None` for members skipped in permissive
    /// mode.
    pub fn statuses(
        &self,
        env: &JobEnvironment,
        mode: BulkMode,
    ) -> BatchResult<Vec<Option<CalculationStatus>>> {
        self.calculations
            .iter()
            .map(|calculation| {
                match calculation.status(env) {
                    Ok(status) => Ok(Some(status)),
                    Err(error) => tolerate(mode, "status", calculation, error).map(|()| None),
                }
            })
            .collect()
    }

    pub fn summary(&self, env: &JobEnvironment) -> StatusSummary {
        let mut summary = StatusSummary::default();
        for calculation in &self.calculations {
            match calculation.status(env) {
                Ok(status) => *summary.counts.entry(status).or_default() += 1,
                Err(_) => summary.unknown += 1,
            }
        }
        summary
    }

    pub fn filter_by_status(
        &self,
        env: &JobEnvironment,
        wanted: &[CalculationStatus],
        mode: BulkMode,
    ) -> BatchResult<Vec<&Calculation>> {
        let statuses = self.statuses(env, mode)?;
        Ok(self
            .calculations
            .iter()
            .zip(statuses)
            .filter(|(_, status)| status.is_some_and(|status| wanted.contains(&status)))
            .map(|(calculation, _)| calculation)
            .collect())
    }

    /// Writes every job directory; returns how many were written.
    pub fn create_all(
        &self,
        env: &JobEnvironment,
        create: CreateMode,
        mode: BulkMode,
    ) -> BatchResult<usize> {
        let selected = self.preflight(mode, "create", |calculation| {
            let directory = calculation.require_directory()?;
            calculation.require_name(env.namer())?;
            if env.filesystem().exists(directory) && !create.force && !create.passive {
                return Err(BatchError::filesystem(
                    "IO.DIRECTORY_EXISTS",
                    format!(
                        "job directory '{}' already exists; use force to overwrite",
                        directory.display()
                    ),
                ));
            }
            Ok(())
        })?;

        let mut written = 0;
        for calculation in selected {
            match calculation.create(env, create) {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(error) => tolerate(mode, "create", calculation, error)?,
            }
        }
        info!(written, total = self.len(), "created job directories");
        Ok(written)
    }

    /// Submits every created job; returns how many were queued.
    pub fn submit_all(
        &self,
        env: &JobEnvironment,
        queue_file: &Path,
        mode: BulkMode,
    ) -> BatchResult<usize> {
        let selected = self.preflight(mode, "submit", |calculation| {
            expect_status(calculation, env, &[CalculationStatus::Created])
        })?;

        let mut submitted = 0;
        for calculation in selected {
            match calculation.submit(env, queue_file) {
                Ok(()) => submitted += 1,
                Err(error) => tolerate(mode, "submit", calculation, error)?,
            }
        }
        Ok(submitted)
    }

    /// Launches the engine for every created or submitted job; returns how
    /// many processes were started.
    pub fn run_all(
        &self,
        env: &JobEnvironment,
        launcher: &EngineLauncher,
        mode: BulkMode,
    ) -> BatchResult<usize> {
        let selected = self.preflight(mode, "run", |calculation| {
            expect_status(
                calculation,
                env,
                &[CalculationStatus::Created, CalculationStatus::Submitted],
            )
        })?;

        let mut launched = 0;
        for calculation in selected {
            match launcher.launch(calculation, env) {
                Ok(_) => launched += 1,
                Err(error) => tolerate(mode, "run", calculation, error)?,
            }
        }
        Ok(launched)
    }

    /// Applies the same update to every member. In strict mode either all
    /// members change or none do.
    pub fn update_settings_all(&mut self, settings: &[Setting], mode: BulkMode) -> BatchResult<usize> {
        let mut updated = self.calculations.clone();
        let mut changed = 0;
        for (calculation, original) in updated.iter_mut().zip(&self.calculations) {
            match calculation.update_settings(settings.to_vec()) {
                Ok(()) => changed += 1,
                Err(error) => {
                    tolerate(mode, "update settings", original, error)?;
                    *calculation = original.clone();
                }
            }
        }
        self.calculations = updated;
        Ok(changed)
    }

    /// Removes keys from every member; returns the number of settings
    /// dropped.
    pub fn remove_settings_all(&mut self, keys: &[&str]) -> usize {
        self.calculations
            .iter_mut()
            .map(|calculation| calculation.remove_settings(keys))
            .sum()
    }

    fn preflight<F>(&self, mode: BulkMode, operation: &str, check: F) -> BatchResult<Vec<&Calculation>>
    where
        F: Fn(&Calculation) -> BatchResult<()>,
    {
        let mut selected = Vec::with_capacity(self.calculations.len());
        for calculation in &self.calculations {
            match check(calculation) {
                Ok(()) => selected.push(calculation),
                Err(error) => tolerate(mode, operation, calculation, error)?,
            }
        }
        Ok(selected)
    }
}

fn expect_status(
    calculation: &Calculation,
    env: &JobEnvironment,
    allowed: &[CalculationStatus],
) -> BatchResult<()> {
    let status = calculation.status(env)?;
    if allowed.contains(&status) {
        return Ok(());
    }
    Err(BatchError::state(
        "STATE.INCOMPATIBLE",
        format!(
            "calculation in '{}' is {}",
            calculation.directory_label(),
            status
        ),
    ))
}

/// Strict mode hands the error back; permissive mode logs it and continues.
fn tolerate(
    mode: BulkMode,
    operation: &str,
    calculation: &Calculation,
    error: BatchError,
) -> BatchResult<()> {
    match mode {
        BulkMode::Strict => Err(error.context(format!(
            "{} '{}'",
            operation,
            calculation.directory_label()
        ))),
        BulkMode::Permissive => {
            warn!(
                operation,
                directory = %calculation.directory_label(),
                code = error.placeholder(),
                "skipping calculation: {}",
                error.message()
            );
            Ok(())
        }
    }
}
