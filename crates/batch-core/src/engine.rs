//! Fire-and-forget engine launches.
//!
//! The engine runs as a detached shell command; status is learned later from
//! the files it leaves behind.

use crate::calculation::{Calculation, JobEnvironment};
use crate::config::EngineConfig;
use crate::domain::{BatchError, BatchResult, CalculationStatus};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLauncher {
    command: String,
}

impl EngineLauncher {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.command.clone())
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// `cd '<directory>' && <engine> '<name>'`
    pub fn build_command(&self, directory: &Path, name: &str) -> String {
        format!(
            "cd {} && {} {}",
            shell_quote(&directory.display().to_string()),
            self.command,
            shell_quote(name)
        )
    }

    /// Starts the engine on a created or submitted job and returns the
    /// shell's process id without waiting for it.
    pub fn launch(&self, calculation: &Calculation, env: &JobEnvironment) -> BatchResult<u32> {
        let status = calculation.status(env)?;
        if !matches!(
            status,
            CalculationStatus::Created | CalculationStatus::Submitted
        ) {
            return Err(BatchError::state(
                "STATE.NOT_RUNNABLE",
                format!(
                    "calculation in '{}' is {} and cannot be started",
                    calculation.directory_label(),
                    status
                ),
            ));
        }

        let directory = calculation.require_directory()?;
        let name = calculation.require_name(env.namer())?;
        let command_line = self.build_command(directory, &name);

        let child = Command::new("sh")
            .arg("-c")
            .arg(&command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| {
                BatchError::filesystem(
                    "IO.ENGINE_SPAWN",
                    format!("failed to start '{}': {}", command_line, source),
                )
            })?;

        info!(pid = child.id(), command = %command_line, "launched engine");
        Ok(child.id())
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
