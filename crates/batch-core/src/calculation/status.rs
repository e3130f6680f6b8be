//! Job status read off the job directory.
//!
//! Nothing here is cached: every call looks at the files again.

use super::{Calculation, JobEnvironment};
use crate::domain::{BatchError, BatchResult, CalculationStatus};
use globset::Glob;
use std::path::Path;
use std::time::SystemTime;

/// Engine output ends with this line once the job finished.
const TERMINAL_MARKER: &str = "total time";

impl Calculation {
    pub fn status(&self, env: &JobEnvironment) -> BatchResult<CalculationStatus> {
        let Some(directory) = self.directory() else {
            return Ok(CalculationStatus::NoDirectory);
        };
        let fs = env.filesystem();
        if !fs.exists(directory) {
            return Ok(CalculationStatus::NotCreated);
        }

        let name = self.require_name(env.namer())?;
        let layout = env.layout();

        if self.has_error_file(env, directory, &name)? {
            return Ok(CalculationStatus::Errored);
        }

        if let Some(lines) = self.output_lines(env)? {
            return Ok(if terminal_line(&lines).is_some() {
                CalculationStatus::Completed
            } else {
                CalculationStatus::Running
            });
        }

        let marker = directory.join(layout.file_name(&name, &layout.submission_extension));
        if fs.exists(&marker) {
            return Ok(CalculationStatus::Submitted);
        }

        Ok(CalculationStatus::Created)
    }

    /// Lines of `<name>.<output>`, or `None` when the engine has not
    /// written it yet.
    pub(crate) fn output_lines(&self, env: &JobEnvironment) -> BatchResult<Option<Vec<String>>> {
        let path = self.artifact_path(env, &env.layout().output_extension)?;
        let fs = env.filesystem();
        if !fs.exists(&path) {
            return Ok(None);
        }
        let content = fs.read_to_string(&path).map_err(|source| {
            BatchError::filesystem(
                "IO.OUTPUT_READ",
                format!("failed to read '{}': {}", path.display(), source),
            )
        })?;
        Ok(Some(content.lines().map(str::to_owned).collect()))
    }

    /// Wall time the engine reported on its terminal line, in seconds.
    /// `None` unless the job completed with a readable duration.
    pub fn completed_duration(&self, env: &JobEnvironment) -> BatchResult<Option<f64>> {
        let Some(lines) = self.output_lines(env)? else {
            return Ok(None);
        };
        Ok(terminal_line(&lines).and_then(parse_reported_seconds))
    }

    /// When the engine started writing output.
    pub fn started_at(&self, env: &JobEnvironment) -> Option<SystemTime> {
        self.artifact_created(env, &env.layout().output_extension)
    }

    /// When the submission marker was written.
    pub fn submitted_at(&self, env: &JobEnvironment) -> Option<SystemTime> {
        self.artifact_created(env, &env.layout().submission_extension)
    }

    fn artifact_created(&self, env: &JobEnvironment, extension: &str) -> Option<SystemTime> {
        let path = self.artifact_path(env, extension).ok()?;
        env.filesystem().created(&path).ok()
    }

    fn has_error_file(
        &self,
        env: &JobEnvironment,
        directory: &Path,
        name: &str,
    ) -> BatchResult<bool> {
        let pattern = format!(
            "*{}*.{}",
            globset::escape(name),
            globset::escape(&env.layout().error_extension)
        );
        let matcher = Glob::new(&pattern)
            .map_err(|source| {
                BatchError::internal(
                    "INTERNAL.ERROR_GLOB",
                    format!("invalid error-file pattern '{}': {}", pattern, source),
                )
            })?
            .compile_matcher();

        let names = env.filesystem().file_names(directory).map_err(|source| {
            BatchError::filesystem(
                "IO.DIRECTORY_READ",
                format!("failed to list '{}': {}", directory.display(), source),
            )
        })?;
        Ok(names.iter().any(|file| matcher.is_match(file)))
    }
}

fn terminal_line(lines: &[String]) -> Option<&str> {
    lines
        .iter()
        .rev()
        .map(|line| line.trim_start())
        .find(|line| {
            line.get(..TERMINAL_MARKER.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(TERMINAL_MARKER))
        })
}

/// `Total time          =     12.30 s` gives `12.3`.
fn parse_reported_seconds(line: &str) -> Option<f64> {
    line.get(TERMINAL_MARKER.len()..)?
        .trim_start()
        .trim_start_matches(['=', ':'])
        .split_whitespace()
        .next()?
        .parse::<f64>()
        .ok()
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
}
