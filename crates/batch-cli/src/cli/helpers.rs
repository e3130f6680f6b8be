use super::CliError;
use anyhow::Context;
use batch_core::calculation::JobEnvironment;
use batch_core::config::BatchConfig;
use batch_core::domain::BulkMode;
use batch_core::fleet::Fleet;
use batch_core::schema::SchemaRegistry;
use std::path::{Path, PathBuf};
use tracing::debug;

pub(super) const DEFAULT_SNAPSHOT: &str = "fleet.bin";

#[derive(clap::Args)]
pub(super) struct FleetArgs {
    /// Fleet snapshot file
    #[arg(long, default_value = DEFAULT_SNAPSHOT)]
    pub(super) snapshot: PathBuf,

    /// Optional JSON configuration (layout, engine, shortcuts)
    #[arg(long)]
    pub(super) config: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct BulkFlags {
    /// Skip failing calculations with a warning instead of aborting
    #[arg(long)]
    pub(super) permissive: bool,
}

impl BulkFlags {
    pub(super) fn mode(&self) -> BulkMode {
        if self.permissive {
            BulkMode::Permissive
        } else {
            BulkMode::Strict
        }
    }
}

pub(super) struct CliContext {
    pub(super) config: BatchConfig,
    pub(super) registry: SchemaRegistry,
    pub(super) snapshot: PathBuf,
}

impl CliContext {
    pub(super) fn environment(&self) -> JobEnvironment {
        JobEnvironment::local(self.config.layout.clone())
    }

    pub(super) fn load_fleet(&self) -> Result<Fleet, CliError> {
        Ok(Fleet::load_snapshot(&self.snapshot)?)
    }

    pub(super) fn save_fleet(&self, fleet: &Fleet) -> Result<(), CliError> {
        Ok(fleet.save_snapshot(&self.snapshot)?)
    }
}

pub(super) fn load_cli_context(args: &FleetArgs) -> Result<CliContext, CliError> {
    let config = match &args.config {
        Some(path) => BatchConfig::load(path)?,
        None => BatchConfig::default(),
    };
    let registry = SchemaRegistry::builtin()?;
    debug!(
        config = ?args.config,
        snapshot = %args.snapshot.display(),
        keys = registry.len(),
        "resolved CLI context"
    );
    Ok(CliContext {
        config,
        registry,
        snapshot: args.snapshot.clone(),
    })
}

pub(super) fn write_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON output")?;
    println!("{}", rendered);
    Ok(())
}

pub(super) fn display_directory(directory: Option<&Path>) -> String {
    directory
        .map(|directory| directory.display().to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// `3725.0` renders as `1h 02m 05s`.
pub(super) fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::format_duration;

    #[test]
    fn durations_are_compact() {
        assert_eq!(format_duration(3725.0), "1h 02m 05s");
        assert_eq!(format_duration(65.4), "1m 05s");
        assert_eq!(format_duration(-3.0), "0s");
    }
}
