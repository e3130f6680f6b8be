mod commands;
mod helpers;

use batch_core::domain::BatchError;
use clap::Parser;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();

    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let batch_error = error.as_batch_error();
            eprintln!("{}", batch_error.diagnostic_line());
            batch_error.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(
    name = "castep-batch",
    version,
    about = "Generate, submit and track batches of CASTEP calculations"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Expand a generation plan into a fleet snapshot
    Generate(commands::GenerateArgs),
    /// Write cell and param files for every calculation
    Create(commands::CreateArgs),
    /// Report the status of every calculation
    Status(commands::StatusArgs),
    /// Append created calculations to the queue file
    Submit(commands::SubmitArgs),
    /// Launch the engine on created or submitted calculations
    Run(commands::RunArgs),
    /// Estimate when pending calculations will finish
    Eta(commands::EtaArgs),
    /// Print the settings of each calculation
    Inspect(commands::InspectArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Generate(args) => commands::run_generate_command(args),
        CliCommand::Create(args) => commands::run_create_command(args),
        CliCommand::Status(args) => commands::run_status_command(args),
        CliCommand::Submit(args) => commands::run_submit_command(args),
        CliCommand::Run(args) => commands::run_run_command(args),
        CliCommand::Eta(args) => commands::run_eta_command(args),
        CliCommand::Inspect(args) => commands::run_inspect_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(BatchError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<BatchError> for CliError {
    fn from(error: BatchError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_batch_error(&self) -> BatchError {
        match self {
            Self::Usage(message) => BatchError::validation("VALIDATION.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => BatchError::internal("INTERNAL.CLI", format!("{error:#}")),
        }
    }
}
