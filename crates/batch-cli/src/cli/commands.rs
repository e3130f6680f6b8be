use super::CliError;
use super::helpers::*;
use batch_core::domain::{BulkMode, CalculationStatus, CreateMode};
use batch_core::engine::EngineLauncher;
use batch_core::fleet::Fleet;
use batch_core::generator::{CalculationGenerator, GenerationPlan};
use serde::Serialize;
use std::path::PathBuf;
use std::time::SystemTime;

#[derive(clap::Args)]
pub(super) struct GenerateArgs {
    /// Generation plan (JSON)
    #[arg(long)]
    plan: PathBuf,

    /// Also write the job directories
    #[arg(long)]
    create: bool,

    #[command(flatten)]
    fleet: FleetArgs,
}

#[derive(clap::Args)]
#[command(group(clap::ArgGroup::new("existing").args(["force", "passive"])))]
pub(super) struct CreateArgs {
    /// Overwrite input files in existing directories
    #[arg(long)]
    force: bool,

    /// Leave existing directories untouched
    #[arg(long)]
    passive: bool,

    #[command(flatten)]
    bulk: BulkFlags,

    #[command(flatten)]
    fleet: FleetArgs,
}

#[derive(clap::Args)]
pub(super) struct StatusArgs {
    /// Only list calculations in this status (repeatable)
    #[arg(long = "only", value_name = "STATUS")]
    only: Vec<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    fleet: FleetArgs,
}

#[derive(clap::Args)]
pub(super) struct SubmitArgs {
    /// Queue file; defaults to the configured one
    #[arg(long)]
    queue: Option<PathBuf>,

    #[command(flatten)]
    bulk: BulkFlags,

    #[command(flatten)]
    fleet: FleetArgs,
}

#[derive(clap::Args)]
pub(super) struct RunArgs {
    /// Engine command; defaults to the configured one
    #[arg(long)]
    engine: Option<String>,

    /// Print the commands without starting anything
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    bulk: BulkFlags,

    #[command(flatten)]
    fleet: FleetArgs,
}

#[derive(clap::Args)]
pub(super) struct EtaArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    bulk: BulkFlags,

    #[command(flatten)]
    fleet: FleetArgs,
}

#[derive(clap::Args)]
pub(super) struct InspectArgs {
    /// Only show the calculation at this position (from 1)
    #[arg(long)]
    index: Option<usize>,

    #[command(flatten)]
    fleet: FleetArgs,
}

#[derive(Serialize)]
struct StatusRow {
    index: usize,
    directory: String,
    name: Option<String>,
    status: Option<CalculationStatus>,
}

#[derive(Serialize)]
struct EtaRow {
    index: usize,
    directory: String,
    seconds: f64,
}

pub(super) fn run_generate_command(args: GenerateArgs) -> Result<i32, CliError> {
    let context = load_cli_context(&args.fleet)?;
    let plan = GenerationPlan::load(&args.plan)?;
    let request = plan.to_request(&context.registry)?;
    let shortcuts = context.config.shortcut_table(&context.registry)?;
    let generation = CalculationGenerator::new(&shortcuts, context.config.layout.index_width)
        .generate(&request)?;

    let globals = generation.global_settings.len();
    let fleet = Fleet::from(generation);
    context.save_fleet(&fleet)?;
    println!(
        "Generated {} calculations ({} global settings) into '{}'",
        fleet.len(),
        globals,
        context.snapshot.display()
    );
    for calculation in fleet.iter() {
        println!("  {}", display_directory(calculation.directory()));
    }

    if args.create {
        let env = context.environment();
        let written = fleet.create_all(&env, CreateMode::default(), BulkMode::Strict)?;
        println!("Created {} job directories", written);
    }
    Ok(0)
}

pub(super) fn run_create_command(args: CreateArgs) -> Result<i32, CliError> {
    let context = load_cli_context(&args.fleet)?;
    let fleet = context.load_fleet()?;
    let env = context.environment();
    let mode = CreateMode {
        force: args.force,
        passive: args.passive,
    };
    let written = fleet.create_all(&env, mode, args.bulk.mode())?;
    println!("Created {} of {} job directories", written, fleet.len());
    Ok(0)
}

pub(super) fn run_status_command(args: StatusArgs) -> Result<i32, CliError> {
    let context = load_cli_context(&args.fleet)?;
    let only = args
        .only
        .iter()
        .map(|status| status.parse::<CalculationStatus>())
        .collect::<Result<Vec<_>, _>>()?;
    let fleet = context.load_fleet()?;
    let env = context.environment();
    let statuses = fleet.statuses(&env, BulkMode::Permissive)?;

    let rows: Vec<StatusRow> = fleet
        .iter()
        .zip(statuses)
        .enumerate()
        .filter(|(_, (_, status))| {
            only.is_empty() || status.is_some_and(|status| only.contains(&status))
        })
        .map(|(index, (calculation, status))| StatusRow {
            index: index + 1,
            directory: display_directory(calculation.directory()),
            name: calculation.name(env.namer()),
            status,
        })
        .collect();

    if args.json {
        write_json(&rows)?;
        return Ok(0);
    }

    for row in &rows {
        println!(
            "{:>4}  {:<16} {:<16} {}",
            row.index,
            row.status.map(|status| status.as_str()).unwrap_or("unknown"),
            row.name.as_deref().unwrap_or("-"),
            row.directory
        );
    }
    let summary = fleet.summary(&env);
    let counts: Vec<String> = summary
        .counts
        .iter()
        .map(|(status, count)| format!("{}={}", status, count))
        .chain((summary.unknown > 0).then(|| format!("unknown={}", summary.unknown)))
        .collect();
    println!("Total {}: {}", summary.total(), counts.join(" "));
    Ok(0)
}

pub(super) fn run_submit_command(args: SubmitArgs) -> Result<i32, CliError> {
    let context = load_cli_context(&args.fleet)?;
    let fleet = context.load_fleet()?;
    let env = context.environment();
    let queue = args
        .queue
        .unwrap_or_else(|| context.config.engine.queue_file.clone());
    let submitted = fleet.submit_all(&env, &queue, args.bulk.mode())?;
    println!("Submitted {} calculations to '{}'", submitted, queue.display());
    Ok(0)
}

pub(super) fn run_run_command(args: RunArgs) -> Result<i32, CliError> {
    let context = load_cli_context(&args.fleet)?;
    let fleet = context.load_fleet()?;
    let env = context.environment();
    let launcher = match args.engine {
        Some(command) => EngineLauncher::new(command),
        None => EngineLauncher::from_config(&context.config.engine),
    };

    if args.dry_run {
        for calculation in fleet.iter() {
            let (Some(directory), Some(name)) = (calculation.directory(), calculation.name(env.namer()))
            else {
                continue;
            };
            println!("{}", launcher.build_command(directory, &name));
        }
        return Ok(0);
    }

    let launched = fleet.run_all(&env, &launcher, args.bulk.mode())?;
    println!("Started {} engine processes", launched);
    Ok(0)
}

pub(super) fn run_eta_command(args: EtaArgs) -> Result<i32, CliError> {
    let context = load_cli_context(&args.fleet)?;
    let mut fleet = context.load_fleet()?;
    let env = context.environment();
    let estimates = fleet.estimate_completion(&env, SystemTime::now(), args.bulk.mode())?;

    let rows: Vec<EtaRow> = estimates
        .iter()
        .map(|estimate| EtaRow {
            index: estimate.index + 1,
            directory: display_directory(fleet.calculations()[estimate.index].directory()),
            seconds: estimate.seconds,
        })
        .collect();

    if args.json {
        write_json(&rows)?;
        return Ok(0);
    }

    if rows.is_empty() {
        println!("No estimate: need at least one completed and one pending calculation");
        return Ok(0);
    }
    for row in &rows {
        println!(
            "{:>4}  {:>12}  {}",
            row.index,
            format_duration(row.seconds),
            row.directory
        );
    }
    Ok(0)
}

pub(super) fn run_inspect_command(args: InspectArgs) -> Result<i32, CliError> {
    let context = load_cli_context(&args.fleet)?;
    let fleet = context.load_fleet()?;
    let env = context.environment();

    let selected: Vec<(usize, _)> = match args.index {
        Some(index) => {
            let calculation = index
                .checked_sub(1)
                .and_then(|position| fleet.calculations().get(position))
                .ok_or_else(|| {
                    CliError::Usage(format!(
                        "index {} is outside the fleet (1..={})",
                        index,
                        fleet.len()
                    ))
                })?;
            vec![(index, calculation)]
        }
        None => fleet
            .iter()
            .enumerate()
            .map(|(position, calculation)| (position + 1, calculation))
            .collect(),
    };

    for (index, calculation) in selected {
        println!(
            "[{}] {} ({})",
            index,
            display_directory(calculation.directory()),
            calculation
                .name(env.namer())
                .unwrap_or_else(|| "unnamed".to_string())
        );
        for setting in calculation.settings() {
            println!("    {}", setting);
        }
    }
    Ok(0)
}
