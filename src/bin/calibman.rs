use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use calib_manager::app::{App, list_detectors};
use calib_manager::catalog::DetectorCatalog;
use calib_manager::config::ConfigLoader;
use calib_manager::domain::{ConstantKind, Source, ValidityRange};
use calib_manager::error::CalibError;
use calib_manager::jobs::CommandJob;
use calib_manager::output::{JsonOutput, OutputMode};
use calib_manager::scan::ScanLogFile;

#[derive(Parser)]
#[command(name = "calibman")]
#[command(about = "Deployment manager for per-run detector calibration constants")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(short = 'e', long, global = true)]
    exp: Option<String>,

    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List detector sources observed in a run")]
    Sources(RunArgs),
    #[command(about = "Run the dark averaging job for a run")]
    Process(RunArgs),
    #[command(about = "Show tentative deployment commands for a run")]
    Plan(PlanArgs),
    #[command(about = "Deploy averaged constants into the calibration tree")]
    Deploy(DeployArgs),
    #[command(about = "Remove one file from the calibration tree")]
    Delete(DeleteArgs),
    #[command(about = "Show deployment records for a detector source")]
    History(HistoryArgs),
    #[command(about = "List supported detector types")]
    Detectors,
}

#[derive(Args, Clone)]
struct RunArgs {
    #[arg(short = 'r', long)]
    run: u32,

    #[arg(short = 'd', long, value_delimiter = ',')]
    detectors: Vec<String>,
}

#[derive(Args, Clone)]
struct PlanArgs {
    #[arg(short = 'r', long)]
    run: u32,

    #[arg(short = 'd', long, value_delimiter = ',')]
    detectors: Vec<String>,

    #[arg(long)]
    range: Option<String>,
}

#[derive(Args, Clone)]
struct DeployArgs {
    #[arg(short = 'r', long)]
    run: u32,

    #[arg(short = 'd', long, value_delimiter = ',')]
    detectors: Vec<String>,

    #[arg(long)]
    range: Option<String>,

    #[arg(long = "only-source")]
    only_source: Vec<String>,

    #[arg(long, default_value = "calibrun-dark")]
    comment: String,
}

#[derive(Args, Clone)]
struct DeleteArgs {
    #[arg(short = 'd', long)]
    detector: String,

    #[arg(short = 's', long)]
    source: String,

    #[arg(short = 'k', long)]
    kind: String,

    #[arg(short = 'f', long)]
    file: String,

    #[arg(long, default_value = "single-file-manager")]
    comment: String,
}

#[derive(Args, Clone)]
struct HistoryArgs {
    #[arg(short = 'd', long)]
    detector: String,

    #[arg(short = 's', long)]
    source: String,

    #[arg(short = 'k', long)]
    kind: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(calib) = report.downcast_ref::<CalibError>() {
            return ExitCode::from(map_exit_code(calib));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CalibError) -> u8 {
    match error {
        CalibError::MissingConfig
        | CalibError::NothingToDeploy
        | CalibError::CalibFileMissing(_)
        | CalibError::SourceFileMissing(_)
        | CalibError::UnknownDetectorType(_) => 2,
        CalibError::ScanFailed(_) | CalibError::JobFailed(_) | CalibError::JobNotConfigured => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let config_path = cli.config;
    let exp = cli.exp;

    let catalog = DetectorCatalog::default();

    match cli.command {
        Commands::Sources(args) => {
            let app = build_app(&catalog, config_path.as_deref(), exp, args.detectors.clone())?;
            run_sources(args, app, output_mode)
        }
        Commands::Process(args) => {
            let app = build_app(&catalog, config_path.as_deref(), exp, args.detectors.clone())?;
            run_process(args, app, output_mode)
        }
        Commands::Plan(args) => {
            let app = build_app(&catalog, config_path.as_deref(), exp, args.detectors.clone())?;
            run_plan(args, app, output_mode)
        }
        Commands::Deploy(args) => {
            let app = build_app(&catalog, config_path.as_deref(), exp, args.detectors.clone())?;
            run_deploy(args, app, output_mode)
        }
        Commands::Delete(args) => {
            let app = build_app(&catalog, config_path.as_deref(), exp, Vec::new())?;
            run_delete(args, app, output_mode)
        }
        Commands::History(args) => {
            let app = build_app(&catalog, config_path.as_deref(), exp, Vec::new())?;
            run_history(args, app, output_mode)
        }
        Commands::Detectors => run_detectors(&catalog, output_mode),
    }
}

/// Loads the configuration, applies CLI overrides and wires the scan-log
/// and averaging-job collaborators.
fn build_app(
    catalog: &DetectorCatalog,
    config_path: Option<&str>,
    exp: Option<String>,
    detectors: Vec<String>,
) -> miette::Result<App<ScanLogFile, CommandJob>> {
    let mut raw = ConfigLoader::load(config_path).into_diagnostic()?;
    if let Some(exp) = exp {
        raw.experiment = Some(exp);
    }
    if !detectors.is_empty() {
        raw.detectors = detectors;
    }
    let config = ConfigLoader::resolve_config(raw, catalog).into_diagnostic()?;

    let scan = ScanLogFile::new(config.scan_log_template(), config.experiment.clone());
    let job = CommandJob::new(
        config.job_command.clone().unwrap_or_default(),
        config.job_timeout_sec,
    );
    Ok(App::new(catalog.clone(), config, scan, job))
}

fn run_sources(
    args: RunArgs,
    app: App<ScanLogFile, CommandJob>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let result = app.sources(args.run).into_diagnostic()?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_sources(&result).into_diagnostic(),
        OutputMode::Interactive => {
            println!("sources observed in run {}:", result.run);
            for row in &result.sources {
                println!("  {:<12} {:<28} {}", row.detector, row.source, row.data_type);
            }
            Ok(())
        }
    }
}

fn run_process(
    args: RunArgs,
    app: App<ScanLogFile, CommandJob>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let result = app.process(args.run).into_diagnostic()?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_process(&result).into_diagnostic(),
        OutputMode::Interactive => {
            println!("job finished: {}", result.command);
            println!("log: {}", result.log_path);
            Ok(())
        }
    }
}

fn run_plan(
    args: PlanArgs,
    app: App<ScanLogFile, CommandJob>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let range = parse_range(args.range.as_deref())?;
    let result = app.plan(args.run, range).into_diagnostic()?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_plan(&result).into_diagnostic(),
        OutputMode::Interactive => {
            println!(
                "tentative deployment commands for run {} (range {}):",
                result.run, result.range
            );
            for command in &result.commands {
                println!("  {command}");
            }
            if result.skipped_not_applicable > 0 || result.skipped_missing > 0 {
                println!(
                    "skipped: {} not applicable, {} missing working files",
                    result.skipped_not_applicable, result.skipped_missing
                );
            }
            Ok(())
        }
    }
}

fn run_deploy(
    args: DeployArgs,
    app: App<ScanLogFile, CommandJob>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let range = parse_range(args.range.as_deref())?;
    let only_sources = args
        .only_source
        .iter()
        .map(|value| value.parse::<Source>())
        .collect::<Result<Vec<_>, _>>()
        .into_diagnostic()?;

    let report = app
        .deploy(args.run, range, &only_sources, &args.comment)
        .into_diagnostic()?;

    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_deploy(&report).into_diagnostic()?,
        OutputMode::Interactive => {
            println!("deployed {} file(s)", report.succeeded);
            for failure in &report.failed {
                println!("failed: {} ({})", failure.command, failure.error);
            }
            if report.skipped_unselected > 0 {
                println!("skipped {} unselected source(s)", report.skipped_unselected);
            }
        }
    }

    if report.is_clean() {
        Ok(())
    } else {
        Err(miette::Report::msg(format!(
            "{} deployment command(s) failed",
            report.failed.len()
        )))
    }
}

fn run_delete(
    args: DeleteArgs,
    app: App<ScanLogFile, CommandJob>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let source = args.source.parse::<Source>().into_diagnostic()?;
    let kind = args.kind.parse::<ConstantKind>().into_diagnostic()?;
    let result = app
        .delete(&args.detector, &source, kind, &args.file, &args.comment)
        .into_diagnostic()?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_delete(&result).into_diagnostic(),
        OutputMode::Interactive => {
            println!("removed {}", result.deleted);
            Ok(())
        }
    }
}

fn run_history(
    args: HistoryArgs,
    app: App<ScanLogFile, CommandJob>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let source = args.source.parse::<Source>().into_diagnostic()?;
    let kind = args.kind.parse::<ConstantKind>().into_diagnostic()?;
    let result = app
        .history(&args.detector, &source, kind)
        .into_diagnostic()?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_history(&result).into_diagnostic(),
        OutputMode::Interactive => {
            println!("deployment records in {}:", result.directory);
            for record in &result.records {
                println!("  {record}");
            }
            Ok(())
        }
    }
}

fn run_detectors(catalog: &DetectorCatalog, output_mode: OutputMode) -> miette::Result<()> {
    let result = list_detectors(catalog);
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_detectors(&result).into_diagnostic(),
        OutputMode::Interactive => {
            for row in &result.detectors {
                println!(
                    "{:<12} {:<24} {:<20} {} kind(s), {} known source(s)",
                    row.name,
                    row.data_type,
                    row.calib_type,
                    row.kinds.len(),
                    row.known_sources.len()
                );
            }
            Ok(())
        }
    }
}

fn parse_range(value: Option<&str>) -> miette::Result<Option<ValidityRange>> {
    value
        .map(|raw| raw.parse::<ValidityRange>())
        .transpose()
        .into_diagnostic()
}
