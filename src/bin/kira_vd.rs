use std::path::Path;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_variant_datasets::app::{App, ProgressSink, RunSummary};
use kira_variant_datasets::config::{ConfigLoader, ResolvedConfig};
use kira_variant_datasets::datasets_cli::DatasetsCliClient;
use kira_variant_datasets::domain::{FetcherKind, VariantDescriptor};
use kira_variant_datasets::error::KiraError;
use kira_variant_datasets::ncbi::{NcbiHttpClient, VirusDatasetClient, VirusPackageRequest};
use kira_variant_datasets::output::{JsonOutput, LogSink, OutputMode, TextOutput};
use kira_variant_datasets::store::Store;

#[derive(Parser)]
#[command(name = "kira-vd")]
#[command(about = "Acquire and normalize viral lineage genome collections from NCBI Datasets")]
#[command(version, author)]
struct Cli {
    #[command(flatten)]
    selection: Selection,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Selection {
    #[arg(
        long,
        global = true,
        help = "Variant registry file (defaults to ./kira-variants.json, then the built-in registry)"
    )]
    config: Option<String>,

    #[arg(
        long = "variant",
        global = true,
        help = "Restrict the run to these variant short names"
    )]
    variants: Vec<String>,

    #[arg(long, global = true, help = "Print a JSON summary on stdout instead of text")]
    json: bool,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    #[command(about = "Download missing raw packages for all variants")]
    Acquire,
    #[command(about = "Extract packages and derive raw metadata tables")]
    Tabulate,
    #[command(about = "Normalize raw metadata tables into cleaned tables")]
    Clean,
    #[command(about = "Check cleaned tables against genome sequences")]
    Check,
    #[command(about = "Acquire, tabulate and clean in one pass")]
    Run,
    #[command(about = "Show the resolved variant registry")]
    Variants,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(kira) = report.downcast_ref::<KiraError>() {
                return ExitCode::from(map_exit_code(kira));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &KiraError) -> u8 {
    if error.is_configuration() {
        2
    } else if error.is_upstream() {
        3
    } else {
        1
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.selection.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let mut config = ConfigLoader::resolve(cli.selection.config.as_deref())?;
    config.select(&cli.selection.variants)?;

    match cli.command {
        Commands::Variants => {
            match output_mode {
                OutputMode::Json => JsonOutput::print_variants(&config.variants).into_diagnostic()?,
                OutputMode::Text => TextOutput::print_variants(&config.variants),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Acquire | Commands::Run => match config.fetcher {
            FetcherKind::Http => {
                let client = NcbiHttpClient::new(config.timeout)?;
                run_operation(cli.command, client, &config, output_mode)
            }
            FetcherKind::DatasetsCli => {
                let client = DatasetsCliClient::new();
                if let Some(version) = client.version() {
                    tracing::debug!(%version, "using datasets executable");
                }
                run_operation(cli.command, client, &config, output_mode)
            }
        },
        Commands::Tabulate | Commands::Clean | Commands::Check => {
            run_operation(cli.command, NopClient, &config, output_mode)
        }
    }
}

fn run_operation<C: VirusDatasetClient>(
    command: Commands,
    client: C,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<ExitCode> {
    let store = Store::new(config.data_root.clone());
    let app = App::new(
        store,
        client,
        config.filter.clone(),
        config.metadata_source,
    );
    let variants = config.variants.as_slice();

    let summary = match output_mode {
        OutputMode::Json => dispatch(&app, command, variants, &JsonOutput)?,
        OutputMode::Text => dispatch(&app, command, variants, &LogSink)?,
    };
    match output_mode {
        OutputMode::Json => JsonOutput::print_summary(&summary).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_summary(&summary),
    }

    if summary.has_failures() {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn dispatch<C: VirusDatasetClient>(
    app: &App<C>,
    command: Commands,
    variants: &[VariantDescriptor],
    sink: &dyn ProgressSink,
) -> Result<RunSummary, KiraError> {
    match command {
        Commands::Acquire => app.acquire(variants, sink),
        Commands::Tabulate => app.tabulate(variants, sink),
        Commands::Clean => app.clean(variants, sink),
        Commands::Check => app.check(variants, sink),
        Commands::Run => app.run(variants, sink),
        Commands::Variants => Ok(RunSummary {
            operation: "variants".to_string(),
            items: Vec::new(),
        }),
    }
}

struct NopClient;

impl VirusDatasetClient for NopClient {
    fn download_virus_package(
        &self,
        _request: &VirusPackageRequest,
        _destination: &Path,
    ) -> Result<(), KiraError> {
        Err(KiraError::NcbiHttp(
            "download client not configured".to_string(),
        ))
    }
}
