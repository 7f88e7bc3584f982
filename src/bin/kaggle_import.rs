use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kaggle_import::autocomplete::{DatasetFiles, DatasetSearch, DependentAutocompletion};
use kaggle_import::config::{Config, ConfigLoader, resolve_credentials};
use kaggle_import::context::ExecutionContext;
use kaggle_import::domain::{Credentials, SearchTermJoin};
use kaggle_import::error::ImportError;
use kaggle_import::import::{ImportOptions, ImportSettings, ImportTask};
use kaggle_import::kaggle::{KaggleClient, KaggleHttpClient};
use kaggle_import::output::{JsonOutput, StderrReport};
use kaggle_import::publish::{FileResourceSink, HttpResourceSink, ResourceSink};
use kaggle_import::retrieval::DEFAULT_SETTLE;

const DEFAULT_SINK_ROOT: &str = ".kaggle-import/resources";
const DEFAULT_PROJECT: &str = "default";

#[derive(Parser)]
#[command(name = "kaggle-import")]
#[command(about = "Import a single file from a Kaggle dataset into a workflow resource store")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    username: Option<String>,

    #[arg(long, global = true)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Suggest datasets matching the search terms")]
    Search(SearchArgs),
    #[command(about = "Suggest files of a dataset")]
    Files(FilesArgs),
    #[command(about = "Download a dataset file and publish it as a resource")]
    Import(ImportArgs),
}

#[derive(Args)]
struct SearchArgs {
    terms: Vec<String>,

    #[arg(long, value_enum)]
    join: Option<SearchTermJoin>,
}

#[derive(Args)]
struct FilesArgs {
    dataset: Option<String>,
}

#[derive(Args)]
struct ImportArgs {
    #[arg(long)]
    dataset: Option<String>,

    #[arg(long)]
    file: Option<String>,

    #[arg(long)]
    sink: Option<String>,

    #[arg(long)]
    project: Option<String>,

    #[arg(long)]
    user: Option<String>,

    #[arg(long)]
    work_dir: Option<PathBuf>,

    #[arg(long, conflicts_with = "sink_url")]
    sink_root: Option<String>,

    #[arg(long)]
    sink_url: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<ImportError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ImportError) -> u8 {
    match error {
        ImportError::InvalidSlug(_)
        | ImportError::InvalidDataset(_)
        | ImportError::InvalidSink(_)
        | ImportError::MissingDependency(_)
        | ImportError::MissingCredentials(_)
        | ImportError::FileNotInDataset { .. } => 2,
        ImportError::RemoteService(_)
        | ImportError::RemoteStatus { .. }
        | ImportError::SinkHttp(_)
        | ImportError::SinkStatus { .. } => 3,
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
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let client = KaggleHttpClient::new()?;

    match cli.command {
        Commands::Search(args) => {
            let join = args.join.or(config.search_join).unwrap_or_default();
            let values = dependent_values(&cli.username, &cli.key, &config)?;
            let completion = DependentAutocompletion::new(DatasetSearch::new(&client, join));
            let result = completion.autocomplete(&args.terms, &values)?;
            JsonOutput::print_completions(&result).into_diagnostic()
        }
        Commands::Files(args) => {
            let mut values = dependent_values(&cli.username, &cli.key, &config)?;
            values.push(args.dataset.or(config.dataset.clone()).unwrap_or_default());
            let completion = DependentAutocompletion::new(DatasetFiles::new(&client));
            let result = completion.autocomplete(&[], &values)?;
            JsonOutput::print_completions(&result).into_diagnostic()
        }
        Commands::Import(args) => {
            let credentials =
                resolve_credentials(cli.username.as_deref(), cli.key.as_deref(), &config)?;
            let sink_url = args.sink_url.clone().or(config.sink_url.clone());
            match sink_url {
                Some(url) => {
                    let sink = HttpResourceSink::new(url, config.sink_token.clone())?;
                    run_import(args, credentials, &config, client, sink)
                }
                None => {
                    let root = args
                        .sink_root
                        .clone()
                        .or(config.sink_root.clone())
                        .unwrap_or_else(|| DEFAULT_SINK_ROOT.to_string());
                    run_import(args, credentials, &config, client, FileResourceSink::new(root))
                }
            }
        }
    }
}

fn dependent_values(
    username: &Option<String>,
    key: &Option<String>,
    config: &Config,
) -> Result<Vec<String>, ImportError> {
    let credentials = resolve_credentials(username.as_deref(), key.as_deref(), config)?;
    Ok(vec![
        credentials.username,
        credentials.key.expose().to_string(),
    ])
}

fn run_import<C: KaggleClient, S: ResourceSink>(
    args: ImportArgs,
    credentials: Credentials,
    config: &Config,
    client: C,
    sink: S,
) -> miette::Result<()> {
    let settings = ImportSettings {
        credentials,
        dataset: required(args.dataset.or(config.dataset.clone()), "--dataset")?,
        file_name: required(args.file.or(config.file.clone()), "--file")?,
        sink_name: required(args.sink.or(config.sink.clone()), "--sink")?,
    };
    let options = ImportOptions {
        work_dir: args
            .work_dir
            .or(config.work_dir.clone())
            .unwrap_or_else(|| PathBuf::from(".")),
        settle: config
            .settle_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SETTLE),
    };
    let project = args
        .project
        .or(config.project.clone())
        .unwrap_or_else(|| DEFAULT_PROJECT.to_string());
    let mut context = ExecutionContext::new(project);
    if let Some(user) = args.user {
        context = context.with_user(user);
    }

    let task = ImportTask::new(client, sink, settings, options)?;
    let report = task.execute(&context, &StderrReport)?;
    JsonOutput::print_report(&report).into_diagnostic()
}

fn required(value: Option<String>, flag: &str) -> miette::Result<String> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| miette::Report::msg(format!("{flag} is required (flag or config file)")))
}
