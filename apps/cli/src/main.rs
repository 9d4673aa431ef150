//! Command-line front end for the catalog downloader
//!
//! ```bash
//! cli download --source-kind url --source https://example.com/lists/base.json \
//!     --main-url https://example.com/zip --version 0.9.0 --multi-connection -v
//! ```
//!
//! Every flag can also be set from the environment; a `.env` file in the
//! working directory is loaded first.

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use downloader::{
    BatchScheduler, Catalog, CatalogSource, ConsoleProgressReporter, DownloadConfig,
    DownloadLayout, HttpClient, IntoProgressCallback, RunConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

/// Exit status when the run finished but some resources failed
const EXIT_PARTIAL_FAILURE: u8 = 3;

#[derive(Debug, Parser)]
#[command(name = "cli", about = "Download and verify the files listed in a catalog")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download every resource of a catalog
    Download(DownloadArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceKind {
    Url,
    File,
}

#[derive(Debug, clap::Args)]
struct DownloadArgs {
    /// Where the catalog comes from
    #[arg(long, value_enum, env = "CATALOG_SOURCE_KIND")]
    source_kind: SourceKind,

    /// Catalog URL or file path
    #[arg(long, env = "CATALOG_SOURCE")]
    source: String,

    /// Base URL the catalog destinations are appended to
    #[arg(long, env = "MAIN_URL")]
    main_url: String,

    /// Version label; scopes the download and failure directories
    #[arg(long, env = "DOWNLOAD_VERSION")]
    version: String,

    /// Split each file across several byte-range requests
    #[arg(long, env = "MULTI_CONNECTION")]
    multi_connection: bool,

    /// Connections per file when --multi-connection is set
    #[arg(long, env = "NUM_CONNECTIONS", default_value_t = 4)]
    connections: usize,

    /// Files downloaded at the same time
    #[arg(long, env = "MAX_CONCURRENT_FILES", default_value_t = 4)]
    max_files: usize,

    /// Directory holding download/ and failed/
    #[arg(long, env = "DOWNLOAD_ROOT", default_value = ".")]
    root: PathBuf,

    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok(); // Ignore error if .env not present

    let cli = Cli::parse();
    let Commands::Download(args) = cli.command;

    tracing_subscriber::fmt()
        .with_max_level(log_level(args.verbose))
        .init();

    match download(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn run_config(args: &DownloadArgs) -> RunConfig {
    let run = RunConfig::new(&args.main_url, &args.version)
        .with_num_connections(args.connections)
        .with_max_concurrent_files(args.max_files);
    if args.multi_connection {
        run.with_multi_connection(args.connections)
    } else {
        run
    }
}

fn download(args: &DownloadArgs) -> anyhow::Result<ExitCode> {
    let run = run_config(args);
    run.validate().context("invalid run configuration")?;

    let config = DownloadConfig::default();
    let client = HttpClient::from_config(&config).context("failed to build HTTP client")?;

    let source = match args.source_kind {
        SourceKind::Url => CatalogSource::Url(args.source.clone()),
        SourceKind::File => CatalogSource::File(PathBuf::from(&args.source)),
    };
    let catalog = Catalog::load(&source, Some(&client))
        .with_context(|| format!("failed to load catalog from {}", args.source))?;

    println!("📋 Catalog '{}': {} resources", catalog.name, catalog.len());

    let scheduler = BatchScheduler::with_client(client, config, DownloadLayout::new(&args.root))
        .with_progress_callback(ConsoleProgressReporter::new(args.verbose > 0).into_callback());
    let report = scheduler.run(&catalog, &run).context("download run failed")?;

    println!();
    println!("Summary");
    println!("=======");
    println!("  Skipped:    {}", report.skipped());
    println!("  Downloaded: {}", report.succeeded());
    println!("  Failed:     {}", report.failed_count());
    println!("  Bytes:      {}", report.metrics.bytes_downloaded);
    println!("  Time:       {:.2?}", report.duration);

    match &report.report_path {
        Some(path) => {
            println!("❌ Failed resources logged in {}", path.display());
            Ok(ExitCode::from(EXIT_PARTIAL_FAILURE))
        }
        None => {
            println!("✅ All resources downloaded and verified");
            Ok(ExitCode::SUCCESS)
        }
    }
}
