/// Version injected at compile time via GCP_DISCOVERY_VERSION env var (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("GCP_DISCOVERY_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gcp_discovery::adapter::{AdapterHost, Cache};
use gcp_discovery::config::Config;
use gcp_discovery::gcp::client::GcpClient;
use gcp_discovery::gcp::http::format_gcp_error;
use gcp_discovery::model::Query;
use gcp_discovery::resource::build_adapters;
use serde::Serialize;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

/// Discover GCP resources and their relationships
#[derive(Parser, Debug)]
#[command(name = "gcp-discovery", version = VERSION, about, long_about = None)]
struct Args {
    /// GCP project to use
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Region to serve (repeatable)
    #[arg(short, long = "region", global = true)]
    regions: Vec<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    /// Output format for items
    #[arg(short, long, value_enum, default_value = "json", global = true)]
    output: OutputFormat,

    /// Skip the cache lookup (results are still cached)
    #[arg(long, global = true)]
    ignore_cache: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show every adapter with its capabilities and scopes
    Adapters,
    /// Get one item by its unique attribute
    Get {
        #[arg(value_name = "TYPE")]
        item_type: String,
        scope: String,
        query: String,
    },
    /// List every item of a type in a scope
    List {
        #[arg(value_name = "TYPE")]
        item_type: String,
        scope: String,
    },
    /// Search items of a type in a scope
    Search {
        #[arg(value_name = "TYPE")]
        item_type: String,
        scope: String,
        query: String,
    },
    /// Manage the persisted configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the persisted configuration
    Show,
    /// Set the default project
    SetProject { project_id: String },
    /// Add a region to serve
    AddRegion { region: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// File logging; `RUST_LOG` takes precedence over `--log-level` when set
fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = match (std::env::var("RUST_LOG").ok(), level.to_tracing_level()) {
        (Some(directives), _) => EnvFilter::new(directives),
        (None, Some(tracing_level)) => EnvFilter::default().add_directive(LevelFilter::from_level(tracing_level).into()),
        (None, None) => return Ok(None),
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("gcp-discovery {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("gcp-discovery").join("gcp-discovery.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".gcp-discovery").join("gcp-discovery.log");
    }
    PathBuf::from("gcp-discovery.log")
}

fn print<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn run_config(action: ConfigCommand, mut config: Config, format: OutputFormat) -> Result<()> {
    match action {
        ConfigCommand::Show => print(&config, format),
        ConfigCommand::SetProject { project_id } => {
            config.set_project(&project_id)?;
            println!("Project set to {}", project_id);
            Ok(())
        },
        ConfigCommand::AddRegion { region } => {
            config.add_region(&region)?;
            println!("Regions: {}", config.regions.join(", "));
            Ok(())
        },
    }
}

async fn build_host(project: Option<&str>, regions: &[String], config: &Config) -> Result<AdapterHost> {
    let project = config
        .effective_project(project)
        .context("No GCP project configured. Set GOOGLE_CLOUD_PROJECT or use --project flag")?;
    let regions = config.effective_regions(regions);
    tracing::info!("Using project: {}, regions: {:?}", project, regions);

    let client = GcpClient::new().await?;
    let cache = Cache::new();

    let settings = config.discovery_settings(&project, regions);
    let mut host = AdapterHost::new();
    host.add_adapters(build_adapters(&client, &settings, &cache))?;
    Ok(host)
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        project,
        regions,
        log_level,
        output,
        ignore_cache,
        command,
    } = Args::parse();

    let log_guard = setup_logging(log_level)?;

    let config = Config::load();

    let query = match command {
        Command::Config { action } => return run_config(action, config, output),
        Command::Adapters => None,
        Command::Get {
            item_type,
            scope,
            query,
        } => Some(Query::get(item_type, query, scope)),
        Command::List { item_type, scope } => Some(Query::list(item_type, scope)),
        Command::Search {
            item_type,
            scope,
            query,
        } => Some(Query::search(item_type, query, scope)),
    };

    let host = build_host(project.as_deref(), &regions, &config)
        .await
        .map_err(|e| {
            tracing::error!("Initialization failed: {:#}", e);
            anyhow::anyhow!(format_gcp_error(&e))
        })?;

    let Some(query) = query else {
        return print(&host.metadata(), output);
    };

    match host.execute(&query, ignore_cache).await {
        Ok(items) => print(&items, output),
        Err(err) => {
            tracing::error!("{} failed: {}", query, err);
            eprintln!("Error: {}", err);
            if let Some(source) = &err.source_name {
                eprintln!("  source: {}", source);
            }
            // Flush the log writer before exiting
            drop(log_guard);
            std::process::exit(1);
        },
    }
}
