use anyhow::Result;
use autokit_bootstrap::{AppConfig, CliArgs};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Autokit host - stands up a module context over configured autoload directories
#[derive(Parser)]
#[command(name = "autokit-host")]
#[command(about = "Autokit host - filesystem module autoloader")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Additional autoload directory (repeatable, appended after configured roots)
    #[arg(short, long)]
    dir: Vec<PathBuf>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, register and bootstrap all non-lazy modules
    Run,
    /// Validate configuration and exit
    Check,
    /// List discovered module descriptors without constructing a context
    List,
    /// Stand up a context and resolve a single module by id
    Get { id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Prepare CLI args that flow into the AppConfig merge logic.
    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        dirs: cli
            .dir
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect(),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (AUTOKIT__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.clone().unwrap_or_default();
    autokit_bootstrap::init_logging(&logging_config, Path::new("."));

    // Print config and exit if requested
    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    // Dispatch subcommands (default: run)
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_host(&config),
        Commands::Check => check_config(&config),
        Commands::List => list_modules(&config),
        Commands::Get { id } => resolve_module(&config, &id),
    }
}

fn autoload_dirs(config: &AppConfig) -> impl Iterator<Item = PathBuf> + '_ {
    config.autoload.dirs.iter().map(PathBuf::from)
}

fn run_host(config: &AppConfig) -> Result<()> {
    tracing::info!("Autokit host starting");
    let context = autokit::run(autoload_dirs(config))?;
    tracing::info!(?context, "non-lazy modules bootstrapped");
    Ok(())
}

fn check_config(config: &AppConfig) -> Result<()> {
    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}

fn list_modules(config: &AppConfig) -> Result<()> {
    let discovery =
        autokit::Discovery::with_dirs(autoload_dirs(config), Arc::new(autokit::FsLoader::new()));
    for descriptor in discovery.discover()? {
        let kind = if !descriptor.needs_bootstrap() {
            "static"
        } else if descriptor.is_lazy() {
            "bootstrap (lazy)"
        } else {
            "bootstrap (eager)"
        };
        println!("{:<32} {}", descriptor.id(), kind);
    }
    Ok(())
}

fn resolve_module(config: &AppConfig, id: &str) -> Result<()> {
    let context = autokit::run(autoload_dirs(config))?;
    let value = context.get_module(id)?;
    match value.downcast::<serde_json::Value>() {
        Ok(manifest) => println!("{}", serde_json::to_string_pretty(manifest.as_ref())?),
        Err(_) => println!("{id}: resolved (opaque value)"),
    }
    Ok(())
}
