//! lsq: Log Search Query - compile filter conditions into engine queries and lint query trees.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// Environment variable holding the log filter (e.g. `esq=debug`).
const LSQ_LOG_VAR: &str = "LSQ_LOG";

#[derive(Parser)]
#[command(name = "lsq")]
#[command(about = "Log Search Query - compile conditions into search queries and lint them")]
#[command(version)]
struct Cli {
    /// Config file (default: $LSQ_CONFIG or the platform config dir)
    #[arg(long = "config", global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging on stderr
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a condition list into a search request
    #[command(visible_alias = "c")]
    Compile {
        /// CompileInput JSON file (reads stdin if not provided)
        file: Option<PathBuf>,

        /// Field catalog file (.json or .toml, overrides config)
        #[arg(short = 'k', long = "catalog", value_name = "FILE")]
        catalog: Option<PathBuf>,

        /// Result size when the input omits one (overrides config)
        #[arg(short = 's', long = "size", value_name = "N")]
        size: Option<u64>,

        /// Skip linting the compiled request
        #[arg(long = "no-lint")]
        no_lint: bool,

        /// Print JSON on a single line
        #[arg(long = "compact")]
        compact: bool,
    },

    /// Lint a search request document
    #[command(visible_alias = "l")]
    Lint {
        /// Request JSON file (reads stdin if not provided)
        file: Option<PathBuf>,

        /// Field catalog file (.json or .toml, overrides config)
        #[arg(short = 'k', long = "catalog", value_name = "FILE")]
        catalog: Option<PathBuf>,

        /// Fail on warnings too
        #[arg(long = "strict")]
        strict: bool,
    },

    /// Inspect and build field catalogs
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Manage lsq configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List catalog fields
    List {
        /// Glob over field names (e.g., "items.*")
        pattern: Option<String>,

        /// Field catalog file (.json or .toml, overrides config)
        #[arg(short = 'k', long = "catalog", value_name = "FILE")]
        catalog: Option<PathBuf>,
    },

    /// Build a catalog from an index mapping document
    Import {
        /// Mapping JSON file (e.g., the output of GET <index>/_mapping)
        mapping: PathBuf,

        /// Write the catalog here instead of stdout
        #[arg(short = 'o', long = "output", value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(short = 'f', long = "force")]
        force: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("esq=debug,lsq=debug")
    } else {
        EnvFilter::try_from_env(LSQ_LOG_VAR).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Compile { file, catalog, size, no_lint, compact } => {
            let opts = commands::CompileOptions {
                catalog,
                size,
                lint: !no_lint,
                compact,
            };
            commands::compile(config_path, file.as_deref(), &opts)
        }
        Commands::Lint { file, catalog, strict } => {
            commands::lint(config_path, file.as_deref(), catalog.as_deref(), strict)
        }
        Commands::Catalog { action } => match action {
            CatalogAction::List { pattern, catalog } => {
                commands::catalog_list(config_path, catalog.as_deref(), pattern.as_deref())
            }
            CatalogAction::Import { mapping, output } => {
                commands::catalog_import(&mapping, output.as_deref())
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(config_path),
            ConfigAction::Init { force } => commands::config_init(config_path, force),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
