//! Strata CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use strata_core::{AbstractionLevel, SymbolKind, SymbolOrigin, SymbolStatus};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use config::StrataConfig;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Component symbol registry with dependency analysis and code generation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ./strata.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Registry database path
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Output directory for generated code
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },
    /// Register symbols from a JSON file holding one draft or an array of drafts
    Import {
        file: PathBuf,

        /// Replace symbols whose id is already registered
        #[arg(long)]
        replace: bool,
    },
    /// List registered symbols, optionally filtered
    List {
        #[arg(long)]
        namespace: Option<String>,

        /// Include nested namespaces
        #[arg(long, requires = "namespace")]
        nested: bool,

        #[arg(long)]
        level: Option<AbstractionLevel>,

        #[arg(long)]
        kind: Option<SymbolKind>,

        #[arg(long)]
        tag: Option<String>,

        #[arg(long)]
        status: Option<SymbolStatus>,

        #[arg(long)]
        origin: Option<SymbolOrigin>,
    },
    /// Show one symbol
    Show { id: String },
    /// Ranked free-text search
    Search { query: String },
    /// Delete one symbol
    Delete { id: String },
    /// Build the dependency graph, or the subgraph around one symbol
    Graph {
        #[arg(long)]
        around: Option<String>,
    },
    /// List dependency cycles
    Cycles,
    /// Print a topological order
    Topo,
    /// Graph statistics
    Stats,
    /// Check the registry for dangling references and structural cycles
    Validate,
    /// Generate code for the given symbols
    Generate {
        ids: Vec<String>,

        /// Generate every registered symbol
        #[arg(long, conflicts_with = "ids")]
        all: bool,

        /// Leave existing generated files in place
        #[arg(long)]
        no_overwrite: bool,

        /// Omit doc comments
        #[arg(long)]
        no_docs: bool,
    },
    /// Render a symbol without writing anything
    Preview { id: String },
    /// Remove every symbol from the registry
    Clear,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("strata={}", log_level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Strata v{}", env!("CARGO_PKG_VERSION"));

    if let Commands::Version = cli.command {
        println!("Strata v{}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = StrataConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }

    let ok = match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            config.validate()?;
            commands::serve(&config).await?;
            true
        }
        Commands::Import { file, replace } => commands::import(&config, &file, replace)?,
        Commands::List {
            namespace,
            nested,
            level,
            kind,
            tag,
            status,
            origin,
        } => {
            let mut filter = match namespace {
                Some(ns) if nested => strata_store::SymbolFilter::namespace_prefix(ns),
                Some(ns) => strata_store::SymbolFilter::namespace(ns),
                None => strata_store::SymbolFilter::default(),
            };
            filter.level = level;
            filter.kind = kind;
            filter.tag = tag;
            filter.status = status;
            filter.origin = origin;
            commands::list(&config, &filter)?
        }
        Commands::Show { id } => commands::show(&config, &id)?,
        Commands::Search { query } => commands::search(&config, &query)?,
        Commands::Delete { id } => commands::delete(&config, &id)?,
        Commands::Graph { around } => commands::graph(&config, around.as_deref())?,
        Commands::Cycles => commands::cycles(&config)?,
        Commands::Topo => commands::topo(&config)?,
        Commands::Stats => commands::stats(&config)?,
        Commands::Validate => commands::validate(&config)?,
        Commands::Generate {
            ids,
            all,
            no_overwrite,
            no_docs,
        } => {
            if no_overwrite {
                config.generation.overwrite_generated = false;
            }
            if no_docs {
                config.generation.include_docs = false;
            }
            commands::generate(&config, &ids, all)?
        }
        Commands::Preview { id } => commands::preview(&config, &id)?,
        Commands::Clear => commands::clear(&config)?,
        Commands::Version => true,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
