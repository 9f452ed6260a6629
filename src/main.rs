//! Graphwire CLI - resolve and validate dependency graph declarations

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use graphwire::output::OutputMode;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "graphwire")]
#[command(version)]
#[command(about = "Resolve binding declarations into validated, ordered dependency graphs")]
#[command(long_about = r#"
Graphwire reads a JSON declaration set (injectables, contributions and graph
specs) and, for every graph in the hierarchy:
  • Aggregates scope contributions (excludes, replacements, ranks)
  • Builds the binding graph, inheriting from parent graphs
  • Reports missing bindings, scope violations and unbreakable cycles
  • Computes an initialization order, sharded for large graphs

Example usage:
  graphwire init
  graphwire check --input declarations.json
  graphwire resolve --input declarations.json --graph AppGraph
  graphwire report shards --input declarations.json --json
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit machine-readable JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file (defaults to ./graphwire.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every graph and print orders and diagnostics
    Resolve {
        /// Declaration set (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Only print this graph
        #[arg(short, long)]
        graph: Option<String>,
    },

    /// Validate only; exits non-zero on any fatal diagnostic
    Check {
        /// Declaration set (JSON)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print a structured report over a resolution run
    Report {
        #[arg(value_enum)]
        kind: ReportKind,

        /// Declaration set (JSON)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Declarations and inputs no root reached
    Unused,
    /// Shard layout per graph
    Shards,
    /// Binding and diagnostic counts per graph
    Summary,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose; logs go to stderr so --json stays clean
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let output_mode = OutputMode::from_flag(cli.json);
    let config = cli.config.as_deref();

    let ok = match cli.command {
        Commands::Resolve { input, graph } => {
            commands::run_resolve(output_mode, config, &input, graph.as_deref())?
        }
        Commands::Check { input } => commands::run_check(output_mode, config, &input)?,
        Commands::Report { kind, input } => commands::run_report(output_mode, config, kind, &input)?,
        Commands::Init { force } => commands::run_init(output_mode, config, force)?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
