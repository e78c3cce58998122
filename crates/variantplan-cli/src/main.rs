//! variantplan CLI tool.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "variantplan")]
#[command(about = "Resolve build-variant declarations into build plans", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a declaration parses
    Validate {
        /// Path to the declaration file
        #[arg(default_value = "variantplan.kdl")]
        path: PathBuf,
    },
    /// Resolve a declaration into a build plan
    Resolve {
        /// Path to the declaration file
        #[arg(default_value = "variantplan.kdl")]
        path: PathBuf,
        /// Values files (.properties or .json), later files win
        #[arg(long = "values", env = "VARIANTPLAN_VALUES", value_delimiter = ',')]
        values: Vec<PathBuf>,
        /// Override a single value
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = commands::resolve::parse_key_value)]
        set: Vec<(String, String)>,
        /// Only print this variant
        #[arg(long)]
        variant: Option<String>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// List the external values a declaration refers to
    Values {
        /// Path to the declaration file
        #[arg(default_value = "variantplan.kdl")]
        path: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
        Commands::Resolve {
            path,
            values,
            set,
            variant,
            format,
        } => {
            let options = commands::resolve::ResolveOptions {
                values,
                overrides: set,
                variant,
                format,
            };
            commands::resolve::run(&path, &options)?;
        }
        Commands::Values { path } => {
            commands::values(&path)?;
        }
    }

    Ok(())
}
