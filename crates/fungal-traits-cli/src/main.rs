use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fungal_traits_core::reference::SporeType;
use fungal_traits_core::taxonomy::Rank;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "fungal-traits")]
#[command(about = "Annotate fungal features with spore volumes and lifestyle traits", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a fungal-traits.toml (default: ./config, then the user config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate a feature taxonomy and write QIIME 2 metadata
    Annotate {
        /// Taxonomy TSV (or a directory holding taxonomy.tsv)
        #[arg(short, long)]
        taxonomy: PathBuf,

        /// Output metadata TSV
        #[arg(short, long)]
        output: PathBuf,

        /// FungalTraits table, overriding the configured one
        #[arg(long)]
        traits: Option<PathBuf>,

        /// Spore size database, overriding the configured one
        #[arg(long)]
        spores: Option<PathBuf>,

        /// Spore types to annotate (comma-separated)
        #[arg(long, value_delimiter = ',')]
        spore_types: Vec<SporeType>,

        /// Ranks consulted after species (comma-separated)
        #[arg(long, value_delimiter = ',')]
        fallback_ranks: Vec<Rank>,

        /// Do not write the <output>.provenance.json sidecar
        #[arg(long, default_value = "false")]
        no_provenance: bool,
    },

    /// Check that a file matches FungalTraitsFormat
    ValidateTraits {
        /// FungalTraits TSV or FungalTraitsDirFmt directory
        path: PathBuf,
    },

    /// Summarize a metadata TSV written by `annotate`
    Inspect {
        /// Metadata TSV
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the plugin's formats, types, actions and citations
    Info {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print citations as BibTeX
    Citations,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Annotate {
            taxonomy,
            output,
            traits,
            spores,
            spore_types,
            fallback_ranks,
            no_provenance,
        } => {
            let args = commands::annotate::AnnotateArgs {
                taxonomy,
                output,
                traits,
                spores,
                spore_types,
                fallback_ranks,
                no_provenance,
            };
            commands::annotate::run(cli.config.as_deref(), args)?;
        }
        Commands::ValidateTraits { path } => {
            commands::validate_traits::run(&path)?;
        }
        Commands::Inspect { path, format } => {
            commands::inspect::run(&path, &format)?;
        }
        Commands::Info { format } => {
            commands::info::run(&format)?;
        }
        Commands::Citations => {
            commands::citations::run();
        }
    }

    Ok(())
}

/// Logs go to stderr so command output on stdout stays clean.
/// Priority: RUST_LOG env var > verbose flag > default (info).
fn init_tracing(verbose: u8) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("fungal_traits_core=info,fungal_traits=info,warn"),
            1 => EnvFilter::new("fungal_traits_core=debug,fungal_traits=debug,info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init()
        .context("failed to set tracing subscriber")?;

    Ok(())
}
