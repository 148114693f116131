mod cmd;
mod output;
mod stream;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cmd::sets::SetsSubcommand;
use snipcat_core::{config::StoreConfig, snippet::DEFAULT_SCHEMA_VERSION};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "snipcat",
    about = "Deduplicated catalog of instruction snippets and instruction sets",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output summaries as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Not accepted; the catalog location comes from SNIPCAT_DB_PATH
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and list instruction sets
    Sets {
        #[command(subcommand)]
        subcommand: SetsSubcommand,
    },

    /// Scan for snippet files and stream candidate records
    Check {
        /// Directory to scan
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Read slug → path pairs from a JSON index file instead of front matter
        #[arg(long, value_name = "FILE")]
        index: Option<PathBuf>,
        /// Write records here ("-" for stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Tag candidate records as uploadable or ambiguous using the snippet ledger
    Classify {
        /// Read candidates from here ("-" for stdin)
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Turn candidate records into instruction-snippet records
    Emit {
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Schema version used when neither front matter nor the record sets one
        #[arg(long, default_value = DEFAULT_SCHEMA_VERSION)]
        default_schema_version: String,
    },

    /// Record emitted snippet records in the ledger
    Record {
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,
    },

    /// Print the identity bound to a slug, minting one if needed
    Resolve { slug: String },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let db = cli.db.as_deref();
    // Only commands that open the catalog need to locate it.
    let store = || -> anyhow::Result<StoreConfig> {
        let config = StoreConfig::resolve(db).context("cannot locate the catalog")?;
        tracing::debug!(db = %config.db_path.display(), "catalog location");
        Ok(config)
    };

    match cli.command {
        Commands::Sets { subcommand } => cmd::sets::run(&store()?, subcommand, cli.json),
        Commands::Check {
            root,
            index,
            output,
        } => {
            StoreConfig::refuse_explicit(db)?;
            cmd::check::run(&root, index.as_deref(), output.as_deref(), cli.json)
        }
        Commands::Classify { input, output } => {
            cmd::classify::run(&store()?, input.as_deref(), output.as_deref(), cli.json)
        }
        Commands::Emit {
            input,
            output,
            default_schema_version,
        } => {
            StoreConfig::refuse_explicit(db)?;
            cmd::emit::run(
                input.as_deref(),
                output.as_deref(),
                &default_schema_version,
                cli.json,
            )
        }
        Commands::Record { input } => cmd::record::run(&store()?, input.as_deref(), cli.json),
        Commands::Resolve { slug } => cmd::resolve::run(&store()?, &slug, cli.json),
    }
}
