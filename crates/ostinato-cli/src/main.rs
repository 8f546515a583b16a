use anyhow::Result;
use clap::Parser;
use ostinato_etl::{Config, LoggingConfig};
use ostinato_search::ScoreMode;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "ostinato", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the metadata database (default: ~/.local/share/ostinato/ostinato.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Path to the similarity index (default: ~/.local/share/ostinato/segments.index.json)
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Build the similarity index from a description corpus
    ///
    /// Reads a CSV with `id` and `description` columns, embeds every
    /// description, and writes the index atomically. An index that already
    /// matches the corpus and embedding provider is left alone unless
    /// --force is given.
    Build {
        /// Corpus CSV (overrides `corpus_path` from the config)
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Rebuild even if the index is up to date
        #[arg(long)]
        force: bool,
    },
    /// Find the segments whose descriptions best match a text query
    ///
    /// Each result carries the similarity score and description, joined
    /// with segment metadata (genre, instrument, role, key, tempo) and,
    /// when the MIDI file can be found, its duration, tempo, and
    /// instruments. Missing metadata or unreadable MIDI files are reported
    /// per result and never fail the query.
    Search {
        /// Free-text query, e.g. "a quiet piano piece"
        query: String,

        /// Number of results (default: `[query] top_k`)
        #[arg(short = 'k', long, allow_negative_numbers = true)]
        top_k: Option<i64>,

        /// Similarity conversion: legacy or cosine
        #[arg(long)]
        score_mode: Option<ScoreMode>,

        /// MIDI tree root (overrides `midi_root`)
        #[arg(long)]
        midi_root: Option<PathBuf>,

        /// Join against this metadata CSV instead of the database
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a ComMU metadata CSV into the database
    Import {
        /// Metadata CSV (overrides `metadata_path`)
        path: Option<PathBuf>,
    },
    /// Run the import and index stages as one pipeline
    Ingest {
        /// Rebuild the index even if it is up to date
        #[arg(long)]
        force: bool,
    },
    /// Show duration, tempo, and instruments of a MIDI file
    Inspect {
        /// Path to the .mid file
        path: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Walk the MIDI tree and report what it holds
    Scan {
        /// MIDI tree root (overrides `midi_root`)
        root: Option<PathBuf>,

        /// Report files with no row in the metadata database
        #[arg(long)]
        check: bool,
    },
    /// Show database and index status
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print one value, or the whole config file
    Get {
        /// Dotted key, e.g. `query.top_k`
        key: Option<String>,
    },
    /// Set a value in the config file
    Set {
        /// Dotted key, e.g. `embedding.provider`
        key: String,
        value: String,
    },
    /// Print the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file with defaults
    Init,
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(logging.coloured)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_with_overrides(cli.db, cli.index)?;
    init_logging(&config.logging, cli.verbose);

    match cli.command {
        Commands::Build { corpus, force } => {
            commands::run_build(&config, corpus, force).await?;
        }
        Commands::Search {
            query,
            top_k,
            score_mode,
            midi_root,
            metadata,
            json,
        } => {
            let args = commands::SearchArgs {
                query,
                top_k,
                score_mode,
                midi_root,
                metadata,
                json,
            };
            commands::run_search(&config, args).await?;
        }
        Commands::Import { path } => {
            commands::run_import(&config, path)?;
        }
        Commands::Ingest { force } => {
            commands::run_ingest(&config, force).await?;
        }
        Commands::Inspect { path, json } => {
            commands::run_inspect(&path, json)?;
        }
        Commands::Scan { root, check } => {
            commands::run_scan(&config, root, check)?;
        }
        Commands::Status => {
            commands::show_status(&config)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show_config(&config)?,
            ConfigAction::Get { key } => commands::config::get_config(&config, key)?,
            ConfigAction::Set { key, value } => commands::config::set_config(&key, &value)?,
            ConfigAction::Path => commands::config::show_path()?,
            ConfigAction::Example => commands::config::show_example()?,
            ConfigAction::Init => commands::config::init_config()?,
        },
    }

    Ok(())
}
