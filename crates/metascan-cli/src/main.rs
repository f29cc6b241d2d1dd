//! Metascan CLI - index class metadata from directories and jars.
//!
//! Scans compiled classes into subtype and annotation indexes, saves them,
//! and answers queries against saved indexes.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

mod commands;
mod config;

use commands::{config as config_cmd, query, scan, stats};

/// Metascan CLI - Index class hierarchies and annotations.
///
/// Run `metascan scan <locations>` to build an index, then `metascan query`
/// against the saved file.
#[derive(Parser, Debug)]
#[command(
    name = "metascan",
    author,
    version,
    about = "Metascan: index class hierarchies and annotations",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Settings file to use instead of the user config file.
    #[arg(long, global = true, env = "METASCAN_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan class directories, jars or class files into an index.
    Scan(scan::ScanArgs),

    /// Look up values in a saved index.
    Query {
        /// Saved index file.
        file: PathBuf,

        /// Index name (e.g. SubTypes, TypeAnnotations).
        scanner: String,

        /// Key to look up.
        key: String,

        /// Follow discovered values until no new ones appear.
        #[arg(short, long, conflicts_with = "reverse")]
        transitive: bool,

        /// List the keys that hold KEY as a value.
        #[arg(short, long)]
        reverse: bool,

        /// Format of the saved file: xml or json (defaults to the file extension).
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Show counts for a saved index.
    Stats {
        /// Saved index file.
        file: PathBuf,

        /// Format of the saved file: xml or json (defaults to the file extension).
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Manage persistent settings.
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Settings subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current settings.
    Show,

    /// Set a settings value.
    Set {
        /// Settings key.
        key: String,
        /// Settings value (comma separated for lists).
        value: String,
    },

    /// Get a settings value.
    Get {
        /// Settings key.
        key: String,
    },

    /// Reset one key, or all settings, to defaults.
    Reset {
        /// Settings key to reset.
        key: Option<String>,
    },

    /// Show path to settings file.
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let explicit_settings = cli.settings.as_deref();
    let mut settings = config::load(explicit_settings)?;

    match cli.command {
        Commands::Scan(args) => {
            scan::execute(&settings, &args, cli.quiet)?;
        }

        Commands::Query {
            file,
            scanner,
            key,
            transitive,
            reverse,
            format,
        } => {
            let mode = query::QueryMode::from_flags(transitive, reverse);
            query::execute(&settings, &file, format.as_deref(), &scanner, &key, mode)?;
        }

        Commands::Stats { file, format } => {
            stats::execute(&settings, &file, format.as_deref())?;
        }

        Commands::Config(config_cmd_inner) => match config_cmd_inner {
            ConfigCommands::Show => {
                config_cmd::show(&settings, explicit_settings)?;
            }
            ConfigCommands::Set { key, value } => {
                config_cmd::set(&mut settings, explicit_settings, &key, &value)?;
            }
            ConfigCommands::Get { key } => {
                config_cmd::get(&settings, &key)?;
            }
            ConfigCommands::Reset { key } => {
                config_cmd::reset(&mut settings, explicit_settings, key.as_deref())?;
            }
            ConfigCommands::Path => match config::settings_path(explicit_settings) {
                Some(path) => println!("{}", path.display()),
                None => println!("(no settings file path available)"),
            },
        },
    }

    Ok(())
}
