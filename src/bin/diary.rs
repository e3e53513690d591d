//! Diary server binary
//!
//! # Examples
//!
//! ```bash
//! # Start the HTTP API
//! diary serve --port 8080
//!
//! # Write an entry directly through the storage layer
//! diary entries add --user u1 --date 2020-01-01 --rating 4 --notes "good day"
//!
//! # List a user's entries
//! diary entries list --user u1
//! ```

use clap::{Args, Parser, Subcommand};
use diary::config::Settings;
use diary::server::handlers::{entries_table, Entry, SaveEntryInput, ENTRIES_TABLE};
use diary::server::{start_server, AppState};
use diary::telemetry::{self, LogOptions};
use diary::Scalar;
use std::path::PathBuf;
use tracing::info;

/// Diary - journaling backend
#[derive(Parser, Debug)]
#[command(name = "diary")]
#[command(version = diary::VERSION)]
#[command(about = "Journaling backend over DynamoDB, local files or memory", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML)
    #[arg(short, long, global = true, env = "DIARY_CONFIG")]
    config: Option<String>,

    /// Write a daily rolling log file to this directory
    #[arg(long, global = true, env = "DIARY_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log level (debug, info, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),

    /// Read and write entries directly
    Entries {
        #[command(subcommand)]
        command: EntriesCommands,
    },

    /// Show version
    Version,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// HTTP bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// HTTP port
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum EntriesCommands {
    /// Save an entry
    Add {
        /// Owning user id
        #[arg(long)]
        user: String,
        /// Entry date
        #[arg(long)]
        date: String,
        /// Rating out of five
        #[arg(long)]
        rating: i64,
        #[arg(long)]
        notes: Option<String>,
    },

    /// List a user's entries
    List {
        /// Owning user id
        #[arg(long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        settings.log_level = level.clone();
    }

    telemetry::init(&LogOptions {
        level: settings.log_level.clone(),
        log_dir: cli.log_dir.clone(),
        ansi: !cli.no_color,
    })?;

    match cli.command {
        Commands::Serve(args) => serve_command(settings, args).await,
        Commands::Entries { command } => entries_command(settings, command).await,
        Commands::Version => {
            println!("diary {}", diary::VERSION);
            Ok(())
        }
    }
}

async fn serve_command(settings: Settings, args: ServeArgs) -> anyhow::Result<()> {
    info!(version = %diary::VERSION, "diary starting");

    let mut server_config = settings.server.server_config();
    if let Some(bind) = args.bind {
        server_config.http_addr = bind;
    }
    if let Some(port) = args.port {
        server_config.http_port = port;
    }

    let storage = settings.storage_client().await?;
    info!(engine = ?settings.storage.engine, "Storage initialized");

    let mut state =
        AppState::new(storage).with_default_user_id(settings.server.default_user_id.clone());
    if let Some(auth) = settings.auth.client()? {
        state = state.with_auth(auth);
    }

    start_server(server_config, state).await
}

async fn entries_command(settings: Settings, command: EntriesCommands) -> anyhow::Result<()> {
    let storage = settings.storage_client().await?;

    match command {
        EntriesCommands::Add {
            user,
            date,
            rating,
            notes,
        } => {
            let input = SaveEntryInput {
                date,
                notes,
                rating_out_of_five: rating,
            };
            let stored = storage.add_item(input.into_item(user), &entries_table()).await?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        EntriesCommands::List { user } => {
            let items = match storage
                .get_items("userId", &Scalar::from(user), ENTRIES_TABLE)
                .await
            {
                Ok(items) => items,
                Err(e) if e.is_missing_table() => Vec::new(),
                Err(e) => return Err(e.into()),
            };
            let entries: Vec<Entry> = items.iter().filter_map(Entry::from_item).collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}
