//! Neutro CLI — the main entry point.
//!
//! Commands:
//! - `init`      — Create the config directory and a default config.toml
//! - `chat`      — Interactive or single-message chat with a persona
//! - `serve`     — Start the HTTP gateway
//! - `config`    — Show, locate or validate the configuration
//! - `sessions`  — Inspect saved chat sessions

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "neutro",
    about = "Neutro — finance assistant and English tutor chatbots",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config directory and default config file
    Init,

    /// Chat with a persona
    Chat {
        /// Persona to talk to (e.g. finance, tutor)
        #[arg(short, long)]
        persona: Option<String>,

        /// Ledger user whose figures the finance persona reads
        #[arg(short, long)]
        user: Option<String>,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Ledger JSON export (overrides the configured path)
        #[arg(long)]
        ledger: Option<std::path::PathBuf>,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Saved session management
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (credentials redacted)
    Show,
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
}

#[derive(Subcommand)]
enum SessionsAction {
    /// List saved sessions, newest first
    List,
    /// Print the messages of one session
    Show { id: String },
    /// Delete one session
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Chat {
            persona,
            user,
            message,
            ledger,
        } => commands::chat::run(persona, user, message, ledger).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
        Commands::Sessions { action } => match action {
            SessionsAction::List => commands::sessions::list().await?,
            SessionsAction::Show { id } => commands::sessions::show(&id).await?,
            SessionsAction::Delete { id } => commands::sessions::delete(&id).await?,
        },
    }

    Ok(())
}
