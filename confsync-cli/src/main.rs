//! confsync command-line client
//!
//! Drives the settings coordinator and session resolver against a
//! configured backend and local mirror file.
//!
//! Usage:
//!   confsync --config confsync.json status
//!   confsync set theme '{"primary":"#002776"}'
//!   confsync sign-in admin@escola.com --secret 123456

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use confsync_cli::{render_entries, App, CliConfig, Overrides};
use confsync_types::{ConfigChange, Role, SessionPrincipal, WriteOutcome};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "confsync")]
#[command(about = "Global configuration sync client")]
struct Args {
    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL
    #[arg(long, env = "CONFSYNC_API_URL")]
    api_url: Option<String>,

    /// Backend API key
    #[arg(long, env = "CONFSYNC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Local mirror file
    #[arg(long)]
    mirror: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show connectivity and every mirrored key
    Status,
    /// Print the current value of a key
    Get { key: String },
    /// Write a JSON value under a key
    Set { key: String, value: String },
    /// Print changes as they arrive until interrupted
    Watch {
        /// Only show changes to this key
        #[arg(long)]
        key: Option<String>,
    },
    /// Sign in and print the resolved principal
    SignIn {
        email: String,
        #[arg(long, env = "CONFSYNC_SECRET", hide_env_values = true)]
        secret: String,
    },
    /// Store an account usable for offline sign-in
    SeedAccount {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        role: Role,
        #[arg(long, env = "CONFSYNC_SECRET", hide_env_values = true)]
        secret: String,
        #[arg(long)]
        phone: Option<String>,
        /// Store the account as deactivated
        #[arg(long)]
        inactive: bool,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = CliConfig::load(args.config.as_deref())?;
    config.apply(Overrides {
        api_url: args.api_url,
        api_key: args.api_key,
        mirror_path: args.mirror,
    });

    let app = App::open(&config)?;
    let result = run(&app, args.command).await;
    app.coordinator.stop();
    result
}

async fn run(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Status => {
            let state = app.coordinator.start().await;
            println!("connectivity: {state}");
            let entries = app.coordinator.entries();
            if !entries.is_empty() {
                println!("{}", render_entries(&entries));
            }
        }
        Command::Get { key } => {
            app.coordinator.start().await;
            let Some(value) = app.coordinator.get(&key) else {
                bail!("no value for '{key}'");
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Set { key, value } => {
            let value: serde_json::Value =
                serde_json::from_str(&value).context("value must be valid JSON")?;
            app.coordinator.start().await;
            match app.coordinator.set(&key, value).await? {
                WriteOutcome::Synced => println!("saved"),
                WriteOutcome::SavedLocally => println!("saved locally, not yet synced"),
            }
        }
        Command::Watch { key } => {
            let state = app.coordinator.start().await;
            info!("Watching for changes ({})", state);
            let print = |change: &ConfigChange| {
                if let Ok(line) = serde_json::to_string(change) {
                    println!("{line}");
                }
            };
            let subscription = match key {
                Some(key) => app.coordinator.on_change(key, print),
                None => app.coordinator.on_any_change(print),
            };
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for interrupt")?;
            subscription.unsubscribe();
        }
        Command::SignIn { email, secret } => {
            app.coordinator.start().await;
            let principal = app
                .resolver
                .sign_in(&email, &secret)
                .await
                .context("sign-in failed")?;
            println!("{}", serde_json::to_string_pretty(&*principal)?);
        }
        Command::SeedAccount {
            email,
            name,
            role,
            secret,
            phone,
            inactive,
        } => {
            let mut principal = SessionPrincipal::new(name, email, role).with_active(!inactive);
            if let Some(phone) = phone {
                principal = principal.with_phone(phone);
            }
            let id = principal.id;
            app.resolver.seed_account(principal, &secret)?;
            println!("seeded account {id}");
        }
    }
    Ok(())
}
