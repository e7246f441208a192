use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facerec_core::EnrollmentStore;
use facerec_hw::Camera;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod annotate;
mod app;
mod config;
mod menu;
mod preview;
mod session;

use app::App;
use config::Config;
use menu::MenuActions;

#[derive(Parser)]
#[command(name = "facerec", about = "Enroll faces from a webcam and recognize them live")]
struct Cli {
    /// TOML config file (defaults to $FACEREC_CONFIG if set)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive menu (default)
    Menu,
    /// Capture face samples for a user until 'q' is pressed
    Enroll {
        /// Username to add samples to (case-sensitive)
        #[arg(short, long)]
        user: String,
    },
    /// Label faces in the live camera feed
    Recognize,
    /// List enrolled users and their sample counts
    List,
    /// List V4L2 capture devices
    Devices,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration resolved");

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => {
            let mut app = App::open(config)?;
            let stdin = std::io::stdin();
            menu::run_menu(stdin.lock(), &mut std::io::stdout(), &mut app)
                .context("menu I/O failed")?;
        }
        Commands::Enroll { user } => {
            let user = user.trim();
            if user.is_empty() {
                anyhow::bail!("username must not be empty");
            }
            let mut app = App::open(config)?;
            if app.is_enrolled(user) {
                println!("[WARN] User '{user}' already exists. Adding more samples.");
            }
            println!("[INFO] Adding user: {user}. Press 'q' when done.");
            let outcome = app.enroll_session(user)?;
            println!("{}", menu::describe_enroll(user, &outcome));
        }
        Commands::Recognize => {
            let mut app = App::open(config)?;
            println!("[INFO] Starting recognition. Press 'q' to quit.");
            let summary = app.recognize_session()?;
            println!("{}", menu::describe_recognize(&summary));
        }
        Commands::List => {
            let store = EnrollmentStore::load(&config.store_path).with_context(|| {
                format!("loading enrollment store {}", config.store_path.display())
            })?;
            if store.is_empty() {
                println!("No users enrolled ({})", config.store_path.display());
            }
            for user in store.users() {
                println!("{}\t{} samples", user.username, user.signatures.len());
            }
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for dev in devices {
                println!("{}\t{} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
            }
        }
    }

    Ok(())
}
