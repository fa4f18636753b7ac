//! campus-push - web push notification server for student devices.

use anyhow::{Context, Result};
use mimalloc::MiMalloc;

/// Global allocator; mimalloc performs better than the system allocator
/// under multi-threaded load.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use campus_push::{server, Config, VapidKeyPair};
use clap::{Parser, Subcommand};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "campus-push")]
#[command(version = VERSION)]
#[command(about = "Targeted web push notifications for student devices")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides config and CAMPUS_PUSH_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate a new VAPID key pair and print it as environment lines
    GenerateVapidKeys,
    /// Print the effective configuration (secrets excluded)
    Config {
        /// Also write it to config.json so env overrides become the file defaults
        #[arg(long)]
        write: bool,
    },
}

fn init_logging() -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();

    if let Ok(path) = std::env::var("CAMPUS_PUSH_LOG_FILE") {
        let log_file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create log file at {path}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }

    builder.init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let mut config = Config::load()?;
            if let Some(port) = port {
                config.port = port;
            }
            log::info!(
                "[Server] campus-push {} starting ({})",
                VERSION,
                campus_push::env::Environment::current()
            );
            server::serve(&config).await?;
        }
        Commands::GenerateVapidKeys => {
            let keys = VapidKeyPair::generate();
            let (public_key, private_key) = keys.export_base64url();
            println!("VAPID_PUBLIC_KEY={public_key}");
            println!("VAPID_PRIVATE_KEY={private_key}");
        }
        Commands::Config { write } => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            if write {
                let path = Config::config_path()?;
                config.save_to(&path)?;
                log::info!("[Config] Wrote {}", path.display());
            }
        }
    }

    Ok(())
}
