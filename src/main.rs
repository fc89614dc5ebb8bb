use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use stockchat::{constants, inventory, web};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the inventory assistant web server.
    Serve {
        #[arg(long, default_value_t = 9900, help = "Port for the web server.")]
        port: u16,
        #[arg(
            long,
            default_value = "inventory_data.csv",
            help = "Path to the inventory CSV file."
        )]
        inventory: PathBuf,
        #[arg(long, help = "Timeout in seconds for outbound model calls (unbounded if unset).")]
        timeout_secs: Option<u64>,
        #[arg(long, help = "Cap on inventory rows included in the grounding context.")]
        max_context_rows: Option<usize>,
    },
}

// The main entry point of the application, using tokio's async runtime
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing (logging) subscriber
    // Reads log level from RUST_LOG environment variable (e.g., RUST_LOG=info,stockchat=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, inventory: inventory_path, timeout_secs, max_context_rows } => {
            info!("Starting inventory assistant on port {}...", port);

            // Load the inventory and freeze the grounding context before any
            // session can exist. A missing or malformed file is fatal.
            let rows = inventory::load_inventory(&inventory_path)
                .context("Failed to load inventory data")?;
            info!(rows = rows.len(), "Loaded inventory table");

            let context_blob = inventory::build_context(&rows, max_context_rows);
            let persona = inventory::persona_instruction(&context_blob);

            let state = web::AppState::new(
                persona,
                constants::GEMINI_BASE_URL.clone(),
                constants::GEMINI_MODEL.clone(),
                timeout_secs.map(Duration::from_secs),
            )
            .context("Failed to initialize application state")?;

            // Start the web server in a separate asynchronous task
            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web::start_web_server(state, port).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            // Keep the main task alive until Ctrl-C or server exit
            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, initiating shutdown...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                info!("Aborting web server task...");
                web_server_handle.abort();
            }
            info!("Shutdown complete.");
        }
    }

    Ok(())
}
