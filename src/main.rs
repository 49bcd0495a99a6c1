use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use assistant_relay::chat::run_terminal_chat;
use assistant_relay::config::RemoteArgs;
use assistant_relay::web_server::{self, AppState};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the chat page and the /send-message endpoint.
    Serve {
        #[command(flatten)]
        remote: RemoteArgs,
        #[arg(long, env = "PORT", default_value_t = 3000, help = "Port for the web server.")]
        port: u16,
        #[arg(long, default_value = "static", help = "Directory holding the page assets.")]
        static_dir: PathBuf,
    },
    /// Chat with the assistant in the terminal.
    Chat {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Send a single message and print the reply.
    Ask {
        #[command(flatten)]
        remote: RemoteArgs,
        /// The message to send.
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (OPENAI_API_KEY, ASSISTANT_ID, ...)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g., RUST_LOG=info,assistant_relay=debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            remote,
            port,
            static_dir,
        } => {
            info!("Starting assistant relay on port {}...", port);
            let chat = Arc::new(remote.chat_service().context("Invalid configuration")?);
            let state = AppState::new(chat, &remote.assistant_name)?;

            let mut web_server_handle =
                tokio::spawn(async move { web_server::start_web_server(port, state, static_dir).await });

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, shutting down...");
                    web_server_handle.abort();
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(Ok(())) => info!("Web server stopped."),
                        Ok(Err(e)) => {
                            error!("Web server failed: {:?}", e);
                            return Err(e);
                        }
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }
            info!("Shutdown complete.");
        }
        Commands::Chat { remote } => {
            let chat = remote.chat_service().context("Invalid configuration")?;
            run_terminal_chat(&chat, &remote.assistant_name, tokio::io::stdin(), tokio::io::stdout())
                .await
                .context("Chat session failed")?;
        }
        Commands::Ask { remote, message } => {
            let chat = remote.chat_service().context("Invalid configuration")?;
            let reply = chat
                .send(&message)
                .await
                .context("Failed to get a reply from the assistant")?;
            println!("{}", reply);
        }
    }

    Ok(())
}
