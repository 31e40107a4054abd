use clap::{Parser, Subcommand};

use copydesk::client::{ChatClient, ClientConfig};
use copydesk::config::RelayConfig;
use copydesk::server::{self, ServerConfig};
use copydesk::ui;

#[derive(Parser)]
#[command(name = "copydesk", about = "CopyWriter chat relay and terminal client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay server.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:3000")]
        listen: String,
    },
    /// Chat with a running relay from the terminal.
    Chat {
        /// Base URL of the relay.
        #[arg(long, default_value = "http://127.0.0.1:3000", env = "COPYDESK_URL")]
        base_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so the chat client's terminal output stays clean.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { listen } => {
            server::run(ServerConfig { listen }, RelayConfig::from_env()).await
        }
        Command::Chat { base_url } => {
            let client = ChatClient::new(ClientConfig { base_url });
            ui::run_tui(client)
        }
    }
}
