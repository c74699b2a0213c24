use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "WhatsApp to LLM relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Options shared by every service.
#[derive(clap::Args)]
struct ServiceArgs {
    /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
    #[arg(long, short, value_name = "PATH")]
    config: Option<PathBuf>,

    /// HTTP port (overrides config and PORT)
    #[arg(long, short)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the public gateway (health + reverse proxy to the messaging and generation services).
    Gateway(ServiceArgs),

    /// Run the messaging service (WhatsApp webhook verification, ingestion, and reply relay).
    Messaging(ServiceArgs),

    /// Run the generation service (POST /generate against OpenRouter).
    Generation(ServiceArgs),
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(command) => run(command).await,
        None => {
            println!("Run with --help for usage");
            Ok(())
        }
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Version => {
            println!("relay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Gateway(args) => lib::gateway::run_gateway(load(args)?).await,
        Commands::Messaging(args) => lib::relay::run_messaging_service(load(args)?).await,
        Commands::Generation(args) => lib::llm::run_generation_service(load(args)?).await,
    }
}

fn load(args: ServiceArgs) -> anyhow::Result<lib::config::Config> {
    let mut config = lib::config::load_config(args.config)?;
    if let Some(p) = args.port {
        config.server.port = p;
    }
    log::info!("starting on {}", config.server.bind_addr());
    Ok(config)
}
