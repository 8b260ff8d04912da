use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use mcp_gateway::config::{self, schema::log_bodies_from_env};
use mcp_gateway::lifecycle;
use mcp_gateway::observability::{logging, PreviewMode};

#[derive(Parser)]
#[command(name = "mcp-gateway")]
#[command(about = "HTTP gateway in front of MCP servers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway
    Serve {
        #[arg(short, long, default_value = "gateway.yaml")]
        file: PathBuf,
    },
    /// Check a configuration file and print a summary
    Validate {
        #[arg(short, long, default_value = "gateway.yaml")]
        file: PathBuf,
    },
    /// Write a starter configuration
    Init {
        #[arg(short, long, default_value = "gateway.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Serve { file } => {
            let config = config::load_config(&file)?;
            logging::init_logging(&config.gateway.log_level);

            tracing::info!(
                gateway = %config.gateway.name,
                listen_addr = %config.gateway.listen_addr,
                servers = config.servers.len(),
                routes = config.routes.len(),
                require_auth = config.auth.require_auth,
                "Configuration loaded"
            );

            let previews = PreviewMode::from_flag(log_bodies_from_env());
            lifecycle::serve(config, previews).await?;
        }
        Commands::Validate { file } => {
            let config = config::load_config(&file)?;
            println!(
                "valid: gateway={} servers={} routes={} requireAuth={}",
                config.gateway.name,
                config.servers.len(),
                config.routes.len(),
                config.auth.require_auth
            );
        }
        Commands::Init { output, force } => {
            config::write_template(&output, force)?;
            println!("wrote {}", output.display());
        }
    }
    Ok(())
}
