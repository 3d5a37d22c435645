mod commands;
mod utils;

use clap::{Parser, Subcommand};
use hciflow_cloud::EntityKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hciflow")]
#[command(about = "Declarative reconciliation for HCI cloud environments", long_about = None)]
struct Cli {
    /// Config file (default: HCIFLOW_CONFIG_PATH, ./hciflow.yaml, ~/.config/hciflow/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the configuration and that the API is reachable
    Check {
        /// Also validate this manifest
        #[arg(short = 'f', long = "file")]
        manifest: Option<PathBuf>,
    },
    /// Show what apply would do
    Plan {
        /// Manifest of declared entities
        #[arg(short = 'f', long = "file", env = "HCIFLOW_MANIFEST")]
        manifest: PathBuf,
    },
    /// Bring every declared entity to its declared state
    Apply {
        /// Manifest of declared entities
        #[arg(short = 'f', long = "file", env = "HCIFLOW_MANIFEST")]
        manifest: PathBuf,
    },
    /// Read one entity and print its observed state as JSON
    Read {
        /// Entity kind (vpc, network, volume, ...)
        kind: EntityKind,
        /// Remote id
        id: String,
        /// Environment the entity lives in (not needed for environments)
        #[arg(short, long, env = "HCI_ENVIRONMENT_ID")]
        environment_id: Option<String>,
    },
    /// Delete every declared entity that has an id
    Destroy {
        /// Manifest of declared entities
        #[arg(short = 'f', long = "file", env = "HCIFLOW_MANIFEST")]
        manifest: PathBuf,
        /// Run without confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable for `read`
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    // Version needs no configuration
    if matches!(cli.command, Commands::Version) {
        println!("hciflow {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = utils::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Check { manifest } => {
            commands::check::handle(&config, manifest.as_deref()).await?;
        }
        Commands::Plan { manifest } => {
            commands::plan::handle(&config, &manifest).await?;
        }
        Commands::Apply { manifest } => {
            commands::apply::handle(&config, &manifest).await?;
        }
        Commands::Read {
            kind,
            id,
            environment_id,
        } => {
            commands::read::handle(&config, kind, &id, environment_id.as_deref()).await?;
        }
        Commands::Destroy { manifest, yes } => {
            commands::destroy::handle(&config, &manifest, yes).await?;
        }
        Commands::Version => {
            unreachable!("Version is handled before config loading");
        }
    }

    Ok(())
}
