mod config;
mod loader;
mod logging;
mod service_file;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::Config;
use service_file::ServiceFile;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (.yaml, .yml or .toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the launchd job dictionary as JSON
    Plist {
        file: PathBuf,
    },
    /// Print the systemd service unit
    Unit {
        file: PathBuf,
    },
    /// Print the systemd timer unit
    Timer {
        file: PathBuf,
    },
    /// Print the cacheable service mapping as JSON
    Dump {
        file: PathBuf,
    },
    /// Print a shell command that runs the service by hand
    Command {
        file: PathBuf,
    },
}

impl Commands {
    fn file(&self) -> &PathBuf {
        match self {
            Commands::Plist { file }
            | Commands::Unit { file }
            | Commands::Timer { file }
            | Commands::Dump { file }
            | Commands::Command { file } => file,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    logging::setup_logging(&config.logging)?;

    let paths = config.local_paths();
    log::debug!("Using prefix {:?} and home {:?}", paths.prefix, paths.home);

    let service_file = ServiceFile::from_file(cli.command.file())?;
    let owner = service_file.owner(&paths);
    let service = service_file.definition(&paths)?.into_service(&owner);
    log::info!("Loaded service definition for {}", service_file.owner.name);

    let output = match cli.command {
        Commands::Plist { .. } => serde_json::to_string_pretty(&service.to_plist()?)?,
        Commands::Unit { .. } => service.to_systemd_unit()?,
        Commands::Timer { .. } => {
            if !service.is_timed()? {
                return Err(anyhow::anyhow!(
                    "{} runs immediately; it has no timer",
                    service_file.owner.name
                ));
            }
            service.to_systemd_timer()?
        }
        Commands::Dump { .. } => serde_json::to_string_pretty(&common::serialize(&service)?)?,
        Commands::Command { .. } => service
            .manual_command()
            .with_context(|| format!("Failed to build command for {}", service_file.owner.name))?,
    };

    println!("{}", output);
    Ok(())
}
