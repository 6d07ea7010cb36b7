//! Pxeforge - PXE/iPXE network-boot provisioning.
//!
//! Takes a declarative list of OS install targets, fetches their ISOs,
//! extracts boot assets via loopback mounts, and renders the boot-loader
//! menus that let a booting machine find them. Also ships the companion
//! per-host config service.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use pxeforge::config::Config;
use pxeforge::mount::LoopMounter;
use pxeforge::provision::{self, RunOptions};
use pxeforge::report::ConsoleReporter;
use pxeforge::{host, menu, server};

#[derive(Parser)]
#[command(name = "pxeforge")]
#[command(about = "PXE/iPXE network-boot provisioning")]
#[command(
    after_help = "QUICK START:\n  pxeforge provision   Download ISOs and extract boot files\n  pxeforge render      Regenerate boot menus only\n  pxeforge serve       Run the per-host config API\n  pxeforge show config Print the loaded configuration"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: directories, downloads, extraction, menus
    Provision {
        /// Re-download ISOs even when already present
        #[arg(long)]
        force: bool,

        /// Per-request download timeout in seconds (default: none)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Regenerate the aggregate boot menus without touching ISOs
    Render,

    /// Run the per-host boot config HTTP service
    Serve {
        /// Listen address
        #[arg(long, default_value = "0.0.0.0:8080")]
        listen: SocketAddr,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show the loaded configuration
    Config,
    /// List provisioned ISO images
    Isos,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let reporter = ConsoleReporter;

    println!("Reading configuration from: {}", cli.config.display());
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Provision { force, timeout } => {
            println!("Found {} targets to process", config.targets.len());
            let options = RunOptions {
                force,
                timeout: timeout.map(Duration::from_secs),
            };
            provision::run(&reporter, &config, &LoopMounter, &options).await?;
            println!("Provisioning complete.");
        }
        Commands::Render => {
            menu::render_menus(&reporter, &config)?;
        }
        Commands::Serve { listen } => {
            server::serve(Arc::new(ConsoleReporter), config, listen).await?;
        }
        Commands::Show { what } => match what {
            ShowTarget::Config => config.print(),
            ShowTarget::Isos => {
                let isos = host::list_isos(&config.iso_images_dir())?;
                if isos.is_empty() {
                    println!("No ISO images provisioned yet.");
                }
                for iso in isos {
                    println!("{}/{}/{}", iso.name, iso.codename, iso.filename);
                }
            }
        },
    }

    Ok(())
}
