//! PXE Boot Daemon
//!
//! Runs the DHCP, TFTP and HTTP boot services until Ctrl-C, then shuts
//! them down together. Exits non-zero if any service failed.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use pxe_server::PxeServer;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: &Cli) -> Result<()> {
    info!("Starting PXE boot daemon");

    let config = cli.to_config().context("unable to load configuration")?;

    info!("Configuration:");
    info!("  Interface: {}", config.dhcp.interface.as_deref().unwrap_or("auto (listen address or sole interface)"));
    info!("  DHCP: {}", config.dhcp.listen);
    info!("  TFTP: {}", config.tftp.listen);
    if config.http.enabled {
        info!("  HTTP: {} ({})", config.http.listen, config.http.root_dir.display());
    }
    info!("  PXE boot file: {}", config.dhcp.pxe_boot_file);
    info!("  iPXE boot file: {}", config.dhcp.ipxe_boot_file);
    if let Some(addr) = config.dhcp.offer_address {
        info!("  Offered address: {addr}");
    }

    let server = Arc::new(PxeServer::new(config).context("invalid configuration")?);

    let signal_server = Arc::clone(&server);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C");
                signal_server.shutdown();
            }
            Err(e) => error!(error = %e, "Unable to listen for Ctrl-C"),
        }
    });

    server.start().await.context("PXE boot server failed")?;
    info!("PXE boot daemon stopped");
    Ok(())
}
