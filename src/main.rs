//! backstored — backup store daemon.
//!
//! One invocation, two processes: the server role accepts client
//! connections, the housekeeping role (spawned once, flagged with
//! `--housekeeping`) runs periodic account maintenance and obeys the
//! control channel on its stdin.

use std::path::PathBuf;

use clap::Parser;

use backstore::config::load_config;
use backstore::daemon::{
    ignore_external_signals, AccountSweep, ControlReceiver, Daemon, HousekeepingLoop,
};
use backstore::observability::init_logging;

#[derive(Debug, Parser)]
#[command(name = "backstored", about = "Backup store daemon")]
struct Cli {
    /// Path to the daemon configuration file.
    #[arg(short, long, default_value = "/etc/backstore/backstored.toml")]
    config: PathBuf,

    /// Run as the housekeeping role (internal; set by the server role).
    #[arg(long, hide = true)]
    housekeeping: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;

    if cli.housekeeping {
        tracing::info!("backstored housekeeping role starting");
        ignore_external_signals()?;

        let control = ControlReceiver::new(tokio::io::stdin());
        let task = AccountSweep::new(cli.config, config.clone());
        HousekeepingLoop::new(
            control,
            task,
            config.housekeeping.interval(),
            config.housekeeping.poll(),
        )
        .run()
        .await?;

        tracing::info!("Housekeeping role exiting");
        return Ok(());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        handshake_timeout_secs = config.timeouts.handshake_secs,
        "backstored server role starting"
    );

    let mut daemon = Daemon::new(cli.config, config);
    daemon.run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
