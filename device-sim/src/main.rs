//! Device Simulator process: binds the register-oriented device control
//! protocol server and runs it until interrupted.

use anyhow::Context as _;
use clap::Parser;

/// The device simulator: exposes a register memory map over the regctl
/// wire protocol (spec §4.2, §4.3).
#[derive(Debug, Parser)]
#[command(name = "device-sim", version, about)]
struct Args {
    /// Address to bind the listener on.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind the listener on.
    #[arg(long, default_value_t = 8989)]
    port: u16,

    /// Log level forwarded to `env_logger`'s filter (error, warn, info,
    /// debug, trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .init();

    let addr = format!("{}:{}", args.host, args.port);
    let server = regctl_device::Server::bind(&addr)
        .await
        .with_context(|| format!("failed to bind device simulator on {addr}"))?;

    log::info!("device simulator listening on {}", server.local_addr());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    log::info!("received ctrl-c, shutting down");

    server.stop().await.context("failed to stop device simulator")?;
    Ok(())
}
