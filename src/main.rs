//! Vehicle gateway entry point.
//!
//! Wires the collector to its three supervised sources and two forwarders,
//! then runs until Ctrl-C. The ECU and GPS adapters take their vendor
//! drivers through injected connect factories; a build without those driver
//! crates keeps the sources supervised (they retry like any unavailable
//! device) while CAN and the UDP uplink run normally.

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vgw::collector::Collector;
use vgw::config::Config;
use vgw::core::error::GatewayError;
use vgw::core::retry::{supervise, Retryable, RETRY_BACKOFF};
use vgw::forward::{CanSpeedForwarder, UdpForwarder};
use vgw::sources::canbus::{CanConnectFn, CanSource};
use vgw::sources::ecu::{EcuConnectFn, EcuSource};
use vgw::sources::gps::{GpsConnectFn, GpsSource};

#[derive(Parser, Debug)]
#[command(name = "vgw", version, about = "Vehicle telemetry gateway")]
struct Args {
    /// Configuration file path
    #[arg(default_value = "vgw.toml")]
    config: PathBuf,

    /// Print each telemetry change to stdout
    #[arg(long)]
    print_telemetry: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> vgw::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = Config::load(&args.config)?;
    info!(config = %args.config.display(), "configuration loaded");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (mut collector, intake) = Collector::new();

    let can_source = CanSource::new(&config.devices.can, can_connect(), intake.can);
    collector.add_forwarder(Box::new(CanSpeedForwarder::new(can_source.connection())));

    let (udp, pump) = UdpForwarder::connect(&config.udp)?;
    collector.add_forwarder(Box::new(udp));

    let ecu_source = EcuSource::new(&config.devices.ecu, ecu_connect(), intake.ecu);
    let gps_source = GpsSource::new(&config.devices.gps, gps_connect(), intake.gps);

    let mut workers = vec![
        spawn_supervisor(can_source, shutdown_rx.clone()),
        spawn_supervisor(ecu_source, shutdown_rx.clone()),
        spawn_supervisor(gps_source, shutdown_rx.clone()),
    ];

    {
        let shutdown = shutdown_rx.clone();
        workers.push(tokio::spawn(async move {
            let err = pump.run(shutdown).await;
            info!(%err, "udp pipeline done");
        }));
    }

    {
        let shutdown = shutdown_rx.clone();
        let print_telemetry = args.print_telemetry;
        workers.push(tokio::spawn(async move {
            run_collector(collector, shutdown, print_telemetry).await;
        }));
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    let _ = shutdown_tx.send(true);
    for worker in workers {
        let _ = worker.await;
    }
    Ok(())
}

fn spawn_supervisor<R>(
    mut source: R,
    shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()>
where
    R: Retryable + 'static,
{
    tokio::spawn(async move {
        let err = supervise(&mut source, shutdown, RETRY_BACKOFF).await;
        info!(source = source.name(), %err, "supervisor done");
    })
}

async fn run_collector(
    mut collector: Collector,
    mut shutdown: watch::Receiver<bool>,
    print_telemetry: bool,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            polled = collector.poll_once() => match polled {
                Some(true) => {
                    if print_telemetry {
                        println!("{:?}", collector.current());
                    }
                    collector.notify_forwarders().await;
                }
                Some(false) => {}
                None => return,
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn can_connect() -> CanConnectFn {
    Box::new(vgw::can::connection::Connection::open)
}

#[cfg(not(target_os = "linux"))]
fn can_connect() -> CanConnectFn {
    Box::new(|_| Err(GatewayError::connection("SocketCAN requires Linux")))
}

fn ecu_connect() -> EcuConnectFn {
    Box::new(|device| {
        Err(GatewayError::connection(format!(
            "no diagnostic-link driver in this build for {device}"
        )))
    })
}

fn gps_connect() -> GpsConnectFn {
    Box::new(|device| {
        Err(GatewayError::connection(format!(
            "no receiver driver in this build for {device}"
        )))
    })
}
