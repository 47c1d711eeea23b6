use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use grid_sync_rs::{
    Event, GridConfig, LinkConfig, MonomeMatrix, OscLink, SessionConfig, SessionHost, WebMonitor,
};

// --- Command Line Arguments ---
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct CliArgs {
    /// Address to receive grid presses on
    #[clap(long, default_value = "127.0.0.1")]
    in_host: String,
    #[clap(long, default_value_t = 8080)]
    in_port: u16,
    /// Address of the grid device
    #[clap(long, default_value = "127.0.0.1")]
    out_host: String,
    #[clap(long, default_value_t = 8000)]
    out_port: u16,
    #[clap(long, default_value = "/ableton")]
    prefix: String,
    #[clap(long, default_value_t = 8)]
    width: u8,
    #[clap(long, default_value_t = 8)]
    height: u8,
    /// Refresh period in milliseconds
    #[clap(long, default_value_t = 60)]
    tick_ms: u64,
    /// JSON session file; a built-in demo set is used when omitted
    #[clap(long)]
    session: Option<PathBuf>,
    /// Serve the web monitor on this port
    #[clap(long)]
    monitor_port: Option<u16>,
    #[clap(long, default_value = "127.0.0.1")]
    monitor_host: String,
    /// Used when RUST_LOG is not set
    #[clap(long, default_value = "info")]
    log_level: String,
}

fn parse_addr(host: &str, port: u16) -> Result<SocketAddr> {
    format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid address {}:{}", host, port))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting grid clip launcher with args: {:?}", args);

    let grid = GridConfig {
        width: args.width,
        height: args.height,
        prefix: args.prefix.clone(),
    };
    grid.validate()?;

    let link_config = LinkConfig {
        listen: parse_addr(&args.in_host, args.in_port)?,
        device: parse_addr(&args.out_host, args.out_port)?,
    };

    let session = match &args.session {
        Some(path) => SessionConfig::load(path)?,
        None => {
            info!("No session file given, loading demo set");
            SessionConfig::demo()
        }
    };

    let host = SessionHost::from_config(&session);
    let link = OscLink::new(link_config, grid.prefix.clone());
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<Event>();

    let mut matrix = MonomeMatrix::new(grid, host, link, events_tx);
    matrix.activate()?;

    let (snapshot_tx, snapshot_rx) = watch::channel(matrix.snapshot());
    if let Some(port) = args.monitor_port {
        let monitor = WebMonitor::new(snapshot_rx).with_bind_address(args.monitor_host.clone());
        tokio::spawn(async move {
            if let Err(e) = monitor.start_server(port).await {
                error!("Web monitor stopped: {:#}", e);
            }
        });
    }

    info!("OSC Input: {}", link_config.listen);
    info!("OSC Output: {}", link_config.device);
    info!("Grid launcher running...");

    let period = Duration::from_millis(args.tick_ms.max(1));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                matrix.host_mut().advance(period);
                matrix.handle(Event::RefreshTick);
                snapshot_tx.send_replace(matrix.snapshot());
            }
            Some(event) = events_rx.recv() => matrix.handle(event),
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Shutting down");
                break;
            }
        }
    }

    matrix.disconnect();
    snapshot_tx.send_replace(matrix.snapshot());
    Ok(())
}
