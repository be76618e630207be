use clap::Parser;
use tracing::{debug, error, info, warn};

use whipdump::config::Config;

#[derive(Parser)]
#[command(version)]
struct Args {
    /// Set config file path
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let cfg = match Config::parse(args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(1);
        }
    };
    whipdump::log::set(whipdump::log::default_filter(&cfg.log.level));
    warn!("set log level : {}", cfg.log.level);
    debug!("config : {:?}", cfg);

    let listener = match tokio::net::TcpListener::bind(cfg.http.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", cfg.http.listen, e);
            std::process::exit(1);
        }
    };
    match listener.local_addr() {
        Ok(addr) => info!("Server listening on {}", addr),
        Err(e) => warn!("Unknown local address: {}", e),
    }

    whipdump::server_up(cfg, listener, shutdown_signal()).await;
    info!("Server shutdown");
}

async fn shutdown_signal() {
    match signal::wait_for_stop_signal().await {
        Ok(sig) => info!("Received {}, starting graceful shutdown", sig),
        Err(e) => error!("Failed to listen for stop signal: {}", e),
    }
}
