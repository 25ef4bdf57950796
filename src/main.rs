use anyhow::Result;
use clap::Parser;
use tracing::info;

use nntp_relay::config::RelayConfig;
use nntp_relay::server::RelayServer;
use nntp_relay::{Args, logging};

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init();

    let num_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    let worker_threads = args.threads.unwrap_or(num_cpus);

    let config = RelayConfig::from_args(args)?;

    if worker_threads == 1 {
        info!("Starting NNTP relay with single-threaded runtime");
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(run(config))
    } else {
        info!(
            "Starting NNTP relay with {} worker threads (detected {} CPUs)",
            worker_threads, num_cpus
        );
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .enable_all()
            .build()?;
        rt.block_on(run(config))
    }
}

async fn run(config: RelayConfig) -> Result<()> {
    info!(
        "Upstream server: {}:{}{}",
        config.upstream.host,
        config.upstream.port,
        if config.upstream.tls { " (TLS)" } else { "" }
    );
    RelayServer::new(config)?.run().await
}
