//! floodcastd - floodcast broadcast node
//!
//! Accepts client-submitted values over the messaging substrate, remembers
//! each exactly once, disseminates them to the rest of the cluster, and
//! answers reads with every value learned.

use clap::Parser;
use floodcast_net::Node;
use floodcastd::config::Config;
use floodcastd::server::Server;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // stdout carries the wire protocol; all logging goes to stderr.
    let level = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("floodcastd={level}").parse().unwrap())
        .add_directive(format!("floodcast_net={level}").parse().unwrap());
    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    if let Err(e) = config.validate() {
        error!("invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    info!("floodcastd v{}", env!("CARGO_PKG_VERSION"));

    let (node, inbound) = match Node::start(
        tokio::io::stdin(),
        tokio::io::stdout(),
        config.rpc_timeout(),
    )
    .await
    {
        Ok(started) => started,
        Err(e) => {
            error!("substrate initialization failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let server = Arc::new(Server::new(&config, node));

    let signal_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        signal_server.shutdown();
    });

    if let Err(e) = server.clone().run(inbound).await {
        error!("server error: {}", e);
        return ExitCode::FAILURE;
    }

    let stats = server.stats();
    info!(
        stored_values = stats.stored_values,
        neighbors = stats.neighbors,
        "node stopped"
    );
    ExitCode::SUCCESS
}
