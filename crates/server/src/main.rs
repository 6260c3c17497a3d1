// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use monctl::config::ServerConfig;

#[derive(Parser)]
#[command(name = "monctl-server", version, about = "Infrastructure monitoring control plane.")]
struct Cli {
    #[command(flatten)]
    config: ServerConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = cli.config;

    let fmt = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    );
    if config.log_format == "json" {
        fmt.json().init();
    } else {
        fmt.init();
    }

    match monctl::run(config).await {
        Ok(()) => {}
        Err(e) => {
            if e.downcast_ref::<monctl::ShutdownTimeout>().is_some() {
                error!("fatal: {e:#}");
                std::process::exit(2);
            }
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
    }
}
