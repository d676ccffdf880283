pub mod cli;
pub mod client;
pub mod config;
pub mod models;
pub mod relay;
pub mod server;

use cli::Args;
use config::UpstreamConfig;
use log::info;
use server::Server;
use std::error::Error;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let upstream = UpstreamConfig::from_args(&args)?;

    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    match &upstream.override_base_url {
        Some(url) => info!("Ollama URL (override): {}", url),
        None => info!("Ollama URL: per request, default {}", upstream.default_base_url),
    }
    info!("Default Model: {}", upstream.default_model);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let server = Server::new(args.server_addr.clone(), upstream, args.clone());
    server.run().await?;

    Ok(())
}
