//! `scholar serve` — Start the HTTP answer service.

use std::path::Path;

pub async fn run(config_path: Option<&Path>, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("📚 Scholar Gateway");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Collection: {}", config.retrieval.collection);
    println!("   Backend:    {} ({})", config.generation.backend, config.generation.model);
    println!("   Workers:    {}", config.gateway.workers);

    scholar_gateway::start(config).await?;

    Ok(())
}
