//! `neutro serve` — Start the HTTP gateway.

use neutro_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    super::require_api_key(&config)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Neutro Gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Personas:  {}", config.persona_names().join(", "));
    if let Some(dir) = &config.gateway.static_dir {
        println!("   Static:    {}", dir.display());
    }

    neutro_gateway::start(config).await?;

    Ok(())
}
