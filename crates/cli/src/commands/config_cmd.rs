//! `neutro config` — Configuration management commands.

use neutro_config::AppConfig;

const REDACTED: &str = "***";

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No API key set (set OPENROUTER_API_KEY or NEUTRO_API_KEY)");
            }
            if matches!(config.store.backend, neutro_config::StoreBackend::Memory) {
                warnings.push("Session store is in-memory; saved sessions vanish on exit");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            let router = neutro_providers::build_from_config(&config);
            println!("   Provider:  {}", config.default_provider);
            println!("   Routed:    {}", router.list().join(", "));
            println!("   Model:     {}", config.default_model);
            println!("   Personas:  {}", config.persona_names().join(", "));
            println!("   History:   {} turns", config.history_limit);
            println!("   Timeout:   {}s", config.request_timeout_secs);
            println!(
                "   Gateway:   {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!("   Store:     {:?}", config.store.backend);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&redacted(config))?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}

/// Replace every credential with a placeholder.
fn redacted(mut config: AppConfig) -> AppConfig {
    if config.api_key.is_some() {
        config.api_key = Some(REDACTED.into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some(REDACTED.into());
        }
    }
    config
}
