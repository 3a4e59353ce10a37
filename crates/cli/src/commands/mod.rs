pub mod chat;
pub mod config_cmd;
pub mod init;
pub mod serve;
pub mod sessions;

use neutro_config::AppConfig;

/// Print setup help and fail when no credential is configured.
pub(crate) fn require_api_key(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.require_api_key().is_ok() {
        return Ok(());
    }

    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    export OPENROUTER_API_KEY='sk-or-v1-...'   (recommended)");
    eprintln!("    export NEUTRO_API_KEY='sk-...'             (generic)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_path().display());
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}
