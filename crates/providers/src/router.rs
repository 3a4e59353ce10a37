//! Provider router — selects the completion provider based on config.
//!
//! Handles provider creation and lookup by name. Every provider is an
//! [`OpenAiCompatProvider`] pointed at a well-known or configured base URL.

use std::collections::HashMap;
use std::sync::Arc;

use neutro_config::{AppConfig, PersonaConfig};
use neutro_core::provider::Provider;

use crate::openai_compat::OpenAiCompatProvider;

/// Routes completion requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build a single provider by name with the given `X-Title`.
pub fn build_provider(config: &AppConfig, name: &str, title: &str) -> OpenAiCompatProvider {
    let provider_config = config.providers.get(name);

    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone())
        .unwrap_or_default();

    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .or_else(|| {
            (name == config.default_provider)
                .then(|| config.base_url.clone())
                .flatten()
        })
        .unwrap_or_else(|| default_base_url(name));

    OpenAiCompatProvider::new(name, base_url, api_key)
        .with_referer(&config.referer)
        .with_title(title)
        .with_timeout(config.request_timeout_secs)
}

/// Build the default provider for a persona, using its `X-Title` override.
pub fn build_for_persona(config: &AppConfig, persona: &PersonaConfig) -> Arc<dyn Provider> {
    let title = persona.app_title.as_deref().unwrap_or(&config.app_title);
    Arc::new(build_provider(config, &config.default_provider, title))
}

/// Build providers from configuration.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    for name in config.providers.keys() {
        let provider = build_provider(config, name, &config.app_title);
        router.register(name.clone(), Arc::new(provider));
    }

    // Ensure the default provider exists (even if not explicitly configured)
    if router.get(&config.default_provider).is_none() {
        let provider = build_provider(config, &config.default_provider, &config.app_title);
        router.register(config.default_provider.clone(), Arc::new(provider));
    }

    router
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neutro_config::ProviderConfig;

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("openrouter");
        let provider = Arc::new(OpenAiCompatProvider::openrouter("sk-test"));
        router.register("openrouter", provider);

        assert!(router.get("openrouter").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default().is_some());
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config() {
        let config = AppConfig::default();
        let router = build_from_config(&config);
        assert!(router.default().is_some());
        assert_eq!(router.list(), vec!["openrouter"]);
    }

    #[test]
    fn base_url_override_applies_to_default_provider() {
        let config = AppConfig {
            base_url: Some("http://127.0.0.1:8080/v1/".into()),
            ..AppConfig::default()
        };
        let provider = build_provider(&config, "openrouter", "t");
        assert_eq!(provider.base_url(), "http://127.0.0.1:8080/v1");

        let other = build_provider(&config, "openai", "t");
        assert!(other.base_url().contains("api.openai.com"));
    }

    #[test]
    fn provider_specific_url_wins() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "ollama".into(),
            ProviderConfig {
                api_key: None,
                api_url: Some("http://gpu-box:11434/v1".into()),
                default_model: None,
            },
        );
        let router = build_from_config(&config);
        assert_eq!(router.list(), vec!["ollama", "openrouter"]);
        assert_eq!(
            build_provider(&config, "ollama", "t").base_url(),
            "http://gpu-box:11434/v1"
        );
    }
}
