//! Shared test helpers for engine tests.

use std::sync::Mutex;
use std::time::Duration;

use neutro_core::error::ProviderError;
use neutro_core::provider::{CompletionRequest, CompletionResponse, Provider};

/// A mock provider that returns a sequence of scripted outcomes and records
/// every request it receives.
///
/// Panics if more calls are made than outcomes provided.
pub struct ScriptedProvider {
    outcomes: Mutex<Vec<Result<String, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(outcomes: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// A provider answering every call in order with these texts.
    pub fn replies(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::new(vec![Err(error)])
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = {
            let mut outcomes = self.outcomes.lock().unwrap();
            let mut requests = self.requests.lock().unwrap();
            if outcomes.is_empty() {
                panic!(
                    "ScriptedProvider: no more outcomes (call #{})",
                    requests.len() + 1
                );
            }
            requests.push(request);
            outcomes.remove(0)
        };

        outcome.map(|text| CompletionResponse {
            text,
            model: Some("mock-model".into()),
        })
    }
}
