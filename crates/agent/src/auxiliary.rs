//! One-shot helper completions: translation, follow-up suggestions and
//! conversation titles.
//!
//! None of these touch a session's window. Each builds its own two-entry
//! request (system instruction, user payload) and post-processes the reply
//! with a small pure helper.

use std::sync::Arc;
use std::time::Duration;

use neutro_core::error::{Error, ProviderError, Result};
use neutro_core::message::{Role, Turn};
use neutro_core::provider::{CompletionRequest, Provider};
use tracing::debug;

/// Upper bound on generated suggestions.
pub const MAX_SUGGESTIONS: usize = 3;

/// Titles are cut to this many chars.
pub const MAX_TITLE_CHARS: usize = 60;

const TRANSLATE_PROMPT: &str = "You are a translator. Translate the user's text into {target}. \
Reply with the translation only, without quotes or explanations.";

const SUGGESTIONS_PROMPT: &str = "Given the conversation below, propose up to three short \
follow-up questions the user could ask next, in the language of the conversation. One question \
per line, no numbering, no extra text.";

const TITLE_PROMPT: &str = "Write a short title (at most six words) for the conversation below, \
in the language of the conversation. Reply with the title only.";

pub struct AuxiliaryTasks {
    provider: Arc<dyn Provider>,
    model: String,
    timeout: Duration,
}

impl AuxiliaryTasks {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Translate `text` into `target` (a language name such as "English").
    pub async fn translate(&self, text: &str, target: &str) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("Nothing to translate".into()));
        }
        let system = TRANSLATE_PROMPT.replace("{target}", target);
        let reply = self.ask(system, text.to_string(), 0.3).await?;
        Ok(strip_quotes(reply.trim()).to_string())
    }

    /// Up to [`MAX_SUGGESTIONS`] follow-up prompts for a conversation.
    pub async fn suggestions(&self, turns: &[Turn]) -> Result<Vec<String>> {
        let transcript = transcript(turns);
        if transcript.is_empty() {
            return Ok(Vec::new());
        }
        let reply = self.ask(SUGGESTIONS_PROMPT.to_string(), transcript, 0.7).await?;
        Ok(parse_suggestions(&reply))
    }

    /// A short title; falls back to the first user message.
    pub async fn title(&self, turns: &[Turn]) -> Result<String> {
        let fallback = turns
            .iter()
            .find(|t| t.role() == Role::User)
            .map(|t| t.content().to_string())
            .unwrap_or_default();

        let transcript = transcript(turns);
        if transcript.is_empty() {
            return Ok(clean_title("", &fallback));
        }
        let reply = self.ask(TITLE_PROMPT.to_string(), transcript, 0.3).await?;
        Ok(clean_title(&reply, &fallback))
    }

    async fn ask(&self, system: String, user: String, temperature: f32) -> Result<String> {
        let request = CompletionRequest::new(
            self.model.clone(),
            vec![Turn::system(system), Turn::user(user)],
        )
        .with_temperature(temperature);

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout.as_secs()))??;

        debug!(provider = self.provider.name(), chars = response.text.len(), "Auxiliary reply");
        Ok(response.text)
    }
}

fn transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .filter(|t| t.role() != Role::System)
        .map(|t| format!("{}: {}", t.role().as_str(), t.content().trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_quotes(s: &str) -> &str {
    s.trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '«' | '»'))
}

/// One suggestion per non-empty line, bullets and numbering removed.
pub fn parse_suggestions(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| {
            let line = line.trim().trim_start_matches(['-', '*', '•']).trim_start();
            let digits = line.chars().take_while(char::is_ascii_digit).count();
            let line = if digits > 0 {
                line[digits..].trim_start_matches(['.', ')']).trim_start()
            } else {
                line
            };
            strip_quotes(line.trim()).to_string()
        })
        .filter(|s| !s.is_empty())
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// First line of `raw`, quotes and trailing period stripped, capped at
/// [`MAX_TITLE_CHARS`]. Uses `fallback` when nothing is left.
pub fn clean_title(raw: &str, fallback: &str) -> String {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let line = strip_quotes(line.trim_start_matches('#').trim()).trim_end_matches('.');
    let source = if line.trim().is_empty() { fallback.trim() } else { line.trim() };
    let title: String = source.chars().take(MAX_TITLE_CHARS).collect();
    if title.is_empty() {
        "Nueva conversación".to_string()
    } else {
        title.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;

    #[test]
    fn suggestions_strip_markers_and_cap() {
        let raw = "1. ¿Cómo ahorro más?\n- ¿Qué es el margen bruto?\n\n• \"¿Cómo bajo costos?\"\n4) Extra";
        assert_eq!(
            parse_suggestions(raw),
            vec!["¿Cómo ahorro más?", "¿Qué es el margen bruto?", "¿Cómo bajo costos?"]
        );
    }

    #[test]
    fn title_cleanup() {
        assert_eq!(clean_title("\"Ahorro mensual.\"", "x"), "Ahorro mensual");
        assert_eq!(clean_title("## Presupuesto\nmore", "x"), "Presupuesto");
        assert_eq!(clean_title("   ", "¿Cómo ahorro?"), "¿Cómo ahorro?");
        assert_eq!(clean_title("", ""), "Nueva conversación");
        assert_eq!(clean_title(&"t".repeat(100), "").chars().count(), MAX_TITLE_CHARS);
    }

    #[tokio::test]
    async fn translate_sends_target_language() {
        let provider = Arc::new(ScriptedProvider::replies(&["\"Good morning\""]));
        let tasks = AuxiliaryTasks::new(provider.clone(), "mock-model");

        let out = tasks.translate("Buenos días", "English").await.unwrap();
        assert_eq!(out, "Good morning");

        let requests = provider.requests();
        let request = &requests[0];
        assert!(request.messages[0].content().contains("into English"));
        assert_eq!(request.messages[1], Turn::user("Buenos días"));
    }

    #[tokio::test]
    async fn empty_translation_input_is_rejected() {
        let provider = Arc::new(ScriptedProvider::replies(&[]));
        let tasks = AuxiliaryTasks::new(provider, "mock-model");
        assert!(matches!(
            tasks.translate("  ", "English").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn suggestions_and_title_use_transcript() {
        let provider = Arc::new(ScriptedProvider::replies(&["a\nb", "Mi título"]));
        let tasks = AuxiliaryTasks::new(provider.clone(), "mock-model");
        let turns = vec![Turn::user("Hola"), Turn::assistant("¡Hola!")];

        assert_eq!(tasks.suggestions(&turns).await.unwrap(), vec!["a", "b"]);
        assert_eq!(tasks.title(&turns).await.unwrap(), "Mi título");
        assert_eq!(
            provider.requests()[0].messages[1].content(),
            "user: Hola\nassistant: ¡Hola!"
        );
    }

    #[tokio::test]
    async fn empty_conversation_needs_no_call() {
        let provider = Arc::new(ScriptedProvider::replies(&[]));
        let tasks = AuxiliaryTasks::new(provider.clone(), "mock-model");
        assert!(tasks.suggestions(&[]).await.unwrap().is_empty());
        assert_eq!(tasks.title(&[]).await.unwrap(), "Nueva conversación");
        assert_eq!(provider.call_count(), 0);
    }
}
