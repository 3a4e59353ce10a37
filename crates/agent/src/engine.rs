//! The conversation engine: one send through the whole pipeline.
//!
//! ```text
//! user text → store append → context snapshot → assemble → provider
//!           → format → store append → reply
//! ```
//!
//! The provider call is the only suspend point. Callers own the
//! [`ChatSession`] and pass it by `&mut`, so two sends can never interleave
//! on the same session.

use std::sync::Arc;
use std::time::Duration;

use neutro_config::{AppConfig, PersonaConfig, PersonaKind};
use neutro_core::error::{Error, ProviderError, Result};
use neutro_core::ledger::LedgerSource;
use neutro_core::message::Turn;
use neutro_core::provider::{CompletionRequest, Provider};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::assembler::{Persona, PromptAssembler};
use crate::context::{ContextBuilder, FinancialContextBuilder, LearnerContextBuilder};
use crate::postprocess::ResponseFormatter;
use crate::session::ChatSession;

/// What the caller shows for one send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    /// True when `text` is the persona's fallback message
    pub fallback: bool,
}

pub struct ChatEngine {
    /// The completion provider
    provider: Arc<dyn Provider>,

    /// Model identifier sent with every request
    model: String,

    temperature: f32,

    max_tokens: Option<u32>,

    /// Persona key the engine was configured with
    persona_key: String,

    persona: PersonaConfig,

    /// Rendered once; pure data
    prompt: Persona,

    assembler: PromptAssembler,

    /// Source of the per-send context block
    context: Option<Arc<dyn ContextBuilder>>,

    formatter: ResponseFormatter,

    /// Turns sent with each request (and the session window size)
    history_limit: usize,

    timeout: Duration,
}

impl ChatEngine {
    /// Create an engine with default sampling settings.
    ///
    /// Tutor personas get the learner context builder; finance personas get
    /// colourised figures but no context until a ledger is attached.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        persona_key: impl Into<String>,
        persona: PersonaConfig,
    ) -> Self {
        let context: Option<Arc<dyn ContextBuilder>> = match persona.kind {
            PersonaKind::Tutor => Some(Arc::new(LearnerContextBuilder)),
            PersonaKind::Finance => None,
        };
        let formatter =
            ResponseFormatter::new().with_financial_colors(persona.kind == PersonaKind::Finance);

        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            persona_key: persona_key.into(),
            prompt: Persona::from(&persona),
            persona,
            assembler: PromptAssembler::new(),
            context,
            formatter,
            history_limit: neutro_memory::DEFAULT_CAPACITY,
            timeout: Duration::from_secs(30),
        }
    }

    /// Build an engine for a configured persona.
    pub fn from_config(
        config: &AppConfig,
        persona_key: &str,
        provider: Arc<dyn Provider>,
        ledger: Option<Arc<dyn LedgerSource>>,
    ) -> Result<Self> {
        let persona = config.persona(persona_key).ok_or_else(|| Error::Config {
            message: format!("Unknown persona '{persona_key}'"),
        })?;
        let model = config.model_for(&persona);

        let mut engine = Self::new(provider, model, persona_key, persona)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_history_limit(config.history_limit)
            .with_timeout(Duration::from_secs(config.request_timeout_secs));

        if let (PersonaKind::Finance, Some(ledger)) = (engine.persona.kind, ledger) {
            engine = engine.with_context(Arc::new(FinancialContextBuilder::new(ledger)));
        }
        Ok(engine)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the context builder.
    pub fn with_context(mut self, context: Arc<dyn ContextBuilder>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_formatter(mut self, formatter: ResponseFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn persona(&self) -> &PersonaConfig {
        &self.persona
    }

    pub fn persona_key(&self) -> &str {
        &self.persona_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// A fresh session sized to this engine's history limit.
    pub fn new_session(&self) -> ChatSession {
        ChatSession::new(self.persona_key.clone(), self.history_limit)
    }

    /// The persona's greeting for a user.
    pub fn welcome(&self, name: Option<&str>) -> String {
        self.persona.welcome_for(name)
    }

    /// Send one user message and always produce something to show.
    ///
    /// Failures are logged and replaced by the persona's fallback message;
    /// no assistant turn is stored in that case.
    pub async fn send(&self, session: &mut ChatSession, text: &str) -> Reply {
        match self.try_send(session, text).await {
            Ok(text) => Reply {
                text,
                fallback: false,
            },
            Err(e) => {
                error!(
                    session = %session.id,
                    persona = %self.persona_key,
                    error = %e,
                    "Send failed, answering with fallback"
                );
                Reply {
                    text: self.persona.fallback_message.clone(),
                    fallback: true,
                }
            }
        }
    }

    /// Send one user message, surfacing the error.
    pub async fn try_send(&self, session: &mut ChatSession, text: &str) -> Result<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("Message is empty".into()));
        }

        session.store_mut().append(Turn::user(text));
        let previous = session.onboarding().clone();
        if self.persona.kind == PersonaKind::Tutor {
            session.onboarding_mut().advance(text);
        }

        match self.complete_in(session).await {
            Ok(formatted) => Ok(formatted),
            Err(e) => {
                // The learner never saw a reply to this step.
                *session.onboarding_mut() = previous;
                Err(e)
            }
        }
    }

    async fn complete_in(&self, session: &mut ChatSession) -> Result<String> {
        let snapshot = match &self.context {
            Some(builder) => builder.snapshot(session).await,
            None => None,
        };

        let recent = session.store().recent(self.history_limit);
        let messages = self.assembler.assemble(&self.prompt, snapshot.as_ref(), &recent);

        debug!(
            session = %session.id,
            messages = messages.len(),
            has_context = snapshot.is_some(),
            "Prompt assembled"
        );

        let raw = self.complete_turns(messages).await?;
        let formatted = self.formatter.format(&raw, snapshot.as_ref());

        session.store_mut().append(Turn::assistant(formatted.clone()));

        info!(
            session = %session.id,
            turns = session.store().len(),
            "Reply stored"
        );

        Ok(formatted)
    }

    /// One completion over an already assembled message list.
    ///
    /// Returns the raw reply text, unformatted.
    pub async fn complete_turns(&self, messages: Vec<Turn>) -> Result<String> {
        let request = CompletionRequest::new(self.model.clone(), messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout.as_secs()))??;

        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextSnapshot;
    use crate::onboarding::OnboardingState;
    use crate::test_helpers::ScriptedProvider;
    use async_trait::async_trait;
    use neutro_core::Role;

    fn tutor(provider: Arc<ScriptedProvider>) -> ChatEngine {
        ChatEngine::new(provider, "mock-model", "tutor", PersonaConfig::tutor())
    }

    fn finance(provider: Arc<ScriptedProvider>) -> ChatEngine {
        ChatEngine::new(provider, "mock-model", "finance", PersonaConfig::finance())
    }

    #[tokio::test]
    async fn first_message_sends_system_and_user() {
        let provider = Arc::new(ScriptedProvider::replies(&["¡Hola! ¿Cómo te llamas?"]));
        let engine = tutor(provider.clone());
        let mut session = engine.new_session();

        let reply = engine.send(&mut session, "Hola").await;
        assert_eq!(reply.text, "¡Hola! ¿Cómo te llamas?");
        assert!(!reply.fallback);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role(), Role::System);
        assert_eq!(messages[1], Turn::user("Hola"));
        assert_eq!(requests[0].model, "mock-model");
        assert!(!requests[0].stream);

        let stored = session.store().recent(10);
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1], Turn::assistant("¡Hola! ¿Cómo te llamas?"));
    }

    #[tokio::test]
    async fn onboarding_instruction_lives_in_system_turn() {
        let provider = Arc::new(ScriptedProvider::replies(&["a", "b"]));
        let engine = tutor(provider.clone());
        let mut session = engine.new_session();

        engine.send(&mut session, "Hola").await;
        engine.send(&mut session, "Me llamo Ana").await;

        assert_eq!(session.onboarding().state(), OnboardingState::AwaitingGoal);
        let requests = provider.requests();
        let second = &requests[1].messages;
        assert!(second[0].content().contains("\"Ana\""));
        assert_eq!(second.last().unwrap(), &Turn::user("Me llamo Ana"));
    }

    #[tokio::test]
    async fn provider_error_yields_fallback_without_assistant_turn() {
        let provider = Arc::new(ScriptedProvider::failing(ProviderError::Upstream {
            status: 500,
            body: "boom".into(),
        }));
        let engine = finance(provider);
        let mut session = engine.new_session();

        let reply = engine.send(&mut session, "¿Cuál es mi balance?").await;
        assert!(reply.fallback);
        assert_eq!(reply.text, PersonaConfig::finance().fallback_message);
        assert_eq!(session.store().len(), 1);
        assert_eq!(session.store().recent(1)[0].role(), Role::User);
    }

    #[tokio::test]
    async fn failed_send_leaves_onboarding_in_place() {
        let upstream = || ProviderError::Upstream {
            status: 500,
            body: "boom".into(),
        };
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(upstream()),
            Err(upstream()),
            Ok("¡Hola! ¿Cómo te llamas?".into()),
        ]));
        let engine = tutor(provider);
        let mut session = engine.new_session();

        assert!(engine.send(&mut session, "Hola").await.fallback);
        assert!(engine.send(&mut session, "Hola").await.fallback);
        assert_eq!(session.onboarding().state(), OnboardingState::Opening);
        assert_eq!(session.onboarding().profile().name, None);

        assert!(!engine.send(&mut session, "Hola").await.fallback);
        assert_eq!(session.onboarding().state(), OnboardingState::AwaitingName);
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_the_provider() {
        let provider = Arc::new(ScriptedProvider::replies(&[]));
        let engine = finance(provider.clone());
        let mut session = engine.new_session();

        let err = engine.try_send(&mut session, "   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(provider.call_count(), 0);
        assert!(session.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let provider =
            Arc::new(ScriptedProvider::replies(&["late"]).with_delay(Duration::from_secs(60)));
        let engine = finance(provider).with_timeout(Duration::from_secs(30));
        let mut session = engine.new_session();

        let err = engine.try_send(&mut session, "Hola").await.unwrap_err();
        assert!(matches!(err, Error::Provider(ProviderError::Timeout(30))));
    }

    #[tokio::test]
    async fn history_limit_bounds_request_and_store() {
        let replies: Vec<String> = (0..8).map(|i| format!("r{i}")).collect();
        let refs: Vec<&str> = replies.iter().map(String::as_str).collect();
        let provider = Arc::new(ScriptedProvider::replies(&refs));
        let engine = finance(provider.clone()).with_history_limit(4);
        let mut session = engine.new_session();

        for i in 0..8 {
            engine.send(&mut session, &format!("q{i}")).await;
        }

        assert_eq!(session.store().len(), 4);
        let last = provider.requests().pop().unwrap();
        // system + at most 4 recent turns
        assert_eq!(last.messages.len(), 5);
        assert_eq!(last.messages.last().unwrap(), &Turn::user("q7"));
    }

    #[tokio::test]
    async fn finance_reply_is_colourised() {
        let provider = Arc::new(ScriptedProvider::replies(&["Balance total: S/. 1,234.56"]));
        let engine = finance(provider);
        let mut session = engine.new_session();

        let reply = engine.send(&mut session, "¿Mi balance?").await;
        assert!(reply.text.contains(r#"<span class="financial-positive">S/. 1,234.56</span>"#));
    }

    struct FixedContext;

    #[async_trait]
    impl ContextBuilder for FixedContext {
        async fn snapshot(&self, _session: &ChatSession) -> Option<ContextSnapshot> {
            Some(ContextSnapshot::Financial(
                crate::context::FinancialSnapshot::compute(
                    &[],
                    250.0,
                    Some("Ana".into()),
                    chrono::NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
                ),
            ))
        }
    }

    #[tokio::test]
    async fn context_block_is_appended_to_persona() {
        let provider = Arc::new(ScriptedProvider::replies(&["ok"]));
        let engine = finance(provider.clone()).with_context(Arc::new(FixedContext));
        let mut session = engine.new_session();

        engine.send(&mut session, "Hola").await;
        let system = provider.requests()[0].messages[0].content().to_string();
        assert!(system.starts_with("Eres 'Neutro'"));
        assert!(system.contains("\n\nInformación financiera del usuario:\nNombre: Ana"));
        assert!(system.contains("Saldo de ahorros: S/. 250.00"));
    }

    #[test]
    fn from_config_rejects_unknown_persona() {
        let config = AppConfig::default();
        let provider = Arc::new(ScriptedProvider::replies(&[]));
        let result = ChatEngine::from_config(&config, "pirate", provider, None);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn from_config_applies_limits() {
        let mut config = AppConfig::default();
        config.history_limit = 6;
        config.request_timeout_secs = 5;
        let provider = Arc::new(ScriptedProvider::replies(&[]));
        let engine = ChatEngine::from_config(&config, "tutor", provider, None).unwrap();
        assert_eq!(engine.history_limit(), 6);
        assert_eq!(engine.new_session().store().capacity(), 6);
        assert_eq!(engine.timeout, Duration::from_secs(5));
        assert!(engine.welcome(Some("Ana")).starts_with("¡Hola Ana!"));
    }
}
