//! JSON API consumed by the chat pages.
//!
//! Endpoints (nested under `/api`):
//!
//! - `POST   /chat`                 — Send a message in a session
//! - `POST   /ai`                   — Alias of `/chat`
//! - `POST   /chat/completions`     — Raw completion over a message list
//! - `POST   /translate`            — Translate a text
//! - `POST   /suggestions`          — Follow-up prompts for a conversation
//! - `POST   /title`                — Short title for a conversation
//! - `GET    /welcome`              — Persona greeting for a user
//! - `POST   /sessions/{id}/reset`  — Clear a live session
//! - `GET    /sessions`             — List saved sessions
//! - `GET    /sessions/{id}`        — Get a saved session
//! - `DELETE /sessions/{id}`        — Delete a saved and live session

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use neutro_core::message::Turn;
use neutro_core::store::StoredSession;
use neutro_core::{Error, SessionId};

use neutro_agent::ChatSession;

use crate::SharedState;

// ── Router ────────────────────────────────────────────────────────────────

pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/ai", post(chat_handler))
        .route("/chat/completions", post(completions_handler))
        .route("/translate", post(translate_handler))
        .route("/suggestions", post(suggestions_handler))
        .route("/title", post(title_handler))
        .route("/welcome", get(welcome_handler))
        .route("/sessions", get(list_sessions_handler))
        .route(
            "/sessions/{id}",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/sessions/{id}/reset", post(reset_session_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    /// Existing session ID (omit to open a new one)
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    persona: Option<String>,
    /// Ledger user the finance persona reads KPIs for
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ChatResponse {
    response: String,
    session_id: String,
    fallback: bool,
}

#[derive(Deserialize)]
struct CompletionsRequest {
    messages: Vec<Turn>,
    #[serde(default)]
    persona: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct CompletionsResponse {
    content: String,
}

#[derive(Deserialize)]
struct TranslateRequest {
    text: String,
    #[serde(default = "default_target")]
    target: String,
}

fn default_target() -> String {
    "English".into()
}

#[derive(Serialize, Deserialize)]
struct TranslateResponse {
    translation: String,
}

/// Either a full message list or a single text.
#[derive(Deserialize)]
struct ConversationRequest {
    #[serde(default)]
    messages: Vec<Turn>,
    #[serde(default)]
    text: Option<String>,
}

impl ConversationRequest {
    fn into_turns(self) -> Vec<Turn> {
        match self.text {
            Some(text) if self.messages.is_empty() => vec![Turn::user(text)],
            _ => self.messages,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SuggestionsResponse {
    suggestions: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct TitleResponse {
    title: String,
}

#[derive(Deserialize)]
struct WelcomeQuery {
    #[serde(default)]
    persona: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    /// Used when no ledger profile is available
    #[serde(default)]
    name: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct WelcomeResponse {
    message: String,
}

#[derive(Serialize, Deserialize)]
struct SessionListResponse {
    sessions: Vec<StoredSession>,
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Map a pipeline error without leaking upstream detail.
fn upstream_error(e: Error) -> ApiError {
    match e {
        Error::InvalidInput(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        other => {
            error!(error = %other, "Completion failed");
            api_error(StatusCode::BAD_GATEWAY, "The assistant is unavailable right now")
        }
    }
}

fn unknown_persona(name: Option<&str>) -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        format!("Unknown persona '{}'", name.unwrap_or_default()),
    )
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "Message is empty"));
    }

    let requested = payload.persona.as_deref();
    let engine = state
        .engine(requested)
        .ok_or_else(|| unknown_persona(requested))?;

    let session_id = payload
        .session_id
        .unwrap_or_else(|| SessionId::new().to_string());

    let user_id = payload.user_id.clone();
    let saved = state.saved_session(&session_id).await;
    let (persona, session) = state
        .session_or_insert(&session_id, engine.persona_key(), || {
            let session = match &saved {
                Some(stored) => {
                    info!(session = %session_id, turns = stored.messages.len(), "Restoring saved session");
                    ChatSession::from_stored(stored, engine.persona_key(), engine.history_limit())
                }
                None => engine.new_session().with_id(SessionId::from(&session_id)),
            };
            match user_id {
                Some(user) => session.with_user(user),
                None => session,
            }
        })
        .await;

    // An existing session keeps the persona it was opened with.
    let engine = state
        .engine(Some(&persona))
        .ok_or_else(|| unknown_persona(Some(&persona)))?;

    let Ok(mut session) = session.try_lock() else {
        warn!(session = %session_id, "Send rejected, another one is in flight");
        return Err(api_error(
            StatusCode::CONFLICT,
            "A message is already being processed for this session",
        ));
    };

    info!(session = %session_id, persona = %persona, "Chat message received");
    let reply = engine.send(&mut session, &payload.message).await;

    if let Some(store) = &state.store {
        if let Err(e) = store.save(session.to_stored()).await {
            warn!(session = %session_id, error = %e, "Failed to save session");
        }
    }

    Ok(Json(ChatResponse {
        response: reply.text,
        session_id,
        fallback: reply.fallback,
    }))
}

async fn completions_handler(
    State(state): State<SharedState>,
    Json(payload): Json<CompletionsRequest>,
) -> Result<Json<CompletionsResponse>, ApiError> {
    if payload.messages.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "No messages"));
    }
    let requested = payload.persona.as_deref();
    let engine = state
        .engine(requested)
        .ok_or_else(|| unknown_persona(requested))?;

    let content = engine
        .complete_turns(payload.messages)
        .await
        .map_err(upstream_error)?;

    Ok(Json(CompletionsResponse { content }))
}

async fn translate_handler(
    State(state): State<SharedState>,
    Json(payload): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let translation = state
        .auxiliary
        .translate(&payload.text, &payload.target)
        .await
        .map_err(upstream_error)?;
    Ok(Json(TranslateResponse { translation }))
}

async fn suggestions_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ConversationRequest>,
) -> Result<Json<SuggestionsResponse>, ApiError> {
    let suggestions = state
        .auxiliary
        .suggestions(&payload.into_turns())
        .await
        .map_err(upstream_error)?;
    Ok(Json(SuggestionsResponse { suggestions }))
}

async fn title_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ConversationRequest>,
) -> Result<Json<TitleResponse>, ApiError> {
    let title = state
        .auxiliary
        .title(&payload.into_turns())
        .await
        .map_err(upstream_error)?;
    Ok(Json(TitleResponse { title }))
}

async fn welcome_handler(
    State(state): State<SharedState>,
    Query(query): Query<WelcomeQuery>,
) -> Result<Json<WelcomeResponse>, ApiError> {
    let requested = query.persona.as_deref();
    let engine = state
        .engine(requested)
        .ok_or_else(|| unknown_persona(requested))?;

    let mut name = query.name;
    if let (Some(ledger), Some(user_id)) = (&state.ledger, query.user_id.as_deref()) {
        match ledger.display_name(user_id).await {
            Ok(Some(full)) => {
                name = full.split_whitespace().next().map(String::from).or(name);
            }
            Ok(None) => {}
            Err(e) => warn!(user_id, error = %e, "Profile lookup failed"),
        }
    }

    Ok(Json(WelcomeResponse {
        message: engine.welcome(name.as_deref()),
    }))
}

async fn reset_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session = {
        let sessions = state.sessions.read().await;
        sessions.get(&id).map(|slot| slot.session.clone())
    };
    let Some(session) = session else {
        return Err(api_error(StatusCode::NOT_FOUND, "Session not found"));
    };

    let Ok(mut session) = session.try_lock() else {
        return Err(api_error(
            StatusCode::CONFLICT,
            "A message is being processed for this session",
        ));
    };
    session.reset();
    info!(session = %id, "Session reset");
    Ok(StatusCode::NO_CONTENT)
}

async fn list_sessions_handler(
    State(state): State<SharedState>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let Some(store) = &state.store else {
        return Ok(Json(SessionListResponse {
            sessions: Vec::new(),
        }));
    };
    let sessions = store
        .list()
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(SessionListResponse { sessions }))
}

async fn get_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<StoredSession>, ApiError> {
    let store = state
        .store
        .as_ref()
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Session storage is disabled"))?;

    store
        .get(&id)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Session not found"))
}

async fn delete_session_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let live = state.sessions.write().await.remove(&id).is_some();

    let stored = match &state.store {
        Some(store) => store
            .delete(&id)
            .await
            .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?,
        None => false,
    };

    if live || stored {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(api_error(StatusCode::NOT_FOUND, "Session not found"))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use neutro_config::AppConfig;
    use neutro_core::error::ProviderError;
    use neutro_core::provider::{CompletionRequest, CompletionResponse, Provider};
    use neutro_memory::{InMemoryLedger, InMemorySessionStore};

    use crate::GatewayState;

    /// Replies with a fixed text and records requests.
    struct MockProvider {
        reply: Result<String, ProviderError>,
        delay: Option<Duration>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl MockProvider {
        fn new(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(ProviderError::Upstream {
                    status: 500,
                    body: "internal".into(),
                }),
                delay: None,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "gateway_mock"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.requests.lock().unwrap().push(request);
            self.reply.clone().map(|text| CompletionResponse { text, model: None })
        }
    }

    fn test_state(provider: Arc<MockProvider>) -> SharedState {
        let ledger = InMemoryLedger::new().with_profile("u1", "Ana María");
        Arc::new(
            GatewayState::new(
                AppConfig::default(),
                |_| provider.clone(),
                Some(Arc::new(ledger)),
                Some(Arc::new(InMemorySessionStore::new())),
            )
            .unwrap(),
        )
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn chat_opens_session_and_saves_it() {
        let provider = Arc::new(MockProvider::new("¡Hola! ¿Cómo te llamas?"));
        let state = test_state(provider.clone());

        let app = api_router(state.clone());
        let req = post_json("/chat", serde_json::json!({ "message": "Hola", "persona": "tutor" }));
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let chat: ChatResponse = json_body(response).await;
        assert_eq!(chat.response, "¡Hola! ¿Cómo te llamas?");
        assert!(!chat.fallback);
        assert!(!chat.session_id.is_empty());

        let saved = state.store.as_ref().unwrap().get(&chat.session_id).await.unwrap();
        assert_eq!(saved.unwrap().messages.len(), 2);

        // Second message continues the same session.
        let app = api_router(state.clone());
        let req = post_json(
            "/ai",
            serde_json::json!({ "message": "Me llamo Ana", "session_id": chat.session_id }),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[1].messages.len(), 4);
        assert!(requests[1].messages[0].content().contains("\"Ana\""));
    }

    #[tokio::test]
    async fn chat_failure_returns_fallback() {
        let state = test_state(Arc::new(MockProvider::failing()));
        let app = api_router(state);

        let req = post_json("/chat", serde_json::json!({ "message": "¿Mi balance?" }));
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let chat: ChatResponse = json_body(response).await;
        assert!(chat.fallback);
        assert!(chat.response.starts_with("Lo siento"));
        assert!(!chat.response.contains("internal"));
    }

    #[tokio::test]
    async fn chat_rejects_empty_and_unknown_persona() {
        let state = test_state(Arc::new(MockProvider::new("x")));

        let app = api_router(state.clone());
        let response = app
            .oneshot(post_json("/chat", serde_json::json!({ "message": "  " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let app = api_router(state);
        let response = app
            .oneshot(post_json(
                "/chat",
                serde_json::json!({ "message": "hi", "persona": "pirate" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_send_on_same_session_conflicts() {
        let provider = Arc::new(MockProvider {
            delay: Some(Duration::from_secs(5)),
            ..MockProvider::new("ok")
        });
        let state = test_state(provider);

        let first = tokio::spawn(api_router(state.clone()).oneshot(post_json(
            "/chat",
            serde_json::json!({ "message": "uno", "session_id": "s1" }),
        )));
        // Let the first request reach the provider.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = api_router(state.clone())
            .oneshot(post_json(
                "/chat",
                serde_json::json!({ "message": "dos", "session_id": "s1" }),
            ))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);

        let first = first.await.unwrap().unwrap();
        assert_eq!(first.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn completions_proxy_returns_raw_content() {
        let provider = Arc::new(MockProvider::new("**raw**"));
        let app = api_router(test_state(provider.clone()));

        let req = post_json(
            "/chat/completions",
            serde_json::json!({ "messages": [
                { "role": "system", "content": "Eres Neutro." },
                { "role": "user", "content": "Hola" }
            ]}),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: CompletionsResponse = json_body(response).await;
        assert_eq!(body.content, "**raw**");
        assert_eq!(provider.requests.lock().unwrap()[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn completions_upstream_error_is_bad_gateway() {
        let app = api_router(test_state(Arc::new(MockProvider::failing())));
        let req = post_json(
            "/chat/completions",
            serde_json::json!({ "messages": [{ "role": "user", "content": "Hola" }] }),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body: ErrorResponse = json_body(response).await;
        assert!(!body.error.contains("internal"));
    }

    #[tokio::test]
    async fn auxiliary_endpoints() {
        let state = test_state(Arc::new(MockProvider::new("Hello")));

        let response = api_router(state.clone())
            .oneshot(post_json("/translate", serde_json::json!({ "text": "Hola" })))
            .await
            .unwrap();
        let body: TranslateResponse = json_body(response).await;
        assert_eq!(body.translation, "Hello");

        let response = api_router(state.clone())
            .oneshot(post_json("/suggestions", serde_json::json!({ "text": "Hola" })))
            .await
            .unwrap();
        let body: SuggestionsResponse = json_body(response).await;
        assert_eq!(body.suggestions, vec!["Hello"]);

        let response = api_router(state)
            .oneshot(post_json(
                "/title",
                serde_json::json!({ "messages": [{ "role": "user", "content": "Hola" }] }),
            ))
            .await
            .unwrap();
        let body: TitleResponse = json_body(response).await;
        assert_eq!(body.title, "Hello");
    }

    #[tokio::test]
    async fn welcome_uses_ledger_first_name() {
        let app = api_router(test_state(Arc::new(MockProvider::new("x"))));
        let req = Request::builder()
            .uri("/welcome?persona=finance&user_id=u1")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        let body: WelcomeResponse = json_body(response).await;
        assert!(body.message.starts_with("¡Hola Ana!"));
    }

    #[tokio::test]
    async fn welcome_without_name_is_anonymous() {
        let app = api_router(test_state(Arc::new(MockProvider::new("x"))));
        let req = Request::builder()
            .uri("/welcome?persona=tutor")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        let body: WelcomeResponse = json_body(response).await;
        assert!(body.message.starts_with("¡Hola estudiante!"));
    }

    #[tokio::test]
    async fn saved_session_is_resumed_not_overwritten() {
        let provider = Arc::new(MockProvider::new("Sigamos."));
        let state = test_state(provider.clone());
        let store = state.store.clone().unwrap();

        let history: Vec<Turn> = (0..3)
            .flat_map(|i| [Turn::user(format!("pregunta {i}")), Turn::assistant(format!("respuesta {i}"))])
            .collect();
        store
            .save(StoredSession::new("s-saved", "Mi presupuesto", &history))
            .await
            .unwrap();

        let response = api_router(state.clone())
            .oneshot(post_json(
                "/chat",
                serde_json::json!({ "message": "hola", "session_id": "s-saved" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let requests = provider.requests.lock().unwrap().clone();
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 8);
        assert_eq!(messages[1], Turn::user("pregunta 0"));
        assert_eq!(messages[7], Turn::user("hola"));

        let saved = store.get("s-saved").await.unwrap().unwrap();
        assert_eq!(saved.messages.len(), 8);
        assert_eq!(saved.title, "Mi presupuesto");
    }

    #[tokio::test]
    async fn reset_and_delete_sessions() {
        let state = test_state(Arc::new(MockProvider::new("ok")));

        api_router(state.clone())
            .oneshot(post_json(
                "/chat",
                serde_json::json!({ "message": "Hola", "session_id": "s9" }),
            ))
            .await
            .unwrap();

        let response = api_router(state.clone())
            .oneshot(post_json("/sessions/s9/reset", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        {
            let sessions = state.sessions.read().await;
            let session = sessions.get("s9").unwrap().session.lock().await;
            assert!(session.store().is_empty());
        }

        let req = Request::builder().uri("/sessions").body(Body::empty()).unwrap();
        let response = api_router(state.clone()).oneshot(req).await.unwrap();
        let list: SessionListResponse = json_body(response).await;
        assert_eq!(list.sessions.len(), 1);

        let req = Request::builder()
            .method("DELETE")
            .uri("/sessions/s9")
            .body(Body::empty())
            .unwrap();
        let response = api_router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let req = Request::builder().uri("/sessions/s9").body(Body::empty()).unwrap();
        let response = api_router(state.clone()).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = api_router(state)
            .oneshot(post_json("/sessions/s9/reset", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
