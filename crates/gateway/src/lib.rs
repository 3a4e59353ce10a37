//! HTTP gateway for Neutro.
//!
//! Serves the JSON API under `/api`, a health check, and (optionally) the
//! static chat pages from a configured directory.
//!
//! Built on Axum. Sessions live in process memory; each one sits behind its
//! own async mutex so a second send on the same session is answered with
//! `409 Conflict` instead of interleaving with the first.

pub mod api;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::DefaultBodyLimit;
use axum::{Router, http::HeaderValue, response::Json, routing::get};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, info, warn};

use neutro_agent::{AuxiliaryTasks, ChatEngine, ChatSession};
use neutro_config::{AppConfig, PersonaConfig, StoreBackend};
use neutro_core::ledger::LedgerSource;
use neutro_core::provider::Provider;
use neutro_core::store::{SessionStore, StoredSession};
use neutro_memory::{FileSessionStore, InMemoryLedger, InMemorySessionStore};

/// Maximum number of in-memory sessions before the least recently used are
/// evicted.
const MAX_SESSIONS: usize = 1_000;

/// One live session and the persona it was opened with.
pub struct SessionSlot {
    pub persona: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Tick of the last lookup, for eviction
    pub last_used: u64,
    pub session: Arc<Mutex<ChatSession>>,
}

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    /// One engine per persona key
    pub engines: HashMap<String, Arc<ChatEngine>>,
    pub auxiliary: AuxiliaryTasks,
    pub sessions: RwLock<HashMap<String, SessionSlot>>,
    pub store: Option<Arc<dyn SessionStore>>,
    pub ledger: Option<Arc<dyn LedgerSource>>,
    ticks: AtomicU64,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    /// Build the state from configuration.
    ///
    /// `provider_for` supplies the completion provider of each persona, so
    /// tests can hand in scripted ones.
    pub fn new<F>(
        config: AppConfig,
        provider_for: F,
        ledger: Option<Arc<dyn LedgerSource>>,
        store: Option<Arc<dyn SessionStore>>,
    ) -> neutro_core::Result<Self>
    where
        F: Fn(&PersonaConfig) -> Arc<dyn Provider>,
    {
        let mut engines = HashMap::new();
        for key in config.persona_names() {
            let Some(persona) = config.persona(&key) else {
                continue;
            };
            let provider = provider_for(&persona);
            let engine = ChatEngine::from_config(&config, &key, provider, ledger.clone())?;
            engines.insert(key, Arc::new(engine));
        }

        let default = config
            .persona(&config.default_persona)
            .ok_or_else(|| neutro_core::Error::Config {
                message: format!("Unknown default persona '{}'", config.default_persona),
            })?;
        let auxiliary = AuxiliaryTasks::new(provider_for(&default), config.model_for(&default))
            .with_timeout(std::time::Duration::from_secs(config.request_timeout_secs));

        Ok(Self {
            config,
            engines,
            auxiliary,
            sessions: RwLock::new(HashMap::new()),
            store,
            ledger,
            ticks: AtomicU64::new(0),
        })
    }

    /// The engine for a persona, or the default persona's.
    pub fn engine(&self, persona: Option<&str>) -> Option<Arc<ChatEngine>> {
        let key = persona.unwrap_or(&self.config.default_persona);
        self.engines.get(key).cloned()
    }

    /// The saved record for a session that is not live, if any.
    ///
    /// Store failures are logged and treated as "nothing saved".
    pub async fn saved_session(&self, id: &str) -> Option<StoredSession> {
        let store = self.store.as_ref()?;
        if self.sessions.read().await.contains_key(id) {
            return None;
        }
        match store.get(id).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(session = %id, error = %e, "Failed to load saved session");
                None
            }
        }
    }

    /// Look up a live session, creating it with `create` when absent.
    ///
    /// Returns the persona key and the session handle.
    pub async fn session_or_insert(
        &self,
        id: &str,
        persona: &str,
        create: impl FnOnce() -> ChatSession,
    ) -> (String, Arc<Mutex<ChatSession>>) {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
        let mut sessions = self.sessions.write().await;

        if let Some(slot) = sessions.get_mut(id) {
            slot.last_used = tick;
            return (slot.persona.clone(), slot.session.clone());
        }

        if sessions.len() >= MAX_SESSIONS {
            if let Some(stale) = sessions
                .iter()
                .min_by_key(|(_, s)| s.last_used)
                .map(|(k, _)| k.clone())
            {
                debug!(session = %stale, "Evicting least recently used session");
                sessions.remove(&stale);
            }
        }

        let session = Arc::new(Mutex::new(create()));
        sessions.insert(
            id.to_string(),
            SessionSlot {
                persona: persona.to_string(),
                created_at: chrono::Utc::now(),
                last_used: tick,
                session: session.clone(),
            },
        );
        (persona.to_string(), session)
    }
}

/// Build the Axum router with all gateway routes and layers.
pub fn build_router(state: SharedState) -> Router {
    let config = &state.config.gateway;
    let body_limit = config.body_limit_bytes;
    let static_dir = config.static_dir.clone();
    let cors = cors_layer(&config.allowed_origins);

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api::api_router(state.clone()));

    if let Some(dir) = static_dir {
        router = router.fallback_service(static_service(dir));
    }

    let router = router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(tower_http::trace::TraceLayer::new_for_http());

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn static_service(dir: PathBuf) -> ServeDir<ServeFile> {
    let index = dir.join("index.html");
    ServeDir::new(dir).fallback(ServeFile::new(index))
}

/// CORS for the configured origins; `None` keeps same-origin only.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::DELETE,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
            .max_age(std::time::Duration::from_secs(3600)),
    )
}

/// Open the session store selected by configuration.
pub async fn open_store(
    config: &AppConfig,
) -> Result<Option<Arc<dyn SessionStore>>, neutro_core::StoreError> {
    let store: Option<Arc<dyn SessionStore>> = match config.store.backend {
        StoreBackend::None => None,
        StoreBackend::Memory => Some(Arc::new(InMemorySessionStore::new())),
        StoreBackend::File => Some(Arc::new(FileSessionStore::new(config.store.resolved_path()))),
        StoreBackend::Sqlite => {
            let url = format!("sqlite://{}", config.store.resolved_path().display());
            Some(Arc::new(neutro_memory::SqliteSessionStore::new(&url).await?))
        }
    };
    Ok(store)
}

/// Load the ledger export named by configuration, if any.
pub fn open_ledger(
    config: &AppConfig,
) -> Result<Option<Arc<dyn LedgerSource>>, neutro_core::LedgerError> {
    match &config.ledger.path {
        Some(path) => Ok(Some(Arc::new(InMemoryLedger::load(path)?))),
        None => Ok(None),
    }
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = open_store(&config).await?;
    let ledger = open_ledger(&config)?;

    let provider_config = config.clone();
    let state = GatewayState::new(
        config,
        |persona| neutro_providers::build_for_persona(&provider_config, persona),
        ledger,
        store,
    )?;

    info!(
        addr = %addr,
        personas = ?state.engines.keys().collect::<Vec<_>>(),
        store = state.store.as_ref().map(|s| s.name()).unwrap_or("none"),
        "Gateway starting"
    );

    let app = build_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
