//! `neutro sessions` — Saved session management.

use std::sync::Arc;

use neutro_config::{AppConfig, StoreBackend};
use neutro_core::store::{SessionStore, StoredKind};

async fn open() -> Result<Arc<dyn SessionStore>, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if config.store.backend == StoreBackend::Memory {
        eprintln!("  Note: the memory store only lives inside a running process.");
    }
    neutro_gateway::open_store(&config)
        .await?
        .ok_or_else(|| "Session storage is disabled (store.backend = \"none\")".into())
}

pub async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let store = open().await?;
    let sessions = store.list().await?;

    if sessions.is_empty() {
        println!("  No saved sessions.");
        return Ok(());
    }

    for s in &sessions {
        println!(
            "  {}  {}  {:>3} msgs  {}",
            s.timestamp.format("%Y-%m-%d %H:%M"),
            s.id,
            s.messages.len(),
            s.title
        );
    }
    Ok(())
}

pub async fn show(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open().await?;
    let session = store
        .get(id)
        .await?
        .ok_or_else(|| format!("Session '{id}' not found"))?;

    println!("  {} ({})", session.title, session.timestamp.to_rfc3339());
    println!();
    for m in &session.messages {
        let who = match m.kind {
            StoredKind::User => "You",
            StoredKind::Bot => "Bot",
        };
        println!("  {who} > {}", m.content);
    }
    Ok(())
}

pub async fn delete(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open().await?;
    if store.delete(id).await? {
        println!("  Deleted session {id}");
        Ok(())
    } else {
        Err(format!("Session '{id}' not found").into())
    }
}
