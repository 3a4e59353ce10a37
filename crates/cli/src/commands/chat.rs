//! `neutro chat` — Interactive or single-message chat mode.

use std::io::Write;
use std::path::PathBuf;
use std::sync::LazyLock;

use neutro_agent::{ChatEngine, ChatSession};
use neutro_config::AppConfig;
use neutro_core::ledger::LedgerSource;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").unwrap());

pub async fn run(
    persona: Option<String>,
    user: Option<String>,
    message: Option<String>,
    ledger_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    super::require_api_key(&config)?;

    if ledger_path.is_some() {
        config.ledger.path = ledger_path;
    }
    let persona_key = persona.unwrap_or_else(|| config.default_persona.clone());
    let persona_config = config
        .persona(&persona_key)
        .ok_or_else(|| format!("Unknown persona '{persona_key}'. Known: {}", config.persona_names().join(", ")))?;

    let ledger = neutro_gateway::open_ledger(&config)?;
    let store = neutro_gateway::open_store(&config).await?;
    let provider = neutro_providers::build_for_persona(&config, &persona_config);
    let engine = ChatEngine::from_config(&config, &persona_key, provider, ledger.clone())?;

    let mut session = engine.new_session();
    if let Some(user_id) = &user {
        session = session.with_user(user_id.clone());
    }

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let reply = engine.send(&mut session, &msg).await;
        eprint!("\r              \r");
        println!("{}", to_terminal(&reply.text));
    } else {
        let name = display_name(ledger.as_deref(), user.as_deref()).await;
        interactive(&engine, &mut session, name.as_deref()).await?;
    }

    if let Some(store) = store {
        if !session.store().is_empty() {
            if let Err(e) = store.save(session.to_stored()).await {
                warn!(error = %e, "Failed to save session");
            }
        }
    }

    Ok(())
}

async fn interactive(
    engine: &ChatEngine,
    session: &mut ChatSession,
    name: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let persona = engine.persona();

    println!();
    println!("  {} — Interactive Mode", persona.display_name);
    println!();
    println!("  Model:     {}", engine.model());
    println!("  History:   {} turns", engine.history_limit());
    println!("  Session:   {}", session.id);
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type '/reset' to start over, 'exit' or Ctrl+C to quit.");
    println!();
    println!("  {} > {}", persona.display_name, engine.welcome(name));
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "exit" | "quit" => break,
            "/reset" => {
                session.reset();
                println!("  (session cleared)");
                println!();
            }
            text => {
                eprint!("  ...");
                let reply = engine.send(session, text).await;
                eprint!("\r     \r");
                println!();
                for out in to_terminal(&reply.text).lines() {
                    println!("  {} > {out}", persona.display_name);
                }
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye! 👋");
    println!();
    Ok(())
}

/// First name of the ledger user, if any.
async fn display_name(ledger: Option<&dyn LedgerSource>, user: Option<&str>) -> Option<String> {
    let (ledger, user) = (ledger?, user?);
    match ledger.display_name(user).await {
        Ok(name) => name.and_then(|n| n.split_whitespace().next().map(String::from)),
        Err(e) => {
            warn!(user, error = %e, "Profile lookup failed");
            None
        }
    }
}

/// Turn the reply markup back into plain terminal text.
fn to_terminal(html: &str) -> String {
    let text = html
        .replace("</p><p>", "\n\n")
        .replace("<br>", "\n")
        .replace("<li>", "• ")
        .replace("</li>", "\n");
    TAG_RE.replace_all(&text, "").trim_end().to_string()
}
