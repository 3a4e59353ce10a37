//! Prompt assembly — persona + context snapshot + recent turns.
//!
//! The assembled request always has exactly one system entry, in first
//! position:
//!
//! ```text
//! [system: persona ⏎⏎ rules ⏎⏎ context block] [turn 1] … [turn n]
//! ```
//!
//! Assembly is pure: identical inputs always produce identical outputs.

use neutro_config::PersonaConfig;
use neutro_core::{Role, Turn};

use crate::context::ContextSnapshot;

/// The persona/style data the system entry is rendered from.
#[derive(Debug, Clone)]
pub struct Persona {
    pub text: String,
    pub format_rules: Vec<String>,
    pub forbidden_topics: Vec<String>,
    pub greeting_rule: Option<String>,
}

impl Persona {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format_rules: Vec::new(),
            forbidden_topics: Vec::new(),
            greeting_rule: None,
        }
    }

    /// Render the persona part of the system entry.
    pub fn render(&self) -> String {
        let mut sections = vec![self.text.trim().to_string()];

        if !self.format_rules.is_empty() {
            sections.push(bullets(&self.format_rules));
        }
        if let Some(rule) = &self.greeting_rule {
            sections.push(rule.trim().to_string());
        }
        if !self.forbidden_topics.is_empty() {
            sections.push(bullets(&self.forbidden_topics));
        }

        sections.join("\n\n")
    }
}

impl From<&PersonaConfig> for Persona {
    fn from(config: &PersonaConfig) -> Self {
        Self {
            text: config.persona.clone(),
            format_rules: config.format_rules.clone(),
            forbidden_topics: config.forbidden_topics.clone(),
            greeting_rule: config.greeting_rule.clone(),
        }
    }
}

fn bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("- {}", i.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stateless assembler. Create one and reuse it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptAssembler;

impl PromptAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Build the request message list.
    ///
    /// System turns inside `recent` are dropped so the persona entry stays
    /// the only one.
    pub fn assemble(
        &self,
        persona: &Persona,
        snapshot: Option<&ContextSnapshot>,
        recent: &[Turn],
    ) -> Vec<Turn> {
        let mut system = persona.render();
        if let Some(snapshot) = snapshot {
            system = format!("{}\n\n{}", system, snapshot.render());
        }

        let mut messages = Vec::with_capacity(recent.len() + 1);
        messages.push(Turn::system(system));
        messages.extend(recent.iter().filter(|t| t.role() != Role::System).cloned());
        messages
    }
}
