//! Learner profile context for the tutor persona.

use async_trait::async_trait;

use super::{ContextBuilder, ContextSnapshot};
use crate::onboarding::{LearnerProfile, OnboardingState};
use crate::session::ChatSession;

#[derive(Debug, Clone, PartialEq)]
pub struct LearnerSnapshot {
    pub profile: LearnerProfile,
    pub state: OnboardingState,
    /// What the next reply should do
    pub instruction: String,
}

impl LearnerSnapshot {
    pub fn render(&self) -> String {
        let mut lines = vec!["Student profile:".to_string()];
        if let Some(name) = &self.profile.name {
            lines.push(format!("Name: {name}"));
        }
        if let Some(goal) = &self.profile.goal {
            lines.push(format!("Goal: {goal}"));
        }
        if let Some(level) = &self.profile.level {
            lines.push(format!("Level: {level}"));
        }
        if lines.len() == 1 {
            lines.push("Not known yet.".to_string());
        }
        format!("{}\n\nNext step: {}", lines.join("\n"), self.instruction)
    }
}

/// Renders the session's onboarding state. Always produces a snapshot.
#[derive(Debug, Default)]
pub struct LearnerContextBuilder;

#[async_trait]
impl ContextBuilder for LearnerContextBuilder {
    async fn snapshot(&self, session: &ChatSession) -> Option<ContextSnapshot> {
        let onboarding = session.onboarding();
        Some(ContextSnapshot::Learner(LearnerSnapshot {
            profile: onboarding.profile().clone(),
            state: onboarding.state(),
            instruction: onboarding.instruction(),
        }))
    }
}
