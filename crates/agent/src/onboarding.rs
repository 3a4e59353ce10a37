//! Learner onboarding — a deterministic state machine.
//!
//! Each user message sent through the tutor persona advances the machine
//! one step. The current state decides the instruction placed in the
//! learner context block; the model never drives the transitions.
//!
//! ```text
//! Opening ──▶ AwaitingName ──▶ AwaitingGoal ──▶ AwaitingLevel ──▶ Steady
//! ```

use serde::{Deserialize, Serialize};

const MAX_NAME_CHARS: usize = 40;

/// Leading phrases stripped when capturing a name.
const NAME_PREFIXES: &[&str] = &[
    "me llamo ",
    "mi nombre es ",
    "my name is ",
    "i'm ",
    "i am ",
    "soy ",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingState {
    #[default]
    Opening,
    AwaitingName,
    AwaitingGoal,
    AwaitingLevel,
    Steady,
}

/// What the tutor has learned about the student so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub name: Option<String>,
    pub goal: Option<String>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Onboarding {
    state: OnboardingState,
    profile: LearnerProfile,
}

impl Onboarding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> OnboardingState {
        self.state
    }

    pub fn profile(&self) -> &LearnerProfile {
        &self.profile
    }

    /// Consume one user message.
    pub fn advance(&mut self, message: &str) {
        self.state = match self.state {
            OnboardingState::Opening => OnboardingState::AwaitingName,
            OnboardingState::AwaitingName => match extract_name(message) {
                Some(name) => {
                    self.profile.name = Some(name);
                    OnboardingState::AwaitingGoal
                }
                None => OnboardingState::AwaitingName,
            },
            OnboardingState::AwaitingGoal => {
                self.profile.goal = Some(first_line(message));
                OnboardingState::AwaitingLevel
            }
            OnboardingState::AwaitingLevel => {
                self.profile.level = Some(first_line(message));
                OnboardingState::Steady
            }
            OnboardingState::Steady => OnboardingState::Steady,
        };
    }

    /// Instruction for the reply to the message just consumed.
    pub fn instruction(&self) -> String {
        let name = self.profile.name.as_deref().unwrap_or("the student");
        match self.state {
            OnboardingState::Opening | OnboardingState::AwaitingName => {
                "Warmly greet the student, introduce yourself as their English teacher and ask for their name."
                    .to_string()
            }
            OnboardingState::AwaitingGoal => format!(
                "The student's name is \"{name}\". Greet them by name and ask what they want to achieve with English. Mention this is a personalized course."
            ),
            OnboardingState::AwaitingLevel => {
                "Based on their goal, ask a simple question to assess their current English level. Keep it casual and encouraging."
                    .to_string()
            }
            OnboardingState::Steady => {
                let goal = self.profile.goal.as_deref().unwrap_or("their goals");
                let level = self.profile.level.as_deref().unwrap_or("their level");
                format!(
                    "Continue the lesson with {name}, aligned with \"{goal}\" and adapted to \"{level}\"."
                )
            }
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or("").trim().to_string()
}

fn extract_name(message: &str) -> Option<String> {
    let line = first_line(message);
    let lower = line.to_lowercase();

    let rest = NAME_PREFIXES
        .iter()
        .find(|p| lower.starts_with(**p))
        .and_then(|p| line.get(p.len()..))
        .unwrap_or(line.as_str());

    let name: String = rest
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() || c == '¡' || c == '¿')
        .chars()
        .take(MAX_NAME_CHARS)
        .collect();

    let name = name.trim().to_string();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_through_every_state() {
        let mut o = Onboarding::new();
        assert_eq!(o.state(), OnboardingState::Opening);

        o.advance("Hola");
        assert_eq!(o.state(), OnboardingState::AwaitingName);
        assert!(o.instruction().contains("ask for their name"));

        o.advance("Me llamo Lucía.");
        assert_eq!(o.state(), OnboardingState::AwaitingGoal);
        assert_eq!(o.profile().name.as_deref(), Some("Lucía"));
        assert!(o.instruction().contains("\"Lucía\""));

        o.advance("Quiero viajar a Londres");
        assert_eq!(o.state(), OnboardingState::AwaitingLevel);
        assert_eq!(o.profile().goal.as_deref(), Some("Quiero viajar a Londres"));

        o.advance("Básico");
        assert_eq!(o.state(), OnboardingState::Steady);
        assert!(o.instruction().contains("Lucía"));
        assert!(o.instruction().contains("Básico"));

        o.advance("What does 'luggage' mean?");
        assert_eq!(o.state(), OnboardingState::Steady);
    }

    #[test]
    fn bare_prefix_keeps_waiting_for_name() {
        let mut o = Onboarding::new();
        o.advance("Hola");
        o.advance("!!!");
        assert_eq!(o.state(), OnboardingState::AwaitingName);
    }

    #[test]
    fn name_extraction_strips_phrases() {
        assert_eq!(extract_name("My name is John").as_deref(), Some("John"));
        assert_eq!(extract_name("soy Pedro!").as_deref(), Some("Pedro"));
        assert_eq!(extract_name("Ana").as_deref(), Some("Ana"));
        let long = "x".repeat(100);
        assert_eq!(extract_name(&long).unwrap().chars().count(), MAX_NAME_CHARS);
    }

    #[test]
    fn reset_returns_to_opening() {
        let mut o = Onboarding::new();
        o.advance("Hola");
        o.advance("Ana");
        o.reset();
        assert_eq!(o.state(), OnboardingState::Opening);
        assert!(o.profile().name.is_none());
    }
}
