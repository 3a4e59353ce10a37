//! The conversation pipeline for Neutro.
//!
//! One send runs through these steps:
//!
//! 1. **Append** the user turn to the session's rolling window
//! 2. **Snapshot** context (financial KPIs or the learner profile)
//! 3. **Assemble** the request: persona + context, then recent turns
//! 4. **Complete** through the configured provider (the only suspend point)
//! 5. **Format** the reply (markup to HTML, colourised figures)
//! 6. **Append** the assistant turn and hand the text back
//!
//! Any failure along the way becomes the persona's fallback message.

pub mod assembler;
pub mod auxiliary;
pub mod context;
pub mod engine;
pub mod onboarding;
pub mod postprocess;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use assembler::{Persona, PromptAssembler};
pub use auxiliary::AuxiliaryTasks;
pub use context::{
    ContextBuilder, ContextSnapshot, FinancialContextBuilder, FinancialSnapshot,
    LearnerContextBuilder, LearnerSnapshot,
};
pub use engine::{ChatEngine, Reply};
pub use onboarding::{LearnerProfile, Onboarding, OnboardingState};
pub use postprocess::ResponseFormatter;
pub use session::ChatSession;
