//! Completion provider implementations for Neutro.
//!
//! All providers implement the `neutro_core::Provider` trait.
//! The router selects the correct provider based on configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::{OpenAiCompatProvider, extract_reply};
pub use router::{ProviderRouter, build_for_persona, build_from_config};
