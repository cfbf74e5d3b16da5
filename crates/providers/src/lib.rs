//! LLM provider implementations for CoursePilot.
//!
//! The turn pipeline talks to the `Provider` trait from core; this crate
//! supplies the concrete backends. Today that is a single OpenAI-compatible
//! HTTP client, which covers OpenAI itself plus every proxy and local
//! server that mimics its API surface.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use coursepilot_config::AppConfig;
use coursepilot_core::{Error, Provider};
use std::sync::Arc;

/// Build the configured provider, or fail with `NotConfigured` when no
/// API key is present. The orchestrator rejects turns before any work
/// begins if this fails.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, Error> {
    let api_key = config
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Error::NotConfigured("no provider API key configured".into()))?;

    Ok(Arc::new(OpenAiCompatProvider::new(
        "openai",
        &config.api_base_url,
        api_key,
    )))
}
