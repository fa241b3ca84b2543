//! LLM provider fallback selection.
//!
//! Walks an ordered list of provider descriptors and settles on the first one
//! whose credential is present (or that needs none) and whose client can be
//! constructed. When nothing qualifies the first descriptor is returned anyway.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    /// Model identifier, optionally prefixed with a routing hint (`groq/`, `ollama/`).
    pub model: String,
    /// Environment variable holding the API key. `None` for local models.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_temperature() -> f64 {
    0.7
}

impl ProviderConfig {
    pub fn new(name: &str, model: &str, api_key_env: Option<&str>, temperature: f64) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            api_key_env: api_key_env.map(String::from),
            temperature,
            base_url: None,
        }
    }
}

/// Where credentials come from. The process environment in production.
pub trait CredentialSource {
    fn get(&self, var: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl CredentialSource for ProcessEnv {
    fn get(&self, var: &str) -> Option<String> {
        std::env::var(var).ok().filter(|v| !v.trim().is_empty())
    }
}

impl CredentialSource for HashMap<String, String> {
    fn get(&self, var: &str) -> Option<String> {
        HashMap::get(self, var)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }
}

/// Outcome of provider selection.
#[derive(Debug)]
pub struct Selection<C> {
    pub provider: ProviderConfig,
    /// Empty when the provider needs no key, or when the fallback had none.
    pub api_key: String,
    /// The constructed client. `None` only for the fallback descriptor.
    pub client: Option<C>,
    pub fallback: bool,
}

/// Select the first usable provider.
///
/// `build` is called at most once per descriptor, with the credential when
/// one is configured. A descriptor whose credential variable is unset is
/// skipped without calling `build`.
pub fn select_provider<C, F>(
    providers: &[ProviderConfig],
    credentials: &dyn CredentialSource,
    mut build: F,
) -> Result<Selection<C>>
where
    F: FnMut(&ProviderConfig, Option<&str>) -> Result<C>,
{
    let first = providers
        .first()
        .ok_or_else(|| Error::config("no LLM providers configured"))?;

    info!(candidates = providers.len(), "checking available LLM providers");

    for config in providers {
        let api_key = match &config.api_key_env {
            None => None,
            Some(var) => match credentials.get(var) {
                Some(key) => Some(key),
                None => {
                    warn!(provider = %config.name, env = %var, "API key not found in environment");
                    continue;
                }
            },
        };

        info!(provider = %config.name, local = api_key.is_none(), "trying provider");
        match build(config, api_key.as_deref()) {
            Ok(client) => {
                info!(provider = %config.name, model = %config.model, "using provider");
                return Ok(Selection {
                    provider: config.clone(),
                    api_key: api_key.unwrap_or_default(),
                    client: Some(client),
                    fallback: false,
                });
            }
            Err(e) => {
                let msg: String = e.to_string().chars().take(100).collect();
                warn!(provider = %config.name, error = %msg, "provider failed");
            }
        }
    }

    // Proceed with the first descriptor even if its credential is missing; the
    // live call fails later rather than here.
    let api_key = first
        .api_key_env
        .as_deref()
        .and_then(|var| credentials.get(var))
        .unwrap_or_default();
    if api_key.is_empty() && first.api_key_env.is_some() {
        warn!(provider = %first.name, "using fallback LLM configuration without a credential");
    } else {
        warn!(provider = %first.name, "using fallback LLM configuration");
    }
    Ok(Selection {
        provider: first.clone(),
        api_key,
        client: None,
        fallback: true,
    })
}
