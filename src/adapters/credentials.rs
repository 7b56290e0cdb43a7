//! Credential store implementations
//!
//! Tokens are looked up fresh on every subscription attempt so a refreshed
//! token is picked up on the next reconnect.

use std::collections::HashMap;

use crate::adapters::traits::CredentialStore;

/// Reads tokens from environment variables named `<PREFIX><KEY>` (upper-cased)
///
/// With the default prefix `ALPHA_`, key `access_token` maps to `ALPHA_ACCESS_TOKEN`.
#[derive(Debug, Clone)]
pub struct EnvCredentialStore {
    prefix: String,
}

impl EnvCredentialStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn var_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key).to_ascii_uppercase()
    }
}

impl CredentialStore for EnvCredentialStore {
    fn token(&self, key: &str) -> Option<String> {
        std::env::var(self.var_name(key))
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Fixed in-memory tokens
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    tokens: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens.insert(key.into(), token.into());
        self
    }
}

impl CredentialStore for StaticCredentials {
    fn token(&self, key: &str) -> Option<String> {
        self.tokens.get(key).cloned()
    }
}
