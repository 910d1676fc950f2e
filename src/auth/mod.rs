//! Bearer credential supply for the streaming and REST connections.
//!
//! The engine never manages credential storage itself. It asks a
//! [`TokenSupplier`] for the current token whenever it opens a connection or
//! issues a REST call, and tells the supplier to [`invalidate`] its cache
//! after the server rejects a credential so the next attempt carries a fresh
//! one instead of replaying a stale token.
//!
//! [`invalidate`]: TokenSupplier::invalidate

use async_trait::async_trait;

use crate::error::{ClientError, ClientResult};

/// Source of the bearer credential used to authenticate connections.
#[async_trait]
pub trait TokenSupplier: Send + Sync {
    /// Returns the current token, fetching or refreshing it if needed.
    async fn token(&self) -> ClientResult<String>;

    /// Drops any cached credential so the next [`token`](Self::token) call
    /// re-fetches. Called after an authentication failure.
    async fn invalidate(&self) {}
}

/// Supplier backed by a fixed token. Useful for tests and short-lived tools.
pub struct StaticTokenSupplier {
    token: String,
}

impl StaticTokenSupplier {
    /// Create a supplier that always returns the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSupplier for StaticTokenSupplier {
    async fn token(&self) -> ClientResult<String> {
        Ok(self.token.clone())
    }
}

/// Supplier that reads the token from an environment variable on every call.
pub struct EnvTokenSupplier {
    env_var: String,
}

impl EnvTokenSupplier {
    /// Create a supplier reading the named environment variable.
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
        }
    }
}

#[async_trait]
impl TokenSupplier for EnvTokenSupplier {
    async fn token(&self) -> ClientResult<String> {
        std::env::var(&self.env_var)
            .map_err(|_| ClientError::Configuration(format!("{} not set", self.env_var)))
    }
}
