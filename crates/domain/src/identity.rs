//! Identity provider seam.
//!
//! Session issuance and OAuth federation happen elsewhere; the core only
//! needs a verified `(user id, role)` for each request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::Actor;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors raised while resolving a credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// No credential was presented.
    #[error("Missing credential")]
    Missing,

    /// The credential is not recognised.
    #[error("Unknown credential")]
    Unknown,
}

/// Resolves a request credential to the acting user and role.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve_actor(&self, credential: &str) -> Result<Actor, IdentityError>;
}

/// Identity provider backed by a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenIdentity {
    tokens: Arc<RwLock<HashMap<String, Actor>>>,
}

impl StaticTokenIdentity {
    /// Creates a provider with no tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider from `(token, actor)` pairs.
    pub fn from_tokens(tokens: impl IntoIterator<Item = (String, Actor)>) -> Self {
        Self {
            tokens: Arc::new(RwLock::new(tokens.into_iter().collect())),
        }
    }

    /// Registers or replaces a token.
    pub async fn register(&self, token: impl Into<String>, actor: Actor) {
        self.tokens.write().await.insert(token.into(), actor);
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenIdentity {
    async fn resolve_actor(&self, credential: &str) -> Result<Actor, IdentityError> {
        if credential.is_empty() {
            return Err(IdentityError::Missing);
        }
        self.tokens
            .read()
            .await
            .get(credential)
            .copied()
            .ok_or(IdentityError::Unknown)
    }
}
