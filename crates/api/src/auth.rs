//! Bearer-token authentication.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use common::Actor;
use store::MarketplaceStore;

use crate::error::ApiError;
use crate::state::AppState;

/// The actor behind the request's `Authorization: Bearer` token.
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Actor);

impl<S> FromRequestParts<Arc<AppState<S>>> for CurrentActor
where
    S: MarketplaceStore + Clone + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or_else(|| ApiError::Unauthenticated("missing bearer token".to_string()))?;

        let actor = state
            .identity
            .resolve_actor(token)
            .await
            .map_err(|e| ApiError::Unauthenticated(e.to_string()))?;

        tracing::debug!(user_id = %actor.user_id, role = %actor.role, "request authenticated");
        Ok(CurrentActor(actor))
    }
}
