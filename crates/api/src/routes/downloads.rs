//! Download entitlement endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::GrantId;
use domain::AssetLocator;
use store::{DownloadGrant, MarketplaceStore};

use super::parse_id;
use crate::auth::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /downloads: the caller's grants, exhausted ones included.
#[tracing::instrument(skip(state))]
pub async fn list<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<DownloadGrant>>, ApiError> {
    Ok(Json(state.downloads.list_for_owner(actor.user_id).await?))
}

/// POST /downloads/{id}/redeem: spend one download and get the asset URL.
#[tracing::instrument(skip(state))]
pub async fn redeem<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<AssetLocator>, ApiError> {
    let grant_id: GrantId = parse_id("grant id", &id)?;
    Ok(Json(state.downloads.redeem(grant_id, actor.user_id).await?))
}
