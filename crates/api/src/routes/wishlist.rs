//! Wishlist endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ProductId;
use domain::ToggleOutcome;
use store::{MarketplaceStore, WishlistEntry};

use super::parse_id;
use crate::auth::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /wishlist
#[tracing::instrument(skip(state))]
pub async fn list<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<WishlistEntry>>, ApiError> {
    Ok(Json(state.wishlist.list(actor.user_id).await?))
}

/// POST /wishlist/{product_id}/toggle
#[tracing::instrument(skip(state))]
pub async fn toggle<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(product_id): Path<String>,
) -> Result<Json<ToggleOutcome>, ApiError> {
    let product_id: ProductId = parse_id("product id", &product_id)?;
    Ok(Json(state.wishlist.toggle(actor.user_id, product_id).await?))
}
