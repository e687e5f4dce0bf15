//! Cart endpoints. Every cart belongs to the authenticated user.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::ProductId;
use domain::CartSummary;
use serde::{Deserialize, Serialize};
use store::{CartLine, MarketplaceStore};

use super::parse_id;
use crate::auth::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

#[derive(Serialize)]
pub struct ClearedResponse {
    pub removed: u64,
}

/// GET /cart: the cart priced at current catalog prices.
#[tracing::instrument(skip(state))]
pub async fn summary<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<CartSummary>, ApiError> {
    Ok(Json(state.cart.summary(actor.user_id).await?))
}

/// POST /cart/items: add to a line, creating it if needed.
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartLine>), ApiError> {
    let line = state
        .cart
        .add_line(actor.user_id, req.product_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(line)))
}

/// PUT /cart/items/{product_id}: set a line's quantity; zero or less removes it.
#[tracing::instrument(skip(state, req))]
pub async fn set_quantity<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(product_id): Path<String>,
    Json(req): Json<SetQuantityRequest>,
) -> Result<Response, ApiError> {
    let product_id: ProductId = parse_id("product id", &product_id)?;
    let line = state
        .cart
        .set_quantity(actor.user_id, product_id, req.quantity)
        .await?;

    Ok(match line {
        Some(line) => Json(line).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

/// DELETE /cart/items/{product_id}
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(product_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let product_id: ProductId = parse_id("product id", &product_id)?;
    state.cart.remove_line(actor.user_id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /cart
#[tracing::instrument(skip(state))]
pub async fn clear<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<ClearedResponse>, ApiError> {
    let removed = state.cart.clear(actor.user_id).await?;
    Ok(Json(ClearedResponse { removed }))
}
