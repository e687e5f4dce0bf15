//! Commission lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CommissionId, CommissionStatus};
use domain::{RequestCommission, TransitionData, Verb};
use serde::Deserialize;
use store::{Commission, MarketplaceStore};

use super::parse_id;
use crate::auth::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TransitionRequest {
    pub verb: Verb,
    #[serde(flatten)]
    pub data: TransitionData,
}

#[derive(Deserialize)]
pub struct OverrideRequest {
    pub status: CommissionStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /commissions: a customer opens a commission with a vendor.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<RequestCommission>,
) -> Result<(StatusCode, Json<Commission>), ApiError> {
    let commission = state.commissions.request(actor, req).await?;
    Ok((StatusCode::CREATED, Json(commission)))
}

/// GET /commissions: commissions where the caller is customer or vendor.
#[tracing::instrument(skip(state))]
pub async fn list<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<Commission>>, ApiError> {
    Ok(Json(state.commissions.list_for_actor(actor).await?))
}

/// GET /commissions/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<Commission>, ApiError> {
    let id: CommissionId = parse_id("commission id", &id)?;
    Ok(Json(state.commissions.get(id, actor).await?))
}

/// POST /commissions/{id}/transitions: apply a verb such as `accept` or `deliver`.
#[tracing::instrument(skip(state, req), fields(verb = %req.verb))]
pub async fn transition<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Commission>, ApiError> {
    let id: CommissionId = parse_id("commission id", &id)?;
    let commission = state
        .commissions
        .transition(id, actor, req.verb, req.data)
        .await?;
    Ok(Json(commission))
}

/// PUT /commissions/{id}/status: admin override to any non-terminal target.
#[tracing::instrument(skip(state, req), fields(status = %req.status))]
pub async fn override_status<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<OverrideRequest>,
) -> Result<Json<Commission>, ApiError> {
    let id: CommissionId = parse_id("commission id", &id)?;
    let commission = state
        .commissions
        .override_status(id, actor, req.status, req.notes)
        .await?;
    Ok(Json(commission))
}
