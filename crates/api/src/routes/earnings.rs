//! Vendor earnings endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{CommissionRate, UserId};
use domain::EarningsSummary;
use serde::Deserialize;
use store::{MarketplaceStore, VendorAccount};

use super::parse_id;
use crate::auth::CurrentActor;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SetRateRequest {
    /// Platform rate in basis points; 1500 is 15%.
    pub commission_rate_bps: u32,
}

/// GET /vendors/{id}/earnings
#[tracing::instrument(skip(state))]
pub async fn summary<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<EarningsSummary>, ApiError> {
    let vendor_id: UserId = parse_id("vendor id", &id)?;
    Ok(Json(state.earnings.summary(vendor_id, actor).await?))
}

/// PUT /vendors/{id}/commission-rate: admin sets the rate for future settlements.
#[tracing::instrument(skip(state, req))]
pub async fn set_rate<S: MarketplaceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<SetRateRequest>,
) -> Result<Json<VendorAccount>, ApiError> {
    let vendor_id: UserId = parse_id("vendor id", &id)?;
    let rate = CommissionRate::from_bps(req.commission_rate_bps);
    Ok(Json(
        state
            .earnings
            .set_commission_rate(vendor_id, actor, rate)
            .await?,
    ))
}
