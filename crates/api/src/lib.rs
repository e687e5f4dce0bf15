//! HTTP API server with observability for the marketplace core.
//!
//! Exposes cart, wishlist, commission, download and earnings endpoints
//! behind bearer-token authentication, with structured logging (tracing)
//! and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{
    BroadcastEventChannel, EventChannel, IdentityProvider, Notification, StaticTokenIdentity,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::MarketplaceStore;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketplaceStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{cart, commissions, downloads, earnings, wishlist};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(cart::summary::<S>).delete(cart::clear::<S>))
        .route("/cart/items", post(cart::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            put(cart::set_quantity::<S>).delete(cart::remove_item::<S>),
        )
        .route("/wishlist", get(wishlist::list::<S>))
        .route("/wishlist/{product_id}/toggle", post(wishlist::toggle::<S>))
        .route(
            "/commissions",
            post(commissions::create::<S>).get(commissions::list::<S>),
        )
        .route("/commissions/{id}", get(commissions::get::<S>))
        .route(
            "/commissions/{id}/transitions",
            post(commissions::transition::<S>),
        )
        .route(
            "/commissions/{id}/status",
            put(commissions::override_status::<S>),
        )
        .route("/downloads", get(downloads::list::<S>))
        .route("/downloads/{id}/redeem", post(downloads::redeem::<S>))
        .route("/vendors/{id}/earnings", get(earnings::summary::<S>))
        .route(
            "/vendors/{id}/commission-rate",
            put(earnings::set_rate::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state: broadcast notifications and the
/// token table from `config`.
pub fn create_default_state<S: MarketplaceStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> (Arc<AppState<S>>, BroadcastEventChannel) {
    let channel = BroadcastEventChannel::default();
    let events: Arc<dyn EventChannel> = Arc::new(channel.clone());
    let identity: Arc<dyn IdentityProvider> =
        Arc::new(StaticTokenIdentity::from_tokens(config.tokens.clone()));

    let state = Arc::new(AppState::new(store, config, events, identity));
    (state, channel)
}

/// Drains notifications into the log until the channel closes.
///
/// No push transport is wired to the server yet, so this is the only
/// subscriber the binary attaches. Returns how many notifications were seen.
pub async fn log_notifications(mut receiver: broadcast::Receiver<Notification>) -> u64 {
    let mut seen = 0;
    loop {
        match receiver.recv().await {
            Ok(notification) => {
                seen += 1;
                tracing::info!(
                    target_user = %notification.target,
                    event_type = notification.event.event_type(),
                    "notification published"
                );
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "notification log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => return seen,
        }
    }
}
