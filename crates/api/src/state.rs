//! Shared application state.

use std::sync::Arc;

use domain::{
    CartService, CommissionService, DownloadService, EarningsService, EventChannel,
    IdentityProvider, WishlistService,
};
use store::MarketplaceStore;

use crate::config::Config;

/// Services and collaborators accessible from all handlers.
pub struct AppState<S> {
    pub cart: CartService<S>,
    pub wishlist: WishlistService<S>,
    pub commissions: CommissionService<S>,
    pub downloads: DownloadService<S>,
    pub earnings: EarningsService<S>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl<S: MarketplaceStore + Clone + 'static> AppState<S> {
    /// Wires every service to the same store.
    pub fn new(
        store: S,
        config: &Config,
        events: Arc<dyn EventChannel>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            cart: CartService::new(store.clone(), config.pricing),
            wishlist: WishlistService::new(store.clone()),
            commissions: CommissionService::new(store.clone(), events, config.commissions),
            downloads: DownloadService::new(store.clone()),
            earnings: EarningsService::new(store).with_page_size(config.earnings_page_size),
            identity,
        }
    }
}
