//! Business rules for the marketplace.
//!
//! This crate provides:
//! - Cart pricing with live catalog prices
//! - Race-safe wishlist toggling
//! - The commission lifecycle state machine
//! - Bounded download entitlements
//! - Vendor earnings computation
//!
//! Services are generic over the store traits in the `store` crate and reach
//! collaborators only through [`EventChannel`] and [`IdentityProvider`].

pub mod cart;
pub mod commission;
pub mod downloads;
pub mod earnings;
pub mod error;
pub mod events;
pub mod identity;
pub mod wishlist;

pub use cart::{CartService, CartSummary, CartWarning, PricedLine, PricingRules};
pub use commission::{
    CommissionService, CommissionSettings, Edge, RequestCommission, TRANSITIONS, TransitionData,
    Verb, resolve_override, resolve_transition,
};
pub use downloads::{AssetLocator, DownloadService};
pub use earnings::{
    DEFAULT_PAGE_SIZE, EarningsService, EarningsSummary, EarningsTransaction, MonthlyEarnings,
    summarize,
};
pub use error::{DomainError, ErrorKind};
pub use events::{
    BroadcastEventChannel, ChannelError, EventChannel, MarketplaceEvent, NoopEventChannel,
    Notification,
};
pub use identity::{IdentityError, IdentityProvider, StaticTokenIdentity};
pub use wishlist::{ToggleOutcome, WishlistService};
