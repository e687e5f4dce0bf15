//! Cart mutation and pricing.

mod pricing;
mod service;

pub use pricing::{CartSummary, CartWarning, PricedLine, PricingRules};
pub use service::CartService;
