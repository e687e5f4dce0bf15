//! Shared types for the marketplace core.
//!
//! Identifiers, monetary amounts and the resolved actor are used by every
//! other crate in the workspace, so they live here with no I/O dependencies.

pub mod actor;
pub mod ids;
pub mod money;
pub mod status;

pub use actor::{Actor, ParseRoleError, Role};
pub use ids::{CommissionId, GrantId, OrderId, ProductId, ServiceId, UserId};
pub use money::{CommissionRate, Money, round_half_up_bps};
pub use status::{CommissionStatus, ParseStatusError};
