//! Commission lifecycle: a role-gated state machine over bespoke-work requests.

mod service;
mod transitions;

pub use service::{CommissionService, CommissionSettings, RequestCommission, TransitionData};
pub use transitions::{Edge, TRANSITIONS, Verb, resolve_override, resolve_transition};
