//! The commission transition table.
//!
//! Each edge names the status it leaves, the verb that triggers it, the roles
//! allowed to use it and the status it enters. Checking a transition is a
//! table lookup, independent of storage.

use common::{CommissionStatus, Role};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

use CommissionStatus::*;

/// An action an actor can take on a commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Accept,
    Start,
    Deliver,
    RequestRevision,
    Cancel,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Accept => "accept",
            Verb::Start => "start",
            Verb::Deliver => "deliver",
            Verb::RequestRevision => "request_revision",
            Verb::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One allowed status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: CommissionStatus,
    pub verb: Verb,
    pub roles: &'static [Role],
    pub to: CommissionStatus,
}

const VENDOR: &[Role] = &[Role::Vendor];
const CUSTOMER: &[Role] = &[Role::Customer];
const CUSTOMER_OR_ADMIN: &[Role] = &[Role::Customer, Role::Admin];

/// Every transition a customer or vendor may perform.
#[rustfmt::skip]
pub const TRANSITIONS: &[Edge] = &[
    Edge { from: Requested, verb: Verb::Accept, roles: VENDOR, to: Accepted },
    Edge { from: Requested, verb: Verb::Cancel, roles: CUSTOMER_OR_ADMIN, to: Cancelled },
    Edge { from: Accepted, verb: Verb::Start, roles: VENDOR, to: InProgress },
    Edge { from: Accepted, verb: Verb::Cancel, roles: CUSTOMER_OR_ADMIN, to: Cancelled },
    Edge { from: InProgress, verb: Verb::Deliver, roles: VENDOR, to: Delivered },
    Edge { from: InProgress, verb: Verb::Cancel, roles: CUSTOMER_OR_ADMIN, to: Cancelled },
    Edge { from: Delivered, verb: Verb::RequestRevision, roles: CUSTOMER, to: RevisionRequested },
    Edge { from: Delivered, verb: Verb::Accept, roles: CUSTOMER, to: Completed },
    Edge { from: RevisionRequested, verb: Verb::Deliver, roles: VENDOR, to: Delivered },
    Edge { from: RevisionRequested, verb: Verb::Cancel, roles: CUSTOMER_OR_ADMIN, to: Cancelled },
];

/// Resolves the status reached when `role` applies `verb` to a commission in `from`.
///
/// Terminal statuses reject everything with `InvalidTransition`. Customers
/// and vendors are limited to the edges listing their role and get
/// `Forbidden` otherwise. Admins may follow any edge for the verb; a verb
/// with no edge at all from `from` is `InvalidTransition` for them and
/// needs an explicit override instead.
pub fn resolve_transition(
    from: CommissionStatus,
    verb: Verb,
    role: Role,
) -> Result<CommissionStatus, DomainError> {
    if from.is_terminal() {
        return Err(DomainError::InvalidTransition {
            action: verb.to_string(),
            status: from,
        });
    }

    let mut edges = TRANSITIONS
        .iter()
        .filter(|edge| edge.from == from && edge.verb == verb);

    if role == Role::Admin {
        return edges
            .next()
            .map(|edge| edge.to)
            .ok_or_else(|| DomainError::InvalidTransition {
                action: verb.to_string(),
                status: from,
            });
    }

    edges
        .find(|edge| edge.roles.contains(&role))
        .map(|edge| edge.to)
        .ok_or_else(|| {
            DomainError::Forbidden(format!(
                "{role} may not {verb} a commission in {from} status"
            ))
        })
}

/// Checks an admin override from `from` to `to`.
///
/// Overrides may go anywhere except out of a terminal status or to the
/// status the commission is already in.
pub fn resolve_override(
    from: CommissionStatus,
    to: CommissionStatus,
) -> Result<CommissionStatus, DomainError> {
    if from.is_terminal() || from == to {
        return Err(DomainError::InvalidTransition {
            action: format!("override to {to}"),
            status: from,
        });
    }
    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const VERBS: [Verb; 5] = [
        Verb::Accept,
        Verb::Start,
        Verb::Deliver,
        Verb::RequestRevision,
        Verb::Cancel,
    ];

    #[test]
    fn table_has_at_most_one_edge_per_status_and_verb() {
        for status in CommissionStatus::ALL {
            for verb in VERBS {
                let count = TRANSITIONS
                    .iter()
                    .filter(|e| e.from == status && e.verb == verb)
                    .count();
                assert!(count <= 1, "{status} --{verb}--> has {count} edges");
            }
        }
    }

    #[test]
    fn no_edges_leave_terminal_statuses() {
        assert!(TRANSITIONS.iter().all(|e| !e.from.is_terminal()));
    }

    #[test]
    fn vendor_happy_path() {
        assert_eq!(
            resolve_transition(Requested, Verb::Accept, Role::Vendor).unwrap(),
            Accepted
        );
        assert_eq!(
            resolve_transition(Accepted, Verb::Start, Role::Vendor).unwrap(),
            InProgress
        );
        assert_eq!(
            resolve_transition(InProgress, Verb::Deliver, Role::Vendor).unwrap(),
            Delivered
        );
        assert_eq!(
            resolve_transition(RevisionRequested, Verb::Deliver, Role::Vendor).unwrap(),
            Delivered
        );
    }

    #[test]
    fn customer_edges() {
        assert_eq!(
            resolve_transition(Requested, Verb::Cancel, Role::Customer).unwrap(),
            Cancelled
        );
        assert_eq!(
            resolve_transition(Delivered, Verb::RequestRevision, Role::Customer).unwrap(),
            RevisionRequested
        );
        assert_eq!(
            resolve_transition(Delivered, Verb::Accept, Role::Customer).unwrap(),
            Completed
        );
    }

    #[test]
    fn customer_cannot_use_vendor_accept() {
        let err = resolve_transition(Requested, Verb::Accept, Role::Customer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let message = err.to_string();
        assert!(message.contains("accept"), "{message}");
        assert!(message.contains("REQUESTED"), "{message}");
    }

    #[test]
    fn vendor_cannot_cancel() {
        let err = resolve_transition(InProgress, Verb::Cancel, Role::Vendor).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn unlisted_edge_is_forbidden_for_parties() {
        let err = resolve_transition(Requested, Verb::Deliver, Role::Vendor).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn terminal_statuses_reject_everyone() {
        for from in [Completed, Cancelled] {
            for verb in VERBS {
                for role in [Role::Customer, Role::Vendor, Role::Admin] {
                    let err = resolve_transition(from, verb, role).unwrap_err();
                    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
                }
            }
        }
    }

    #[test]
    fn admin_may_follow_any_edge() {
        assert_eq!(
            resolve_transition(Requested, Verb::Accept, Role::Admin).unwrap(),
            Accepted
        );
        assert_eq!(
            resolve_transition(Delivered, Verb::Accept, Role::Admin).unwrap(),
            Completed
        );
        let err = resolve_transition(Requested, Verb::Deliver, Role::Admin).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn overrides() {
        assert_eq!(resolve_override(Requested, Delivered).unwrap(), Delivered);
        assert_eq!(resolve_override(Delivered, InProgress).unwrap(), InProgress);
        assert!(resolve_override(Completed, InProgress).is_err());
        assert!(resolve_override(Accepted, Accepted).is_err());
    }
}
