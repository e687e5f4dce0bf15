//! Commission service applying transitions with optimistic concurrency.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{Actor, CommissionId, CommissionStatus, Money, Role, ServiceId, UserId};
use serde::{Deserialize, Serialize};
use store::{Commission, CommissionStore, CommissionUpdate, NewCommission, StoreError};

use crate::error::DomainError;
use crate::events::{EventChannel, MarketplaceEvent};

use super::transitions::{Verb, resolve_override, resolve_transition};

/// Tunables for the commission service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSettings {
    /// Read-validate-write attempts before surfacing `Conflict`.
    pub max_attempts: u32,
}

impl Default for CommissionSettings {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Fields a customer supplies to open a commission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCommission {
    pub vendor_id: UserId,
    #[serde(default)]
    pub service_id: Option<ServiceId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub budget: Money,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

/// Side data carried by a transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionData {
    /// Free text, allowed on any transition.
    #[serde(default)]
    pub notes: Option<String>,

    /// Files handed over; only allowed on `deliver`.
    #[serde(default)]
    pub delivery_files: Vec<String>,
}

impl TransitionData {
    pub fn with_notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            delivery_files: Vec::new(),
        }
    }

    pub fn with_files(files: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            notes: None,
            delivery_files: files.into_iter().map(Into::into).collect(),
        }
    }
}

/// Service for the commission lifecycle.
///
/// Every status change is a compare-and-swap against the version that was
/// read, re-validated from a fresh read on conflict, and bounded to
/// `max_attempts` tries.
pub struct CommissionService<S> {
    store: S,
    events: Arc<dyn EventChannel>,
    settings: CommissionSettings,
}

impl<S: CommissionStore> CommissionService<S> {
    /// Creates a new commission service.
    pub fn new(store: S, events: Arc<dyn EventChannel>, settings: CommissionSettings) -> Self {
        Self {
            store,
            events,
            settings,
        }
    }

    /// Opens a new commission in `REQUESTED` status.
    #[tracing::instrument(skip(self, request), fields(vendor_id = %request.vendor_id))]
    pub async fn request(
        &self,
        actor: Actor,
        request: RequestCommission,
    ) -> Result<Commission, DomainError> {
        if actor.role != Role::Customer {
            return Err(DomainError::Forbidden(format!(
                "{} may not request a commission",
                actor.role
            )));
        }
        if request.vendor_id == actor.user_id {
            return Err(DomainError::Validation(
                "cannot commission yourself".to_string(),
            ));
        }
        let title = request.title.trim();
        if title.is_empty() {
            return Err(DomainError::Validation("title is required".to_string()));
        }
        if !request.budget.is_positive() {
            return Err(DomainError::Validation(format!(
                "budget must be positive, got {}",
                request.budget
            )));
        }
        let now = Utc::now();
        if request.deadline.is_some_and(|deadline| deadline <= now) {
            return Err(DomainError::Validation(
                "deadline must be in the future".to_string(),
            ));
        }

        let commission = Commission::requested(
            NewCommission {
                customer_id: actor.user_id,
                vendor_id: request.vendor_id,
                service_id: request.service_id,
                title: title.to_string(),
                description: request.description,
                budget: request.budget,
                deadline: request.deadline,
            },
            now,
        );
        self.store.insert_commission(commission.clone()).await?;

        tracing::info!(commission_id = %commission.id, "commission requested");
        Ok(commission)
    }

    /// Loads a commission visible to the actor.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: CommissionId, actor: Actor) -> Result<Commission, DomainError> {
        let commission = self.load(id).await?;
        authorize(&commission, actor)?;
        Ok(commission)
    }

    /// Lists commissions where the actor is customer or vendor.
    pub async fn list_for_actor(&self, actor: Actor) -> Result<Vec<Commission>, DomainError> {
        Ok(self.store.commissions_for_user(actor.user_id).await?)
    }

    /// Applies `verb` to the commission on behalf of `actor`.
    #[tracing::instrument(skip(self, data))]
    pub async fn transition(
        &self,
        id: CommissionId,
        actor: Actor,
        verb: Verb,
        data: TransitionData,
    ) -> Result<Commission, DomainError> {
        if verb != Verb::Deliver && !data.delivery_files.is_empty() {
            return Err(DomainError::Validation(format!(
                "delivery files can only be attached on deliver, not {verb}"
            )));
        }

        let updated = self
            .apply_with_retry(id, actor, |current| {
                let status = resolve_transition(current.status, verb, actor.role)?;
                Ok(CommissionUpdate {
                    status,
                    notes: data.notes.clone(),
                    delivery_files: data.delivery_files.clone(),
                    updated_at: Utc::now(),
                })
            })
            .await?;

        metrics::counter!("commission_transitions_total", "verb" => verb.as_str()).increment(1);
        Ok(updated)
    }

    /// Forces the commission into `target`. Admin only.
    #[tracing::instrument(skip(self, notes))]
    pub async fn override_status(
        &self,
        id: CommissionId,
        actor: Actor,
        target: CommissionStatus,
        notes: Option<String>,
    ) -> Result<Commission, DomainError> {
        if !actor.is_admin() {
            return Err(DomainError::Forbidden(format!(
                "{} may not override commission status",
                actor.role
            )));
        }

        let updated = self
            .apply_with_retry(id, actor, |current| {
                let status = resolve_override(current.status, target)?;
                Ok(CommissionUpdate {
                    status,
                    notes: notes.clone(),
                    delivery_files: Vec::new(),
                    updated_at: Utc::now(),
                })
            })
            .await?;

        metrics::counter!("commission_transitions_total", "verb" => "override").increment(1);
        tracing::info!(commission_id = %id, status = %target, "commission status overridden");
        Ok(updated)
    }

    async fn load(&self, id: CommissionId) -> Result<Commission, DomainError> {
        self.store
            .get_commission(id)
            .await?
            .ok_or_else(|| DomainError::not_found("commission", id))
    }

    /// Read, validate with `plan`, compare-and-swap; repeat on conflict.
    async fn apply_with_retry<F>(
        &self,
        id: CommissionId,
        actor: Actor,
        plan: F,
    ) -> Result<Commission, DomainError>
    where
        F: Fn(&Commission) -> Result<CommissionUpdate, DomainError> + Send + Sync,
    {
        for attempt in 1..=self.settings.max_attempts {
            let current = self.load(id).await?;
            authorize(&current, actor)?;
            let update = plan(&current)?;
            let from = current.status;

            match self
                .store
                .update_commission_if_version(id, current.version, update)
                .await
            {
                Ok(updated) => {
                    tracing::info!(
                        commission_id = %id,
                        %from,
                        to = %updated.status,
                        actor_role = %actor.role,
                        "commission transitioned"
                    );
                    self.notify_counterpart(actor, &updated).await;
                    return Ok(updated);
                }
                Err(StoreError::ConcurrencyConflict { expected, actual, .. }) => {
                    metrics::counter!("commission_conflicts_total").increment(1);
                    tracing::debug!(
                        commission_id = %id,
                        attempt,
                        %expected,
                        %actual,
                        "commission changed since read, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(
            commission_id = %id,
            attempts = self.settings.max_attempts,
            "giving up on contended commission"
        );
        Err(DomainError::Conflict {
            entity: "commission",
            id: id.to_string(),
        })
    }

    /// Publishes delivery and cancellation to the other party. Best-effort.
    async fn notify_counterpart(&self, actor: Actor, commission: &Commission) {
        let occurred_at = commission.updated_at;
        let event = match commission.status {
            CommissionStatus::Delivered => MarketplaceEvent::CommissionDelivered {
                commission_id: commission.id,
                title: commission.title.clone(),
                delivery_files: commission.delivery_files.clone(),
                occurred_at,
            },
            CommissionStatus::Cancelled => MarketplaceEvent::CommissionCancelled {
                commission_id: commission.id,
                title: commission.title.clone(),
                cancelled_by: actor.role,
                occurred_at,
            },
            _ => return,
        };

        let targets = match actor.role {
            Role::Vendor => vec![commission.customer_id],
            Role::Customer => vec![commission.vendor_id],
            Role::Admin => vec![commission.customer_id, commission.vendor_id],
        };

        for target in targets {
            match self.events.publish(target, event.clone()).await {
                Ok(()) => metrics::counter!("events_published_total").increment(1),
                Err(e) => {
                    metrics::counter!("events_publish_failures_total").increment(1);
                    tracing::warn!(
                        error = %e,
                        %target,
                        event_type = event.event_type(),
                        "failed to publish commission event"
                    );
                }
            }
        }
    }
}

/// Admins see everything; customers and vendors only their own side.
fn authorize(commission: &Commission, actor: Actor) -> Result<(), DomainError> {
    let allowed = match actor.role {
        Role::Admin => true,
        Role::Customer => commission.customer_id == actor.user_id,
        Role::Vendor => commission.vendor_id == actor.user_id,
    };
    if allowed {
        Ok(())
    } else {
        Err(DomainError::Forbidden(format!(
            "{} {} is not a party to commission {}",
            actor.role, actor.user_id, commission.id
        )))
    }
}
