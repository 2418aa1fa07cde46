//! The authorization state machine. Deterministic and side-effect free:
//! every operation takes the current record (or the pair snapshot for a new
//! request), a command, and `now`, and either returns the transitioned
//! record or a structured refusal. Persistence and transaction scoping are
//! the store's job.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::authorization::{
    ActorRole, AuthorizationId, AuthorizationRecord, AuthorizationState, AuthorizationStatus,
};
use crate::eligibility::{evaluate_approval, evaluate_request, EligibilityDenial, PairSnapshot};
use crate::policy::AuthorizationPolicy;
use crate::workflow::states::{
    ApproveCommand, CancelCommand, RejectCommand, RequestCommand, RevokeCommand,
    TransitionOutcome, WorkflowAction,
};

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum WorkflowError {
    #[error("an active authorization `{authorization_id}` already exists for this seller and product ({status:?})")]
    DuplicateActive { authorization_id: AuthorizationId, status: AuthorizationStatus },
    #[error("this seller and product pair is cooling down until {until} ({days_remaining} days remaining)")]
    CooldownActive { until: DateTime<Utc>, days_remaining: i64 },
    #[error("seller holds {approved_count} of {max_limit} approved authorizations")]
    SlotsExhausted { approved_count: u32, max_limit: u32 },
    #[error("cannot {action} an authorization in {status:?} status")]
    InvalidTransition { status: AuthorizationStatus, action: WorkflowAction },
    #[error("reason must be at least {minimum} characters, got {length}")]
    ReasonTooShort { length: usize, minimum: usize },
    #[error("cooldown of {days} days is outside the permitted range {min}..={max}")]
    CooldownOutOfRange { days: u16, min: u16, max: u16 },
    #[error("{action} is not permitted: {detail}")]
    NotPermitted { action: WorkflowAction, detail: String },
}

impl From<EligibilityDenial> for WorkflowError {
    fn from(denial: EligibilityDenial) -> Self {
        match denial {
            EligibilityDenial::DuplicateActive { authorization_id, status } => {
                Self::DuplicateActive { authorization_id, status }
            }
            EligibilityDenial::CooldownActive { until, days_remaining } => {
                Self::CooldownActive { until, days_remaining }
            }
            EligibilityDenial::SlotsExhausted { approved_count, max_limit } => {
                Self::SlotsExhausted { approved_count, max_limit }
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct WorkflowEngine {
    policy: AuthorizationPolicy,
}

impl WorkflowEngine {
    pub fn new(policy: AuthorizationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    /// Create a new REQUESTED record, provided the pair is eligible.
    pub fn request(
        &self,
        snapshot: &PairSnapshot,
        command: RequestCommand,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        evaluate_request(&self.policy, snapshot, now)?;

        let record = AuthorizationRecord {
            id: AuthorizationId(Uuid::new_v4().to_string()),
            seller_id: command.seller_id,
            product_id: command.product_id,
            supplier_id: command.supplier_id,
            requested_at: now,
            updated_at: now,
            metadata: command.metadata,
            state: AuthorizationState::Requested,
        };

        Ok(outcome(None, WorkflowAction::Request, record))
    }

    /// REQUESTED -> APPROVED. The slot count is re-validated here with the
    /// count the caller read inside the same transaction; approvals that
    /// landed since the request must fail, not push past the limit.
    pub fn approve(
        &self,
        record: &AuthorizationRecord,
        approved_count: u32,
        command: ApproveCommand,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.require_status(record, AuthorizationStatus::Requested, WorkflowAction::Approve)?;
        evaluate_approval(&self.policy, approved_count)?;

        let record = transitioned(
            record,
            AuthorizationState::Approved { approved_at: now, approved_by: command.approved_by },
            now,
        );
        Ok(outcome(Some(AuthorizationStatus::Requested), WorkflowAction::Approve, record))
    }

    /// REQUESTED -> REJECTED, stamping the reason and a cooldown window.
    pub fn reject(
        &self,
        record: &AuthorizationRecord,
        command: RejectCommand,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.require_status(record, AuthorizationStatus::Requested, WorkflowAction::Reject)?;
        let reason = self.validate_reason(&command.reason)?;
        let days =
            self.validate_cooldown(command.cooldown_days.unwrap_or(self.policy.reject_cooldown_days))?;

        let record = transitioned(
            record,
            AuthorizationState::Rejected {
                rejected_at: now,
                rejected_by: command.rejected_by,
                reason,
                cooldown_until: now + Duration::days(i64::from(days)),
            },
            now,
        );
        Ok(outcome(Some(AuthorizationStatus::Requested), WorkflowAction::Reject, record))
    }

    /// REQUESTED -> CANCELLED. Only the requesting seller may cancel, and
    /// cancellation is penalty-free: no cooldown is attached.
    pub fn cancel(
        &self,
        record: &AuthorizationRecord,
        command: CancelCommand,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.require_status(record, AuthorizationStatus::Requested, WorkflowAction::Cancel)?;
        if command.requested_by != record.seller_id {
            return Err(WorkflowError::NotPermitted {
                action: WorkflowAction::Cancel,
                detail: "only the requesting seller may cancel".to_string(),
            });
        }

        let record = transitioned(
            record,
            AuthorizationState::Cancelled {
                cancelled_at: now,
                cancelled_by: command.requested_by.0,
            },
            now,
        );
        Ok(outcome(Some(AuthorizationStatus::Requested), WorkflowAction::Cancel, record))
    }

    /// APPROVED -> REVOKED, supplier or platform admin only.
    pub fn revoke(
        &self,
        record: &AuthorizationRecord,
        command: RevokeCommand,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, WorkflowError> {
        self.require_status(record, AuthorizationStatus::Approved, WorkflowAction::Revoke)?;
        if command.actor == ActorRole::Seller {
            return Err(WorkflowError::NotPermitted {
                action: WorkflowAction::Revoke,
                detail: "only the supplier or a platform admin may revoke".to_string(),
            });
        }
        let reason = self.validate_reason(&command.reason)?;
        let days =
            self.validate_cooldown(command.cooldown_days.unwrap_or(self.policy.revoke_cooldown_days))?;

        let record = transitioned(
            record,
            AuthorizationState::Revoked {
                revoked_at: now,
                revoked_by: command.revoked_by,
                reason,
                cooldown_until: now + Duration::days(i64::from(days)),
            },
            now,
        );
        Ok(outcome(Some(AuthorizationStatus::Approved), WorkflowAction::Revoke, record))
    }

    fn require_status(
        &self,
        record: &AuthorizationRecord,
        expected: AuthorizationStatus,
        action: WorkflowAction,
    ) -> Result<(), WorkflowError> {
        let status = record.status();
        if status != expected {
            return Err(WorkflowError::InvalidTransition { status, action });
        }
        Ok(())
    }

    fn validate_reason(&self, raw: &str) -> Result<String, WorkflowError> {
        let reason = raw.trim();
        let length = reason.chars().count();
        if length < self.policy.min_reason_chars {
            return Err(WorkflowError::ReasonTooShort {
                length,
                minimum: self.policy.min_reason_chars,
            });
        }
        Ok(reason.to_string())
    }

    fn validate_cooldown(&self, days: u16) -> Result<u16, WorkflowError> {
        if days < self.policy.cooldown_min_days || days > self.policy.cooldown_max_days {
            return Err(WorkflowError::CooldownOutOfRange {
                days,
                min: self.policy.cooldown_min_days,
                max: self.policy.cooldown_max_days,
            });
        }
        Ok(days)
    }
}

fn transitioned(
    record: &AuthorizationRecord,
    state: AuthorizationState,
    now: DateTime<Utc>,
) -> AuthorizationRecord {
    let mut record = record.clone();
    record.state = state;
    record.updated_at = now;
    record
}

fn outcome(
    from: Option<AuthorizationStatus>,
    action: WorkflowAction,
    record: AuthorizationRecord,
) -> TransitionOutcome {
    TransitionOutcome { from, to: record.status(), action, record }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::Map;

    use crate::domain::authorization::{
        ActorRole, AuthorizationId, AuthorizationState, AuthorizationStatus,
    };
    use crate::domain::product::ProductId;
    use crate::domain::seller::SellerId;
    use crate::domain::supplier::SupplierId;
    use crate::eligibility::{ActiveAuthorization, PairSnapshot, TerminalOutcome};
    use crate::policy::AuthorizationPolicy;
    use crate::workflow::engine::{WorkflowEngine, WorkflowError};
    use crate::workflow::states::{
        ApproveCommand, CancelCommand, RejectCommand, RequestCommand, RevokeCommand, WorkflowAction,
    };

    fn engine() -> WorkflowEngine {
        WorkflowEngine::new(AuthorizationPolicy::default())
    }

    fn clear_snapshot() -> PairSnapshot {
        PairSnapshot { active: None, latest_terminal: None, approved_count: 0 }
    }

    fn request_command() -> RequestCommand {
        RequestCommand {
            seller_id: SellerId("seller-1".to_string()),
            product_id: ProductId("product-1".to_string()),
            supplier_id: SupplierId("supplier-1".to_string()),
            metadata: Map::new(),
        }
    }

    fn requested_record() -> crate::domain::authorization::AuthorizationRecord {
        engine()
            .request(&clear_snapshot(), request_command(), Utc::now())
            .expect("request should succeed")
            .record
    }

    #[test]
    fn request_creates_requested_record_with_immutable_timestamp() {
        let now = Utc::now();
        let outcome = engine()
            .request(&clear_snapshot(), request_command(), now)
            .expect("request should succeed");

        assert_eq!(outcome.from, None);
        assert_eq!(outcome.to, AuthorizationStatus::Requested);
        assert_eq!(outcome.record.requested_at, now);
        assert_eq!(outcome.record.state, AuthorizationState::Requested);
    }

    #[test]
    fn request_is_denied_for_active_pair() {
        let snapshot = PairSnapshot {
            active: Some(ActiveAuthorization {
                id: AuthorizationId("auth-9".to_string()),
                status: AuthorizationStatus::Approved,
            }),
            ..clear_snapshot()
        };

        let error = engine()
            .request(&snapshot, request_command(), Utc::now())
            .expect_err("duplicate active must fail");
        assert!(matches!(error, WorkflowError::DuplicateActive { .. }));
    }

    #[test]
    fn request_is_denied_during_cooldown_with_days_remaining() {
        let now = Utc::now();
        let snapshot = PairSnapshot {
            latest_terminal: Some(TerminalOutcome {
                status: AuthorizationStatus::Rejected,
                cooldown_until: Some(now + Duration::days(14)),
            }),
            ..clear_snapshot()
        };

        let error = engine()
            .request(&snapshot, request_command(), now)
            .expect_err("cooldown must block the pair");
        assert!(matches!(error, WorkflowError::CooldownActive { days_remaining: 14, .. }));
    }

    #[test]
    fn request_is_allowed_at_slot_limit_by_default() {
        let snapshot = PairSnapshot { approved_count: 10, ..clear_snapshot() };

        let outcome = engine()
            .request(&snapshot, request_command(), Utc::now())
            .expect("request-time checks cover duplicates and cooldown only");
        assert_eq!(outcome.to, AuthorizationStatus::Requested);
    }

    #[test]
    fn approve_stamps_actor_and_timestamp() {
        let now = Utc::now();
        let record = requested_record();

        let outcome = engine()
            .approve(&record, 3, ApproveCommand { approved_by: "supplier-user-7".to_string() }, now)
            .expect("approve should succeed");

        assert_eq!(outcome.to, AuthorizationStatus::Approved);
        assert_eq!(
            outcome.record.state,
            AuthorizationState::Approved {
                approved_at: now,
                approved_by: "supplier-user-7".to_string()
            }
        );
        assert_eq!(outcome.record.updated_at, now);
    }

    #[test]
    fn approve_fails_when_slots_are_exhausted() {
        let record = requested_record();

        let error = engine()
            .approve(
                &record,
                10,
                ApproveCommand { approved_by: "supplier-user-7".to_string() },
                Utc::now(),
            )
            .expect_err("slots must be re-checked at approval");
        assert_eq!(error, WorkflowError::SlotsExhausted { approved_count: 10, max_limit: 10 });
    }

    #[test]
    fn reject_requires_a_meaningful_reason() {
        let record = requested_record();

        let error = engine()
            .reject(
                &record,
                RejectCommand {
                    rejected_by: "supplier-user-7".to_string(),
                    reason: "bad".to_string(),
                    cooldown_days: None,
                },
                Utc::now(),
            )
            .expect_err("three characters is too short");
        assert_eq!(error, WorkflowError::ReasonTooShort { length: 3, minimum: 10 });
    }

    #[test]
    fn reject_succeeds_at_exactly_the_minimum_reason_length() {
        let now = Utc::now();
        let record = requested_record();
        let reason = "0123456789".to_string();
        assert_eq!(reason.chars().count(), 10);

        let outcome = engine()
            .reject(
                &record,
                RejectCommand {
                    rejected_by: "supplier-user-7".to_string(),
                    reason: reason.clone(),
                    cooldown_days: Some(14),
                },
                now,
            )
            .expect("ten characters is enough");

        assert_eq!(
            outcome.record.state,
            AuthorizationState::Rejected {
                rejected_at: now,
                rejected_by: "supplier-user-7".to_string(),
                reason,
                cooldown_until: now + Duration::days(14),
            }
        );
    }

    #[test]
    fn reject_defaults_cooldown_from_policy() {
        let now = Utc::now();
        let record = requested_record();

        let outcome = engine()
            .reject(
                &record,
                RejectCommand {
                    rejected_by: "supplier-user-7".to_string(),
                    reason: "quality concerns noted".to_string(),
                    cooldown_days: None,
                },
                now,
            )
            .expect("reject should succeed");

        assert_eq!(outcome.record.state.cooldown_until(), Some(now + Duration::days(30)));
    }

    #[test]
    fn reject_bounds_caller_supplied_cooldown() {
        let record = requested_record();

        for days in [0u16, 366] {
            let error = engine()
                .reject(
                    &record,
                    RejectCommand {
                        rejected_by: "supplier-user-7".to_string(),
                        reason: "quality concerns noted".to_string(),
                        cooldown_days: Some(days),
                    },
                    Utc::now(),
                )
                .expect_err("out-of-range cooldown must fail");
            assert_eq!(error, WorkflowError::CooldownOutOfRange { days, min: 1, max: 365 });
        }
    }

    #[test]
    fn cancel_is_restricted_to_the_requesting_seller() {
        let now = Utc::now();
        let record = requested_record();

        let error = engine()
            .cancel(&record, CancelCommand { requested_by: SellerId("seller-2".to_string()) }, now)
            .expect_err("another seller must not cancel");
        assert!(matches!(
            error,
            WorkflowError::NotPermitted { action: WorkflowAction::Cancel, .. }
        ));

        let outcome = engine()
            .cancel(&record, CancelCommand { requested_by: record.seller_id.clone() }, now)
            .expect("owner may cancel");
        assert_eq!(outcome.to, AuthorizationStatus::Cancelled);
        assert_eq!(outcome.record.state.cooldown_until(), None);
    }

    #[test]
    fn revoke_is_restricted_to_supplier_and_platform() {
        let now = Utc::now();
        let record = requested_record();
        let approved = engine()
            .approve(&record, 0, ApproveCommand { approved_by: "supplier-user-7".to_string() }, now)
            .expect("approve should succeed")
            .record;

        let error = engine()
            .revoke(
                &approved,
                RevokeCommand {
                    revoked_by: "seller-1".to_string(),
                    actor: ActorRole::Seller,
                    reason: "changed my mind on this".to_string(),
                    cooldown_days: None,
                },
                now,
            )
            .expect_err("sellers must not revoke");
        assert!(matches!(
            error,
            WorkflowError::NotPermitted { action: WorkflowAction::Revoke, .. }
        ));

        let outcome = engine()
            .revoke(
                &approved,
                RevokeCommand {
                    revoked_by: "ops-admin".to_string(),
                    actor: ActorRole::PlatformAdmin,
                    reason: "listing policy violation".to_string(),
                    cooldown_days: Some(90),
                },
                now,
            )
            .expect("platform admin may revoke");
        assert_eq!(outcome.to, AuthorizationStatus::Revoked);
        assert_eq!(outcome.record.state.cooldown_until(), Some(now + Duration::days(90)));
    }

    #[test]
    fn terminal_records_admit_no_further_transition() {
        let now = Utc::now();
        let record = requested_record();
        let engine = engine();

        let cancelled = engine
            .cancel(&record, CancelCommand { requested_by: record.seller_id.clone() }, now)
            .expect("cancel should succeed")
            .record;

        let error = engine
            .approve(
                &cancelled,
                0,
                ApproveCommand { approved_by: "supplier-user-7".to_string() },
                now,
            )
            .expect_err("cancelled is terminal");
        assert_eq!(
            error,
            WorkflowError::InvalidTransition {
                status: AuthorizationStatus::Cancelled,
                action: WorkflowAction::Approve,
            }
        );

        let error = engine
            .cancel(&cancelled, CancelCommand { requested_by: cancelled.seller_id.clone() }, now)
            .expect_err("terminal records cannot transition again");
        assert!(matches!(error, WorkflowError::InvalidTransition { .. }));
    }

    #[test]
    fn revoke_requires_approved_status() {
        let record = requested_record();

        let error = engine()
            .revoke(
                &record,
                RevokeCommand {
                    revoked_by: "supplier-user-7".to_string(),
                    actor: ActorRole::Supplier,
                    reason: "catalog cleanup pass".to_string(),
                    cooldown_days: None,
                },
                Utc::now(),
            )
            .expect_err("only approved records can be revoked");
        assert_eq!(
            error,
            WorkflowError::InvalidTransition {
                status: AuthorizationStatus::Requested,
                action: WorkflowAction::Revoke,
            }
        );
    }
}
