//! Request/approval eligibility: pure decision functions over a snapshot of
//! the (seller, product) pair. No side effects; the store supplies the
//! snapshot and persists whatever the workflow engine decides.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::domain::authorization::{AuthorizationId, AuthorizationStatus};
use crate::policy::AuthorizationPolicy;

/// What the evaluator needs to know about a (seller, product) pair, read in
/// the same transaction that will apply the transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairSnapshot {
    pub active: Option<ActiveAuthorization>,
    pub latest_terminal: Option<TerminalOutcome>,
    /// The seller's current APPROVED count, across all products.
    pub approved_count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveAuthorization {
    pub id: AuthorizationId,
    pub status: AuthorizationStatus,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerminalOutcome {
    pub status: AuthorizationStatus,
    pub cooldown_until: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EligibilityDenial {
    #[error("an active authorization `{authorization_id}` already exists for this pair ({status:?})")]
    DuplicateActive { authorization_id: AuthorizationId, status: AuthorizationStatus },
    #[error("pair is cooling down until {until} ({days_remaining} days remaining)")]
    CooldownActive { until: DateTime<Utc>, days_remaining: i64 },
    #[error("seller holds {approved_count} of {max_limit} approved authorizations")]
    SlotsExhausted { approved_count: u32, max_limit: u32 },
}

/// Whole days left until `until`, rounded up, floored at zero. User-facing
/// copy renders this as "N days remaining", so a cooldown with any time left
/// on the clock counts as a full day.
pub fn cooldown_days_remaining(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    const DAY_MS: i64 = 86_400_000;

    let remaining_ms = until.signed_duration_since(now).num_milliseconds();
    if remaining_ms <= 0 {
        return 0;
    }
    (remaining_ms + DAY_MS - 1) / DAY_MS
}

/// Gate for a new request. Duplicate and cooldown checks always apply; the
/// slot check only when the policy opts in (slots are otherwise enforced at
/// approval time, where the count is authoritative).
pub fn evaluate_request(
    policy: &AuthorizationPolicy,
    snapshot: &PairSnapshot,
    now: DateTime<Utc>,
) -> Result<(), EligibilityDenial> {
    if let Some(active) = &snapshot.active {
        return Err(EligibilityDenial::DuplicateActive {
            authorization_id: active.id.clone(),
            status: active.status,
        });
    }

    if let Some(terminal) = &snapshot.latest_terminal {
        if let Some(until) = terminal.cooldown_until {
            if until > now {
                return Err(EligibilityDenial::CooldownActive {
                    until,
                    days_remaining: cooldown_days_remaining(until, now),
                });
            }
        }
    }

    if policy.check_slots_on_request {
        evaluate_approval(policy, snapshot.approved_count)?;
    }

    Ok(())
}

/// Gate for approval. Always re-checked at approval time: other approvals
/// may have landed between request and approval, and a stale count must fail
/// loudly instead of pushing the seller past the limit.
pub fn evaluate_approval(
    policy: &AuthorizationPolicy,
    approved_count: u32,
) -> Result<(), EligibilityDenial> {
    if approved_count >= policy.max_approved_per_seller {
        return Err(EligibilityDenial::SlotsExhausted {
            approved_count,
            max_limit: policy.max_approved_per_seller,
        });
    }

    Ok(())
}
