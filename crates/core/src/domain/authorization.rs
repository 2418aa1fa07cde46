use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::product::ProductId;
use crate::domain::seller::SellerId;
use crate::domain::supplier::SupplierId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorizationId(pub String);

impl std::fmt::Display for AuthorizationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    Requested,
    Approved,
    Rejected,
    Revoked,
    Cancelled,
}

impl AuthorizationStatus {
    /// Active records block a new request for the same (seller, product) pair.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Requested | Self::Approved)
    }

    /// Terminal records admit no further transition. APPROVED is not terminal;
    /// it can still be revoked.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Revoked | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Revoked => "revoked",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for AuthorizationStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "requested" => Ok(Self::Requested),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "revoked" => Ok(Self::Revoked),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!(
                "unknown authorization status `{other}` (expected requested|approved|rejected|revoked|cancelled)"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Seller,
    Supplier,
    PlatformAdmin,
}

/// Per-status payload. One variant per status keeps transition-specific
/// fields (reasons, cooldowns, actor stamps) from existing in any other
/// status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthorizationState {
    Requested,
    Approved {
        approved_at: DateTime<Utc>,
        approved_by: String,
    },
    Rejected {
        rejected_at: DateTime<Utc>,
        rejected_by: String,
        reason: String,
        cooldown_until: DateTime<Utc>,
    },
    Revoked {
        revoked_at: DateTime<Utc>,
        revoked_by: String,
        reason: String,
        cooldown_until: DateTime<Utc>,
    },
    Cancelled {
        cancelled_at: DateTime<Utc>,
        cancelled_by: String,
    },
}

impl AuthorizationState {
    pub fn status(&self) -> AuthorizationStatus {
        match self {
            Self::Requested => AuthorizationStatus::Requested,
            Self::Approved { .. } => AuthorizationStatus::Approved,
            Self::Rejected { .. } => AuthorizationStatus::Rejected,
            Self::Revoked { .. } => AuthorizationStatus::Revoked,
            Self::Cancelled { .. } => AuthorizationStatus::Cancelled,
        }
    }

    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Rejected { cooldown_until, .. } | Self::Revoked { cooldown_until, .. } => {
                Some(*cooldown_until)
            }
            _ => None,
        }
    }
}

/// A seller's request to list one supplier product. Never deleted; cancel
/// and revoke are status transitions so the audit history survives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub id: AuthorizationId,
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Opaque requester-supplied bag (business justification and the like).
    /// The engine never interprets it.
    pub metadata: Map<String, Value>,
    #[serde(flatten)]
    pub state: AuthorizationState,
}

impl AuthorizationRecord {
    pub fn status(&self) -> AuthorizationStatus {
        self.state.status()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{AuthorizationState, AuthorizationStatus};

    #[test]
    fn active_and_terminal_partition_the_status_space() {
        use AuthorizationStatus::*;

        for status in [Requested, Approved, Rejected, Revoked, Cancelled] {
            assert_ne!(status.is_active(), status.is_terminal());
        }
        assert!(Requested.is_active());
        assert!(Approved.is_active());
        assert!(Rejected.is_terminal());
        assert!(Revoked.is_terminal());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn status_round_trips_through_str() {
        use AuthorizationStatus::*;

        for status in [Requested, Approved, Rejected, Revoked, Cancelled] {
            assert_eq!(status.as_str().parse::<AuthorizationStatus>(), Ok(status));
        }
        assert!("active".parse::<AuthorizationStatus>().is_err());
    }

    #[test]
    fn cooldown_is_only_carried_by_rejected_and_revoked() {
        let now = Utc::now();

        assert_eq!(AuthorizationState::Requested.cooldown_until(), None);
        assert_eq!(
            AuthorizationState::Cancelled {
                cancelled_at: now,
                cancelled_by: "seller-1".to_string()
            }
            .cooldown_until(),
            None
        );
        assert_eq!(
            AuthorizationState::Rejected {
                rejected_at: now,
                rejected_by: "supplier-1".to_string(),
                reason: "inventory mismatch".to_string(),
                cooldown_until: now,
            }
            .cooldown_until(),
            Some(now)
        );
    }
}
