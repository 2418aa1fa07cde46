use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::authorization::{ActorRole, AuthorizationRecord, AuthorizationStatus};
use crate::domain::product::ProductId;
use crate::domain::seller::SellerId;
use crate::domain::supplier::SupplierId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Request,
    Approve,
    Reject,
    Cancel,
    Revoke,
}

impl std::fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Request => "request",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
            Self::Revoke => "revoke",
        };
        f.write_str(name)
    }
}

/// An applied transition: the persisted-to-be record plus where it came from,
/// for audit metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub from: Option<AuthorizationStatus>,
    pub to: AuthorizationStatus,
    pub action: WorkflowAction,
    pub record: AuthorizationRecord,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RequestCommand {
    pub seller_id: SellerId,
    pub product_id: ProductId,
    pub supplier_id: SupplierId,
    pub metadata: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ApproveCommand {
    pub approved_by: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RejectCommand {
    pub rejected_by: String,
    pub reason: String,
    /// Falls back to the policy's reject default when absent.
    pub cooldown_days: Option<u16>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CancelCommand {
    pub requested_by: SellerId,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RevokeCommand {
    pub revoked_by: String,
    pub actor: ActorRole,
    pub reason: String,
    /// Falls back to the policy's revoke default when absent.
    pub cooldown_days: Option<u16>,
}
