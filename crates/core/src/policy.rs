use serde::{Deserialize, Serialize};

/// Platform policy for the authorization workflow: slot capacity, cooldown
/// windows, and reason validation. Loaded through [`crate::config::AppConfig`]
/// and shared by the evaluator and the workflow engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationPolicy {
    /// Maximum concurrently APPROVED authorizations per seller.
    pub max_approved_per_seller: u32,
    /// Cooldown attached to a rejection when the supplier does not pick one.
    pub reject_cooldown_days: u16,
    /// Cooldown attached to a revocation when the caller does not pick one.
    /// Deliberately its own knob rather than an alias of the reject default.
    pub revoke_cooldown_days: u16,
    /// Permitted range for caller-supplied cooldowns.
    pub cooldown_min_days: u16,
    pub cooldown_max_days: u16,
    /// Minimum reason length (in characters) for reject and revoke.
    pub min_reason_chars: usize,
    /// When set, a request is also denied once the seller's slots are
    /// exhausted. Off by default: slots are normally enforced at approval
    /// time only, so a seller at the limit can still queue requests.
    pub check_slots_on_request: bool,
}

impl Default for AuthorizationPolicy {
    fn default() -> Self {
        Self {
            max_approved_per_seller: 10,
            reject_cooldown_days: 30,
            revoke_cooldown_days: 30,
            cooldown_min_days: 1,
            cooldown_max_days: 365,
            min_reason_chars: 10,
            check_slots_on_request: false,
        }
    }
}
