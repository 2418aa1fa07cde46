use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SellerId(pub String);

impl std::fmt::Display for SellerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derived capacity summary for a seller. Never stored; always recomputed
/// from the current APPROVED count so concurrent approvals cannot leave a
/// stale counter behind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerLimit {
    pub seller_id: SellerId,
    pub approved_count: u32,
    pub max_limit: u32,
    pub remaining_slots: u32,
}

impl SellerLimit {
    pub fn derive(seller_id: SellerId, approved_count: u32, max_limit: u32) -> Self {
        Self {
            seller_id,
            approved_count,
            max_limit,
            remaining_slots: max_limit.saturating_sub(approved_count),
        }
    }

    pub fn exhausted(&self) -> bool {
        self.remaining_slots == 0
    }
}
