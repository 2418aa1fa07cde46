//! Read-only projections over persisted authorization records. Assembly
//! only; no transition logic lives here.

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::authorization::AuthorizationRecord;
use crate::domain::seller::{SellerId, SellerLimit};

/// Seller-facing view: the seller's records plus the capacity summary the
/// dashboard renders next to them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SellerPortfolio {
    pub limit: SellerLimit,
    pub authorizations: Vec<AuthorizationRecord>,
}

impl SellerPortfolio {
    /// `approved_count` comes from the store, not from `authorizations`: a
    /// status filter may have removed approved records from the listing.
    pub fn assemble(
        seller_id: SellerId,
        authorizations: Vec<AuthorizationRecord>,
        approved_count: u32,
        max_limit: u32,
    ) -> Self {
        Self { limit: SellerLimit::derive(seller_id, approved_count, max_limit), authorizations }
    }
}

/// Supplier-facing inbox row: a record enriched with the requesting seller's
/// current limit, so the operator sees "this seller is full" before hitting
/// approve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InboxEntry {
    pub authorization: AuthorizationRecord,
    pub seller_limit: SellerLimit,
}

pub fn supplier_inbox(
    records: Vec<AuthorizationRecord>,
    approved_counts: &HashMap<SellerId, u32>,
    max_limit: u32,
) -> Vec<InboxEntry> {
    records
        .into_iter()
        .map(|record| {
            let approved_count =
                approved_counts.get(&record.seller_id).copied().unwrap_or_default();
            let seller_limit =
                SellerLimit::derive(record.seller_id.clone(), approved_count, max_limit);
            InboxEntry { authorization: record, seller_limit }
        })
        .collect()
}
