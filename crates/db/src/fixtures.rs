//! Deterministic demo dataset for local development and operator smoke
//! checks: two sellers against one supplier, covering every lifecycle state.

use chrono::{Duration, Utc};
use serde_json::{Map, Value};

use listgate_core::domain::authorization::{
    AuthorizationId, AuthorizationRecord, AuthorizationState,
};
use listgate_core::domain::product::ProductId;
use listgate_core::domain::seller::SellerId;
use listgate_core::domain::supplier::SupplierId;

use crate::repositories::{AuthorizationRepository, RepositoryError, SqlAuthorizationRepository};
use crate::DbPool;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedSummary {
    pub records: usize,
    pub sellers: Vec<String>,
}

pub async fn seed_demo_data(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
    let repo = SqlAuthorizationRepository::new(pool.clone());
    let records = demo_records();
    let count = records.len();

    for record in records {
        repo.save(record).await?;
    }

    Ok(SeedSummary {
        records: count,
        sellers: vec!["seed-seller-hana".to_string(), "seed-seller-mintfox".to_string()],
    })
}

fn demo_records() -> Vec<AuthorizationRecord> {
    let now = Utc::now();
    let supplier = SupplierId("seed-supplier-brightline".to_string());

    let record = |id: &str, seller: &str, product: &str, state: AuthorizationState| {
        let mut metadata = Map::new();
        metadata.insert(
            "justification".to_string(),
            Value::String("demo catalog onboarding".to_string()),
        );
        AuthorizationRecord {
            id: AuthorizationId(id.to_string()),
            seller_id: SellerId(seller.to_string()),
            product_id: ProductId(product.to_string()),
            supplier_id: supplier.clone(),
            requested_at: now - Duration::days(7),
            updated_at: now - Duration::days(1),
            metadata,
            state,
        }
    };

    vec![
        record(
            "seed-auth-0001",
            "seed-seller-hana",
            "seed-product-thermal-mug",
            AuthorizationState::Approved {
                approved_at: now - Duration::days(5),
                approved_by: "seed-supplier-operator".to_string(),
            },
        ),
        record(
            "seed-auth-0002",
            "seed-seller-hana",
            "seed-product-desk-lamp",
            AuthorizationState::Requested,
        ),
        record(
            "seed-auth-0003",
            "seed-seller-hana",
            "seed-product-yoga-mat",
            AuthorizationState::Rejected {
                rejected_at: now - Duration::days(1),
                rejected_by: "seed-supplier-operator".to_string(),
                reason: "category already saturated".to_string(),
                cooldown_until: now + Duration::days(29),
            },
        ),
        record(
            "seed-auth-0004",
            "seed-seller-mintfox",
            "seed-product-thermal-mug",
            AuthorizationState::Requested,
        ),
        record(
            "seed-auth-0005",
            "seed-seller-mintfox",
            "seed-product-camp-stool",
            AuthorizationState::Revoked {
                revoked_at: now - Duration::days(1),
                revoked_by: "seed-platform-admin".to_string(),
                reason: "listing content policy breach".to_string(),
                cooldown_until: now + Duration::days(29),
            },
        ),
        record(
            "seed-auth-0006",
            "seed-seller-mintfox",
            "seed-product-desk-lamp",
            AuthorizationState::Cancelled {
                cancelled_at: now - Duration::days(2),
                cancelled_by: "seed-seller-mintfox".to_string(),
            },
        ),
    ]
}
