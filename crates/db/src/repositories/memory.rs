use std::collections::HashMap;

use tokio::sync::RwLock;

use listgate_core::domain::authorization::{
    AuthorizationId, AuthorizationRecord, AuthorizationStatus,
};
use listgate_core::domain::product::ProductId;
use listgate_core::domain::seller::SellerId;
use listgate_core::domain::supplier::SupplierId;
use listgate_core::eligibility::{ActiveAuthorization, PairSnapshot, TerminalOutcome};

use super::{AuthorizationRepository, RepositoryError};

/// Test double with the same observable ordering as the SQL repository.
#[derive(Default)]
pub struct InMemoryAuthorizationRepository {
    records: RwLock<HashMap<String, AuthorizationRecord>>,
}

#[async_trait::async_trait]
impl AuthorizationRepository for InMemoryAuthorizationRepository {
    async fn find_by_id(
        &self,
        id: &AuthorizationId,
    ) -> Result<Option<AuthorizationRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(&id.0).cloned())
    }

    async fn save(&self, record: AuthorizationRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.insert(record.id.0.clone(), record);
        Ok(())
    }

    async fn list_for_seller(
        &self,
        seller_id: &SellerId,
        status: Option<AuthorizationStatus>,
    ) -> Result<Vec<AuthorizationRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut matching: Vec<AuthorizationRecord> = records
            .values()
            .filter(|record| record.seller_id == *seller_id)
            .filter(|record| status.map_or(true, |status| record.status() == status))
            .cloned()
            .collect();
        matching.sort_by(|left, right| right.requested_at.cmp(&left.requested_at));
        Ok(matching)
    }

    async fn list_for_supplier(
        &self,
        supplier_id: &SupplierId,
        status: Option<AuthorizationStatus>,
        product: Option<ProductId>,
    ) -> Result<Vec<AuthorizationRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut matching: Vec<AuthorizationRecord> = records
            .values()
            .filter(|record| record.supplier_id == *supplier_id)
            .filter(|record| status.map_or(true, |status| record.status() == status))
            .filter(|record| {
                product.as_ref().map(|product| record.product_id == *product).unwrap_or(true)
            })
            .cloned()
            .collect();
        matching.sort_by(|left, right| left.requested_at.cmp(&right.requested_at));
        Ok(matching)
    }

    async fn approved_count(&self, seller_id: &SellerId) -> Result<u32, RepositoryError> {
        let records = self.records.read().await;
        let count = records
            .values()
            .filter(|record| {
                record.seller_id == *seller_id
                    && record.status() == AuthorizationStatus::Approved
            })
            .count();
        Ok(count as u32)
    }

    async fn pair_snapshot(
        &self,
        seller_id: &SellerId,
        product_id: &ProductId,
    ) -> Result<PairSnapshot, RepositoryError> {
        let records = self.records.read().await;

        let pair_records = || {
            records.values().filter(|record| {
                record.seller_id == *seller_id && record.product_id == *product_id
            })
        };

        let active = pair_records()
            .find(|record| record.status().is_active())
            .map(|record| ActiveAuthorization { id: record.id.clone(), status: record.status() });

        let latest_terminal = pair_records()
            .filter(|record| record.status().is_terminal())
            .max_by_key(|record| record.updated_at)
            .map(|record| TerminalOutcome {
                status: record.status(),
                cooldown_until: record.state.cooldown_until(),
            });

        let approved_count = records
            .values()
            .filter(|record| {
                record.seller_id == *seller_id
                    && record.status() == AuthorizationStatus::Approved
            })
            .count() as u32;

        Ok(PairSnapshot { active, latest_terminal, approved_count })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::Map;

    use listgate_core::domain::authorization::{
        AuthorizationId, AuthorizationRecord, AuthorizationState, AuthorizationStatus,
    };
    use listgate_core::domain::product::ProductId;
    use listgate_core::domain::seller::SellerId;
    use listgate_core::domain::supplier::SupplierId;

    use crate::repositories::{AuthorizationRepository, InMemoryAuthorizationRepository};

    fn record(id: &str, seller: &str, product: &str) -> AuthorizationRecord {
        let now = Utc::now();
        AuthorizationRecord {
            id: AuthorizationId(id.to_string()),
            seller_id: SellerId(seller.to_string()),
            product_id: ProductId(product.to_string()),
            supplier_id: SupplierId("supplier-1".to_string()),
            requested_at: now,
            updated_at: now,
            metadata: Map::new(),
            state: AuthorizationState::Requested,
        }
    }

    #[tokio::test]
    async fn round_trips_records() {
        let repo = InMemoryAuthorizationRepository::default();
        let expected = record("auth-1", "seller-1", "product-a");

        repo.save(expected.clone()).await.expect("save");
        let found = repo.find_by_id(&expected.id).await.expect("find");

        assert_eq!(found, Some(expected));
    }

    #[tokio::test]
    async fn snapshot_tracks_active_and_latest_terminal() {
        let repo = InMemoryAuthorizationRepository::default();
        let now = Utc::now();

        let mut old_rejection = record("auth-1", "seller-1", "product-a");
        old_rejection.updated_at = now - Duration::days(60);
        old_rejection.state = AuthorizationState::Rejected {
            rejected_at: now - Duration::days(60),
            rejected_by: "supplier-user-1".to_string(),
            reason: "first attempt declined".to_string(),
            cooldown_until: now - Duration::days(30),
        };
        repo.save(old_rejection).await.expect("save");

        let mut fresh_rejection = record("auth-2", "seller-1", "product-a");
        fresh_rejection.updated_at = now;
        fresh_rejection.state = AuthorizationState::Rejected {
            rejected_at: now,
            rejected_by: "supplier-user-1".to_string(),
            reason: "second attempt declined".to_string(),
            cooldown_until: now + Duration::days(7),
        };
        repo.save(fresh_rejection).await.expect("save");

        let snapshot = repo
            .pair_snapshot(&SellerId("seller-1".to_string()), &ProductId("product-a".to_string()))
            .await
            .expect("snapshot");

        assert!(snapshot.active.is_none());
        let terminal = snapshot.latest_terminal.expect("latest terminal");
        assert_eq!(terminal.status, AuthorizationStatus::Rejected);
        assert_eq!(terminal.cooldown_until, Some(now + Duration::days(7)));
    }

    #[tokio::test]
    async fn approved_count_ignores_other_sellers() {
        let repo = InMemoryAuthorizationRepository::default();
        let now = Utc::now();

        let mut mine = record("auth-1", "seller-1", "product-a");
        mine.state = AuthorizationState::Approved {
            approved_at: now,
            approved_by: "supplier-user-1".to_string(),
        };
        repo.save(mine).await.expect("save");

        let mut theirs = record("auth-2", "seller-2", "product-b");
        theirs.state = AuthorizationState::Approved {
            approved_at: now,
            approved_by: "supplier-user-1".to_string(),
        };
        repo.save(theirs).await.expect("save");

        let count = repo.approved_count(&SellerId("seller-1".to_string())).await.expect("count");
        assert_eq!(count, 1);
    }
}
