use async_trait::async_trait;
use thiserror::Error;

use listgate_core::domain::authorization::{
    AuthorizationId, AuthorizationRecord, AuthorizationStatus,
};
use listgate_core::domain::product::ProductId;
use listgate_core::domain::seller::SellerId;
use listgate_core::domain::supplier::SupplierId;
use listgate_core::eligibility::PairSnapshot;

pub mod authorization;
pub mod memory;

pub use authorization::SqlAuthorizationRepository;
pub use memory::InMemoryAuthorizationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Read and persistence surface for authorization records. Transition logic
/// never lives here; the workflow store drives transitions through its own
/// transaction boundary and uses this trait only for projections.
#[async_trait]
pub trait AuthorizationRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &AuthorizationId,
    ) -> Result<Option<AuthorizationRecord>, RepositoryError>;

    async fn save(&self, record: AuthorizationRecord) -> Result<(), RepositoryError>;

    /// Newest first, optionally narrowed to one status.
    async fn list_for_seller(
        &self,
        seller_id: &SellerId,
        status: Option<AuthorizationStatus>,
    ) -> Result<Vec<AuthorizationRecord>, RepositoryError>;

    /// Oldest first, so the supplier inbox surfaces the longest-waiting
    /// requests at the top.
    async fn list_for_supplier(
        &self,
        supplier_id: &SupplierId,
        status: Option<AuthorizationStatus>,
        product: Option<ProductId>,
    ) -> Result<Vec<AuthorizationRecord>, RepositoryError>;

    async fn approved_count(&self, seller_id: &SellerId) -> Result<u32, RepositoryError>;

    async fn pair_snapshot(
        &self,
        seller_id: &SellerId,
        product_id: &ProductId,
    ) -> Result<PairSnapshot, RepositoryError>;
}
