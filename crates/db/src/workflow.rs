//! Transactional driver for the authorization state machine. Every
//! transition runs as one SQLite write transaction that takes the write lock
//! up front (`BEGIN IMMEDIATE`), re-reads the pair snapshot and the seller's
//! approved count under that lock, applies the pure engine, and persists the
//! result. That serializes transitions across the whole store, so two
//! operators approving the same seller's last slot resolve to one success
//! and one structured refusal instead of an over-committed seller.

use std::sync::Arc;

use chrono::Utc;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection};

use listgate_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use listgate_core::domain::authorization::{
    AuthorizationId, AuthorizationRecord, AuthorizationState,
};
use listgate_core::errors::ApplicationError;
use listgate_core::policy::AuthorizationPolicy;
use listgate_core::workflow::engine::{WorkflowEngine, WorkflowError};
use listgate_core::workflow::states::{
    ApproveCommand, CancelCommand, RejectCommand, RequestCommand, RevokeCommand,
    TransitionOutcome, WorkflowAction,
};

use crate::repositories::authorization::{
    count_approved, fetch_pair_snapshot, fetch_record, upsert_record,
};
use crate::repositories::RepositoryError;
use crate::DbPool;

pub struct SqlWorkflowStore {
    pool: DbPool,
    engine: WorkflowEngine,
    audit: Arc<dyn AuditSink>,
}

impl SqlWorkflowStore {
    pub fn new(pool: DbPool, policy: AuthorizationPolicy, audit: Arc<dyn AuditSink>) -> Self {
        Self { pool, engine: WorkflowEngine::new(policy), audit }
    }

    pub fn policy(&self) -> &AuthorizationPolicy {
        self.engine.policy()
    }

    pub async fn fetch(
        &self,
        id: &AuthorizationId,
    ) -> Result<AuthorizationRecord, ApplicationError> {
        let mut conn = self.pool.acquire().await.map_err(connect_failure)?;
        fetch_record(&mut conn, id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::NotFound(id.clone()))
    }

    pub async fn request(
        &self,
        command: RequestCommand,
    ) -> Result<AuthorizationRecord, ApplicationError> {
        let mut conn = self.begin_immediate().await?;
        let result = self.request_in_tx(&mut conn, command).await;
        self.finish(&mut conn, result).await
    }

    pub async fn approve(
        &self,
        id: &AuthorizationId,
        command: ApproveCommand,
    ) -> Result<AuthorizationRecord, ApplicationError> {
        let mut conn = self.begin_immediate().await?;
        let result = self.approve_in_tx(&mut conn, id, command).await;
        self.finish(&mut conn, result).await
    }

    pub async fn reject(
        &self,
        id: &AuthorizationId,
        command: RejectCommand,
    ) -> Result<AuthorizationRecord, ApplicationError> {
        let mut conn = self.begin_immediate().await?;
        let result = self.reject_in_tx(&mut conn, id, command).await;
        self.finish(&mut conn, result).await
    }

    pub async fn cancel(
        &self,
        id: &AuthorizationId,
        command: CancelCommand,
    ) -> Result<AuthorizationRecord, ApplicationError> {
        let mut conn = self.begin_immediate().await?;
        let result = self.cancel_in_tx(&mut conn, id, command).await;
        self.finish(&mut conn, result).await
    }

    pub async fn revoke(
        &self,
        id: &AuthorizationId,
        command: RevokeCommand,
    ) -> Result<AuthorizationRecord, ApplicationError> {
        let mut conn = self.begin_immediate().await?;
        let result = self.revoke_in_tx(&mut conn, id, command).await;
        self.finish(&mut conn, result).await
    }

    /// `BEGIN IMMEDIATE` acquires the write lock before any read. A second
    /// writer queues on the connection's busy timeout here, so its
    /// subsequent reads always see the first writer's committed state.
    async fn begin_immediate(&self) -> Result<PoolConnection<Sqlite>, ApplicationError> {
        let mut conn = self.pool.acquire().await.map_err(connect_failure)?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await.map_err(connect_failure)?;
        Ok(conn)
    }

    async fn finish(
        &self,
        conn: &mut SqliteConnection,
        result: Result<TransitionOutcome, ApplicationError>,
    ) -> Result<AuthorizationRecord, ApplicationError> {
        match result {
            Ok(outcome) => {
                sqlx::query("COMMIT").execute(&mut *conn).await.map_err(connect_failure)?;
                self.applied(&outcome);
                Ok(outcome.record)
            }
            Err(error) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(error)
            }
        }
    }

    async fn request_in_tx(
        &self,
        conn: &mut SqliteConnection,
        command: RequestCommand,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let snapshot = fetch_pair_snapshot(conn, &command.seller_id, &command.product_id)
            .await
            .map_err(persistence)?;

        let outcome = self
            .engine
            .request(&snapshot, command, Utc::now())
            .map_err(|error| self.rejected(None, WorkflowAction::Request, error))?;

        upsert_record(conn, &outcome.record).await.map_err(persistence)?;
        Ok(outcome)
    }

    async fn approve_in_tx(
        &self,
        conn: &mut SqliteConnection,
        id: &AuthorizationId,
        command: ApproveCommand,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let record = required(conn, id).await?;
        // The authoritative count: read under the same write lock the
        // approval will commit under.
        let approved_count = count_approved(conn, &record.seller_id).await.map_err(persistence)?;

        let outcome = self
            .engine
            .approve(&record, approved_count, command, Utc::now())
            .map_err(|error| self.rejected(Some(id), WorkflowAction::Approve, error))?;

        upsert_record(conn, &outcome.record).await.map_err(persistence)?;
        Ok(outcome)
    }

    async fn reject_in_tx(
        &self,
        conn: &mut SqliteConnection,
        id: &AuthorizationId,
        command: RejectCommand,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let record = required(conn, id).await?;

        let outcome = self
            .engine
            .reject(&record, command, Utc::now())
            .map_err(|error| self.rejected(Some(id), WorkflowAction::Reject, error))?;

        upsert_record(conn, &outcome.record).await.map_err(persistence)?;
        Ok(outcome)
    }

    async fn cancel_in_tx(
        &self,
        conn: &mut SqliteConnection,
        id: &AuthorizationId,
        command: CancelCommand,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let record = required(conn, id).await?;

        let outcome = self
            .engine
            .cancel(&record, command, Utc::now())
            .map_err(|error| self.rejected(Some(id), WorkflowAction::Cancel, error))?;

        upsert_record(conn, &outcome.record).await.map_err(persistence)?;
        Ok(outcome)
    }

    async fn revoke_in_tx(
        &self,
        conn: &mut SqliteConnection,
        id: &AuthorizationId,
        command: RevokeCommand,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let record = required(conn, id).await?;

        let outcome = self
            .engine
            .revoke(&record, command, Utc::now())
            .map_err(|error| self.rejected(Some(id), WorkflowAction::Revoke, error))?;

        upsert_record(conn, &outcome.record).await.map_err(persistence)?;
        Ok(outcome)
    }

    fn applied(&self, outcome: &TransitionOutcome) {
        let mut event = AuditEvent::new(
            Some(outcome.record.id.clone()),
            outcome.record.id.0.clone(),
            "workflow.transition_applied",
            AuditCategory::Workflow,
            actor_of(&outcome.record),
            AuditOutcome::Success,
        )
        .with_metadata("action", outcome.action.to_string())
        .with_metadata("to", outcome.to.as_str());
        if let Some(from) = outcome.from {
            event = event.with_metadata("from", from.as_str());
        }
        self.audit.emit(event);
    }

    fn rejected(
        &self,
        id: Option<&AuthorizationId>,
        action: WorkflowAction,
        error: WorkflowError,
    ) -> ApplicationError {
        let correlation_id =
            id.map(|id| id.0.clone()).unwrap_or_else(|| "unassigned".to_string());
        self.audit.emit(
            AuditEvent::new(
                id.cloned(),
                correlation_id,
                "workflow.transition_rejected",
                AuditCategory::Workflow,
                "workflow-engine",
                AuditOutcome::Rejected,
            )
            .with_metadata("action", action.to_string())
            .with_metadata("error", error.to_string()),
        );
        ApplicationError::workflow(error)
    }
}

async fn required(
    conn: &mut SqliteConnection,
    id: &AuthorizationId,
) -> Result<AuthorizationRecord, ApplicationError> {
    fetch_record(conn, id)
        .await
        .map_err(persistence)?
        .ok_or_else(|| ApplicationError::NotFound(id.clone()))
}

fn actor_of(record: &AuthorizationRecord) -> String {
    match &record.state {
        AuthorizationState::Requested => record.seller_id.0.clone(),
        AuthorizationState::Approved { approved_by, .. } => approved_by.clone(),
        AuthorizationState::Rejected { rejected_by, .. } => rejected_by.clone(),
        AuthorizationState::Revoked { revoked_by, .. } => revoked_by.clone(),
        AuthorizationState::Cancelled { cancelled_by, .. } => cancelled_by.clone(),
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn connect_failure(error: sqlx::Error) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use serde_json::Map;

    use listgate_core::audit::{AuditOutcome, InMemoryAuditSink};
    use listgate_core::domain::authorization::{
        ActorRole, AuthorizationId, AuthorizationRecord, AuthorizationState, AuthorizationStatus,
    };
    use listgate_core::domain::product::ProductId;
    use listgate_core::domain::seller::SellerId;
    use listgate_core::domain::supplier::SupplierId;
    use listgate_core::errors::ApplicationError;
    use listgate_core::policy::AuthorizationPolicy;
    use listgate_core::workflow::engine::WorkflowError;
    use listgate_core::workflow::states::{
        ApproveCommand, CancelCommand, RejectCommand, RequestCommand, RevokeCommand,
    };

    use super::SqlWorkflowStore;
    use crate::repositories::{AuthorizationRepository, SqlAuthorizationRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn memory_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn make_store(
        pool: &DbPool,
        policy: AuthorizationPolicy,
    ) -> (SqlWorkflowStore, InMemoryAuditSink) {
        let sink = InMemoryAuditSink::default();
        (SqlWorkflowStore::new(pool.clone(), policy, Arc::new(sink.clone())), sink)
    }

    fn request_command(seller: &str, product: &str) -> RequestCommand {
        RequestCommand {
            seller_id: SellerId(seller.to_string()),
            product_id: ProductId(product.to_string()),
            supplier_id: SupplierId("supplier-1".to_string()),
            metadata: Map::new(),
        }
    }

    fn approve_command() -> ApproveCommand {
        ApproveCommand { approved_by: "supplier-user-1".to_string() }
    }

    fn workflow_error(error: &ApplicationError) -> &WorkflowError {
        error.as_workflow().expect("expected a workflow error")
    }

    #[tokio::test]
    async fn request_persists_a_requested_record() {
        let pool = memory_pool().await;
        let (store, sink) = make_store(&pool, AuthorizationPolicy::default());

        let record =
            store.request(request_command("seller-1", "product-a")).await.expect("request");

        assert_eq!(record.status(), AuthorizationStatus::Requested);
        let reloaded = store.fetch(&record.id).await.expect("fetch");
        assert_eq!(reloaded, record);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "workflow.transition_applied");
        assert_eq!(events[0].outcome, AuditOutcome::Success);
    }

    #[tokio::test]
    async fn duplicate_request_for_an_active_pair_is_refused() {
        let pool = memory_pool().await;
        let (store, sink) = make_store(&pool, AuthorizationPolicy::default());

        let first =
            store.request(request_command("seller-1", "product-a")).await.expect("request");
        let error = store
            .request(request_command("seller-1", "product-a"))
            .await
            .expect_err("second active request must fail");

        match workflow_error(&error) {
            WorkflowError::DuplicateActive { authorization_id, status } => {
                assert_eq!(*authorization_id, first.id);
                assert_eq!(*status, AuthorizationStatus::Requested);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(sink.events().iter().any(|e| e.event_type == "workflow.transition_rejected"));
    }

    #[tokio::test]
    async fn approve_transitions_and_respects_the_slot_limit() {
        let pool = memory_pool().await;
        let policy = AuthorizationPolicy { max_approved_per_seller: 1, ..Default::default() };
        let (store, _) = make_store(&pool, policy);

        let first =
            store.request(request_command("seller-1", "product-a")).await.expect("request");
        let approved = store.approve(&first.id, approve_command()).await.expect("approve");
        assert_eq!(approved.status(), AuthorizationStatus::Approved);

        // Slots are not checked at request time, so queuing another request
        // works even at the limit.
        let second =
            store.request(request_command("seller-1", "product-b")).await.expect("request");

        let error = store
            .approve(&second.id, approve_command())
            .await
            .expect_err("approval past the limit must fail");
        assert_eq!(
            *workflow_error(&error),
            WorkflowError::SlotsExhausted { approved_count: 1, max_limit: 1 }
        );
    }

    #[tokio::test]
    async fn reject_enforces_reason_length_and_starts_a_cooldown() {
        let pool = memory_pool().await;
        let (store, _) = make_store(&pool, AuthorizationPolicy::default());

        let record =
            store.request(request_command("seller-1", "product-a")).await.expect("request");

        let error = store
            .reject(
                &record.id,
                RejectCommand {
                    rejected_by: "supplier-user-1".to_string(),
                    reason: "bad".to_string(),
                    cooldown_days: Some(14),
                },
            )
            .await
            .expect_err("short reason must fail");
        assert_eq!(
            *workflow_error(&error),
            WorkflowError::ReasonTooShort { length: 3, minimum: 10 }
        );

        let rejected = store
            .reject(
                &record.id,
                RejectCommand {
                    rejected_by: "supplier-user-1".to_string(),
                    reason: "Quality concerns noted".to_string(),
                    cooldown_days: Some(14),
                },
            )
            .await
            .expect("reject with a real reason");
        assert_eq!(rejected.status(), AuthorizationStatus::Rejected);

        let error = store
            .request(request_command("seller-1", "product-a"))
            .await
            .expect_err("pair is cooling down");
        match workflow_error(&error) {
            WorkflowError::CooldownActive { days_remaining, .. } => {
                assert_eq!(*days_remaining, 14);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn expired_cooldown_frees_the_pair() {
        let pool = memory_pool().await;
        let (store, _) = make_store(&pool, AuthorizationPolicy::default());
        let repo = SqlAuthorizationRepository::new(pool.clone());

        let now = Utc::now();
        let lapsed = AuthorizationRecord {
            id: AuthorizationId("auth-old".to_string()),
            seller_id: SellerId("seller-1".to_string()),
            product_id: ProductId("product-a".to_string()),
            supplier_id: SupplierId("supplier-1".to_string()),
            requested_at: now - Duration::days(40),
            updated_at: now - Duration::days(30),
            metadata: Map::new(),
            state: AuthorizationState::Rejected {
                rejected_at: now - Duration::days(30),
                rejected_by: "supplier-user-1".to_string(),
                reason: "missing compliance docs".to_string(),
                cooldown_until: now - Duration::days(16),
            },
        };
        repo.save(lapsed).await.expect("seed lapsed rejection");

        let record = store
            .request(request_command("seller-1", "product-a"))
            .await
            .expect("expired cooldown must not block");
        assert_eq!(record.status(), AuthorizationStatus::Requested);
    }

    #[tokio::test]
    async fn cancel_is_owner_only_and_penalty_free() {
        let pool = memory_pool().await;
        let (store, _) = make_store(&pool, AuthorizationPolicy::default());

        let record =
            store.request(request_command("seller-1", "product-a")).await.expect("request");

        let error = store
            .cancel(&record.id, CancelCommand { requested_by: SellerId("seller-2".to_string()) })
            .await
            .expect_err("another seller must not cancel");
        assert!(matches!(workflow_error(&error), WorkflowError::NotPermitted { .. }));

        let cancelled = store
            .cancel(&record.id, CancelCommand { requested_by: SellerId("seller-1".to_string()) })
            .await
            .expect("owner cancel");
        assert_eq!(cancelled.status(), AuthorizationStatus::Cancelled);

        // No cooldown after cancellation: the pair is immediately free again.
        let again =
            store.request(request_command("seller-1", "product-a")).await.expect("re-request");
        assert_eq!(again.status(), AuthorizationStatus::Requested);
    }

    #[tokio::test]
    async fn revoke_frees_a_slot_and_starts_the_revoke_cooldown() {
        let pool = memory_pool().await;
        let policy = AuthorizationPolicy { max_approved_per_seller: 1, ..Default::default() };
        let (store, _) = make_store(&pool, policy);

        let record =
            store.request(request_command("seller-1", "product-a")).await.expect("request");
        store.approve(&record.id, approve_command()).await.expect("approve");

        let revoked = store
            .revoke(
                &record.id,
                RevokeCommand {
                    revoked_by: "supplier-user-1".to_string(),
                    actor: ActorRole::Supplier,
                    reason: "repeated fulfillment failures".to_string(),
                    cooldown_days: None,
                },
            )
            .await
            .expect("supplier revoke");
        assert_eq!(revoked.status(), AuthorizationStatus::Revoked);

        // The revoked pair cools down with the default window.
        let error = store
            .request(request_command("seller-1", "product-a"))
            .await
            .expect_err("revoked pair is cooling down");
        match workflow_error(&error) {
            WorkflowError::CooldownActive { days_remaining, .. } => assert_eq!(*days_remaining, 30),
            other => panic!("unexpected error: {other:?}"),
        }

        // The slot is free, so a different product can be approved again.
        let other =
            store.request(request_command("seller-1", "product-b")).await.expect("request");
        store.approve(&other.id, approve_command()).await.expect("slot was freed by revoke");
    }

    #[tokio::test]
    async fn terminal_records_refuse_further_transitions() {
        let pool = memory_pool().await;
        let (store, _) = make_store(&pool, AuthorizationPolicy::default());

        let record =
            store.request(request_command("seller-1", "product-a")).await.expect("request");
        store
            .reject(
                &record.id,
                RejectCommand {
                    rejected_by: "supplier-user-1".to_string(),
                    reason: "not a category fit".to_string(),
                    cooldown_days: None,
                },
            )
            .await
            .expect("reject");

        let error = store
            .approve(&record.id, approve_command())
            .await
            .expect_err("rejected is terminal");
        assert!(matches!(
            workflow_error(&error),
            WorkflowError::InvalidTransition { status: AuthorizationStatus::Rejected, .. }
        ));
    }

    #[tokio::test]
    async fn unknown_ids_surface_not_found() {
        let pool = memory_pool().await;
        let (store, _) = make_store(&pool, AuthorizationPolicy::default());

        let error = store
            .approve(&AuthorizationId("auth-missing".to_string()), approve_command())
            .await
            .expect_err("unknown id must fail");
        assert!(matches!(error, ApplicationError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_approvals_resolve_to_one_success() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("workflow.db").display());
        let pool = connect_with_settings(&url, 4, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let policy = AuthorizationPolicy { max_approved_per_seller: 2, ..Default::default() };
        let store = Arc::new(SqlWorkflowStore::new(
            pool.clone(),
            policy,
            Arc::new(InMemoryAuditSink::default()),
        ));

        let first =
            store.request(request_command("seller-1", "product-a")).await.expect("request");
        store.approve(&first.id, approve_command()).await.expect("approve first");

        let second =
            store.request(request_command("seller-1", "product-b")).await.expect("request");
        let third =
            store.request(request_command("seller-1", "product-c")).await.expect("request");

        let left = {
            let store = store.clone();
            let id = second.id.clone();
            tokio::spawn(async move { store.approve(&id, approve_command()).await })
        };
        let right = {
            let store = store.clone();
            let id = third.id.clone();
            tokio::spawn(async move { store.approve(&id, approve_command()).await })
        };

        let results = [left.await.expect("join"), right.await.expect("join")];
        let successes = results.iter().filter(|result| result.is_ok()).count();
        assert_eq!(successes, 1, "exactly one of two racing approvals may land");

        let failure = results.into_iter().find_map(Result::err).expect("one approval must fail");
        assert_eq!(
            *workflow_error(&failure),
            WorkflowError::SlotsExhausted { approved_count: 2, max_limit: 2 }
        );

        let repo = SqlAuthorizationRepository::new(pool);
        let count = repo.approved_count(&SellerId("seller-1".to_string())).await.expect("count");
        assert_eq!(count, 2);
    }
}
