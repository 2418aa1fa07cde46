use std::sync::Arc;

use listgate_core::audit::{AuditEvent, AuditSink};
use listgate_core::config::{AppConfig, ConfigError, LoadOptions};
use listgate_db::repositories::SqlAuthorizationRepository;
use listgate_db::{connect_with_settings, migrations, DbPool, SqlWorkflowStore};
use thiserror::Error;
use tracing::info;

use crate::api::ApiState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub api_state: ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

/// Audit sink for production: every workflow transition lands in the
/// structured log stream alongside the request logs.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            event_name = %event.event_type,
            correlation_id = %event.correlation_id,
            authorization_id = event
                .authorization_id
                .as_ref()
                .map(|id| id.0.as_str())
                .unwrap_or("unknown"),
            actor = %event.actor,
            outcome = ?event.outcome,
            metadata = ?event.metadata,
            "audit event"
        );
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let api_state = ApiState {
        store: Arc::new(SqlWorkflowStore::new(
            db_pool.clone(),
            config.policy.clone(),
            Arc::new(TracingAuditSink),
        )),
        repo: Arc::new(SqlAuthorizationRepository::new(db_pool.clone())),
        admin_token: config.server.admin_token.clone(),
    };

    Ok(Application { config, db_pool, api_state })
}
