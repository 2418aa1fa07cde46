use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use listgate_core::domain::authorization::{
    AuthorizationId, AuthorizationRecord, AuthorizationState, AuthorizationStatus,
};
use listgate_core::domain::product::ProductId;
use listgate_core::domain::seller::SellerId;
use listgate_core::domain::supplier::SupplierId;
use listgate_core::eligibility::{ActiveAuthorization, PairSnapshot, TerminalOutcome};

use super::{AuthorizationRepository, RepositoryError};
use crate::DbPool;

const RECORD_COLUMNS: &str = "id, seller_id, product_id, supplier_id, status, requested_at, \
     updated_at, metadata, approved_at, approved_by, rejected_at, rejected_by, rejection_reason, \
     revoked_at, revoked_by, revocation_reason, cancelled_at, cancelled_by, cooldown_until";

pub struct SqlAuthorizationRepository {
    pool: DbPool,
}

impl SqlAuthorizationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthorizationRepository for SqlAuthorizationRepository {
    async fn find_by_id(
        &self,
        id: &AuthorizationId,
    ) -> Result<Option<AuthorizationRecord>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_record(&mut conn, id).await
    }

    async fn save(&self, record: AuthorizationRecord) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        upsert_record(&mut conn, &record).await
    }

    async fn list_for_seller(
        &self,
        seller_id: &SellerId,
        status: Option<AuthorizationStatus>,
    ) -> Result<Vec<AuthorizationRecord>, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {RECORD_COLUMNS} FROM authorizations WHERE seller_id = "
        ));
        builder.push_bind(seller_id.0.clone());
        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        builder.push(" ORDER BY requested_at DESC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn list_for_supplier(
        &self,
        supplier_id: &SupplierId,
        status: Option<AuthorizationStatus>,
        product: Option<ProductId>,
    ) -> Result<Vec<AuthorizationRecord>, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {RECORD_COLUMNS} FROM authorizations WHERE supplier_id = "
        ));
        builder.push_bind(supplier_id.0.clone());
        if let Some(status) = status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(product) = product {
            builder.push(" AND product_id = ").push_bind(product.0);
        }
        builder.push(" ORDER BY requested_at ASC");

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn approved_count(&self, seller_id: &SellerId) -> Result<u32, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        count_approved(&mut conn, seller_id).await
    }

    async fn pair_snapshot(
        &self,
        seller_id: &SellerId,
        product_id: &ProductId,
    ) -> Result<PairSnapshot, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_pair_snapshot(&mut conn, seller_id, product_id).await
    }
}

// Connection-level helpers shared with the workflow store, which runs the
// same reads inside its own write transaction.

pub(crate) async fn fetch_record(
    conn: &mut SqliteConnection,
    id: &AuthorizationId,
) -> Result<Option<AuthorizationRecord>, RepositoryError> {
    let row = sqlx::query(&format!(
        "SELECT {RECORD_COLUMNS} FROM authorizations WHERE id = ?"
    ))
    .bind(&id.0)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(ref row) => Ok(Some(row_to_record(row)?)),
        None => Ok(None),
    }
}

pub(crate) async fn upsert_record(
    conn: &mut SqliteConnection,
    record: &AuthorizationRecord,
) -> Result<(), RepositoryError> {
    let columns = state_columns(&record.state);
    let metadata = serde_json::to_string(&record.metadata)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    sqlx::query(
        "INSERT INTO authorizations (id, seller_id, product_id, supplier_id, status,
                                     requested_at, updated_at, metadata,
                                     approved_at, approved_by,
                                     rejected_at, rejected_by, rejection_reason,
                                     revoked_at, revoked_by, revocation_reason,
                                     cancelled_at, cancelled_by, cooldown_until)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             status = excluded.status,
             updated_at = excluded.updated_at,
             metadata = excluded.metadata,
             approved_at = excluded.approved_at,
             approved_by = excluded.approved_by,
             rejected_at = excluded.rejected_at,
             rejected_by = excluded.rejected_by,
             rejection_reason = excluded.rejection_reason,
             revoked_at = excluded.revoked_at,
             revoked_by = excluded.revoked_by,
             revocation_reason = excluded.revocation_reason,
             cancelled_at = excluded.cancelled_at,
             cancelled_by = excluded.cancelled_by,
             cooldown_until = excluded.cooldown_until",
    )
    .bind(&record.id.0)
    .bind(&record.seller_id.0)
    .bind(&record.product_id.0)
    .bind(&record.supplier_id.0)
    .bind(record.status().as_str())
    .bind(record.requested_at.to_rfc3339())
    .bind(record.updated_at.to_rfc3339())
    .bind(metadata)
    .bind(&columns.approved_at)
    .bind(&columns.approved_by)
    .bind(&columns.rejected_at)
    .bind(&columns.rejected_by)
    .bind(&columns.rejection_reason)
    .bind(&columns.revoked_at)
    .bind(&columns.revoked_by)
    .bind(&columns.revocation_reason)
    .bind(&columns.cancelled_at)
    .bind(&columns.cancelled_by)
    .bind(&columns.cooldown_until)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn count_approved(
    conn: &mut SqliteConnection,
    seller_id: &SellerId,
) -> Result<u32, RepositoryError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM authorizations WHERE seller_id = ? AND status = 'approved'",
    )
    .bind(&seller_id.0)
    .fetch_one(&mut *conn)
    .await?;

    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

pub(crate) async fn fetch_pair_snapshot(
    conn: &mut SqliteConnection,
    seller_id: &SellerId,
    product_id: &ProductId,
) -> Result<PairSnapshot, RepositoryError> {
    let active_row = sqlx::query(&format!(
        "SELECT {RECORD_COLUMNS} FROM authorizations
         WHERE seller_id = ? AND product_id = ? AND status IN ('requested', 'approved')
         LIMIT 1"
    ))
    .bind(&seller_id.0)
    .bind(&product_id.0)
    .fetch_optional(&mut *conn)
    .await?;

    let active = match active_row {
        Some(ref row) => {
            let record = row_to_record(row)?;
            Some(ActiveAuthorization { id: record.id, status: record.state.status() })
        }
        None => None,
    };

    let terminal_row = sqlx::query(&format!(
        "SELECT {RECORD_COLUMNS} FROM authorizations
         WHERE seller_id = ? AND product_id = ? AND status IN ('rejected', 'revoked', 'cancelled')
         ORDER BY updated_at DESC
         LIMIT 1"
    ))
    .bind(&seller_id.0)
    .bind(&product_id.0)
    .fetch_optional(&mut *conn)
    .await?;

    let latest_terminal = match terminal_row {
        Some(ref row) => {
            let record = row_to_record(row)?;
            Some(TerminalOutcome {
                status: record.state.status(),
                cooldown_until: record.state.cooldown_until(),
            })
        }
        None => None,
    };

    let approved_count = count_approved(conn, seller_id).await?;

    Ok(PairSnapshot { active, latest_terminal, approved_count })
}

#[derive(Default)]
struct StateColumns {
    approved_at: Option<String>,
    approved_by: Option<String>,
    rejected_at: Option<String>,
    rejected_by: Option<String>,
    rejection_reason: Option<String>,
    revoked_at: Option<String>,
    revoked_by: Option<String>,
    revocation_reason: Option<String>,
    cancelled_at: Option<String>,
    cancelled_by: Option<String>,
    cooldown_until: Option<String>,
}

fn state_columns(state: &AuthorizationState) -> StateColumns {
    match state {
        AuthorizationState::Requested => StateColumns::default(),
        AuthorizationState::Approved { approved_at, approved_by } => StateColumns {
            approved_at: Some(approved_at.to_rfc3339()),
            approved_by: Some(approved_by.clone()),
            ..StateColumns::default()
        },
        AuthorizationState::Rejected { rejected_at, rejected_by, reason, cooldown_until } => {
            StateColumns {
                rejected_at: Some(rejected_at.to_rfc3339()),
                rejected_by: Some(rejected_by.clone()),
                rejection_reason: Some(reason.clone()),
                cooldown_until: Some(cooldown_until.to_rfc3339()),
                ..StateColumns::default()
            }
        }
        AuthorizationState::Revoked { revoked_at, revoked_by, reason, cooldown_until } => {
            StateColumns {
                revoked_at: Some(revoked_at.to_rfc3339()),
                revoked_by: Some(revoked_by.clone()),
                revocation_reason: Some(reason.clone()),
                cooldown_until: Some(cooldown_until.to_rfc3339()),
                ..StateColumns::default()
            }
        }
        AuthorizationState::Cancelled { cancelled_at, cancelled_by } => StateColumns {
            cancelled_at: Some(cancelled_at.to_rfc3339()),
            cancelled_by: Some(cancelled_by.clone()),
            ..StateColumns::default()
        },
    }
}

fn row_to_record(row: &SqliteRow) -> Result<AuthorizationRecord, RepositoryError> {
    let id: String = column(row, "id")?;
    let seller_id: String = column(row, "seller_id")?;
    let product_id: String = column(row, "product_id")?;
    let supplier_id: String = column(row, "supplier_id")?;
    let status_text: String = column(row, "status")?;
    let requested_at = parse_timestamp(&column::<String>(row, "requested_at")?)?;
    let updated_at = parse_timestamp(&column::<String>(row, "updated_at")?)?;
    let metadata_text: String = column(row, "metadata")?;

    let metadata: Map<String, Value> = serde_json::from_str(&metadata_text)
        .map_err(|error| RepositoryError::Decode(format!("metadata is not a JSON object: {error}")))?;

    let status: AuthorizationStatus =
        status_text.parse().map_err(RepositoryError::Decode)?;

    let state = match status {
        AuthorizationStatus::Requested => AuthorizationState::Requested,
        AuthorizationStatus::Approved => AuthorizationState::Approved {
            approved_at: required_timestamp(row, "approved_at")?,
            approved_by: required_text(row, "approved_by")?,
        },
        AuthorizationStatus::Rejected => AuthorizationState::Rejected {
            rejected_at: required_timestamp(row, "rejected_at")?,
            rejected_by: required_text(row, "rejected_by")?,
            reason: required_text(row, "rejection_reason")?,
            cooldown_until: required_timestamp(row, "cooldown_until")?,
        },
        AuthorizationStatus::Revoked => AuthorizationState::Revoked {
            revoked_at: required_timestamp(row, "revoked_at")?,
            revoked_by: required_text(row, "revoked_by")?,
            reason: required_text(row, "revocation_reason")?,
            cooldown_until: required_timestamp(row, "cooldown_until")?,
        },
        AuthorizationStatus::Cancelled => AuthorizationState::Cancelled {
            cancelled_at: required_timestamp(row, "cancelled_at")?,
            cancelled_by: required_text(row, "cancelled_by")?,
        },
    };

    Ok(AuthorizationRecord {
        id: AuthorizationId(id),
        seller_id: SellerId(seller_id),
        product_id: ProductId(product_id),
        supplier_id: SupplierId(supplier_id),
        requested_at,
        updated_at,
        metadata,
        state,
    })
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn required_text(row: &SqliteRow, name: &str) -> Result<String, RepositoryError> {
    column::<Option<String>>(row, name)?
        .ok_or_else(|| RepositoryError::Decode(format!("column `{name}` is required for this status")))
}

fn required_timestamp(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, RepositoryError> {
    parse_timestamp(&required_text(row, name)?)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {error}")))
}
