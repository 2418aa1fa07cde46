//! JSON API for the authorization workflow.
//!
//! Endpoints:
//! - `POST /authorizations`                    — seller requests a listing authorization
//! - `GET  /authorizations/{id}`               — fetch one record
//! - `POST /authorizations/{id}/approve`       — supplier approval
//! - `POST /authorizations/{id}/reject`        — supplier rejection (reason + cooldown)
//! - `POST /authorizations/{id}/cancel`        — seller cancels their own pending request
//! - `POST /authorizations/{id}/revoke`        — supplier or platform admin revocation
//! - `GET  /sellers/{id}/limits`               — slot usage summary
//! - `GET  /sellers/{id}/authorizations`       — seller portfolio (optional ?status=)
//! - `GET  /suppliers/{id}/inbox`              — supplier inbox (optional ?status= &product=)

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use listgate_core::domain::authorization::{
    ActorRole, AuthorizationId, AuthorizationRecord, AuthorizationStatus,
};
use listgate_core::domain::product::ProductId;
use listgate_core::domain::seller::{SellerId, SellerLimit};
use listgate_core::domain::supplier::SupplierId;
use listgate_core::errors::{ApplicationError, DomainError, InterfaceError};
use listgate_core::views::{supplier_inbox, InboxEntry, SellerPortfolio};
use listgate_core::workflow::engine::WorkflowError;
use listgate_core::workflow::states::{
    ApproveCommand, CancelCommand, RejectCommand, RequestCommand, RevokeCommand,
};
use listgate_db::repositories::{AuthorizationRepository, RepositoryError};
use listgate_db::SqlWorkflowStore;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<SqlWorkflowStore>,
    pub repo: Arc<dyn AuthorizationRepository>,
    pub admin_token: Option<SecretString>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/authorizations", post(create_authorization))
        .route("/authorizations/{id}", get(get_authorization))
        .route("/authorizations/{id}/approve", post(approve_authorization))
        .route("/authorizations/{id}/reject", post(reject_authorization))
        .route("/authorizations/{id}/cancel", post(cancel_authorization))
        .route("/authorizations/{id}/revoke", post(revoke_authorization))
        .route("/sellers/{id}/limits", get(seller_limits))
        .route("/sellers/{id}/authorizations", get(seller_authorizations))
        .route("/suppliers/{id}/inbox", get(supplier_inbox_view))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateAuthorizationRequest {
    pub seller_id: String,
    pub product_id: String,
    pub supplier_id: String,
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub approved_by: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub rejected_by: String,
    pub reason: String,
    pub cooldown_days: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub requested_by: String,
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub revoked_by: String,
    pub actor: ActorRole,
    pub reason: String,
    pub cooldown_days: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SellerViewQuery {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InboxQuery {
    pub status: Option<String>,
    pub product: Option<String>,
}

/// Structured error body. `details` carries the discriminated workflow error
/// (counts, dates, state) so the UI can render the precise refusal instead
/// of a generic failure.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub correlation_id: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

// ---------------------------------------------------------------------------
// Transition handlers
// ---------------------------------------------------------------------------

async fn create_authorization(
    State(state): State<ApiState>,
    Json(body): Json<CreateAuthorizationRequest>,
) -> ApiResult<AuthorizationRecord> {
    let correlation_id = new_correlation_id();
    let command = RequestCommand {
        seller_id: SellerId(body.seller_id),
        product_id: ProductId(body.product_id),
        supplier_id: SupplierId(body.supplier_id),
        metadata: body.metadata.unwrap_or_default(),
    };

    let record = state
        .store
        .request(command)
        .await
        .map_err(|error| error_response(error, &correlation_id))?;

    info!(
        event_name = "api.authorization.requested",
        correlation_id = %correlation_id,
        authorization_id = %record.id,
        seller_id = %record.seller_id,
        product_id = %record.product_id,
        "authorization requested"
    );
    Ok(Json(record))
}

async fn get_authorization(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<AuthorizationRecord> {
    let correlation_id = new_correlation_id();
    let record = state
        .store
        .fetch(&AuthorizationId(id))
        .await
        .map_err(|error| error_response(error, &correlation_id))?;
    Ok(Json(record))
}

async fn approve_authorization(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<ApproveRequest>,
) -> ApiResult<AuthorizationRecord> {
    let correlation_id = new_correlation_id();
    let record = state
        .store
        .approve(&AuthorizationId(id), ApproveCommand { approved_by: body.approved_by })
        .await
        .map_err(|error| error_response(error, &correlation_id))?;

    info!(
        event_name = "api.authorization.approved",
        correlation_id = %correlation_id,
        authorization_id = %record.id,
        seller_id = %record.seller_id,
        "authorization approved"
    );
    Ok(Json(record))
}

async fn reject_authorization(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<RejectRequest>,
) -> ApiResult<AuthorizationRecord> {
    let correlation_id = new_correlation_id();
    let record = state
        .store
        .reject(
            &AuthorizationId(id),
            RejectCommand {
                rejected_by: body.rejected_by,
                reason: body.reason,
                cooldown_days: body.cooldown_days,
            },
        )
        .await
        .map_err(|error| error_response(error, &correlation_id))?;

    info!(
        event_name = "api.authorization.rejected",
        correlation_id = %correlation_id,
        authorization_id = %record.id,
        seller_id = %record.seller_id,
        "authorization rejected"
    );
    Ok(Json(record))
}

async fn cancel_authorization(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> ApiResult<AuthorizationRecord> {
    let correlation_id = new_correlation_id();
    let record = state
        .store
        .cancel(
            &AuthorizationId(id),
            CancelCommand { requested_by: SellerId(body.requested_by) },
        )
        .await
        .map_err(|error| error_response(error, &correlation_id))?;

    info!(
        event_name = "api.authorization.cancelled",
        correlation_id = %correlation_id,
        authorization_id = %record.id,
        seller_id = %record.seller_id,
        "authorization cancelled"
    );
    Ok(Json(record))
}

async fn revoke_authorization(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<RevokeRequest>,
) -> ApiResult<AuthorizationRecord> {
    let correlation_id = new_correlation_id();

    if body.actor == ActorRole::PlatformAdmin {
        require_admin_token(&state, &headers, &correlation_id)?;
    }

    let record = state
        .store
        .revoke(
            &AuthorizationId(id),
            RevokeCommand {
                revoked_by: body.revoked_by,
                actor: body.actor,
                reason: body.reason,
                cooldown_days: body.cooldown_days,
            },
        )
        .await
        .map_err(|error| error_response(error, &correlation_id))?;

    info!(
        event_name = "api.authorization.revoked",
        correlation_id = %correlation_id,
        authorization_id = %record.id,
        seller_id = %record.seller_id,
        "authorization revoked"
    );
    Ok(Json(record))
}

// ---------------------------------------------------------------------------
// Projection handlers
// ---------------------------------------------------------------------------

async fn seller_limits(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<SellerLimit> {
    let correlation_id = new_correlation_id();
    let seller_id = SellerId(id);
    let approved_count = state
        .repo
        .approved_count(&seller_id)
        .await
        .map_err(|error| repository_error(error, &correlation_id))?;

    let limit =
        SellerLimit::derive(seller_id, approved_count, state.store.policy().max_approved_per_seller);
    Ok(Json(limit))
}

async fn seller_authorizations(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<SellerViewQuery>,
) -> ApiResult<SellerPortfolio> {
    let correlation_id = new_correlation_id();
    let status = parse_status_filter(query.status.as_deref(), &correlation_id)?;
    let seller_id = SellerId(id);

    let records = state
        .repo
        .list_for_seller(&seller_id, status)
        .await
        .map_err(|error| repository_error(error, &correlation_id))?;
    let approved_count = state
        .repo
        .approved_count(&seller_id)
        .await
        .map_err(|error| repository_error(error, &correlation_id))?;

    let portfolio = SellerPortfolio::assemble(
        seller_id,
        records,
        approved_count,
        state.store.policy().max_approved_per_seller,
    );
    Ok(Json(portfolio))
}

async fn supplier_inbox_view(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Vec<InboxEntry>> {
    let correlation_id = new_correlation_id();
    let status = parse_status_filter(query.status.as_deref(), &correlation_id)?;
    let supplier_id = SupplierId(id);

    let records = state
        .repo
        .list_for_supplier(&supplier_id, status, query.product.map(ProductId))
        .await
        .map_err(|error| repository_error(error, &correlation_id))?;

    let mut approved_counts: HashMap<SellerId, u32> = HashMap::new();
    for seller_id in records.iter().map(|record| record.seller_id.clone()) {
        if approved_counts.contains_key(&seller_id) {
            continue;
        }
        let count = state
            .repo
            .approved_count(&seller_id)
            .await
            .map_err(|error| repository_error(error, &correlation_id))?;
        approved_counts.insert(seller_id, count);
    }

    let entries =
        supplier_inbox(records, &approved_counts, state.store.policy().max_approved_per_seller);
    Ok(Json(entries))
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

fn require_admin_token(
    state: &ApiState,
    headers: &HeaderMap,
    correlation_id: &str,
) -> Result<(), (StatusCode, Json<ApiError>)> {
    let Some(expected) = &state.admin_token else {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "admin_token_required",
            "platform admin revocation is disabled: no admin token is configured",
            None,
            correlation_id,
        ));
    };

    let provided = headers.get("x-admin-token").and_then(|value| value.to_str().ok());
    if provided != Some(expected.expose_secret()) {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "admin_token_required",
            "invalid or missing x-admin-token header",
            None,
            correlation_id,
        ));
    }

    Ok(())
}

fn parse_status_filter(
    raw: Option<&str>,
    correlation_id: &str,
) -> Result<Option<AuthorizationStatus>, (StatusCode, Json<ApiError>)> {
    match raw {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|message: String| {
            api_error(StatusCode::BAD_REQUEST, "invalid_status", message, None, correlation_id)
        }),
    }
}

fn repository_error(
    error: RepositoryError,
    correlation_id: &str,
) -> (StatusCode, Json<ApiError>) {
    error_response(ApplicationError::Persistence(error.to_string()), correlation_id)
}

fn error_response(error: ApplicationError, correlation_id: &str) -> (StatusCode, Json<ApiError>) {
    warn!(
        event_name = "api.request.failed",
        correlation_id = %correlation_id,
        error = %error,
        "request failed"
    );

    let (kind, details) = match error.as_workflow() {
        Some(workflow) => (workflow_kind(workflow), serde_json::to_value(workflow).ok()),
        None => (application_kind(&error), None),
    };

    let interface = error.into_interface(correlation_id);
    api_error(interface_status(&interface), kind, interface.detail(), details, correlation_id)
}

fn interface_status(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn application_kind(error: &ApplicationError) -> &'static str {
    match error {
        ApplicationError::Domain(DomainError::Workflow(_)) => "workflow_error",
        ApplicationError::Domain(DomainError::InvariantViolation(_)) => "invariant_violation",
        ApplicationError::NotFound(_) => "not_found",
        ApplicationError::Persistence(_) => "persistence_failure",
        ApplicationError::Configuration(_) => "configuration_failure",
    }
}

fn workflow_kind(error: &WorkflowError) -> &'static str {
    match error {
        WorkflowError::DuplicateActive { .. } => "duplicate_active",
        WorkflowError::CooldownActive { .. } => "cooldown_active",
        WorkflowError::SlotsExhausted { .. } => "slots_exhausted",
        WorkflowError::InvalidTransition { .. } => "invalid_transition",
        WorkflowError::ReasonTooShort { .. } => "reason_too_short",
        WorkflowError::CooldownOutOfRange { .. } => "cooldown_out_of_range",
        WorkflowError::NotPermitted { .. } => "not_permitted",
    }
}

fn api_error(
    status: StatusCode,
    kind: &str,
    message: impl Into<String>,
    details: Option<Value>,
    correlation_id: &str,
) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: kind.to_string(),
            message: message.into(),
            details,
            correlation_id: correlation_id.to_string(),
        }),
    )
}
