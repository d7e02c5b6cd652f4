//! Admin Confirmation handlers
//!
//! Mounted behind `admin_auth_middleware`; the acting administrator arrives
//! as an [`AdminIdentity`] extension.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
};

use super::super::auth::AdminIdentity;
use super::super::state::AppState;
use super::super::types::{
    AdminActionResponse, ApiError, ApiResult, ArchiveResponse, HistoryResponse, ResolveReviewRequest,
    ResolveReviewResponse, ReviewItem, ok,
};
use crate::deposit::{ContractCode, DepositError};

fn parse_code(raw: &str) -> Result<ContractCode, ApiError> {
    ContractCode::parse(raw).ok_or_else(|| DepositError::NotFound(raw.to_string()).into())
}

/// Confirm a bank transfer
#[utoipa::path(
    post,
    path = "/api/v1/admin/deposits/{code}/confirm",
    params(("code" = String, Path, description = "Contract code")),
    responses(
        (status = 200, description = "Status after the action", body = AdminActionResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Unknown contract")
    ),
    security(("admin_jwt" = [])),
    tag = "Admin"
)]
pub async fn confirm_deposit(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    Path(code): Path<String>,
) -> ApiResult<AdminActionResponse> {
    let code = parse_code(&code)?;
    let outcome = state.admin.confirm(&code, admin.admin_id).await?;
    ok(AdminActionResponse::from_outcome(code.to_string(), outcome))
}

/// Cancel an active deposit
#[utoipa::path(
    post,
    path = "/api/v1/admin/deposits/{code}/cancel",
    params(("code" = String, Path, description = "Contract code")),
    responses(
        (status = 200, description = "Status after the action", body = AdminActionResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Unknown contract")
    ),
    security(("admin_jwt" = [])),
    tag = "Admin"
)]
pub async fn cancel_deposit(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    Path(code): Path<String>,
) -> ApiResult<AdminActionResponse> {
    let code = parse_code(&code)?;
    let outcome = state.admin.cancel(&code, admin.admin_id).await?;
    ok(AdminActionResponse::from_outcome(code.to_string(), outcome))
}

/// Archive a terminal, unpaid deposit
#[utoipa::path(
    post,
    path = "/api/v1/admin/deposits/{code}/archive",
    params(("code" = String, Path, description = "Contract code")),
    responses(
        (status = 200, description = "Archived", body = ArchiveResponse),
        (status = 400, description = "Deposit is active or paid"),
        (status = 404, description = "Unknown contract")
    ),
    security(("admin_jwt" = [])),
    tag = "Admin"
)]
pub async fn archive_deposit(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    Path(code): Path<String>,
) -> ApiResult<ArchiveResponse> {
    let code = parse_code(&code)?;
    state.admin.archive(&code, admin.admin_id).await?;
    ok(ArchiveResponse {
        contract_code: code.to_string(),
        archived: true,
    })
}

/// Clear the review flag on a deposit
///
/// Status is unchanged; the resolution is recorded in status history.
#[utoipa::path(
    post,
    path = "/api/v1/admin/deposits/{code}/resolve-review",
    params(("code" = String, Path, description = "Contract code")),
    request_body(content = Option<ResolveReviewRequest>, description = "Optional resolution note"),
    responses(
        (status = 200, description = "Flag cleared, or already clear", body = ResolveReviewResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Unknown contract")
    ),
    security(("admin_jwt" = [])),
    tag = "Admin"
)]
pub async fn resolve_review(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminIdentity>,
    Path(code): Path<String>,
    body: Option<Json<ResolveReviewRequest>>,
) -> ApiResult<ResolveReviewResponse> {
    let code = parse_code(&code)?;
    let note = body.and_then(|Json(req)| req.note);
    let resolved = state
        .admin
        .resolve_review(&code, admin.admin_id, note.as_deref())
        .await?;
    ok(ResolveReviewResponse {
        contract_code: code.to_string(),
        resolved,
    })
}

/// Deposits waiting for an administrator
#[utoipa::path(
    get,
    path = "/api/v1/admin/deposits/review",
    responses(
        (status = 200, description = "Waiting transfers first, then flagged deposits; oldest first within each", body = Vec<ReviewItem>)
    ),
    security(("admin_jwt" = [])),
    tag = "Admin"
)]
pub async fn review_queue(State(state): State<Arc<AppState>>) -> ApiResult<Vec<ReviewItem>> {
    let queue = state.admin.review_queue().await?;
    ok(queue.into_iter().map(ReviewItem::from).collect())
}

/// Full status history and absorbed events
#[utoipa::path(
    get,
    path = "/api/v1/admin/deposits/{code}/history",
    params(("code" = String, Path, description = "Contract code")),
    responses(
        (status = 200, description = "History", body = HistoryResponse),
        (status = 404, description = "Unknown contract")
    ),
    security(("admin_jwt" = [])),
    tag = "Admin"
)]
pub async fn deposit_history(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> ApiResult<HistoryResponse> {
    let code = parse_code(&code)?;
    let history = state.admin.history(&code).await?;
    ok(HistoryResponse {
        contract_code: code.to_string(),
        status: history.status,
        entries: history.entries,
        ignored: history.ignored,
    })
}
