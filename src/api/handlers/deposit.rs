//! Tenant-facing deposit handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};

use super::super::state::AppState;
use super::super::types::{
    ApiError, ApiResult, CreateDepositRequest, CreateDepositResponse, NotifyPaidResponse, ok,
};
use crate::deposit::{
    ContractCode, DepositError, DepositEvent, EventSource, NewDeposit, PaymentMethod, StatusView,
};

pub const TOKEN_HEADER: &str = "x-deposit-token";

fn presented_token(headers: &HeaderMap) -> &str {
    headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Malformed codes get the same answer as unknown ones.
fn parse_code(raw: &str) -> Result<ContractCode, ApiError> {
    ContractCode::parse(raw).ok_or_else(|| DepositError::NotFound(raw.to_string()).into())
}

/// Create a deposit
///
/// POST /api/v1/deposits
#[utoipa::path(
    post,
    path = "/api/v1/deposits",
    request_body = CreateDepositRequest,
    responses(
        (status = 200, description = "Deposit created", body = CreateDepositResponse),
        (status = 400, description = "Invalid amount or parameters"),
        (status = 409, description = "An active deposit already exists for this property and tenant")
    ),
    tag = "Deposit"
)]
pub async fn create_deposit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDepositRequest>,
) -> ApiResult<CreateDepositResponse> {
    let opened = state
        .engine
        .open(NewDeposit {
            property_id: req.property_id,
            tenant_id: req.tenant_id,
            landlord_id: req.landlord_id,
            amount: req.amount.inner(),
            payment_method: req.payment_method,
        })
        .await?;

    ok(CreateDepositResponse {
        contract_code: opened.record.contract_code.to_string(),
        token: opened.token,
        status: opened.record.status,
        amount: opened.record.amount,
        payment_method: opened.record.payment_method,
        expires_at: opened.record.expires_at,
        channel_payload: opened.channel_payload,
    })
}

/// Poll deposit status
///
/// GET /api/v1/deposits/{code}/status
#[utoipa::path(
    get,
    path = "/api/v1/deposits/{code}/status",
    params(
        ("code" = String, Path, description = "Contract code"),
        ("X-Deposit-Token" = String, Header, description = "Token returned at creation")
    ),
    responses(
        (status = 200, description = "Current status", body = StatusView),
        (status = 404, description = "Unknown contract or wrong token")
    ),
    tag = "Deposit"
)]
pub async fn get_deposit_status(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatusView> {
    let code = parse_code(&code)?;
    let view = state.poller.status(&code, presented_token(&headers)).await?;
    ok(view)
}

/// Tenant reports a completed bank transfer
///
/// POST /api/v1/deposits/{code}/notify-paid
#[utoipa::path(
    post,
    path = "/api/v1/deposits/{code}/notify-paid",
    params(
        ("code" = String, Path, description = "Contract code"),
        ("X-Deposit-Token" = String, Header, description = "Token returned at creation")
    ),
    responses(
        (status = 200, description = "Status after the notification", body = NotifyPaidResponse),
        (status = 400, description = "Deposit is not a bank transfer"),
        (status = 404, description = "Unknown contract or wrong token")
    ),
    tag = "Deposit"
)]
pub async fn notify_paid(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> ApiResult<NotifyPaidResponse> {
    let code = parse_code(&code)?;
    let tx = state
        .poller
        .authorize(&code, presented_token(&headers))
        .await?;
    if tx.payment_method != PaymentMethod::BankTransfer {
        return Err(DepositError::MethodNotAllowed.into());
    }

    let outcome = state
        .engine
        .apply_event(&code, DepositEvent::UserNotifiedPaid, EventSource::Tenant)
        .await?;
    ok(NotifyPaidResponse {
        status: outcome.status,
    })
}
