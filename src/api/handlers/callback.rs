//! Provider callback (IPN) handlers
//!
//! Each provider has its own retry contract:
//! - GatewayA retries until it reads `RspCode` `00` or `02` from a 200 reply.
//! - GatewayB retries on any non-2xx status.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use super::super::state::AppState;
use crate::deposit::{ApplyOutcome, DepositError, IgnoreReason};
use crate::verifier::{GatewayAEvent, GatewayBEvent, ProviderCallback, VerifyError};

/// GatewayA acknowledgement body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct GatewayAAck {
    #[serde(rename = "RspCode")]
    pub rsp_code: String,
    #[serde(rename = "Message")]
    pub message: String,
}

impl GatewayAAck {
    fn new(rsp_code: &str, message: &str) -> Self {
        Self {
            rsp_code: rsp_code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn confirmed() -> Self {
        Self::new("00", "Confirm Success")
    }

    pub fn not_found() -> Self {
        Self::new("01", "Order not found")
    }

    pub fn already_final() -> Self {
        Self::new("02", "Order already confirmed")
    }

    pub fn invalid_amount() -> Self {
        Self::new("04", "Invalid amount")
    }

    pub fn invalid_signature() -> Self {
        Self::new("97", "Invalid signature")
    }

    pub fn unknown_error() -> Self {
        Self::new("99", "Unknown error")
    }
}

/// Ack for a callback that failed verification
pub fn gateway_a_verify_ack(e: &VerifyError) -> GatewayAAck {
    match e {
        VerifyError::InvalidSignature => GatewayAAck::invalid_signature(),
        VerifyError::MalformedPayload("gwa_TxnRef") => GatewayAAck::not_found(),
        VerifyError::MalformedPayload("gwa_Amount") => GatewayAAck::invalid_amount(),
        _ => GatewayAAck::unknown_error(),
    }
}

/// Ack for a verified callback, from the engine's answer
pub fn gateway_a_ack(result: &Result<ApplyOutcome, DepositError>) -> GatewayAAck {
    match result {
        Ok(outcome) if outcome.applied => GatewayAAck::confirmed(),
        Ok(outcome) => match &outcome.ignored_reason {
            Some(IgnoreReason::AmountMismatch { .. }) => GatewayAAck::invalid_amount(),
            // Failure recorded; payer may retry with a new checkout
            Some(IgnoreReason::GatewayFailure(_)) => GatewayAAck::confirmed(),
            Some(IgnoreReason::MethodMismatch) => GatewayAAck::not_found(),
            Some(
                IgnoreReason::DuplicateDelivery
                | IgnoreReason::ConflictingReference
                | IgnoreReason::LatePayment
                | IgnoreReason::AlreadyFinal,
            ) => GatewayAAck::already_final(),
            Some(IgnoreReason::ConcurrentUpdate) if outcome.status.is_terminal() => {
                GatewayAAck::already_final()
            }
            _ => GatewayAAck::unknown_error(),
        },
        Err(DepositError::NotFound(_)) => GatewayAAck::not_found(),
        Err(_) => GatewayAAck::unknown_error(),
    }
}

/// GatewayA IPN
///
/// GET /api/v1/callbacks/gateway-a
#[utoipa::path(
    get,
    path = "/api/v1/callbacks/gateway-a",
    responses(
        (status = 200, description = "Provider acknowledgement; RspCode 00 means processed", body = GatewayAAck)
    ),
    tag = "Callback"
)]
pub async fn gateway_a_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BTreeMap<String, String>>,
) -> Json<GatewayAAck> {
    let callback = ProviderCallback::GatewayA(GatewayAEvent::new(params));
    let verified = match state.verifiers.verify(&callback) {
        Ok(v) => v,
        Err(e) => {
            warn!(provider = "GATEWAY_A", error = %e, "Rejected gateway callback");
            return Json(gateway_a_verify_ack(&e));
        }
    };

    let result = state.engine.handle_callback(&verified).await;
    if let Err(e) = &result {
        warn!(contract_code = %verified.contract_code, error = %e, "Gateway callback not processed");
    }
    Json(gateway_a_ack(&result))
}

/// HTTP status for a verified GatewayB callback
pub fn gateway_b_status(result: &Result<ApplyOutcome, DepositError>) -> StatusCode {
    match result {
        // Absorbed events (amount mismatch included) are recorded; stop retries
        Ok(_) => StatusCode::NO_CONTENT,
        Err(DepositError::NotFound(_)) => StatusCode::NOT_FOUND,
        Err(DepositError::LockTimeout(_)) => StatusCode::SERVICE_UNAVAILABLE,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// GatewayB IPN
///
/// POST /api/v1/callbacks/gateway-b
#[utoipa::path(
    post,
    path = "/api/v1/callbacks/gateway-b",
    request_body(content = String, description = "Provider IPN JSON", content_type = "application/json"),
    responses(
        (status = 204, description = "Processed"),
        (status = 400, description = "Invalid signature or malformed payload"),
        (status = 404, description = "Unknown order"),
        (status = 500, description = "Storage error; provider retries")
    ),
    tag = "Callback"
)]
pub async fn gateway_b_callback(State(state): State<Arc<AppState>>, body: Bytes) -> StatusCode {
    let event: GatewayBEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            warn!(provider = "GATEWAY_B", error = %e, "Malformed gateway callback");
            return StatusCode::BAD_REQUEST;
        }
    };

    let verified = match state.verifiers.verify(&ProviderCallback::GatewayB(event)) {
        Ok(v) => v,
        Err(e) => {
            warn!(provider = "GATEWAY_B", error = %e, "Rejected gateway callback");
            return StatusCode::BAD_REQUEST;
        }
    };

    let result = state.engine.handle_callback(&verified).await;
    if let Err(e) = &result {
        warn!(contract_code = %verified.contract_code, error = %e, "Gateway callback not processed");
    }
    gateway_b_status(&result)
}
