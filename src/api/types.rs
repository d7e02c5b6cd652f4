//! API response envelope, error codes and request/response DTOs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::deposit::types::{IgnoreReason, IgnoredEvent, StatusHistoryEntry};
use crate::deposit::{
    ApplyOutcome, ChannelPayload, DepositError, DepositStatus, DepositTransaction, PaymentMethod,
};

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: payload on success
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    #[schema(example = 0)]
    pub code: i32,
    #[schema(example = "ok")]
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Standard API error codes
pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const AMOUNT_OUT_OF_RANGE: i32 = 1002;
    pub const METHOD_NOT_ALLOWED: i32 = 1003;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const AUTH_FAILED: i32 = 2002;
    pub const FORBIDDEN: i32 = 2003;

    // Resource errors (4xxx)
    pub const DEPOSIT_NOT_FOUND: i32 = 4001;
    pub const ACTIVE_DEPOSIT_EXISTS: i32 = 4091;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

/// Error half of every handler result
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn unauthorized(code: i32, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            error_codes::SERVICE_UNAVAILABLE,
            msg,
        )
    }
}

impl From<DepositError> for ApiError {
    fn from(e: DepositError) -> Self {
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = match &e {
            DepositError::Validation(_) => error_codes::INVALID_PARAMETER,
            DepositError::AmountTooSmall | DepositError::AmountTooLarge => {
                error_codes::AMOUNT_OUT_OF_RANGE
            }
            DepositError::MethodNotAllowed => error_codes::METHOD_NOT_ALLOWED,
            DepositError::NotFound(_) => error_codes::DEPOSIT_NOT_FOUND,
            DepositError::ActiveDepositExists => error_codes::ACTIVE_DEPOSIT_EXISTS,
            DepositError::LockTimeout(_) => error_codes::SERVICE_UNAVAILABLE,
            DepositError::Database(_) | DepositError::System(_) => error_codes::INTERNAL_ERROR,
        };
        let msg = match &e {
            DepositError::Database(_) | DepositError::System(_) => {
                tracing::error!(error = %e, "Request failed");
                "internal error".to_string()
            }
            DepositError::NotFound(_) => "deposit not found".to_string(),
            other => other.to_string(),
        };
        Self { status, code, msg }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiResponse::<()>::error(self.code, self.msg)),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

// ============================================================================
// WholeAmount: amount validated at the serde layer
// ============================================================================

/// Deposit amount in whole currency units.
///
/// Accepts a JSON number or a decimal string. Rejects empty strings,
/// `.5`/`5.` forms, negatives and fractional values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WholeAmount(Decimal);

impl WholeAmount {
    pub fn inner(self) -> Decimal {
        self.0
    }
}

impl<'de> Deserialize<'de> for WholeAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum DecimalOrString {
            String(String),
            Number(Decimal),
        }

        let d = match DecimalOrString::deserialize(deserializer)? {
            DecimalOrString::String(s) => {
                if s.is_empty() {
                    return Err(D::Error::custom("Amount cannot be empty"));
                }
                if s.starts_with('.') || s.ends_with('.') {
                    return Err(D::Error::custom("Invalid amount format"));
                }
                Decimal::from_str(&s)
                    .map_err(|e| D::Error::custom(format!("Invalid decimal: {}", e)))?
            }
            DecimalOrString::Number(d) => d,
        };

        if d.is_sign_negative() {
            return Err(D::Error::custom("Amount cannot be negative"));
        }
        if !d.fract().is_zero() {
            return Err(D::Error::custom("Amount must be in whole currency units"));
        }
        Ok(WholeAmount(d.normalize()))
    }
}

// ============================================================================
// Deposit DTOs
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDepositRequest {
    #[schema(example = 1001)]
    pub property_id: i64,
    #[schema(example = 2002)]
    pub tenant_id: i64,
    #[schema(example = 3003)]
    pub landlord_id: i64,
    #[schema(value_type = String, example = "2000000")]
    pub amount: WholeAmount,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateDepositResponse {
    #[schema(example = "RD261019K7Q2ZP")]
    pub contract_code: String,
    /// Bearer token for status polling; shown once
    pub token: String,
    pub status: DepositStatus,
    #[schema(value_type = String, example = "2000000")]
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub expires_at: DateTime<Utc>,
    pub channel_payload: ChannelPayload,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotifyPaidResponse {
    pub status: DepositStatus,
}

// ============================================================================
// Admin DTOs
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminActionResponse {
    pub contract_code: String,
    pub status: DepositStatus,
    /// False when the action was absorbed as a no-op
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored_reason: Option<String>,
}

impl AdminActionResponse {
    pub fn from_outcome(contract_code: String, outcome: ApplyOutcome) -> Self {
        Self {
            contract_code,
            status: outcome.status,
            applied: outcome.applied,
            ignored_reason: outcome.ignored_reason.as_ref().map(IgnoreReason::to_string),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ArchiveResponse {
    pub contract_code: String,
    pub archived: bool,
}

/// Review queue row
#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewItem {
    pub contract_code: String,
    pub property_id: i64,
    pub tenant_id: i64,
    pub landlord_id: i64,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub status: DepositStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub needs_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_reason: Option<String>,
}

impl From<DepositTransaction> for ReviewItem {
    fn from(tx: DepositTransaction) -> Self {
        Self {
            contract_code: tx.contract_code.to_string(),
            property_id: tx.property_id,
            tenant_id: tx.tenant_id,
            landlord_id: tx.landlord_id,
            amount: tx.amount,
            payment_method: tx.payment_method,
            status: tx.status,
            created_at: tx.created_at,
            expires_at: tx.expires_at,
            needs_review: tx.needs_review,
            review_reason: tx.review_reason,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveReviewRequest {
    /// Appended to the flag reason in history
    pub note: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResolveReviewResponse {
    pub contract_code: String,
    /// False when the deposit was not flagged
    pub resolved: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub contract_code: String,
    pub status: DepositStatus,
    pub entries: Vec<StatusHistoryEntry>,
    pub ignored: Vec<IgnoredEvent>,
}
