//! Deposit Error Types

use thiserror::Error;

/// Deposit lifecycle errors
///
/// Illegal transitions are deliberately absent: they are absorbed and
/// reported through `ApplyOutcome`, never raised.
#[derive(Error, Debug, Clone)]
pub enum DepositError {
    // === Validation Errors ===
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Amount is below the configured minimum")]
    AmountTooSmall,

    #[error("Amount exceeds the configured maximum")]
    AmountTooLarge,

    #[error("An active deposit already exists for this property and tenant")]
    ActiveDepositExists,

    #[error("Operation not available for this payment method")]
    MethodNotAllowed,

    // === Lookup Errors ===
    /// Also returned for a wrong deposit token
    #[error("Deposit not found: {0}")]
    NotFound(String),

    // === System Errors ===
    #[error("Timed out waiting for deposit lock: {0}")]
    LockTimeout(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal system error: {0}")]
    System(String),
}

impl DepositError {
    pub fn code(&self) -> &'static str {
        match self {
            DepositError::Validation(_) => "VALIDATION_ERROR",
            DepositError::AmountTooSmall => "AMOUNT_TOO_SMALL",
            DepositError::AmountTooLarge => "AMOUNT_TOO_LARGE",
            DepositError::ActiveDepositExists => "ACTIVE_DEPOSIT_EXISTS",
            DepositError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            DepositError::NotFound(_) => "DEPOSIT_NOT_FOUND",
            DepositError::LockTimeout(_) => "LOCK_TIMEOUT",
            DepositError::Database(_) => "DATABASE_ERROR",
            DepositError::System(_) => "SYSTEM_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            DepositError::Validation(_)
            | DepositError::AmountTooSmall
            | DepositError::AmountTooLarge
            | DepositError::MethodNotAllowed => 400,
            DepositError::NotFound(_) => 404,
            DepositError::ActiveDepositExists => 409,
            DepositError::Database(_) | DepositError::System(_) => 500,
            DepositError::LockTimeout(_) => 503,
        }
    }

    /// Client-side input problem; no retry will help.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DepositError::Validation(_)
                | DepositError::AmountTooSmall
                | DepositError::AmountTooLarge
                | DepositError::MethodNotAllowed
        )
    }
}

impl From<sqlx::Error> for DepositError {
    fn from(e: sqlx::Error) -> Self {
        DepositError::Database(e.to_string())
    }
}
