//! Gateway Verifier
//!
//! Authenticates inbound provider callbacks and normalizes them into a
//! [`VerifiedCallback`]. Verifiers are stateless: they never read or write
//! deposit records. The reported amount is never trusted on its own: the
//! engine runs [`check_amount`] against the stored deposit before a
//! confirmation can apply.
//!
//! Each provider signs a different canonical string:
//!
//! - GatewayA: all `gwa_*` query parameters except the hash fields, empty
//!   values dropped, sorted by key, form-urlencoded, HMAC-SHA512.
//! - GatewayB: a fixed alphabetical field list rendered as `k=v&...`
//!   including the configured access key, HMAC-SHA256.

pub mod gateway_a;
pub mod gateway_b;
pub mod signature;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::deposit::state::Provider;
use crate::deposit::types::{ContractCode, DepositEvent};

pub use gateway_a::{GatewayAEvent, GatewayAVerifier};
pub use gateway_b::{GatewayBEvent, GatewayBVerifier};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("Callback signature does not match")]
    InvalidSignature,

    #[error("Malformed callback field: {0}")]
    MalformedPayload(&'static str),

    #[error("Callback addressed to a different merchant")]
    MerchantMismatch,

    #[error("Reported amount {reported} does not match stored amount {expected}")]
    AmountMismatch { expected: Decimal, reported: Decimal },

    #[error("Callback routed to the wrong provider verifier")]
    WrongProvider,

    #[error("Signing key rejected")]
    InvalidKey,
}

/// Inbound callback, tagged by provider
#[derive(Debug, Clone)]
pub enum ProviderCallback {
    GatewayA(GatewayAEvent),
    GatewayB(GatewayBEvent),
}

impl ProviderCallback {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderCallback::GatewayA(_) => Provider::GatewayA,
            ProviderCallback::GatewayB(_) => Provider::GatewayB,
        }
    }
}

/// Authenticated, provider-neutral callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCallback {
    pub provider: Provider,
    pub contract_code: ContractCode,
    /// As reported by the provider; not authoritative.
    pub reported_amount: Decimal,
    pub gateway_reference: String,
    pub provider_result_code: String,
    pub succeeded: bool,
    /// Canonical payload kept for audit logs.
    pub raw_payload: String,
}

/// Reported amount must equal the stored deposit amount exactly.
pub fn check_amount(reported: Decimal, stored: Decimal) -> Result<(), VerifyError> {
    if reported != stored {
        return Err(VerifyError::AmountMismatch {
            expected: stored,
            reported,
        });
    }
    Ok(())
}

impl VerifiedCallback {
    /// Engine event for this callback. A non-success result code never maps
    /// to a confirmation.
    pub fn to_event(&self) -> DepositEvent {
        if self.succeeded {
            DepositEvent::GatewayConfirmed {
                gateway_reference: self.gateway_reference.clone(),
                amount: self.reported_amount,
            }
        } else {
            DepositEvent::GatewayFailed {
                result_code: self.provider_result_code.clone(),
            }
        }
    }
}

pub trait Verifier: Send + Sync {
    fn provider(&self) -> Provider;

    /// Recompute the provider signature and parse the callback.
    fn verify(&self, callback: &ProviderCallback) -> Result<VerifiedCallback, VerifyError>;
}

/// Both provider verifiers, dispatched by callback tag.
pub struct VerifierSet {
    pub gateway_a: GatewayAVerifier,
    pub gateway_b: GatewayBVerifier,
}

impl VerifierSet {
    pub fn new(gateway_a: GatewayAVerifier, gateway_b: GatewayBVerifier) -> Self {
        Self {
            gateway_a,
            gateway_b,
        }
    }

    pub fn for_provider(&self, provider: Provider) -> &dyn Verifier {
        match provider {
            Provider::GatewayA => &self.gateway_a,
            Provider::GatewayB => &self.gateway_b,
        }
    }

    pub fn verify(&self, callback: &ProviderCallback) -> Result<VerifiedCallback, VerifyError> {
        self.for_provider(callback.provider()).verify(callback)
    }
}
