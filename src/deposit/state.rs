//! Deposit FSM State Definitions
//!
//! State and method IDs are stored in PostgreSQL as SMALLINT.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Deposit transaction status
///
/// Terminal states: PAID (20), EXPIRED (-10), CANCELLED (-20), FAILED (-30)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum DepositStatus {
    /// Created, waiting for the payer
    Pending = 0,

    /// Tenant reported a bank transfer; waiting for an administrator
    WaitingConfirmation = 10,

    /// Terminal: payment established
    Paid = 20,

    /// Terminal: TTL (plus grace for bank transfers) elapsed unpaid
    Expired = -10,

    /// Terminal: cancelled by an administrator
    Cancelled = -20,

    /// Terminal: reserved for records closed as failed outside the engine
    Failed = -30,
}

impl DepositStatus {
    /// No event can move a terminal status.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DepositStatus::Paid
                | DepositStatus::Expired
                | DepositStatus::Cancelled
                | DepositStatus::Failed
        )
    }

    /// Counts toward the one-active-deposit-per-(property, tenant) rule.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            DepositStatus::Pending | DepositStatus::WaitingConfirmation
        )
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(DepositStatus::Pending),
            10 => Some(DepositStatus::WaitingConfirmation),
            20 => Some(DepositStatus::Paid),
            -10 => Some(DepositStatus::Expired),
            -20 => Some(DepositStatus::Cancelled),
            -30 => Some(DepositStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::Pending => "PENDING",
            DepositStatus::WaitingConfirmation => "WAITING_CONFIRMATION",
            DepositStatus::Paid => "PAID",
            DepositStatus::Expired => "EXPIRED",
            DepositStatus::Cancelled => "CANCELLED",
            DepositStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for DepositStatus {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        DepositStatus::from_id(value).ok_or(())
    }
}

/// How the tenant pays; fixes which verification path applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum PaymentMethod {
    GatewayA = 1,
    GatewayB = 2,
    BankTransfer = 3,
}

impl PaymentMethod {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(PaymentMethod::GatewayA),
            2 => Some(PaymentMethod::GatewayB),
            3 => Some(PaymentMethod::BankTransfer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::GatewayA => "GATEWAY_A",
            PaymentMethod::GatewayB => "GATEWAY_B",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
        }
    }

    /// Provider that delivers callbacks for this method, if any.
    pub fn provider(&self) -> Option<Provider> {
        match self {
            PaymentMethod::GatewayA => Some(Provider::GatewayA),
            PaymentMethod::GatewayB => Some(Provider::GatewayB),
            PaymentMethod::BankTransfer => None,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GATEWAY_A" | "GATEWAYA" => Ok(PaymentMethod::GatewayA),
            "GATEWAY_B" | "GATEWAYB" => Ok(PaymentMethod::GatewayB),
            "BANK_TRANSFER" | "BANKTRANSFER" | "BANK" => Ok(PaymentMethod::BankTransfer),
            _ => Err(format!("Invalid payment method: {}", s)),
        }
    }
}

/// Third-party payment provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provider {
    GatewayA,
    GatewayB,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GatewayA => "GATEWAY_A",
            Provider::GatewayB => "GATEWAY_B",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
