//! Reconciliation Poller
//!
//! Read-only view used by the payer's client while it waits for a result.
//! Reads straight from the store the engine writes; nothing is cached.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::channel::ChannelPayload;
use super::engine::LifecycleEngine;
use super::error::DepositError;
use super::state::{DepositStatus, PaymentMethod};
use super::token;
use super::types::{ContractCode, DepositTransaction};

/// What a token holder may see about their deposit
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusView {
    #[schema(value_type = String)]
    pub contract_code: ContractCode,
    pub status: DepositStatus,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub expires_at: DateTime<Utc>,
    /// Absent once the status is terminal; 0 after the deadline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    /// Present while the deposit can still be paid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_payload: Option<ChannelPayload>,
}

pub struct DepositPoller {
    engine: Arc<LifecycleEngine>,
}

impl DepositPoller {
    pub fn new(engine: Arc<LifecycleEngine>) -> Self {
        Self { engine }
    }

    /// Load a deposit on behalf of a token holder.
    ///
    /// Unknown code and wrong token are indistinguishable to the caller.
    pub async fn authorize(
        &self,
        code: &ContractCode,
        presented_token: &str,
    ) -> Result<DepositTransaction, DepositError> {
        let not_found = || DepositError::NotFound(code.to_string());
        let tx = self.engine.store().get(code).await?.ok_or_else(not_found)?;
        if presented_token.is_empty() || !token::verify(presented_token, &tx.token_hash) {
            return Err(not_found());
        }
        Ok(tx)
    }

    pub async fn status(
        &self,
        code: &ContractCode,
        presented_token: &str,
    ) -> Result<StatusView, DepositError> {
        let tx = self.authorize(code, presented_token).await?;
        let now = self.engine.clock().now();

        let seconds_remaining = (!tx.status.is_terminal())
            .then(|| (tx.expires_at - now).num_seconds().max(0));
        let channel_payload = match tx.status {
            // Bank details stay visible while an administrator checks the transfer
            DepositStatus::Pending | DepositStatus::WaitingConfirmation => {
                Some(self.engine.channels().build(&tx)?)
            }
            _ => None,
        };

        Ok(StatusView {
            contract_code: tx.contract_code,
            status: tx.status,
            amount: tx.amount,
            payment_method: tx.payment_method,
            expires_at: tx.expires_at,
            seconds_remaining,
            paid_at: tx.paid_at,
            channel_payload,
        })
    }
}
