//! Channel payloads
//!
//! Display data that sends the payer to the right place: a signed redirect
//! URL, a signed QR payload or bank-transfer instructions. Rebuilt from the
//! stored record on every request and never persisted.

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::error::DepositError;
use super::state::PaymentMethod;
use super::types::DepositTransaction;
use crate::config::BankConfig;
use crate::verifier::VerifierSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelPayload {
    GatewayA {
        payment_url: String,
    },
    GatewayB {
        qr_payload: String,
        request_id: String,
    },
    BankTransfer {
        bank_code: String,
        account_number: String,
        account_name: String,
        #[schema(value_type = String)]
        amount: Decimal,
        /// Must appear verbatim in the transfer description
        transfer_memo: String,
        qr_content: String,
    },
}

pub struct ChannelBuilder {
    verifiers: Arc<VerifierSet>,
    bank: BankConfig,
    /// Where the tenant lands after leaving a gateway checkout
    return_url: String,
}

impl ChannelBuilder {
    pub fn new(verifiers: Arc<VerifierSet>, bank: BankConfig, return_url: String) -> Self {
        Self {
            verifiers,
            bank,
            return_url,
        }
    }

    pub fn build(&self, tx: &DepositTransaction) -> Result<ChannelPayload, DepositError> {
        match tx.payment_method {
            PaymentMethod::GatewayA => {
                let payment_url = self.verifiers.gateway_a.payment_url(
                    &tx.contract_code,
                    tx.amount,
                    tx.created_at,
                    tx.expires_at,
                )?;
                Ok(ChannelPayload::GatewayA { payment_url })
            }
            PaymentMethod::GatewayB => {
                let req = self.verifiers.gateway_b.payment_request(
                    &tx.contract_code,
                    tx.amount,
                    &self.return_url,
                )?;
                Ok(ChannelPayload::GatewayB {
                    qr_payload: req.qr_payload,
                    request_id: req.request_id,
                })
            }
            PaymentMethod::BankTransfer => {
                let memo = tx.contract_code.to_string();
                let qr_content = format!(
                    "BANK|{}|{}|{}|{}",
                    self.bank.bank_code,
                    self.bank.account_number,
                    tx.amount.trunc(),
                    memo
                );
                Ok(ChannelPayload::BankTransfer {
                    bank_code: self.bank.bank_code.clone(),
                    account_number: self.bank.account_number.clone(),
                    account_name: self.bank.account_name.clone(),
                    amount: tx.amount,
                    transfer_memo: memo,
                    qr_content,
                })
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::deposit::types::{ContractCode, NewDeposit};
    use crate::verifier::{GatewayAVerifier, GatewayBVerifier};
    use chrono::{TimeZone, Utc};

    pub fn test_builder() -> ChannelBuilder {
        let verifiers = VerifierSet::new(
            GatewayAVerifier::new(crate::verifier::gateway_a::tests::test_config()),
            GatewayBVerifier::new(crate::verifier::gateway_b::tests::test_config()),
        );
        ChannelBuilder::new(
            Arc::new(verifiers),
            BankConfig {
                bank_code: "970436".into(),
                account_number: "0011002233".into(),
                account_name: "RENTAL PLATFORM JSC".into(),
            },
            "https://rent.test/deposits/return".into(),
        )
    }

    fn record(method: PaymentMethod) -> DepositTransaction {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 1, 0, 0).unwrap();
        let req = NewDeposit {
            property_id: 1,
            tenant_id: 2,
            landlord_id: 3,
            amount: Decimal::from(2_000_000),
            payment_method: method,
        };
        DepositTransaction::new(
            ContractCode::parse("RD261019K7Q2ZP").unwrap(),
            &req,
            String::new(),
            now,
            chrono::Duration::minutes(30),
        )
    }

    #[test]
    fn test_gateway_a_payload_is_signed_url() {
        let payload = test_builder().build(&record(PaymentMethod::GatewayA)).unwrap();
        match payload {
            ChannelPayload::GatewayA { payment_url } => {
                assert!(payment_url.contains("gwa_TxnRef=RD261019K7Q2ZP"));
                assert!(payment_url.contains("gwa_Amount=200000000"));
                assert!(payment_url.contains("gwa_SecureHash="));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_gateway_b_payload_is_qr() {
        let payload = test_builder().build(&record(PaymentMethod::GatewayB)).unwrap();
        assert!(matches!(
            payload,
            ChannelPayload::GatewayB { ref request_id, .. } if request_id == "RD261019K7Q2ZP"
        ));
    }

    #[test]
    fn test_bank_transfer_memo_is_contract_code() {
        let payload = test_builder()
            .build(&record(PaymentMethod::BankTransfer))
            .unwrap();
        match payload {
            ChannelPayload::BankTransfer {
                transfer_memo,
                qr_content,
                ..
            } => {
                assert_eq!(transfer_memo, "RD261019K7Q2ZP");
                assert_eq!(qr_content, "BANK|970436|0011002233|2000000|RD261019K7Q2ZP");
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_payload_serializes_with_type_tag() {
        let payload = test_builder()
            .build(&record(PaymentMethod::BankTransfer))
            .unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "BANK_TRANSFER");
    }
}
