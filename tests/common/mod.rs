//! Shared fixtures for integration tests: in-memory store, manual clock,
//! test provider credentials.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use rental_deposit::api::AppState;
use rental_deposit::api::auth::AdminAuth;
use rental_deposit::clock::ManualClock;
use rental_deposit::config::{BankConfig, DepositConfig, GatewayAConfig, GatewayBConfig};
use rental_deposit::deposit::types::NewDeposit;
use rental_deposit::deposit::{
    ChannelBuilder, LifecycleEngine, MemoryDepositStore, OpenedDeposit, PaymentMethod,
};
use rental_deposit::verifier::{
    GatewayAEvent, GatewayAVerifier, GatewayBEvent, GatewayBVerifier, VerifierSet,
};

pub const ADMIN_SECRET: &str = "it-admin-secret";
pub const DEPOSIT_AMOUNT: i64 = 2_000_000;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()
}

pub fn gateway_a_config() -> GatewayAConfig {
    GatewayAConfig {
        tmn_code: "RENT0001".into(),
        hash_secret: "it-gateway-a-secret".into(),
        pay_url: "https://pay.gateway-a.test/paymentv2/vpcpay.html".into(),
        return_url: "https://rent.test/deposits/return".into(),
    }
}

pub fn gateway_b_config() -> GatewayBConfig {
    GatewayBConfig {
        partner_code: "RENTB".into(),
        access_key: "it-gateway-b-access".into(),
        secret_key: "it-gateway-b-secret".into(),
        pay_url: "https://pay.gateway-b.test/v2/gateway/pay".into(),
        ipn_url: "https://rent.test/api/v1/callbacks/gateway-b".into(),
    }
}

pub fn deposit_config() -> DepositConfig {
    DepositConfig {
        min_amount: Decimal::from(500_000),
        max_amount: Decimal::from(50_000_000),
        ttl_minutes: 30,
        waiting_grace_minutes: 60,
        sweep_interval_secs: 1,
        sweep_batch_size: 50,
        lock_timeout_ms: 2_000,
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub engine: Arc<LifecycleEngine>,
    pub verifiers: Arc<VerifierSet>,
    pub state: Arc<AppState>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        let verifiers = Arc::new(VerifierSet::new(
            GatewayAVerifier::new(gateway_a_config()),
            GatewayBVerifier::new(gateway_b_config()),
        ));
        let channels = ChannelBuilder::new(
            verifiers.clone(),
            BankConfig {
                bank_code: "970436".into(),
                account_number: "0011002233".into(),
                account_name: "RENTAL PLATFORM JSC".into(),
            },
            gateway_a_config().return_url,
        );
        let engine = Arc::new(LifecycleEngine::new(
            Arc::new(MemoryDepositStore::new()),
            clock.clone(),
            channels,
            deposit_config(),
        ));
        let state = Arc::new(AppState::new(
            engine.clone(),
            verifiers.clone(),
            AdminAuth::new(ADMIN_SECRET),
            None,
        ));
        Self {
            clock,
            engine,
            verifiers,
            state,
        }
    }

    pub async fn open(&self, property_id: i64, method: PaymentMethod) -> OpenedDeposit {
        self.engine
            .open(NewDeposit {
                property_id,
                tenant_id: 501,
                landlord_id: 901,
                amount: Decimal::from(DEPOSIT_AMOUNT),
                payment_method: method,
            })
            .await
            .expect("open deposit")
    }

    /// Signed GatewayA IPN query, as the provider would send it.
    pub fn gateway_a_ipn(
        &self,
        code: &str,
        amount: i64,
        response_code: &str,
        transaction_no: &str,
    ) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("gwa_TmnCode".to_string(), "RENT0001".to_string());
        params.insert("gwa_TxnRef".to_string(), code.to_string());
        params.insert("gwa_Amount".to_string(), (amount * 100).to_string());
        params.insert("gwa_ResponseCode".to_string(), response_code.to_string());
        params.insert("gwa_TransactionStatus".to_string(), response_code.to_string());
        params.insert("gwa_TransactionNo".to_string(), transaction_no.to_string());
        params.insert("gwa_BankCode".to_string(), "NCB".to_string());
        params.insert("gwa_OrderInfo".to_string(), format!("Rental deposit {}", code));
        let hash = self
            .verifiers
            .gateway_a
            .sign(&params)
            .expect("sign gateway a");
        params.insert("gwa_SecureHash".to_string(), hash);
        params.insert("gwa_SecureHashType".to_string(), "HmacSHA512".to_string());
        params
    }

    pub fn gateway_a_event(&self, code: &str, amount: i64, txn: &str) -> GatewayAEvent {
        GatewayAEvent::new(self.gateway_a_ipn(code, amount, "00", txn))
    }

    /// Signed GatewayB IPN body.
    pub fn gateway_b_ipn(&self, code: &str, amount: i64, result_code: i32, trans_id: i64) -> GatewayBEvent {
        let mut event = GatewayBEvent {
            partner_code: "RENTB".into(),
            order_id: code.to_string(),
            request_id: format!("{}-1", code),
            amount,
            order_info: format!("Rental deposit {}", code),
            order_type: "captureWallet".into(),
            trans_id,
            result_code,
            message: if result_code == 0 {
                "Successful.".into()
            } else {
                "Transaction denied by user.".into()
            },
            pay_type: "qr".into(),
            response_time: 1_792_396_800_000,
            extra_data: String::new(),
            signature: String::new(),
        };
        event.signature = self
            .verifiers
            .gateway_b
            .sign_ipn(&event)
            .expect("sign gateway b");
        event
    }
}
