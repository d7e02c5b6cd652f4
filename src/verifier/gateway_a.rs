//! GatewayA: redirect checkout with a query-string IPN.
//!
//! Signed string: every `gwa_*` parameter except `gwa_SecureHash` and
//! `gwa_SecureHashType`, empty values dropped, sorted by key (byte order),
//! key and value form-urlencoded (space as `+`), joined as `k=v&k=v`.
//! Amounts are sent in hundredths of the currency unit.

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use url::form_urlencoded::byte_serialize;

use super::signature::{digest_matches, hmac_sha512_hex};
use super::{ProviderCallback, VerifiedCallback, Verifier, VerifyError};
use crate::config::GatewayAConfig;
use crate::deposit::state::Provider;
use crate::deposit::types::ContractCode;

const FIELD_PREFIX: &str = "gwa_";
const HASH_FIELD: &str = "gwa_SecureHash";
const HASH_TYPE_FIELD: &str = "gwa_SecureHashType";
const SUCCESS_CODE: &str = "00";
const AMOUNT_SCALE: i64 = 100;
/// Provider timestamps are local time (UTC+7)
const PROVIDER_UTC_OFFSET_SECS: i32 = 7 * 3600;

/// Raw IPN query parameters
#[derive(Debug, Clone, Default)]
pub struct GatewayAEvent {
    pub params: BTreeMap<String, String>,
}

impl GatewayAEvent {
    pub fn new(params: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            params: params.into_iter().collect(),
        }
    }

    fn field(&self, name: &'static str) -> Result<&str, VerifyError> {
        self.params
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .ok_or(VerifyError::MalformedPayload(name))
    }
}

pub struct GatewayAVerifier {
    config: GatewayAConfig,
}

impl GatewayAVerifier {
    pub fn new(config: GatewayAConfig) -> Self {
        Self { config }
    }

    /// Canonical string the provider signs.
    pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
        params
            .iter()
            .filter(|(k, v)| {
                k.starts_with(FIELD_PREFIX)
                    && k.as_str() != HASH_FIELD
                    && k.as_str() != HASH_TYPE_FIELD
                    && !v.is_empty()
            })
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    byte_serialize(k.as_bytes()).collect::<String>(),
                    byte_serialize(v.as_bytes()).collect::<String>()
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn sign(&self, params: &BTreeMap<String, String>) -> Result<String, VerifyError> {
        hmac_sha512_hex(&self.config.hash_secret, &Self::canonical_query(params))
    }

    /// Signed checkout URL the tenant is redirected to.
    pub fn payment_url(
        &self,
        code: &ContractCode,
        amount: Decimal,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, VerifyError> {
        let mut params = BTreeMap::new();
        params.insert("gwa_Version".to_string(), "2.1.0".to_string());
        params.insert("gwa_Command".to_string(), "pay".to_string());
        params.insert("gwa_TmnCode".to_string(), self.config.tmn_code.clone());
        params.insert("gwa_Amount".to_string(), to_provider_amount(amount));
        params.insert("gwa_CurrCode".to_string(), "VND".to_string());
        params.insert("gwa_TxnRef".to_string(), code.to_string());
        params.insert("gwa_OrderInfo".to_string(), format!("Rental deposit {}", code));
        params.insert("gwa_OrderType".to_string(), "other".to_string());
        params.insert("gwa_Locale".to_string(), "vn".to_string());
        params.insert("gwa_ReturnUrl".to_string(), self.config.return_url.clone());
        params.insert("gwa_CreateDate".to_string(), provider_time(created_at));
        params.insert("gwa_ExpireDate".to_string(), provider_time(expires_at));

        let query = Self::canonical_query(&params);
        let hash = self.sign(&params)?;
        Ok(format!(
            "{}?{}&{}={}",
            self.config.pay_url, query, HASH_FIELD, hash
        ))
    }

    fn verify_event(&self, event: &GatewayAEvent) -> Result<VerifiedCallback, VerifyError> {
        let supplied = event.field(HASH_FIELD)?;
        let expected = self.sign(&event.params)?;
        if !digest_matches(&expected, supplied) {
            return Err(VerifyError::InvalidSignature);
        }

        if event.field("gwa_TmnCode")? != self.config.tmn_code {
            return Err(VerifyError::MerchantMismatch);
        }

        let contract_code = ContractCode::parse(event.field("gwa_TxnRef")?)
            .ok_or(VerifyError::MalformedPayload("gwa_TxnRef"))?;
        let reported_amount = from_provider_amount(event.field("gwa_Amount")?)
            .ok_or(VerifyError::MalformedPayload("gwa_Amount"))?;

        let response_code = event.field("gwa_ResponseCode")?;
        // Older IPN versions omit the transaction status; absent means not settled
        let transaction_status = event
            .params
            .get("gwa_TransactionStatus")
            .map(String::as_str)
            .unwrap_or("");
        let succeeded = response_code == SUCCESS_CODE && transaction_status == SUCCESS_CODE;

        let gateway_reference = match event.field("gwa_TransactionNo") {
            Ok(r) => r.to_string(),
            Err(e) if succeeded => return Err(e),
            Err(_) => String::new(),
        };

        Ok(VerifiedCallback {
            provider: Provider::GatewayA,
            contract_code,
            reported_amount,
            gateway_reference,
            provider_result_code: response_code.to_string(),
            succeeded,
            raw_payload: Self::canonical_query(&event.params),
        })
    }
}

impl Verifier for GatewayAVerifier {
    fn provider(&self) -> Provider {
        Provider::GatewayA
    }

    fn verify(&self, callback: &ProviderCallback) -> Result<VerifiedCallback, VerifyError> {
        match callback {
            ProviderCallback::GatewayA(event) => self.verify_event(event),
            _ => Err(VerifyError::WrongProvider),
        }
    }
}

fn to_provider_amount(amount: Decimal) -> String {
    (amount * Decimal::from(AMOUNT_SCALE)).trunc().to_string()
}

fn from_provider_amount(raw: &str) -> Option<Decimal> {
    let minor: i64 = raw.parse().ok()?;
    if minor <= 0 {
        return None;
    }
    Some((Decimal::from(minor) / Decimal::from(AMOUNT_SCALE)).normalize())
}

fn provider_time(at: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(PROVIDER_UTC_OFFSET_SECS) {
        Some(offset) => at.with_timezone(&offset).format("%Y%m%d%H%M%S").to_string(),
        None => at.format("%Y%m%d%H%M%S").to_string(),
    }
}
