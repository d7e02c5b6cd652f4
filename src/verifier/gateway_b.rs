//! GatewayB: wallet / QR checkout with a JSON IPN.
//!
//! The provider signs a fixed, alphabetical field list rendered as
//! `key=value&...`. `accessKey` is part of the signed string but is never
//! sent in the IPN body; it comes from configuration.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::signature::{digest_matches, hmac_sha256_hex};
use super::{ProviderCallback, VerifiedCallback, Verifier, VerifyError};
use crate::config::GatewayBConfig;
use crate::deposit::state::Provider;
use crate::deposit::types::ContractCode;

const SUCCESS_CODE: i32 = 0;
const REQUEST_TYPE: &str = "captureWallet";

/// IPN body as posted by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayBEvent {
    pub partner_code: String,
    pub order_id: String,
    pub request_id: String,
    pub amount: i64,
    #[serde(default)]
    pub order_info: String,
    #[serde(default)]
    pub order_type: String,
    pub trans_id: i64,
    pub result_code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub pay_type: String,
    pub response_time: i64,
    #[serde(default)]
    pub extra_data: String,
    pub signature: String,
}

/// Signed create-payment request; doubles as the QR/deep-link payload
/// handed to the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayBPaymentRequest {
    pub partner_code: String,
    pub request_id: String,
    pub order_id: String,
    pub amount: i64,
    pub order_info: String,
    pub redirect_url: String,
    pub ipn_url: String,
    pub request_type: String,
    pub extra_data: String,
    pub signature: String,
    /// Deep link encoded into the QR image
    pub qr_payload: String,
}

pub struct GatewayBVerifier {
    config: GatewayBConfig,
}

impl GatewayBVerifier {
    pub fn new(config: GatewayBConfig) -> Self {
        Self { config }
    }

    /// Canonical IPN string, field order fixed by the provider.
    pub fn canonical_ipn(&self, e: &GatewayBEvent) -> String {
        format!(
            "accessKey={}&amount={}&extraData={}&message={}&orderId={}&orderInfo={}\
             &orderType={}&partnerCode={}&payType={}&requestId={}&responseTime={}\
             &resultCode={}&transId={}",
            self.config.access_key,
            e.amount,
            e.extra_data,
            e.message,
            e.order_id,
            e.order_info,
            e.order_type,
            e.partner_code,
            e.pay_type,
            e.request_id,
            e.response_time,
            e.result_code,
            e.trans_id
        )
    }

    pub fn sign_ipn(&self, e: &GatewayBEvent) -> Result<String, VerifyError> {
        hmac_sha256_hex(&self.config.secret_key, &self.canonical_ipn(e))
    }

    /// Build the signed payment request for a new deposit. `request_id` must
    /// be unique per request; the contract code is a fine choice.
    pub fn payment_request(
        &self,
        code: &ContractCode,
        amount: Decimal,
        redirect_url: &str,
    ) -> Result<GatewayBPaymentRequest, VerifyError> {
        let amount = amount
            .trunc()
            .to_i64()
            .ok_or(VerifyError::MalformedPayload("amount"))?;
        let order_info = format!("Rental deposit {}", code);
        let request_id = code.to_string();
        let extra_data = String::new();

        let raw = format!(
            "accessKey={}&amount={}&extraData={}&ipnUrl={}&orderId={}&orderInfo={}\
             &partnerCode={}&redirectUrl={}&requestId={}&requestType={}",
            self.config.access_key,
            amount,
            extra_data,
            self.config.ipn_url,
            code,
            order_info,
            self.config.partner_code,
            redirect_url,
            request_id,
            REQUEST_TYPE
        );
        let signature = hmac_sha256_hex(&self.config.secret_key, &raw)?;
        let qr_payload = format!(
            "{}?partnerCode={}&orderId={}&requestId={}&amount={}&signature={}",
            self.config.pay_url, self.config.partner_code, code, request_id, amount, signature
        );

        Ok(GatewayBPaymentRequest {
            partner_code: self.config.partner_code.clone(),
            request_id,
            order_id: code.to_string(),
            amount,
            order_info,
            redirect_url: redirect_url.to_string(),
            ipn_url: self.config.ipn_url.clone(),
            request_type: REQUEST_TYPE.to_string(),
            extra_data,
            signature,
            qr_payload,
        })
    }

    fn verify_event(&self, event: &GatewayBEvent) -> Result<VerifiedCallback, VerifyError> {
        if event.signature.is_empty() {
            return Err(VerifyError::MalformedPayload("signature"));
        }
        let expected = self.sign_ipn(event)?;
        if !digest_matches(&expected, &event.signature) {
            return Err(VerifyError::InvalidSignature);
        }

        if event.partner_code != self.config.partner_code {
            return Err(VerifyError::MerchantMismatch);
        }

        let contract_code = ContractCode::parse(&event.order_id)
            .ok_or(VerifyError::MalformedPayload("orderId"))?;
        if event.amount <= 0 {
            return Err(VerifyError::MalformedPayload("amount"));
        }

        // 9000 means authorized but not captured; only 0 is a completed payment
        let succeeded = event.result_code == SUCCESS_CODE;

        Ok(VerifiedCallback {
            provider: Provider::GatewayB,
            contract_code,
            reported_amount: Decimal::from(event.amount),
            gateway_reference: event.trans_id.to_string(),
            provider_result_code: event.result_code.to_string(),
            succeeded,
            raw_payload: serde_json::to_string(event).unwrap_or_default(),
        })
    }
}

impl Verifier for GatewayBVerifier {
    fn provider(&self) -> Provider {
        Provider::GatewayB
    }

    fn verify(&self, callback: &ProviderCallback) -> Result<VerifiedCallback, VerifyError> {
        match callback {
            ProviderCallback::GatewayB(event) => self.verify_event(event),
            _ => Err(VerifyError::WrongProvider),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn test_config() -> GatewayBConfig {
        GatewayBConfig {
            partner_code: "RENTB".into(),
            access_key: "gwb-access".into(),
            secret_key: "gwb-test-secret".into(),
            pay_url: "https://pay.gateway-b.test/v2/gateway/pay".into(),
            ipn_url: "https://rent.test/api/v1/callbacks/gateway-b".into(),
        }
    }

    pub fn sample_event() -> GatewayBEvent {
        GatewayBEvent {
            partner_code: "RENTB".into(),
            order_id: "RD261019K7Q2ZP".into(),
            request_id: "RD261019K7Q2ZP".into(),
            amount: 2_000_000,
            order_info: "Rental deposit RD261019K7Q2ZP".into(),
            order_type: "momo_wallet".into(),
            trans_id: 4_088_878_653,
            result_code: 0,
            message: "Successful.".into(),
            pay_type: "qr".into(),
            response_time: 1_760_860_800_000,
            extra_data: String::new(),
            signature: String::new(),
        }
    }

    fn signed(v: &GatewayBVerifier, mut e: GatewayBEvent) -> GatewayBEvent {
        e.signature = v.sign_ipn(&e).unwrap();
        e
    }

    #[test]
    fn test_canonical_ipn_field_order() {
        let v = GatewayBVerifier::new(test_config());
        let raw = v.canonical_ipn(&sample_event());
        assert_eq!(
            raw,
            "accessKey=gwb-access&amount=2000000&extraData=&message=Successful.\
             &orderId=RD261019K7Q2ZP&orderInfo=Rental deposit RD261019K7Q2ZP\
             &orderType=momo_wallet&partnerCode=RENTB&payType=qr&requestId=RD261019K7Q2ZP\
             &responseTime=1760860800000&resultCode=0&transId=4088878653"
        );
    }

    #[test]
    fn test_valid_success_callback() {
        let v = GatewayBVerifier::new(test_config());
        let cb = v
            .verify(&ProviderCallback::GatewayB(signed(&v, sample_event())))
            .unwrap();
        assert!(cb.succeeded);
        assert_eq!(cb.reported_amount, Decimal::from(2_000_000));
        assert_eq!(cb.gateway_reference, "4088878653");
        assert_eq!(cb.provider, Provider::GatewayB);
    }

    #[test]
    fn test_tampered_amount_rejected() {
        let v = GatewayBVerifier::new(test_config());
        let mut e = signed(&v, sample_event());
        e.amount = 1;
        assert_eq!(
            v.verify(&ProviderCallback::GatewayB(e)),
            Err(VerifyError::InvalidSignature)
        );
    }

    #[test]
    fn test_authorized_only_is_not_success() {
        let v = GatewayBVerifier::new(test_config());
        let mut e = sample_event();
        e.result_code = 9000;
        let cb = v
            .verify(&ProviderCallback::GatewayB(signed(&v, e)))
            .unwrap();
        assert!(!cb.succeeded);
        assert_eq!(cb.provider_result_code, "9000");
    }

    #[test]
    fn test_missing_signature_is_malformed() {
        let v = GatewayBVerifier::new(test_config());
        assert_eq!(
            v.verify(&ProviderCallback::GatewayB(sample_event())),
            Err(VerifyError::MalformedPayload("signature"))
        );
    }

    #[test]
    fn test_bad_order_id_rejected_after_signature() {
        let v = GatewayBVerifier::new(test_config());
        let mut e = sample_event();
        e.order_id = "ORDER-1".into();
        assert_eq!(
            v.verify(&ProviderCallback::GatewayB(signed(&v, e))),
            Err(VerifyError::MalformedPayload("orderId"))
        );
    }

    #[test]
    fn test_ipn_body_deserializes_camel_case() {
        let body = r#"{
            "partnerCode": "RENTB", "orderId": "RD261019K7Q2ZP",
            "requestId": "RD261019K7Q2ZP", "amount": 2000000,
            "orderInfo": "x", "orderType": "momo_wallet", "transId": 1,
            "resultCode": 0, "message": "ok", "payType": "qr",
            "responseTime": 1, "extraData": "", "signature": "ab"
        }"#;
        let e: GatewayBEvent = serde_json::from_str(body).unwrap();
        assert_eq!(e.trans_id, 1);
        assert_eq!(e.pay_type, "qr");
    }

    #[test]
    fn test_payment_request_signed() {
        let v = GatewayBVerifier::new(test_config());
        let code = ContractCode::parse("RD261019K7Q2ZP").unwrap();
        let req = v
            .payment_request(&code, Decimal::from(2_000_000), "https://rent.test/r")
            .unwrap();
        assert_eq!(req.amount, 2_000_000);
        assert_eq!(req.signature.len(), 64);
        assert!(req.qr_payload.contains(&req.signature));
        assert!(req.qr_payload.contains("orderId=RD261019K7Q2ZP"));
    }
}
