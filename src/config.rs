use anyhow::{Context, bail};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL. Without it the service runs on the
    /// in-memory store (development only).
    #[serde(default)]
    pub postgres_url: Option<String>,
    pub deposit: DepositConfig,
    pub providers: ProvidersConfig,
    pub bank: BankConfig,
    pub admin_jwt_secret: String,
}

/// HTTP listener
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

/// Deposit lifecycle limits and timers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DepositConfig {
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub ttl_minutes: i64,
    /// Extra time a WaitingConfirmation deposit is kept after `expires_at`
    /// before the sweeper may expire it.
    #[serde(default = "default_waiting_grace_minutes")]
    pub waiting_grace_minutes: i64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: usize,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_waiting_grace_minutes() -> i64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_sweep_batch_size() -> usize {
    100
}

fn default_lock_timeout_ms() -> u64 {
    2_000
}

impl DepositConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.ttl_minutes)
    }

    pub fn waiting_grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.waiting_grace_minutes)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProvidersConfig {
    pub gateway_a: GatewayAConfig,
    pub gateway_b: GatewayBConfig,
}

/// Query-string redirect gateway (HMAC-SHA512 IPN)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayAConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub pay_url: String,
    pub return_url: String,
}

/// Wallet gateway (HMAC-SHA256 JSON IPN)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayBConfig {
    pub partner_code: String,
    pub access_key: String,
    pub secret_key: String,
    pub pay_url: String,
    pub ipn_url: String,
}

/// Receiving account shown to tenants paying by bank transfer
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BankConfig {
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
}

impl AppConfig {
    /// Load `config/{env}.yaml`, apply secret overrides from the environment
    /// and validate.
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse config yaml")
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DEPOSIT_GWA_HASH_SECRET") {
            self.providers.gateway_a.hash_secret = v;
        }
        if let Ok(v) = std::env::var("DEPOSIT_GWB_SECRET_KEY") {
            self.providers.gateway_b.secret_key = v;
        }
        if let Ok(v) = std::env::var("DEPOSIT_ADMIN_JWT_SECRET") {
            self.admin_jwt_secret = v;
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.postgres_url = Some(v);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let d = &self.deposit;
        if d.min_amount <= Decimal::ZERO {
            bail!("deposit.min_amount must be positive");
        }
        if d.min_amount > d.max_amount {
            bail!(
                "deposit.min_amount ({}) exceeds deposit.max_amount ({})",
                d.min_amount,
                d.max_amount
            );
        }
        if d.ttl_minutes <= 0 {
            bail!("deposit.ttl_minutes must be positive");
        }
        if d.waiting_grace_minutes < 0 {
            bail!("deposit.waiting_grace_minutes must not be negative");
        }
        if d.sweep_interval_secs == 0 || d.sweep_batch_size == 0 {
            bail!("sweeper interval and batch size must be non-zero");
        }
        if self.providers.gateway_a.hash_secret.is_empty() {
            bail!("providers.gateway_a.hash_secret is empty");
        }
        if self.providers.gateway_b.secret_key.is_empty() {
            bail!("providers.gateway_b.secret_key is empty");
        }
        if self.admin_jwt_secret.is_empty() {
            bail!("admin_jwt_secret is empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
log_level: info
log_dir: ./logs
log_file: deposit.log
use_json: false
rotation: daily
gateway:
  host: 0.0.0.0
  port: 8080
deposit:
  min_amount: 500000
  max_amount: 50000000
  ttl_minutes: 30
providers:
  gateway_a:
    tmn_code: RENT0001
    hash_secret: a-secret
    pay_url: https://pay.gateway-a.test/paymentv2/vpcpay.html
    return_url: https://rent.test/deposit/return
  gateway_b:
    partner_code: RENTB
    access_key: access
    secret_key: b-secret
    pay_url: https://pay.gateway-b.test/v2/gateway/pay
    ipn_url: https://rent.test/api/v1/callbacks/gateway-b
bank:
  bank_code: VCB
  account_number: "0011002233445"
  account_name: RENT PLATFORM JSC
admin_jwt_secret: jwt-secret
"#;

    #[test]
    fn test_parse_and_defaults() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.deposit.waiting_grace_minutes, 60);
        assert_eq!(config.deposit.sweep_batch_size, 100);
        assert!(config.postgres_url.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut config = AppConfig::from_yaml(SAMPLE).unwrap();
        config.deposit.min_amount = Decimal::from(100_000_000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let mut config = AppConfig::from_yaml(SAMPLE).unwrap();
        config.providers.gateway_b.secret_key.clear();
        assert!(config.validate().is_err());
    }
}
