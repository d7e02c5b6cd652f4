//! Rental Deposit - deposit payment lifecycle service
//!
//! A tenant opens a deposit for a rental contract and pays it through one
//! of two card/wallet gateways or by bank transfer. Gateway callbacks,
//! tenant "I have paid" notices, administrator decisions and the expiry
//! sweeper all funnel into one state machine per contract.
//!
//! # Modules
//!
//! - [`deposit`] - Transaction Store, Lifecycle Engine, Expiry Sweeper,
//!   Reconciliation Poller, Admin Confirmation Surface
//! - [`verifier`] - Gateway callback signature verification
//! - [`api`] - axum HTTP surface
//! - [`db`] - PostgreSQL pool and migrations
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup
//! - [`clock`] - Injectable time source

pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod deposit;
pub mod logging;
pub mod verifier;

// Convenient re-exports at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use deposit::{
    ContractCode, DepositError, DepositEvent, DepositStatus, DepositTransaction, LifecycleEngine,
    PaymentMethod, Provider,
};
pub use verifier::{VerifiedCallback, VerifierSet, VerifyError};
