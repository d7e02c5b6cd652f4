//! HTTP handlers

pub mod admin;
pub mod callback;
pub mod deposit;
pub mod health;

pub use admin::{
    archive_deposit, cancel_deposit, confirm_deposit, deposit_history, resolve_review, review_queue,
};
pub use callback::{GatewayAAck, gateway_a_callback, gateway_b_callback};
pub use deposit::{create_deposit, get_deposit_status, notify_paid};
pub use health::{HealthResponse, health_check};

