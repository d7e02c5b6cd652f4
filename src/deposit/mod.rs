//! Deposit Payment Lifecycle
//!
//! Tracks one reservation deposit per (property, tenant) attempt from
//! creation until it is paid, expires or is cancelled.
//!
//! # State Machine
//!
//! ```text
//!            GatewayConfirmed / AdminConfirmed
//!   PENDING ───────────────────────────────────────→ PAID
//!     │  │                                            ↑
//!     │  └─ UserNotifiedPaid → WAITING_CONFIRMATION ──┘ (AdminConfirmed)
//!     │                              │
//!     ├── AdminCancelled ──→ CANCELLED ←─┤
//!     └── ExpiryTimeout ───→ EXPIRED ←───┘ (after grace)
//! ```
//!
//! # Invariants
//!
//! 1. **Single writer**: only [`engine::LifecycleEngine`] changes status, one
//!    event per contract at a time.
//! 2. **No way back**: terminal statuses absorb every event.
//! 3. **Paid once**: `paid_at` and the gateway reference are written on entry
//!    to PAID and never again.
//! 4. **Amount is authoritative**: a gateway-reported amount that differs
//!    from the stored one never produces PAID.
//! 5. **One active attempt**: at most one PENDING/WAITING_CONFIRMATION
//!    deposit per (property, tenant).

pub mod admin;
pub mod channel;
pub mod db;
pub mod engine;
pub mod error;
pub mod memory;
pub mod poller;
pub mod state;
pub mod store;
pub mod sweeper;
pub mod token;
pub mod types;

pub use admin::AdminSurface;
pub use channel::{ChannelBuilder, ChannelPayload};
pub use engine::{LifecycleEngine, OpenedDeposit};
pub use error::DepositError;
pub use memory::MemoryDepositStore;
pub use poller::{DepositPoller, StatusView};
pub use state::{DepositStatus, PaymentMethod, Provider};
pub use store::DepositStore;
pub use sweeper::{ExpirySweeper, SweeperConfig};
pub use types::{
    ApplyOutcome, ContractCode, DepositEvent, DepositTransaction, EventSource, IgnoreReason,
    NewDeposit,
};
