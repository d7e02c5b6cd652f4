//! Deposit Core Types

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use super::state::{DepositStatus, PaymentMethod, Provider};

/// Alphabet for the random part of contract codes (no 0/O/1/I).
const CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
const CODE_PREFIX: &str = "RD";
const CODE_RANDOM_LEN: usize = 6;
const CODE_LEN: usize = 2 + 6 + CODE_RANDOM_LEN;

/// Human-readable deposit identifier, e.g. `RD261019K7Q2ZP`.
///
/// Used as the correlation key by gateways, pollers and administrators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractCode(String);

impl ContractCode {
    /// `RD` + `YYMMDD` of `now` + 6 random characters.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..CODE_RANDOM_LEN)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(format!("{}{}{}", CODE_PREFIX, now.format("%y%m%d"), suffix))
    }

    /// Accepts only well-formed codes; input is upper-cased first.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_uppercase();
        // Byte-indexed below
        if !s.is_ascii() || s.len() != CODE_LEN || !s.starts_with(CODE_PREFIX) {
            return None;
        }
        let (date, random) = s[CODE_PREFIX.len()..].split_at(6);
        if !date.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !random.bytes().all(|b| CODE_ALPHABET.contains(&b)) {
            return None;
        }
        Some(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Origin of a lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    Gateway(Provider),
    Tenant,
    Admin(i64),
    Sweeper,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Gateway(p) => p.as_str(),
            EventSource::Tenant => "TENANT",
            EventSource::Admin(_) => "ADMIN",
            EventSource::Sweeper => "SWEEPER",
        }
    }

    /// Acting administrator, recorded in history.
    pub fn actor(&self) -> Option<i64> {
        match self {
            EventSource::Admin(id) => Some(*id),
            _ => None,
        }
    }

    pub fn from_parts(kind: &str, actor: Option<i64>) -> Option<Self> {
        match (kind, actor) {
            ("GATEWAY_A", _) => Some(EventSource::Gateway(Provider::GatewayA)),
            ("GATEWAY_B", _) => Some(EventSource::Gateway(Provider::GatewayB)),
            ("TENANT", _) => Some(EventSource::Tenant),
            ("ADMIN", Some(id)) => Some(EventSource::Admin(id)),
            ("SWEEPER", _) => Some(EventSource::Sweeper),
            _ => None,
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSource::Admin(id) => write!(f, "ADMIN#{}", id),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Signal submitted to the lifecycle engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositEvent {
    /// Verified gateway success. `amount` is the provider-reported amount
    /// and is re-checked against the stored one.
    GatewayConfirmed {
        gateway_reference: String,
        amount: Decimal,
    },
    GatewayFailed {
        result_code: String,
    },
    UserNotifiedPaid,
    AdminConfirmed,
    AdminCancelled,
    ExpiryTimeout,
}

impl DepositEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DepositEvent::GatewayConfirmed { .. } => "GATEWAY_CONFIRMED",
            DepositEvent::GatewayFailed { .. } => "GATEWAY_FAILED",
            DepositEvent::UserNotifiedPaid => "USER_NOTIFIED_PAID",
            DepositEvent::AdminConfirmed => "ADMIN_CONFIRMED",
            DepositEvent::AdminCancelled => "ADMIN_CANCELLED",
            DepositEvent::ExpiryTimeout => "EXPIRY_TIMEOUT",
        }
    }
}

impl fmt::Display for DepositEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// History event name for an administrator clearing a review flag
pub const REVIEW_RESOLVED: &str = "REVIEW_RESOLVED";

/// One accepted transition, or a review resolution (`from == to`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusHistoryEntry {
    pub source: String,
    /// Administrator id for admin actions
    pub actor: Option<i64>,
    pub event: String,
    pub from: DepositStatus,
    pub to: DepositStatus,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

impl StatusHistoryEntry {
    pub fn new(
        source: EventSource,
        event: &DepositEvent,
        from: DepositStatus,
        to: DepositStatus,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.as_str().to_string(),
            actor: source.actor(),
            event: event.kind().to_string(),
            from,
            to,
            at,
            note: None,
        }
    }

    /// Review flag cleared by an administrator; status is unchanged.
    pub fn review_resolved(
        admin_id: i64,
        status: DepositStatus,
        at: DateTime<Utc>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            source: EventSource::Admin(admin_id).as_str().to_string(),
            actor: Some(admin_id),
            event: REVIEW_RESOLVED.to_string(),
            from: status,
            to: status,
            at,
            note: Some(note.into()),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Event absorbed without a status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct IgnoredEvent {
    #[schema(value_type = String)]
    pub contract_code: ContractCode,
    pub source: String,
    pub actor: Option<i64>,
    pub event: String,
    pub status: DepositStatus,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Creation input after validation
#[derive(Debug, Clone)]
pub struct NewDeposit {
    pub property_id: i64,
    pub tenant_id: i64,
    pub landlord_id: i64,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
}

/// Deposit transaction record
#[derive(Debug, Clone, Serialize)]
pub struct DepositTransaction {
    pub contract_code: ContractCode,
    pub property_id: i64,
    pub tenant_id: i64,
    pub landlord_id: i64,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub status: DepositStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub gateway_reference: Option<String>,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub last_event_source: Option<EventSource>,
    pub needs_review: bool,
    pub review_reason: Option<String>,
    pub archived: bool,
    pub status_history: Vec<StatusHistoryEntry>,
}

impl DepositTransaction {
    /// Fresh Pending record
    pub fn new(
        contract_code: ContractCode,
        req: &NewDeposit,
        token_hash: String,
        created_at: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            contract_code,
            property_id: req.property_id,
            tenant_id: req.tenant_id,
            landlord_id: req.landlord_id,
            amount: req.amount,
            payment_method: req.payment_method,
            status: DepositStatus::Pending,
            created_at,
            expires_at: created_at + ttl,
            paid_at: None,
            gateway_reference: None,
            token_hash,
            last_event_source: None,
            needs_review: false,
            review_reason: None,
            archived: false,
            status_history: Vec::new(),
        }
    }

    /// Point after which the sweeper may expire this record.
    pub fn sweep_deadline(&self, waiting_grace: chrono::Duration) -> DateTime<Utc> {
        match self.status {
            DepositStatus::WaitingConfirmation => self.expires_at + waiting_grace,
            _ => self.expires_at,
        }
    }
}

/// Status write produced by the engine, applied with compare-and-set.
#[derive(Debug, Clone)]
pub struct Transition {
    pub expected: DepositStatus,
    pub next: DepositStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub gateway_reference: Option<String>,
    pub source: EventSource,
    pub entry: StatusHistoryEntry,
}

/// Why an event was absorbed without a status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Status is terminal
    AlreadyFinal,
    /// Same gateway reference delivered again
    DuplicateDelivery,
    /// Paid already, under a different gateway reference
    ConflictingReference,
    /// Success arrived after the deposit expired or was cancelled
    LatePayment,
    AmountMismatch { expected: Decimal, reported: Decimal },
    /// Provider reported a non-success result; payer may retry
    GatewayFailure(String),
    /// Event does not match the deposit's payment method
    MethodMismatch,
    /// Event kind is not accepted from this source
    SourceNotAllowed,
    /// Expiry requested before the deadline
    NotDue,
    /// No transition defined from the current status
    NotApplicable,
    /// Another writer changed the status first
    ConcurrentUpdate,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::AlreadyFinal => "ALREADY_FINAL",
            IgnoreReason::DuplicateDelivery => "DUPLICATE_DELIVERY",
            IgnoreReason::ConflictingReference => "CONFLICTING_REFERENCE",
            IgnoreReason::LatePayment => "LATE_PAYMENT",
            IgnoreReason::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            IgnoreReason::GatewayFailure(_) => "GATEWAY_FAILURE",
            IgnoreReason::MethodMismatch => "METHOD_MISMATCH",
            IgnoreReason::SourceNotAllowed => "SOURCE_NOT_ALLOWED",
            IgnoreReason::NotDue => "NOT_DUE",
            IgnoreReason::NotApplicable => "NOT_APPLICABLE",
            IgnoreReason::ConcurrentUpdate => "CONCURRENT_UPDATE",
        }
    }

    /// Operational alert name for reasons that need a human.
    pub fn alert(&self) -> Option<&'static str> {
        match self {
            IgnoreReason::AmountMismatch { .. } => Some("amount_mismatch"),
            IgnoreReason::LatePayment => Some("late_payment"),
            IgnoreReason::ConflictingReference => Some("possible_double_charge"),
            _ => None,
        }
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::AmountMismatch { expected, reported } => write!(
                f,
                "AMOUNT_MISMATCH: reported {}, expected {}",
                reported, expected
            ),
            IgnoreReason::GatewayFailure(code) => write!(f, "GATEWAY_FAILURE: result code {}", code),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Result of `apply_event`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Status after the call
    pub status: DepositStatus,
    /// Whether this call changed the status
    pub applied: bool,
    /// Why the event was absorbed, when it was
    pub ignored_reason: Option<IgnoreReason>,
}

impl ApplyOutcome {
    pub fn applied(status: DepositStatus) -> Self {
        Self {
            status,
            applied: true,
            ignored_reason: None,
        }
    }

    pub fn ignored(status: DepositStatus, reason: IgnoreReason) -> Self {
        Self {
            status,
            applied: false,
            ignored_reason: Some(reason),
        }
    }
}
