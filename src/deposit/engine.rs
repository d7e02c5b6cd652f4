//! Lifecycle Engine
//!
//! The only component allowed to change a deposit's status. Every event for
//! a contract is serialized through a per-contract async mutex; the
//! transition itself is decided by the pure [`decide`] function and written
//! with a compare-and-set on the status read under the lock.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::channel::{ChannelBuilder, ChannelPayload};
use super::error::DepositError;
use super::state::{DepositStatus, PaymentMethod};
use super::store::{DepositStore, InsertOutcome};
use super::token;
use super::types::{
    ApplyOutcome, ContractCode, DepositEvent, DepositTransaction, EventSource, IgnoreReason,
    IgnoredEvent, NewDeposit, StatusHistoryEntry, Transition,
};
use crate::clock::Clock;
use crate::config::DepositConfig;
use crate::verifier::{VerifiedCallback, check_amount};

/// Contract code collisions tolerated before giving up on creation
const MAX_CODE_ATTEMPTS: usize = 3;

/// Outcome of evaluating the transition table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Apply {
        next: DepositStatus,
        gateway_reference: Option<String>,
    },
    Ignore(IgnoreReason),
}

/// Transition table.
///
/// `now` is compared against `expires_at` (plus `waiting_grace` for
/// WaitingConfirmation) for expiry; nothing else depends on time.
pub fn decide(
    tx: &DepositTransaction,
    event: &DepositEvent,
    source: EventSource,
    now: chrono::DateTime<chrono::Utc>,
    waiting_grace: chrono::Duration,
) -> Decision {
    use DepositStatus::*;

    if !source_allowed(event, source) {
        return Decision::Ignore(IgnoreReason::SourceNotAllowed);
    }

    if let DepositEvent::GatewayConfirmed {
        gateway_reference,
        amount,
    } = event
    {
        // Provider must be the one the deposit was opened with
        if tx.payment_method.provider().map(EventSource::Gateway) != Some(source) {
            return Decision::Ignore(IgnoreReason::MethodMismatch);
        }
        return match tx.status {
            Pending => match check_amount(*amount, tx.amount) {
                Ok(()) => Decision::Apply {
                    next: Paid,
                    gateway_reference: Some(gateway_reference.clone()),
                },
                Err(_) => Decision::Ignore(IgnoreReason::AmountMismatch {
                    expected: tx.amount,
                    reported: *amount,
                }),
            },
            Paid if tx.gateway_reference.as_deref() == Some(gateway_reference.as_str()) => {
                Decision::Ignore(IgnoreReason::DuplicateDelivery)
            }
            Paid => Decision::Ignore(IgnoreReason::ConflictingReference),
            Expired | Cancelled => Decision::Ignore(IgnoreReason::LatePayment),
            Failed => Decision::Ignore(IgnoreReason::AlreadyFinal),
            WaitingConfirmation => Decision::Ignore(IgnoreReason::NotApplicable),
        };
    }

    if tx.status.is_terminal() {
        return Decision::Ignore(IgnoreReason::AlreadyFinal);
    }

    let next = match (tx.status, event) {
        (Pending, DepositEvent::GatewayFailed { result_code }) => {
            if tx.payment_method.provider().map(EventSource::Gateway) != Some(source) {
                return Decision::Ignore(IgnoreReason::MethodMismatch);
            }
            return Decision::Ignore(IgnoreReason::GatewayFailure(result_code.clone()));
        }
        (Pending, DepositEvent::UserNotifiedPaid) => {
            if tx.payment_method != PaymentMethod::BankTransfer {
                return Decision::Ignore(IgnoreReason::MethodMismatch);
            }
            WaitingConfirmation
        }
        (Pending | WaitingConfirmation, DepositEvent::AdminCancelled) => Cancelled,
        (WaitingConfirmation, DepositEvent::AdminConfirmed) => Paid,
        (status, DepositEvent::ExpiryTimeout) => {
            let deadline = match status {
                WaitingConfirmation => tx.expires_at + waiting_grace,
                _ => tx.expires_at,
            };
            if now <= deadline {
                return Decision::Ignore(IgnoreReason::NotDue);
            }
            Expired
        }
        _ => return Decision::Ignore(IgnoreReason::NotApplicable),
    };

    Decision::Apply {
        next,
        gateway_reference: None,
    }
}

fn source_allowed(event: &DepositEvent, source: EventSource) -> bool {
    match event {
        DepositEvent::GatewayConfirmed { .. } | DepositEvent::GatewayFailed { .. } => {
            matches!(source, EventSource::Gateway(_))
        }
        DepositEvent::UserNotifiedPaid => source == EventSource::Tenant,
        DepositEvent::AdminConfirmed | DepositEvent::AdminCancelled => {
            matches!(source, EventSource::Admin(_))
        }
        DepositEvent::ExpiryTimeout => source == EventSource::Sweeper,
    }
}

/// Result of `open`
#[derive(Debug, Clone)]
pub struct OpenedDeposit {
    pub record: DepositTransaction,
    /// Raw bearer token; returned to the payer exactly once.
    pub token: String,
    pub channel_payload: ChannelPayload,
}

pub struct LifecycleEngine {
    store: Arc<dyn DepositStore>,
    clock: Arc<dyn Clock>,
    channels: ChannelBuilder,
    config: DepositConfig,
    locks: DashMap<ContractCode, Arc<Mutex<()>>>,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<dyn DepositStore>,
        clock: Arc<dyn Clock>,
        channels: ChannelBuilder,
        config: DepositConfig,
    ) -> Self {
        Self {
            store,
            clock,
            channels,
            config,
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn DepositStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn channels(&self) -> &ChannelBuilder {
        &self.channels
    }

    pub fn config(&self) -> &DepositConfig {
        &self.config
    }

    /// Create a Pending deposit, issue its token and build the channel
    /// payload.
    pub async fn open(&self, req: NewDeposit) -> Result<OpenedDeposit, DepositError> {
        self.validate(&req)?;

        let now = self.clock.now();
        let (raw_token, token_hash) = token::issue();

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = ContractCode::generate(now);
            let record =
                DepositTransaction::new(code, &req, token_hash.clone(), now, self.config.ttl());

            match self.store.insert(&record).await? {
                InsertOutcome::Inserted => {
                    let channel_payload = self.channels.build(&record)?;
                    info!(
                        contract_code = %record.contract_code,
                        property_id = record.property_id,
                        tenant_id = record.tenant_id,
                        amount = %record.amount,
                        method = %record.payment_method,
                        expires_at = %record.expires_at,
                        "Deposit opened"
                    );
                    return Ok(OpenedDeposit {
                        record,
                        token: raw_token,
                        channel_payload,
                    });
                }
                InsertOutcome::ActiveExists => {
                    debug!(
                        property_id = req.property_id,
                        tenant_id = req.tenant_id,
                        "Active deposit already exists"
                    );
                    return Err(DepositError::ActiveDepositExists);
                }
                InsertOutcome::DuplicateCode => {
                    warn!(
                        contract_code = %record.contract_code,
                        attempt,
                        "Contract code collision, regenerating"
                    );
                }
            }
        }

        Err(DepositError::System(
            "could not allocate a unique contract code".to_string(),
        ))
    }

    fn validate(&self, req: &NewDeposit) -> Result<(), DepositError> {
        if req.property_id <= 0 || req.tenant_id <= 0 || req.landlord_id <= 0 {
            return Err(DepositError::Validation(
                "property, tenant and landlord ids must be positive".to_string(),
            ));
        }
        if req.tenant_id == req.landlord_id {
            return Err(DepositError::Validation(
                "tenant cannot be the landlord".to_string(),
            ));
        }
        if req.amount <= rust_decimal::Decimal::ZERO {
            return Err(DepositError::Validation(
                "amount must be positive".to_string(),
            ));
        }
        if !req.amount.fract().is_zero() {
            return Err(DepositError::Validation(
                "amount must be in whole currency units".to_string(),
            ));
        }
        if req.amount < self.config.min_amount {
            return Err(DepositError::AmountTooSmall);
        }
        if req.amount > self.config.max_amount {
            return Err(DepositError::AmountTooLarge);
        }
        Ok(())
    }

    /// Submit an authenticated gateway callback.
    pub async fn handle_callback(
        &self,
        callback: &VerifiedCallback,
    ) -> Result<ApplyOutcome, DepositError> {
        debug!(
            contract_code = %callback.contract_code,
            provider = callback.provider.as_str(),
            result_code = %callback.provider_result_code,
            payload = %callback.raw_payload,
            "Verified gateway callback"
        );
        self.apply_event(
            &callback.contract_code,
            callback.to_event(),
            EventSource::Gateway(callback.provider),
        )
        .await
    }

    /// Apply one event under the contract's lock.
    ///
    /// Illegal events are journaled and reported through the outcome; only
    /// lookup, lock and storage failures are errors.
    pub async fn apply_event(
        &self,
        code: &ContractCode,
        event: DepositEvent,
        source: EventSource,
    ) -> Result<ApplyOutcome, DepositError> {
        let lock = self.lock_for(code);
        let result = match tokio::time::timeout(self.config.lock_timeout(), lock.lock()).await {
            Ok(_guard) => self.apply_locked(code, &event, source).await,
            Err(_) => {
                warn!(contract_code = %code, event = %event, source = %source, "Deposit lock timed out");
                Err(DepositError::LockTimeout(code.to_string()))
            }
        };
        self.release(code, lock);
        result
    }

    fn lock_for(&self, code: &ContractCode) -> Arc<Mutex<()>> {
        self.locks
            .entry(code.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the map entry once no other task holds or waits on it.
    fn release(&self, code: &ContractCode, lock: Arc<Mutex<()>>) {
        self.locks
            .remove_if(code, |_, held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2);
    }

    /// Number of contracts with a live lock entry
    pub fn active_locks(&self) -> usize {
        self.locks.len()
    }

    async fn apply_locked(
        &self,
        code: &ContractCode,
        event: &DepositEvent,
        source: EventSource,
    ) -> Result<ApplyOutcome, DepositError> {
        let tx = self
            .store
            .get(code)
            .await?
            .ok_or_else(|| DepositError::NotFound(code.to_string()))?;
        let now = self.clock.now();

        match decide(&tx, event, source, now, self.config.waiting_grace()) {
            Decision::Apply {
                next,
                gateway_reference,
            } => {
                let transition = Transition {
                    expected: tx.status,
                    next,
                    paid_at: (next == DepositStatus::Paid).then_some(now),
                    gateway_reference,
                    source,
                    entry: StatusHistoryEntry::new(source, event, tx.status, next, now),
                };

                if self.store.apply_transition(code, &transition).await? {
                    info!(
                        contract_code = %code,
                        from = %tx.status,
                        to = %next,
                        source = %source,
                        event = %event,
                        "Deposit status changed"
                    );
                    return Ok(ApplyOutcome::applied(next));
                }

                // Another instance wrote first
                let stored = self
                    .store
                    .get(code)
                    .await?
                    .map(|r| r.status)
                    .unwrap_or(tx.status);
                warn!(
                    contract_code = %code,
                    expected = %tx.status,
                    stored = %stored,
                    event = %event,
                    "Status changed concurrently; transition dropped"
                );
                self.journal(&tx, event, source, &IgnoreReason::ConcurrentUpdate, now)
                    .await?;
                Ok(ApplyOutcome::ignored(stored, IgnoreReason::ConcurrentUpdate))
            }
            Decision::Ignore(reason) => {
                if let Some(alert) = reason.alert() {
                    error!(
                        alert,
                        contract_code = %code,
                        status = %tx.status,
                        source = %source,
                        event = %event,
                        stored_reference = tx.gateway_reference.as_deref().unwrap_or(""),
                        detail = %reason,
                        "Deposit flagged for review"
                    );
                    self.store.flag_for_review(code, &reason.to_string()).await?;
                } else {
                    debug!(
                        contract_code = %code,
                        status = %tx.status,
                        source = %source,
                        event = %event,
                        reason = %reason,
                        "Event ignored"
                    );
                }
                self.journal(&tx, event, source, &reason, now).await?;
                Ok(ApplyOutcome::ignored(tx.status, reason))
            }
        }
    }

    async fn journal(
        &self,
        tx: &DepositTransaction,
        event: &DepositEvent,
        source: EventSource,
        reason: &IgnoreReason,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), DepositError> {
        self.store
            .record_ignored(&IgnoredEvent {
                contract_code: tx.contract_code.clone(),
                source: source.as_str().to_string(),
                actor: source.actor(),
                event: event.kind().to_string(),
                status: tx.status,
                reason: reason.to_string(),
                at,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::deposit::channel::tests::test_builder;
    use crate::deposit::memory::MemoryDepositStore;
    use crate::deposit::state::Provider;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn config() -> DepositConfig {
        DepositConfig {
            min_amount: Decimal::from(500_000),
            max_amount: Decimal::from(50_000_000),
            ttl_minutes: 30,
            waiting_grace_minutes: 60,
            sweep_interval_secs: 30,
            sweep_batch_size: 100,
            lock_timeout_ms: 200,
        }
    }

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()
    }

    fn record(method: PaymentMethod, status: DepositStatus) -> DepositTransaction {
        let req = NewDeposit {
            property_id: 1,
            tenant_id: 2,
            landlord_id: 3,
            amount: Decimal::from(2_000_000),
            payment_method: method,
        };
        let mut tx = DepositTransaction::new(
            ContractCode::parse("RD261019K7Q2ZP").unwrap(),
            &req,
            String::new(),
            start(),
            Duration::minutes(30),
        );
        tx.status = status;
        tx
    }

    fn confirmed(reference: &str, amount: i64) -> DepositEvent {
        DepositEvent::GatewayConfirmed {
            gateway_reference: reference.into(),
            amount: Decimal::from(amount),
        }
    }

    const GWA: EventSource = EventSource::Gateway(Provider::GatewayA);
    const GRACE: i64 = 60;

    fn at(minutes: i64) -> chrono::DateTime<Utc> {
        start() + Duration::minutes(minutes)
    }

    fn run(tx: &DepositTransaction, event: DepositEvent, source: EventSource, minute: i64) -> Decision {
        decide(tx, &event, source, at(minute), Duration::minutes(GRACE))
    }

    #[test]
    fn test_pending_gateway_confirmed_pays() {
        let tx = record(PaymentMethod::GatewayA, DepositStatus::Pending);
        assert_eq!(
            run(&tx, confirmed("TXN123", 2_000_000), GWA, 5),
            Decision::Apply {
                next: DepositStatus::Paid,
                gateway_reference: Some("TXN123".into())
            }
        );
    }

    #[test]
    fn test_amount_mismatch_never_pays() {
        let tx = record(PaymentMethod::GatewayA, DepositStatus::Pending);
        assert!(matches!(
            run(&tx, confirmed("TXN123", 1_000), GWA, 5),
            Decision::Ignore(IgnoreReason::AmountMismatch { .. })
        ));
    }

    #[test]
    fn test_amount_compared_by_value_not_scale() {
        let tx = record(PaymentMethod::GatewayA, DepositStatus::Pending);
        let event = DepositEvent::GatewayConfirmed {
            gateway_reference: "TXN123".into(),
            amount: Decimal::new(200_000_000, 2),
        };
        assert!(matches!(run(&tx, event, GWA, 5), Decision::Apply { .. }));

        let short = DepositEvent::GatewayConfirmed {
            gateway_reference: "TXN123".into(),
            amount: Decimal::new(199_999_999, 2),
        };
        assert_eq!(
            run(&tx, short, GWA, 5),
            Decision::Ignore(IgnoreReason::AmountMismatch {
                expected: Decimal::from(2_000_000),
                reported: Decimal::new(199_999_999, 2),
            })
        );
    }

    #[test]
    fn test_wrong_provider_ignored() {
        let tx = record(PaymentMethod::GatewayA, DepositStatus::Pending);
        let gwb = EventSource::Gateway(Provider::GatewayB);
        assert_eq!(
            run(&tx, confirmed("TXN123", 2_000_000), gwb, 5),
            Decision::Ignore(IgnoreReason::MethodMismatch)
        );
        let bank = record(PaymentMethod::BankTransfer, DepositStatus::Pending);
        assert_eq!(
            run(&bank, confirmed("TXN123", 2_000_000), GWA, 5),
            Decision::Ignore(IgnoreReason::MethodMismatch)
        );
    }

    #[test]
    fn test_paid_duplicate_and_conflict() {
        let mut tx = record(PaymentMethod::GatewayA, DepositStatus::Paid);
        tx.gateway_reference = Some("TXN123".into());
        assert_eq!(
            run(&tx, confirmed("TXN123", 2_000_000), GWA, 5),
            Decision::Ignore(IgnoreReason::DuplicateDelivery)
        );
        assert_eq!(
            run(&tx, confirmed("TXN999", 2_000_000), GWA, 5),
            Decision::Ignore(IgnoreReason::ConflictingReference)
        );
    }

    #[test]
    fn test_late_payment_after_expiry() {
        for status in [DepositStatus::Expired, DepositStatus::Cancelled] {
            let tx = record(PaymentMethod::GatewayA, status);
            assert_eq!(
                run(&tx, confirmed("TXN123", 2_000_000), GWA, 90),
                Decision::Ignore(IgnoreReason::LatePayment)
            );
        }
    }

    #[test]
    fn test_gateway_failed_keeps_pending() {
        let tx = record(PaymentMethod::GatewayA, DepositStatus::Pending);
        assert_eq!(
            run(
                &tx,
                DepositEvent::GatewayFailed {
                    result_code: "24".into()
                },
                GWA,
                5
            ),
            Decision::Ignore(IgnoreReason::GatewayFailure("24".into()))
        );
    }

    #[test]
    fn test_user_notified_only_for_bank_transfer() {
        let bank = record(PaymentMethod::BankTransfer, DepositStatus::Pending);
        assert_eq!(
            run(&bank, DepositEvent::UserNotifiedPaid, EventSource::Tenant, 5),
            Decision::Apply {
                next: DepositStatus::WaitingConfirmation,
                gateway_reference: None
            }
        );
        let gw = record(PaymentMethod::GatewayB, DepositStatus::Pending);
        assert_eq!(
            run(&gw, DepositEvent::UserNotifiedPaid, EventSource::Tenant, 5),
            Decision::Ignore(IgnoreReason::MethodMismatch)
        );
    }

    #[test]
    fn test_admin_confirm_requires_waiting() {
        let admin = EventSource::Admin(7);
        let pending = record(PaymentMethod::BankTransfer, DepositStatus::Pending);
        assert_eq!(
            run(&pending, DepositEvent::AdminConfirmed, admin, 5),
            Decision::Ignore(IgnoreReason::NotApplicable)
        );
        let waiting = record(PaymentMethod::BankTransfer, DepositStatus::WaitingConfirmation);
        assert!(matches!(
            run(&waiting, DepositEvent::AdminConfirmed, admin, 5),
            Decision::Apply {
                next: DepositStatus::Paid,
                ..
            }
        ));
    }

    #[test]
    fn test_admin_events_require_admin_source() {
        let waiting = record(PaymentMethod::BankTransfer, DepositStatus::WaitingConfirmation);
        assert_eq!(
            run(&waiting, DepositEvent::AdminConfirmed, EventSource::Tenant, 5),
            Decision::Ignore(IgnoreReason::SourceNotAllowed)
        );
    }

    #[test]
    fn test_expiry_deadlines() {
        let pending = record(PaymentMethod::GatewayA, DepositStatus::Pending);
        assert_eq!(
            run(&pending, DepositEvent::ExpiryTimeout, EventSource::Sweeper, 30),
            Decision::Ignore(IgnoreReason::NotDue)
        );
        assert!(matches!(
            run(&pending, DepositEvent::ExpiryTimeout, EventSource::Sweeper, 31),
            Decision::Apply {
                next: DepositStatus::Expired,
                ..
            }
        ));

        let waiting = record(PaymentMethod::BankTransfer, DepositStatus::WaitingConfirmation);
        assert_eq!(
            run(&waiting, DepositEvent::ExpiryTimeout, EventSource::Sweeper, 31),
            Decision::Ignore(IgnoreReason::NotDue)
        );
        assert!(matches!(
            run(&waiting, DepositEvent::ExpiryTimeout, EventSource::Sweeper, 91),
            Decision::Apply {
                next: DepositStatus::Expired,
                ..
            }
        ));
    }

    #[test]
    fn test_terminal_states_absorb_everything() {
        for status in [
            DepositStatus::Paid,
            DepositStatus::Expired,
            DepositStatus::Cancelled,
            DepositStatus::Failed,
        ] {
            let tx = record(PaymentMethod::BankTransfer, status);
            for (event, source) in [
                (DepositEvent::UserNotifiedPaid, EventSource::Tenant),
                (DepositEvent::AdminConfirmed, EventSource::Admin(1)),
                (DepositEvent::AdminCancelled, EventSource::Admin(1)),
                (DepositEvent::ExpiryTimeout, EventSource::Sweeper),
            ] {
                assert_eq!(
                    run(&tx, event, source, 500),
                    Decision::Ignore(IgnoreReason::AlreadyFinal)
                );
            }
        }
    }

    fn engine(store: Arc<MemoryDepositStore>, clock: Arc<ManualClock>) -> LifecycleEngine {
        LifecycleEngine::new(store, clock, test_builder(), config())
    }

    fn new_deposit(method: PaymentMethod, amount: i64) -> NewDeposit {
        NewDeposit {
            property_id: 10,
            tenant_id: 20,
            landlord_id: 30,
            amount: Decimal::from(amount),
            payment_method: method,
        }
    }

    #[tokio::test]
    async fn test_open_validates_amount() {
        let store = Arc::new(MemoryDepositStore::new());
        let engine = engine(store.clone(), Arc::new(ManualClock::new(start())));

        let err = engine
            .open(new_deposit(PaymentMethod::GatewayA, 1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, DepositError::AmountTooSmall));

        let err = engine
            .open(new_deposit(PaymentMethod::GatewayA, 90_000_000))
            .await
            .unwrap_err();
        assert!(matches!(err, DepositError::AmountTooLarge));

        let mut fractional = new_deposit(PaymentMethod::GatewayA, 1_000_000);
        fractional.amount = Decimal::new(10_000_005, 1);
        assert!(engine.open(fractional).await.unwrap_err().is_validation());

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_open_rejects_second_active_deposit() {
        let store = Arc::new(MemoryDepositStore::new());
        let engine = engine(store.clone(), Arc::new(ManualClock::new(start())));

        let opened = engine
            .open(new_deposit(PaymentMethod::BankTransfer, 2_000_000))
            .await
            .unwrap();
        assert_eq!(opened.record.status, DepositStatus::Pending);
        assert_eq!(opened.record.expires_at, start() + Duration::minutes(30));
        assert!(token::verify(&opened.token, &opened.record.token_hash));

        let err = engine
            .open(new_deposit(PaymentMethod::GatewayA, 2_000_000))
            .await
            .unwrap_err();
        assert!(matches!(err, DepositError::ActiveDepositExists));
    }

    #[tokio::test]
    async fn test_apply_event_unknown_contract() {
        let store = Arc::new(MemoryDepositStore::new());
        let engine = engine(store, Arc::new(ManualClock::new(start())));
        let code = ContractCode::parse("RD261019K7Q2ZP").unwrap();

        let err = engine
            .apply_event(&code, DepositEvent::ExpiryTimeout, EventSource::Sweeper)
            .await
            .unwrap_err();
        assert!(matches!(err, DepositError::NotFound(_)));
        assert_eq!(engine.active_locks(), 0);
    }

    #[tokio::test]
    async fn test_ignored_event_is_journaled() {
        let store = Arc::new(MemoryDepositStore::new());
        let engine = engine(store.clone(), Arc::new(ManualClock::new(start())));
        let opened = engine
            .open(new_deposit(PaymentMethod::GatewayA, 2_000_000))
            .await
            .unwrap();
        let code = opened.record.contract_code;

        let outcome = engine
            .apply_event(&code, DepositEvent::ExpiryTimeout, EventSource::Sweeper)
            .await
            .unwrap();
        assert!(!outcome.applied);
        assert_eq!(outcome.ignored_reason, Some(IgnoreReason::NotDue));

        let journal = store.ignored_events(&code).await.unwrap();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].reason, "NOT_DUE");
        assert!(store.get(&code).await.unwrap().unwrap().status_history.is_empty());
    }

    #[tokio::test]
    async fn test_amount_mismatch_flags_review() {
        let store = Arc::new(MemoryDepositStore::new());
        let engine = engine(store.clone(), Arc::new(ManualClock::new(start())));
        let code = engine
            .open(new_deposit(PaymentMethod::GatewayA, 2_000_000))
            .await
            .unwrap()
            .record
            .contract_code;

        let outcome = engine
            .apply_event(&code, confirmed("TXN123", 20_000), GWA)
            .await
            .unwrap();
        assert_eq!(outcome.status, DepositStatus::Pending);

        let stored = store.get(&code).await.unwrap().unwrap();
        assert!(stored.needs_review);
        assert!(stored.paid_at.is_none());
        assert!(
            stored
                .review_reason
                .unwrap()
                .starts_with("AMOUNT_MISMATCH")
        );
    }

    #[tokio::test]
    async fn test_lock_timeout() {
        let store = Arc::new(MemoryDepositStore::new());
        let engine = engine(store.clone(), Arc::new(ManualClock::new(start())));
        let code = engine
            .open(new_deposit(PaymentMethod::GatewayA, 2_000_000))
            .await
            .unwrap()
            .record
            .contract_code;

        let held = engine.lock_for(&code);
        let guard = held.lock().await;
        let err = engine
            .apply_event(&code, DepositEvent::ExpiryTimeout, EventSource::Sweeper)
            .await
            .unwrap_err();
        assert!(matches!(err, DepositError::LockTimeout(_)));

        drop(guard);
        engine.release(&code, held);
        assert_eq!(engine.active_locks(), 0);
    }
}
