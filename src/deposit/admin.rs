//! Admin Confirmation Surface
//!
//! Manual overrides for bank-transfer deposits. Callers must already have
//! authenticated the administrator; the id passed in is recorded in history.

use std::sync::Arc;
use tracing::info;

use super::engine::LifecycleEngine;
use super::error::DepositError;
use super::state::DepositStatus;
use super::types::{
    ApplyOutcome, ContractCode, DepositEvent, DepositTransaction, EventSource, IgnoredEvent,
    StatusHistoryEntry,
};

const REVIEW_QUEUE_LIMIT: usize = 200;

/// Status history plus absorbed events, for audit views
#[derive(Debug, Clone)]
pub struct DepositHistory {
    pub status: DepositStatus,
    pub entries: Vec<StatusHistoryEntry>,
    pub ignored: Vec<IgnoredEvent>,
}

pub struct AdminSurface {
    engine: Arc<LifecycleEngine>,
}

impl AdminSurface {
    pub fn new(engine: Arc<LifecycleEngine>) -> Self {
        Self { engine }
    }

    pub async fn confirm(
        &self,
        code: &ContractCode,
        admin_id: i64,
    ) -> Result<ApplyOutcome, DepositError> {
        let outcome = self
            .engine
            .apply_event(code, DepositEvent::AdminConfirmed, EventSource::Admin(admin_id))
            .await?;
        info!(contract_code = %code, admin_id, applied = outcome.applied, status = %outcome.status, "Admin confirm");
        Ok(outcome)
    }

    pub async fn cancel(
        &self,
        code: &ContractCode,
        admin_id: i64,
    ) -> Result<ApplyOutcome, DepositError> {
        let outcome = self
            .engine
            .apply_event(code, DepositEvent::AdminCancelled, EventSource::Admin(admin_id))
            .await?;
        info!(contract_code = %code, admin_id, applied = outcome.applied, status = %outcome.status, "Admin cancel");
        Ok(outcome)
    }

    /// Waiting bank transfers, then anything else flagged for review.
    /// Oldest first within each group.
    pub async fn review_queue(&self) -> Result<Vec<DepositTransaction>, DepositError> {
        self.engine.store().review_queue(REVIEW_QUEUE_LIMIT).await
    }

    /// Clear a deposit's review flag once an administrator has dealt with
    /// it. Recorded as a history entry that leaves the status unchanged.
    ///
    /// Returns false when the deposit was not flagged.
    pub async fn resolve_review(
        &self,
        code: &ContractCode,
        admin_id: i64,
        note: Option<&str>,
    ) -> Result<bool, DepositError> {
        let store = self.engine.store();
        let tx = store
            .get(code)
            .await?
            .ok_or_else(|| DepositError::NotFound(code.to_string()))?;
        if !tx.needs_review {
            return Ok(false);
        }
        let reason = tx.review_reason.as_deref().unwrap_or("unspecified");

        let note = match note.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => format!("{} | {}", reason, n),
            None => reason.to_string(),
        };
        let entry =
            StatusHistoryEntry::review_resolved(admin_id, tx.status, self.engine.clock().now(), note);
        let resolved = store.resolve_review(code, &entry).await?;
        if resolved {
            info!(contract_code = %code, admin_id, status = %tx.status, reason, "Review resolved");
        }
        Ok(resolved)
    }

    /// Hide a terminal, unpaid deposit from working lists. The record stays.
    pub async fn archive(&self, code: &ContractCode, admin_id: i64) -> Result<(), DepositError> {
        let tx = self
            .engine
            .store()
            .get(code)
            .await?
            .ok_or_else(|| DepositError::NotFound(code.to_string()))?;
        if !tx.status.is_terminal() || tx.status == DepositStatus::Paid {
            return Err(DepositError::Validation(format!(
                "cannot archive a {} deposit",
                tx.status
            )));
        }
        if self.engine.store().archive(code).await? {
            info!(contract_code = %code, admin_id, "Deposit archived");
        }
        Ok(())
    }

    pub async fn history(&self, code: &ContractCode) -> Result<DepositHistory, DepositError> {
        let store = self.engine.store();
        let tx = store
            .get(code)
            .await?
            .ok_or_else(|| DepositError::NotFound(code.to_string()))?;
        let ignored = store.ignored_events(code).await?;
        Ok(DepositHistory {
            status: tx.status,
            entries: tx.status_history,
            ignored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::DepositConfig;
    use crate::deposit::channel::tests::test_builder;
    use crate::deposit::memory::MemoryDepositStore;
    use crate::deposit::store::DepositStore;
    use crate::deposit::state::PaymentMethod;
    use crate::deposit::types::NewDeposit;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    async fn setup() -> (AdminSurface, Arc<LifecycleEngine>, ContractCode) {
        let engine = Arc::new(LifecycleEngine::new(
            Arc::new(MemoryDepositStore::new()),
            Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap(),
            )),
            test_builder(),
            DepositConfig {
                min_amount: Decimal::from(500_000),
                max_amount: Decimal::from(50_000_000),
                ttl_minutes: 30,
                waiting_grace_minutes: 60,
                sweep_interval_secs: 30,
                sweep_batch_size: 100,
                lock_timeout_ms: 500,
            },
        ));
        let code = engine
            .open(NewDeposit {
                property_id: 1,
                tenant_id: 2,
                landlord_id: 3,
                amount: Decimal::from(3_000_000),
                payment_method: PaymentMethod::BankTransfer,
            })
            .await
            .unwrap()
            .record
            .contract_code;
        (AdminSurface::new(engine.clone()), engine, code)
    }

    #[tokio::test]
    async fn test_confirm_after_tenant_notification() {
        let (admin, engine, code) = setup().await;
        engine
            .apply_event(&code, DepositEvent::UserNotifiedPaid, EventSource::Tenant)
            .await
            .unwrap();

        assert_eq!(admin.review_queue().await.unwrap().len(), 1);

        let outcome = admin.confirm(&code, 7).await.unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.status, DepositStatus::Paid);

        let history = admin.history(&code).await.unwrap();
        assert_eq!(history.entries.len(), 2);
        assert_eq!(history.entries[1].actor, Some(7));
        assert!(admin.review_queue().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_pending_is_noop() {
        let (admin, _, code) = setup().await;
        let outcome = admin.confirm(&code, 7).await.unwrap();
        assert!(!outcome.applied);
        assert_eq!(outcome.status, DepositStatus::Pending);
        assert_eq!(admin.history(&code).await.unwrap().ignored.len(), 1);
    }

    #[tokio::test]
    async fn test_archive_rules() {
        let (admin, _, code) = setup().await;
        assert!(admin.archive(&code, 7).await.unwrap_err().is_validation());

        admin.cancel(&code, 7).await.unwrap();
        admin.archive(&code, 7).await.unwrap();
        // Archiving twice is harmless
        admin.archive(&code, 7).await.unwrap();
        assert_eq!(
            admin.history(&code).await.unwrap().status,
            DepositStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_waiting_transfers_lead_the_review_queue() {
        let (admin, engine, bank_code) = setup().await;
        for property_id in 10..13 {
            let flagged = engine
                .open(NewDeposit {
                    property_id,
                    tenant_id: 2,
                    landlord_id: 3,
                    amount: Decimal::from(3_000_000),
                    payment_method: PaymentMethod::GatewayA,
                })
                .await
                .unwrap()
                .record
                .contract_code;
            engine
                .store()
                .flag_for_review(&flagged, "LATE_PAYMENT")
                .await
                .unwrap();
        }
        engine
            .apply_event(&bank_code, DepositEvent::UserNotifiedPaid, EventSource::Tenant)
            .await
            .unwrap();

        let queue = admin.review_queue().await.unwrap();
        assert_eq!(queue.len(), 4);
        assert_eq!(queue[0].contract_code, bank_code);
        assert!(queue[1..].iter().all(|r| r.needs_review));
    }

    #[tokio::test]
    async fn test_resolve_review_clears_flag_and_records_admin() {
        let (admin, engine, code) = setup().await;
        assert!(!admin.resolve_review(&code, 7, None).await.unwrap());

        engine
            .store()
            .flag_for_review(&code, "AMOUNT_MISMATCH: reported 1, expected 3000000")
            .await
            .unwrap();
        assert_eq!(admin.review_queue().await.unwrap().len(), 1);

        assert!(admin.resolve_review(&code, 7, Some("payer refunded")).await.unwrap());
        assert!(admin.review_queue().await.unwrap().is_empty());
        // Already resolved
        assert!(!admin.resolve_review(&code, 7, None).await.unwrap());

        let history = admin.history(&code).await.unwrap();
        assert_eq!(history.status, DepositStatus::Pending);
        assert_eq!(history.entries.len(), 1);
        let entry = &history.entries[0];
        assert_eq!(entry.event, crate::deposit::types::REVIEW_RESOLVED);
        assert_eq!(entry.actor, Some(7));
        assert_eq!(entry.from, entry.to);
        assert_eq!(
            entry.note.as_deref(),
            Some("AMOUNT_MISMATCH: reported 1, expected 3000000 | payer refunded")
        );
    }
}
