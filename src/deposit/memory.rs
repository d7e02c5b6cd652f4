//! In-memory Transaction Store
//!
//! Used by tests and by development runs without `postgres_url`. State is
//! lost on restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::error::DepositError;
use super::state::DepositStatus;
use super::store::{DepositStore, InsertOutcome};
use super::types::{
    ContractCode, DepositTransaction, IgnoredEvent, StatusHistoryEntry, Transition,
};

#[derive(Default)]
struct Inner {
    records: HashMap<ContractCode, DepositTransaction>,
    ignored: Vec<IgnoredEvent>,
}

#[derive(Default)]
pub struct MemoryDepositStore {
    inner: RwLock<Inner>,
}

impl MemoryDepositStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}

#[async_trait]
impl DepositStore for MemoryDepositStore {
    async fn insert(&self, record: &DepositTransaction) -> Result<InsertOutcome, DepositError> {
        let mut inner = self.inner.write().await;

        if inner.records.contains_key(&record.contract_code) {
            return Ok(InsertOutcome::DuplicateCode);
        }

        let active_exists = inner.records.values().any(|r| {
            r.property_id == record.property_id
                && r.tenant_id == record.tenant_id
                && r.status.is_active()
        });
        if active_exists {
            return Ok(InsertOutcome::ActiveExists);
        }

        inner
            .records
            .insert(record.contract_code.clone(), record.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get(&self, code: &ContractCode) -> Result<Option<DepositTransaction>, DepositError> {
        Ok(self.inner.read().await.records.get(code).cloned())
    }

    async fn apply_transition(
        &self,
        code: &ContractCode,
        transition: &Transition,
    ) -> Result<bool, DepositError> {
        let mut inner = self.inner.write().await;
        let Some(record) = inner.records.get_mut(code) else {
            return Err(DepositError::NotFound(code.to_string()));
        };

        if record.status != transition.expected {
            return Ok(false);
        }

        record.status = transition.next;
        if record.paid_at.is_none() {
            record.paid_at = transition.paid_at;
        }
        if record.gateway_reference.is_none() {
            record.gateway_reference = transition.gateway_reference.clone();
        }
        record.last_event_source = Some(transition.source);
        record.status_history.push(transition.entry.clone());
        Ok(true)
    }

    async fn flag_for_review(
        &self,
        code: &ContractCode,
        reason: &str,
    ) -> Result<(), DepositError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .get_mut(code)
            .ok_or_else(|| DepositError::NotFound(code.to_string()))?;
        record.needs_review = true;
        record.review_reason = Some(reason.to_string());
        Ok(())
    }

    async fn record_ignored(&self, event: &IgnoredEvent) -> Result<(), DepositError> {
        self.inner.write().await.ignored.push(event.clone());
        Ok(())
    }

    async fn ignored_events(&self, code: &ContractCode) -> Result<Vec<IgnoredEvent>, DepositError> {
        let inner = self.inner.read().await;
        Ok(inner
            .ignored
            .iter()
            .filter(|e| &e.contract_code == code)
            .cloned()
            .collect())
    }

    async fn find_sweepable(
        &self,
        now: DateTime<Utc>,
        waiting_grace: chrono::Duration,
        limit: usize,
    ) -> Result<Vec<ContractCode>, DepositError> {
        let inner = self.inner.read().await;
        let mut due: Vec<&DepositTransaction> = inner
            .records
            .values()
            .filter(|r| r.status.is_active() && r.sweep_deadline(waiting_grace) < now)
            .collect();
        due.sort_by_key(|r| r.expires_at);
        Ok(due
            .into_iter()
            .take(limit)
            .map(|r| r.contract_code.clone())
            .collect())
    }

    async fn review_queue(&self, limit: usize) -> Result<Vec<DepositTransaction>, DepositError> {
        let inner = self.inner.read().await;
        let mut queue: Vec<&DepositTransaction> = inner
            .records
            .values()
            .filter(|r| {
                !r.archived && (r.status == DepositStatus::WaitingConfirmation || r.needs_review)
            })
            .collect();
        // Waiting transfers first, then flagged records; oldest first within each
        queue.sort_by_key(|r| (r.status != DepositStatus::WaitingConfirmation, r.created_at));
        Ok(queue.into_iter().take(limit).cloned().collect())
    }

    async fn resolve_review(
        &self,
        code: &ContractCode,
        entry: &StatusHistoryEntry,
    ) -> Result<bool, DepositError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .get_mut(code)
            .ok_or_else(|| DepositError::NotFound(code.to_string()))?;
        if !record.needs_review {
            return Ok(false);
        }
        record.needs_review = false;
        record.review_reason = None;
        record.status_history.push(entry.clone());
        Ok(true)
    }

    async fn archive(&self, code: &ContractCode) -> Result<bool, DepositError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .records
            .get_mut(code)
            .ok_or_else(|| DepositError::NotFound(code.to_string()))?;
        if !record.status.is_terminal() || record.status == DepositStatus::Paid || record.archived
        {
            return Ok(false);
        }
        record.archived = true;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deposit::state::PaymentMethod;
    use crate::deposit::types::{DepositEvent, EventSource, NewDeposit, StatusHistoryEntry};
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn record(property_id: i64, tenant_id: i64) -> DepositTransaction {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap();
        let req = NewDeposit {
            property_id,
            tenant_id,
            landlord_id: 9,
            amount: Decimal::from(2_000_000),
            payment_method: PaymentMethod::GatewayA,
        };
        DepositTransaction::new(
            ContractCode::generate(now),
            &req,
            "hash".into(),
            now,
            chrono::Duration::minutes(30),
        )
    }

    fn cancel(from: DepositStatus) -> Transition {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 8, 5, 0).unwrap();
        let source = EventSource::Admin(1);
        Transition {
            expected: from,
            next: DepositStatus::Cancelled,
            paid_at: None,
            gateway_reference: None,
            source,
            entry: StatusHistoryEntry::new(
                source,
                &DepositEvent::AdminCancelled,
                from,
                DepositStatus::Cancelled,
                at,
            ),
        }
    }

    #[tokio::test]
    async fn test_insert_enforces_single_active_per_pair() {
        let store = MemoryDepositStore::new();
        let first = record(1, 2);
        assert_eq!(store.insert(&first).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(
            store.insert(&record(1, 2)).await.unwrap(),
            InsertOutcome::ActiveExists
        );
        // Other tenant on the same property is fine
        assert_eq!(
            store.insert(&record(1, 3)).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            store.insert(&first).await.unwrap(),
            InsertOutcome::DuplicateCode
        );

        // Once terminal, a new attempt is allowed
        let code = first.contract_code.clone();
        assert!(
            store
                .apply_transition(&code, &cancel(DepositStatus::Pending))
                .await
                .unwrap()
        );
        assert_eq!(
            store.insert(&record(1, 2)).await.unwrap(),
            InsertOutcome::Inserted
        );
    }

    #[tokio::test]
    async fn test_apply_transition_is_compare_and_set() {
        let store = MemoryDepositStore::new();
        let r = record(1, 2);
        store.insert(&r).await.unwrap();

        let t = cancel(DepositStatus::WaitingConfirmation);
        assert!(!store.apply_transition(&r.contract_code, &t).await.unwrap());

        let stored = store.get(&r.contract_code).await.unwrap().unwrap();
        assert_eq!(stored.status, DepositStatus::Pending);
        assert!(stored.status_history.is_empty());
    }

    #[tokio::test]
    async fn test_archive_only_terminal_unpaid() {
        let store = MemoryDepositStore::new();
        let r = record(1, 2);
        store.insert(&r).await.unwrap();
        assert!(!store.archive(&r.contract_code).await.unwrap());

        store
            .apply_transition(&r.contract_code, &cancel(DepositStatus::Pending))
            .await
            .unwrap();
        assert!(store.archive(&r.contract_code).await.unwrap());
        assert!(!store.archive(&r.contract_code).await.unwrap());
    }
}
