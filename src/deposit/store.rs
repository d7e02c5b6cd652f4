//! Transaction Store
//!
//! Persistence seam for deposit transactions. The lifecycle engine is the
//! only caller of the mutating methods; every status write is a
//! compare-and-set on the expected current status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::DepositError;
use super::types::{
    ContractCode, DepositTransaction, IgnoredEvent, StatusHistoryEntry, Transition,
};

/// Result of inserting a new deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Contract code collision; caller regenerates and retries.
    DuplicateCode,
    /// Another Pending/WaitingConfirmation deposit exists for the same
    /// (property, tenant) pair.
    ActiveExists,
}

#[async_trait]
pub trait DepositStore: Send + Sync {
    /// Insert a new record. The active-pair check and the insert are atomic.
    async fn insert(&self, record: &DepositTransaction) -> Result<InsertOutcome, DepositError>;

    /// Load a record with its full status history.
    async fn get(&self, code: &ContractCode) -> Result<Option<DepositTransaction>, DepositError>;

    /// Apply a status change only if the stored status equals
    /// `transition.expected`. Writes status, `paid_at` (never overwriting an
    /// existing value), gateway reference, last event source and the history
    /// entry together.
    ///
    /// Returns false when the expected status did not match.
    async fn apply_transition(
        &self,
        code: &ContractCode,
        transition: &Transition,
    ) -> Result<bool, DepositError>;

    /// Mark for manual review without touching status.
    async fn flag_for_review(&self, code: &ContractCode, reason: &str)
    -> Result<(), DepositError>;

    /// Journal an event absorbed as a no-op.
    async fn record_ignored(&self, event: &IgnoredEvent) -> Result<(), DepositError>;

    async fn ignored_events(&self, code: &ContractCode) -> Result<Vec<IgnoredEvent>, DepositError>;

    /// Codes due for expiry: Pending with `expires_at < now`, and
    /// WaitingConfirmation with `expires_at + waiting_grace < now`.
    /// Oldest first, at most `limit`.
    async fn find_sweepable(
        &self,
        now: DateTime<Utc>,
        waiting_grace: chrono::Duration,
        limit: usize,
    ) -> Result<Vec<ContractCode>, DepositError>;

    /// WaitingConfirmation deposits first, then anything else flagged for
    /// review; oldest first within each group, archived ones excluded.
    async fn review_queue(&self, limit: usize) -> Result<Vec<DepositTransaction>, DepositError>;

    /// Clear the review flag and append `entry` to the history. Returns
    /// false when the record was not flagged.
    async fn resolve_review(
        &self,
        code: &ContractCode,
        entry: &StatusHistoryEntry,
    ) -> Result<bool, DepositError>;

    /// Soft-mark a terminal, non-paid deposit. Returns false if the record
    /// is not eligible or already archived.
    async fn archive(&self, code: &ContractCode) -> Result<bool, DepositError>;
}
