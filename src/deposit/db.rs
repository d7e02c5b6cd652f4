//! PostgreSQL Transaction Store
//!
//! Status writes are atomic CAS updates (`WHERE status = $expected`), so
//! several service instances can share one database safely even though the
//! engine's per-contract lock is process-local.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use super::error::DepositError;
use super::state::{DepositStatus, PaymentMethod};
use super::store::{DepositStore, InsertOutcome};
use super::types::{
    ContractCode, DepositTransaction, EventSource, IgnoredEvent, StatusHistoryEntry, Transition,
};

const CONTRACT_CODE_CONSTRAINT: &str = "uq_deposit_contract_code";
const ACTIVE_PAIR_CONSTRAINT: &str = "uq_deposit_active_pair";

const SELECT_COLUMNS: &str = r#"
    contract_code, property_id, tenant_id, landlord_id, amount, payment_method,
    status, created_at, expires_at, paid_at, gateway_reference, token_hash,
    last_event_source, last_event_actor, needs_review, review_reason, archived
"#;

pub struct PgDepositStore {
    pool: PgPool,
}

impl PgDepositStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_history(
        &self,
        code: &ContractCode,
    ) -> Result<Vec<StatusHistoryEntry>, DepositError> {
        let rows = sqlx::query(
            r#"
            SELECT source, actor, event, from_status, to_status, note, at
            FROM deposit_status_history_tb
            WHERE contract_code = $1
            ORDER BY id ASC
            "#,
        )
        .bind(code.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_history).collect()
    }

    async fn with_history(
        &self,
        mut record: DepositTransaction,
    ) -> Result<DepositTransaction, DepositError> {
        record.status_history = self.load_history(&record.contract_code).await?;
        Ok(record)
    }
}

#[async_trait]
impl DepositStore for PgDepositStore {
    async fn insert(&self, record: &DepositTransaction) -> Result<InsertOutcome, DepositError> {
        let result = sqlx::query(
            r#"
            INSERT INTO deposit_transactions_tb
                (contract_code, property_id, tenant_id, landlord_id, amount, payment_method,
                 status, created_at, expires_at, token_hash, updated_at)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            "#,
        )
        .bind(record.contract_code.as_str())
        .bind(record.property_id)
        .bind(record.tenant_id)
        .bind(record.landlord_id)
        .bind(record.amount)
        .bind(record.payment_method.id())
        .bind(record.status.id())
        .bind(record.created_at)
        .bind(record.expires_at)
        .bind(&record.token_hash)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(sqlx::Error::Database(db_err)) => match db_err.constraint() {
                Some(CONTRACT_CODE_CONSTRAINT) => Ok(InsertOutcome::DuplicateCode),
                Some(ACTIVE_PAIR_CONSTRAINT) => Ok(InsertOutcome::ActiveExists),
                _ => Err(DepositError::Database(db_err.to_string())),
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, code: &ContractCode) -> Result<Option<DepositTransaction>, DepositError> {
        let sql = format!(
            "SELECT {} FROM deposit_transactions_tb WHERE contract_code = $1",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.with_history(row_to_record(&row)?).await?)),
            None => Ok(None),
        }
    }

    async fn apply_transition(
        &self,
        code: &ContractCode,
        transition: &Transition,
    ) -> Result<bool, DepositError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE deposit_transactions_tb
            SET status = $1,
                paid_at = COALESCE(paid_at, $2),
                gateway_reference = COALESCE(gateway_reference, $3),
                last_event_source = $4,
                last_event_actor = $5,
                updated_at = NOW()
            WHERE contract_code = $6 AND status = $7
            "#,
        )
        .bind(transition.next.id())
        .bind(transition.paid_at)
        .bind(&transition.gateway_reference)
        .bind(transition.source.as_str())
        .bind(transition.source.actor())
        .bind(code.as_str())
        .bind(transition.expected.id())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_history(&mut tx, code, &transition.entry).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn flag_for_review(
        &self,
        code: &ContractCode,
        reason: &str,
    ) -> Result<(), DepositError> {
        let result = sqlx::query(
            r#"
            UPDATE deposit_transactions_tb
            SET needs_review = TRUE, review_reason = $1, updated_at = NOW()
            WHERE contract_code = $2
            "#,
        )
        .bind(reason)
        .bind(code.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DepositError::NotFound(code.to_string()));
        }
        Ok(())
    }

    async fn record_ignored(&self, event: &IgnoredEvent) -> Result<(), DepositError> {
        sqlx::query(
            r#"
            INSERT INTO deposit_ignored_events_tb
                (contract_code, source, actor, event, status, reason, at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.contract_code.as_str())
        .bind(&event.source)
        .bind(event.actor)
        .bind(&event.event)
        .bind(event.status.id())
        .bind(&event.reason)
        .bind(event.at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ignored_events(&self, code: &ContractCode) -> Result<Vec<IgnoredEvent>, DepositError> {
        let rows = sqlx::query(
            r#"
            SELECT contract_code, source, actor, event, status, reason, at
            FROM deposit_ignored_events_tb
            WHERE contract_code = $1
            ORDER BY id ASC
            "#,
        )
        .bind(code.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let status_id: i16 = row.try_get("status")?;
                Ok(IgnoredEvent {
                    contract_code: parse_code(row)?,
                    source: row.try_get("source")?,
                    actor: row.try_get("actor")?,
                    event: row.try_get("event")?,
                    status: parse_status(status_id)?,
                    reason: row.try_get("reason")?,
                    at: row.try_get("at")?,
                })
            })
            .collect()
    }

    async fn find_sweepable(
        &self,
        now: DateTime<Utc>,
        waiting_grace: chrono::Duration,
        limit: usize,
    ) -> Result<Vec<ContractCode>, DepositError> {
        let rows = sqlx::query(
            r#"
            SELECT contract_code
            FROM deposit_transactions_tb
            WHERE (status = $1 AND expires_at < $3)
               OR (status = $2 AND expires_at < $4)
            ORDER BY expires_at ASC
            LIMIT $5
            "#,
        )
        .bind(DepositStatus::Pending.id())
        .bind(DepositStatus::WaitingConfirmation.id())
        .bind(now)
        .bind(now - waiting_grace)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(parse_code).collect()
    }

    async fn review_queue(&self, limit: usize) -> Result<Vec<DepositTransaction>, DepositError> {
        let sql = format!(
            r#"
            SELECT {} FROM deposit_transactions_tb
            WHERE archived = FALSE AND (status = $1 OR needs_review)
            ORDER BY (status = $1) DESC, created_at ASC
            LIMIT $2
            "#,
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(DepositStatus::WaitingConfirmation.id())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(self.with_history(row_to_record(&row)?).await?);
        }
        Ok(records)
    }

    async fn resolve_review(
        &self,
        code: &ContractCode,
        entry: &StatusHistoryEntry,
    ) -> Result<bool, DepositError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE deposit_transactions_tb
            SET needs_review = FALSE, review_reason = NULL, updated_at = NOW()
            WHERE contract_code = $1 AND needs_review
            "#,
        )
        .bind(code.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            let exists = sqlx::query("SELECT 1 FROM deposit_transactions_tb WHERE contract_code = $1")
                .bind(code.as_str())
                .fetch_optional(&self.pool)
                .await?
                .is_some();
            return if exists {
                Ok(false)
            } else {
                Err(DepositError::NotFound(code.to_string()))
            };
        }

        insert_history(&mut tx, code, entry).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn archive(&self, code: &ContractCode) -> Result<bool, DepositError> {
        let result = sqlx::query(
            r#"
            UPDATE deposit_transactions_tb
            SET archived = TRUE, updated_at = NOW()
            WHERE contract_code = $1 AND archived = FALSE AND status IN ($2, $3, $4)
            "#,
        )
        .bind(code.as_str())
        .bind(DepositStatus::Expired.id())
        .bind(DepositStatus::Cancelled.id())
        .bind(DepositStatus::Failed.id())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

async fn insert_history(
    tx: &mut Transaction<'_, Postgres>,
    code: &ContractCode,
    entry: &StatusHistoryEntry,
) -> Result<(), DepositError> {
    sqlx::query(
        r#"
        INSERT INTO deposit_status_history_tb
            (contract_code, source, actor, event, from_status, to_status, note, at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(code.as_str())
    .bind(&entry.source)
    .bind(entry.actor)
    .bind(&entry.event)
    .bind(entry.from.id())
    .bind(entry.to.id())
    .bind(&entry.note)
    .bind(entry.at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn parse_code(row: &PgRow) -> Result<ContractCode, DepositError> {
    let raw: String = row.try_get("contract_code")?;
    ContractCode::parse(&raw)
        .ok_or_else(|| DepositError::System(format!("Invalid contract_code in store: {}", raw)))
}

fn parse_status(id: i16) -> Result<DepositStatus, DepositError> {
    DepositStatus::from_id(id)
        .ok_or_else(|| DepositError::System(format!("Invalid status ID: {}", id)))
}

fn row_to_record(row: &PgRow) -> Result<DepositTransaction, DepositError> {
    let status_id: i16 = row.try_get("status")?;
    let method_id: i16 = row.try_get("payment_method")?;
    let payment_method = PaymentMethod::from_id(method_id)
        .ok_or_else(|| DepositError::System(format!("Invalid payment_method: {}", method_id)))?;

    let source: Option<String> = row.try_get("last_event_source")?;
    let actor: Option<i64> = row.try_get("last_event_actor")?;
    let last_event_source = source
        .as_deref()
        .and_then(|kind| EventSource::from_parts(kind, actor));

    Ok(DepositTransaction {
        contract_code: parse_code(row)?,
        property_id: row.try_get("property_id")?,
        tenant_id: row.try_get("tenant_id")?,
        landlord_id: row.try_get("landlord_id")?,
        amount: row.try_get("amount")?,
        payment_method,
        status: parse_status(status_id)?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        paid_at: row.try_get("paid_at")?,
        gateway_reference: row.try_get("gateway_reference")?,
        token_hash: row.try_get("token_hash")?,
        last_event_source,
        needs_review: row.try_get("needs_review")?,
        review_reason: row.try_get("review_reason")?,
        archived: row.try_get("archived")?,
        status_history: Vec::new(),
    })
}

fn row_to_history(row: &PgRow) -> Result<StatusHistoryEntry, DepositError> {
    let from_id: i16 = row.try_get("from_status")?;
    let to_id: i16 = row.try_get("to_status")?;
    Ok(StatusHistoryEntry {
        source: row.try_get("source")?,
        actor: row.try_get("actor")?,
        event: row.try_get("event")?,
        from: parse_status(from_id)?,
        to: parse_status(to_id)?,
        at: row.try_get("at")?,
        note: row.try_get("note")?,
    })
}
