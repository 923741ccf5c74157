//! PostgreSQL repository adapter.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction as DbTx};

use paycore_types::{
    ErrorLog, FeeSplit, IntentStatus, NewPaymentIntent, NewPendingEvent, NewPendingTransfer,
    NewReceivedEvent, NewTransfer, OutboxEvent, OutboxEventId, OutboxMutation, OutboxStatus,
    PaymentIntent, PaymentStore, PendingEvent, PendingTransfer, PurchaseId, ReceivedEvent,
    RepoError, Transfer, TransferRemainder,
};

use crate::types::{
    DbErrorLog, DbOutboxEvent, DbPaymentIntent, DbPendingEvent, DbPendingTransfer,
    DbReceivedEvent, DbTransfer, DbTransferRemainder,
};

const INTENT_COLUMNS: &str =
    "external_intent_id, origin, status, currency, origin_amount, created_at, last_update";

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository; every mutation runs in its own transaction.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_payment_tables_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_outbox_events_pg.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

fn db_err(e: sqlx::Error) -> RepoError {
    RepoError::Database(e.to_string())
}

fn tx_err(e: sqlx::Error) -> RepoError {
    RepoError::Transaction(e.to_string())
}

impl PostgresRepo {
    /// Connects (10 s acquire deadline) and applies migrations.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> Result<DbTx<'static, Postgres>, RepoError> {
        self.pool.begin().await.map_err(tx_err)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Statement helpers shared by standalone and outbox-wrapped mutations
// ─────────────────────────────────────────────────────────────────────────────

async fn insert_intent(tx: &mut DbTx<'_, Postgres>, intent: &NewPaymentIntent) -> Result<(), RepoError> {
    let now = Utc::now();
    sqlx::query(
        r#"INSERT INTO payment_intents (external_intent_id, origin, status, currency, origin_amount, created_at, last_update)
           VALUES ($1, $2, $3, $4, $5, $6, $6)
           ON CONFLICT (external_intent_id) DO NOTHING"#,
    )
    .bind(&intent.external_intent_id)
    .bind(intent.origin.as_str())
    .bind(intent.status.as_str())
    .bind(intent.currency.as_str())
    .bind(intent.origin_amount)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn update_intent_status(
    tx: &mut DbTx<'_, Postgres>,
    external_intent_id: &str,
    status: IntentStatus,
) -> Result<PaymentIntent, RepoError> {
    let row: Option<DbPaymentIntent> = sqlx::query_as(&format!(
        "UPDATE payment_intents SET status = $1, last_update = $2 WHERE external_intent_id = $3 RETURNING {}",
        INTENT_COLUMNS
    ))
    .bind(status.as_str())
    .bind(Utc::now())
    .bind(external_intent_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_err)?;

    row.ok_or(RepoError::NotFound)?.into_domain()
}

async fn insert_transfer_pair(
    tx: &mut DbTx<'_, Postgres>,
    transfer: &NewTransfer,
    split: &FeeSplit,
) -> Result<(), RepoError> {
    let now = Utc::now();
    sqlx::query(
        r#"INSERT INTO transfers (external_transfer_id, origin, destination, destination_account, currency, amount, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7)
           ON CONFLICT (external_transfer_id) DO NOTHING"#,
    )
    .bind(&transfer.external_transfer_id)
    .bind(transfer.origin.as_str())
    .bind(transfer.destination.as_str())
    .bind(&transfer.destination_account)
    .bind(transfer.currency.as_str())
    .bind(transfer.amount)
    .bind(now)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;

    let remainder = TransferRemainder::for_transfer(transfer, split, now);
    sqlx::query(
        r#"INSERT INTO transfer_remainders
             (transfer_id, destination, destination_account, currency, total_value, fee_value,
              transferred_value, fee_remainder, transferred_remainder, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
           ON CONFLICT (transfer_id) DO NOTHING"#,
    )
    .bind(&remainder.transfer_id)
    .bind(remainder.destination.as_str())
    .bind(&remainder.destination_account)
    .bind(remainder.currency.as_str())
    .bind(remainder.total_value)
    .bind(remainder.fee_value)
    .bind(remainder.transferred_value)
    .bind(remainder.fee_remainder)
    .bind(remainder.transferred_remainder)
    .bind(remainder.created_at)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PaymentStore for PostgresRepo {
    async fn create_payment_intent(&self, intent: NewPaymentIntent) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;
        insert_intent(&mut tx, &intent).await?;
        tx.commit().await.map_err(tx_err)
    }

    async fn get_payment_intent(&self, external_intent_id: &str) -> Result<PaymentIntent, RepoError> {
        let row: Option<DbPaymentIntent> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_intents WHERE external_intent_id = $1",
            INTENT_COLUMNS
        ))
        .bind(external_intent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.ok_or(RepoError::NotFound)?.into_domain()
    }

    async fn update_payment_intent_status(
        &self,
        external_intent_id: &str,
        status: IntentStatus,
    ) -> Result<PaymentIntent, RepoError> {
        let mut tx = self.begin().await?;
        let intent = update_intent_status(&mut tx, external_intent_id, status).await?;
        tx.commit().await.map_err(tx_err)?;
        Ok(intent)
    }

    async fn successful_payment_intents_by_origin(
        &self,
        origin: &PurchaseId,
    ) -> Result<Vec<PaymentIntent>, RepoError> {
        let rows: Vec<DbPaymentIntent> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_intents WHERE origin = $1 AND status = $2 ORDER BY created_at ASC",
            INTENT_COLUMNS
        ))
        .bind(origin.as_str())
        .bind(IntentStatus::Succeeded.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(DbPaymentIntent::into_domain).collect()
    }

    async fn payment_intents_by_origin(
        &self,
        origin: &PurchaseId,
    ) -> Result<Vec<PaymentIntent>, RepoError> {
        let rows: Vec<DbPaymentIntent> = sqlx::query_as(&format!(
            "SELECT {} FROM payment_intents WHERE origin = $1 ORDER BY created_at ASC",
            INTENT_COLUMNS
        ))
        .bind(origin.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(DbPaymentIntent::into_domain).collect()
    }

    async fn create_transfer(&self, transfer: NewTransfer, split: FeeSplit) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;
        insert_transfer_pair(&mut tx, &transfer, &split).await?;
        tx.commit().await.map_err(tx_err)
    }

    async fn transfers_by_origin(&self, origin: &PurchaseId) -> Result<Vec<Transfer>, RepoError> {
        let rows: Vec<DbTransfer> = sqlx::query_as(
            r#"SELECT external_transfer_id, origin, destination, destination_account, currency, amount, created_at
               FROM transfers WHERE origin = $1 ORDER BY created_at ASC"#,
        )
        .bind(origin.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(DbTransfer::into_domain).collect()
    }

    async fn transfer_remainder(&self, transfer_id: &str) -> Result<TransferRemainder, RepoError> {
        let row: Option<DbTransferRemainder> = sqlx::query_as(
            r#"SELECT transfer_id, destination, destination_account, currency, total_value, fee_value,
                      transferred_value, fee_remainder, transferred_remainder, created_at
               FROM transfer_remainders WHERE transfer_id = $1"#,
        )
        .bind(transfer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.ok_or(RepoError::NotFound)?.into_domain()
    }

    async fn get_received_event(&self, event_id: &str) -> Result<ReceivedEvent, RepoError> {
        let row: Option<DbReceivedEvent> = sqlx::query_as(
            r#"SELECT event_id, idempotency_key, event_type, is_handled, created_at
               FROM received_events WHERE event_id = $1"#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(ReceivedEvent::from).ok_or(RepoError::NotFound)
    }

    async fn create_received_event(&self, event: NewReceivedEvent) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;
        let inserted: Option<(String,)> = sqlx::query_as(
            r#"INSERT INTO received_events (event_id, idempotency_key, event_type, is_handled, created_at)
               VALUES ($1, $2, $3, FALSE, $4)
               ON CONFLICT (event_id) DO NOTHING
               RETURNING event_id"#,
        )
        .bind(&event.event_id)
        .bind(&event.idempotency_key)
        .bind(&event.event_type)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(tx_err)?;

        match inserted {
            Some(_) => Ok(()),
            None => Err(RepoError::Conflict(format!(
                "event {} already received",
                event.event_id
            ))),
        }
    }

    async fn mark_event_handled(&self, event_id: &str) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query(r#"UPDATE received_events SET is_handled = TRUE WHERE event_id = $1"#)
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        tx.commit().await.map_err(tx_err)
    }

    async fn create_pending_event(&self, event: NewPendingEvent) -> Result<(), RepoError> {
        let now = Utc::now();
        let mut tx = self.begin().await?;
        sqlx::query(
            r#"INSERT INTO pending_events (event_id, intent_id, reason, attempts, last_update, created_at)
               VALUES ($1, $2, $3, 0, $4, $4)
               ON CONFLICT (event_id) DO NOTHING"#,
        )
        .bind(&event.event_id)
        .bind(&event.intent_id)
        .bind(&event.reason)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(tx_err)
    }

    async fn get_pending_event(&self, event_id: &str) -> Result<PendingEvent, RepoError> {
        let row: Option<DbPendingEvent> = sqlx::query_as(
            r#"SELECT event_id, intent_id, reason, attempts, last_update, created_at
               FROM pending_events WHERE event_id = $1"#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(PendingEvent::from).ok_or(RepoError::NotFound)
    }

    async fn list_pending_events(&self) -> Result<Vec<PendingEvent>, RepoError> {
        let rows: Vec<DbPendingEvent> = sqlx::query_as(
            r#"SELECT event_id, intent_id, reason, attempts, last_update, created_at
               FROM pending_events ORDER BY created_at ASC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(PendingEvent::from).collect())
    }

    async fn record_pending_event_attempt(&self, event_id: &str, reason: &str) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query(
            r#"UPDATE pending_events SET attempts = attempts + 1, reason = $1, last_update = $2
               WHERE event_id = $3"#,
        )
        .bind(reason)
        .bind(Utc::now())
        .bind(event_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        tx.commit().await.map_err(tx_err)
    }

    async fn delete_pending_event(&self, event_id: &str) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;
        sqlx::query(r#"DELETE FROM pending_events WHERE event_id = $1"#)
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(tx_err)
    }

    async fn create_pending_transfer(&self, transfer: NewPendingTransfer) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;
        sqlx::query(
            r#"INSERT INTO pending_transfers
                 (origin, leg, destination, currency, source_transaction, total_value, fee_value,
                  transferred_value, fee_remainder, transferred_remainder, reason, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
               ON CONFLICT (origin, leg, currency) DO NOTHING"#,
        )
        .bind(transfer.origin.as_str())
        .bind(&transfer.leg)
        .bind(transfer.destination.as_str())
        .bind(transfer.currency.as_str())
        .bind(&transfer.source_transaction)
        .bind(transfer.split.total_value)
        .bind(transfer.split.fee_value)
        .bind(transfer.split.transferred_value)
        .bind(transfer.split.fee_remainder)
        .bind(transfer.split.transferred_remainder)
        .bind(&transfer.reason)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(tx_err)
    }

    async fn list_pending_transfers(&self) -> Result<Vec<PendingTransfer>, RepoError> {
        let rows: Vec<DbPendingTransfer> = sqlx::query_as(
            r#"SELECT id, origin, leg, destination, currency, source_transaction, total_value, fee_value,
                      transferred_value, fee_remainder, transferred_remainder, reason, created_at
               FROM pending_transfers ORDER BY id ASC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(DbPendingTransfer::into_domain).collect()
    }

    async fn complete_pending_transfer(&self, pending_id: i64, transfer: NewTransfer) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;

        // Lock the pending row so concurrent drains cannot both complete it
        let row: Option<DbPendingTransfer> = sqlx::query_as(
            r#"SELECT id, origin, leg, destination, currency, source_transaction, total_value, fee_value,
                      transferred_value, fee_remainder, transferred_remainder, reason, created_at
               FROM pending_transfers WHERE id = $1 FOR UPDATE"#,
        )
        .bind(pending_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let pending = row.ok_or(RepoError::NotFound)?.into_domain()?;
        insert_transfer_pair(&mut tx, &transfer, &pending.split).await?;

        sqlx::query(r#"DELETE FROM pending_transfers WHERE id = $1"#)
            .bind(pending_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(tx_err)
    }

    async fn create_error_log(&self, event_id: &str, error: &str) -> Result<(), RepoError> {
        sqlx::query(r#"INSERT INTO error_logs (event_id, error, created_at) VALUES ($1, $2, $3)"#)
            .bind(event_id)
            .bind(error)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn error_logs(&self, event_id: &str) -> Result<Vec<ErrorLog>, RepoError> {
        let rows: Vec<DbErrorLog> = sqlx::query_as(
            r#"SELECT event_id, error, created_at FROM error_logs WHERE event_id = $1 ORDER BY id ASC"#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(ErrorLog::from).collect())
    }

    async fn save_event(&self, event: OutboxEvent, mutation: OutboxMutation) -> Result<(), RepoError> {
        let mut tx = self.begin().await?;

        match &mutation {
            OutboxMutation::None => {}
            OutboxMutation::CreateIntent(intent) => insert_intent(&mut tx, intent).await?,
            OutboxMutation::UpdateIntentStatus {
                external_intent_id,
                status,
            } => {
                update_intent_status(&mut tx, external_intent_id, *status).await?;
            }
        }

        sqlx::query(
            r#"INSERT INTO outbox_events (id, label, payload, status, created_at, attempts)
               VALUES ($1, $2, $3, $4, $5, 0)"#,
        )
        .bind(event.id.into_uuid())
        .bind(event.label.as_ref())
        .bind(&event.payload)
        .bind(event.status.as_ref())
        .bind(event.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(tx_err)
    }

    async fn pending_outbox_events(&self, limit: i64) -> Result<Vec<OutboxEvent>, RepoError> {
        let rows: Vec<DbOutboxEvent> = sqlx::query_as(
            r#"
            SELECT id, label, payload, status, created_at, published_at, attempts, last_error
            FROM outbox_events
            WHERE status = 'PENDING'
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(DbOutboxEvent::into_domain).collect()
    }

    async fn update_outbox_status(
        &self,
        id: OutboxEventId,
        status: OutboxStatus,
        last_error: Option<String>,
    ) -> Result<(), RepoError> {
        let published_at = (status == OutboxStatus::Published).then(Utc::now);

        sqlx::query(
            r#"
            UPDATE outbox_events
            SET status = $1, published_at = COALESCE($2, published_at), last_error = $3, attempts = attempts + 1
            WHERE id = $4
            "#,
        )
        .bind(status.as_ref())
        .bind(published_at)
        .bind(last_error)
        .bind(id.into_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}
