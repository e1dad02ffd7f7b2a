//! Idempotency ledger backed by the `disassemble_operation` table.
//!
//! Writes go straight to the pool, outside any business transaction: a
//! `pending` entry must be visible to concurrent callers the moment it is
//! inserted, and a `failed` entry must survive the rollback it reports.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use tracing::{debug, info};

use tenon_core::{
    DisassembleOperation, DisassembleResult, Error, LedgerBegin, OperationLedger,
    OperationStatus, Result,
};

/// PostgreSQL implementation of OperationLedger.
#[derive(Clone)]
pub struct PgOperationLedger {
    pool: Pool<Postgres>,
}

impl PgOperationLedger {
    /// Create a new PgOperationLedger with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_operation_row(row: PgRow) -> Result<DisassembleOperation> {
        let status: String = row.get("status");
        let result: Option<serde_json::Value> = row.get("result");
        Ok(DisassembleOperation {
            token: row.get("token"),
            asset_id: row.get("asset_id"),
            tenant_id: row.get("tenant_id"),
            actor_id: row.get("actor_id"),
            status: status.parse::<OperationStatus>()?,
            created_at: row.get("created_at"),
            completed_at: row.get("completed_at"),
            result: result.map(serde_json::from_value).transpose()?,
            error_message: row.get("error_message"),
        })
    }

    async fn fetch(&self, token: &str) -> Result<Option<DisassembleOperation>> {
        let row = sqlx::query(
            r#"
            SELECT token, asset_id, tenant_id, actor_id, status, created_at,
                   completed_at, result, error_message
            FROM disassemble_operation
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_operation_row).transpose()
    }

    /// Move a `failed` entry back to `pending` for a new attempt.
    ///
    /// Returns false if another caller reclaimed it first.
    async fn reclaim_failed(&self, token: &str, actor_id: i64) -> Result<bool> {
        let reclaimed = sqlx::query(
            r#"
            UPDATE disassemble_operation
            SET status = 'pending', actor_id = $2, error_message = NULL,
                completed_at = NULL, created_at = NOW()
            WHERE token = $1 AND status = 'failed'
            "#,
        )
        .bind(token)
        .bind(actor_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?
        .rows_affected();
        Ok(reclaimed == 1)
    }
}

#[async_trait]
impl OperationLedger for PgOperationLedger {
    async fn begin(
        &self,
        token: &str,
        asset_id: i64,
        tenant_id: i64,
        actor_id: i64,
    ) -> Result<LedgerBegin> {
        // Check-and-insert in one statement: of two simultaneous callers,
        // exactly one sees a row inserted.
        let inserted = sqlx::query(
            r#"
            INSERT INTO disassemble_operation (token, asset_id, tenant_id, actor_id, status)
            VALUES ($1, $2, $3, $4, 'pending')
            ON CONFLICT (token) DO NOTHING
            "#,
        )
        .bind(token)
        .bind(asset_id)
        .bind(tenant_id)
        .bind(actor_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        if inserted == 1 {
            debug!(
                subsystem = "db",
                component = "ledger",
                op = "begin",
                operation_token = token,
                "Ledger entry created"
            );
            return Ok(LedgerBegin::Fresh);
        }

        let existing = self.fetch(token).await?.ok_or_else(|| {
            Error::Internal(format!("ledger entry {} vanished after conflict", token))
        })?;

        if existing.tenant_id != tenant_id || existing.asset_id != asset_id {
            return Err(Error::InvalidInput(format!(
                "operation token {} was already used for a different request",
                token
            )));
        }

        match existing.status {
            OperationStatus::Completed => {
                let result = existing.result.ok_or_else(|| {
                    Error::Internal(format!("completed ledger entry {} has no result", token))
                })?;
                Ok(LedgerBegin::AlreadyCompleted(result))
            }
            OperationStatus::Pending => Ok(LedgerBegin::AlreadyPending),
            OperationStatus::Failed => {
                if self.reclaim_failed(token, actor_id).await? {
                    info!(
                        subsystem = "db",
                        component = "ledger",
                        op = "begin",
                        operation_token = token,
                        "Retrying previously failed operation"
                    );
                    Ok(LedgerBegin::Fresh)
                } else {
                    Ok(LedgerBegin::AlreadyPending)
                }
            }
        }
    }

    async fn complete(&self, token: &str, result: &DisassembleResult) -> Result<()> {
        let payload = serde_json::to_value(result)?;
        sqlx::query(
            r#"
            UPDATE disassemble_operation
            SET status = 'completed', result = $2, completed_at = NOW()
            WHERE token = $1 AND status = 'pending'
            "#,
        )
        .bind(token)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail(&self, token: &str, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE disassemble_operation
            SET status = 'failed', error_message = $2, completed_at = NOW()
            WHERE token = $1 AND status = 'pending'
            "#,
        )
        .bind(token)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, token: &str, tenant_id: i64) -> Result<Option<DisassembleOperation>> {
        Ok(self
            .fetch(token)
            .await?
            .filter(|op| op.tenant_id == tenant_id))
    }
}
