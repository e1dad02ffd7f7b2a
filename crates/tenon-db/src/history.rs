//! History event repository. Events are append-only; the external audit
//! viewer reads them.

use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};

use tenon_core::{Error, HistoryEvent, NewHistoryEvent, Result};

const HISTORY_COLUMNS: &str =
    "id, tenant_id, asset_id, component_id, event_type, description, actor_id, payload, created_at";

/// PostgreSQL repository for history events.
#[derive(Clone)]
pub struct PgHistoryRepository {
    pool: Pool<Postgres>,
}

impl PgHistoryRepository {
    /// Create a new PgHistoryRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_history_row(row: PgRow) -> HistoryEvent {
        HistoryEvent {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            asset_id: row.get("asset_id"),
            component_id: row.get("component_id"),
            event_type: row.get("event_type"),
            description: row.get("description"),
            actor_id: row.get("actor_id"),
            payload: row.get("payload"),
            created_at: row.get("created_at"),
        }
    }

    /// List events recorded on an asset, oldest first.
    pub async fn list_by_asset(&self, asset_id: i64) -> Result<Vec<HistoryEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM history_event WHERE asset_id = $1 ORDER BY id",
            HISTORY_COLUMNS
        ))
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_history_row).collect())
    }

    /// List a tenant's events of one type, oldest first.
    pub async fn list_by_type(&self, tenant_id: i64, event_type: &str) -> Result<Vec<HistoryEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM history_event WHERE tenant_id = $1 AND event_type = $2 ORDER BY id",
            HISTORY_COLUMNS
        ))
        .bind(tenant_id)
        .bind(event_type)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_history_row).collect())
    }

    /// Append an event within an existing transaction.
    pub async fn record_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event: &NewHistoryEvent,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO history_event (tenant_id, asset_id, component_id, event_type,
                                       description, actor_id, payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(event.tenant_id)
        .bind(event.asset_id)
        .bind(event.component_id)
        .bind(event.event_type)
        .bind(&event.description)
        .bind(event.actor_id)
        .bind(&event.payload)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }
}
