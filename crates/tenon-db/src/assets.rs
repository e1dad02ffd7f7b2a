//! Asset repository implementation.

use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};

use tenon_core::{Asset, AssetStatus, Component, CreateAssetRequest, Error, Placement, Result};

const ASSET_COLUMNS: &str = "id, tenant_id, name, code, status, area_id, sector_id, zone_id, \
     criticality_score, risk_score, derived_from_component_id, origin_asset_id, promoted_at, \
     created_at, updated_at";

/// PostgreSQL repository for assets.
#[derive(Clone)]
pub struct PgAssetRepository {
    pool: Pool<Postgres>,
}

impl PgAssetRepository {
    /// Create a new PgAssetRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_asset_row(row: PgRow) -> Result<Asset> {
        let status: String = row.get("status");
        Ok(Asset {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            name: row.get("name"),
            code: row.get("code"),
            status: status.parse::<AssetStatus>()?,
            placement: Placement {
                area_id: row.get("area_id"),
                sector_id: row.get("sector_id"),
                zone_id: row.get("zone_id"),
            },
            criticality_score: row.get("criticality_score"),
            risk_score: row.get("risk_score"),
            derived_from_component_id: row.get("derived_from_component_id"),
            origin_asset_id: row.get("origin_asset_id"),
            promoted_at: row.get("promoted_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    /// Create an asset through normal CRUD.
    pub async fn create(&self, req: CreateAssetRequest) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO asset (tenant_id, name, code, area_id, sector_id, zone_id,
                               criticality_score, risk_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(req.tenant_id)
        .bind(&req.name)
        .bind(&req.code)
        .bind(req.placement.area_id)
        .bind(req.placement.sector_id)
        .bind(req.placement.zone_id)
        .bind(req.criticality_score)
        .bind(req.risk_score)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    /// Fetch an asset by id.
    pub async fn get(&self, id: i64) -> Result<Option<Asset>> {
        let row = sqlx::query(&format!("SELECT {} FROM asset WHERE id = $1", ASSET_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(Self::parse_asset_row).transpose()
    }
}

/// Transaction-aware variants used by the disassembly engine.
impl PgAssetRepository {
    /// Load an asset and take its row lock for the rest of the transaction.
    pub async fn get_for_update_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> Result<Option<Asset>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM asset WHERE id = $1 FOR UPDATE",
            ASSET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_asset_row).transpose()
    }

    /// Create the asset a promoted subtree is re-rooted under.
    ///
    /// Inherits placement and criticality scores from `origin`, never its
    /// identity, and records provenance back to the source component.
    pub async fn create_promoted_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        origin: &Asset,
        source: &Component,
        name: &str,
    ) -> Result<i64> {
        let now = Utc::now();
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO asset (tenant_id, name, code, status, area_id, sector_id, zone_id,
                               criticality_score, risk_score, derived_from_component_id,
                               origin_asset_id, promoted_at, created_at, updated_at)
            VALUES ($1, $2, $3, 'ACTIVE', $4, $5, $6, $7, $8, $9, $10, $11, $11, $11)
            RETURNING id
            "#,
        )
        .bind(origin.tenant_id)
        .bind(name)
        .bind(&source.code)
        .bind(origin.placement.area_id)
        .bind(origin.placement.sector_id)
        .bind(origin.placement.zone_id)
        .bind(origin.criticality_score)
        .bind(origin.risk_score)
        .bind(source.id)
        .bind(origin.id)
        .bind(now)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    /// Soft-dispose: the asset persists with status DECOMMISSIONED.
    pub async fn decommission_tx(&self, tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<()> {
        sqlx::query("UPDATE asset SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(AssetStatus::Decommissioned.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Hard-delete the asset row. Dependents must already be gone.
    pub async fn delete_tx(&self, tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM asset WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
