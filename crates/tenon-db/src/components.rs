//! Component repository implementation.
//!
//! Components are flat rows keyed by id with a parent pointer. Bulk
//! structural changes take explicit id lists resolved under the
//! disassembly lock; nothing here walks the tree on its own.

use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};

use tenon_core::{Component, CreateComponentRequest, Error, Result};

const COMPONENT_COLUMNS: &str = "id, tenant_id, asset_id, parent_id, name, code, description, \
     criticality, is_safety_critical";

/// PostgreSQL repository for components.
#[derive(Clone)]
pub struct PgComponentRepository {
    pool: Pool<Postgres>,
}

impl PgComponentRepository {
    /// Create a new PgComponentRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_component_row(row: PgRow) -> Component {
        Component {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            asset_id: row.get("asset_id"),
            parent_id: row.get("parent_id"),
            name: row.get("name"),
            code: row.get("code"),
            description: row.get("description"),
            criticality: row.get("criticality"),
            is_safety_critical: row.get("is_safety_critical"),
        }
    }

    /// Create a component through normal CRUD.
    pub async fn create(&self, req: CreateComponentRequest) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO component (tenant_id, asset_id, parent_id, name, code, description,
                                   criticality, is_safety_critical)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(req.tenant_id)
        .bind(req.asset_id)
        .bind(req.parent_id)
        .bind(&req.name)
        .bind(&req.code)
        .bind(&req.description)
        .bind(&req.criticality)
        .bind(req.is_safety_critical)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    /// Fetch a component by id.
    pub async fn get(&self, id: i64) -> Result<Option<Component>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM component WHERE id = $1",
            COMPONENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_component_row))
    }

    /// List the components owned by an asset, ordered by id.
    pub async fn list_by_asset(&self, asset_id: i64) -> Result<Vec<Component>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM component WHERE asset_id = $1 ORDER BY id",
            COMPONENT_COLUMNS
        ))
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_component_row).collect())
    }

    /// Count the components owned by an asset.
    pub async fn count_by_asset(&self, asset_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM component WHERE asset_id = $1")
            .bind(asset_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(count)
    }
}

/// Transaction-aware variants used by the disassembly engine.
impl PgComponentRepository {
    /// Fetch a component by id within an existing transaction.
    pub async fn get_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
    ) -> Result<Option<Component>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM component WHERE id = $1",
            COMPONENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_component_row))
    }

    /// Re-root a subtree under a new asset.
    ///
    /// Every id in `subtree_ids` moves to `asset_id`; only `root_id` loses its
    /// parent. Links between the other nodes are left as they are.
    pub async fn reroot_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        root_id: i64,
        subtree_ids: &[i64],
        asset_id: i64,
    ) -> Result<u64> {
        let now = Utc::now();
        let moved = sqlx::query(
            "UPDATE component SET asset_id = $1, updated_at = $2 WHERE id = ANY($3)",
        )
        .bind(asset_id)
        .bind(now)
        .bind(subtree_ids)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        sqlx::query("UPDATE component SET parent_id = NULL, updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(root_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        Ok(moved)
    }

    /// Remove asset ownership from a subtree.
    ///
    /// `root_id` is cut loose from its former parent, which stays with the
    /// asset. Links between nodes inside the subtree are left untouched.
    pub async fn orphan_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        root_id: i64,
        subtree_ids: &[i64],
    ) -> Result<u64> {
        let now = Utc::now();
        let orphaned =
            sqlx::query("UPDATE component SET asset_id = NULL, updated_at = $1 WHERE id = ANY($2)")
                .bind(now)
                .bind(subtree_ids)
                .execute(&mut **tx)
                .await
                .map_err(Error::Database)?
                .rows_affected();

        sqlx::query("UPDATE component SET parent_id = NULL, updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(root_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        Ok(orphaned)
    }

    /// Orphan every node still owned by `asset_id`.
    pub async fn orphan_all_for_asset_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        asset_id: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE component SET asset_id = NULL, updated_at = $1 WHERE asset_id = $2",
        )
        .bind(Utc::now())
        .bind(asset_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    /// Cut parent links from nodes outside `subtree_ids` into the subtree.
    ///
    /// Such nodes belong to another asset or to no asset; they survive the
    /// subtree as roots of their own.
    pub async fn detach_outside_children_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        subtree_ids: &[i64],
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE component SET parent_id = NULL, updated_at = $1 \
             WHERE parent_id = ANY($2) AND NOT (id = ANY($2))",
        )
        .bind(Utc::now())
        .bind(subtree_ids)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    /// Delete component rows level by level.
    ///
    /// `levels` must be ordered deepest first with the subtree root last, so
    /// no statement removes a row that another surviving row points at.
    pub async fn delete_levels_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        levels: &[Vec<i64>],
    ) -> Result<u64> {
        let mut deleted = 0;
        for level in levels {
            deleted += sqlx::query("DELETE FROM component WHERE id = ANY($1)")
                .bind(level.as_slice())
                .execute(&mut **tx)
                .await
                .map_err(Error::Database)?
                .rows_affected();
        }
        Ok(deleted)
    }
}
