//! Document repository: generic attachments and preventive-maintenance
//! template rows.

use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};

use tenon_core::defaults::PREVENTIVE_TEMPLATE_KIND;
use tenon_core::{Document, Error, Result};

const DOCUMENT_COLUMNS: &str =
    "id, tenant_id, asset_id, component_id, kind, name, storage_path, content_type, content";

/// PostgreSQL repository for documents.
#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: Pool<Postgres>,
}

impl PgDocumentRepository {
    /// Create a new PgDocumentRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_document_row(row: PgRow) -> Document {
        Document {
            id: row.get("id"),
            tenant_id: row.get("tenant_id"),
            asset_id: row.get("asset_id"),
            component_id: row.get("component_id"),
            kind: row.get("kind"),
            name: row.get("name"),
            storage_path: row.get("storage_path"),
            content_type: row.get("content_type"),
            content: row.get("content"),
        }
    }

    /// Fetch a document by id.
    pub async fn get(&self, id: i64) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM document WHERE id = $1",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_document_row))
    }

    /// List documents attached to an asset, ordered by id.
    pub async fn list_by_asset(&self, asset_id: i64) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM document WHERE asset_id = $1 ORDER BY id",
            DOCUMENT_COLUMNS
        ))
        .bind(asset_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_document_row).collect())
    }
}

/// Transaction-aware variants used by the disassembly engine.
impl PgDocumentRepository {
    /// Copy documents scoped to `component_ids` onto `asset_id`.
    ///
    /// Copies keep the component reference and point at the same stored
    /// content. The source rows stay with their asset as asset-level
    /// documents. Returns the number of copies created.
    pub async fn copy_to_asset_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        component_ids: &[i64],
        asset_id: i64,
    ) -> Result<u64> {
        let copied = sqlx::query(
            r#"
            INSERT INTO document (tenant_id, asset_id, component_id, kind, name,
                                  storage_path, content_type, content)
            SELECT tenant_id, $1, component_id, kind, name, storage_path, content_type, content
            FROM document
            WHERE component_id = ANY($2)
            ORDER BY id
            "#,
        )
        .bind(asset_id)
        .bind(component_ids)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        sqlx::query(
            "UPDATE document SET component_id = NULL \
             WHERE component_id = ANY($1) AND asset_id IS DISTINCT FROM $2",
        )
        .bind(component_ids)
        .bind(asset_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(copied)
    }

    /// List every preventive-maintenance template of a tenant.
    ///
    /// The owning asset is embedded inside `content`, so filtering happens
    /// after parsing. Rows are locked for the rewrite that follows.
    pub async fn list_preventive_templates_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: i64,
    ) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM document WHERE tenant_id = $1 AND kind = $2 ORDER BY id FOR UPDATE",
            DOCUMENT_COLUMNS
        ))
        .bind(tenant_id)
        .bind(PREVENTIVE_TEMPLATE_KIND)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_document_row).collect())
    }

    /// Store rewritten template content and its new owning asset.
    pub async fn update_template_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        content: &str,
        asset_id: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE document SET content = $1, asset_id = $2 WHERE id = $3")
            .bind(content)
            .bind(asset_id)
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Delete documents by id.
    pub async fn delete_by_ids_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        ids: &[i64],
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM document WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
